//! The newsletter signup behind the HoreCloud site footer.
//!
//! Everything around the form (layout, theming, copy) is somebody else's
//! problem; this crate is the part with control flow: submit an address,
//! interpret the endpoint's answer, show an outcome notification for a few
//! seconds, and never let a disposed form react to a late answer.

pub mod configuration;
pub mod controller;
pub mod domain;
pub mod subscription_client;
pub mod telemetry;
