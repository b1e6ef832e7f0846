mod attempt;
mod subscriber_email;
// allow external `use` statements to skip `attempt` etc
pub use attempt::InputError;
pub use attempt::Notification;
pub use attempt::NotificationStatus;
pub use attempt::Phase;
pub use attempt::SubmitError;
pub use attempt::SubscriptionAttempt;
pub use attempt::FALLBACK_FAILURE_MESSAGE;
pub use attempt::SUCCESS_MESSAGE;
pub use subscriber_email::SubscriberEmail;
