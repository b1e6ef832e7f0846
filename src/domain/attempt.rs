use tokio::time::Instant;

use crate::domain::SubscriberEmail;

pub const SUCCESS_MESSAGE: &str = "Thanks for subscribing to our newsletter.";

/// Shown when the server gave no message of its own, or could not be reached
pub const FALLBACK_FAILURE_MESSAGE: &str = "Something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Succeeded,
    Failed,
    /// The success notification is gone, but the form stays locked: there is
    /// no way back to `Idle` after a successful subscription.
    SuccessHidden,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("No email address was entered")]
    EmptyEmail,
    #[error("{0}")]
    InvalidEmail(String),
    #[error("A subscription request is already in flight")]
    InFlight,
    #[error("This address has already been subscribed")]
    AlreadySubscribed,
    #[error("The subscription form has been disposed")]
    Disposed,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("The email input is locked while a request is in flight")]
    InFlight,
    #[error("The email input is locked after a successful subscription")]
    AlreadySubscribed,
    #[error("The subscription form has been disposed")]
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Error,
}

/// What the notification toast shows; exists iff the attempt carries a
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification<'a> {
    pub status: NotificationStatus,
    pub title: &'static str,
    pub message: &'a str,
}

/// The state behind the footer's subscribe form. Every transition lives here;
/// `SubscriptionController` only adds the network call, the timer, and
/// disposal on top.
///
/// Invariants upheld by the methods below:
/// - `message` is `Some` iff `phase` is `Succeeded` or `Failed`
/// - `notification_deadline` is `Some` only while a message is shown
/// - after `Succeeded`, `email_input` is empty and stays locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAttempt {
    email_input: String,
    phase: Phase,
    message: Option<String>,
    notification_deadline: Option<Instant>,
}

impl Default for SubscriptionAttempt {
    fn default() -> Self { Self::new() }
}

impl SubscriptionAttempt {
    pub fn new() -> Self {
        Self {
            email_input: String::new(),
            phase: Phase::Idle,
            message: None,
            notification_deadline: None,
        }
    }

    pub fn email_input(&self) -> &str { &self.email_input }

    pub fn phase(&self) -> Phase { self.phase }

    pub fn message(&self) -> Option<&str> { self.message.as_deref() }

    pub fn notification_deadline(&self) -> Option<Instant> { self.notification_deadline }

    /// Whether a successful subscription already happened (notification
    /// visible or not)
    pub fn is_subscribed(&self) -> bool {
        matches!(self.phase, Phase::Succeeded | Phase::SuccessHidden)
    }

    pub fn input_locked(&self) -> bool { self.phase == Phase::Submitting || self.is_subscribed() }

    pub fn button_label(&self) -> &'static str {
        match self.phase {
            Phase::Submitting => "...",
            Phase::Succeeded | Phase::SuccessHidden => "Joined!",
            Phase::Idle | Phase::Failed => "Subscribe",
        }
    }

    pub fn notification(&self) -> Option<Notification<'_>> {
        let message = self.message.as_deref()?;
        let (status, title) = match self.phase {
            Phase::Succeeded => (NotificationStatus::Success, "Success!"),
            _ => (NotificationStatus::Error, "Error!"),
        };
        Some(Notification {
            status,
            title,
            message,
        })
    }

    pub fn update_email(
        &mut self,
        text: impl Into<String>,
    ) -> Result<(), InputError> {
        match self.phase {
            Phase::Submitting => Err(InputError::InFlight),
            Phase::Succeeded | Phase::SuccessHidden => Err(InputError::AlreadySubscribed),
            Phase::Idle | Phase::Failed => {
                self.email_input = text.into();
                Ok(())
            }
        }
    }

    /// Check the preconditions of a submission and, if they hold, enter
    /// `Submitting`. A rejected call leaves the attempt untouched.
    ///
    /// On `Ok`, the caller owns the single network call for this attempt and
    /// must eventually report back with `succeed` or `fail`.
    pub fn begin_submit(&mut self) -> Result<SubscriberEmail, SubmitError> {
        match self.phase {
            Phase::Submitting => return Err(SubmitError::InFlight),
            Phase::Succeeded | Phase::SuccessHidden => return Err(SubmitError::AlreadySubscribed),
            Phase::Idle | Phase::Failed => {}
        }
        if self.email_input.trim().is_empty() {
            return Err(SubmitError::EmptyEmail);
        }
        let email = SubscriberEmail::parse(&self.email_input).map_err(SubmitError::InvalidEmail)?;

        // a previous failure notification goes away as soon as we retry
        self.phase = Phase::Submitting;
        self.message = None;
        self.notification_deadline = None;
        Ok(email)
    }

    /// `Submitting` -> `Succeeded`. Returns `false` (and does nothing) from any
    /// other phase.
    pub fn succeed(
        &mut self,
        deadline: Instant,
    ) -> bool {
        if self.phase != Phase::Submitting {
            return false;
        }
        self.phase = Phase::Succeeded;
        self.message = Some(SUCCESS_MESSAGE.to_string());
        self.email_input.clear();
        self.notification_deadline = Some(deadline);
        true
    }

    /// `Submitting` -> `Failed`, keeping `email_input` so that the user can
    /// retry. Returns `false` (and does nothing) from any other phase.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        deadline: Instant,
    ) -> bool {
        if self.phase != Phase::Submitting {
            return false;
        }
        self.phase = Phase::Failed;
        self.message = Some(message.into());
        self.notification_deadline = Some(deadline);
        true
    }

    /// Hide the notification. Only meaningful while one is shown; returns
    /// whether anything changed.
    pub fn dismiss(&mut self) -> bool {
        let next = match self.phase {
            Phase::Succeeded => Phase::SuccessHidden,
            Phase::Failed => Phase::Idle,
            Phase::Idle | Phase::Submitting | Phase::SuccessHidden => return false,
        };
        self.phase = next;
        self.message = None;
        self.notification_deadline = None;
        true
    }
}
