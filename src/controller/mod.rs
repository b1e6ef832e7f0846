//! The subscribe form's behaviour, without the form.
//!
//! `SubscriptionController` owns one `SubscriptionAttempt` and is the only
//! thing allowed to change it. The presentation layer reads it through
//! `snapshot`/`changes` and writes to it through `update_email`, `submit`,
//! `dismiss` and `dispose`.

mod notification;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use self::notification::NotificationTimer;
use crate::configuration::SubscriptionSettings;
use crate::domain::InputError;
use crate::domain::Phase;
use crate::domain::SubmitError;
use crate::domain::SubscriptionAttempt;
use crate::domain::FALLBACK_FAILURE_MESSAGE;
use crate::subscription_client::SubscribeApi;
use crate::subscription_client::SubscriptionClient;

/// How an accepted `submit` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Succeeded,
    Failed { message: String },
    /// The controller was disposed while the request was in flight; the
    /// response was dropped on the floor.
    Discarded,
}

struct State {
    attempt: SubscriptionAttempt,
    timer: NotificationTimer,
    disposed: bool,
}

/// Everything the notification timer needs to reach. The timer only ever
/// holds a `Weak` to this, so it cannot keep a dropped controller alive.
struct Shared {
    state: Mutex<State>,
    changes: watch::Sender<SubscriptionAttempt>,
}

impl Shared {
    // the lock is never held across an `.await` or user code, so a poisoned
    // lock still guards a consistent attempt
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(
        &self,
        state: &State,
    ) {
        self.changes.send_replace(state.attempt.clone());
    }

    /// Schedule the dismissal of the notification that was just shown
    fn arm_notification(
        self: &Arc<Self>,
        state: &mut State,
        deadline: Instant,
    ) {
        let shared = Arc::downgrade(self);
        state.timer.arm(deadline, move |generation| {
            if let Some(shared) = shared.upgrade() {
                shared.expire(generation);
            }
        });
    }

    fn expire(
        &self,
        generation: u64,
    ) {
        let mut state = self.lock();
        if state.disposed || !state.timer.is_current(generation) {
            return;
        }
        state.timer.expire();
        if state.attempt.dismiss() {
            tracing::info!(phase = ?state.attempt.phase(), "Notification expired");
            self.publish(&state);
        }
    }
}

/// Held by an accepted `submit` while its request is out. If the `submit`
/// future is dropped before the endpoint answers (a `timeout`, a `select!`, an
/// aborted UI task), dropping this settles the attempt as a failure, so that
/// `Submitting` never outlives the request.
struct PendingSubmit {
    controller_id: Uuid,
    shared: Option<Weak<Shared>>,
    notification_ttl: Duration,
}

impl PendingSubmit {
    /// The reply arrived and `submit` settles the attempt itself. Must be
    /// called before `submit` takes the lock again.
    fn disarm(mut self) { self.shared = None; }
}

impl Drop for PendingSubmit {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take().and_then(|shared| shared.upgrade()) else {
            return;
        };
        let mut state = shared.lock();
        if state.disposed || state.attempt.phase() != Phase::Submitting {
            return;
        }
        tracing::warn!(
            controller_id = %self.controller_id,
            "Submission abandoned before the endpoint replied"
        );
        let deadline = Instant::now() + self.notification_ttl;
        state.attempt.fail(FALLBACK_FAILURE_MESSAGE, deadline);
        // the timer task needs a runtime; without one the notification stays
        // up until dismissed
        if tokio::runtime::Handle::try_current().is_ok() {
            shared.arm_notification(&mut state, deadline);
        }
        shared.publish(&state);
    }
}

pub struct SubscriptionController<A> {
    id: Uuid,
    api: A,
    notification_ttl: Duration,
    shared: Arc<Shared>,
}

impl SubscriptionController<SubscriptionClient> {
    /// Wire a controller to the real subscription endpoint
    pub fn build(cfg: &SubscriptionSettings) -> Result<Self, anyhow::Error> {
        Ok(Self::new(cfg.client()?, cfg.notification_ttl()))
    }
}

impl<A> SubscriptionController<A> {
    pub fn new(
        api: A,
        notification_ttl: Duration,
    ) -> Self {
        let attempt = SubscriptionAttempt::new();
        let (changes, _) = watch::channel(attempt.clone());
        Self {
            id: Uuid::new_v4(),
            api,
            notification_ttl,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    attempt,
                    timer: NotificationTimer::default(),
                    disposed: false,
                }),
                changes,
            }),
        }
    }

    pub fn id(&self) -> Uuid { self.id }

    pub fn snapshot(&self) -> SubscriptionAttempt { self.shared.lock().attempt.clone() }

    /// A feed of every state the controller publishes, including dismissals
    /// made by the notification timer. Closes when the controller is dropped.
    pub fn changes(&self) -> watch::Receiver<SubscriptionAttempt> { self.shared.changes.subscribe() }

    pub fn is_disposed(&self) -> bool { self.shared.lock().disposed }

    pub fn update_email(
        &self,
        text: impl Into<String>,
    ) -> Result<(), InputError> {
        let mut state = self.shared.lock();
        if state.disposed {
            return Err(InputError::Disposed);
        }
        state.attempt.update_email(text)?;
        self.shared.publish(&state);
        Ok(())
    }

    /// Hide the current notification, exactly as its timer would. Returns
    /// `false` if there was nothing to dismiss.
    #[tracing::instrument(name = "Dismissing notification", skip(self), fields(controller_id = %self.id))]
    pub fn dismiss(&self) -> bool {
        let mut state = self.shared.lock();
        if state.disposed {
            return false;
        }
        if !state.attempt.dismiss() {
            return false;
        }
        state.timer.cancel();
        self.shared.publish(&state);
        true
    }

    /// Tear the controller down: cancel the notification timer and freeze the
    /// attempt. Idempotent; also runs on drop.
    ///
    /// A request that is still in flight is not cancelled, but its response
    /// will be discarded.
    pub fn dispose(&self) {
        let mut state = self.shared.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.timer.cancel();
        tracing::debug!(controller_id = %self.id, "Subscription controller disposed");
    }
}

impl<A: SubscribeApi> SubscriptionController<A> {
    /// Send the current address to the subscription endpoint.
    ///
    /// The attempt enters `Submitting` before the first `.await`, so any
    /// overlapping call (e.g. a double click) is turned away with
    /// `SubmitError::InFlight` and makes no request of its own. Locally
    /// rejected calls never change the attempt.
    ///
    /// There is no retry: after a failure the address is kept, and it is up to
    /// the user to submit again. Dropping the returned future before it
    /// completes counts as a failure with the fallback message.
    #[tracing::instrument(
        name = "Submitting newsletter subscription",
        skip(self),
        fields(
            controller_id = %self.id,
            subscriber_email = tracing::field::Empty,
        )
    )]
    pub async fn submit(&self) -> Result<Submission, SubmitError> {
        let email = {
            let mut state = self.shared.lock();
            if state.disposed {
                return Err(SubmitError::Disposed);
            }
            let email = state.attempt.begin_submit().map_err(|e| {
                tracing::debug!(reason = %e, "Submission rejected locally");
                e
            })?;
            // retrying from `Failed` hides the previous notification
            state.timer.cancel();
            self.shared.publish(&state);
            email
        };
        let pending = PendingSubmit {
            controller_id: self.id,
            shared: Some(Arc::downgrade(&self.shared)),
            notification_ttl: self.notification_ttl,
        };
        tracing::Span::current().record("subscriber_email", tracing::field::display(email.as_ref()));

        let outcome = self.api.subscribe(&email).await;
        pending.disarm();

        let mut state = self.shared.lock();
        if state.disposed {
            tracing::warn!("Controller disposed while subscribing; discarding response");
            return Ok(Submission::Discarded);
        }

        let deadline = Instant::now() + self.notification_ttl;
        let submission = match outcome {
            Ok(()) => {
                tracing::info!("Subscribed to newsletter");
                state.attempt.succeed(deadline);
                Submission::Succeeded
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Subscription failed"
                );
                let message = e.server_message().unwrap_or(FALLBACK_FAILURE_MESSAGE).to_string();
                state.attempt.fail(message.clone(), deadline);
                Submission::Failed { message }
            }
        };

        self.shared.arm_notification(&mut state, deadline);
        self.shared.publish(&state);
        Ok(submission)
    }
}

impl<A> Drop for SubscriptionController<A> {
    fn drop(&mut self) { self.dispose(); }
}
