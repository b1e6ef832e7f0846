use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The auto-dismiss timer behind an outcome notification. A controller owns
/// exactly one of these, so at most one timer task is ever alive per
/// controller.
///
/// Aborting the task is not enough on its own: a task that has already woken
/// up may be waiting for the state lock while we cancel it. Every arm/cancel
/// therefore bumps `generation`, and the expiry callback is handed the
/// generation it was armed with, to be checked with `is_current` once the lock
/// is held.
#[derive(Debug, Default)]
pub(crate) struct NotificationTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl NotificationTimer {
    /// Replace any live timer with one that calls `on_expiry` at `deadline`.
    /// Must be called from within a tokio runtime.
    pub(crate) fn arm<F>(
        &mut self,
        deadline: Instant,
        on_expiry: F,
    ) where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expiry(generation);
        }));
    }

    pub(crate) fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_current(
        &self,
        generation: u64,
    ) -> bool {
        self.handle.is_some() && self.generation == generation
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool { self.handle.is_some() }

    /// Called from the expiring task itself, so the handle is dropped
    /// (detached) rather than aborted.
    pub(crate) fn expire(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.handle = None;
    }
}
