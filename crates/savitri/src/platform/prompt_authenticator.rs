//! Console stand-in for a platform biometric prompt.
//!
//! A challenge is posted to the front end as a [`Prompt`] and resolves when
//! the user answers it through [`PromptAuthenticator::answer`].

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use savitri_core::{BiometricDriver, CoreError, CoreResult};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

const PROMPT_BUFFER: usize = 8;

/// A challenge waiting for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prompt {
    pub(crate) id: u64,
    pub(crate) reason: String,
}

type PendingSlot = Mutex<Option<(u64, oneshot::Sender<bool>)>>;

fn lock(pending: &PendingSlot) -> std::sync::MutexGuard<'_, Option<(u64, oneshot::Sender<bool>)>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears the pending slot when the awaiting challenge goes away, unless a
/// newer challenge has replaced it.
struct PendingGuard<'a> {
    pending: &'a PendingSlot,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = lock(self.pending);
        if pending.as_ref().is_some_and(|(id, _)| *id == self.id) {
            pending.take();
        }
    }
}

pub(crate) struct PromptAuthenticator {
    prompts: mpsc::Sender<Prompt>,
    pending: PendingSlot,
    next_id: AtomicU64,
}

impl PromptAuthenticator {
    /// Create the authenticator and the receiver the front end reads
    /// prompts from.
    pub(crate) fn new() -> (Self, mpsc::Receiver<Prompt>) {
        let (prompts, prompt_rx) = mpsc::channel(PROMPT_BUFFER);
        let authenticator = Self {
            prompts,
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
        };
        (authenticator, prompt_rx)
    }

    /// Resolve the pending challenge. Returns `false` if none was waiting.
    #[instrument(skip(self))]
    pub(crate) fn answer(&self, approved: bool) -> bool {
        match lock(&self.pending).take() {
            Some((id, responder)) => {
                let delivered = responder.send(approved).is_ok();
                info!(id, approved, delivered, "Challenge answered");
                delivered
            }
            None => false,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

#[async_trait]
impl BiometricDriver for PromptAuthenticator {
    async fn authenticate(&self, reason: &str) -> CoreResult<bool> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (responder, answer) = oneshot::channel();

        {
            let mut pending = lock(&self.pending);
            if pending.is_some() {
                return Err(CoreError::driver(
                    "authenticate",
                    "a challenge is already on screen",
                ));
            }
            *pending = Some((id, responder));
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let prompt = Prompt {
            id,
            reason: reason.to_string(),
        };
        if self.prompts.send(prompt).await.is_err() {
            return Err(CoreError::driver("authenticate", "no console is attached"));
        }
        debug!(id, "Challenge posted");

        // A dropped responder means the challenge was cancelled.
        Ok(answer.await.unwrap_or(false))
    }

    async fn cancel(&self) -> CoreResult<()> {
        if let Some((id, responder)) = lock(&self.pending).take() {
            let _ = responder.send(false);
            debug!(id, "Challenge cancelled");
        }
        Ok(())
    }
}
