//! Create-album flow.
//!
//! ```text
//! Idle -> Validating -> Submitting -> Succeeded -> InvalidatingCache -> Idle
//!                    \             \-> Failed -> Idle
//!                     \-> Failed -> Idle
//! ```
//!
//! The flow is pessimistic: the cached list is never touched before the
//! server confirms the write, and only then is `albums:{creator}` invalidated.
//! A submit while another is outstanding is ignored and reported as
//! [`SubmitOutcome::Busy`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use albumsync_api_types::CreateAlbumRequest;

use crate::cache::CacheKey;
use crate::domain::validation::{AlbumForm, ValidationErrors, validate};

use super::api::AlbumsApi;
use super::auth::AuthProvider;
use super::error::MutationError;
use super::fetcher::AlbumsStore;
use super::notifier::{Notification, Notifier, Severity};

pub const CREATED_TITLE: &str = "Your album was created!";
pub const CREATED_DESCRIPTION: &str = "Start uploading photos right now!";
pub const FAILED_TITLE: &str = "An error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    InvalidatingCache,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the album and the list was invalidated.
    Created,
    /// The form was rejected locally; nothing was sent.
    Rejected(ValidationErrors),
    /// The write failed; the cache is untouched.
    Failed(MutationError),
    /// Another submission is still outstanding.
    Busy,
}

pub struct MutationController {
    api: Arc<dyn AlbumsApi>,
    auth: Arc<dyn AuthProvider>,
    store: AlbumsStore,
    notifier: Arc<dyn Notifier>,
    notice_duration: Duration,
    phase: watch::Sender<MutationPhase>,
}

impl MutationController {
    pub fn new(
        api: Arc<dyn AlbumsApi>,
        auth: Arc<dyn AuthProvider>,
        store: AlbumsStore,
        notifier: Arc<dyn Notifier>,
        notice_duration: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(MutationPhase::Idle);
        Self {
            api,
            auth,
            store,
            notifier,
            notice_duration,
            phase,
        }
    }

    pub fn phase(&self) -> MutationPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<MutationPhase> {
        self.phase.subscribe()
    }

    pub async fn submit(&self, form: &AlbumForm) -> SubmitOutcome {
        let Some(attempt) = self.begin() else {
            debug!("Submit ignored: another submission is outstanding");
            return SubmitOutcome::Busy;
        };

        let Some(user) = self.auth.current_user() else {
            attempt.advance(MutationPhase::Failed);
            let error = MutationError::Unauthenticated;
            self.announce_failure(&error);
            return SubmitOutcome::Failed(error);
        };

        let draft = match validate(form) {
            Ok(draft) => draft,
            Err(errors) => {
                attempt.advance(MutationPhase::Failed);
                info!(user_id = %user.id, errors = %errors, "Album form rejected");
                return SubmitOutcome::Rejected(errors);
            }
        };

        attempt.advance(MutationPhase::Submitting);
        let request = CreateAlbumRequest {
            title: draft.into_title(),
            creator_id: user.id,
        };

        match self.api.create_album(&request).await {
            Ok(()) => {
                attempt.advance(MutationPhase::Succeeded);
                info!(user_id = %request.creator_id, title = %request.title, "Album created");

                attempt.advance(MutationPhase::InvalidatingCache);
                let key = CacheKey::albums(&request.creator_id);
                let invalidation = self.store.invalidate(&key);
                debug!(cache_key = %key, ?invalidation, "Album list invalidated");

                self.announce(Notification::new(
                    Severity::Success,
                    CREATED_TITLE,
                    CREATED_DESCRIPTION,
                    self.notice_duration,
                ));
                SubmitOutcome::Created
            }
            Err(error) => {
                attempt.advance(MutationPhase::Failed);
                warn!(user_id = %request.creator_id, error = %error, "Album creation failed");
                self.announce_failure(&error);
                SubmitOutcome::Failed(error)
            }
        }
    }

    fn begin(&self) -> Option<Attempt<'_>> {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == MutationPhase::Idle {
                *phase = MutationPhase::Validating;
                true
            } else {
                false
            }
        });
        started.then_some(Attempt { phase: &self.phase })
    }

    fn announce_failure(&self, error: &MutationError) {
        self.announce(Notification::new(
            Severity::Warning,
            FAILED_TITLE,
            error.to_string(),
            self.notice_duration,
        ));
    }

    // Keeps a panicking notifier from skipping the phase reset. This only
    // holds in unwinding builds; under `panic = "abort"` (the release
    // profile) a notifier panic ends the process, so notifiers must not panic.
    fn announce(&self, notification: Notification) {
        if catch_unwind(AssertUnwindSafe(|| self.notifier.notify(notification))).is_err() {
            warn!("Notifier panicked; notification dropped");
        }
    }
}

/// One submission in progress. Dropping it returns the controller to idle,
/// including when the submitting future is cancelled.
struct Attempt<'a> {
    phase: &'a watch::Sender<MutationPhase>,
}

impl Attempt<'_> {
    fn advance(&self, next: MutationPhase) {
        self.phase.send_replace(next);
        debug!(phase = ?next, "Mutation phase changed");
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(MutationPhase::Idle);
    }
}
