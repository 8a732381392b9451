//! The dashboard as seen by a view layer.
//!
//! A session exists only while someone is signed in. It owns the binding for
//! that user's album list and the create-album controller, and hands out
//! snapshots and subscriptions; it never renders anything itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use albumsync_api_types::{AlbumRowKey, AlbumSummary, keyed_rows};

use crate::cache::{Invalidation, Subscription};
use crate::domain::validation::AlbumForm;

use super::api::AlbumsApi;
use super::auth::{AuthProvider, CurrentUser};
use super::error::{FetchError, SessionError};
use super::fetcher::{AlbumList, AlbumsBinding, AlbumsState, AlbumsStore, bind_albums};
use super::mutation::{MutationController, MutationPhase, SubmitOutcome};
use super::notifier::{BroadcastNotifier, NotificationEvent};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub notice_duration: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            notice_duration: Duration::from_millis(3000),
        }
    }
}

pub struct DashboardSession {
    user: CurrentUser,
    auth: Arc<dyn AuthProvider>,
    store: AlbumsStore,
    binding: AlbumsBinding,
    notifier: Arc<BroadcastNotifier>,
    mutation: MutationController,
}

impl DashboardSession {
    pub fn open(
        auth: Arc<dyn AuthProvider>,
        api: Arc<dyn AlbumsApi>,
        store: AlbumsStore,
        notifier: Arc<BroadcastNotifier>,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let binding =
            bind_albums(&*auth, Arc::clone(&api)).ok_or(SessionError::Unauthenticated)?;
        let user = auth.current_user().ok_or(SessionError::Unauthenticated)?;
        let mutation = MutationController::new(
            api,
            Arc::clone(&auth),
            store.clone(),
            notifier.clone(),
            options.notice_duration,
        );
        info!(user_id = %user.id, "Dashboard session opened");

        Ok(Self {
            user,
            auth,
            store,
            binding,
            notifier,
            mutation,
        })
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    /// Cached album list, revalidating in the background when stale.
    pub fn albums(&self) -> AlbumsState {
        self.store.read(&self.binding)
    }

    /// Like [`albums`](Self::albums), but waits for any outstanding fetch.
    pub async fn load_albums(&self) -> AlbumsState {
        self.store.load(&self.binding).await
    }

    pub fn subscribe_albums(&self) -> Subscription<AlbumList, FetchError> {
        self.store.subscribe(&self.binding)
    }

    pub async fn submit_create(&self, title: &str) -> SubmitOutcome {
        self.mutation.submit(&AlbumForm::with_title(title)).await
    }

    pub fn notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notifier.subscribe()
    }

    pub fn mutation_phase(&self) -> MutationPhase {
        self.mutation.phase()
    }

    /// Explicit user-driven revalidation of the album list.
    pub fn refresh(&self) -> Invalidation {
        self.store.invalidate(self.binding.key())
    }

    /// Sign out and drop every cached read.
    pub fn sign_out(self) {
        self.auth.sign_out();
        self.store.clear();
        info!(user_id = %self.user.id, "Dashboard session closed");
    }
}

/// What a list view should draw for a given state.
#[derive(Debug, PartialEq)]
pub enum ListView<'a> {
    Loading,
    /// Nothing was ever fetched and the last attempt failed.
    Failed(&'a FetchError),
    Ready {
        rows: Vec<(AlbumRowKey, &'a AlbumSummary)>,
        /// A refresh failed; `rows` are from an earlier fetch.
        refresh_error: Option<&'a FetchError>,
    },
}

impl<'a> ListView<'a> {
    pub fn from_state(state: &'a AlbumsState) -> Self {
        match (&state.data, &state.error) {
            (Some(albums), error) => ListView::Ready {
                rows: keyed_rows(albums),
                refresh_error: error.as_ref(),
            },
            (None, Some(error)) => ListView::Failed(error),
            (None, None) => ListView::Loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use tokio::runtime::Handle;

    use super::*;
    use crate::application::auth::StaticAuth;
    use crate::application::mutation::CREATED_TITLE;
    use crate::application::notifier::Severity;
    use crate::application::test_support::FakeAlbumsApi;
    use crate::cache::{CacheConfig, CacheKey};

    fn open(auth: StaticAuth, api: Arc<FakeAlbumsApi>) -> Result<DashboardSession, SessionError> {
        DashboardSession::open(
            Arc::new(auth),
            api,
            AlbumsStore::new(CacheConfig::default(), Handle::current()),
            Arc::new(BroadcastNotifier::new(NonZeroUsize::new(8).expect("non-zero"))),
            SessionOptions::default(),
        )
    }

    #[tokio::test]
    async fn refuses_to_open_without_a_user() {
        let api = Arc::new(FakeAlbumsApi::default());
        let result = open(StaticAuth::anonymous(), api.clone());

        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn create_refetches_list_and_notifies_once() {
        let api = Arc::new(FakeAlbumsApi::default());
        let session = open(StaticAuth::signed_in("u1"), api.clone()).expect("session");
        let mut notices = session.notifications();

        let initial = session.load_albums().await;
        assert_eq!(initial.data, Some(vec![]));

        let mut list = session.subscribe_albums();
        let outcome = session.submit_create("Summer").await;
        assert_eq!(outcome, SubmitOutcome::Created);

        let refreshed = list.settled().await.expect("entry still cached");
        assert_eq!(api.listed_users(), vec!["u1", "u1"]);
        let titles: Vec<_> = refreshed
            .data
            .expect("data")
            .into_iter()
            .map(|album| album.title)
            .collect();
        assert_eq!(titles, vec!["Summer"]);

        let NotificationEvent::Shown(notice) = notices.recv().await.expect("notice") else {
            panic!("expected a shown notification");
        };
        assert_eq!(notice.title, CREATED_TITLE);
        assert_eq!(notice.severity, Severity::Success);
        assert!(notices.try_recv().is_err());
        assert_eq!(session.mutation_phase(), MutationPhase::Idle);
    }

    #[tokio::test]
    async fn refresh_defers_without_subscribers() {
        let api = Arc::new(FakeAlbumsApi::default());
        let session = open(StaticAuth::signed_in("u1"), api.clone()).expect("session");

        assert_eq!(session.refresh(), Invalidation::NotCached);
        session.load_albums().await;
        assert_eq!(session.refresh(), Invalidation::Deferred);
        assert_eq!(api.list_calls(), 1);

        session.load_albums().await;
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn sign_out_clears_cache_and_user() {
        let api = Arc::new(FakeAlbumsApi::default());
        let auth = Arc::new(StaticAuth::signed_in("u1"));
        let store = AlbumsStore::new(CacheConfig::default(), Handle::current());
        let session = DashboardSession::open(
            auth.clone(),
            api,
            store.clone(),
            Arc::new(BroadcastNotifier::new(NonZeroUsize::new(8).expect("non-zero"))),
            SessionOptions::default(),
        )
        .expect("session");
        session.load_albums().await;
        assert_eq!(store.entry_count(), 1);

        session.sign_out();

        assert_eq!(store.entry_count(), 0);
        assert!(store.snapshot(&CacheKey::albums("u1")).is_none());
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn list_view_keeps_rows_when_a_refresh_failed() {
        let error = FetchError::Transport("offline".into());
        let state = AlbumsState {
            data: Some(vec![AlbumSummary::new("A", "u1"), AlbumSummary::new("A", "u1")]),
            error: Some(error.clone()),
            is_loading: false,
            is_validating: false,
            fetched_at: None,
        };

        let ListView::Ready { rows, refresh_error } = ListView::from_state(&state) else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].0, rows[1].0);
        assert_eq!(refresh_error, Some(&error));
    }

    #[test]
    fn list_view_without_data() {
        let loading = AlbumsState {
            is_loading: true,
            is_validating: true,
            ..AlbumsState::empty()
        };
        assert_eq!(ListView::from_state(&loading), ListView::Loading);

        let failed = AlbumsState {
            error: Some(FetchError::Decode("bad".into())),
            ..AlbumsState::empty()
        };
        assert!(matches!(ListView::from_state(&failed), ListView::Failed(_)));
    }
}
