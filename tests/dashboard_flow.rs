use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use albumsync::application::api::AlbumsApi;
use albumsync::application::auth::StaticAuth;
use albumsync::application::error::{FetchError, MutationError};
use albumsync::application::fetcher::AlbumsStore;
use albumsync::application::mutation::{CREATED_DESCRIPTION, CREATED_TITLE, FAILED_TITLE, SubmitOutcome};
use albumsync::application::notifier::{BroadcastNotifier, NotificationEvent, Severity};
use albumsync::application::session::{DashboardSession, ListView, SessionOptions};
use albumsync::cache::{CacheConfig, CacheKey, Invalidation};
use albumsync_api_types::{AlbumSummary, CreateAlbumRequest};
use async_trait::async_trait;
use tokio::runtime::Handle;

#[derive(Default)]
struct StubAlbums {
    albums: Mutex<Vec<AlbumSummary>>,
    list_calls: Mutex<Vec<String>>,
    reject_creates: Mutex<bool>,
}

#[async_trait]
impl AlbumsApi for StubAlbums {
    async fn list_albums(&self, user_id: &str) -> Result<Vec<AlbumSummary>, FetchError> {
        self.list_calls.lock().unwrap().push(user_id.to_string());
        // Let concurrent readers pile up on the in-flight fetch.
        tokio::task::yield_now().await;
        Ok(self
            .albums
            .lock()
            .unwrap()
            .iter()
            .filter(|album| album.creator_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_album(&self, request: &CreateAlbumRequest) -> Result<(), MutationError> {
        if *self.reject_creates.lock().unwrap() {
            return Err(MutationError::Status {
                status: 500,
                body: "database unavailable".into(),
            });
        }
        self.albums
            .lock()
            .unwrap()
            .push(AlbumSummary::new(&request.title, &request.creator_id));
        Ok(())
    }
}

struct Harness {
    api: Arc<StubAlbums>,
    store: AlbumsStore,
    session: DashboardSession,
}

fn harness(user_id: &str, api: StubAlbums) -> Harness {
    let api = Arc::new(api);
    let store = AlbumsStore::new(CacheConfig::default(), Handle::current());
    let session = DashboardSession::open(
        Arc::new(StaticAuth::signed_in(user_id)),
        api.clone(),
        store.clone(),
        Arc::new(BroadcastNotifier::new(NonZeroUsize::new(16).expect("non-zero"))),
        SessionOptions::default(),
    )
    .expect("signed in");
    Harness {
        api,
        store,
        session,
    }
}

#[tokio::test]
async fn creating_an_album_refetches_and_notifies_once() {
    let h = harness("u1", StubAlbums::default());
    let mut notices = h.session.notifications();

    let initial = h.session.load_albums().await;
    assert_eq!(initial.data, Some(Vec::new()));
    assert!(matches!(
        ListView::from_state(&initial),
        ListView::Ready { ref rows, refresh_error: None } if rows.is_empty()
    ));

    let outcome = h.session.submit_create("Summer").await;
    assert_eq!(outcome, SubmitOutcome::Created);

    let refreshed = h.session.load_albums().await;
    assert_eq!(*h.api.list_calls.lock().unwrap(), vec!["u1", "u1"]);
    let titles: Vec<String> = refreshed
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|album| album.title)
        .collect();
    assert_eq!(titles, vec!["Summer"]);

    let mut shown = Vec::new();
    while let Ok(event) = notices.try_recv() {
        if let NotificationEvent::Shown(notice) = event {
            shown.push(notice);
        }
    }
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, CREATED_TITLE);
    assert_eq!(shown[0].description, CREATED_DESCRIPTION);
    assert_eq!(shown[0].severity, Severity::Success);
}

#[tokio::test]
async fn concurrent_reads_share_one_fetch() {
    let h = harness("u1", StubAlbums::default());

    let (a, b, c) = tokio::join!(
        h.session.load_albums(),
        h.session.load_albums(),
        h.session.load_albums()
    );

    assert_eq!(h.api.list_calls.lock().unwrap().len(), 1);
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[tokio::test]
async fn failed_create_keeps_the_cached_list() {
    let api = StubAlbums::default();
    api.albums
        .lock()
        .unwrap()
        .push(AlbumSummary::new("A", "u1"));
    *api.reject_creates.lock().unwrap() = true;
    let h = harness("u1", api);
    let mut notices = h.session.notifications();

    h.session.load_albums().await;
    let outcome = h.session.submit_create("Summer").await;

    assert!(matches!(outcome, SubmitOutcome::Failed(MutationError::Status { status: 500, .. })));
    let state = h.session.albums();
    assert_eq!(state.data, Some(vec![AlbumSummary::new("A", "u1")]));
    assert_eq!(h.api.list_calls.lock().unwrap().len(), 1);

    let Ok(NotificationEvent::Shown(notice)) = notices.try_recv() else {
        panic!("expected a failure notice");
    };
    assert_eq!(notice.title, FAILED_TITLE);
    assert_eq!(notice.severity, Severity::Warning);
    assert!(notice.description.contains("database unavailable"));
}

#[tokio::test]
async fn subscribed_list_refreshes_itself_after_create() {
    let h = harness("u1", StubAlbums::default());
    let mut list = h.session.subscribe_albums();
    list.settled().await.expect("cached");

    h.session.submit_create("Summer").await;

    let state = list.settled().await.expect("cached");
    assert_eq!(state.data.map(|albums| albums.len()), Some(1));
    assert_eq!(h.api.list_calls.lock().unwrap().len(), 2);
    assert_eq!(h.store.subscriber_count(&CacheKey::albums("u1")), 1);

    list.unsubscribe();
    assert_eq!(h.store.subscriber_count(&CacheKey::albums("u1")), 0);
}

#[tokio::test]
async fn rejected_title_does_not_touch_the_server_or_cache() {
    let h = harness("u1", StubAlbums::default());
    h.session.load_albums().await;

    let outcome = h.session.submit_create(" a ").await;

    let SubmitOutcome::Rejected(errors) = outcome else {
        panic!("expected validation failure");
    };
    assert_eq!(errors.get("title"), Some("title must be at least 2 characters"));
    assert!(h.api.albums.lock().unwrap().is_empty());
    assert_eq!(h.session.refresh(), Invalidation::Deferred);
}
