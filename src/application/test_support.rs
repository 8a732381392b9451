//! In-memory albums service for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use albumsync_api_types::{AlbumSummary, CreateAlbumRequest};

use super::api::AlbumsApi;
use super::error::{FetchError, MutationError};

#[derive(Default)]
pub(crate) struct FakeAlbumsApi {
    albums: Mutex<Vec<AlbumSummary>>,
    listed: Mutex<Vec<String>>,
    created: Mutex<Vec<CreateAlbumRequest>>,
    create_failure: Mutex<Option<MutationError>>,
    create_hold: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeAlbumsApi {
    pub(crate) fn with_albums(albums: Vec<AlbumSummary>) -> Self {
        Self {
            albums: Mutex::new(albums),
            ..Self::default()
        }
    }

    pub(crate) fn fail_creates_with(&self, error: MutationError) {
        *self.create_failure.lock().unwrap() = Some(error);
    }

    /// Park the next create call until the returned sender fires.
    pub(crate) fn hold_next_create(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.create_hold.lock().unwrap() = Some(rx);
        tx
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.listed.lock().unwrap().len()
    }

    pub(crate) fn listed_users(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub(crate) fn create_requests(&self) -> Vec<CreateAlbumRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlbumsApi for FakeAlbumsApi {
    async fn list_albums(&self, user_id: &str) -> Result<Vec<AlbumSummary>, FetchError> {
        self.listed.lock().unwrap().push(user_id.to_string());
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
        self.created.lock().unwrap().push(request.clone());
        let hold = self.create_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        if let Some(error) = self.create_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.albums
            .lock()
            .unwrap()
            .push(AlbumSummary::new(&request.title, &request.creator_id));
        Ok(())
    }
}
