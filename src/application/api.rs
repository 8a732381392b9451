//! Port to the remote albums service.

use async_trait::async_trait;

use albumsync_api_types::{AlbumSummary, CreateAlbumRequest};

use super::error::{FetchError, MutationError};

/// Remote read and write operations on a user's albums.
#[async_trait]
pub trait AlbumsApi: Send + Sync {
    /// `GET <list>?id=<user_id>`.
    async fn list_albums(&self, user_id: &str) -> Result<Vec<AlbumSummary>, FetchError>;

    /// `POST <create>` with the request as JSON. Any 2xx is a success.
    async fn create_album(&self, request: &CreateAlbumRequest) -> Result<(), MutationError>;
}
