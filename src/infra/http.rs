//! reqwest-backed albums service.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tracing::debug;

use albumsync_api_types::{AlbumSummary, CreateAlbumRequest};

use crate::application::api::AlbumsApi;
use crate::application::error::{FetchError, MutationError};
use crate::config::ApiSettings;

use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct HttpAlbumsApi {
    client: Client,
    list_url: Url,
    create_url: Url,
}

impl HttpAlbumsApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            list_url: settings.list_url.clone(),
            create_url: settings.create_url.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("albumsync/", env!("CARGO_PKG_VERSION"))
    }

    fn list_url_for(&self, user_id: &str) -> Url {
        let mut url = self.list_url.clone();
        url.query_pairs_mut().append_pair("id", user_id);
        url
    }
}

/// Split a response into its body, or a status failure carrying that body.
async fn read_body(resp: Response) -> Result<Result<Vec<u8>, (u16, String)>, reqwest::Error> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if status.is_success() {
        Ok(Ok(bytes.to_vec()))
    } else {
        Ok(Err((
            status.as_u16(),
            String::from_utf8_lossy(&bytes).into_owned(),
        )))
    }
}

#[async_trait]
impl AlbumsApi for HttpAlbumsApi {
    async fn list_albums(&self, user_id: &str) -> Result<Vec<AlbumSummary>, FetchError> {
        let url = self.list_url_for(user_id);
        debug!(%url, user_id, "Listing albums");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::transport)?;
        let bytes = read_body(resp)
            .await
            .map_err(FetchError::transport)?
            .map_err(|(status, body)| FetchError::Status { status, body })?;

        serde_json::from_slice(&bytes).map_err(|err| FetchError::Decode(err.to_string()))
    }

    async fn create_album(&self, request: &CreateAlbumRequest) -> Result<(), MutationError> {
        debug!(url = %self.create_url, creator_id = %request.creator_id, "Creating album");

        let resp = self
            .client
            .post(self.create_url.clone())
            .json(request)
            .send()
            .await
            .map_err(MutationError::transport)?;
        read_body(resp)
            .await
            .map_err(MutationError::transport)?
            .map_err(|(status, body)| MutationError::Status { status, body })?;
        Ok(())
    }
}
