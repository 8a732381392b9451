//! Wire types for the albums endpoints.
//!
//! `GET <list>?id=<user>` answers with `Vec<AlbumSummary>`, and
//! `POST <create>` accepts a `CreateAlbumRequest` body.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ROW_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6a1b_5c3e_8f2d_4e71_9b0a_3c5d_7e8f_1a2b);

/// One album as returned by the list endpoint.
///
/// Only `title` and `creatorId` are guaranteed; everything else the server
/// sends is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub creator_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AlbumSummary {
    pub fn new(title: impl Into<String>, creator_id: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            creator_id: creator_id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Body of the create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlbumRequest {
    pub title: String,
    pub creator_id: String,
}

/// Stable identity of an album row in a rendered list.
///
/// Titles are not unique, so they cannot key a list on their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlbumRowKey(Uuid);

impl std::fmt::Display for AlbumRowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Pair every album with a row key.
///
/// A server-supplied `id` wins. Otherwise the key is derived from
/// `(creator_id, title, n)` where `n` counts earlier albums with the same
/// creator and title, so the same list always yields the same keys.
pub fn keyed_rows(albums: &[AlbumSummary]) -> Vec<(AlbumRowKey, &AlbumSummary)> {
    let mut seen: HashMap<(&str, &str), u32> = HashMap::new();
    albums
        .iter()
        .map(|album| {
            let key = match album.id.as_deref() {
                Some(id) => Uuid::new_v5(&ROW_KEY_NAMESPACE, format!("id\u{0}{id}").as_bytes()),
                None => {
                    let ordinal = seen
                        .entry((album.creator_id.as_str(), album.title.as_str()))
                        .or_insert(0);
                    let name = format!(
                        "derived\u{0}{}\u{0}{}\u{0}{ordinal}",
                        album.creator_id, album.title
                    );
                    *ordinal += 1;
                    Uuid::new_v5(&ROW_KEY_NAMESPACE, name.as_bytes())
                }
            };
            (AlbumRowKey(key), album)
        })
        .collect()
}
