use serde::Serialize;

use albumsync::application::error::AppError;
use albumsync::application::notifier::Notification;
use albumsync_api_types::{AlbumRowKey, AlbumSummary};

pub fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::unexpected(format!("failed to render output: {e}")))?;
    println!("{out}");
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct RowView<'a> {
    pub key: AlbumRowKey,
    #[serde(flatten)]
    pub album: &'a AlbumSummary,
}

impl<'a> RowView<'a> {
    pub fn from_rows(rows: Vec<(AlbumRowKey, &'a AlbumSummary)>) -> Vec<Self> {
        rows.into_iter()
            .map(|(key, album)| Self { key, album })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct NoticeView {
    pub severity: &'static str,
    pub title: String,
    pub description: String,
}

impl From<Notification> for NoticeView {
    fn from(notification: Notification) -> Self {
        Self {
            severity: notification.severity.as_str(),
            title: notification.title,
            description: notification.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateReport<'a> {
    pub notifications: Vec<NoticeView>,
    pub albums: Vec<RowView<'a>>,
}
