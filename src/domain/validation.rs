//! Album form validation.
//!
//! A title is accepted when present and at least [`MIN_TITLE_CHARS`]
//! characters long after trimming. Rejections are reported per field so the
//! caller can attach each message to the input that caused it.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

pub const TITLE_FIELD: &str = "title";
pub const MIN_TITLE_CHARS: usize = 2;

/// Raw form input as submitted by the view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlbumForm {
    pub title: Option<String>,
}

impl AlbumForm {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDraft {
    title: String,
}

impl AlbumDraft {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn into_title(self) -> String {
        self.title
    }
}

/// Field name to message, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.fields))]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn summarize(fields: &BTreeMap<&'static str, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a candidate album against the form schema.
pub fn validate(form: &AlbumForm) -> Result<AlbumDraft, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = form.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        errors.add(TITLE_FIELD, format!("{TITLE_FIELD} is a required field"));
    } else if title.chars().count() < MIN_TITLE_CHARS {
        errors.add(
            TITLE_FIELD,
            format!("{TITLE_FIELD} must be at least {MIN_TITLE_CHARS} characters"),
        );
    }

    if errors.is_empty() {
        Ok(AlbumDraft {
            title: title.to_string(),
        })
    } else {
        Err(errors)
    }
}
