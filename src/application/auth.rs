//! Authentication collaborator.
//!
//! The core never authenticates anyone itself; it only asks who is signed in.

use std::sync::RwLock;

use tracing::info;

use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "application::auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
    fn sign_out(&self);
}

/// Auth provider holding a user resolved up front (from config or the CLI).
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: RwLock<Option<CurrentUser>>,
}

impl StaticAuth {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(CurrentUser::new(user_id))),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<CurrentUser> {
        rw_read(&self.user, SOURCE, "current_user").clone()
    }

    fn sign_out(&self) {
        if let Some(user) = rw_write(&self.user, SOURCE, "sign_out").take() {
            info!(user_id = %user.id, "Signed out");
        }
    }
}
