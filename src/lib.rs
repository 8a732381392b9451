//! Album list client core: a stale-while-revalidate read cache, the
//! create-album flow that invalidates it, and transient notifications.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
