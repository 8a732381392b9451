//! Application services: fetcher binding, create-album flow, notifications
//! and the session that ties them together.

pub mod api;
pub mod auth;
pub mod error;
pub mod fetcher;
pub mod mutation;
pub mod notifier;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
