//! Binds the signed-in user's album list to its cache key.

use std::sync::Arc;

use albumsync_api_types::AlbumSummary;

use crate::cache::{Binding, CacheKey, CacheStore, ReadState};

use super::api::AlbumsApi;
use super::auth::{AuthProvider, CurrentUser};
use super::error::FetchError;

pub type AlbumList = Vec<AlbumSummary>;
pub type AlbumsStore = CacheStore<AlbumList, FetchError>;
pub type AlbumsBinding = Binding<AlbumList, FetchError>;
pub type AlbumsState = ReadState<AlbumList, FetchError>;

/// Bind `albums:{id}` of whoever is signed in.
///
/// Returns `None` without a user; nothing is fetched or cached then.
pub fn bind_albums(auth: &dyn AuthProvider, api: Arc<dyn AlbumsApi>) -> Option<AlbumsBinding> {
    let user = auth.current_user()?;
    Some(bind_albums_for(&user, api))
}

pub fn bind_albums_for(user: &CurrentUser, api: Arc<dyn AlbumsApi>) -> AlbumsBinding {
    let user_id = user.id.clone();
    Binding::new(CacheKey::albums(&user.id), move || {
        let api = Arc::clone(&api);
        let user_id = user_id.clone();
        async move { api.list_albums(&user_id).await }
    })
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::application::auth::StaticAuth;
    use crate::application::test_support::FakeAlbumsApi;
    use crate::cache::CacheConfig;

    #[tokio::test]
    async fn binding_is_keyed_by_user() {
        let api = Arc::new(FakeAlbumsApi::default());
        let auth = StaticAuth::signed_in("u1");

        let binding = bind_albums(&auth, api).expect("user is signed in");
        assert_eq!(binding.key(), &CacheKey::albums("u1"));
    }

    #[tokio::test]
    async fn no_binding_without_user() {
        let api = Arc::new(FakeAlbumsApi::default());
        let store = AlbumsStore::new(CacheConfig::default(), Handle::current());

        let binding = bind_albums(&StaticAuth::anonymous(), api.clone());

        assert!(binding.is_none());
        assert_eq!(store.entry_count(), 0);
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn bound_fetch_lists_that_users_albums() {
        let api = Arc::new(FakeAlbumsApi::with_albums(vec![AlbumSummary::new("Summer", "u1")]));
        let store = AlbumsStore::new(CacheConfig::default(), Handle::current());
        let binding = bind_albums_for(&CurrentUser::new("u1"), api.clone());

        let state = store.load(&binding).await;

        assert_eq!(api.listed_users(), vec!["u1".to_string()]);
        assert_eq!(state.data.map(|albums| albums.len()), Some(1));
    }
}
