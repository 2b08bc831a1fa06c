//! ## faultline-injection::store
//! **Settings store boundary**
//!
//! The store is remote and possibly slow. Nothing is cached on this side and
//! every key costs one round trip. Listing is paged; [`collect_keys`] drains
//! every page before returning so callers never mutate while paging.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use faultline_core::{Credential, RemoteError};

/// One page of a key listing. `next` is the continuation token, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPage {
    pub keys: Vec<String>,
    pub next: Option<String>,
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), RemoteError>;

    /// Lists keys matching `key_filter`. A trailing `*` matches any suffix.
    async fn list_settings(
        &self,
        key_filter: &str,
        continuation: Option<String>,
    ) -> Result<SettingsPage, RemoteError>;

    async fn delete_setting(&self, key: &str) -> Result<(), RemoteError>;
}

/// Builds store clients. Construction does not talk to the store yet.
pub trait StoreConnector: Send + Sync {
    fn connect(
        &self,
        endpoint: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn SettingsStore>, RemoteError>;
}

/// Drains every page of a listing.
pub async fn collect_keys(
    store: &dyn SettingsStore,
    key_filter: &str,
) -> Result<Vec<String>, RemoteError> {
    let mut keys = Vec::new();
    let mut continuation = None;
    loop {
        let page = store.list_settings(key_filter, continuation).await?;
        trace!(count = page.keys.len(), "Listed settings page for {}", key_filter);
        keys.extend(page.keys);
        match page.next {
            Some(token) => continuation = Some(token),
            None => return Ok(keys),
        }
    }
}

/// Whether `key` matches a listing filter.
pub fn matches_filter(key: &str, key_filter: &str) -> bool {
    match key_filter.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == key_filter,
    }
}
