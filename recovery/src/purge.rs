//! Dropping stale static assets from the platform cache.

use staleguard_core::CacheStore;

/// Delete every cache whose name contains one of `namespaces`.
///
/// Errors are logged and swallowed. Returns how many caches were deleted.
pub async fn purge_caches(store: &dyn CacheStore, namespaces: &[String]) -> usize {
    if namespaces.is_empty() {
        return 0;
    }

    let names = match store.keys().await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!("Cache purge skipped: {err}");
            return 0;
        }
    };

    let mut purged = 0;
    for name in names
        .iter()
        .filter(|name| namespaces.iter().any(|ns| name.contains(ns.as_str())))
    {
        match store.delete(name).await {
            Ok(true) => {
                tracing::debug!(cache = %name, "Purged cache");
                purged += 1;
            }
            Ok(false) => {}
            Err(err) => tracing::warn!(cache = %name, "Failed to purge cache: {err}"),
        }
    }
    purged
}
