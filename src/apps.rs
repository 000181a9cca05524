//! Installed-app category lookup with per-category TTL caching
//!
//! The watch-side formatting layer occasionally needs the list of installed
//! apps matching a capability category (messaging, email). Querying the
//! platform for that list is slow, so each category owns an explicit cache
//! entry holding the value, its refresh timestamp, and a ttl, refreshed only
//! when stale. The platform query itself sits behind a trait.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a category listing stays fresh
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// A single cached value with an explicit refresh timestamp and ttl
#[derive(Debug)]
pub struct TtlCache<T> {
    value: Option<T>,
    refreshed_at: Option<Instant>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            value: None,
            refreshed_at: None,
            ttl,
        }
    }

    /// Whether the cached value is missing or past its ttl
    pub fn is_stale(&self) -> bool {
        match (&self.value, self.refreshed_at) {
            (Some(_), Some(at)) => at.elapsed() > self.ttl,
            _ => true,
        }
    }

    /// The cached value, if still fresh
    pub fn get(&self) -> Option<&T> {
        if self.is_stale() {
            None
        } else {
            self.value.as_ref()
        }
    }

    /// Return the cached value, refreshing it first if stale
    pub fn refresh_if_stale(&mut self, fetch: impl FnOnce() -> T) -> &T {
        if self.is_stale() {
            self.value = Some(fetch());
            self.refreshed_at = Some(Instant::now());
        }
        self.value.as_ref().expect("value present after refresh")
    }

    /// Drop the cached value so the next read refetches
    pub fn invalidate(&mut self) {
        self.value = None;
        self.refreshed_at = None;
    }
}

/// Platform query for apps matching a capability category
pub trait AppCategorySource: Send + Sync {
    fn query_category(&self, category: &str) -> Vec<String>;
}

/// Per-category cached directory of installed apps
pub struct AppCategoryDirectory {
    source: Box<dyn AppCategorySource>,
    ttl: Duration,
    caches: Mutex<HashMap<String, TtlCache<Vec<String>>>>,
}

impl AppCategoryDirectory {
    pub fn new(source: Box<dyn AppCategorySource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_CACHE_TTL,
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// List the apps in a category, serving from cache while fresh
    pub fn apps_in_category(&self, category: &str) -> Vec<String> {
        let mut caches = self.caches.lock().unwrap();
        let cache = caches
            .entry(category.to_string())
            .or_insert_with(|| TtlCache::new(self.ttl));
        cache
            .refresh_if_stale(|| self.source.query_category(category))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        queries: Arc<AtomicUsize>,
    }

    impl AppCategorySource for CountingSource {
        fn query_category(&self, category: &str) -> Vec<String> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            vec![format!("org.example.{}", category)]
        }
    }

    fn directory(ttl: Duration) -> (AppCategoryDirectory, Arc<AtomicUsize>) {
        let queries = Arc::new(AtomicUsize::new(0));
        let directory = AppCategoryDirectory::new(Box::new(CountingSource {
            queries: queries.clone(),
        }))
        .with_ttl(ttl);
        (directory, queries)
    }

    #[test]
    fn test_fresh_value_served_from_cache() {
        let (directory, queries) = directory(Duration::from_secs(60));

        let first = directory.apps_in_category("messaging");
        let second = directory.apps_in_category("messaging");

        assert_eq!(first, second);
        assert_eq!(queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_value_is_refetched() {
        let (directory, queries) = directory(Duration::from_millis(5));

        directory.apps_in_category("email");
        std::thread::sleep(Duration::from_millis(10));
        directory.apps_in_category("email");

        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_categories_cache_independently() {
        let (directory, queries) = directory(Duration::from_secs(60));

        assert_eq!(
            directory.apps_in_category("messaging"),
            vec!["org.example.messaging".to_string()]
        );
        assert_eq!(
            directory.apps_in_category("email"),
            vec!["org.example.email".to_string()]
        );
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ttl_cache_invalidate() {
        let mut cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.refresh_if_stale(|| 7);
        assert_eq!(cache.get(), Some(&7));

        cache.invalidate();
        assert!(cache.is_stale());
        assert_eq!(cache.get(), None);
        assert_eq!(*cache.refresh_if_stale(|| 9), 9);
    }
}
