//! Read-through memoization of theme and pattern analysis.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, read_through, write_through, CacheLayer};
use crate::position::Position;

use super::tactics::{detect, PatternSet};
use super::themes::{analyze, ThemeSet};

const THEMES_NAMESPACE: &str = "themes:v1";
const PATTERNS_NAMESPACE: &str = "patterns:v1";

/// Serves [`ThemeSet`]s and [`PatternSet`]s, consulting the cache first.
///
/// Themes and patterns are cached independently under the position
/// identity. Entries never need invalidation because both are pure
/// functions of the position.
#[derive(Debug)]
pub struct AnalysisService {
    cache: Arc<dyn CacheLayer>,
    ttl: Option<Duration>,
    theme_computations: AtomicUsize,
    pattern_computations: AtomicUsize,
}

impl AnalysisService {
    pub fn new(cache: Arc<dyn CacheLayer>) -> Self {
        Self {
            cache,
            ttl: None,
            theme_computations: AtomicUsize::new(0),
            pattern_computations: AtomicUsize::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn themes(&self, position: &Position) -> ThemeSet {
        let key = cache_key(THEMES_NAMESPACE, position.identity());
        if let Some(themes) = read_through(self.cache.as_ref(), &key).await {
            log::debug!("Theme cache hit for {}", position.identity());
            return themes;
        }
        self.theme_computations.fetch_add(1, Ordering::Relaxed);
        let themes = analyze(position);
        write_through(self.cache.as_ref(), &key, &themes, self.ttl).await;
        themes
    }

    pub async fn patterns(&self, position: &Position) -> PatternSet {
        let key = cache_key(PATTERNS_NAMESPACE, position.identity());
        if let Some(patterns) = read_through(self.cache.as_ref(), &key).await {
            log::debug!("Pattern cache hit for {}", position.identity());
            return patterns;
        }
        self.pattern_computations.fetch_add(1, Ordering::Relaxed);
        let patterns = detect(position);
        write_through(self.cache.as_ref(), &key, &patterns, self.ttl).await;
        patterns
    }

    /// How many times themes were computed rather than read from cache.
    pub fn theme_computations(&self) -> usize {
        self.theme_computations.load(Ordering::Relaxed)
    }

    /// How many times patterns were computed rather than read from cache.
    pub fn pattern_computations(&self) -> usize {
        self.pattern_computations.load(Ordering::Relaxed)
    }
}
