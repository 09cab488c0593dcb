#![deny(clippy::all)]

use crate::domain::{
    AnalyticsMetrics, Article, ArticleQuery, Category, CategoryStat, Comment, RankedArticle,
    TagCount,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points the caching layer sits in front of

/// Port for the backing article store.
///
/// Every operation is asynchronous. Operations that take a `latency` must
/// delay their resolution by exactly that long, so callers can exercise
/// streaming and concurrency behaviour. Lookups that find nothing return
/// `None` or an empty collection, never an error.
#[async_trait]
pub trait ArticleStore: Send + Sync + 'static {
    /// Filtered, paginated listing.
    async fn find_articles(&self, query: ArticleQuery) -> Result<Vec<Article>>;

    async fn find_article_by_slug(
        &self,
        slug: &str,
        latency: Option<Duration>,
    ) -> Result<Option<Article>>;

    async fn count_articles(&self, category: Option<&str>) -> Result<u64>;

    /// Articles scored by shared category, tags and author.
    async fn find_related(
        &self,
        article_id: &str,
        limit: usize,
        latency: Option<Duration>,
    ) -> Result<Vec<Article>>;

    async fn find_trending(&self, limit: usize) -> Result<Vec<Article>>;

    async fn find_comments(
        &self,
        article_id: &str,
        latency: Option<Duration>,
    ) -> Result<Vec<Comment>>;

    async fn recent_comments(&self, limit: usize) -> Result<Vec<Comment>>;

    async fn analytics(&self, latency: Option<Duration>) -> Result<AnalyticsMetrics>;

    async fn top_articles(&self, limit: usize) -> Result<Vec<RankedArticle>>;

    async fn categories(&self) -> Result<Vec<Category>>;

    async fn category_stats(&self) -> Result<Vec<CategoryStat>>;

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn popular_tags(&self, limit: usize) -> Result<Vec<TagCount>>;

    async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Article>>;

    async fn increment_view_count(&self, article_id: &str) -> Result<()>;
}

/// One call recorded by a store that keeps a request log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub method: String,
    pub params: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
