use crate::generators::{MockData, MockDataGenerator};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pressroom::domain::{
    AnalyticsMetrics, Article, ArticleQuery, Category, CategoryStat, Comment, RankedArticle,
    TagCount,
};
use pressroom::ports::{ArticleStore, RequestLogEntry};
use serde_json::{Value, json};
use shared::config::Config;
use shared::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

const SCORE_SAME_CATEGORY: u32 = 10;
const SCORE_PER_SHARED_TAG: u32 = 5;
const SCORE_SAME_AUTHOR: u32 = 3;

/// In-memory article store seeded with mock data.
///
/// Records every call in a request log so tests and demos can count how
/// many requests actually reached the store, honors the artificial latency
/// a caller asks for, and can be told to fail specific methods.
pub struct MockDatabase {
    articles: RwLock<Vec<Article>>,
    categories: Vec<Category>,
    comments: Vec<Comment>,
    analytics: AnalyticsMetrics,
    request_log: Mutex<Vec<RequestLogEntry>>,
    failures: DashMap<String, String>,
}

impl MockDatabase {
    pub fn new(article_count: usize, seed: u64) -> Self {
        let data = MockDataGenerator::new(seed, Utc::now()).generate(article_count);
        Self::from_data(data)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.article_count, config.seed)
    }

    pub fn from_data(data: MockData) -> Self {
        info!(
            "Mock database initialized with {} articles, {} comments",
            data.articles.len(),
            data.comments.len()
        );
        Self {
            articles: RwLock::new(data.articles),
            categories: data.categories,
            comments: data.comments,
            analytics: data.analytics,
            request_log: Mutex::new(Vec::new()),
            failures: DashMap::new(),
        }
    }

    pub fn request_log(&self) -> Vec<RequestLogEntry> {
        self.log().clone()
    }

    pub fn clear_request_log(&self) {
        self.log().clear();
    }

    /// Number of logged calls to `method`.
    pub fn calls_to(&self, method: &str) -> usize {
        self.log().iter().filter(|entry| entry.method == method).count()
    }

    /// Make every later call to `method` fail with a store error.
    pub fn fail_method(&self, method: &str, message: impl Into<String>) {
        self.failures.insert(method.to_string(), message.into());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Snapshot of the stored articles, newest first.
    pub fn articles(&self) -> Vec<Article> {
        self.read_articles().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<RequestLogEntry>> {
        self.request_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_articles(&self) -> RwLockReadGuard<'_, Vec<Article>> {
        self.articles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_articles(&self) -> RwLockWriteGuard<'_, Vec<Article>> {
        self.articles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log the call, then fail it if a failure was injected for `method`.
    fn record(&self, method: &str, params: Value) -> Result<()> {
        let timestamp: DateTime<Utc> = Utc::now();
        debug!("Store request {} {}", method, params);
        self.log().push(RequestLogEntry {
            method: method.to_string(),
            params,
            timestamp,
        });

        match self.failures.get(method) {
            Some(message) => Err(Error::store(message.value().clone())),
            None => Ok(()),
        }
    }
}

async fn delay(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

fn related_score(candidate: &Article, current: &Article) -> u32 {
    let mut score = 0;
    if candidate.category.id == current.category.id {
        score += SCORE_SAME_CATEGORY;
    }
    let shared_tags = candidate
        .tags
        .iter()
        .filter(|tag| current.tags.contains(tag))
        .count() as u32;
    score += shared_tags * SCORE_PER_SHARED_TAG;
    if candidate.author.id == current.author.id {
        score += SCORE_SAME_AUTHOR;
    }
    score
}

fn by_views_desc(articles: &[Article], limit: usize) -> Vec<Article> {
    let mut sorted = articles.to_vec();
    sorted.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    sorted.truncate(limit);
    sorted
}

#[async_trait]
impl ArticleStore for MockDatabase {
    async fn find_articles(&self, query: ArticleQuery) -> Result<Vec<Article>> {
        self.record("find_articles", json!(query))?;
        delay(query.latency).await;

        let articles = self.read_articles();
        Ok(articles
            .iter()
            .filter(|a| query.category.as_ref().is_none_or(|slug| &a.category.slug == slug))
            .filter(|a| query.featured.is_none_or(|featured| a.featured == featured))
            .skip(query.offset_or_default())
            .take(query.limit_or_default())
            .cloned()
            .collect())
    }

    async fn find_article_by_slug(
        &self,
        slug: &str,
        latency: Option<Duration>,
    ) -> Result<Option<Article>> {
        self.record("find_article_by_slug", json!({ "slug": slug }))?;
        delay(latency).await;

        Ok(self.read_articles().iter().find(|a| a.slug == slug).cloned())
    }

    async fn count_articles(&self, category: Option<&str>) -> Result<u64> {
        self.record("count_articles", json!({ "category": category }))?;

        let articles = self.read_articles();
        let count = articles
            .iter()
            .filter(|a| category.is_none_or(|slug| a.category.slug == slug))
            .count();
        Ok(count as u64)
    }

    async fn find_related(
        &self,
        article_id: &str,
        limit: usize,
        latency: Option<Duration>,
    ) -> Result<Vec<Article>> {
        self.record(
            "find_related",
            json!({ "article_id": article_id, "limit": limit }),
        )?;
        delay(latency).await;

        let articles = self.read_articles();
        let Some(current) = articles.iter().find(|a| a.id == article_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(u32, &Article)> = articles
            .iter()
            .filter(|a| a.id != article_id)
            .map(|a| (related_score(a, current), a))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, article)| article.clone())
            .collect())
    }

    async fn find_trending(&self, limit: usize) -> Result<Vec<Article>> {
        self.record("find_trending", json!({ "limit": limit }))?;
        Ok(by_views_desc(&self.read_articles(), limit))
    }

    async fn find_comments(
        &self,
        article_id: &str,
        latency: Option<Duration>,
    ) -> Result<Vec<Comment>> {
        self.record("find_comments", json!({ "article_id": article_id }))?;
        delay(latency).await;

        Ok(self
            .comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn recent_comments(&self, limit: usize) -> Result<Vec<Comment>> {
        self.record("recent_comments", json!({ "limit": limit }))?;

        let mut comments = self.comments.clone();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        comments.truncate(limit);
        Ok(comments)
    }

    async fn analytics(&self, latency: Option<Duration>) -> Result<AnalyticsMetrics> {
        self.record(
            "analytics",
            json!({ "latency": latency.map(|d| d.as_millis() as u64) }),
        )?;
        delay(latency).await;

        Ok(self.analytics.clone())
    }

    async fn top_articles(&self, limit: usize) -> Result<Vec<RankedArticle>> {
        self.record("top_articles", json!({ "limit": limit }))?;

        Ok(by_views_desc(&self.read_articles(), limit)
            .into_iter()
            .map(|article| RankedArticle {
                views: article.view_count,
                article,
            })
            .collect())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.record("categories", json!({}))?;
        Ok(self.categories.clone())
    }

    async fn category_stats(&self) -> Result<Vec<CategoryStat>> {
        self.record("category_stats", json!({}))?;

        let mut counts: HashMap<&str, u64> = HashMap::new();
        let articles = self.read_articles();
        for article in articles.iter() {
            *counts.entry(article.category.id.as_str()).or_default() += 1;
        }

        Ok(self
            .categories
            .iter()
            .map(|category| CategoryStat {
                count: counts.get(category.id.as_str()).copied().unwrap_or(0),
                category: category.clone(),
            })
            .collect())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.record("category_by_slug", json!({ "slug": slug }))?;
        Ok(self.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn popular_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        self.record("popular_tags", json!({ "limit": limit }))?;

        // first-seen order breaks ties
        let mut tags: Vec<TagCount> = Vec::new();
        for article in self.read_articles().iter() {
            for tag in &article.tags {
                match tags.iter_mut().find(|t| &t.tag == tag) {
                    Some(existing) => existing.count += 1,
                    None => tags.push(TagCount {
                        tag: tag.clone(),
                        count: 1,
                    }),
                }
            }
        }
        tags.sort_by(|a, b| b.count.cmp(&a.count));
        tags.truncate(limit);
        Ok(tags)
    }

    async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Article>> {
        self.record("search", json!({ "query": query, "category": category }))?;

        let needle = query.to_lowercase();
        let articles = self.read_articles();
        Ok(articles
            .iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a.excerpt.to_lowercase().contains(&needle)
                    || a.content.to_lowercase().contains(&needle)
                    || a.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
            })
            .filter(|a| category.is_none_or(|slug| a.category.slug == slug))
            .cloned()
            .collect())
    }

    async fn increment_view_count(&self, article_id: &str) -> Result<()> {
        self.record("increment_view_count", json!({ "article_id": article_id }))?;

        if let Some(article) = self
            .write_articles()
            .iter_mut()
            .find(|a| a.id == article_id)
        {
            article.view_count += 1;
        }
        Ok(())
    }
}
