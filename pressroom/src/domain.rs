use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub bio: String,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author: Author,
    pub category: Category,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    /// Minutes.
    pub reading_time: u32,
    pub featured: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Referrer {
    pub source: String,
    pub count: u64,
    pub percentage: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewMetric {
    /// `YYYY-MM-DD`
    pub date: String,
    pub views: u64,
    pub unique_views: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsMetrics {
    pub total_views: u64,
    pub unique_visitors: u64,
    /// Seconds.
    pub avg_session_duration: u32,
    /// Percent.
    pub bounce_rate: u32,
    pub top_referrers: Vec<Referrer>,
    pub views_by_date: Vec<ViewMetric>,
}

/// An article together with the view count it was ranked by.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub views: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: Category,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Filter, pagination and artificial latency for an article listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "latency_ms")]
    pub latency: Option<Duration>,
}

impl ArticleQuery {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn limit_or_default(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn offset_or_default(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// One-based page number plus page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 12 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub articles: Vec<Article>,
    pub query: String,
    pub category: Option<String>,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub analytics: AnalyticsMetrics,
    pub top_articles: Vec<RankedArticle>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DashboardOptions {
    pub top_articles_limit: usize,
    pub analytics_delay: Duration,
    pub top_articles_delay: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            top_articles_limit: 10,
            analytics_delay: Duration::from_millis(100),
            top_articles_delay: Duration::from_millis(100),
        }
    }
}

/// Serialize an optional latency as whole milliseconds.
mod latency_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::new(1, 12).offset(), 0);
        assert_eq!(Page::new(2, 12).offset(), 12);
        assert_eq!(Page::new(0, 12).offset(), 0);
        assert_eq!(Page::default(), Page::new(1, 12));
    }

    #[test]
    fn test_page_offset_saturates_for_huge_page_numbers() {
        assert_eq!(Page::new(usize::MAX, 12).offset(), usize::MAX);
        assert_eq!(Page::new(usize::MAX / 2, 12).offset(), usize::MAX);
    }

    #[test]
    fn test_article_query_serializes_only_set_fields() {
        let query = ArticleQuery {
            featured: Some(true),
            limit: Some(1),
            latency: Some(Duration::from_millis(1500)),
            ..Default::default()
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json, serde_json::json!({"featured": true, "limit": 1, "latency": 1500}));
    }
}
