use crate::planes::timed::CachePolicy;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifetime of cached related-article lists.
pub const RELATED_ARTICLES_POLICY: CachePolicy = CachePolicy::tiered(
    Duration::from_secs(15 * 60),
    Duration::from_secs(30 * 60),
    Duration::from_secs(60 * 60),
);

/// Trending lists refresh hourly and are otherwise served stale.
pub const TRENDING_ARTICLES_POLICY: CachePolicy = CachePolicy::revalidate(Duration::from_secs(60 * 60));

/// Which caching plane a fetcher is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Every call reaches the store.
    PassThrough,
    /// Deduplicated within one request scope.
    RequestScoped,
    /// Kept across requests under the given policy.
    Timed(CachePolicy),
    /// Kept across requests until invalidated.
    TimedPermanent,
}

impl Binding {
    pub fn is_cached(&self) -> bool {
        !matches!(self, Binding::PassThrough)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::PassThrough => write!(f, "pass-through"),
            Binding::RequestScoped => write!(f, "request-scoped"),
            Binding::Timed(policy) => write!(f, "timed ({policy})"),
            Binding::TimedPermanent => write!(f, "timed (permanent)"),
        }
    }
}

impl Serialize for Binding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fetcher {
    ArticlesWithPagination,
    ArticlesByCategory,
    TotalArticleCount,
    Categories,
    CategoryStats,
    CategoriesNoDedupe,
    CategoryStatsNoDedupe,
    PopularTags,
    AnalyticsMetrics,
    TopArticles,
    DashboardData,
    Article,
    CategoryBySlug,
    TrendingArticles,
    RelatedArticles,
    PopularArticles,
    LatestArticles,
    Comments,
    RecentComments,
    SearchArticles,
    IncrementViewCount,
}

impl Fetcher {
    pub const ALL: [Fetcher; 21] = [
        Fetcher::ArticlesWithPagination,
        Fetcher::ArticlesByCategory,
        Fetcher::TotalArticleCount,
        Fetcher::Categories,
        Fetcher::CategoryStats,
        Fetcher::CategoriesNoDedupe,
        Fetcher::CategoryStatsNoDedupe,
        Fetcher::PopularTags,
        Fetcher::AnalyticsMetrics,
        Fetcher::TopArticles,
        Fetcher::DashboardData,
        Fetcher::Article,
        Fetcher::CategoryBySlug,
        Fetcher::TrendingArticles,
        Fetcher::RelatedArticles,
        Fetcher::PopularArticles,
        Fetcher::LatestArticles,
        Fetcher::Comments,
        Fetcher::RecentComments,
        Fetcher::SearchArticles,
        Fetcher::IncrementViewCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Fetcher::ArticlesWithPagination => "articles_with_pagination",
            Fetcher::ArticlesByCategory => "articles_by_category",
            Fetcher::TotalArticleCount => "total_article_count",
            Fetcher::Categories => "categories",
            Fetcher::CategoryStats => "category_stats",
            Fetcher::CategoriesNoDedupe => "categories_no_dedupe",
            Fetcher::CategoryStatsNoDedupe => "category_stats_no_dedupe",
            Fetcher::PopularTags => "popular_tags",
            Fetcher::AnalyticsMetrics => "analytics_metrics",
            Fetcher::TopArticles => "top_articles",
            Fetcher::DashboardData => "dashboard_data",
            Fetcher::Article => "article",
            Fetcher::CategoryBySlug => "category_by_slug",
            Fetcher::TrendingArticles => "trending_articles",
            Fetcher::RelatedArticles => "related_articles",
            Fetcher::PopularArticles => "popular_articles",
            Fetcher::LatestArticles => "latest_articles",
            Fetcher::Comments => "comments",
            Fetcher::RecentComments => "recent_comments",
            Fetcher::SearchArticles => "search_articles",
            Fetcher::IncrementViewCount => "increment_view_count",
        }
    }

    pub fn binding(&self) -> Binding {
        match self {
            Fetcher::ArticlesWithPagination
            | Fetcher::ArticlesByCategory
            | Fetcher::TotalArticleCount
            | Fetcher::Categories
            | Fetcher::CategoryStats
            | Fetcher::PopularTags
            | Fetcher::AnalyticsMetrics
            | Fetcher::TopArticles => Binding::RequestScoped,

            Fetcher::Article | Fetcher::CategoryBySlug => Binding::TimedPermanent,
            Fetcher::TrendingArticles => Binding::Timed(TRENDING_ARTICLES_POLICY),
            Fetcher::RelatedArticles => Binding::Timed(RELATED_ARTICLES_POLICY),

            // dashboard_data composes two request-scoped fetchers and adds no
            // caching of its own
            Fetcher::DashboardData
            | Fetcher::CategoriesNoDedupe
            | Fetcher::CategoryStatsNoDedupe
            | Fetcher::PopularArticles
            | Fetcher::LatestArticles
            | Fetcher::Comments
            | Fetcher::RecentComments
            | Fetcher::SearchArticles
            | Fetcher::IncrementViewCount => Binding::PassThrough,
        }
    }
}

impl fmt::Display for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BindingRow {
    pub fetcher: Fetcher,
    pub binding: Binding,
}

/// Every fetcher alongside the plane it is bound to.
pub fn binding_table() -> Vec<BindingRow> {
    Fetcher::ALL
        .iter()
        .map(|&fetcher| BindingRow {
            fetcher,
            binding: fetcher.binding(),
        })
        .collect()
}
