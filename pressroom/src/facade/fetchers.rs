use crate::domain::{
    AnalyticsMetrics, Article, ArticleQuery, Category, CategoryStat, Comment, DashboardData,
    DashboardOptions, Page, RankedArticle, SearchResults, TagCount,
};
use crate::facade::bindings::{Binding, Fetcher};
use crate::planes::request::{Memoized, RequestScope, memoize};
use crate::planes::timed::{CacheLife, CachePolicy, TimedCache, TimedFn};
use crate::ports::ArticleStore;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TOP_ARTICLES_LIMIT: usize = 10;
pub const DEFAULT_TRENDING_LIMIT: usize = 5;
pub const DEFAULT_RELATED_LIMIT: usize = 4;
pub const DEFAULT_POPULAR_LIMIT: usize = 10;
pub const DEFAULT_LATEST_LIMIT: usize = 10;
pub const DEFAULT_RECENT_COMMENTS_LIMIT: usize = 10;
pub const POPULAR_ARTICLES_LATENCY: Duration = Duration::from_millis(1500);
pub const DEFAULT_COMMENTS_DELAY: Duration = Duration::from_millis(2000);
pub const SEARCH_QUERY_MIN_CHARS: usize = 2;
pub const SEARCH_QUERY_MAX_CHARS: usize = 100;

type Store = Arc<dyn ArticleStore>;

/// Every data fetcher the site's pages use, each bound to the caching plane
/// listed in [`binding_table`](crate::facade::binding_table).
///
/// Request-scoped fetchers take the current [`RequestScope`]; timed and
/// pass-through fetchers do not.
pub struct ArticleFetchers {
    store: Store,
    timed: TimedCache,

    articles_with_pagination: Memoized<Page, Vec<Article>>,
    articles_by_category: Memoized<(String, Page), Vec<Article>>,
    total_article_count: Memoized<Option<String>, u64>,
    categories: Memoized<(), Vec<Category>>,
    category_stats: Memoized<(), Vec<CategoryStat>>,
    popular_tags: Memoized<usize, Vec<TagCount>>,
    analytics_metrics: Memoized<Option<Duration>, AnalyticsMetrics>,
    top_articles: Memoized<(usize, Option<Duration>), Vec<RankedArticle>>,

    article: TimedFn<String, Option<Article>>,
    category_by_slug: TimedFn<String, Option<Category>>,
    trending_articles: TimedFn<usize, Vec<Article>>,
    related_articles: TimedFn<(String, usize), Vec<Article>>,
}

impl ArticleFetchers {
    pub fn new(store: Store, timed: TimedCache) -> Self {
        let articles_with_pagination = memoize(
            Fetcher::ArticlesWithPagination.name(),
            with_store(&store, |store, page: Page| async move {
                store
                    .find_articles(ArticleQuery {
                        limit: Some(page.limit),
                        offset: Some(page.offset()),
                        ..Default::default()
                    })
                    .await
            }),
        );

        let articles_by_category = memoize(
            Fetcher::ArticlesByCategory.name(),
            with_store(&store, |store, (slug, page): (String, Page)| async move {
                store
                    .find_articles(ArticleQuery {
                        category: Some(slug),
                        limit: Some(page.limit),
                        offset: Some(page.offset()),
                        ..Default::default()
                    })
                    .await
            }),
        );

        let total_article_count = memoize(
            Fetcher::TotalArticleCount.name(),
            with_store(&store, |store, category: Option<String>| async move {
                store.count_articles(category.as_deref()).await
            }),
        );

        let categories = memoize(
            Fetcher::Categories.name(),
            with_store(&store, |store, ()| async move {
                debug!(fetcher = %Fetcher::Categories, "loading categories from store");
                store.categories().await
            }),
        );

        let category_stats = memoize(
            Fetcher::CategoryStats.name(),
            with_store(&store, |store, ()| async move {
                debug!(fetcher = %Fetcher::CategoryStats, "loading category stats from store");
                store.category_stats().await
            }),
        );

        let popular_tags = memoize(
            Fetcher::PopularTags.name(),
            with_store(&store, |store, limit: usize| async move {
                store.popular_tags(limit).await
            }),
        );

        let analytics_metrics = memoize(
            Fetcher::AnalyticsMetrics.name(),
            with_store(&store, |store, delay: Option<Duration>| async move {
                debug!(fetcher = %Fetcher::AnalyticsMetrics, ?delay, "loading analytics from store");
                store.analytics(delay).await
            }),
        );

        let top_articles = memoize(
            Fetcher::TopArticles.name(),
            with_store(
                &store,
                |store, (limit, delay): (usize, Option<Duration>)| async move {
                    debug!(fetcher = %Fetcher::TopArticles, limit, ?delay, "loading top articles from store");
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    store.top_articles(limit).await
                },
            ),
        );

        let article = {
            let store = store.clone();
            timed.wrap(Fetcher::Article.name(), move |life: CacheLife, slug: String| {
                let store = store.clone();
                async move {
                    apply_binding(&life, Fetcher::Article);
                    store.find_article_by_slug(&slug, None).await
                }
            })
        };

        let category_by_slug = {
            let store = store.clone();
            timed.wrap(
                Fetcher::CategoryBySlug.name(),
                move |life: CacheLife, slug: String| {
                    let store = store.clone();
                    async move {
                        apply_binding(&life, Fetcher::CategoryBySlug);
                        store.category_by_slug(&slug).await
                    }
                },
            )
        };

        let trending_articles = {
            let store = store.clone();
            timed.wrap(
                Fetcher::TrendingArticles.name(),
                move |life: CacheLife, limit: usize| {
                    let store = store.clone();
                    async move {
                        apply_binding(&life, Fetcher::TrendingArticles);
                        store.find_trending(limit).await
                    }
                },
            )
        };

        let related_articles = {
            let store = store.clone();
            timed.wrap(
                Fetcher::RelatedArticles.name(),
                move |life: CacheLife, (article_id, limit): (String, usize)| {
                    let store = store.clone();
                    async move {
                        apply_binding(&life, Fetcher::RelatedArticles);
                        store.find_related(&article_id, limit, None).await
                    }
                },
            )
        };

        info!(cache = %timed.name(), fetchers = Fetcher::ALL.len(), "article fetchers ready");

        Self {
            store,
            timed,
            articles_with_pagination,
            articles_by_category,
            total_article_count,
            categories,
            category_stats,
            popular_tags,
            analytics_metrics,
            top_articles,
            article,
            category_by_slug,
            trending_articles,
            related_articles,
        }
    }

    pub fn timed_cache(&self) -> &TimedCache {
        &self.timed
    }

    // Request-scoped

    pub async fn articles_with_pagination(
        &self,
        scope: &RequestScope,
        page: Page,
    ) -> Result<Vec<Article>> {
        self.articles_with_pagination.call(scope, page).await
    }

    pub async fn articles_by_category(
        &self,
        scope: &RequestScope,
        category_slug: &str,
        page: Page,
    ) -> Result<Vec<Article>> {
        self.articles_by_category
            .call(scope, (category_slug.to_string(), page))
            .await
    }

    pub async fn total_article_count(
        &self,
        scope: &RequestScope,
        category: Option<&str>,
    ) -> Result<u64> {
        self.total_article_count
            .call(scope, category.map(str::to_string))
            .await
    }

    pub async fn categories(&self, scope: &RequestScope) -> Result<Vec<Category>> {
        self.categories.call(scope, ()).await
    }

    pub async fn category_stats(&self, scope: &RequestScope) -> Result<Vec<CategoryStat>> {
        self.category_stats.call(scope, ()).await
    }

    pub async fn popular_tags(&self, scope: &RequestScope, limit: usize) -> Result<Vec<TagCount>> {
        self.popular_tags.call(scope, limit).await
    }

    pub async fn analytics_metrics(
        &self,
        scope: &RequestScope,
        delay: Option<Duration>,
    ) -> Result<AnalyticsMetrics> {
        self.analytics_metrics.call(scope, delay).await
    }

    pub async fn top_articles(
        &self,
        scope: &RequestScope,
        limit: usize,
        delay: Option<Duration>,
    ) -> Result<Vec<RankedArticle>> {
        self.top_articles.call(scope, (limit, delay)).await
    }

    /// Analytics and top articles, fetched concurrently.
    pub async fn dashboard_data(
        &self,
        scope: &RequestScope,
        options: DashboardOptions,
    ) -> Result<DashboardData> {
        let (analytics, top_articles) = futures::try_join!(
            self.analytics_metrics(scope, Some(options.analytics_delay)),
            self.top_articles(
                scope,
                options.top_articles_limit,
                Some(options.top_articles_delay)
            )
        )?;
        Ok(DashboardData {
            analytics,
            top_articles,
        })
    }

    // Timed

    pub async fn article(&self, slug: &str) -> Result<Option<Article>> {
        self.article.call(slug.to_string()).await
    }

    pub async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.category_by_slug.call(slug.to_string()).await
    }

    pub async fn trending_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.trending_articles.call(limit).await
    }

    pub async fn related_articles(&self, article_id: &str, limit: usize) -> Result<Vec<Article>> {
        self.related_articles
            .call((article_id.to_string(), limit))
            .await
    }

    // Pass-through

    pub async fn categories_no_dedupe(&self) -> Result<Vec<Category>> {
        debug!(fetcher = %Fetcher::CategoriesNoDedupe, "loading categories from store");
        self.store.categories().await
    }

    pub async fn category_stats_no_dedupe(&self) -> Result<Vec<CategoryStat>> {
        debug!(fetcher = %Fetcher::CategoryStatsNoDedupe, "loading category stats from store");
        self.store.category_stats().await
    }

    /// Featured articles, served with deliberate latency for streaming demos.
    pub async fn popular_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.store
            .find_articles(ArticleQuery {
                featured: Some(true),
                limit: Some(limit),
                latency: Some(POPULAR_ARTICLES_LATENCY),
                ..Default::default()
            })
            .await
    }

    pub async fn latest_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.store
            .find_articles(ArticleQuery {
                limit: Some(limit),
                ..Default::default()
            })
            .await
    }

    pub async fn comments(&self, article_id: &str) -> Result<Vec<Comment>> {
        self.comments_with_delay(article_id, DEFAULT_COMMENTS_DELAY)
            .await
    }

    pub async fn comments_with_delay(
        &self,
        article_id: &str,
        delay: Duration,
    ) -> Result<Vec<Comment>> {
        self.store.find_comments(article_id, Some(delay)).await
    }

    pub async fn recent_comments(&self, limit: usize) -> Result<Vec<Comment>> {
        self.store.recent_comments(limit).await
    }

    /// Search by free text, optionally within one category.
    ///
    /// The query must be between 2 and 100 characters; anything else fails
    /// with [`Error::Validation`] without touching the store.
    pub async fn search_articles(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> Result<SearchResults> {
        validate_search_query(query)?;

        let articles = self.store.search(query, category).await?;
        debug!(query, ?category, hits = articles.len(), "search finished");
        Ok(SearchResults {
            total: articles.len(),
            articles,
            query: query.to_string(),
            category: category.map(str::to_string),
        })
    }

    pub async fn increment_view_count(&self, article_id: &str) -> Result<()> {
        self.store.increment_view_count(article_id).await
    }
}

fn validate_search_query(query: &str) -> Result<()> {
    let chars = query.chars().count();
    if chars < SEARCH_QUERY_MIN_CHARS {
        return Err(Error::validation(format!(
            "query must be at least {SEARCH_QUERY_MIN_CHARS} characters"
        )));
    }
    if chars > SEARCH_QUERY_MAX_CHARS {
        return Err(Error::validation(format!(
            "query must be at most {SEARCH_QUERY_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

/// Adapt a store-taking closure into the single-argument form `memoize` wants.
fn with_store<A, Fut, F>(store: &Store, f: F) -> impl Fn(A) -> Fut + Send + Sync + 'static
where
    F: Fn(Store, A) -> Fut + Send + Sync + 'static,
{
    let store = store.clone();
    move |args| f(store.clone(), args)
}

/// Give the entry being computed the lifetime its fetcher is bound to.
fn apply_binding(life: &CacheLife, fetcher: Fetcher) {
    match fetcher.binding() {
        Binding::Timed(policy) => life.set(policy),
        Binding::TimedPermanent => life.set(CachePolicy::PERMANENT),
        Binding::PassThrough | Binding::RequestScoped => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_bounds() {
        assert!(matches!(validate_search_query("a"), Err(Error::Validation(_))));
        assert!(validate_search_query("ab").is_ok());
        assert!(validate_search_query(&"x".repeat(100)).is_ok());
        assert!(matches!(
            validate_search_query(&"x".repeat(101)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_search_query_counts_characters_not_bytes() {
        assert!(validate_search_query("日本").is_ok());
        assert!(validate_search_query(&"語".repeat(100)).is_ok());
    }

    #[test]
    fn test_apply_binding_sets_table_policy() {
        let life = CacheLife::default();
        apply_binding(&life, Fetcher::RelatedArticles);
        assert_eq!(
            life.take(),
            Some(crate::facade::bindings::RELATED_ARTICLES_POLICY)
        );

        apply_binding(&life, Fetcher::Article);
        assert_eq!(life.take(), Some(CachePolicy::PERMANENT));
    }
}
