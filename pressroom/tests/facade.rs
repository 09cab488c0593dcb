use chrono::{TimeZone, Utc};
use futures::future::join_all;
use pressroom::domain::{DashboardOptions, Page};
use pressroom::events::CacheEvent;
use pressroom::facade::fetchers::{DEFAULT_RELATED_LIMIT, POPULAR_ARTICLES_LATENCY};
use pressroom::{ArticleFetchers, Binding, Fetcher, RequestScope, TimedCache, TimedCacheSettings};
use shared::Error;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::{MockDataGenerator, MockDatabase};
use tokio::time::{Instant, advance, sleep};

fn database() -> Arc<MockDatabase> {
    let anchor = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Arc::new(MockDatabase::from_data(
        MockDataGenerator::new(42, anchor).generate(50),
    ))
}

fn fetchers(db: &Arc<MockDatabase>) -> ArticleFetchers {
    ArticleFetchers::new(db.clone(), TimedCache::new(TimedCacheSettings::default()))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_request_scoped_calls_hit_store_once() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /articles");

    let (categories, stats) = tokio::join!(
        join_all((0..3).map(|_| fetchers.categories(&scope))),
        join_all((0..2).map(|_| fetchers.category_stats(&scope))),
    );

    let first = categories[0].as_ref().unwrap();
    for result in &categories {
        assert_eq!(result.as_ref().unwrap(), first);
    }
    assert_eq!(stats.len(), 2);
    assert_eq!(db.calls_to("categories"), 1);
    assert_eq!(db.calls_to("category_stats"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_dedupe_fetchers_hit_store_every_time() {
    let db = database();
    let fetchers = fetchers(&db);

    let results = join_all((0..3).map(|_| fetchers.categories_no_dedupe())).await;
    for _ in 0..2 {
        fetchers.category_stats_no_dedupe().await.unwrap();
    }

    assert!(results.iter().all(|r| r.as_ref().unwrap().len() == 5));
    assert_eq!(db.calls_to("categories"), 3);
    assert_eq!(db.calls_to("category_stats"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_scoped_results_do_not_leak_between_scopes() {
    let db = database();
    let fetchers = fetchers(&db);

    let first = RequestScope::new("first");
    fetchers.total_article_count(&first, None).await.unwrap();
    first.finish();

    let second = RequestScope::new("second");
    let count = fetchers.total_article_count(&second, None).await.unwrap();

    assert_eq!(count, 50);
    assert_eq!(db.calls_to("count_articles"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_arguments_are_fetched_separately() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /articles");

    let (all, nextjs, nextjs_again) = tokio::join!(
        fetchers.total_article_count(&scope, None),
        fetchers.total_article_count(&scope, Some("nextjs")),
        fetchers.total_article_count(&scope, Some("nextjs")),
    );

    assert!(all.unwrap() >= nextjs.clone().unwrap());
    assert_eq!(nextjs, nextjs_again);
    assert_eq!(db.calls_to("count_articles"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pagination_defaults() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /articles?page=2");

    let first = fetchers
        .articles_with_pagination(&scope, Page::default())
        .await
        .unwrap();
    let second = fetchers
        .articles_with_pagination(&scope, Page::new(2, 12))
        .await
        .unwrap();

    assert_eq!(first.len(), 12);
    assert_eq!(second.len(), 12);
    assert_eq!(first[0], db.articles()[0]);
    assert_eq!(second[0], db.articles()[12]);

    let log = db.request_log();
    assert_eq!(log[1].params["offset"], 12);
    assert_eq!(log[1].params["limit"], 12);
}

#[tokio::test(start_paused = true)]
async fn test_articles_by_category_only_returns_that_category() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /articles?category=react");

    let articles = fetchers
        .articles_by_category(&scope, "react", Page::new(1, 50))
        .await
        .unwrap();

    assert!(articles.iter().all(|a| a.category.slug == "react"));
    let expected = fetchers
        .total_article_count(&scope, Some("react"))
        .await
        .unwrap();
    assert_eq!(articles.len() as u64, expected);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_is_shared_by_coalesced_callers() {
    let db = database();
    let fetchers = fetchers(&db);
    db.fail_method("categories", "Database error");
    let scope = RequestScope::new("GET /articles");

    let results = join_all((0..3).map(|_| fetchers.categories(&scope))).await;

    for result in results {
        assert_eq!(result.unwrap_err(), Error::store("Database error"));
    }
    assert_eq!(db.calls_to("categories"), 1);

    // a new request retries
    db.clear_failures();
    let scope = RequestScope::new("GET /articles");
    assert!(fetchers.categories(&scope).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_related_articles_twice_in_one_render() {
    let db = database();
    let fetchers = fetchers(&db);

    let (first, second) = tokio::join!(
        fetchers.related_articles("article-1", DEFAULT_RELATED_LIMIT),
        fetchers.related_articles("article-1", DEFAULT_RELATED_LIMIT),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert!(first.len() <= DEFAULT_RELATED_LIMIT);
    assert!(first.iter().all(|a| a.id != "article-1"));
    assert_eq!(db.calls_to("find_related"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_related_articles_sequential_calls_hit_store_once() {
    let db = database();
    let fetchers = fetchers(&db);

    let first = fetchers.related_articles("article-1", 4).await.unwrap();
    let second = fetchers.related_articles("article-1", 4).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(db.calls_to("find_related"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_related_articles_follow_their_policy() {
    let db = database();
    let fetchers = fetchers(&db);

    fetchers.related_articles("article-1", 4).await.unwrap();

    advance(Duration::from_secs(10 * 60)).await;
    fetchers.related_articles("article-1", 4).await.unwrap();
    assert_eq!(db.calls_to("find_related"), 1);

    // stale: served, refreshed in the background
    advance(Duration::from_secs(10 * 60)).await;
    fetchers.related_articles("article-1", 4).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(db.calls_to("find_related"), 2);

    // past expiry: recomputed on the caller's path
    advance(Duration::from_secs(61 * 60)).await;
    fetchers.related_articles("article-1", 4).await.unwrap();
    assert_eq!(db.calls_to("find_related"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_article_is_cached_permanently() {
    let db = database();
    let fetchers = fetchers(&db);
    let slug = db.articles()[0].slug.clone();

    let article = fetchers.article(&slug).await.unwrap().unwrap();
    advance(Duration::from_secs(7 * 24 * 3600)).await;
    let again = fetchers.article(&slug).await.unwrap().unwrap();

    assert_eq!(article, again);
    assert_eq!(db.calls_to("find_article_by_slug"), 1);

    assert!(fetchers.article("no-such-article").await.unwrap().is_none());
    assert!(fetchers.category_by_slug("react").await.unwrap().is_some());
    assert!(fetchers.category_by_slug("react").await.unwrap().is_some());
    assert_eq!(db.calls_to("category_by_slug"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trending_articles_serve_stale_after_an_hour() {
    let db = database();
    let fetchers = fetchers(&db);
    let mut events = fetchers.timed_cache().subscribe();

    let trending = fetchers.trending_articles(5).await.unwrap();
    assert_eq!(trending.len(), 5);
    assert!(trending.windows(2).all(|w| w[0].view_count >= w[1].view_count));

    advance(Duration::from_secs(2 * 3600)).await;
    assert_eq!(fetchers.trending_articles(5).await.unwrap(), trending);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(db.calls_to("find_trending"), 2);
    let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.kind())
        .collect();
    assert_eq!(kinds, ["miss", "stored", "stale_served", "stored", "revalidated"]);
    assert!(matches!(
        fetchers.timed_cache().stats(),
        stats if stats.stale_hits == 1 && stats.revalidations == 1
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_fetches_concurrently() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /dashboard");
    let started = Instant::now();

    let dashboard = fetchers
        .dashboard_data(
            &scope,
            DashboardOptions {
                top_articles_limit: 5,
                analytics_delay: Duration::from_millis(30),
                top_articles_delay: Duration::from_millis(30),
            },
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(60));
    assert_eq!(dashboard.top_articles.len(), 5);
    assert_eq!(dashboard.analytics.views_by_date.len(), 30);
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_shares_scope_with_standalone_widgets() {
    let db = database();
    let fetchers = fetchers(&db);
    let scope = RequestScope::new("GET /dashboard");
    let options = DashboardOptions::default();

    let (dashboard, analytics, top) = tokio::join!(
        fetchers.dashboard_data(&scope, options),
        fetchers.analytics_metrics(&scope, Some(options.analytics_delay)),
        fetchers.top_articles(
            &scope,
            options.top_articles_limit,
            Some(options.top_articles_delay)
        ),
    );

    assert_eq!(dashboard.as_ref().unwrap().analytics, analytics.unwrap());
    assert_eq!(dashboard.unwrap().top_articles, top.unwrap());
    assert_eq!(db.calls_to("analytics"), 1);
    assert_eq!(db.calls_to("top_articles"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_popular_articles_are_featured_and_slow() {
    let db = database();
    let fetchers = fetchers(&db);
    let started = Instant::now();

    let popular = fetchers.popular_articles(10).await.unwrap();

    assert!(started.elapsed() >= POPULAR_ARTICLES_LATENCY);
    assert_eq!(popular.len(), 3);
    assert!(popular.iter().all(|a| a.featured));

    fetchers.popular_articles(10).await.unwrap();
    assert_eq!(db.calls_to("find_articles"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_comments_and_view_counts_pass_through() {
    let db = database();
    let fetchers = fetchers(&db);
    let started = Instant::now();

    let comments = fetchers.comments("article-1").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert!(comments.iter().all(|c| c.article_id == "article-1"));

    let recent = fetchers.recent_comments(10).await.unwrap();
    assert!(recent.len() <= 10);
    assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let before = db.articles().iter().find(|a| a.id == "article-1").unwrap().view_count;
    fetchers.increment_view_count("article-1").await.unwrap();
    fetchers.increment_view_count("article-1").await.unwrap();
    let after = db.articles().iter().find(|a| a.id == "article-1").unwrap().view_count;
    assert_eq!(after, before + 2);

    let latest = fetchers.latest_articles(10).await.unwrap();
    assert_eq!(latest.len(), 10);
}

#[tokio::test]
async fn test_search_validates_query_length() {
    let db = database();
    let fetchers = fetchers(&db);

    let too_short = fetchers.search_articles("a", None).await.unwrap_err();
    let too_long = fetchers
        .search_articles(&"a".repeat(101), None)
        .await
        .unwrap_err();

    assert!(matches!(too_short, Error::Validation(_)));
    assert!(matches!(too_long, Error::Validation(_)));
    assert_eq!(db.calls_to("search"), 0);
}

#[tokio::test]
async fn test_search_returns_matches_with_total() {
    let db = database();
    let fetchers = fetchers(&db);

    let results = fetchers
        .search_articles("react", Some("react"))
        .await
        .unwrap();

    assert_eq!(results.query, "react");
    assert_eq!(results.category.as_deref(), Some("react"));
    assert_eq!(results.total, results.articles.len());
    assert!(results.articles.iter().all(|a| a.category.slug == "react"));
    assert_eq!(db.calls_to("search"), 1);
}

#[test]
fn test_cached_fetchers_are_the_ones_the_table_says() {
    for fetcher in Fetcher::ALL {
        match fetcher {
            Fetcher::Categories | Fetcher::CategoryStats | Fetcher::TopArticles => {
                assert_eq!(fetcher.binding(), Binding::RequestScoped)
            }
            Fetcher::CategoriesNoDedupe | Fetcher::DashboardData => {
                assert!(!fetcher.binding().is_cached())
            }
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_revalidation_failure_keeps_stale_trending() {
    let db = database();
    let fetchers = fetchers(&db);
    let mut events = fetchers.timed_cache().subscribe();

    let trending = fetchers.trending_articles(5).await.unwrap();
    db.fail_method("find_trending", "Database error");
    advance(Duration::from_secs(2 * 3600)).await;

    assert_eq!(fetchers.trending_articles(5).await.unwrap(), trending);
    sleep(Duration::from_millis(10)).await;

    let failure = std::iter::from_fn(|| events.try_recv().ok()).find_map(|event| match event {
        CacheEvent::RevalidationFailed(failure) => Some(failure),
        _ => None,
    });
    assert!(failure.is_some_and(|f| !f.evicted));
    assert_eq!(fetchers.trending_articles(5).await.unwrap(), trending);
}
