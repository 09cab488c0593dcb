use chrono::{TimeZone, Utc};
use pressroom::RequestScope;
use pressroom::TimedCacheSettings;
use pressroom_server::SiteState;
use pressroom_server::pages::{self, ArticlesQuery, SearchPage};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::{MockDataGenerator, MockDatabase};
use tokio::time::Instant;

fn site() -> SiteState {
    let anchor = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let store = Arc::new(MockDatabase::from_data(
        MockDataGenerator::new(42, anchor).generate(50),
    ));
    SiteState::with_store(store, TimedCacheSettings::default())
}

fn first_slug(site: &SiteState) -> String {
    site.store.articles()[0].slug.clone()
}

#[tokio::test(start_paused = true)]
async fn test_dedup_demo_contrasts_both_panels() {
    let site = site();
    let scope = RequestScope::new("GET /dedup-demo");

    let page = pages::dedup_demo(&site.fetchers, &scope).await.unwrap();

    assert_eq!(page.with_dedupe, page.without_dedupe);
    assert_eq!(page.with_dedupe.category_counts, [5, 5, 5]);
    assert_eq!(page.with_dedupe.stat_counts, [5, 5]);

    // One call from the deduplicated panel, three (and two) from the other.
    let calls = site.store_calls();
    assert_eq!(calls["categories"], 4);
    assert_eq!(calls["category_stats"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_articles_index_widgets_share_fetches() {
    let site = site();
    let scope = RequestScope::new("GET /articles");

    let page = pages::articles_index(&site.fetchers, &scope, ArticlesQuery::default())
        .await
        .unwrap();

    assert_eq!(page.articles.len(), 12);
    assert_eq!(page.total_count, 50);
    assert_eq!(page.total_pages, 5);
    assert_eq!(page.filter.stats, page.stats_widget);

    let calls = site.store_calls();
    assert_eq!(calls["find_articles"], 1);
    assert_eq!(calls["count_articles"], 1);
    assert_eq!(calls["categories"], 1);
    assert_eq!(calls["category_stats"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_articles_index_past_the_last_page_is_empty() {
    let site = site();

    for page in [6, usize::MAX] {
        let scope = RequestScope::new("GET /articles?page=far");
        let query = ArticlesQuery {
            page: Some(page),
            category: None,
        };

        let index = pages::articles_index(&site.fetchers, &scope, query)
            .await
            .unwrap();

        assert!(index.articles.is_empty());
        assert_eq!(index.current_page, page);
        assert_eq!(index.total_count, 50);
    }
}

#[tokio::test(start_paused = true)]
async fn test_articles_index_filtered_by_category() {
    let site = site();
    let scope = RequestScope::new("GET /articles?category=react");
    let query = ArticlesQuery {
        page: Some(1),
        category: Some("react".to_string()),
    };

    let page = pages::articles_index(&site.fetchers, &scope, query)
        .await
        .unwrap();

    let expected = site
        .store
        .articles()
        .iter()
        .filter(|a| a.category.slug == "react")
        .count() as u64;
    assert_eq!(page.total_count, expected);
    assert!(page.articles.iter().all(|card| card.category == "React"));
    assert_eq!(page.filter.selected.as_deref(), Some("react"));
}

#[tokio::test(start_paused = true)]
async fn test_each_request_gets_its_own_scope() {
    let site = site();

    for label in ["first", "second"] {
        let scope = RequestScope::new(label);
        pages::articles_index(&site.fetchers, &scope, ArticlesQuery::default())
            .await
            .unwrap();
        scope.finish();
    }

    assert_eq!(site.store_calls()["categories"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_article_detail_is_served_from_cache_on_revisit() {
    let site = site();
    let slug = first_slug(&site);

    let first = pages::article_detail(&site.fetchers, &slug)
        .await
        .unwrap()
        .unwrap();
    let second = pages::article_detail(&site.fetchers, &slug)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.article.id, second.article.id);
    assert_eq!(first.related, second.related);
    assert!(first.related.len() <= 4);

    let calls = site.store_calls();
    assert_eq!(calls["find_article_by_slug"], 1);
    assert_eq!(calls["find_related"], 1);
    // Comments and views always reach the store.
    assert_eq!(calls["find_comments"], 2);
    assert_eq!(calls["increment_view_count"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_article_detail_missing_slug() {
    let site = site();

    let page = pages::article_detail(&site.fetchers, "no-such-article")
        .await
        .unwrap();

    assert!(page.is_none());
    assert!(!site.store_calls().contains_key("find_comments"));
}

#[tokio::test(start_paused = true)]
async fn test_article_detail_survives_view_count_failure() {
    let site = site();
    let slug = first_slug(&site);
    site.store.fail_method("increment_view_count", "views offline");

    let page = pages::article_detail(&site.fetchers, &slug).await.unwrap();

    assert!(page.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_renders_in_one_delay() {
    let site = site();
    let scope = RequestScope::new("GET /dashboard");

    let started = Instant::now();
    let page = pages::dashboard(&site.fetchers, &scope).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(160));
    assert_eq!(page.top_articles, page.top_articles_widget);

    let calls = site.store_calls();
    assert_eq!(calls["analytics"], 1);
    assert_eq!(calls["top_articles"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_home_page() {
    let site = site();
    let scope = RequestScope::new("GET /");

    let page = pages::home(&site.fetchers, &scope).await.unwrap();

    assert_eq!(page.categories.len(), 5);
    assert_eq!(page.trending.len(), 5);
    assert!(!page.popular.is_empty());
    assert!(
        page.trending
            .windows(2)
            .all(|pair| pair[0].views >= pair[1].views)
    );
}

#[tokio::test(start_paused = true)]
async fn test_search_page_reports_validation_errors() {
    let site = site();

    let page = pages::search(&site.fetchers, "x", None).await.unwrap();

    match page {
        SearchPage::Invalid { errors } => assert_eq!(errors.len(), 1),
        other => panic!("expected validation errors, got {other:?}"),
    }
    assert!(!site.store_calls().contains_key("search"));
}

#[tokio::test(start_paused = true)]
async fn test_search_page_serializes_with_status() {
    let site = site();

    let page = pages::search(&site.fetchers, "react", None).await.unwrap();
    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["status"], "results");
    assert_eq!(json["query"], "react");
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_fails_the_page() {
    let site = site();
    site.store.fail_method("categories", "database unavailable");
    let scope = RequestScope::new("GET /dedup-demo");

    let result = pages::dedup_demo(&site.fetchers, &scope).await;

    assert!(result.is_err());
}
