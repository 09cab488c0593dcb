use pressroom::{RequestScope, binding_table};
use pressroom_server::SiteState;
use pressroom_server::pages::{self, ArticlesQuery};
use serde::Serialize;
use shared::config::Config;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Pressroom...");

    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    info!(
        "Generating {} articles with seed {} (revalidation failure: {})",
        config.article_count,
        config.seed,
        config.on_revalidation_failure.as_str()
    );
    let state = SiteState::new(&config);

    println!("Fetcher bindings:");
    for row in binding_table() {
        println!("  {:<28} {}", row.fetcher.name(), row.binding);
    }

    let slug = state
        .store
        .articles()
        .first()
        .map(|article| article.slug.clone())
        .unwrap_or_default();

    {
        let scope = RequestScope::new("home");
        let page = pages::home(&state.fetchers, &scope).await?;
        report(&state, "home", &page, page.trending.len())?;
        scope.finish();
    }
    {
        let scope = RequestScope::new("articles");
        let page = pages::articles_index(&state.fetchers, &scope, ArticlesQuery::default()).await?;
        report(&state, "articles", &page, page.articles.len())?;
        scope.finish();
    }
    {
        let scope = RequestScope::new("dedup-demo");
        let page = pages::dedup_demo(&state.fetchers, &scope).await?;
        report(&state, "dedup-demo", &page, 0)?;
        scope.finish();
    }
    {
        let scope = RequestScope::new("dashboard");
        let started = Instant::now();
        let page = pages::dashboard(&state.fetchers, &scope).await?;
        info!("Dashboard rendered in {:?}", started.elapsed());
        report(&state, "dashboard", &page, page.top_articles.len())?;
        scope.finish();
    }
    // Twice: the second render is served from the timed cache.
    for visit in 1..=2 {
        match pages::article_detail(&state.fetchers, &slug).await? {
            Some(page) => report(&state, &format!("article #{visit}"), &page, page.related.len())?,
            None => warn!("Article {:?} not found", slug),
        }
    }
    for query in ["react", "x"] {
        let page = pages::search(&state.fetchers, query, None).await?;
        report(&state, &format!("search {query:?}"), &page, 0)?;
    }

    println!("Cache stats: {}", serde_json::to_string(&state.timed_cache.stats())?);
    state.shutdown().await;
    info!("Pressroom finished");
    Ok(())
}

/// Print a page summary with the store calls it cost, then reset the log.
fn report<P: Serialize>(
    state: &SiteState,
    name: &str,
    page: &P,
    items: usize,
) -> Result<(), serde_json::Error> {
    let body = serde_json::to_string(page)?;
    println!(
        "{name}: {} bytes, {items} items, store calls {:?}",
        body.len(),
        state.store_calls()
    );
    state.store.clear_request_log();
    Ok(())
}
