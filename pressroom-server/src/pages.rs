//! Page compositions.
//!
//! Each function renders the data one page needs as a plain view model.
//! Request-scoped fetchers receive the caller's [`RequestScope`], so
//! independent widgets on the same page that ask for the same data share a
//! single store call.

use pressroom::domain::{
    AnalyticsMetrics, Article, Category, CategoryStat, Comment, DashboardOptions, Page,
    RankedArticle,
};
use pressroom::facade::fetchers::{
    DEFAULT_POPULAR_LIMIT, DEFAULT_RELATED_LIMIT, DEFAULT_TOP_ARTICLES_LIMIT,
    DEFAULT_TRENDING_LIMIT,
};
use pressroom::{ArticleFetchers, RequestScope};
use serde::Serialize;
use shared::{Error, Result};
use tracing::{debug, warn};

/// What a listing shows for one article.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArticleCard {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub category: String,
    pub author: String,
    pub views: u64,
}

impl From<&Article> for ArticleCard {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            slug: article.slug.clone(),
            title: article.title.clone(),
            category: article.category.name.clone(),
            author: article.author.name.clone(),
            views: article.view_count,
        }
    }
}

fn cards(articles: &[Article]) -> Vec<ArticleCard> {
    articles.iter().map(ArticleCard::from).collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct HomePage {
    pub categories: Vec<Category>,
    pub trending: Vec<ArticleCard>,
    pub popular: Vec<ArticleCard>,
}

pub async fn home(fetchers: &ArticleFetchers, scope: &RequestScope) -> Result<HomePage> {
    let (categories, trending, popular) = futures::try_join!(
        fetchers.categories(scope),
        fetchers.trending_articles(DEFAULT_TRENDING_LIMIT),
        fetchers.popular_articles(DEFAULT_POPULAR_LIMIT)
    )?;

    Ok(HomePage {
        categories,
        trending: cards(&trending),
        popular: cards(&popular),
    })
}

#[derive(Clone, Debug, Default)]
pub struct ArticlesQuery {
    pub page: Option<usize>,
    pub category: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryFilter {
    pub categories: Vec<Category>,
    pub stats: Vec<CategoryStat>,
    pub selected: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArticlesIndexPage {
    pub articles: Vec<ArticleCard>,
    pub current_page: usize,
    pub total_pages: u64,
    pub total_count: u64,
    pub filter: CategoryFilter,
    /// Sidebar widget; asks for the same data as the filter.
    pub stats_widget: Vec<CategoryStat>,
}

/// The article listing: list, category filter and stats widget render
/// concurrently, and the filter and widget coalesce on the same fetches.
pub async fn articles_index(
    fetchers: &ArticleFetchers,
    scope: &RequestScope,
    query: ArticlesQuery,
) -> Result<ArticlesIndexPage> {
    let page = Page {
        page: query.page.unwrap_or(1).max(1),
        ..Page::default()
    };
    let selected = query.category.as_deref();

    let list = async {
        match selected {
            Some(slug) => futures::try_join!(
                fetchers.articles_by_category(scope, slug, page),
                fetchers.total_article_count(scope, Some(slug))
            ),
            None => futures::try_join!(
                fetchers.articles_with_pagination(scope, page),
                fetchers.total_article_count(scope, None)
            ),
        }
    };
    let filter = async {
        futures::try_join!(fetchers.categories(scope), fetchers.category_stats(scope))
    };
    let widget = async {
        futures::try_join!(fetchers.categories(scope), fetchers.category_stats(scope))
    };

    let ((articles, total_count), (categories, stats), (_, stats_widget)) =
        futures::try_join!(list, filter, widget)?;

    Ok(ArticlesIndexPage {
        articles: cards(&articles),
        current_page: page.page,
        total_pages: total_count.div_ceil(page.limit as u64),
        total_count,
        filter: CategoryFilter {
            categories,
            stats,
            selected: query.category,
        },
        stats_widget,
    })
}

#[derive(Clone, Debug, Serialize)]
pub struct ArticleDetailPage {
    pub article: Article,
    pub comments: Vec<Comment>,
    pub related: Vec<ArticleCard>,
}

/// A single article with its comments and related articles, or `None` when
/// no article has that slug.
pub async fn article_detail(
    fetchers: &ArticleFetchers,
    slug: &str,
) -> Result<Option<ArticleDetailPage>> {
    let Some(article) = fetchers.article(slug).await? else {
        debug!(slug, "article not found");
        return Ok(None);
    };

    let (comments, related) = futures::try_join!(
        fetchers.comments(&article.id),
        fetchers.related_articles(&article.id, DEFAULT_RELATED_LIMIT)
    )?;

    if let Err(e) = fetchers.increment_view_count(&article.id).await {
        warn!("Failed to record view for {}: {}", article.id, e);
    }

    Ok(Some(ArticleDetailPage {
        related: cards(&related),
        article,
        comments,
    }))
}

#[derive(Clone, Debug, Serialize)]
pub struct DashboardPage {
    pub analytics: AnalyticsMetrics,
    pub top_articles: Vec<RankedArticle>,
    /// Rendered separately beside the combined panel.
    pub top_articles_widget: Vec<RankedArticle>,
}

pub async fn dashboard(fetchers: &ArticleFetchers, scope: &RequestScope) -> Result<DashboardPage> {
    let options = DashboardOptions::default();
    let (data, top_articles_widget) = futures::try_join!(
        fetchers.dashboard_data(scope, options),
        fetchers.top_articles(
            scope,
            DEFAULT_TOP_ARTICLES_LIMIT,
            Some(options.top_articles_delay)
        )
    )?;

    Ok(DashboardPage {
        analytics: data.analytics,
        top_articles: data.top_articles,
        top_articles_widget,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DemoPanel {
    /// Category counts seen by each of the three category calls.
    pub category_counts: [usize; 3],
    /// Stat counts seen by each of the two stats calls.
    pub stat_counts: [usize; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DedupDemoPage {
    pub with_dedupe: DemoPanel,
    pub without_dedupe: DemoPanel,
}

/// Issues the same category fetches three and two times, once through the
/// request-scoped fetchers and once through their pass-through twins.
pub async fn dedup_demo(fetchers: &ArticleFetchers, scope: &RequestScope) -> Result<DedupDemoPage> {
    let with_dedupe = async {
        let (c1, c2, c3, s1, s2) = futures::try_join!(
            fetchers.categories(scope),
            fetchers.categories(scope),
            fetchers.categories(scope),
            fetchers.category_stats(scope),
            fetchers.category_stats(scope)
        )?;
        Ok::<_, Error>(DemoPanel {
            category_counts: [c1.len(), c2.len(), c3.len()],
            stat_counts: [s1.len(), s2.len()],
        })
    };
    let without_dedupe = async {
        let (c1, c2, c3, s1, s2) = futures::try_join!(
            fetchers.categories_no_dedupe(),
            fetchers.categories_no_dedupe(),
            fetchers.categories_no_dedupe(),
            fetchers.category_stats_no_dedupe(),
            fetchers.category_stats_no_dedupe()
        )?;
        Ok::<_, Error>(DemoPanel {
            category_counts: [c1.len(), c2.len(), c3.len()],
            stat_counts: [s1.len(), s2.len()],
        })
    };

    let (with_dedupe, without_dedupe) = futures::try_join!(with_dedupe, without_dedupe)?;
    Ok(DedupDemoPage {
        with_dedupe,
        without_dedupe,
    })
}

/// Search results, or the validation messages for a rejected query.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchPage {
    Results {
        query: String,
        category: Option<String>,
        total: usize,
        articles: Vec<ArticleCard>,
    },
    Invalid {
        errors: Vec<String>,
    },
}

pub async fn search(
    fetchers: &ArticleFetchers,
    query: &str,
    category: Option<&str>,
) -> Result<SearchPage> {
    match fetchers.search_articles(query, category).await {
        Ok(results) => Ok(SearchPage::Results {
            articles: cards(&results.articles),
            query: results.query,
            category: results.category,
            total: results.total,
        }),
        Err(Error::Validation(message)) => Ok(SearchPage::Invalid {
            errors: vec![message],
        }),
        Err(e) => Err(e),
    }
}
