//! Seeded mock data for the in-memory store.
//!
//! Everything is drawn from one `StdRng`, so a given seed always yields the
//! same articles, comments and analytics relative to the anchor time.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use fake::Fake;
use fake::faker::lorem::en::{Sentence, Words};
use fake::faker::name::en::Name;
use pressroom::domain::{
    AnalyticsMetrics, Article, Author, Category, Comment, Referrer, ViewMetric,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const FEATURED_ARTICLES: usize = 3;
const MAX_COMMENTS_PER_ARTICLE: usize = 10;
const ANALYTICS_DAYS: i64 = 30;

const AUTHOR_ROLES: [&str; 4] = [
    "Senior Developer",
    "Frontend Developer",
    "Backend Developer",
    "DevOps Engineer",
];

const CATEGORIES: [(&str, &str, &str); 5] = [
    ("Next.js", "nextjs", "blue"),
    ("TypeScript", "typescript", "indigo"),
    ("React", "react", "cyan"),
    ("Performance", "performance", "green"),
    ("Testing", "testing", "purple"),
];

const TITLE_TEMPLATES: [&str; 10] = [
    "The complete guide to {category}, from basics to advanced",
    "Building a {feature} with {category}",
    "{category} best practices for {year}",
    "{category} for absolute beginners",
    "Applying the {pattern} pattern in {category}",
    "{category} performance tuning techniques",
    "Solving {problem} in {category}",
    "Shipping a {project} on {category}",
    "Everything new in {category}",
    "A testing strategy for {category}",
];

const FEATURES: [&str; 8] = [
    "real-time chat",
    "dashboard",
    "storefront",
    "blog engine",
    "task manager",
    "social feed",
    "image gallery",
    "calendar app",
];

const PATTERNS: [&str; 6] = [
    "composition",
    "rendering",
    "data fetching",
    "state management",
    "error handling",
    "caching",
];

const PROBLEMS: [&str; 6] = [
    "performance regressions",
    "SEO gaps",
    "accessibility issues",
    "security holes",
    "scaling limits",
    "memory leaks",
];

const PROJECTS: [&str; 6] = [
    "SaaS product",
    "corporate site",
    "portfolio",
    "online store",
    "documentation site",
    "landing page",
];

const TAGS: [&str; 6] = [
    "beginner",
    "intermediate",
    "advanced",
    "tips",
    "hands-on",
    "deep-dive",
];

const COMMENT_AUTHORS: [&str; 7] = [
    "Anonymous",
    "Next.js newcomer",
    "Frontend engineer",
    "Backend engineer",
    "Full-stack developer",
    "Student developer",
    "Veteran engineer",
];

const REFERRERS: [(&str, u64, u64); 5] = [
    ("Google", 1000, 3000),
    ("Twitter", 500, 1500),
    ("GitHub", 300, 800),
    ("Direct", 200, 600),
    ("Others", 100, 300),
];

/// Everything the mock store serves.
#[derive(Clone, Debug)]
pub struct MockData {
    pub authors: Vec<Author>,
    pub categories: Vec<Category>,
    pub articles: Vec<Article>,
    pub comments: Vec<Comment>,
    pub analytics: AnalyticsMetrics,
}

pub struct MockDataGenerator {
    rng: StdRng,
    anchor: DateTime<Utc>,
}

impl MockDataGenerator {
    pub fn new(seed: u64, anchor: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            anchor,
        }
    }

    pub fn generate(&mut self, article_count: usize) -> MockData {
        let authors = self.authors();
        let categories = categories();
        let articles = self.articles(article_count, &authors, &categories);
        let comments = self.comments(article_count);
        let analytics = self.analytics();

        MockData {
            authors,
            categories,
            articles,
            comments,
            analytics,
        }
    }

    fn authors(&mut self) -> Vec<Author> {
        AUTHOR_ROLES
            .iter()
            .enumerate()
            .map(|(i, role)| {
                let name: String = Name().fake_with_rng(&mut self.rng);
                let handle = slugify(&name);
                Author {
                    id: format!("author-{}", i + 1),
                    avatar: format!("/avatars/{handle}.jpg"),
                    bio: Sentence(6..12).fake_with_rng(&mut self.rng),
                    role: role.to_string(),
                    name,
                }
            })
            .collect()
    }

    /// Newest first, the first few generated are featured.
    fn articles(
        &mut self,
        count: usize,
        authors: &[Author],
        categories: &[Category],
    ) -> Vec<Article> {
        let mut articles: Vec<Article> = (1..=count)
            .map(|i| self.article(i, authors, categories))
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles
    }

    fn article(&mut self, i: usize, authors: &[Author], categories: &[Category]) -> Article {
        let category = self.pick(categories).clone();
        let author = self.pick(authors).clone();
        let published_at = self.date_within(90);

        let title = self
            .pick(&TITLE_TEMPLATES)
            .replace("{category}", &category.name)
            .replace("{feature}", *self.pick(&FEATURES))
            .replace("{pattern}", *self.pick(&PATTERNS))
            .replace("{problem}", *self.pick(&PROBLEMS))
            .replace("{project}", *self.pick(&PROJECTS))
            .replace("{year}", "2024");

        let mut tags: Vec<String> = TAGS.iter().map(|t| t.to_string()).collect();
        tags.shuffle(&mut self.rng);
        tags.truncate(self.rng.random_range(2..=4));

        Article {
            id: format!("article-{i}"),
            slug: format!("{}-{i}", slugify(&title)),
            excerpt: format!(
                "An in-depth look at {}. Useful whether you are just starting out or already shipping.",
                title.to_lowercase()
            ),
            content: self.content(&title, &category.name),
            updated_at: published_at + ChronoDuration::days(self.rng.random_range(0..=7)),
            published_at,
            view_count: self.rng.random_range(100..=10_000),
            like_count: self.rng.random_range(10..=500),
            comment_count: self.rng.random_range(0..=50),
            reading_time: self.rng.random_range(3..=15),
            featured: i <= FEATURED_ARTICLES,
            title,
            author,
            category,
            tags,
        }
    }

    fn content(&mut self, title: &str, category: &str) -> String {
        let sections = self.rng.random_range(3..=6);
        let mut content = format!("# {title}\n\nThis article walks through {category} in detail.\n\n");

        for section in 1..=sections {
            let heading: Vec<String> = Words(2..5).fake_with_rng(&mut self.rng);
            content.push_str(&format!("## {section}. {category}: {}\n\n", heading.join(" ")));
            let paragraph: String = Sentence(12..24).fake_with_rng(&mut self.rng);
            content.push_str(&paragraph);
            content.push_str("\n\n");
            if self.rng.random_bool(0.5) {
                content.push_str("```rust\nlet cached = fetchers.article(slug).await?;\n```\n\n");
            }
        }

        content.push_str(&format!(
            "## Wrapping up\n\nThat covers the essentials of {category}.\n"
        ));
        content
    }

    /// Between zero and ten comments for each article id, newest first.
    fn comments(&mut self, article_count: usize) -> Vec<Comment> {
        let mut comments = Vec::new();
        for article in 1..=article_count {
            let count = self.rng.random_range(0..=MAX_COMMENTS_PER_ARTICLE);
            for i in 0..count {
                comments.push(Comment {
                    id: format!("comment-{article}-{i}"),
                    article_id: format!("article-{article}"),
                    author: self.pick(&COMMENT_AUTHORS).to_string(),
                    content: Sentence(4..14).fake_with_rng(&mut self.rng),
                    created_at: self.date_within(30),
                    likes: self.rng.random_range(0..=20),
                });
            }
        }
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        comments
    }

    fn analytics(&mut self) -> AnalyticsMetrics {
        let views_by_date: Vec<ViewMetric> = (0..ANALYTICS_DAYS)
            .rev()
            .map(|days_ago| ViewMetric {
                date: (self.anchor - ChronoDuration::days(days_ago))
                    .format("%Y-%m-%d")
                    .to_string(),
                views: self.rng.random_range(1000..=5000),
                unique_views: self.rng.random_range(500..=2500),
            })
            .collect();

        let counts: Vec<(&str, u64)> = REFERRERS
            .iter()
            .map(|&(source, min, max)| (source, self.rng.random_range(min..=max)))
            .collect();
        let total: u64 = counts.iter().map(|(_, count)| count).sum();
        let top_referrers = counts
            .into_iter()
            .map(|(source, count)| Referrer {
                source: source.to_string(),
                count,
                percentage: ((count as f64 / total as f64) * 100.0).round() as u32,
            })
            .collect();

        AnalyticsMetrics {
            total_views: views_by_date.iter().map(|d| d.views).sum(),
            unique_visitors: views_by_date.iter().map(|d| d.unique_views).sum(),
            avg_session_duration: self.rng.random_range(120..=300),
            bounce_rate: self.rng.random_range(30..=70),
            top_referrers,
            views_by_date,
        }
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        // every pool is a non-empty constant or the fixed author/category lists
        &items[self.rng.random_range(0..items.len())]
    }

    fn date_within(&mut self, days: i64) -> DateTime<Utc> {
        let date = self.anchor - ChronoDuration::days(self.rng.random_range(0..=days));
        let hour = self.rng.random_range(0..24);
        let minute = self.rng.random_range(0..60);
        date.with_hour(hour)
            .and_then(|d| d.with_minute(minute))
            .unwrap_or(date)
    }
}

pub fn categories() -> Vec<Category> {
    CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, &(name, slug, color))| Category {
            id: format!("cat-{}", i + 1),
            name: name.to_string(),
            slug: slug.to_string(),
            description: format!("Articles about {name}"),
            color: color.to_string(),
        })
        .collect()
}

/// Lowercase, with every run of non-alphanumerics collapsed to one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
