//! In-memory backing store for the article site.

pub mod generators;
pub mod mock_db;

pub use generators::{MockData, MockDataGenerator};
pub use mock_db::MockDatabase;
