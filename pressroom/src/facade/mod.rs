//! The data fetchers pages call, and the table binding each one to a
//! caching plane.

pub mod bindings;
pub mod fetchers;

pub use bindings::{Binding, BindingRow, Fetcher, binding_table};
pub use fetchers::ArticleFetchers;
