pub mod memoize;
pub mod scope;

pub use memoize::{memoize, Memoized};
pub use scope::RequestScope;
