pub mod pages;
pub mod state;

pub use state::SiteState;
