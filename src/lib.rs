pub mod app;
pub mod cache;
pub mod config;
pub mod errors;
pub mod filter;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod source;
pub mod stats;
pub mod ui;
pub mod state;

pub use app::router;
pub use cache::{SubscriptionCache, SystemClock};
pub use config::Config;
pub use source::HttpSource;
pub use state::AppState;
