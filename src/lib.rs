pub mod aggregator;
pub mod config;
pub mod counter;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod queue;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod service;
pub mod store;

pub use aggregator::{Aggregator, AggregatorHandle};
pub use config::Config;
pub use error::{ClickError, Result};
pub use handlers::AppState;
pub use rate_limiter::{Decision, RateLimitSettings, RateLimiter};
pub use server::{create_app, Server};
pub use service::ClickService;
