pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
