mod error;
pub use error::{ApiError, ServerError};

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::DispatcherApiAdapter;

mod directory;
pub use directory::ScriptDirectory;

mod http;
pub use http::{DEFAULT_PREFIX, HttpApi};

mod config;
pub use config::GatewayConfig;

mod server;
pub use server::HttpGateway;

pub use axum;
