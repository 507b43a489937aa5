pub mod app;
pub mod config;
pub mod credentials;
pub mod metrics;
pub mod pg;
pub mod session_handlers;

pub use app::{router, AppState};
