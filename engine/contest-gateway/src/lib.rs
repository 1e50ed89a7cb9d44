//! Contest gateway service library
//!
//! Configuration, logging, signal handling, service wiring and the REST
//! routes in front of the contest engine.

pub mod config;
pub mod logging;
pub mod routes;
pub mod seed;
pub mod signals;
pub mod state;

pub use config::{load_config, GatewayConfig};
pub use logging::initialize_logging;
pub use routes::create_routes;
pub use signals::setup_signal_handlers;
pub use state::AppState;
