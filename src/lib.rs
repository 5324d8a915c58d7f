pub mod config;
pub mod error;
pub mod logging;
pub mod relay;
pub mod routes;
pub mod state;
