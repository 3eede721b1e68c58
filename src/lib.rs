pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
