pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod resolver;
pub mod state;
pub mod store;
