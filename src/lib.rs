pub mod apis;
pub mod arguments;
pub mod batch;
pub mod cache;
pub mod config;
pub mod errors; // Structured error handling
pub mod gateway;
pub mod logger;
pub mod services;
pub mod stream;
pub mod types;
