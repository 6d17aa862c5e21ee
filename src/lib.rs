//! Library crate for backend-locator: find the study-coach backend on a local network.
pub mod cache;
pub mod config;
pub mod hint;
pub mod locator;
pub mod netdetect;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod session;
pub mod subnet;
pub mod types;
