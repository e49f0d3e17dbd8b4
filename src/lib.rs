pub mod agent;
pub mod artifact;
pub mod cli;
pub mod collector;
pub mod commit;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod retry;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod store;
