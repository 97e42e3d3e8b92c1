pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod stats;
pub mod store;
pub mod validation;

pub use config::Config;
pub use store::{Snapshot, Store, StoreError};
