pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod observability;
pub mod storage;

pub use config::Config;
pub use domain::*;
pub use engine::{TransferEngine, TransferResult};
pub use storage::Store;
