pub mod clock;
pub mod config;
pub mod error;
pub mod invoice;
pub mod issuance;
pub mod ledger;
pub mod logging;
pub mod obligation;
pub mod penalty;
pub mod policy;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
