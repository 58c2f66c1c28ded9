pub mod adherence;
pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod paths;
pub mod resolver;
pub mod scheduler;
pub mod storage;
pub mod task_api;
