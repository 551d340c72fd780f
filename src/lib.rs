pub mod capacity;
pub mod client;
pub mod constants;
pub mod drive;
pub mod error;
pub mod history;
pub mod log;
pub mod storage;
pub mod topic;
pub mod types;
pub mod version;

pub use error::{Error, Result};
