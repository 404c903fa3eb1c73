pub mod db;
pub mod error;
pub mod manager;

pub use error::{Result, StoreError};
pub use manager::HistoryStore;
