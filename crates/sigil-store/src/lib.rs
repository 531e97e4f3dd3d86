pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use store::SqliteStore;
