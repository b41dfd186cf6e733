//! Store adapter: typed reads and writes over the engine tables.

pub mod repository;
pub mod types;

pub use repository::Store;
pub use types::*;
