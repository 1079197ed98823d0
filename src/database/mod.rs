pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager, Stores};
pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use store::{PositionPage, PositionStore, PositionTx, StoreError, StoreResult, UserStore};
