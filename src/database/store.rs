//! Persistence seam for the hierarchy engine.
//!
//! Reads that do not feed a write go straight to the store. Every
//! check-then-write sequence runs through a [`PositionTx`], which the backend
//! guarantees is isolated from other writers until it commits.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Position, PositionKind, User};

/// Constraint names shared by the backends so violations map back to invariants
pub mod constraints {
    pub const SINGLE_ROOT: &str = "positions_single_root";
    pub const STRUCTURAL_NAME_KIND: &str = "positions_structural_name_kind";
    pub const PARENT_FK: &str = "positions_parent_id_fkey";
    pub const ROOT_HAS_NO_PARENT: &str = "positions_root_parent_check";
    pub const USERNAME_UNIQUE: &str = "users_username_key";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    #[error("transaction could not be serialized")]
    Contention,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of positions plus the total row count
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPage {
    pub data: Vec<Position>,
    pub total: i64,
}

/// Store for position records.
///
/// Listing methods return rows ordered by `(created_at, id)` unless noted.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Start an isolated read-write unit of work
    async fn begin(&self) -> StoreResult<Box<dyn PositionTx>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Position>>;

    /// First position carrying this name, in creation order
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Position>>;

    async fn children_of(&self, parent_id: Uuid) -> StoreResult<Vec<Position>>;

    async fn page(&self, offset: i64, limit: i64) -> StoreResult<PositionPage>;

    async fn list_all(&self) -> StoreResult<Vec<Position>>;

    /// Public positions, newest first
    async fn list_public(&self) -> StoreResult<Vec<Position>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Unit of work over positions. Writes become visible to others on commit;
/// dropping without commit discards them.
#[async_trait]
pub trait PositionTx: Send {
    async fn get(&mut self, id: Uuid) -> StoreResult<Option<Position>>;

    async fn find_root(&mut self) -> StoreResult<Option<Position>>;

    async fn find_by_name_and_kind(
        &mut self,
        name: &str,
        kind: PositionKind,
    ) -> StoreResult<Option<Position>>;

    async fn children_of(&mut self, parent_id: Uuid) -> StoreResult<Vec<Position>>;

    async fn insert(&mut self, position: &Position) -> StoreResult<()>;

    async fn update(&mut self, position: &Position) -> StoreResult<()>;

    async fn delete(&mut self, id: Uuid) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Store for login accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;
}
