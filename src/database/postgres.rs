//! PostgreSQL backend.
//!
//! Mutations run in SERIALIZABLE transactions. The schema carries the
//! hierarchy invariants as constraints too, so a racing writer that slips
//! past the engine's checks is still rejected by the database.

use async_trait::async_trait;
use sqlx::postgres::{PgExecutor, Postgres};
use sqlx::{PgPool, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Position, PositionKind, PositionRow, User};
use crate::database::store::{
    constraints, PositionPage, PositionStore, PositionTx, StoreError, StoreResult, UserStore,
};

const COLUMNS: &str = "id, name, description, kind, parent_id, is_public, created_at, updated_at";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS positions (
        id          UUID PRIMARY KEY,
        name        VARCHAR(255) NOT NULL CHECK (length(btrim(name)) > 0),
        description TEXT,
        kind        VARCHAR(50) NOT NULL
                    CHECK (kind IN ('root', 'institute', 'school', 'department', 'teacher')),
        parent_id   UUID,
        is_public   BOOLEAN NOT NULL DEFAULT FALSE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT positions_parent_id_fkey
            FOREIGN KEY (parent_id) REFERENCES positions (id) ON DELETE RESTRICT,
        CONSTRAINT positions_root_parent_check
            CHECK ((kind = 'root') = (parent_id IS NULL))
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS positions_single_root ON positions ((kind)) WHERE kind = 'root'",
    "CREATE UNIQUE INDEX IF NOT EXISTS positions_structural_name_kind ON positions (name, kind) WHERE kind <> 'teacher'",
    "CREATE INDEX IF NOT EXISTS positions_parent_id_idx ON positions (parent_id)",
    "CREATE INDEX IF NOT EXISTS positions_created_at_idx ON positions (created_at, id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        username      VARCHAR(255) NOT NULL,
        password_hash TEXT NOT NULL,
        roles         TEXT[] NOT NULL DEFAULT '{}',
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT users_username_key UNIQUE (username)
    )
    "#,
];

/// Map a Postgres SQLSTATE to the store error it represents
fn classify(code: Option<&str>, constraint: Option<&str>) -> Option<StoreError> {
    let constraint = constraint.unwrap_or_default().to_string();
    match code? {
        "23505" => Some(StoreError::UniqueViolation(constraint)),
        "23503" => Some(StoreError::ForeignKeyViolation(constraint)),
        "23514" => Some(StoreError::CheckViolation(constraint)),
        "40001" | "40P01" => Some(StoreError::Contention),
        _ => None,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if let Some(mapped) = classify(db.code().as_deref(), db.constraint()) {
                return mapped;
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

fn into_position(row: PositionRow) -> StoreResult<Position> {
    Position::try_from(row).map_err(StoreError::Corrupt)
}

fn into_positions(rows: Vec<PositionRow>) -> StoreResult<Vec<Position>> {
    rows.into_iter().map(into_position).collect()
}

async fn select_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> StoreResult<Option<Position>> {
    let sql = format!("SELECT {COLUMNS} FROM positions WHERE id = $1");
    sqlx::query_as::<_, PositionRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(into_position)
        .transpose()
}

async fn select_children<'e, E: PgExecutor<'e>>(
    executor: E,
    parent_id: Uuid,
) -> StoreResult<Vec<Position>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM positions WHERE parent_id = $1 ORDER BY created_at, id"
    );
    let rows = sqlx::query_as::<_, PositionRow>(&sql)
        .bind(parent_id)
        .fetch_all(executor)
        .await?;
    into_positions(rows)
}

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables, indexes and constraints when missing
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl PositionStore for PgBackend {
    async fn begin(&self) -> StoreResult<Box<dyn PositionTx>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Position>> {
        select_by_id(&self.pool, id).await
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Position>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM positions WHERE name = $1 ORDER BY created_at, id LIMIT 1"
        );
        sqlx::query_as::<_, PositionRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(into_position)
            .transpose()
    }

    async fn children_of(&self, parent_id: Uuid) -> StoreResult<Vec<Position>> {
        select_children(&self.pool, parent_id).await
    }

    async fn page(&self, offset: i64, limit: i64) -> StoreResult<PositionPage> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM positions")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {COLUMNS} FROM positions ORDER BY created_at, id OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, PositionRow>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(PositionPage {
            data: into_positions(rows)?,
            total,
        })
    }

    async fn list_all(&self) -> StoreResult<Vec<Position>> {
        let sql = format!("SELECT {COLUMNS} FROM positions ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, PositionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_positions(rows)
    }

    async fn list_public(&self) -> StoreResult<Vec<Position>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM positions WHERE is_public ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, PositionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_positions(rows)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgBackend {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, roles, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, roles, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PositionTx for PgTx {
    async fn get(&mut self, id: Uuid) -> StoreResult<Option<Position>> {
        select_by_id(&mut *self.tx, id).await
    }

    async fn find_root(&mut self) -> StoreResult<Option<Position>> {
        let sql = format!("SELECT {COLUMNS} FROM positions WHERE kind = 'root' LIMIT 1");
        sqlx::query_as::<_, PositionRow>(&sql)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(into_position)
            .transpose()
    }

    async fn find_by_name_and_kind(
        &mut self,
        name: &str,
        kind: PositionKind,
    ) -> StoreResult<Option<Position>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM positions WHERE name = $1 AND kind = $2 ORDER BY created_at, id LIMIT 1"
        );
        sqlx::query_as::<_, PositionRow>(&sql)
            .bind(name)
            .bind(kind.as_str())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(into_position)
            .transpose()
    }

    async fn children_of(&mut self, parent_id: Uuid) -> StoreResult<Vec<Position>> {
        select_children(&mut *self.tx, parent_id).await
    }

    async fn insert(&mut self, position: &Position) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO positions (id, name, description, kind, parent_id, is_public, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(position.id)
        .bind(&position.name)
        .bind(&position.description)
        .bind(position.kind.as_str())
        .bind(position.parent_id)
        .bind(position.is_public)
        .bind(position.created_at)
        .bind(position.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update(&mut self, position: &Position) -> StoreResult<()> {
        sqlx::query(
            "UPDATE positions
             SET name = $2, description = $3, kind = $4, parent_id = $5, is_public = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(position.id)
        .bind(&position.name)
        .bind(&position.description)
        .bind(position.kind.as_str())
        .bind(position.parent_id)
        .bind(position.is_public)
        .bind(position.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM positions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
