use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of position kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    Root,
    Institute,
    School,
    Department,
    Teacher,
}

impl PositionKind {
    pub const ALL: [PositionKind; 5] = [
        PositionKind::Root,
        PositionKind::Institute,
        PositionKind::School,
        PositionKind::Department,
        PositionKind::Teacher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionKind::Root => "root",
            PositionKind::Institute => "institute",
            PositionKind::School => "school",
            PositionKind::Department => "department",
            PositionKind::Teacher => "teacher",
        }
    }

    /// Structural kinds must be unique by (name, kind); teachers are not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, PositionKind::Teacher)
    }
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PositionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Invalid position type '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: PositionKind,
    pub parent_id: Option<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn is_root(&self) -> bool {
        self.kind == PositionKind::Root
    }
}

/// Validated input for a new position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPosition {
    pub name: String,
    pub description: Option<String>,
    pub kind: PositionKind,
    pub parent_id: Option<Uuid>,
    pub is_public: bool,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<PositionKind>,
    pub parent_id: Option<Uuid>,
    pub is_public: Option<bool>,
}

/// A position with its direct children only
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionWithChildren {
    #[serde(flatten)]
    pub position: Position,
    pub children: Vec<Position>,
}

/// Fully nested view, used for the recursive tree
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub position: Position,
    pub children: Vec<TreeNode>,
}

/// What anonymous callers may see of a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPositionView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Position> for PublicPositionView {
    fn from(position: &Position) -> Self {
        Self {
            id: position.id,
            name: position.name.clone(),
            description: position.description.clone(),
            created_at: position.created_at,
        }
    }
}

/// Row shape of the `positions` table
#[derive(Debug, Clone, FromRow)]
pub struct PositionRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub parent_id: Option<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PositionRow> for Position {
    type Error = String;

    fn try_from(row: PositionRow) -> Result<Self, Self::Error> {
        Ok(Position {
            id: row.id,
            name: row.name,
            description: row.description,
            kind: row.kind.parse()?,
            parent_id: row.parent_id,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
