use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{
    NewPosition, Position, PositionKind, PositionPatch, PositionWithChildren, PublicPositionView,
    TreeNode,
};
use crate::database::store::{constraints, PositionPage, PositionStore, PositionTx, StoreError};
use crate::services::tree;

/// Longest accepted position name, matching the column width
pub const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("A root position already exists.")]
    DuplicateRoot,

    #[error("Position \"{name}\" of type \"{kind}\" already exists.")]
    DuplicateName { name: String, kind: PositionKind },

    #[error("Cannot delete a position that has child positions.")]
    HasChildren,

    #[error("Cannot create a cyclic hierarchy.")]
    CyclicHierarchy,

    #[error("The hierarchy was modified concurrently, retry the request.")]
    Contention,

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl HierarchyError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            HierarchyError::DuplicateRoot
                | HierarchyError::DuplicateName { .. }
                | HierarchyError::HasChildren
                | HierarchyError::CyclicHierarchy
                | HierarchyError::Contention
        )
    }
}

impl From<StoreError> for HierarchyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Contention => HierarchyError::Contention,
            other => HierarchyError::Store(other),
        }
    }
}

pub type HierarchyResult<T> = Result<T, HierarchyError>;

fn position_not_found() -> HierarchyError {
    HierarchyError::NotFound("Position not found".to_string())
}

fn parent_not_found() -> HierarchyError {
    HierarchyError::NotFound("Parent position not found".to_string())
}

/// Translate a constraint the database caught into the invariant it guards
fn write_error(err: StoreError, candidate: &Position) -> HierarchyError {
    match err {
        StoreError::UniqueViolation(ref c) if c == constraints::SINGLE_ROOT => HierarchyError::DuplicateRoot,
        StoreError::UniqueViolation(ref c) if c == constraints::STRUCTURAL_NAME_KIND => {
            HierarchyError::DuplicateName {
                name: candidate.name.clone(),
                kind: candidate.kind,
            }
        }
        StoreError::ForeignKeyViolation(ref c) if c == constraints::PARENT_FK => parent_not_found(),
        StoreError::CheckViolation(ref c) if c == constraints::ROOT_HAS_NO_PARENT => {
            HierarchyError::Validation(root_parent_message(candidate.kind).to_string())
        }
        other => other.into(),
    }
}

fn root_parent_message(kind: PositionKind) -> &'static str {
    if kind == PositionKind::Root {
        "Root position must have parentId as null."
    } else {
        "Non-root positions must have a valid parentId."
    }
}

/// Trimmed, non-empty, bounded name
pub fn normalize_name(raw: &str) -> HierarchyResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(HierarchyError::Validation("Position name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(HierarchyError::Validation(format!(
            "Position name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// Reject a parent reference that contradicts the kind.
pub fn check_parent_shape(kind: PositionKind, parent_id: Option<Uuid>) -> HierarchyResult<()> {
    match (kind == PositionKind::Root, parent_id.is_some()) {
        (true, true) | (false, false) => {
            Err(HierarchyError::Validation(root_parent_message(kind).to_string()))
        }
        _ => Ok(()),
    }
}

async fn ensure_unique_name(
    tx: &mut dyn PositionTx,
    name: &str,
    kind: PositionKind,
    exclude: Option<Uuid>,
) -> HierarchyResult<()> {
    if !kind.is_structural() {
        return Ok(());
    }
    if let Some(existing) = tx.find_by_name_and_kind(name, kind).await? {
        if Some(existing.id) != exclude {
            warn!("Rejected duplicate {} name '{}'", kind, name);
            return Err(HierarchyError::DuplicateName {
                name: name.to_string(),
                kind,
            });
        }
    }
    Ok(())
}

/// Walk up from `candidate_parent`; true when `id` is on the chain.
///
/// A dangling parent reference or a node seen twice ends the walk.
async fn creates_cycle(
    tx: &mut dyn PositionTx,
    candidate_parent: Position,
    id: Uuid,
) -> HierarchyResult<bool> {
    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent);

    while let Some(node) = cursor {
        if node.id == id {
            return Ok(true);
        }
        if !visited.insert(node.id) {
            warn!("Parent chain revisits position {}; stopping walk", node.id);
            break;
        }
        cursor = match node.parent_id {
            Some(parent_id) => tx.get(parent_id).await?,
            None => None,
        };
    }
    Ok(false)
}

/// The hierarchy engine. Holds no state of its own; every mutation is one
/// store transaction covering its checks and its write.
#[derive(Clone)]
pub struct PositionService {
    store: Arc<dyn PositionStore>,
    max_tree_depth: usize,
}

impl PositionService {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self {
            store,
            max_tree_depth: tree::DEFAULT_MAX_DEPTH,
        }
    }

    /// Cap on nesting levels returned by `find_all_nested`
    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    /// A second root is a conflict whatever else the input carries
    pub async fn create(&self, input: NewPosition) -> HierarchyResult<Position> {
        let mut tx = self.store.begin().await?;

        if input.kind == PositionKind::Root && tx.find_root().await?.is_some() {
            warn!("Rejected second root position '{}'", input.name);
            return Err(HierarchyError::DuplicateRoot);
        }

        let name = normalize_name(&input.name)?;
        check_parent_shape(input.kind, input.parent_id)?;
        ensure_unique_name(tx.as_mut(), &name, input.kind, None).await?;

        if let Some(parent_id) = input.parent_id {
            if tx.get(parent_id).await?.is_none() {
                return Err(parent_not_found());
            }
        }

        let now = Utc::now();
        let position = Position {
            id: Uuid::new_v4(),
            name,
            description: input.description,
            kind: input.kind,
            parent_id: input.parent_id,
            is_public: input.is_public,
            created_at: now,
            updated_at: now,
        };

        tx.insert(&position)
            .await
            .map_err(|e| write_error(e, &position))?;
        tx.commit().await.map_err(|e| write_error(e, &position))?;

        info!("Created {} position {} ('{}')", position.kind, position.id, position.name);
        Ok(position)
    }

    pub async fn update(&self, id: Uuid, patch: PositionPatch) -> HierarchyResult<Position> {
        let mut tx = self.store.begin().await?;
        let current = tx.get(id).await?.ok_or_else(position_not_found)?;

        let promotes_to_root =
            patch.kind == Some(PositionKind::Root) && current.kind != PositionKind::Root;
        if promotes_to_root && tx.find_root().await?.is_some() {
            warn!("Rejected promoting {} to a second root", id);
            return Err(HierarchyError::DuplicateRoot);
        }

        let mut next = current.clone();
        if let Some(name) = &patch.name {
            next.name = normalize_name(name)?;
        }
        if let Some(description) = patch.description {
            next.description = Some(description);
        }
        if let Some(kind) = patch.kind {
            next.kind = kind;
        }
        if let Some(is_public) = patch.is_public {
            next.is_public = is_public;
        }

        if let Some(parent_id) = patch.parent_id {
            if parent_id == id {
                return Err(HierarchyError::Validation(
                    "A position cannot be its own parent.".to_string(),
                ));
            }
            let parent = tx.get(parent_id).await?.ok_or_else(parent_not_found)?;
            if creates_cycle(tx.as_mut(), parent, id).await? {
                warn!("Rejected reparenting {} under {}: cycle", id, parent_id);
                return Err(HierarchyError::CyclicHierarchy);
            }
            next.parent_id = Some(parent_id);
        }

        check_parent_shape(next.kind, next.parent_id)?;
        if patch.name.is_some() || patch.kind.is_some() {
            ensure_unique_name(tx.as_mut(), &next.name, next.kind, Some(id)).await?;
        }

        next.updated_at = Utc::now();
        tx.update(&next).await.map_err(|e| write_error(e, &next))?;
        tx.commit().await.map_err(|e| write_error(e, &next))?;

        info!("Updated position {}", id);
        Ok(next)
    }

    /// Look up by id when the identifier is a UUID, by name otherwise
    pub async fn find_one(&self, identifier: &str) -> HierarchyResult<Position> {
        let found = match Uuid::parse_str(identifier) {
            Ok(id) => self.store.get(id).await?,
            Err(_) => self.store.find_by_name(identifier).await?,
        };
        debug!("Lookup '{}' found: {}", identifier, found.is_some());
        found.ok_or_else(position_not_found)
    }

    pub async fn find_children(&self, id: Uuid) -> HierarchyResult<Vec<Position>> {
        if self.store.get(id).await?.is_none() {
            return Err(position_not_found());
        }
        Ok(self.store.children_of(id).await?)
    }

    /// Parent chain of `id`, nearest first
    pub async fn ancestors(&self, id: Uuid) -> HierarchyResult<Vec<Position>> {
        let node = self.store.get(id).await?.ok_or_else(position_not_found)?;

        let mut chain = Vec::new();
        let mut visited = HashSet::from([node.id]);
        let mut next_id = node.parent_id;
        while let Some(parent_id) = next_id {
            if !visited.insert(parent_id) {
                warn!("Parent chain of {} revisits {}", id, parent_id);
                break;
            }
            let Some(parent) = self.store.get(parent_id).await? else {
                break;
            };
            next_id = parent.parent_id;
            chain.push(parent);
        }
        Ok(chain)
    }

    /// Delete a childless position. Never cascades.
    pub async fn remove(&self, id: Uuid) -> HierarchyResult<()> {
        let mut tx = self.store.begin().await?;
        let position = tx.get(id).await?.ok_or_else(position_not_found)?;

        let children = tx.children_of(id).await?;
        if !children.is_empty() {
            warn!("Cannot delete position {}: {} child positions", id, children.len());
            return Err(HierarchyError::HasChildren);
        }

        tx.delete(id).await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => HierarchyError::HasChildren,
            other => write_error(other, &position),
        })?;
        tx.commit().await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => HierarchyError::HasChildren,
            other => other.into(),
        })?;

        info!("Deleted position {} ('{}')", id, position.name);
        Ok(())
    }

    pub async fn find_all(&self, page: i64, limit: i64) -> HierarchyResult<PositionPage> {
        if page < 1 || limit < 1 {
            return Err(HierarchyError::Validation(
                "page and limit must be positive".to_string(),
            ));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| HierarchyError::Validation("page is out of range".to_string()))?;
        Ok(self.store.page(offset, limit).await?)
    }

    /// Every position with its direct children
    pub async fn find_all_as_tree(&self) -> HierarchyResult<Vec<PositionWithChildren>> {
        Ok(tree::shallow(self.store.list_all().await?))
    }

    pub async fn find_all_nested(&self) -> HierarchyResult<Vec<TreeNode>> {
        let positions = self.store.list_all().await?;
        debug!("Assembling nested tree over {} positions", positions.len());
        Ok(tree::nested(positions, self.max_tree_depth))
    }

    pub async fn public_list(&self) -> HierarchyResult<Vec<PublicPositionView>> {
        let positions = self.store.list_public().await?;
        Ok(positions.iter().map(PublicPositionView::from).collect())
    }

    pub async fn health_check(&self) -> HierarchyResult<()> {
        Ok(self.store.ping().await?)
    }
}
