//! In-memory storage backend for development and tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::database::models::{Position, PositionKind, User};
use crate::database::store::{
    constraints, PositionPage, PositionStore, PositionTx, StoreError, StoreResult, UserStore,
};

/// Process-local store. Transactions take the write lock for their whole
/// lifetime, so concurrent check-then-write sequences are serialized.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    positions: HashMap<Uuid, Position>,

    /// Creation order of live position ids
    order: Vec<Uuid>,

    users: HashMap<String, User>,
}

impl MemoryState {
    fn ordered(&self) -> impl DoubleEndedIterator<Item = &Position> {
        self.order.iter().filter_map(|id| self.positions.get(id))
    }

    fn children_of(&self, parent_id: Uuid) -> Vec<Position> {
        self.ordered()
            .filter(|p| p.parent_id == Some(parent_id))
            .cloned()
            .collect()
    }

    fn apply(&mut self, op: Staged) {
        match op {
            Staged::Insert(position) => {
                self.order.push(position.id);
                self.positions.insert(position.id, position);
            }
            Staged::Update(position) => {
                self.positions.insert(position.id, position);
            }
            Staged::Delete(id) => {
                if self.positions.remove(&id).is_some() {
                    self.order.retain(|existing| *existing != id);
                }
            }
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(MemoryState::default())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for MemoryBackend {
    async fn begin(&self) -> StoreResult<Box<dyn PositionTx>> {
        let state = Arc::clone(&self.data).write_owned().await;
        Ok(Box::new(MemoryTx {
            state,
            staged: Vec::new(),
        }))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Position>> {
        Ok(self.data.read().await.positions.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Position>> {
        let store = self.data.read().await;
        let found = store.ordered().find(|p| p.name == name).cloned();
        Ok(found)
    }

    async fn children_of(&self, parent_id: Uuid) -> StoreResult<Vec<Position>> {
        Ok(self.data.read().await.children_of(parent_id))
    }

    async fn page(&self, offset: i64, limit: i64) -> StoreResult<PositionPage> {
        let store = self.data.read().await;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let data = store.ordered().skip(offset).take(limit).cloned().collect();
        Ok(PositionPage {
            data,
            total: store.positions.len() as i64,
        })
    }

    async fn list_all(&self) -> StoreResult<Vec<Position>> {
        Ok(self.data.read().await.ordered().cloned().collect())
    }

    async fn list_public(&self) -> StoreResult<Vec<Position>> {
        let store = self.data.read().await;
        let public = store.ordered().rev().filter(|p| p.is_public).cloned().collect();
        Ok(public)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryBackend {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.data.read().await.users.get(username).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut store = self.data.write().await;
        if store.users.contains_key(&user.username) {
            return Err(StoreError::UniqueViolation(constraints::USERNAME_UNIQUE.to_string()));
        }
        store.users.insert(user.username.clone(), user.clone());
        Ok(())
    }
}

enum Staged {
    Insert(Position),
    Update(Position),
    Delete(Uuid),
}

/// Reads see committed state; staged writes land on commit.
struct MemoryTx {
    state: OwnedRwLockWriteGuard<MemoryState>,
    staged: Vec<Staged>,
}

#[async_trait]
impl PositionTx for MemoryTx {
    async fn get(&mut self, id: Uuid) -> StoreResult<Option<Position>> {
        Ok(self.state.positions.get(&id).cloned())
    }

    async fn find_root(&mut self) -> StoreResult<Option<Position>> {
        Ok(self.state.ordered().find(|p| p.is_root()).cloned())
    }

    async fn find_by_name_and_kind(
        &mut self,
        name: &str,
        kind: PositionKind,
    ) -> StoreResult<Option<Position>> {
        Ok(self
            .state
            .ordered()
            .find(|p| p.name == name && p.kind == kind)
            .cloned())
    }

    async fn children_of(&mut self, parent_id: Uuid) -> StoreResult<Vec<Position>> {
        Ok(self.state.children_of(parent_id))
    }

    async fn insert(&mut self, position: &Position) -> StoreResult<()> {
        self.staged.push(Staged::Insert(position.clone()));
        Ok(())
    }

    async fn update(&mut self, position: &Position) -> StoreResult<()> {
        self.staged.push(Staged::Update(position.clone()));
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> StoreResult<()> {
        self.staged.push(Staged::Delete(id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut state, staged } = *self;
        for op in staged {
            state.apply(op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn position(name: &str, kind: PositionKind, parent_id: Option<Uuid>) -> Position {
        let now = Utc::now();
        Position {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            kind,
            parent_id,
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryBackend::new();
        let root = position("University", PositionKind::Root, None);

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&root).await.unwrap();
        }
        assert!(store.get(root.id).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert(&root).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.get(root.id).await.unwrap(), Some(root));
    }

    #[tokio::test]
    async fn lists_in_creation_order_and_pages() {
        let store = MemoryBackend::new();
        let root = position("University", PositionKind::Root, None);
        let mut tx = store.begin().await.unwrap();
        tx.insert(&root).await.unwrap();
        for i in 0..4 {
            tx.insert(&position(&format!("Teacher {i}"), PositionKind::Teacher, Some(root.id)))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let children = store.children_of(root.id).await.unwrap();
        let names: Vec<_> = children.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Teacher 0", "Teacher 1", "Teacher 2", "Teacher 3"]);

        let page = store.page(3, 10).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].name, "Teacher 2");
    }

    #[tokio::test]
    async fn name_lookup_returns_first_created() {
        let store = MemoryBackend::new();
        let root = position("University", PositionKind::Root, None);
        let first = position("Alex Smith", PositionKind::Teacher, Some(root.id));
        let second = position("Alex Smith", PositionKind::Teacher, Some(root.id));

        let mut tx = store.begin().await.unwrap();
        for p in [&root, &first, &second] {
            tx.insert(p).await.unwrap();
        }
        tx.commit().await.unwrap();

        assert_eq!(store.find_by_name("Alex Smith").await.unwrap(), Some(first));
        assert!(store.find_by_name("Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_from_ordering() {
        let store = MemoryBackend::new();
        let root = position("University", PositionKind::Root, None);
        let leaf = position("Dean", PositionKind::Institute, Some(root.id));

        let mut tx = store.begin().await.unwrap();
        tx.insert(&root).await.unwrap();
        tx.insert(&leaf).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete(leaf.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![root]);
        assert_eq!(store.page(0, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn public_list_is_newest_first() {
        let store = MemoryBackend::new();
        let mut first = position("University", PositionKind::Root, None);
        first.is_public = true;
        let hidden = position("Registry", PositionKind::Institute, Some(first.id));
        let mut last = position("Library", PositionKind::Institute, Some(first.id));
        last.is_public = true;

        let mut tx = store.begin().await.unwrap();
        for p in [&first, &hidden, &last] {
            tx.insert(p).await.unwrap();
        }
        tx.commit().await.unwrap();

        let names: Vec<_> = store
            .list_public()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Library", "University"]);
    }

    #[tokio::test]
    async fn rejects_duplicate_usernames() {
        let store = MemoryBackend::new();
        let user = User::new("admin", "hash", vec!["admin".to_string()]);
        store.insert_user(&user).await.unwrap();

        let again = User::new("admin", "other", vec![]);
        assert!(matches!(
            store.insert_user(&again).await,
            Err(StoreError::UniqueViolation(_))
        ));
    }
}
