//! Tree assembly over a flat list of positions.
//!
//! Both shapes are built from one in-memory pass, never one query per node.
//! The nested shape is built without recursion and its depth is capped, so a
//! long parent chain cannot exhaust the stack here or when the result is
//! serialized and dropped.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::database::models::{Position, PositionWithChildren, TreeNode};

/// Nesting levels in a nested tree unless configured otherwise
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Children grouped by parent id, keeping input order within each group
fn group_by_parent(positions: &[Position]) -> HashMap<Uuid, Vec<Position>> {
    let mut children: HashMap<Uuid, Vec<Position>> = HashMap::new();
    for position in positions {
        if let Some(parent_id) = position.parent_id {
            children.entry(parent_id).or_default().push(position.clone());
        }
    }
    children
}

/// Every position paired with its direct children, one level deep
pub fn shallow(positions: Vec<Position>) -> Vec<PositionWithChildren> {
    let mut children = group_by_parent(&positions);
    positions
        .into_iter()
        .map(|position| PositionWithChildren {
            children: children.remove(&position.id).unwrap_or_default(),
            position,
        })
        .collect()
}

/// Fully nested forest, at most `max_depth` levels deep.
///
/// Top level holds the root plus any node whose parent is missing, so a
/// dangling reference never hides part of the tree. A node that would land
/// below `max_depth` starts a new top-level subtree after those.
pub fn nested(positions: Vec<Position>, max_depth: usize) -> Vec<TreeNode> {
    let max_depth = max_depth.max(1);
    let ids: HashSet<Uuid> = positions.iter().map(|p| p.id).collect();

    let mut tops = Vec::new();
    let mut child_ids: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for position in &positions {
        match position.parent_id {
            Some(parent_id) if ids.contains(&parent_id) => {
                child_ids.entry(parent_id).or_default().push(position.id)
            }
            _ => tops.push(position.id),
        }
    }

    // Breadth first: every parent is visited before its children
    let mut visited = Vec::with_capacity(positions.len());
    let mut kept: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut queue: VecDeque<(Uuid, usize)> = tops.iter().map(|id| (*id, 1)).collect();
    while let Some((id, depth)) = queue.pop_front() {
        visited.push(id);
        for child in child_ids.remove(&id).unwrap_or_default() {
            if depth < max_depth {
                kept.entry(id).or_default().push(child);
                queue.push_back((child, depth + 1));
            } else {
                tops.push(child);
                queue.push_back((child, 1));
            }
        }
    }

    // Children are complete before their parent is assembled
    let mut by_id: HashMap<Uuid, Position> = positions.into_iter().map(|p| (p.id, p)).collect();
    let mut built: HashMap<Uuid, TreeNode> = HashMap::with_capacity(visited.len());
    for id in visited.into_iter().rev() {
        let Some(position) = by_id.remove(&id) else {
            continue;
        };
        let children = kept
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|child| built.remove(&child))
            .collect();
        built.insert(id, TreeNode { position, children });
    }

    tops.into_iter().filter_map(|id| built.remove(&id)).collect()
}
