//! Merge of local and remote entity sets.
//!
//! The remote copy always wins its id. Local entities the remote has never
//! seen are kept, so unsynced creations survive a fetch.

use std::collections::{HashMap, HashSet};

use crate::models::{Entity, EntityId, SyncConflict, REMOTE_WINS};
use crate::util::now_millis;

/// Outcome of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<E> {
    /// Remote entities in remote order, then local-only entities in local order
    pub merged: Vec<E>,
    /// Shared ids whose local copy differed from the winning remote copy
    pub conflicts: Vec<SyncConflict>,
}

/// Merge `local` into `remote` with remote-wins semantics.
///
/// Duplicate ids inside `remote` keep their first occurrence.
pub fn resolve<E: Entity>(local: &[E], remote: Vec<E>) -> Resolution<E> {
    let mut merged = Vec::with_capacity(remote.len() + local.len());
    let mut remote_updated: HashMap<EntityId, i64> = HashMap::with_capacity(remote.len());
    for entity in remote {
        if remote_updated.contains_key(entity.id()) {
            continue;
        }
        remote_updated.insert(entity.id().clone(), entity.updated_at());
        merged.push(entity);
    }

    let resolved_at = now_millis();
    let mut conflicts = Vec::new();
    let mut seen_local: HashSet<&EntityId> = HashSet::with_capacity(local.len());
    for entity in local {
        if !seen_local.insert(entity.id()) {
            continue;
        }
        match remote_updated.get(entity.id()) {
            Some(&remote_updated_at) => {
                if remote_updated_at != entity.updated_at() {
                    conflicts.push(SyncConflict {
                        entity_kind: E::KIND,
                        entity_id: entity.id().clone(),
                        local_updated_at: entity.updated_at(),
                        remote_updated_at,
                        resolved_at,
                        strategy: REMOTE_WINS.to_string(),
                    });
                }
            }
            None => merged.push(entity.clone()),
        }
    }

    Resolution { merged, conflicts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, EntityKind};
    use pretty_assertions::assert_eq;

    fn course(id: &str, name: &str, updated_at: i64) -> Course {
        let mut course = Course::new("u1", name, "C 1");
        course.id = EntityId::from(id);
        course.updated_at = updated_at;
        course
    }

    #[test]
    fn remote_wins_shared_ids_and_local_only_survive() {
        let local = vec![course("A", "A v1", 1), course("B", "B v1", 1)];
        let remote = vec![course("A", "A v2", 2), course("C", "C v1", 1)];

        let resolution = resolve(&local, remote);

        assert_eq!(
            resolution.merged,
            vec![course("A", "A v2", 2), course("C", "C v1", 1), course("B", "B v1", 1)]
        );
    }

    #[test]
    fn resolving_twice_is_stable() {
        let local = vec![course("A", "A v1", 1), course("B", "B v1", 1)];
        let remote = vec![course("A", "A v2", 2), course("C", "C v1", 1)];

        let first = resolve(&local, remote.clone());
        let second = resolve(&first.merged, remote);

        assert_eq!(first.merged, second.merged);
        assert!(second.conflicts.is_empty());
    }

    #[test]
    fn differing_shared_copies_are_reported() {
        let local = vec![course("A", "local edit", 9), course("B", "same", 3)];
        let remote = vec![course("A", "remote edit", 5), course("B", "same", 3)];

        let resolution = resolve(&local, remote);

        assert_eq!(resolution.conflicts.len(), 1);
        let conflict = &resolution.conflicts[0];
        assert_eq!(conflict.entity_kind, EntityKind::Course);
        assert_eq!(conflict.entity_id, EntityId::from("A"));
        assert_eq!(conflict.strategy, REMOTE_WINS);
        assert!(conflict.discarded_newer_local());
        assert_eq!(resolution.merged[0].name, "remote edit");
    }

    #[test]
    fn duplicate_remote_ids_keep_first() {
        let remote = vec![course("A", "first", 1), course("A", "second", 2)];
        let resolution = resolve(&[], remote);
        assert_eq!(resolution.merged, vec![course("A", "first", 1)]);
    }

    #[test]
    fn empty_remote_keeps_local_set() {
        let local = vec![course("A", "A", 1)];
        let resolution = resolve(&local, Vec::new());
        assert_eq!(resolution.merged, local);
    }
}
