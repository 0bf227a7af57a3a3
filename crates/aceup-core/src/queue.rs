//! Pending operation queue.
//!
//! An ordered log of local mutations the remote store has not confirmed yet.
//! Operations are appended when a mutation happens and removed only after the
//! matching remote write succeeds; they are never edited in place.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Entity, EntityKind};
use crate::util::now_millis;

/// The mutation a pending operation replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// One queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "E: Entity")]
pub struct PendingOperation<E> {
    /// Queue-local identifier
    pub id: Uuid,
    pub kind: OperationKind,
    pub entity_kind: EntityKind,
    pub user_id: String,
    /// Entity state at the time of the mutation
    pub payload: E,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
}

impl<E: Entity> PendingOperation<E> {
    pub fn new(kind: OperationKind, payload: E) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            entity_kind: E::KIND,
            user_id: payload.user_id().to_string(),
            payload,
            enqueued_at: now_millis(),
        }
    }
}

/// FIFO queue of pending operations for one (entity type, user) partition.
#[derive(Debug, Clone)]
pub struct PendingQueue<E> {
    operations: VecDeque<PendingOperation<E>>,
}

impl<E> Default for PendingQueue<E> {
    fn default() -> Self {
        Self {
            operations: VecDeque::new(),
        }
    }
}

impl<E: Entity> PendingQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from its persisted form, preserving order.
    pub fn from_operations(operations: Vec<PendingOperation<E>>) -> Self {
        Self {
            operations: operations.into(),
        }
    }

    /// Append an operation and return its id.
    pub fn enqueue(&mut self, kind: OperationKind, payload: E) -> Uuid {
        let operation = PendingOperation::new(kind, payload);
        let id = operation.id;
        self.operations.push_back(operation);
        id
    }

    /// Oldest operation, next in line for the remote store.
    pub fn front(&self) -> Option<&PendingOperation<E>> {
        self.operations.front()
    }

    /// Remove a confirmed operation. Returns whether it was still queued.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.operations.len();
        self.operations.retain(|operation| operation.id != id);
        self.operations.len() != before
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation<E>> {
        self.operations.iter()
    }

    /// Owned copy of the queue in order, for persistence and replay.
    pub fn to_vec(&self) -> Vec<PendingOperation<E>> {
        self.operations.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    fn course(name: &str) -> Course {
        Course::new("user-1", name, "X 100")
    }

    #[test]
    fn test_enqueue_preserves_fifo_order() {
        let mut queue = PendingQueue::new();
        let first = queue.enqueue(OperationKind::Create, course("A"));
        let second = queue.enqueue(OperationKind::Update, course("B"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front().map(|op| op.id), Some(first));

        assert!(queue.remove(first));
        assert_eq!(queue.front().map(|op| op.id), Some(second));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut queue = PendingQueue::new();
        queue.enqueue(OperationKind::Delete, course("A"));
        assert!(!queue.remove(Uuid::now_v7()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_operation_records_entity_kind_and_user() {
        let mut queue = PendingQueue::new();
        queue.enqueue(OperationKind::Create, course("A"));
        let operation = queue.front().unwrap();
        assert_eq!(operation.entity_kind, EntityKind::Course);
        assert_eq!(operation.user_id, "user-1");
        assert_eq!(operation.kind, OperationKind::Create);
    }

    #[test]
    fn test_persisted_form_restores_queue() {
        let mut queue = PendingQueue::new();
        queue.enqueue(OperationKind::Create, course("A"));
        queue.enqueue(OperationKind::Delete, course("B"));

        let json = serde_json::to_string(&queue.to_vec()).unwrap();
        let restored =
            PendingQueue::<Course>::from_operations(serde_json::from_str(&json).unwrap());
        pretty_assertions::assert_eq!(restored.to_vec(), queue.to_vec());
    }
}
