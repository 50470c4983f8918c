//! Logical write operations and batch requests
//!
//! A [`BatchedWriteRequest`] is a homogeneous list of inserts, updates or
//! deletes against one namespace. Each operation keeps its position in the
//! original batch for the lifetime of the request; that index is what
//! per-operation errors are attributed to.

use crate::types::{Namespace, SessionInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value as Document;

/// Kind of write carried by a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    /// Document inserts
    Insert,
    /// Query + update modifications
    Update,
    /// Query-based deletes
    Delete,
}

/// One entry of an update batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// Selects the documents to modify
    pub query: Document,
    /// Modification applied to matching documents
    pub update: Document,
    /// Modify every match instead of the first
    #[serde(default)]
    pub multi: bool,
    /// Insert when nothing matches
    #[serde(default)]
    pub upsert: bool,
}

impl UpdateEntry {
    /// Single-document update
    pub fn new(query: Document, update: Document) -> Self {
        UpdateEntry {
            query,
            update,
            multi: false,
            upsert: false,
        }
    }

    /// Update every matching document
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Insert when no document matches
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }
}

/// One entry of a delete batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteEntry {
    /// Selects the documents to delete
    pub query: Document,
    /// Delete every match instead of the first
    #[serde(default)]
    pub multi: bool,
}

impl DeleteEntry {
    /// Delete at most one matching document
    pub fn one(query: Document) -> Self {
        DeleteEntry {
            query,
            multi: false,
        }
    }

    /// Delete every matching document
    pub fn many(query: Document) -> Self {
        DeleteEntry { query, multi: true }
    }
}

/// Kind-specific payload of a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WriteOp {
    /// Insert a document
    Insert {
        /// Document to insert
        document: Document,
    },
    /// Update matching documents
    Update(UpdateEntry),
    /// Delete matching documents
    Delete(DeleteEntry),
}

impl WriteOp {
    /// Batch type this op belongs to
    pub fn batch_type(&self) -> BatchType {
        match self {
            WriteOp::Insert { .. } => BatchType::Insert,
            WriteOp::Update(_) => BatchType::Update,
            WriteOp::Delete(_) => BatchType::Delete,
        }
    }

    /// Encoded payload size in bytes
    fn encoded_len(&self) -> usize {
        let encoded = match self {
            WriteOp::Insert { document } => serde_json::to_vec(document),
            WriteOp::Update(entry) => serde_json::to_vec(entry),
            WriteOp::Delete(entry) => serde_json::to_vec(entry),
        };
        encoded.map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// One logical write inside a batch
///
/// Immutable once the batch is built.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    index: usize,
    op: WriteOp,
    size_bytes: usize,
}

impl WriteOperation {
    /// Create an operation at the given batch index
    pub fn new(index: usize, op: WriteOp) -> Self {
        let size_bytes = op.encoded_len();
        WriteOperation {
            index,
            op,
            size_bytes,
        }
    }

    /// Position in the original batch
    pub fn index(&self) -> usize {
        self.index
    }

    /// Kind-specific payload
    pub fn op(&self) -> &WriteOp {
        &self.op
    }

    /// Encoded payload size, excluding per-operation framing
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

/// A client batch write against one namespace
#[derive(Debug, Clone)]
pub struct BatchedWriteRequest {
    namespace: Namespace,
    batch_type: BatchType,
    operations: Vec<WriteOperation>,
    ordered: bool,
    session: Option<SessionInfo>,
}

impl BatchedWriteRequest {
    /// Ordered insert batch
    pub fn insert(namespace: Namespace, documents: Vec<Document>) -> Self {
        let ops = documents
            .into_iter()
            .map(|document| WriteOp::Insert { document });
        Self::build(namespace, BatchType::Insert, ops)
    }

    /// Ordered update batch
    pub fn update(namespace: Namespace, updates: Vec<UpdateEntry>) -> Self {
        Self::build(namespace, BatchType::Update, updates.into_iter().map(WriteOp::Update))
    }

    /// Ordered delete batch
    pub fn delete(namespace: Namespace, deletes: Vec<DeleteEntry>) -> Self {
        Self::build(namespace, BatchType::Delete, deletes.into_iter().map(WriteOp::Delete))
    }

    fn build(
        namespace: Namespace,
        batch_type: BatchType,
        ops: impl Iterator<Item = WriteOp>,
    ) -> Self {
        let operations = ops
            .enumerate()
            .map(|(index, op)| WriteOperation::new(index, op))
            .collect();
        BatchedWriteRequest {
            namespace,
            batch_type,
            operations,
            ordered: true,
            session: None,
        }
    }

    /// Set ordered (stop at first error) or unordered execution
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Attach a logical session
    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }

    /// Target namespace
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Batch type
    pub fn batch_type(&self) -> BatchType {
        self.batch_type
    }

    /// All operations in original order
    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    /// Operation at the given original index
    pub fn operation(&self, index: usize) -> Option<&WriteOperation> {
        self.operations.get(index)
    }

    /// Number of operations in the batch
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the batch has no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether execution stops at the first failure
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Attached session, if any
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Whether the batch runs as a retryable write
    pub fn is_retryable_write(&self) -> bool {
        self.session.map_or(false, |s| s.is_retryable_write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ns() -> Namespace {
        Namespace::new("foo", "bar")
    }

    #[test]
    fn test_insert_batch_indexes_in_order() {
        let req = BatchedWriteRequest::insert(ns(), vec![json!({"x": 1}), json!({"x": 2})]);
        assert_eq!(req.batch_type(), BatchType::Insert);
        assert_eq!(req.len(), 2);
        for (i, op) in req.operations().iter().enumerate() {
            assert_eq!(op.index(), i);
            assert_eq!(op.op().batch_type(), BatchType::Insert);
        }
        assert!(req.is_ordered());
    }

    #[test]
    fn test_size_reflects_payload() {
        let small = WriteOperation::new(0, WriteOp::Insert { document: json!({"x": 1}) });
        let large = WriteOperation::new(
            1,
            WriteOp::Insert {
                document: json!({"x": 1, "pad": "y".repeat(200)}),
            },
        );
        assert!(small.size_bytes() > 0);
        assert!(large.size_bytes() > small.size_bytes() + 200);
    }

    #[test]
    fn test_update_and_delete_builders() {
        let req = BatchedWriteRequest::update(
            ns(),
            vec![UpdateEntry::new(json!({"_id": 1}), json!({"$set": {"a": 1}})).multi()],
        )
        .with_ordered(false);
        assert_eq!(req.batch_type(), BatchType::Update);
        assert!(!req.is_ordered());
        match req.operation(0).map(|o| o.op()) {
            Some(WriteOp::Update(entry)) => assert!(entry.multi && !entry.upsert),
            other => panic!("unexpected op: {:?}", other),
        }

        let req = BatchedWriteRequest::delete(ns(), vec![DeleteEntry::many(json!({"a": 1}))]);
        assert_eq!(req.batch_type(), BatchType::Delete);
        assert!(req.operation(1).is_none());
    }

    #[test]
    fn test_retryable_write_requires_txn_number() {
        let lsid = Uuid::new_v4();
        let req = BatchedWriteRequest::insert(ns(), vec![json!({})]);
        assert!(!req.is_retryable_write());

        let req = req.with_session(SessionInfo::new(lsid));
        assert!(!req.is_retryable_write());

        let req = req.with_session(SessionInfo::with_txn_number(lsid, 5));
        assert!(req.is_retryable_write());
    }

    #[test]
    fn test_write_op_serde_tagging() {
        let op = WriteOp::Delete(DeleteEntry::one(json!({"a": 1})));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "delete");
        assert_eq!(value["multi"], false);
    }
}
