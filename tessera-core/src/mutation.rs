//! Queued structural changes to a table descriptor.

use crate::descriptor::{ColumnDescriptor, ConstraintDescriptor, IndexDescriptor};
use crate::enums::{MutationDirection, MutationState};
use crate::identity::JobId;
use serde::{Deserialize, Serialize};

/// The element a mutation adds or drops.
///
/// This is a closed set; the truncation classifier matches on it
/// exhaustively so that no element kind can be left unclassified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationElement {
    Index(IndexDescriptor),
    Column(ColumnDescriptor),
    Constraint(ConstraintDescriptor),
}

impl MutationElement {
    /// Name of the affected index, column or constraint.
    pub fn name(&self) -> &str {
        match self {
            MutationElement::Index(idx) => &idx.name,
            MutationElement::Column(col) => &col.name,
            MutationElement::Constraint(c) => &c.name,
        }
    }
}

/// An ordered entry in a table descriptor's mutation queue.
///
/// Queue order reflects commit order and is stable for a given descriptor
/// snapshot. The state only ever moves forward until terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub direction: MutationDirection,
    pub element: MutationElement,
    pub state: MutationState,
    /// The asynchronous job driving this mutation to completion.
    pub job_id: JobId,
}

impl Mutation {
    pub fn add_index(index: IndexDescriptor, job_id: JobId) -> Self {
        Self {
            direction: MutationDirection::Add,
            element: MutationElement::Index(index),
            state: MutationState::DeleteOnly,
            job_id,
        }
    }

    pub fn drop_index(index: IndexDescriptor, job_id: JobId) -> Self {
        Self {
            direction: MutationDirection::Drop,
            element: MutationElement::Index(index),
            state: MutationState::WriteOnly,
            job_id,
        }
    }

    pub fn add_column(column: ColumnDescriptor, job_id: JobId) -> Self {
        Self {
            direction: MutationDirection::Add,
            element: MutationElement::Column(column),
            state: MutationState::DeleteOnly,
            job_id,
        }
    }

    pub fn drop_column(column: ColumnDescriptor, job_id: JobId) -> Self {
        Self {
            direction: MutationDirection::Drop,
            element: MutationElement::Column(column),
            state: MutationState::WriteOnly,
            job_id,
        }
    }

    /// Constraint changes always run in the ADD direction: both adding a new
    /// constraint and validating an existing one write the constraint record
    /// forward.
    pub fn add_constraint(constraint: ConstraintDescriptor, job_id: JobId) -> Self {
        Self {
            direction: MutationDirection::Add,
            element: MutationElement::Constraint(constraint),
            state: MutationState::WriteOnly,
            job_id,
        }
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    /// Step the mutation's state forward once. Returns `false` when the
    /// mutation was already terminal and did not move.
    pub fn advance(&mut self) -> bool {
        match self.state.next_for(self.direction) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    /// A terminal mutation has finished stepping: `Public` for ADD, ready
    /// for removal from the queue for DROP.
    pub fn is_terminal(&self) -> bool {
        self.state.next_for(self.direction).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::IndexDescriptor;
    use crate::identity::IndexId;

    fn idx(name: &str) -> IndexDescriptor {
        IndexDescriptor {
            id: IndexId(2),
            name: name.to_string(),
            column_ids: vec![],
            unique: false,
        }
    }

    #[test]
    fn test_add_index_advances_to_public() {
        let mut m = Mutation::add_index(idx("idx"), JobId(1));
        assert_eq!(m.state, MutationState::DeleteOnly);
        while m.advance() {}
        assert_eq!(m.state, MutationState::Public);
        assert!(m.is_terminal());
    }

    #[test]
    fn test_drop_index_advances_to_delete_only() {
        let mut m = Mutation::drop_index(idx("idx"), JobId(1));
        assert_eq!(m.state, MutationState::WriteOnly);
        while m.advance() {}
        assert_eq!(m.state, MutationState::DeleteOnly);
        assert!(m.is_terminal());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut m = Mutation::add_index(idx("idx"), JobId(1));
        let mut seen = vec![m.state];
        while m.advance() {
            seen.push(m.state);
        }
        // No state repeats once left.
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(seen, deduped);
        // Terminal mutations stay put.
        assert!(!m.advance());
        assert_eq!(m.state, MutationState::Public);
    }
}
