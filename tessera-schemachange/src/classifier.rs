//! Mutation safety classification for TRUNCATE.
//!
//! Truncation swaps the table's physical storage identity. A pending ADD
//! mutation merely populates new storage and starts over harmlessly
//! against the post-truncation generation; a pending DROP INDEX or
//! constraint change requires observing descriptor state exactly as it was
//! when its job started, which the swap would invalidate. Classification
//! inspects only the committed descriptor snapshot: it never contacts the
//! job coordinator and never blocks.

use tessera_core::{
    ConstraintKind, Mutation, MutationDirection, MutationElement, TableDescriptor,
    TruncateRejection,
};

/// Classify an owned snapshot of a mutation queue.
///
/// Evaluation is per-mutation in queue order and short-circuits on the
/// first disqualifier, so the outcome is deterministic for a fixed queue.
/// The match over element kind and direction is exhaustive: a new element
/// kind cannot compile without an explicit policy here.
pub fn classify_mutations(
    table_name: &str,
    queue: &[Mutation],
) -> Result<(), TruncateRejection> {
    for mutation in queue {
        match (&mutation.element, mutation.direction) {
            // A new index backfills from the (post-truncation) empty
            // generation; it converges to an empty, valid index.
            (MutationElement::Index(_), MutationDirection::Add) => {}

            (MutationElement::Index(_), MutationDirection::Drop) => {
                return Err(TruncateRejection::IndexBeingDropped {
                    table: table_name.to_string(),
                });
            }

            (MutationElement::Column(_), MutationDirection::Add) => {}

            // Dropping a column is safe unless another catalog object's
            // cleanup logic must read the column's pre-drop shape. Owned
            // sequences and sequence-backed defaults do not qualify.
            (MutationElement::Column(column), MutationDirection::Drop) => {
                if column.has_cross_object_dependency() {
                    return Err(TruncateRejection::DependentColumnBeingDropped {
                        table: table_name.to_string(),
                        column: column.name.clone(),
                    });
                }
            }

            // Constraint changes run in the ADD direction only; the
            // direction does not affect the verdict.
            (MutationElement::Constraint(constraint), _) => match constraint.kind {
                ConstraintKind::PrimaryKey => {
                    return Err(TruncateRejection::PrimaryKeyChange {
                        table: table_name.to_string(),
                    });
                }
                ConstraintKind::ForeignKey => {
                    return Err(TruncateRejection::ConstraintChange {
                        table: table_name.to_string(),
                        kind: ConstraintKind::ForeignKey,
                    });
                }
                ConstraintKind::Check => {
                    return Err(TruncateRejection::ConstraintChange {
                        table: table_name.to_string(),
                        kind: ConstraintKind::Check,
                    });
                }
            },
        }
    }
    Ok(())
}

/// Decide whether `table` can be truncated while its pending mutations
/// keep running. Takes an owned snapshot of the queue; the caller's
/// descriptor is never retained.
pub fn can_truncate_table(table: &TableDescriptor) -> Result<(), TruncateRejection> {
    let queue = table.mutation_queue();
    classify_mutations(&table.name, &queue)
}
