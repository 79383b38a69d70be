//! Generic object store boundary: records, ids, and the set-object operation.
//!
//! This is record plumbing consumed by transaction evaluation, not matching
//! logic. The operation's id field selects the behavior: zero creates a
//! fresh object, a positive id updates an existing one, and a negative id is
//! reserved for evaluation-stack references that this chain does not
//! implement — those fail fast instead of silently doing nothing.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{MarketError, Result};
use crate::state::chain::ChainState;
use crate::types::Address;

// ============================================================================
// Object records
// ============================================================================

/// Kinds of objects the generic store can hold.
///
/// Account and asset objects predate the generic store; storing them through
/// this interface is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ObjectKind {
    /// Plain user object.
    #[default]
    Normal,
    /// Edge between two objects.
    Edge,
    /// Legacy account object.
    Account,
    /// Legacy asset object.
    Asset,
}

/// A record in the generic object store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectRecord {
    /// Kind of object; ids are scoped per kind.
    pub kind: ObjectKind,

    /// Identifier within the kind. Positive once stored.
    pub id: i64,

    /// Addresses that must sign to create or update this object.
    pub owners: BTreeSet<Address>,

    /// Opaque payload.
    pub data: Vec<u8>,
}

impl ObjectRecord {
    /// Create an unstored record (id 0).
    pub fn new(kind: ObjectKind, owners: BTreeSet<Address>, data: Vec<u8>) -> ObjectRecord {
        ObjectRecord {
            kind,
            id: 0,
            owners,
            data,
        }
    }
}

// ============================================================================
// Evaluation context
// ============================================================================

/// Signature context for one operation evaluation: the set of addresses that
/// signed the enclosing transaction.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    signatures: BTreeSet<Address>,
}

impl EvaluationContext {
    /// Create a context from the signing addresses.
    pub fn new(signatures: BTreeSet<Address>) -> EvaluationContext {
        EvaluationContext { signatures }
    }

    /// True when `owner` signed the enclosing transaction.
    pub fn check_signature(&self, owner: &Address) -> bool {
        self.signatures.contains(owner)
    }
}

// ============================================================================
// SetObjectOperation
// ============================================================================

/// Create or update an object in the generic store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetObjectOperation {
    /// 0 creates a new object; a positive id updates that object; negative
    /// ids are unsupported.
    pub id: i64,

    /// The record content to store.
    pub obj: ObjectRecord,
}

impl SetObjectOperation {
    /// Evaluate the operation against chain state.
    ///
    /// Creation requires at least one owner and a signature from every
    /// owner; updates require a signature from every owner of the *stored*
    /// record. Legacy kinds (account, asset) are rejected in both paths.
    pub fn evaluate(&self, state: &mut ChainState, ctx: &EvaluationContext) -> Result<()> {
        if self.id < 0 {
            return Err(MarketError::UnsupportedObjectOperation(format!(
                "set_object with negative id {}",
                self.id
            )));
        }

        if self.id == 0 {
            self.evaluate_create(state, ctx)
        } else {
            self.evaluate_update(state, ctx)
        }
    }

    fn evaluate_create(&self, state: &mut ChainState, ctx: &EvaluationContext) -> Result<()> {
        match self.obj.kind {
            ObjectKind::Normal | ObjectKind::Edge => {
                let mut obj = self.obj.clone();
                obj.id = state.new_object_id(obj.kind);

                let owners = state.get_object_owners(&obj);
                if owners.is_empty() {
                    return Err(MarketError::InvariantViolation(
                        "object has no owners that can sign for it".to_string(),
                    ));
                }
                for owner in &owners {
                    if !ctx.check_signature(owner) {
                        return Err(MarketError::MissingSignature(*owner));
                    }
                }

                debug!(kind = ?obj.kind, id = obj.id, "creating object");
                state.store_object_record(obj);
                Ok(())
            }
            ObjectKind::Account | ObjectKind::Asset => {
                Err(MarketError::UnsupportedObjectOperation(
                    "legacy account/asset objects cannot be stored via the object interface"
                        .to_string(),
                ))
            }
        }
    }

    fn evaluate_update(&self, state: &mut ChainState, ctx: &EvaluationContext) -> Result<()> {
        let existing = state
            .get_object_record(self.obj.kind, self.id)
            .ok_or(MarketError::ObjectNotFound(self.id))?;

        match existing.kind {
            ObjectKind::Normal | ObjectKind::Edge => {
                for owner in &state.get_object_owners(&existing) {
                    if !ctx.check_signature(owner) {
                        return Err(MarketError::MissingSignature(*owner));
                    }
                }

                let mut obj = self.obj.clone();
                obj.id = self.id;
                debug!(kind = ?obj.kind, id = obj.id, "updating object");
                state.store_object_record(obj);
                Ok(())
            }
            ObjectKind::Account | ObjectKind::Asset => {
                Err(MarketError::UnsupportedObjectOperation(
                    "updating legacy objects is not supported".to_string(),
                ))
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn owners(ids: &[u64]) -> BTreeSet<Address> {
        ids.iter().map(|id| Address::from_low_u64(*id)).collect()
    }

    fn ctx(ids: &[u64]) -> EvaluationContext {
        EvaluationContext::new(ids.iter().map(|id| Address::from_low_u64(*id)).collect())
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let mut state = ChainState::default();

        for expected_id in 1..=3 {
            let op = SetObjectOperation {
                id: 0,
                obj: ObjectRecord::new(ObjectKind::Normal, owners(&[1]), vec![expected_id as u8]),
            };
            op.evaluate(&mut state, &ctx(&[1])).unwrap();
            assert!(state
                .get_object_record(ObjectKind::Normal, expected_id)
                .is_some());
        }

        // Edge ids are scoped separately
        let op = SetObjectOperation {
            id: 0,
            obj: ObjectRecord::new(ObjectKind::Edge, owners(&[1]), vec![]),
        };
        op.evaluate(&mut state, &ctx(&[1])).unwrap();
        assert!(state.get_object_record(ObjectKind::Edge, 1).is_some());
    }

    #[test]
    fn test_create_requires_owner() {
        let mut state = ChainState::default();
        let op = SetObjectOperation {
            id: 0,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[]), vec![]),
        };
        assert!(matches!(
            op.evaluate(&mut state, &ctx(&[1])),
            Err(MarketError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_create_requires_every_owner_signature() {
        let mut state = ChainState::default();
        let op = SetObjectOperation {
            id: 0,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[1, 2]), vec![]),
        };
        assert_eq!(
            op.evaluate(&mut state, &ctx(&[1])),
            Err(MarketError::MissingSignature(Address::from_low_u64(2)))
        );
    }

    #[test]
    fn test_create_rejects_legacy_kinds() {
        let mut state = ChainState::default();
        for kind in [ObjectKind::Account, ObjectKind::Asset] {
            let op = SetObjectOperation {
                id: 0,
                obj: ObjectRecord::new(kind, owners(&[1]), vec![]),
            };
            assert!(matches!(
                op.evaluate(&mut state, &ctx(&[1])),
                Err(MarketError::UnsupportedObjectOperation(_))
            ));
        }
    }

    #[test]
    fn test_update_checks_stored_owners() {
        let mut state = ChainState::default();
        let create = SetObjectOperation {
            id: 0,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[1, 2]), vec![1]),
        };
        create.evaluate(&mut state, &ctx(&[1, 2])).unwrap();

        // An update signed by a non-owner replacing the owner set must still
        // satisfy the stored record's owners.
        let update = SetObjectOperation {
            id: 1,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[3]), vec![2]),
        };
        assert!(matches!(
            update.evaluate(&mut state, &ctx(&[3])),
            Err(MarketError::MissingSignature(_))
        ));

        update.evaluate(&mut state, &ctx(&[1, 2])).unwrap();
        let stored = state.get_object_record(ObjectKind::Normal, 1).unwrap();
        assert_eq!(stored.data, vec![2]);
        assert_eq!(stored.owners, owners(&[3]));
    }

    #[test]
    fn test_update_missing_object() {
        let mut state = ChainState::default();
        let op = SetObjectOperation {
            id: 42,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[1]), vec![]),
        };
        assert_eq!(
            op.evaluate(&mut state, &ctx(&[1])),
            Err(MarketError::ObjectNotFound(42))
        );
    }

    #[test]
    fn test_negative_id_fails_fast() {
        let mut state = ChainState::default();
        let op = SetObjectOperation {
            id: -1,
            obj: ObjectRecord::new(ObjectKind::Normal, owners(&[1]), vec![]),
        };
        assert!(matches!(
            op.evaluate(&mut state, &ctx(&[1])),
            Err(MarketError::UnsupportedObjectOperation(_))
        ));
    }
}
