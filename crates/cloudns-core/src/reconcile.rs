//! RRset reconciliation
//!
//! Computes the operations that move the provider's records towards a desired
//! set. Only RRsets named on the desired side are visited; anything else in
//! the zone is left alone.
//!
//! ## Positional diff
//!
//! Inside an RRset, existing and desired records are compared by position,
//! not matched by content. Inserting a record in the middle of a group, or
//! listing the two sides in different orders, therefore yields `modify`
//! operations where a content match would have yielded a single `add`.
//! Callers may rely on this exact operation sequence.
//!
//! ## Ordering
//!
//! All deletions come first, deduplicated by full record value, followed by
//! adds and modifies in RRset order. Deleting first keeps the provider from
//! rejecting a create because a stale record still occupies the name.

use std::collections::HashSet;
use std::fmt;

use crate::codec::{self, ProviderRecord};
use crate::record::Record;
use crate::rrset::Rrsets;

/// Kind of change an operation applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create a record; the provider assigns its identifier
    Add,
    /// Overwrite the record with the carried identifier
    Modify,
    /// Remove the record with the carried identifier
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Add => write!(f, "add"),
            OperationKind::Modify => write!(f, "modify"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A single change against the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub record: ProviderRecord,
}

impl Operation {
    pub fn add(record: ProviderRecord) -> Self {
        Self {
            kind: OperationKind::Add,
            record,
        }
    }

    pub fn modify(record: ProviderRecord) -> Self {
        Self {
            kind: OperationKind::Modify,
            record,
        }
    }

    pub fn delete(record: ProviderRecord) -> Self {
        Self {
            kind: OperationKind::Delete,
            record,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:?}",
            self.kind, self.record.record_type, self.record.host, self.record.record
        )?;
        if !self.record.id.is_empty() {
            write!(f, " (id {})", self.record.id)?;
        }
        Ok(())
    }
}

/// What sits at one position of an existing/desired pair of sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<A, B> {
    Both(A, B),
    ExistingOnly(A),
    DesiredOnly(B),
}

/// Walk two sequences in lockstep to the end of the longer one
///
/// Unlike `zip`, a length mismatch is never truncated away: every position
/// of both inputs is yielded exactly once.
pub fn positions<'a, A, B>(existing: &'a [A], desired: &'a [B]) -> Positions<'a, A, B> {
    Positions {
        existing,
        desired,
        index: 0,
    }
}

/// Iterator returned by [`positions`]
#[derive(Debug)]
pub struct Positions<'a, A, B> {
    existing: &'a [A],
    desired: &'a [B],
    index: usize,
}

impl<'a, A, B> Iterator for Positions<'a, A, B> {
    type Item = Slot<&'a A, &'a B>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = match (self.existing.get(self.index), self.desired.get(self.index)) {
            (Some(e), Some(d)) => Slot::Both(e, d),
            (Some(e), None) => Slot::ExistingOnly(e),
            (None, Some(d)) => Slot::DesiredOnly(d),
            (None, None) => return None,
        };
        self.index += 1;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .existing
            .len()
            .max(self.desired.len())
            .saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<A, B> ExactSizeIterator for Positions<'_, A, B> {}

/// Deletions collected across RRsets, deduplicated by full record value
#[derive(Debug, Default)]
struct Deletions {
    seen: HashSet<ProviderRecord>,
    ordered: Vec<ProviderRecord>,
}

impl Deletions {
    fn insert(&mut self, record: &ProviderRecord) {
        if self.seen.insert(record.clone()) {
            self.ordered.push(record.clone());
        }
    }
}

/// Compute the ordered operation list for a desired and existing state
pub fn reconcile(desired: &Rrsets<Record>, existing: &Rrsets<ProviderRecord>) -> Vec<Operation> {
    let mut changes = Vec::with_capacity(desired.len());
    let mut deletions = Deletions::default();

    for (key, desired_set) in desired {
        match existing.get(key) {
            Some(existing_set) if !existing_set.is_empty() => {
                reconcile_rrset(existing_set, desired_set, &mut deletions, &mut changes);
            }
            _ => changes.extend(
                desired_set
                    .iter()
                    .map(|record| Operation::add(codec::encode(record, ""))),
            ),
        }
    }

    let mut operations = Vec::with_capacity(deletions.ordered.len() + changes.len());
    operations.extend(deletions.ordered.into_iter().map(Operation::delete));
    operations.extend(changes);
    operations
}

fn reconcile_rrset(
    existing: &[ProviderRecord],
    desired: &[Record],
    deletions: &mut Deletions,
    changes: &mut Vec<Operation>,
) {
    for slot in positions(existing, desired) {
        match slot {
            Slot::Both(current, wanted) => {
                let modified = codec::encode(wanted, &current.id);
                if !current.content_eq(&modified) {
                    changes.push(Operation::modify(modified));
                }
            }
            Slot::ExistingOnly(current) => deletions.insert(current),
            Slot::DesiredOnly(wanted) => changes.push(Operation::add(codec::encode(wanted, ""))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Address, Rr};
    use crate::rrset::{RrsetKey, group};
    use std::time::Duration;

    fn a(name: &str, ip: &str) -> Record {
        Record::Address(Address {
            name: name.to_string(),
            ttl: Duration::from_secs(60),
            ip: ip.parse().unwrap(),
        })
    }

    fn stored(id: &str, record_type: &str, host: &str, data: &str) -> ProviderRecord {
        ProviderRecord {
            id: id.to_string(),
            record_type: record_type.to_string(),
            host: host.to_string(),
            record: data.to_string(),
            ttl: "60".to_string(),
            ..ProviderRecord::default()
        }
    }

    #[test]
    fn test_positions_covers_the_longer_side() {
        let slots: Vec<_> = positions(&[1, 2, 3], &['a']).collect();
        assert_eq!(
            slots,
            vec![
                Slot::Both(&1, &'a'),
                Slot::ExistingOnly(&2),
                Slot::ExistingOnly(&3)
            ]
        );

        let slots: Vec<_> = positions::<i32, char>(&[], &['a', 'b']).collect();
        assert_eq!(slots, vec![Slot::DesiredOnly(&'a'), Slot::DesiredOnly(&'b')]);
        assert_eq!(positions(&[1], &['a', 'b', 'c']).len(), 3);
    }

    #[test]
    fn test_no_operations_for_empty_inputs() {
        assert!(reconcile(&Rrsets::new(), &Rrsets::new()).is_empty());
    }

    #[test]
    fn test_shrinking_rrset_deletes_before_modifying() {
        let desired = group(vec![a("example.com", "192.0.2.3")]);
        let existing = group(vec![
            stored("1", "A", "example.com", "192.0.2.1"),
            stored("2", "A", "example.com", "192.0.2.2"),
        ]);

        let ops = reconcile(&desired, &existing);

        assert_eq!(
            ops,
            vec![
                Operation::delete(stored("2", "A", "example.com", "192.0.2.2")),
                Operation::modify(stored("1", "A", "example.com", "192.0.2.3")),
            ]
        );
    }

    #[test]
    fn test_only_named_rrsets_are_touched() {
        let desired = group(vec![
            a("a.example.com", "2001:db8::1"),
            a("a.example.com", "2001:db8::2"),
            a("a.example.com", "2001:db8::5"),
        ]);
        let existing = group(vec![
            stored("1", "AAAA", "a.example.com", "2001:db8::1"),
            stored("2", "AAAA", "a.example.com", "2001:db8::2"),
            stored("3", "AAAA", "b.example.com", "2001:db8::3"),
            stored("4", "AAAA", "b.example.com", "2001:db8::4"),
        ]);

        let ops = reconcile(&desired, &existing);

        assert_eq!(
            ops,
            vec![Operation::add(stored("", "AAAA", "a.example.com", "2001:db8::5"))]
        );
    }

    #[test]
    fn test_new_rrset_is_pure_adds() {
        let desired = group(vec![
            a("foo.example.com", "192.0.2.3"),
            a("foo.example.com", "192.0.2.4"),
        ]);
        let existing = group(vec![
            stored("1", "A", "example.com", "192.0.2.1"),
            stored("2", "A", "example.com", "192.0.2.2"),
        ]);

        let ops = reconcile(&desired, &existing);

        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.kind == OperationKind::Add));
        assert!(ops.iter().all(|op| op.record.id.is_empty()));
        assert_eq!(ops[0].record.record, "192.0.2.3");
        assert_eq!(ops[1].record.record, "192.0.2.4");
    }

    #[test]
    fn test_empty_existing_group_counts_as_absent() {
        let desired = group(vec![a("example.com", "192.0.2.1")]);
        let mut existing = Rrsets::new();
        existing.insert(RrsetKey::new("example.com", "A"), Vec::new());

        let ops = reconcile(&desired, &existing);
        assert_eq!(ops, vec![Operation::add(stored("", "A", "example.com", "192.0.2.1"))]);
    }

    #[test]
    fn test_identical_rrset_produces_nothing() {
        let desired = group(vec![a("example.com", "192.0.2.1")]);
        let existing = group(vec![stored("1", "A", "example.com", "192.0.2.1")]);
        assert!(reconcile(&desired, &existing).is_empty());
    }

    #[test]
    fn test_reordered_sides_produce_modifies() {
        let desired = group(vec![a("example.com", "192.0.2.2"), a("example.com", "192.0.2.1")]);
        let existing = group(vec![
            stored("1", "A", "example.com", "192.0.2.1"),
            stored("2", "A", "example.com", "192.0.2.2"),
        ]);

        let ops = reconcile(&desired, &existing);

        assert_eq!(
            ops,
            vec![
                Operation::modify(stored("1", "A", "example.com", "192.0.2.2")),
                Operation::modify(stored("2", "A", "example.com", "192.0.2.1")),
            ]
        );
    }

    #[test]
    fn test_ttl_change_is_a_modify_after_quantization() {
        let desired = group(vec![Record::Address(Address {
            name: "example.com".to_string(),
            ttl: Duration::from_secs(200),
            ip: "192.0.2.1".parse().unwrap(),
        })]);
        let existing = group(vec![stored("1", "A", "example.com", "192.0.2.1")]);

        let ops = reconcile(&desired, &existing);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Modify);
        assert_eq!(ops[0].record.ttl, "300");
    }

    #[test]
    fn test_duplicate_existing_records_are_deleted_once() {
        // The provider listing may repeat a record under one RRset key.
        let dup = stored("9", "TXT", "example.com", "old");
        let desired = group(vec![Record::Raw(Rr::new(
            "example.com",
            "TXT",
            Duration::from_secs(60),
            "new",
        ))]);
        let existing = group(vec![
            stored("1", "TXT", "example.com", "new"),
            dup.clone(),
            dup.clone(),
        ]);

        let ops = reconcile(&desired, &existing);

        let deletes: Vec<_> = ops
            .iter()
            .filter(|op| op.kind == OperationKind::Delete)
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].record, dup);
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_deletes_precede_changes_across_rrsets() {
        let desired = group(vec![
            a("a.example.com", "192.0.2.10"),
            a("z.example.com", "192.0.2.20"),
        ]);
        let existing = group(vec![
            stored("1", "A", "z.example.com", "192.0.2.1"),
            stored("2", "A", "z.example.com", "192.0.2.2"),
        ]);

        let ops = reconcile(&desired, &existing);
        let kinds: Vec<_> = ops.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Delete, OperationKind::Add, OperationKind::Modify]
        );
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::modify(stored("7", "A", "example.com", "192.0.2.1"));
        assert_eq!(op.to_string(), "modify A example.com \"192.0.2.1\" (id 7)");
    }
}
