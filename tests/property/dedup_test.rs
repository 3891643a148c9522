// tests/property/dedup_test.rs

use proptest::prelude::*;
use quillmaster::core::discovery::dedup_by_identity;
use quillmaster::core::errors::{ErrorCode, RemoteError};
use quillmaster::core::protocol::{NodeInstance, PeerRole, ServerEntry};
use std::collections::BTreeSet;

/// `None` models a peer that never reported an identity; the index tags the
/// entry with its configured position.
fn make_entries(ids: &[Option<u8>]) -> Vec<ServerEntry> {
    ids.iter()
        .enumerate()
        .map(|(position, id)| {
            let instance_id = id.map(|n| NodeInstance {
                permanent_uuid: format!("{n:032x}"),
                instance_seqno: position as u64,
            });
            ServerEntry {
                instance_id,
                registration: None,
                role: PeerRole::Unknown,
                error: Some(RemoteError {
                    code: ErrorCode::Unreachable,
                    message: format!("position {position}"),
                }),
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn dedup_yields_unique_sorted_identities(ids in prop::collection::vec(prop::option::of(0u8..8), 0..24)) {
        let entries = make_entries(&ids);
        let deduped = dedup_by_identity(entries);

        let identified: Vec<&str> = deduped.iter().filter_map(|e| e.uuid()).collect();
        let distinct: BTreeSet<&str> = identified.iter().copied().collect();
        prop_assert_eq!(identified.len(), distinct.len());
        prop_assert!(identified.windows(2).all(|w| w[0] < w[1]));

        let expected_distinct: BTreeSet<u8> = ids.iter().flatten().copied().collect();
        let unidentified = ids.iter().filter(|id| id.is_none()).count();
        prop_assert_eq!(deduped.len(), expected_distinct.len() + unidentified);

        // Identified entries always come before unidentified ones.
        let first_unidentified = deduped.iter().position(|e| e.uuid().is_none()).unwrap_or(deduped.len());
        prop_assert!(deduped[first_unidentified..].iter().all(|e| e.uuid().is_none()));
    }

    #[test]
    fn dedup_keeps_first_configured_entry(ids in prop::collection::vec(prop::option::of(0u8..8), 0..24)) {
        let deduped = dedup_by_identity(make_entries(&ids));
        for entry in deduped.iter().filter(|e| e.uuid().is_some()) {
            let seqno = entry.instance_id.as_ref().unwrap().instance_seqno as usize;
            let uuid = entry.uuid().unwrap();
            let first = ids
                .iter()
                .position(|id| id.map(|n| format!("{n:032x}")).as_deref() == Some(uuid))
                .unwrap();
            prop_assert_eq!(seqno, first);
        }

        let unidentified_positions: Vec<u64> = deduped
            .iter()
            .filter(|e| e.uuid().is_none())
            .map(|e| e.error.as_ref().unwrap().message.trim_start_matches("position ").parse().unwrap())
            .collect();
        prop_assert!(unidentified_positions.windows(2).all(|w| w[0] < w[1]));
    }
}
