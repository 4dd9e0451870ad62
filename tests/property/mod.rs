//! Property-based testing for azsync
//!
//! Uses proptest to check the reconciliation rules over randomly generated
//! local and remote states. Records are fed to the reconciler directly, so
//! modification times can be chosen freely.

use ::azsync::*;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One key as seen from both sides
#[derive(Debug, Clone)]
struct KeyState {
    /// Local modification time offset, if the file exists locally
    local: Option<i64>,
    /// Remote modification time offset and whether content matches
    remote: Option<(i64, bool)>,
}

fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap()
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-cA-C]{1,3}", 1..=3).prop_map(|parts| parts.join("/"))
}

fn key_state_strategy() -> impl Strategy<Value = KeyState> {
    (
        prop::option::of(-5i64..5),
        prop::option::of((-5i64..5, any::<bool>())),
    )
        .prop_filter("key must exist somewhere", |(l, r)| l.is_some() || r.is_some())
        .prop_map(|(local, remote)| KeyState { local, remote })
}

fn states_strategy() -> impl Strategy<Value = BTreeMap<String, KeyState>> {
    prop::collection::btree_map(key_strategy(), key_state_strategy(), 0..24)
}

/// Build an index and local records for `states`
///
/// Every local file holds the same payload; a remote object either carries
/// that payload's checksum or a different one.
fn setup(
    states: &BTreeMap<String, KeyState>,
    dir: &tempfile::TempDir,
) -> (RemoteIndex, Vec<azsync::Result<LocalFileRecord>>) {
    let local_content = b"local content";
    let mut remote = Vec::new();
    let mut local = Vec::new();

    for (key, state) in states {
        if let Some((offset, same)) = state.remote {
            let checksum = if same {
                ContentChecksum::of(local_content)
            } else {
                ContentChecksum::of(b"something else")
            };
            remote.push(RemoteObjectRecord {
                key: key.clone(),
                last_modified: at(offset),
                content_checksum: Some(checksum),
                size: 0,
            });
        }
        if let Some(offset) = state.local {
            let file_name = ContentChecksum::of(key.as_bytes()).to_hex();
            let path: PathBuf = dir.path().join(file_name);
            std::fs::write(&path, local_content).unwrap();
            local.push(Ok(LocalFileRecord {
                relative_path: key.clone(),
                absolute_path: path,
                mod_time: at(offset),
                size: local_content.len() as u64,
            }));
        }
    }

    (RemoteIndex::from_records(remote), local)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_plan_matches_set_formula(states in states_strategy(), workers in 1usize..4) {
        let dir = tempfile::TempDir::new().unwrap();
        let (index, local) = setup(&states, &dir);

        let plan = Reconciler::new()
            .with_parallel_workers(workers)
            .reconcile_records(&index, local)
            .unwrap();

        let expected_uploads: Vec<&String> = states
            .iter()
            .filter(|(_, s)| match (s.local, s.remote) {
                (Some(_), None) => true,
                (Some(l), Some((r, same))) => l > r && !same,
                _ => false,
            })
            .map(|(k, _)| k)
            .collect();
        let expected_deletes: Vec<&String> = states
            .iter()
            .filter(|(_, s)| s.local.is_none())
            .map(|(k, _)| k)
            .collect();

        let uploads: Vec<&String> = plan.uploads().map(|op| &op.path).collect();
        let deletes: Vec<&String> = plan.deletes().map(|op| &op.path).collect();
        prop_assert_eq!(uploads, expected_uploads);
        prop_assert_eq!(deletes, expected_deletes);
    }

    #[test]
    fn prop_uploads_precede_deletes(states in states_strategy()) {
        let dir = tempfile::TempDir::new().unwrap();
        let (index, local) = setup(&states, &dir);
        let plan = Reconciler::new().reconcile_records(&index, local).unwrap();

        let first_delete = plan
            .operations
            .iter()
            .position(|op| op.kind == OperationKind::Delete)
            .unwrap_or(plan.len());
        prop_assert!(plan.operations[first_delete..].iter().all(|op| op.kind == OperationKind::Delete));
    }

    #[test]
    fn prop_only_newer_files_are_checksummed(states in states_strategy()) {
        let dir = tempfile::TempDir::new().unwrap();
        let (index, local) = setup(&states, &dir);
        let plan = Reconciler::new().reconcile_records(&index, local).unwrap();

        let newer = states
            .values()
            .filter(|s| matches!((s.local, s.remote), (Some(l), Some((r, _))) if l > r))
            .count();
        prop_assert_eq!(plan.stats.checksummed, newer);
    }

    #[test]
    fn prop_every_key_appears_at_most_once(states in states_strategy()) {
        let dir = tempfile::TempDir::new().unwrap();
        let (index, local) = setup(&states, &dir);
        let plan = Reconciler::new().reconcile_records(&index, local).unwrap();

        let keys: BTreeSet<&String> = plan.operations.iter().map(|op| &op.path).collect();
        prop_assert_eq!(keys.len(), plan.len());
    }
}
