// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only helpers shared across workspace crates (feature `test-support`).

use crate::committee::{Committee, CommitteeKind, EpochSnapshot, Role};
use crate::crypto::{IdentitySigner, PublicKey, Signer};
use crate::hash::Hash;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::collections::HashSet;

/// Generate a fresh identity signer, for tests that need a real keypair
/// without wiring up key-file loading.
pub fn fresh_signer() -> IdentitySigner {
    IdentitySigner::from_signing_key(SigningKey::generate(&mut OsRng))
}

/// Build a minimal epoch snapshot where `local_key` is a worker in the
/// executor committee and `scheduler_key` is the sole transaction-scheduler
/// committee member. Storage/merge committees are populated from
/// `storage_keys`.
pub fn snapshot_for(
    local_key: PublicKey,
    executor_role: Role,
    scheduler_key: PublicKey,
    storage_keys: Vec<PublicKey>,
) -> EpochSnapshot {
    let mut executor_keys = HashSet::new();
    executor_keys.insert(local_key);

    EpochSnapshot {
        epoch: 1,
        executor_committee: Committee {
            public_keys: executor_keys,
            local_role: executor_role,
            committee_id: Hash::digest(b"executor-committee"),
        },
        storage_committee: Committee {
            public_keys: storage_keys.into_iter().collect(),
            local_role: Role::NonMember,
            committee_id: Hash::digest(b"storage-committee"),
        },
        transaction_scheduler_committee: Committee {
            public_keys: [scheduler_key].into_iter().collect(),
            local_role: Role::NonMember,
            committee_id: Hash::digest(b"scheduler-committee"),
        },
        merge_committee: Committee {
            public_keys: HashSet::new(),
            local_role: Role::NonMember,
            committee_id: Hash::digest(b"merge-committee"),
        },
    }
}

#[allow(dead_code)]
pub fn committee_kinds() -> [CommitteeKind; 4] {
    [CommitteeKind::Executor, CommitteeKind::Storage, CommitteeKind::TransactionScheduler, CommitteeKind::Merge]
}
