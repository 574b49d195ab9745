// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable per-epoch committee membership snapshot.
//!
//! `EpochSnapshot` is produced by the (out-of-scope) consensus/registry
//! backend and handed to the node on each epoch transition. Nothing in this
//! module mutates a snapshot after construction — committee membership for
//! an epoch is fixed once observed.

use crate::crypto::{verify, PublicKey, Signature};
use crate::hash::Hash;
use std::collections::HashSet;

/// Which role this node holds within a committee for the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Worker,
    BackupWorker,
    NonMember,
}

/// The kind of committee a set of signatures is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitteeKind {
    Executor,
    Storage,
    TransactionScheduler,
    Merge,
}

crate::simple_display! {
    CommitteeKind {
        Executor => "executor",
        Storage => "storage",
        TransactionScheduler => "transaction-scheduler",
        Merge => "merge",
    }
}

/// A single committee's membership for an epoch.
#[derive(Debug, Clone)]
pub struct Committee {
    pub public_keys: HashSet<PublicKey>,
    pub local_role: Role,
    pub committee_id: Hash,
}

impl Committee {
    pub fn is_member(&self, key: &PublicKey) -> bool {
        self.public_keys.contains(key)
    }
}

impl EpochSnapshot {
    /// Check membership only, without verifying any signature. Used where a
    /// signature's message isn't known yet (e.g. admission step 4, ahead of
    /// the step-6 receipt-body reconstruction that supplies the message).
    pub fn verify_committee_membership(
        &self,
        kind: CommitteeKind,
        signers: &[(PublicKey, Signature)],
    ) -> Result<(), CommitteeError> {
        let committee = self.committee(kind);
        for (public_key, _) in signers {
            if !committee.is_member(public_key) {
                return Err(CommitteeError::NotAMember(kind));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommitteeError {
    #[error("signature is not from a current member of the {0} committee")]
    NotAMember(CommitteeKind),
    #[error("signature verification failed: {0}")]
    Verification(#[from] crate::crypto::CryptoError),
}

/// Immutable per-epoch view of committee membership, roles, and public keys.
///
/// Updated only at epoch-transition hooks (§4.4); every other read-path
/// treats a snapshot as frozen.
#[derive(Debug, Clone)]
pub struct EpochSnapshot {
    pub epoch: u64,
    pub executor_committee: Committee,
    pub storage_committee: Committee,
    pub transaction_scheduler_committee: Committee,
    pub merge_committee: Committee,
}

impl EpochSnapshot {
    pub fn is_executor_member(&self) -> bool {
        !matches!(self.executor_committee.local_role, Role::NonMember)
    }

    pub fn is_executor_worker(&self) -> bool {
        matches!(self.executor_committee.local_role, Role::Worker)
    }

    pub fn is_executor_backup_worker(&self) -> bool {
        matches!(self.executor_committee.local_role, Role::BackupWorker)
    }

    pub fn is_merge_member(&self) -> bool {
        !matches!(self.merge_committee.local_role, Role::NonMember)
    }

    pub fn executor_committee_id(&self) -> Hash {
        self.executor_committee.committee_id
    }

    pub fn committee(&self, kind: CommitteeKind) -> &Committee {
        match kind {
            CommitteeKind::Executor => &self.executor_committee,
            CommitteeKind::Storage => &self.storage_committee,
            CommitteeKind::TransactionScheduler => &self.transaction_scheduler_committee,
            CommitteeKind::Merge => &self.merge_committee,
        }
    }

    /// Verify that every signature in `signatures` was produced by a current
    /// member of the committee of kind `kind`, over `message`.
    ///
    /// Does not check quorum (`MinWriteReplication` is a separate check on
    /// the caller side) — this only rejects signatures from non-members or
    /// signatures that don't verify at all.
    pub fn verify_committee_signatures(
        &self,
        kind: CommitteeKind,
        message: &[u8],
        signatures: &[(PublicKey, Signature)],
    ) -> Result<(), CommitteeError> {
        let committee = self.committee(kind);
        for (public_key, signature) in signatures {
            if !committee.is_member(public_key) {
                return Err(CommitteeError::NotAMember(kind));
            }
            verify(public_key, message, signature)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{IdentitySigner, Signer as SignerTrait};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn committee_of(keys: Vec<PublicKey>, role: Role) -> Committee {
        Committee { public_keys: keys.into_iter().collect(), local_role: role, committee_id: Hash::zero() }
    }

    #[test]
    fn verify_committee_signatures_rejects_non_member() {
        let member = IdentitySigner::from_signing_key(SigningKey::generate(&mut OsRng));
        let outsider = IdentitySigner::from_signing_key(SigningKey::generate(&mut OsRng));

        let snapshot = EpochSnapshot {
            epoch: 1,
            executor_committee: committee_of(vec![member.public_key()], Role::Worker),
            storage_committee: committee_of(vec![member.public_key()], Role::NonMember),
            transaction_scheduler_committee: committee_of(vec![], Role::NonMember),
            merge_committee: committee_of(vec![], Role::NonMember),
        };

        let message = b"body";
        let sig = outsider.sign(message);
        let result = snapshot.verify_committee_signatures(
            CommitteeKind::Storage,
            message,
            &[(outsider.public_key(), sig)],
        );
        assert!(matches!(result, Err(CommitteeError::NotAMember(CommitteeKind::Storage))));
    }

    #[test]
    fn verify_committee_signatures_accepts_member() {
        let member = IdentitySigner::from_signing_key(SigningKey::generate(&mut OsRng));
        let snapshot = EpochSnapshot {
            epoch: 1,
            executor_committee: committee_of(vec![member.public_key()], Role::Worker),
            storage_committee: committee_of(vec![member.public_key()], Role::NonMember),
            transaction_scheduler_committee: committee_of(vec![], Role::NonMember),
            merge_committee: committee_of(vec![], Role::NonMember),
        };
        let message = b"body";
        let sig = member.sign(message);
        snapshot
            .verify_committee_signatures(CommitteeKind::Storage, message, &[(member.public_key(), sig)])
            .expect("member signature must verify");
    }
}
