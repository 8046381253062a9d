//! Version ledger: the ordered report versions of each operation and compliance period
//!
//! Two pointers are kept per (operation, period):
//!
//! - `head` is the newest version that was created and not withdrawn
//! - `active` is the newest version whose invoice action committed
//!
//! They only differ while a version is pending. A new version may only be created
//! when they agree, which is what turns concurrent supplementary submissions into a
//! `VersionConflict` instead of two versions superseding the same predecessor.
use crate::error::ComplianceError;
use crate::invoice::VersionRef;
use crate::obligation::{Classification, EmissionsInput, Obligation};
use crate::store::{self, TxResult, abort};
use crate::types::TimeStamp;
use crate::utils::keys;
use chrono::Utc;
use sled::transaction::TransactionalTree;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Active,
    #[n(2)]
    Superseded,
    #[n(3)]
    Withdrawn,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Pending => "PENDING",
            VersionStatus::Active => "ACTIVE",
            VersionStatus::Superseded => "SUPERSEDED",
            VersionStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ReportVersion {
    #[n(0)]
    pub version_id: String, // bech32 encoded uuid7
    #[n(1)]
    pub operation_id: String,
    #[n(2)]
    pub period: u16,
    #[n(3)]
    pub version_number: u32,
    #[n(4)]
    pub input_hash: String, // sha256 of the CBOR encoded emissions input
    #[n(5)]
    pub emissions: EmissionsInput,
    #[n(6)]
    pub obligation: Obligation,
    #[n(7)]
    pub supersedes: Option<String>,
    #[n(8)]
    pub status: VersionStatus,
    #[n(9)]
    pub submitted_at: TimeStamp<Utc>,
}

/// Everything needed to append a version, computed before the ledger is touched.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version_id: String,
    pub operation_id: String,
    pub period: u16,
    pub input_hash: String,
    pub emissions: EmissionsInput,
    pub obligation: Obligation,
    pub submitted_at: TimeStamp<Utc>,
}

impl ReportVersion {
    pub fn classification(&self) -> Classification {
        self.obligation.classification
    }

    pub fn is_active(&self) -> bool {
        self.status == VersionStatus::Active
    }

    pub fn version_ref(&self) -> VersionRef {
        VersionRef {
            version_id: self.version_id.clone(),
            operation_id: self.operation_id.clone(),
            period: self.period,
        }
    }
}

fn conflict(
    operation_id: &str,
    period: u16,
    expected: Option<&str>,
    found: Option<String>,
) -> ComplianceError {
    ComplianceError::VersionConflict {
        operation_id: operation_id.to_string(),
        period,
        expected: expected.map(str::to_string),
        found,
    }
}

pub fn load(tx: &TransactionalTree, version_id: &str) -> TxResult<ReportVersion> {
    match store::tx_get(tx, &keys::version(version_id))? {
        Some(version) => Ok(version),
        None => abort(ComplianceError::VersionNotFound(version_id.to_string())),
    }
}

pub fn active_id(tx: &TransactionalTree, operation_id: &str, period: u16) -> TxResult<Option<String>> {
    store::tx_get_id(tx, &keys::active(operation_id, period))
}

/// Append a pending version on top of `expected_active`.
pub fn append(
    tx: &TransactionalTree,
    draft: &NewVersion,
    expected_active: Option<&str>,
) -> TxResult<ReportVersion> {
    let op = draft.operation_id.as_str();
    let active = active_id(tx, op, draft.period)?;
    if active.as_deref() != expected_active {
        return abort(conflict(op, draft.period, expected_active, active));
    }

    // a pending sibling already supersedes the active version
    let head = store::tx_get_id(tx, &keys::head(op, draft.period))?;
    if head != active {
        return abort(conflict(op, draft.period, expected_active, head));
    }

    let previous_number = match &active {
        Some(id) => load(tx, id)?.version_number,
        None => 0,
    };
    let last_number = store::tx_get_u64(tx, &keys::last_number(op, draft.period))?;
    let version_number = u64::from(previous_number).max(last_number) + 1;
    let version_number = match u32::try_from(version_number) {
        Ok(n) => n,
        Err(err) => return abort(err),
    };

    let version = ReportVersion {
        version_id: draft.version_id.clone(),
        operation_id: draft.operation_id.clone(),
        period: draft.period,
        version_number,
        input_hash: draft.input_hash.clone(),
        emissions: draft.emissions,
        obligation: draft.obligation,
        supersedes: active,
        status: VersionStatus::Pending,
        submitted_at: draft.submitted_at.clone(),
    };

    store::tx_put(tx, &keys::version(&version.version_id), &version)?;
    store::tx_put_id(tx, &keys::head(op, draft.period), &version.version_id)?;
    store::tx_put_u64(tx, &keys::last_number(op, draft.period), u64::from(version_number))?;

    Ok(version)
}

/// Make a pending version the active one. Returns the version it superseded.
pub fn activate(tx: &TransactionalTree, version: &mut ReportVersion) -> TxResult<Option<ReportVersion>> {
    let op = version.operation_id.clone();
    if version.status != VersionStatus::Pending {
        return abort(ComplianceError::InvalidTransition {
            action: "activate version".to_string(),
            state: version.status.as_str().to_string(),
        });
    }

    let active = active_id(tx, &op, version.period)?;
    if active != version.supersedes {
        return abort(conflict(&op, version.period, version.supersedes.as_deref(), active));
    }

    let superseded = match &active {
        Some(id) => {
            let mut prior = load(tx, id)?;
            prior.status = VersionStatus::Superseded;
            store::tx_put(tx, &keys::version(id), &prior)?;
            Some(prior)
        }
        None => None,
    };

    version.status = VersionStatus::Active;
    store::tx_put(tx, &keys::version(&version.version_id), version)?;
    store::tx_put_id(tx, &keys::active(&op, version.period), &version.version_id)?;

    Ok(superseded)
}

/// Drop a pending version. Its number is not handed out again.
pub fn withdraw(tx: &TransactionalTree, version_id: &str) -> TxResult<ReportVersion> {
    let mut version = load(tx, version_id)?;
    if version.status != VersionStatus::Pending {
        return abort(ComplianceError::InvalidTransition {
            action: "withdraw version".to_string(),
            state: version.status.as_str().to_string(),
        });
    }

    version.status = VersionStatus::Withdrawn;
    store::tx_put(tx, &keys::version(version_id), &version)?;

    let head_key = keys::head(&version.operation_id, version.period);
    match &version.supersedes {
        Some(prior) => store::tx_put_id(tx, &head_key, prior)?,
        None => {
            tx.remove(head_key.as_bytes())?;
        }
    }

    Ok(version)
}
