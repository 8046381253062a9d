use crate::types::{Date, Money};

/// How a caller is expected to react to a [`ComplianceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lost race or locked record. Retry (once) or refuse, never overwrite.
    Conflict,
    /// Request breaks a billing or workflow rule. Surface it, never auto-correct.
    PolicyViolation,
    NotFound,
    /// Rejected before anything was written.
    InvalidInput,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("Active version for {operation_id}/{period} changed: expected {expected:?}, found {found:?}")]
    VersionConflict {
        operation_id: String,
        period: u16,
        expected: Option<String>,
        found: Option<String>,
    },
    #[error("Invoice #{0} is already void")]
    AlreadyVoid(u64),
    #[error("{0}")]
    RequestLocked(String),
    #[error("An issuance request for version {0} is awaiting a decision")]
    IssuanceInProgress(String),
    #[error("Payment of {amount} exceeds the outstanding balance of {outstanding}")]
    OverpaymentRejected { amount: Money, outstanding: Money },
    #[error("Invoice #{0} is void and cannot be changed")]
    InvoiceIsVoid(u64),
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("Role {actual} may not {action}")]
    Unauthorized { action: String, actual: String },
    #[error("Cannot {action} while the request is {state}")]
    InvalidTransition { action: String, state: String },
    #[error("BCCR holding account id must be 15 digits, got {0:?}")]
    InvalidHoldingAccount(String),
    #[error("Version {0} not found")]
    VersionNotFound(String),
    #[error("No active version for {operation_id}/{period}")]
    NoActiveVersion { operation_id: String, period: u16 },
    #[error("Invoice {0} not found")]
    InvoiceNotFound(String),
    #[error("Issuance request {0} not found")]
    RequestNotFound(String),
    #[error("Invalid emissions input: {0}")]
    InvalidEmissions(String),
    #[error("No charge rate configured for compliance period {0}")]
    UnknownChargeRate(u16),
    #[error("{kind} accrued up to {as_of} exceeds the representable amount")]
    AccrualOverflow { kind: String, as_of: Date },
}

impl ComplianceError {
    pub fn kind(&self) -> ErrorKind {
        use ComplianceError::*;

        match self {
            VersionConflict { .. } | AlreadyVoid(_) | RequestLocked(_) | IssuanceInProgress(_) => {
                ErrorKind::Conflict
            }
            OverpaymentRejected { .. }
            | InvoiceIsVoid(_)
            | InvalidAmount(_)
            | Unauthorized { .. }
            | InvalidTransition { .. }
            | InvalidHoldingAccount(_) => ErrorKind::PolicyViolation,
            VersionNotFound(_) | NoActiveVersion { .. } | InvoiceNotFound(_) | RequestNotFound(_) => {
                ErrorKind::NotFound
            }
            InvalidEmissions(_) | UnknownChargeRate(_) | AccrualOverflow { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// Only a lost optimistic-concurrency race is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ComplianceError::VersionConflict { .. })
    }
}

/// Classify an error coming out of the service layer, if it is a domain error.
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<ComplianceError>().map(ComplianceError::kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_classified() {
        assert_eq!(ComplianceError::AlreadyVoid(3).kind(), ErrorKind::Conflict);
        assert_eq!(
            ComplianceError::RequestLocked("locked".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(ComplianceError::InvoiceIsVoid(3).kind(), ErrorKind::PolicyViolation);
    }

    #[test]
    fn only_version_conflict_is_retryable() {
        let conflict = ComplianceError::VersionConflict {
            operation_id: "op".into(),
            period: 2024,
            expected: None,
            found: Some("version_1".into()),
        };
        assert!(conflict.is_retryable());
        assert!(!ComplianceError::AlreadyVoid(1).is_retryable());
    }

    #[test]
    fn kind_of_downcasts_anyhow() {
        let err: anyhow::Error = ComplianceError::InvoiceNotFound("invoice_x".into()).into();
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));

        let other = anyhow::anyhow!("disk on fire");
        assert_eq!(kind_of(&other), None);
    }
}
