//! Earned-credit issuance requests
//!
//! A request is an append-only chain of witnesses; its status is never stored, it
//! is derived by replaying the chain. Each transition method checks its guards and
//! then appends exactly one witness, so a rejected call leaves the chain untouched.
use crate::error::ComplianceError;
use crate::types::{TimeStamp, Tonnes};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    IndustryUser,
    #[n(1)]
    Analyst,
    #[n(2)]
    Director,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::IndustryUser => "industry_user",
            Role::Analyst => "analyst",
            Role::Director => "director",
        }
    }
}

/// Who is acting. Backed by whatever session store the caller uses.
pub trait Session {
    fn current_role(&self) -> Role;
    fn user_addr(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_addr: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_addr: impl Into<String>, role: Role) -> Self {
        Self {
            user_addr: user_addr.into(),
            role,
        }
    }
}

impl Session for Actor {
    fn current_role(&self) -> Role {
        self.role
    }
    fn user_addr(&self) -> &str {
        &self.user_addr
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystSuggestion {
    #[n(0)]
    ReadyToApprove,
    #[n(1)]
    RequiringChangeOfBccrHoldingAccountId,
    #[n(2)]
    RequiringSupplementaryReport,
}

impl AnalystSuggestion {
    /// Once given, industry may no longer edit the request.
    pub fn is_final(&self) -> bool {
        !matches!(self, AnalystSuggestion::RequiringChangeOfBccrHoldingAccountId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStatus {
    CreditsNotIssued,
    IssuanceRequested,
    ChangesRequired,
    Approved,
    Declined,
}

impl IssuanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceStatus::CreditsNotIssued => "CREDITS_NOT_ISSUED",
            IssuanceStatus::IssuanceRequested => "ISSUANCE_REQUESTED",
            IssuanceStatus::ChangesRequired => "CHANGES_REQUIRED",
            IssuanceStatus::Approved => "APPROVED",
            IssuanceStatus::Declined => "DECLINED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IssuanceStatus::Approved | IssuanceStatus::Declined | IssuanceStatus::ChangesRequired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Witness {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub user_addr: String,
    #[n(2)]
    pub role: Role,
    #[n(3)]
    pub user_timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub witness_type: WitnessType,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum WitnessType {
    #[n(0)]
    Request {
        #[n(0)]
        bccr_holding_account_id: String,
    },
    #[n(1)]
    UpdateHoldingAccount {
        #[n(0)]
        bccr_holding_account_id: String,
    },
    #[n(2)]
    Suggest {
        #[n(0)]
        suggestion: AnalystSuggestion,
        #[n(1)]
        comment: String,
    },
    #[n(3)]
    Approve {
        #[n(0)]
        comment: String,
    },
    #[n(4)]
    Decline {
        #[n(0)]
        comment: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct IssuanceRequest {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub version_id: String,
    #[n(2)]
    pub operation_id: String,
    #[n(3)]
    pub period: u16,
    #[n(4)]
    pub credited_emissions: Tonnes,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub witness_set: Vec<Witness>,
}

impl Witness {
    pub fn new(
        request_id: String,
        user_addr: String,
        role: Role,
        user_timestamp: TimeStamp<Utc>,
        witness_type: WitnessType,
    ) -> Self {
        Self {
            request_id,
            user_addr,
            role,
            user_timestamp,
            witness_type,
        }
    }
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

/// A 15 digit BCCR holding account number.
pub fn validate_holding_account(account_id: &str) -> Result<(), ComplianceError> {
    if account_id.len() == 15 && account_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ComplianceError::InvalidHoldingAccount(account_id.to_string()))
    }
}

impl IssuanceRequest {
    pub fn new(
        request_id: String,
        version_id: String,
        operation_id: String,
        period: u16,
        credited_emissions: Tonnes,
        created_at: TimeStamp<Utc>,
    ) -> Self {
        Self {
            request_id,
            version_id,
            operation_id,
            period,
            credited_emissions,
            created_at,
            witness_set: vec![],
        }
    }

    pub fn insert_witness(&mut self, witness: Witness) {
        self.witness_set.push(witness);
    }

    /// Replays the chain. Witnesses that do not apply in the state reached so far
    /// are ignored, and the first terminal state sticks.
    pub fn current_state(&self) -> IssuanceStatus {
        let mut state = IssuanceStatus::CreditsNotIssued;
        let mut suggestion = None;

        for witness in &self.witness_set {
            if state.is_terminal() {
                break;
            }
            match (&witness.witness_type, state) {
                (WitnessType::Request { .. }, IssuanceStatus::CreditsNotIssued) => {
                    state = IssuanceStatus::IssuanceRequested;
                }
                (WitnessType::UpdateHoldingAccount { .. }, IssuanceStatus::IssuanceRequested) => {
                    suggestion = None;
                }
                (WitnessType::Suggest { suggestion: s, .. }, IssuanceStatus::IssuanceRequested) => {
                    suggestion = Some(*s);
                }
                (WitnessType::Approve { .. }, IssuanceStatus::IssuanceRequested) => {
                    state = IssuanceStatus::Approved;
                }
                (WitnessType::Decline { .. }, IssuanceStatus::IssuanceRequested) => {
                    state = if suggestion == Some(AnalystSuggestion::RequiringSupplementaryReport) {
                        IssuanceStatus::ChangesRequired
                    } else {
                        IssuanceStatus::Declined
                    };
                }
                _ => {}
            }
        }

        state
    }

    /// Latest analyst suggestion not cleared by a later holding account change.
    pub fn analyst_suggestion(&self) -> Option<AnalystSuggestion> {
        self.witness_set
            .iter()
            .rev()
            .find_map(|w| match &w.witness_type {
                WitnessType::Suggest { suggestion, .. } => Some(Some(*suggestion)),
                WitnessType::UpdateHoldingAccount { .. } => Some(None),
                _ => None,
            })
            .flatten()
    }

    pub fn analyst_comment(&self) -> Option<&str> {
        self.witness_set.iter().rev().find_map(|w| match &w.witness_type {
            WitnessType::Suggest { comment, .. } => Some(comment.as_str()),
            _ => None,
        })
    }

    pub fn director_comment(&self) -> Option<&str> {
        self.witness_set.iter().rev().find_map(|w| match &w.witness_type {
            WitnessType::Approve { comment } | WitnessType::Decline { comment } => {
                Some(comment.as_str())
            }
            _ => None,
        })
    }

    pub fn bccr_holding_account_id(&self) -> Option<&str> {
        self.witness_set.iter().rev().find_map(|w| match &w.witness_type {
            WitnessType::Request {
                bccr_holding_account_id,
            }
            | WitnessType::UpdateHoldingAccount {
                bccr_holding_account_id,
            } => Some(bccr_holding_account_id.as_str()),
            _ => None,
        })
    }

    fn ensure_unlocked(&self) -> Result<IssuanceStatus, ComplianceError> {
        let state = self.current_state();
        if state.is_terminal() {
            return Err(ComplianceError::RequestLocked(format!(
                "Issuance request {} is {} and can no longer be changed",
                self.request_id,
                state.as_str()
            )));
        }
        Ok(state)
    }

    fn ensure_role(session: &dyn Session, role: Role, action: &str) -> Result<(), ComplianceError> {
        if session.current_role() != role {
            return Err(ComplianceError::Unauthorized {
                action: action.to_string(),
                actual: session.current_role().as_str().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_state(
        state: IssuanceStatus,
        expected: IssuanceStatus,
        action: &str,
    ) -> Result<(), ComplianceError> {
        if state != expected {
            return Err(ComplianceError::InvalidTransition {
                action: action.to_string(),
                state: state.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn witness(&mut self, session: &dyn Session, now: TimeStamp<Utc>, witness_type: WitnessType) {
        let witness = Witness::new(
            self.request_id.clone(),
            session.user_addr().to_string(),
            session.current_role(),
            now,
            witness_type,
        );
        self.insert_witness(witness);
    }

    /// Industry asks for its earned credits to be issued into a BCCR holding account.
    pub fn request_issuance(
        &mut self,
        session: &dyn Session,
        bccr_holding_account_id: &str,
        now: TimeStamp<Utc>,
    ) -> Result<(), ComplianceError> {
        let action = "request issuance";
        let state = self.ensure_unlocked()?;
        Self::ensure_role(session, Role::IndustryUser, action)?;
        Self::ensure_state(state, IssuanceStatus::CreditsNotIssued, action)?;
        validate_holding_account(bccr_holding_account_id)?;

        self.witness(
            session,
            now,
            WitnessType::Request {
                bccr_holding_account_id: bccr_holding_account_id.to_string(),
            },
        );
        Ok(())
    }

    /// Industry corrects the holding account after the analyst asked for it.
    pub fn update_holding_account(
        &mut self,
        session: &dyn Session,
        bccr_holding_account_id: &str,
        now: TimeStamp<Utc>,
    ) -> Result<(), ComplianceError> {
        let action = "update the holding account";
        let state = self.ensure_unlocked()?;
        Self::ensure_role(session, Role::IndustryUser, action)?;
        Self::ensure_state(state, IssuanceStatus::IssuanceRequested, action)?;
        if self.analyst_suggestion().is_some_and(|s| s.is_final()) {
            return Err(ComplianceError::RequestLocked(
                "Updates are not allowed after the analyst has provided a final suggestion"
                    .to_string(),
            ));
        }
        validate_holding_account(bccr_holding_account_id)?;

        self.witness(
            session,
            now,
            WitnessType::UpdateHoldingAccount {
                bccr_holding_account_id: bccr_holding_account_id.to_string(),
            },
        );
        Ok(())
    }

    /// Analyst review. May be revised until the director decides.
    pub fn suggest(
        &mut self,
        session: &dyn Session,
        suggestion: AnalystSuggestion,
        comment: &str,
        now: TimeStamp<Utc>,
    ) -> Result<(), ComplianceError> {
        let action = "record an analyst suggestion";
        let state = self.ensure_unlocked()?;
        Self::ensure_role(session, Role::Analyst, action)?;
        Self::ensure_state(state, IssuanceStatus::IssuanceRequested, action)?;

        self.witness(
            session,
            now,
            WitnessType::Suggest {
                suggestion,
                comment: comment.to_string(),
            },
        );
        Ok(())
    }

    pub fn decide(
        &mut self,
        session: &dyn Session,
        decision: Decision,
        comment: &str,
        now: TimeStamp<Utc>,
    ) -> Result<IssuanceStatus, ComplianceError> {
        let action = match decision {
            Decision::Approve => "approve issuance",
            Decision::Decline => "decline issuance",
        };
        let state = self.ensure_unlocked()?;
        Self::ensure_role(session, Role::Director, action)?;
        Self::ensure_state(state, IssuanceStatus::IssuanceRequested, action)?;
        if self.analyst_suggestion().is_none() {
            return Err(ComplianceError::InvalidTransition {
                action: action.to_string(),
                state: "awaiting analyst suggestion".to_string(),
            });
        }

        let comment = comment.to_string();
        let witness_type = match decision {
            Decision::Approve => WitnessType::Approve { comment },
            Decision::Decline => WitnessType::Decline { comment },
        };
        self.witness(session, now, witness_type);
        Ok(self.current_state())
    }

    /// Returns the digest of the encoded request along with the encoding.
    pub fn serialize_with_hash(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }

    /// One line per witness, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.witness_set
            .iter()
            .map(|w| {
                let what = match &w.witness_type {
                    WitnessType::Request {
                        bccr_holding_account_id,
                    } => format!("requested issuance into {bccr_holding_account_id}"),
                    WitnessType::UpdateHoldingAccount {
                        bccr_holding_account_id,
                    } => format!("changed holding account to {bccr_holding_account_id}"),
                    WitnessType::Suggest {
                        suggestion,
                        comment,
                    } => format!("suggested {suggestion:?}: {comment}"),
                    WitnessType::Approve { comment } => format!("approved: {comment}"),
                    WitnessType::Decline { comment } => format!("declined: {comment}"),
                };
                format!(
                    "{} {} ({}) {}",
                    w.user_timestamp.to_datetime_utc().to_rfc3339(),
                    w.user_addr,
                    w.role.as_str(),
                    what
                )
            })
            .collect()
    }
}
