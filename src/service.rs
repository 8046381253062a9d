//! Service layer API for compliance obligation operations
//!
//! Every operation that reads and then moves the active version or current invoice
//! pointer runs inside one sled transaction. Lost races come back as
//! `ComplianceError::VersionConflict` or `ComplianceError::AlreadyVoid`; nothing is
//! retried here.
use super::clock::{Clock, SystemClock};
use super::config::EngineConfig;
use super::error::ComplianceError;
use super::invoice::{Invoice, LineItem, Payment, PaymentMethod};
use super::issuance::{AnalystSuggestion, Decision, IssuanceRequest, IssuanceStatus, Session};
use super::ledger::{self, NewVersion, ReportVersion};
use super::obligation::{self, Classification, EmissionsInput};
use super::penalty::{self, PenaltyProjection, PenaltyStatus};
use super::policy::{self, Action, InvoiceState};
use super::store::{self, TxResult, abort, lift};
use super::types::{Date, Money, TimeStamp, Tonnes};
use super::utils::{hrp, keys, new_uuid_to_bech32};
use chrono::Utc;
use sled::transaction::TransactionalTree;
use std::sync::Arc;

/// What `apply_invoice_action` did for a version. Stored so replays are answered
/// from the record instead of being executed again.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InvoiceActionRecord {
    #[n(0)]
    pub version_id: String,
    #[n(1)]
    pub action: Action,
    #[n(2)]
    pub invoice_id: Option<String>,
    #[n(3)]
    pub voided_invoice_id: Option<String>,
    #[n(4)]
    pub applied_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceActionOutcome {
    pub action_taken: Action,
    /// The invoice the period is billed on after the action, if any.
    pub invoice: Option<Invoice>,
    pub voided_invoice: Option<Invoice>,
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationSummary {
    pub version_id: String,
    pub version_number: u32,
    pub excess_emissions: Tonnes,
    pub credited_emissions: Tonnes,
    pub obligation_amount: Money,
    pub classification: Classification,
    pub invoice_number: Option<u64>,
    pub outstanding_balance: Money,
    pub credit_balance: Money,
    pub penalty_status: PenaltyStatus,
}

pub struct ComplianceService {
    instance: Arc<sled::Db>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl ComplianceService {
    pub fn new(instance: Arc<sled::Db>, config: EngineConfig) -> Self {
        Self::with_clock(instance, config, Arc::new(SystemClock))
    }

    pub fn with_clock(instance: Arc<sled::Db>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            instance,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // VERSION LEDGER

    /// Append a new report version on top of whatever is active right now.
    pub fn create_version(
        &self,
        operation_id: &str,
        period: u16,
        emissions: EmissionsInput,
    ) -> anyhow::Result<ReportVersion> {
        let expected = store::get_id(&self.instance, &keys::active(operation_id, period))?;
        self.create_version_expecting(operation_id, period, emissions, expected.as_deref())
    }

    /// Append a new report version, failing with `VersionConflict` unless
    /// `expected_active` is still the active version and nothing is pending.
    pub fn create_version_expecting(
        &self,
        operation_id: &str,
        period: u16,
        emissions: EmissionsInput,
        expected_active: Option<&str>,
    ) -> anyhow::Result<ReportVersion> {
        // Computed in full before the ledger is touched.
        let (input_hash, input_cbor) = emissions.validate_and_finalise()?;
        let charge_rate = self.config.charge_rate_for(period)?;
        let obligation = obligation::compute_for(&emissions, Money::new(charge_rate))?;

        let draft = NewVersion {
            version_id: new_uuid_to_bech32(hrp::VERSION)?,
            operation_id: operation_id.to_string(),
            period,
            input_hash: input_hash.clone(),
            emissions,
            obligation,
            submitted_at: self.clock.now(),
        };

        let version = store::transaction(&self.instance, |tx| {
            if let Some(active) = ledger::active_id(tx, operation_id, period)? {
                if let Some(request) = request_for_version(tx, &active)? {
                    if request.current_state() == IssuanceStatus::IssuanceRequested {
                        return abort(ComplianceError::IssuanceInProgress(active));
                    }
                }
            }
            tx.insert(keys::emissions(&input_hash).as_bytes(), input_cbor.clone())?;
            ledger::append(tx, &draft, expected_active)
        })?;

        tracing::info!(
            version_id = %version.version_id,
            operation_id,
            period,
            version_number = version.version_number,
            classification = ?version.classification(),
            obligation_amount = %version.obligation.obligation_amount,
            "report version created"
        );

        Ok(version)
    }

    pub fn get_version(&self, version_id: &str) -> anyhow::Result<ReportVersion> {
        store::get(&self.instance, &keys::version(version_id))?
            .ok_or_else(|| ComplianceError::VersionNotFound(version_id.to_string()).into())
    }

    pub fn get_active(&self, operation_id: &str, period: u16) -> anyhow::Result<ReportVersion> {
        match store::get_id(&self.instance, &keys::active(operation_id, period))? {
            Some(version_id) => self.get_version(&version_id),
            None => Err(ComplianceError::NoActiveVersion {
                operation_id: operation_id.to_string(),
                period,
            }
            .into()),
        }
    }

    /// The supersession chain, newest first. Includes a pending version.
    pub fn version_history(&self, operation_id: &str, period: u16) -> anyhow::Result<Vec<ReportVersion>> {
        let mut history = vec![];
        let mut next = store::get_id(&self.instance, &keys::head(operation_id, period))?;
        while let Some(version_id) = next {
            let version = self.get_version(&version_id)?;
            next = version.supersedes.clone();
            history.push(version);
        }
        Ok(history)
    }

    /// Withdraw a version whose invoice action has not run yet.
    pub fn withdraw_version(&self, version_id: &str) -> anyhow::Result<ReportVersion> {
        let version = store::transaction(&self.instance, |tx| ledger::withdraw(tx, version_id))?;
        tracing::info!(version_id, version_number = version.version_number, "report version withdrawn");
        Ok(version)
    }

    // INVOICE ACTION

    /// Decide what the version does to the period's invoice, do it, and activate
    /// the version, all in one transaction. Replaying a version returns the
    /// recorded outcome.
    pub fn apply_invoice_action(&self, version_id: &str) -> anyhow::Result<InvoiceActionOutcome> {
        let version = self.get_version(version_id)?;
        let due_date = self.config.obligation_due_date(version.period);
        let now = self.clock.now();
        let new_invoice_id = new_uuid_to_bech32(hrp::INVOICE)?;
        let new_request_id = new_uuid_to_bech32(hrp::ISSUANCE)?;

        let (record, invoice, voided, replayed) = store::transaction(&self.instance, |tx| {
            if let Some(record) = store::tx_get::<InvoiceActionRecord>(tx, &keys::invoice_action(version_id))? {
                return Ok((record, None, None, true));
            }

            let mut version = ledger::load(tx, version_id)?;
            let prior = match &version.supersedes {
                Some(prior_id) => Some(ledger::load(tx, prior_id)?),
                None => None,
            };
            let current = current_invoice_in(tx, &version.operation_id, version.period)?;
            let state = current
                .as_ref()
                .map(Invoice::state)
                .unwrap_or(InvoiceState::None);

            let action = policy::decide(prior.as_ref().map(|p| &p.obligation), &version.obligation, state);

            let (invoice, voided) = match action {
                Action::IssueNew => {
                    let mut current = current;
                    let fee = obligation_fee(&version, now.clone());
                    let invoice = issue_in(
                        tx,
                        &version,
                        new_invoice_id.clone(),
                        vec![fee],
                        due_date,
                        now.clone(),
                        current.as_mut().filter(|c| c.is_void()),
                    )?;
                    (Some(invoice), None)
                }
                Action::AdjustExistingInvoice { delta } => {
                    let mut invoice = match current {
                        Some(invoice) => invoice,
                        None => return abort(anyhow::anyhow!("adjustment without a current invoice")),
                    };
                    let prior_amount = prior
                        .as_ref()
                        .map(|p| p.obligation.obligation_amount)
                        .unwrap_or(Money::ZERO);
                    let description = format!(
                        "Version {} reduces the obligation from {} to {}",
                        version.version_number, prior_amount, version.obligation.obligation_amount
                    );
                    lift(invoice.apply_adjustment(delta, description, now.clone()))?;
                    store::tx_put(tx, &keys::invoice(&invoice.invoice_id), &invoice)?;
                    (Some(invoice), None)
                }
                Action::VoidAndReissue => {
                    let mut old = match current {
                        Some(invoice) => invoice,
                        None => return abort(anyhow::anyhow!("reissue without a current invoice")),
                    };
                    lift(old.void(now.clone()))?;

                    let fee = obligation_fee(&version, now.clone());
                    let new = issue_in(
                        tx,
                        &version,
                        new_invoice_id.clone(),
                        vec![fee],
                        due_date,
                        now.clone(),
                        Some(&mut old),
                    )?;
                    (Some(new), Some(old))
                }
                Action::NoOp => (current, None),
            };

            ledger::activate(tx, &mut version)?;

            if version.classification() == Classification::EarnedCredits {
                let request = IssuanceRequest::new(
                    new_request_id.clone(),
                    version.version_id.clone(),
                    version.operation_id.clone(),
                    version.period,
                    version.obligation.credited_emissions,
                    now.clone(),
                );
                store::tx_put(tx, &keys::issuance(&request.request_id), &request)?;
                store::tx_put_id(tx, &keys::issuance_by_version(&version.version_id), &request.request_id)?;
            }

            let record = InvoiceActionRecord {
                version_id: version.version_id.clone(),
                action,
                invoice_id: invoice.as_ref().map(|i| i.invoice_id.clone()),
                voided_invoice_id: voided.as_ref().map(|i| i.invoice_id.clone()),
                applied_at: now.clone(),
            };
            store::tx_put(tx, &keys::invoice_action(version_id), &record)?;

            Ok((record, invoice, voided, false))
        })?;

        if replayed {
            tracing::debug!(version_id, action = record.action.as_str(), "invoice action replayed");
            let invoice = record.invoice_id.as_deref().map(|id| self.get_invoice(id)).transpose()?;
            let voided = record
                .voided_invoice_id
                .as_deref()
                .map(|id| self.get_invoice(id))
                .transpose()?;
            return Ok(InvoiceActionOutcome {
                action_taken: record.action,
                invoice,
                voided_invoice: voided,
                replayed,
            });
        }

        tracing::info!(
            version_id,
            action = record.action.as_str(),
            invoice_number = invoice.as_ref().map(|i| i.invoice_number),
            voided_invoice_number = voided.as_ref().map(|i| i.invoice_number),
            "invoice action applied"
        );

        Ok(InvoiceActionOutcome {
            action_taken: record.action,
            invoice,
            voided_invoice: voided,
            replayed,
        })
    }

    /// Create a version and run its invoice action straight away.
    pub fn submit_version(
        &self,
        operation_id: &str,
        period: u16,
        emissions: EmissionsInput,
    ) -> anyhow::Result<(ReportVersion, InvoiceActionOutcome)> {
        let version = self.create_version(operation_id, period, emissions)?;
        let outcome = self.apply_invoice_action(&version.version_id)?;
        let version = self.get_version(&version.version_id)?;
        Ok((version, outcome))
    }

    // INVOICE MANAGER

    /// Issue an invoice for the active version of a period that has no payable
    /// invoice.
    pub fn issue_invoice(&self, version_id: &str, line_items: Vec<LineItem>) -> anyhow::Result<Invoice> {
        let version = self.get_version(version_id)?;
        let due_date = self.config.obligation_due_date(version.period);
        let now = self.clock.now();
        let invoice_id = new_uuid_to_bech32(hrp::INVOICE)?;

        let invoice = store::transaction(&self.instance, |tx| {
            let version = ledger::load(tx, version_id)?;
            if !version.is_active() {
                return abort(ComplianceError::InvalidTransition {
                    action: "issue an invoice".to_string(),
                    state: version.status.as_str().to_string(),
                });
            }
            let mut current = current_invoice_in(tx, &version.operation_id, version.period)?;
            if let Some(issued) = current.as_ref().filter(|c| !c.is_void()) {
                return abort(ComplianceError::InvalidTransition {
                    action: "issue an invoice".to_string(),
                    state: format!("invoice #{} is ISSUED", issued.invoice_number),
                });
            }
            issue_in(
                tx,
                &version,
                invoice_id.clone(),
                line_items.clone(),
                due_date,
                now.clone(),
                current.as_mut(),
            )
        })?;

        tracing::info!(
            invoice_number = invoice.invoice_number,
            version_id,
            balance = %invoice.outstanding_balance(),
            "invoice issued"
        );
        Ok(invoice)
    }

    pub fn void_invoice(&self, invoice_id: &str) -> anyhow::Result<Invoice> {
        let now = self.clock.now();
        let invoice = self.update_invoice(invoice_id, |invoice| invoice.void(now.clone()))?.0;
        tracing::info!(invoice_number = invoice.invoice_number, "invoice voided");
        Ok(invoice)
    }

    pub fn apply_adjustment(&self, invoice_id: &str, delta: Money, description: &str) -> anyhow::Result<LineItem> {
        let now = self.clock.now();
        let (invoice, item) = self.update_invoice(invoice_id, |invoice| {
            invoice.apply_adjustment(delta, description, now.clone())
        })?;
        tracing::info!(
            invoice_number = invoice.invoice_number,
            delta = %delta,
            balance = %invoice.outstanding_balance(),
            "adjustment applied"
        );
        Ok(item)
    }

    pub fn record_payment(
        &self,
        invoice_id: &str,
        amount: Money,
        received_date: Date,
        method: PaymentMethod,
    ) -> anyhow::Result<Payment> {
        let payment_id = new_uuid_to_bech32(hrp::PAYMENT)?;
        let (invoice, payment) = self.update_invoice(invoice_id, |invoice| {
            invoice.record_payment(payment_id.clone(), amount, received_date, method)
        })?;
        tracing::info!(
            invoice_number = invoice.invoice_number,
            payment_id = %payment.payment_id,
            amount = %amount,
            balance = %invoice.outstanding_balance(),
            "payment recorded"
        );
        Ok(payment)
    }

    pub fn outstanding_balance(&self, invoice_id: &str) -> anyhow::Result<Money> {
        Ok(self.get_invoice(invoice_id)?.display_balance())
    }

    pub fn get_invoice(&self, invoice_id: &str) -> anyhow::Result<Invoice> {
        store::get(&self.instance, &keys::invoice(invoice_id))?
            .ok_or_else(|| ComplianceError::InvoiceNotFound(invoice_id.to_string()).into())
    }

    pub fn current_invoice(&self, operation_id: &str, period: u16) -> anyhow::Result<Option<Invoice>> {
        match store::get_id(&self.instance, &keys::current_invoice(operation_id, period))? {
            Some(invoice_id) => Ok(Some(self.get_invoice(&invoice_id)?)),
            None => Ok(None),
        }
    }

    /// Every invoice issued for the period, oldest first.
    pub fn invoice_chain(&self, operation_id: &str, period: u16) -> anyhow::Result<Vec<Invoice>> {
        let mut chain = vec![];
        let mut next = self.current_invoice(operation_id, period)?;
        while let Some(invoice) = next {
            next = match &invoice.replaces {
                Some(id) => Some(self.get_invoice(id)?),
                None => None,
            };
            chain.push(invoice);
        }
        chain.reverse();
        Ok(chain)
    }

    fn update_invoice<T>(
        &self,
        invoice_id: &str,
        f: impl Fn(&mut Invoice) -> Result<T, ComplianceError>,
    ) -> anyhow::Result<(Invoice, T)> {
        store::transaction(&self.instance, |tx| {
            let mut invoice = match store::tx_get::<Invoice>(tx, &keys::invoice(invoice_id))? {
                Some(invoice) => invoice,
                None => return abort(ComplianceError::InvoiceNotFound(invoice_id.to_string())),
            };
            let out = lift(f(&mut invoice))?;
            store::tx_put(tx, &keys::invoice(invoice_id), &invoice)?;
            Ok((invoice, out))
        })
    }

    // PENALTY / INTEREST

    pub fn accrue(&self, version_id: &str, as_of: Date) -> anyhow::Result<PenaltyProjection> {
        self.accrue_with_settlements(version_id, as_of, Money::ZERO, Money::ZERO)
    }

    /// `penalty_paid` and `interest_paid` are the amounts settled against the
    /// penalty and interest themselves, which are billed outside this engine.
    pub fn accrue_with_settlements(
        &self,
        version_id: &str,
        as_of: Date,
        penalty_paid: Money,
        interest_paid: Money,
    ) -> anyhow::Result<PenaltyProjection> {
        let version = self.get_version(version_id)?;
        let chain = self.invoice_chain(&version.operation_id, version.period)?;
        let history = penalty::balance_history(&chain);

        let automatic_overdue = penalty::accrue_overdue(
            self.config.obligation_due_date(version.period),
            as_of,
            &history,
            self.config.penalty_daily_rate,
            penalty_paid,
        )?;
        // Lateness is judged on the original report; supplementary versions only
        // change the principal.
        let original = self.original_version(&version)?;
        let late_submission_interest = penalty::accrue_late_submission(
            self.config.report_deadline(version.period),
            original.submitted_at.date(),
            version.obligation.obligation_amount,
            self.config.late_interest_annual_rate,
            interest_paid,
        )?;

        tracing::debug!(
            version_id,
            %as_of,
            penalty = %automatic_overdue.amount,
            penalty_status = automatic_overdue.status.as_str(),
            interest = %late_submission_interest.amount,
            "accrual projected"
        );

        Ok(PenaltyProjection {
            version_id: version_id.to_string(),
            as_of,
            automatic_overdue,
            late_submission_interest,
        })
    }

    /// First version of the supersession chain `version` belongs to.
    pub fn original_version(&self, version: &ReportVersion) -> anyhow::Result<ReportVersion> {
        let mut original = version.clone();
        while let Some(prior_id) = original.supersedes.clone() {
            original = self.get_version(&prior_id)?;
        }
        Ok(original)
    }

    pub fn obligation_summary(&self, version_id: &str) -> anyhow::Result<ObligationSummary> {
        let version = self.get_version(version_id)?;

        let invoice = if version.is_active() {
            self.current_invoice(&version.operation_id, version.period)?
        } else {
            store::get::<InvoiceActionRecord>(&self.instance, &keys::invoice_action(version_id))?
                .and_then(|record| record.invoice_id)
                .map(|id| self.get_invoice(&id))
                .transpose()?
        };

        let projection = self.accrue(version_id, self.clock.today())?;

        Ok(ObligationSummary {
            version_id: version.version_id.clone(),
            version_number: version.version_number,
            excess_emissions: version.obligation.excess_emissions,
            credited_emissions: version.obligation.credited_emissions,
            obligation_amount: version.obligation.obligation_amount,
            classification: version.classification(),
            invoice_number: invoice.as_ref().map(|i| i.invoice_number),
            outstanding_balance: invoice
                .as_ref()
                .map(Invoice::display_balance)
                .unwrap_or(Money::ZERO),
            credit_balance: invoice
                .as_ref()
                .filter(|i| !i.is_void())
                .map(Invoice::credit_balance)
                .unwrap_or(Money::ZERO),
            penalty_status: projection.penalty_status(),
        })
    }

    // ISSUANCE WORKFLOW

    pub fn get_issuance_request(&self, request_id: &str) -> anyhow::Result<IssuanceRequest> {
        store::get(&self.instance, &keys::issuance(request_id))?
            .ok_or_else(|| ComplianceError::RequestNotFound(request_id.to_string()).into())
    }

    pub fn issuance_request_for_version(&self, version_id: &str) -> anyhow::Result<Option<IssuanceRequest>> {
        match store::get_id(&self.instance, &keys::issuance_by_version(version_id))? {
            Some(request_id) => Ok(Some(self.get_issuance_request(&request_id)?)),
            None => Ok(None),
        }
    }

    pub fn request_issuance(
        &self,
        request_id: &str,
        session: &dyn Session,
        bccr_holding_account_id: &str,
    ) -> anyhow::Result<IssuanceRequest> {
        let now = self.clock.now();
        self.update_request(request_id, "issuance requested", |request| {
            request.request_issuance(session, bccr_holding_account_id, now.clone())
        })
    }

    pub fn update_holding_account(
        &self,
        request_id: &str,
        session: &dyn Session,
        bccr_holding_account_id: &str,
    ) -> anyhow::Result<IssuanceRequest> {
        let now = self.clock.now();
        self.update_request(request_id, "holding account changed", |request| {
            request.update_holding_account(session, bccr_holding_account_id, now.clone())
        })
    }

    pub fn suggest_issuance(
        &self,
        request_id: &str,
        session: &dyn Session,
        suggestion: AnalystSuggestion,
        comment: &str,
    ) -> anyhow::Result<IssuanceRequest> {
        let now = self.clock.now();
        self.update_request(request_id, "analyst suggestion recorded", |request| {
            request.suggest(session, suggestion, comment, now.clone())
        })
    }

    pub fn decide_issuance(
        &self,
        request_id: &str,
        session: &dyn Session,
        decision: Decision,
        comment: &str,
    ) -> anyhow::Result<IssuanceRequest> {
        let now = self.clock.now();
        self.update_request(request_id, "director decision recorded", |request| {
            request.decide(session, decision, comment, now.clone()).map(|_| ())
        })
    }

    fn update_request(
        &self,
        request_id: &str,
        message: &str,
        f: impl Fn(&mut IssuanceRequest) -> Result<(), ComplianceError>,
    ) -> anyhow::Result<IssuanceRequest> {
        let request = store::transaction(&self.instance, |tx| {
            let mut request = match store::tx_get::<IssuanceRequest>(tx, &keys::issuance(request_id))? {
                Some(request) => request,
                None => return abort(ComplianceError::RequestNotFound(request_id.to_string())),
            };
            lift(f(&mut request))?;
            store::tx_put(tx, &keys::issuance(request_id), &request)?;
            Ok(request)
        })?;

        let (digest, _) = request.serialize_with_hash()?;
        let witness_hash = match request.witness_set.last() {
            Some(witness) => witness.build()?.0,
            None => String::new(),
        };
        tracing::info!(
            request_id,
            version_id = %request.version_id,
            status = request.current_state().as_str(),
            witnesses = request.witness_set.len(),
            %digest,
            %witness_hash,
            "{message}"
        );
        Ok(request)
    }
}

fn request_for_version(tx: &TransactionalTree, version_id: &str) -> TxResult<Option<IssuanceRequest>> {
    match store::tx_get_id(tx, &keys::issuance_by_version(version_id))? {
        Some(request_id) => store::tx_get(tx, &keys::issuance(&request_id)),
        None => Ok(None),
    }
}

fn current_invoice_in(tx: &TransactionalTree, operation_id: &str, period: u16) -> TxResult<Option<Invoice>> {
    match store::tx_get_id(tx, &keys::current_invoice(operation_id, period))? {
        Some(invoice_id) => match store::tx_get(tx, &keys::invoice(&invoice_id))? {
            Some(invoice) => Ok(Some(invoice)),
            None => abort(ComplianceError::InvoiceNotFound(invoice_id)),
        },
        None => Ok(None),
    }
}

/// Allocate the next invoice number, store the invoice and point the period at it.
///
/// `replacing` must already be void. It is linked to the new invoice and its
/// payments are carried forward.
fn issue_in(
    tx: &TransactionalTree,
    version: &ReportVersion,
    invoice_id: String,
    line_items: Vec<LineItem>,
    due_date: Date,
    now: TimeStamp<Utc>,
    replacing: Option<&mut Invoice>,
) -> TxResult<Invoice> {
    let invoice_number = store::tx_next(tx, keys::INVOICE_NUMBER_COUNTER)?;
    let mut invoice = Invoice::issue(
        invoice_id,
        invoice_number,
        version.version_ref(),
        due_date,
        line_items,
        now,
    );
    if let Some(old) = replacing {
        invoice.replaces = Some(old.invoice_id.clone());
        lift(invoice.carry_forward(old))?;
        old.reissued_as = Some(invoice_number);
        store::tx_put(tx, &keys::invoice(&old.invoice_id), &*old)?;
    }
    store::tx_put(tx, &keys::invoice(&invoice.invoice_id), &invoice)?;
    store::tx_put_id(
        tx,
        &keys::current_invoice(&version.operation_id, version.period),
        &invoice.invoice_id,
    )?;
    Ok(invoice)
}

fn obligation_fee(version: &ReportVersion, now: TimeStamp<Utc>) -> LineItem {
    LineItem::fee(
        version.obligation.obligation_amount,
        format!(
            "{} compliance obligation: {} excess at {} per tCO2e",
            version.period, version.obligation.excess_emissions, version.obligation.charge_rate
        ),
        now,
    )
}
