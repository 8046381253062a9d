//! Adjustment policy: what a new report version does to the current invoice
use crate::obligation::Obligation;
use crate::types::Money;

/// The invoice currently attached to an operation/period, as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    None,
    Issued { invoice_number: u64 },
    Void { invoice_number: u64 },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    #[n(0)]
    IssueNew,
    /// Append an ADJUSTMENT line of `delta` (always negative) to the current invoice.
    #[n(1)]
    AdjustExistingInvoice {
        #[n(0)]
        delta: Money,
    },
    #[n(2)]
    VoidAndReissue,
    #[n(3)]
    NoOp,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::IssueNew => "issue_new",
            Action::AdjustExistingInvoice { .. } => "adjust_existing_invoice",
            Action::VoidAndReissue => "void_and_reissue",
            Action::NoOp => "no_op",
        }
    }
}

/// Rules, first match wins:
///
/// 1. no invoice, or the invoice is void: issue a new one (nothing to bill is a no-op)
/// 2. the obligation went down: adjust the existing invoice by the difference
/// 3. the obligation went up: void it and reissue for the full new amount
/// 4. unchanged: no-op
pub fn decide(prior: Option<&Obligation>, incoming: &Obligation, invoice_state: InvoiceState) -> Action {
    match invoice_state {
        InvoiceState::None | InvoiceState::Void { .. } => {
            if incoming.obligation_amount.is_positive() {
                Action::IssueNew
            } else {
                Action::NoOp
            }
        }
        InvoiceState::Issued { .. } => {
            // Invoices are only issued for active versions, so an ISSUED invoice
            // implies a superseded prior. Without one the prior is taken as zero.
            let prior_amount = prior.map(|p| p.obligation_amount).unwrap_or(Money::ZERO);
            let incoming_amount = incoming.obligation_amount;

            if incoming_amount < prior_amount {
                Action::AdjustExistingInvoice {
                    delta: incoming_amount - prior_amount,
                }
            } else if incoming_amount > prior_amount {
                Action::VoidAndReissue
            } else {
                Action::NoOp
            }
        }
    }
}
