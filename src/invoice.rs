//! Invoice records: line items, payments and the derived balance
use crate::error::ComplianceError;
use crate::policy::InvoiceState;
use crate::types::{Date, Money, TimeStamp};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    #[n(0)]
    Issued,
    #[n(1)]
    Void,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemType {
    #[n(0)]
    Fee,
    #[n(1)]
    Adjustment,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[n(0)]
    Eft,
    #[n(1)]
    Cheque,
    #[n(2)]
    CreditCard,
    #[n(3)]
    Other,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub item_type: LineItemType,
    /// Signed. Fees are positive, adjustments usually negative.
    #[n(1)]
    pub amount: Money,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    #[n(0)]
    pub payment_id: String,
    #[n(1)]
    pub amount: Money,
    #[n(2)]
    pub received_date: Date,
    #[n(3)]
    pub method: PaymentMethod,
    /// Invoice number the payment was originally made against, when carried
    /// forward onto a reissued invoice.
    #[n(4)]
    pub carried_forward_from: Option<u64>,
}

/// Identifies the report version an invoice was issued for.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    #[n(0)]
    pub version_id: String,
    #[n(1)]
    pub operation_id: String,
    #[n(2)]
    pub period: u16,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    #[n(0)]
    pub invoice_id: String,
    #[n(1)]
    pub invoice_number: u64,
    #[n(2)]
    pub version: VersionRef,
    #[n(3)]
    pub status: InvoiceStatus,
    #[n(4)]
    pub line_items: Vec<LineItem>,
    #[n(5)]
    pub payments: Vec<Payment>,
    #[n(6)]
    pub due_date: Date,
    #[n(7)]
    pub issued_at: TimeStamp<Utc>,
    #[n(8)]
    pub voided_at: Option<TimeStamp<Utc>>,
    /// Number of the invoice that replaced this one.
    #[n(9)]
    pub reissued_as: Option<u64>,
    /// Id of the voided invoice this one replaced.
    #[n(10)]
    pub replaces: Option<String>,
}

impl LineItem {
    pub fn fee(amount: Money, description: impl Into<String>, created_at: TimeStamp<Utc>) -> Self {
        Self {
            item_type: LineItemType::Fee,
            amount,
            description: description.into(),
            created_at,
        }
    }
    pub fn adjustment(
        amount: Money,
        description: impl Into<String>,
        created_at: TimeStamp<Utc>,
    ) -> Self {
        Self {
            item_type: LineItemType::Adjustment,
            amount,
            description: description.into(),
            created_at,
        }
    }
}

impl Invoice {
    pub fn issue(
        invoice_id: String,
        invoice_number: u64,
        version: VersionRef,
        due_date: Date,
        line_items: Vec<LineItem>,
        issued_at: TimeStamp<Utc>,
    ) -> Self {
        Self {
            invoice_id,
            invoice_number,
            version,
            status: InvoiceStatus::Issued,
            line_items,
            payments: vec![],
            due_date,
            issued_at,
            voided_at: None,
            reissued_as: None,
            replaces: None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.status == InvoiceStatus::Void
    }

    /// Void invoices carry a VOID watermark when rendered.
    pub fn is_watermarked(&self) -> bool {
        self.is_void()
    }

    pub fn state(&self) -> InvoiceState {
        match self.status {
            InvoiceStatus::Issued => InvoiceState::Issued {
                invoice_number: self.invoice_number,
            },
            InvoiceStatus::Void => InvoiceState::Void {
                invoice_number: self.invoice_number,
            },
        }
    }

    fn ensure_mutable(&self) -> Result<(), ComplianceError> {
        if self.is_void() {
            return Err(ComplianceError::InvoiceIsVoid(self.invoice_number));
        }
        Ok(())
    }

    pub fn void(&mut self, now: TimeStamp<Utc>) -> Result<(), ComplianceError> {
        if self.is_void() {
            return Err(ComplianceError::AlreadyVoid(self.invoice_number));
        }
        self.status = InvoiceStatus::Void;
        self.voided_at = Some(now);
        Ok(())
    }

    pub fn apply_adjustment(
        &mut self,
        delta: Money,
        description: impl Into<String>,
        now: TimeStamp<Utc>,
    ) -> Result<LineItem, ComplianceError> {
        self.ensure_mutable()?;
        if delta.is_zero() {
            return Err(ComplianceError::InvalidAmount(delta));
        }

        let item = LineItem::adjustment(delta, description, now);
        self.line_items.push(item.clone());
        Ok(item)
    }

    pub fn record_payment(
        &mut self,
        payment_id: String,
        amount: Money,
        received_date: Date,
        method: PaymentMethod,
    ) -> Result<Payment, ComplianceError> {
        self.ensure_mutable()?;
        if !amount.is_positive() {
            return Err(ComplianceError::InvalidAmount(amount));
        }
        let outstanding = self.outstanding_balance();
        if amount > outstanding {
            return Err(ComplianceError::OverpaymentRejected {
                amount,
                outstanding,
            });
        }

        let payment = Payment {
            payment_id,
            amount,
            received_date,
            method,
            carried_forward_from: None,
        };
        self.payments.push(payment.clone());
        Ok(payment)
    }

    /// Copy the payments of a voided invoice onto this one as credits.
    pub fn carry_forward(&mut self, voided: &Invoice) -> Result<(), ComplianceError> {
        self.ensure_mutable()?;
        for payment in &voided.payments {
            self.payments.push(Payment {
                carried_forward_from: payment
                    .carried_forward_from
                    .or(Some(voided.invoice_number)),
                ..payment.clone()
            });
        }
        Ok(())
    }

    pub fn total_fees(&self) -> Money {
        self.sum_of(LineItemType::Fee)
    }

    pub fn total_adjustments(&self) -> Money {
        self.sum_of(LineItemType::Adjustment)
    }

    fn sum_of(&self, item_type: LineItemType) -> Money {
        self.line_items
            .iter()
            .filter(|item| item.item_type == item_type)
            .map(|item| item.amount)
            .sum()
    }

    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    fn net(&self) -> Money {
        self.total_fees() + self.total_adjustments() - self.total_paid()
    }

    /// fees + adjustments - payments, floored at zero. Always recomputed.
    pub fn outstanding_balance(&self) -> Money {
        let net = self.net();
        if net.is_negative() { Money::ZERO } else { net }
    }

    /// Amount paid beyond the charges, reachable when an adjustment lowers the bill
    /// after payment.
    pub fn credit_balance(&self) -> Money {
        let net = self.net();
        if net.is_negative() { -net } else { Money::ZERO }
    }

    /// Balance shown to the payer; a void invoice always shows zero.
    pub fn display_balance(&self) -> Money {
        if self.is_void() {
            Money::ZERO
        } else {
            self.outstanding_balance()
        }
    }

    pub fn is_paid(&self) -> bool {
        !self.is_void() && self.outstanding_balance().is_zero()
    }
}
