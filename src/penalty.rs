//! Penalty and interest accrual
//!
//! Nothing here is stored. A projection is recomputed from the due dates, the
//! balance history of the period's invoices and the amounts paid against it, so the
//! same inputs always give the same projection.
use crate::error::ComplianceError;
use crate::invoice::Invoice;
use crate::types::{Date, Money};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    AutomaticOverdue,
    LateSubmissionInterest,
}

impl PenaltyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyKind::AutomaticOverdue => "AUTOMATIC_OVERDUE",
            PenaltyKind::LateSubmissionInterest => "LATE_SUBMISSION_INTEREST",
        }
    }

    fn overflow(&self, as_of: Date) -> ComplianceError {
        ComplianceError::AccrualOverflow {
            kind: self.as_str().to_string(),
            as_of,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyStatus {
    NotApplicable,
    Accruing,
    NotPaid,
    Paid,
}

impl PenaltyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyStatus::NotApplicable => "NOT_APPLICABLE",
            PenaltyStatus::Accruing => "ACCRUING",
            PenaltyStatus::NotPaid => "NOT_PAID",
            PenaltyStatus::Paid => "PAID",
        }
    }
}

/// Outstanding balance in effect from `date` (inclusive) until the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceEvent {
    pub date: Date,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyAccrual {
    pub kind: PenaltyKind,
    pub status: PenaltyStatus,
    pub amount: Money,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyProjection {
    pub version_id: String,
    pub as_of: Date,
    pub automatic_overdue: PenaltyAccrual,
    pub late_submission_interest: PenaltyAccrual,
}

impl PenaltyAccrual {
    fn not_applicable(kind: PenaltyKind) -> Self {
        Self {
            kind,
            status: PenaltyStatus::NotApplicable,
            amount: Money::ZERO,
            days: 0,
        }
    }
}

impl PenaltyProjection {
    /// Status reported on the obligation summary.
    pub fn penalty_status(&self) -> PenaltyStatus {
        self.automatic_overdue.status
    }
}

/// Balance in effect at the end of `day`.
pub fn balance_at(history: &[BalanceEvent], day: Date) -> Money {
    history
        .iter()
        .filter(|e| e.date <= day)
        .max_by_key(|e| e.date)
        .map(|e| e.balance)
        .unwrap_or(Money::ZERO)
}

/// Daily compounding penalty on the overdue balance.
///
/// Every day after `due_date` up to and including `as_of` on which the balance is
/// positive adds `daily_rate * (balance + penalty so far)`. Fails with
/// `AccrualOverflow` once the penalty no longer fits in a `Decimal`.
pub fn accrue_overdue(
    due_date: Date,
    as_of: Date,
    history: &[BalanceEvent],
    daily_rate: Decimal,
    penalty_paid: Money,
) -> Result<PenaltyAccrual, ComplianceError> {
    let kind = PenaltyKind::AutomaticOverdue;
    if as_of <= due_date {
        return Ok(PenaltyAccrual::not_applicable(kind));
    }

    let mut accrued = Decimal::ZERO;
    let mut days = 0;
    let mut day = due_date.succ();
    while let Some(current) = day {
        if current > as_of {
            break;
        }
        let balance = balance_at(history, current);
        if balance.is_positive() {
            accrued = balance
                .as_decimal()
                .checked_add(accrued)
                .and_then(|base| base.checked_mul(daily_rate))
                .and_then(|daily| daily.checked_add(accrued))
                .ok_or_else(|| kind.overflow(current))?;
            days += 1;
        }
        day = current.succ();
    }

    let amount = Money::new(accrued).round_cents();
    let status = if balance_at(history, as_of).is_positive() {
        PenaltyStatus::Accruing
    } else if days == 0 {
        PenaltyStatus::NotApplicable
    } else if penalty_paid >= amount {
        PenaltyStatus::Paid
    } else {
        PenaltyStatus::NotPaid
    };

    Ok(PenaltyAccrual {
        kind,
        status,
        amount,
        days,
    })
}

/// Simple interest on the obligation for each day the report was late.
pub fn accrue_late_submission(
    deadline: Date,
    submitted: Date,
    obligation_amount: Money,
    annual_rate: Decimal,
    interest_paid: Money,
) -> Result<PenaltyAccrual, ComplianceError> {
    let kind = PenaltyKind::LateSubmissionInterest;
    let days = deadline.days_until(submitted);
    if days <= 0 || !obligation_amount.is_positive() {
        return Ok(PenaltyAccrual::not_applicable(kind));
    }

    let interest = obligation_amount
        .as_decimal()
        .checked_mul(annual_rate)
        .and_then(|yearly| yearly.checked_mul(Decimal::from(days)))
        .and_then(|total| total.checked_div(Decimal::from(365)))
        .ok_or_else(|| kind.overflow(submitted))?;
    let amount = Money::new(interest).round_cents();
    let status = if amount.is_zero() {
        PenaltyStatus::NotApplicable
    } else if interest_paid >= amount {
        PenaltyStatus::Paid
    } else {
        PenaltyStatus::NotPaid
    };

    Ok(PenaltyAccrual {
        kind,
        status,
        amount,
        days,
    })
}

impl Invoice {
    /// Outstanding balance counting only what had happened by the end of `day`.
    pub fn balance_as_of(&self, day: Date) -> Money {
        let charged: Money = self
            .line_items
            .iter()
            .filter(|item| item.created_at.date() <= day)
            .map(|item| item.amount)
            .sum();
        let paid: Money = self
            .payments
            .iter()
            .filter(|p| p.received_date <= day)
            .map(|p| p.amount)
            .sum();
        let net = charged - paid;
        if net.is_negative() { Money::ZERO } else { net }
    }
}

/// Balance history of a period from its invoice chain, oldest invoice first.
///
/// A voided invoice stops counting on the day it was voided; its replacement is
/// issued the same day and takes over from there.
pub fn balance_history(chain: &[Invoice]) -> Vec<BalanceEvent> {
    let mut events: Vec<BalanceEvent> = vec![];

    for invoice in chain {
        let issued = invoice.issued_at.date();
        let voided = invoice.voided_at.as_ref().map(|v| v.date());

        let mut dates: Vec<Date> = invoice
            .line_items
            .iter()
            .map(|item| item.created_at.date())
            .chain(invoice.payments.iter().map(|p| p.received_date))
            .map(|d| d.max(issued))
            .chain(std::iter::once(issued))
            .collect();
        dates.sort();
        dates.dedup();

        for date in dates {
            if voided.is_some_and(|v| date >= v) {
                continue;
            }
            events.push(BalanceEvent {
                date,
                balance: invoice.balance_as_of(date),
            });
        }
        if let Some(v) = voided {
            if v > issued {
                events.push(BalanceEvent {
                    date: v,
                    balance: Money::ZERO,
                });
            }
        }
    }

    // stable: for equal dates the later invoice in the chain comes last and wins
    events.sort_by_key(|e| e.date);
    let mut merged: Vec<BalanceEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if last.date == event.date => *last = event,
            _ => merged.push(event),
        }
    }
    merged
}
