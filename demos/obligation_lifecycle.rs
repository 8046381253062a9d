//! Walks one operation through a compliance period: an original report, a
//! supplementary report that raises the obligation, a partial payment and the
//! penalty projection once the due date has passed.
//!
//! Run with `RUST_LOG=debug` to see every step the engine logs.
use anyhow::Context;
use compliance_obligations::{
    config::EngineConfig,
    invoice::PaymentMethod,
    logging::init_tracing,
    obligation::EmissionsInput,
    service::ComplianceService,
    types::{Date, Money, Tonnes},
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log_level);

    let db = Arc::new(sled::open(&config.db_path)?);
    let service = ComplianceService::new(db, config);

    let operation = format!("demo_{}", std::process::id());
    let period = 2024;

    let (v1, first) = service.submit_version(
        &operation,
        period,
        EmissionsInput::new(Tonnes::from(10_625), Tonnes::from(10_000)),
    )?;
    let invoice = first.invoice.context("original report should be billed")?;
    println!(
        "v{} {:?}: {} billed on invoice #{}",
        v1.version_number, first.action_taken, v1.obligation.obligation_amount, invoice.invoice_number
    );

    service.record_payment(
        &invoice.invoice_id,
        Money::from(20_000),
        Date::new(2025, 9, 1),
        PaymentMethod::Eft,
    )?;

    let (v2, second) = service.submit_version(
        &operation,
        period,
        EmissionsInput::new(Tonnes::from(11_000), Tonnes::from(10_000)),
    )?;
    let reissued = second.invoice.context("supplementary report should be billed")?;
    println!(
        "v{} {:?}: {} now on invoice #{}, {} outstanding",
        v2.version_number,
        second.action_taken,
        v2.obligation.obligation_amount,
        reissued.invoice_number,
        reissued.outstanding_balance()
    );

    let projection = service.accrue(&v2.version_id, Date::new(2025, 12, 31))?;
    println!(
        "as of {}: overdue penalty {} ({}), late submission interest {} ({})",
        projection.as_of,
        projection.automatic_overdue.amount,
        projection.automatic_overdue.status.as_str(),
        projection.late_submission_interest.amount,
        projection.late_submission_interest.status.as_str()
    );

    for version in service.version_history(&operation, period)? {
        println!("  v{} {}", version.version_number, version.status.as_str());
    }

    Ok(())
}
