//! Engine configuration: charge rates, statutory dates and accrual rates
use crate::error::ComplianceError;
use crate::types::Date;
use config::{Config as Cfg, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChargeRate {
    pub period: u16,
    /// Currency per tCO2e of excess emissions.
    pub rate: Decimal,
}

/// A month/day pair resolved against the year after the compliance period.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_charge_rates")]
    pub charge_rates: Vec<ChargeRate>,
    #[serde(default = "default_report_deadline")]
    pub report_deadline: MonthDay,
    #[serde(default = "default_obligation_due")]
    pub obligation_due: MonthDay,
    #[serde(default = "default_penalty_daily_rate")]
    pub penalty_daily_rate: Decimal,
    #[serde(default = "default_late_interest_annual_rate")]
    pub late_interest_annual_rate: Decimal,
}

fn default_db_path() -> String {
    "compliance.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_charge_rates() -> Vec<ChargeRate> {
    [(2023, 65), (2024, 80), (2025, 95), (2026, 110)]
        .into_iter()
        .map(|(period, rate)| ChargeRate {
            period,
            rate: Decimal::from(rate),
        })
        .collect()
}

fn default_report_deadline() -> MonthDay {
    MonthDay { month: 5, day: 31 }
}

fn default_obligation_due() -> MonthDay {
    MonthDay { month: 11, day: 30 }
}

fn default_penalty_daily_rate() -> Decimal {
    // 0.38% per day, compounding
    Decimal::new(38, 4)
}

fn default_late_interest_annual_rate() -> Decimal {
    Decimal::new(5, 2)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            charge_rates: default_charge_rates(),
            report_deadline: default_report_deadline(),
            obligation_due: default_obligation_due(),
            penalty_daily_rate: default_penalty_daily_rate(),
            late_interest_annual_rate: default_late_interest_annual_rate(),
        }
    }
}

impl EngineConfig {
    /// Reads `compliance.toml` (optional) then `COMPLIANCE__*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("compliance").required(false))
            .add_source(Environment::with_prefix("COMPLIANCE").separator("__"))
            .build()?;

        let config: EngineConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for rate in &self.charge_rates {
            if rate.rate < Decimal::ZERO {
                anyhow::bail!("charge rate for {} is negative", rate.period);
            }
        }
        for (name, md) in [
            ("report_deadline", self.report_deadline),
            ("obligation_due", self.obligation_due),
        ] {
            if Date::from_ymd(2024, md.month, md.day).is_none() {
                anyhow::bail!("{name} is not a calendar day: {}/{}", md.month, md.day);
            }
        }
        if self.penalty_daily_rate < Decimal::ZERO || self.late_interest_annual_rate < Decimal::ZERO
        {
            anyhow::bail!("accrual rates must not be negative");
        }
        Ok(())
    }

    pub fn charge_rate_for(&self, period: u16) -> Result<Decimal, ComplianceError> {
        self.charge_rates
            .iter()
            .find(|r| r.period == period)
            .map(|r| r.rate)
            .ok_or(ComplianceError::UnknownChargeRate(period))
    }

    /// Statutory deadline for submitting the report for `period`.
    pub fn report_deadline(&self, period: u16) -> Date {
        resolve(period, self.report_deadline)
    }

    /// Date by which the obligation invoice must be paid.
    pub fn obligation_due_date(&self, period: u16) -> Date {
        resolve(period, self.obligation_due)
    }
}

fn resolve(period: u16, md: MonthDay) -> Date {
    let year = i32::from(period) + 1;
    // Feb 29 in a non-leap year falls back to the 28th.
    Date::from_ymd(year, md.month, md.day)
        .or_else(|| Date::from_ymd(year, md.month, md.day.saturating_sub(1)))
        .unwrap_or_else(|| Date::new(year, 12, 31))
}
