//! Obligation calculator: emissions and charge rate to an obligation
use crate::error::ComplianceError;
use crate::types::{Money, Tonnes};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    #[n(0)]
    Obligation,
    #[n(1)]
    EarnedCredits,
    #[n(2)]
    NoObligationOrCredits,
}

/// Emissions figures taken from a submitted report.
// Content addressed: the store key is the hash of this struct encoded into CBOR.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionsInput {
    #[n(0)]
    pub emissions_attributable: Tonnes,
    #[n(1)]
    pub emissions_limit: Tonnes,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obligation {
    /// attributable - limit. Negative when credits were earned.
    #[n(0)]
    pub excess_emissions: Tonnes,
    #[n(1)]
    pub credited_emissions: Tonnes,
    /// Zero unless the classification is `Obligation`.
    #[n(2)]
    pub obligation_amount: Money,
    #[n(3)]
    pub charge_rate: Money,
    #[n(4)]
    pub classification: Classification,
}

impl EmissionsInput {
    pub fn new(emissions_attributable: Tonnes, emissions_limit: Tonnes) -> Self {
        Self {
            emissions_attributable,
            emissions_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ComplianceError> {
        if self.emissions_attributable.is_negative() {
            return Err(ComplianceError::InvalidEmissions(format!(
                "attributable emissions are negative: {}",
                self.emissions_attributable
            )));
        }
        if self.emissions_limit.is_negative() {
            return Err(ComplianceError::InvalidEmissions(format!(
                "emissions limit is negative: {}",
                self.emissions_limit
            )));
        }
        Ok(())
    }

    /// Validates, then returns the sha256 of the CBOR encoding along with the encoding.
    pub fn validate_and_finalise(&self) -> anyhow::Result<(String, Vec<u8>)> {
        self.validate()?;

        let contents = minicbor::to_vec(self)?;
        let hash = sha256::digest(&contents);

        Ok((hash, contents))
    }
}

impl Obligation {
    pub fn is_obligation(&self) -> bool {
        self.classification == Classification::Obligation
    }
}

/// Pure and deterministic. Amounts are rounded to cents, ties to even.
pub fn compute(
    emissions_attributable: Tonnes,
    emissions_limit: Tonnes,
    charge_rate: Money,
) -> Result<Obligation, ComplianceError> {
    EmissionsInput::new(emissions_attributable, emissions_limit).validate()?;
    if charge_rate.is_negative() {
        return Err(ComplianceError::InvalidEmissions(format!(
            "charge rate is negative: {charge_rate}"
        )));
    }

    let excess_emissions = emissions_attributable - emissions_limit;

    let classification = if excess_emissions.is_positive() {
        Classification::Obligation
    } else if excess_emissions.is_negative() {
        Classification::EarnedCredits
    } else {
        Classification::NoObligationOrCredits
    };

    let (credited_emissions, obligation_amount) = match classification {
        Classification::Obligation => {
            let amount = excess_emissions
                .as_decimal()
                .checked_mul(charge_rate.as_decimal())
                .ok_or_else(|| {
                    ComplianceError::InvalidEmissions(format!(
                        "{excess_emissions} at {charge_rate} overflows"
                    ))
                })?;
            (Tonnes::ZERO, Money::new(amount).round_cents())
        }
        Classification::EarnedCredits => (-excess_emissions, Money::ZERO),
        Classification::NoObligationOrCredits => (Tonnes::ZERO, Money::ZERO),
    };

    Ok(Obligation {
        excess_emissions,
        credited_emissions,
        obligation_amount,
        charge_rate,
        classification,
    })
}

pub fn compute_for(input: &EmissionsInput, charge_rate: Money) -> Result<Obligation, ComplianceError> {
    compute(input.emissions_attributable, input.emissions_limit, charge_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(v: rust_decimal::Decimal) -> Tonnes {
        Tonnes::new(v)
    }

    #[test]
    fn classification_table() {
        let rate = Money::new(dec!(80));
        let cases = [
            (dec!(1000), dec!(900), Classification::Obligation, dec!(8000.00), dec!(0)),
            (dec!(900), dec!(1000), Classification::EarnedCredits, dec!(0), dec!(100)),
            (dec!(1000), dec!(1000), Classification::NoObligationOrCredits, dec!(0), dec!(0)),
            (dec!(0), dec!(0), Classification::NoObligationOrCredits, dec!(0), dec!(0)),
        ];

        for (attributable, limit, classification, amount, credited) in cases {
            let obligation = compute(t(attributable), t(limit), rate).unwrap();
            assert_eq!(obligation.classification, classification);
            assert_eq!(obligation.obligation_amount, Money::new(amount));
            assert_eq!(obligation.credited_emissions, t(credited));
            assert_eq!(obligation.excess_emissions, t(attributable - limit));
        }
    }

    #[test]
    fn amount_rounds_half_even() {
        // 0.0125 t * 1.00 = 0.0125 -> 0.01 ; 0.0375 -> 0.04
        let low = compute(t(dec!(1.0125)), t(dec!(1)), Money::new(dec!(1))).unwrap();
        assert_eq!(low.obligation_amount, Money::new(dec!(0.01)));

        let high = compute(t(dec!(1.0375)), t(dec!(1)), Money::new(dec!(1))).unwrap();
        assert_eq!(high.obligation_amount, Money::new(dec!(0.04)));
    }

    #[test]
    fn rejects_negative_inputs() {
        let rate = Money::new(dec!(80));
        assert!(matches!(
            compute(t(dec!(-1)), t(dec!(0)), rate),
            Err(ComplianceError::InvalidEmissions(_))
        ));
        assert!(matches!(
            compute(t(dec!(1)), t(dec!(-5)), rate),
            Err(ComplianceError::InvalidEmissions(_))
        ));
        assert!(matches!(
            compute(t(dec!(1)), t(dec!(0)), Money::new(dec!(-1))),
            Err(ComplianceError::InvalidEmissions(_))
        ));
    }

    #[test]
    fn identical_inputs_hash_identically() {
        let a = EmissionsInput::new(t(dec!(120.5)), t(dec!(100)));
        let b = EmissionsInput::new(t(dec!(120.5)), t(dec!(100)));
        let c = EmissionsInput::new(t(dec!(120.6)), t(dec!(100)));

        assert_eq!(
            a.validate_and_finalise().unwrap().0,
            b.validate_and_finalise().unwrap().0
        );
        assert_ne!(
            a.validate_and_finalise().unwrap().0,
            c.validate_and_finalise().unwrap().0
        );
    }
}
