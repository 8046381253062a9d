//! Shared value types: timestamps, calendar dates, money and emission quantities
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// Panics on an impossible calendar value, like `chrono`'s own constructors.
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn date(&self) -> Date {
        Date(self.0.date_naive())
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// A calendar day. Due dates, payment dates and accrual windows are day-granular.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Date(NaiveDate);

impl Date {
    /// Panics on an impossible calendar value.
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }
    pub fn to_naive(&self) -> NaiveDate {
        self.0
    }
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
    pub fn days_until(&self, later: Date) -> i64 {
        (later.0 - self.0).num_days()
    }
}

impl From<NaiveDate> for Date {
    fn from(value: NaiveDate) -> Self {
        Date(value)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<C> minicbor::Encode<C> for Date {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Date {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(Date)
            .ok_or(minicbor::decode::Error::message("day count out of range"))
    }
}

// Decimal newtypes are stored as the 16 byte `Decimal::serialize` form.
macro_rules! decimal_newtype {
    ($name:ident) => {
        impl $name {
            pub const ZERO: $name = $name(Decimal::ZERO);

            pub fn new(value: Decimal) -> Self {
                Self(value)
            }
            pub fn as_decimal(&self) -> Decimal {
                self.0
            }
            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }
            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }
            pub fn is_negative(&self) -> bool {
                self.0 < Decimal::ZERO
            }
            pub fn abs(&self) -> Self {
                Self(self.0.abs())
            }
            /// Two decimal places, ties to even.
            pub fn round_cents(&self) -> Self {
                Self(
                    self.0
                        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
                )
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(Decimal::from(value))
            }
        }

        impl Add for $name {
            type Output = $name;
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = $name;
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                iter.fold($name::ZERO, |acc, x| acc + x)
            }
        }

        impl<C> minicbor::Encode<C> for $name {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                _: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                e.bytes(&self.0.serialize())?.ok()
            }
        }

        impl<'b, C> minicbor::Decode<'b, C> for $name {
            fn decode(
                d: &mut minicbor::Decoder<'b>,
                _: &mut C,
            ) -> Result<Self, minicbor::decode::Error> {
                let bytes: [u8; 16] = d.bytes()?.try_into().map_err(|_| {
                    minicbor::decode::Error::message("decimal must be 16 bytes")
                })?;

                Ok($name(Decimal::deserialize(bytes)))
            }
        }
    };
}

/// Currency amount (CAD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

/// Emissions in tonnes of CO2 equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tonnes(Decimal);

decimal_newtype!(Money);
decimal_newtype!(Tonnes);

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl fmt::Display for Tonnes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tCO2e", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn money_encoding_keeps_scale() {
        let original = Money::new(dec!(13458.50));

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Money = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
        assert_eq!(decode.to_string(), "$13458.50");
    }

    #[test]
    fn negative_money_display() {
        assert_eq!(Money::new(dec!(-10537)).to_string(), "-$10537.00");
    }

    #[test]
    fn round_cents_is_half_even() {
        assert_eq!(Money::new(dec!(1.005)).round_cents(), Money::new(dec!(1.00)));
        assert_eq!(Money::new(dec!(1.015)).round_cents(), Money::new(dec!(1.02)));
        assert_eq!(Money::new(dec!(-2.125)).round_cents(), Money::new(dec!(-2.12)));
    }

    #[test]
    fn date_day_arithmetic() {
        let due = Date::new(2025, 11, 30);
        assert_eq!(due.succ(), Some(Date::new(2025, 12, 1)));
        assert_eq!(due.days_until(Date::new(2025, 12, 10)), 10);
    }
}
