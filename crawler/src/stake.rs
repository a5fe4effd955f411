//! # Stake Amounts
//!
//! Stake is denominated in yocto: 10^-24 of a token. A single large
//! validator holds ~10^32 yocto, far past what an `f64` (or even a `u64`)
//! can carry exactly, so amounts are kept as [`BigUint`] in yocto and only
//! turned into a decimal token string at the very edge, when rendering.
//!
//! Summation therefore happens on the raw integers, and rendering keeps
//! every significant digit. Nothing is ever rounded.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::config::YOCTO_DECIMALS;

/// Error returned when a raw yocto amount is not a plain decimal integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid yocto amount {0:?}: expected a non-negative decimal integer")]
pub struct ParseStakeError(pub String);

/// An exact stake amount, stored in yocto.
///
/// `Display` renders the amount in whole tokens with all significant
/// fractional digits (`50000000000000000000000000` yocto → `"50.0"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stake(BigUint);

impl Stake {
    /// Zero stake.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Wraps an amount already expressed in yocto.
    pub fn from_yocto(yocto: impl Into<BigUint>) -> Self {
        Self(yocto.into())
    }

    /// Convenience for tests and fixtures: `tokens` whole tokens.
    pub fn from_tokens(tokens: u64) -> Self {
        Self(BigUint::from(tokens) * yocto_per_token())
    }

    /// Parses a raw yocto amount as sent by the RPC (`"5000…000"`).
    ///
    /// Only ASCII digits are accepted. No sign, no exponent, no separators.
    pub fn parse_yocto(raw: &str) -> Result<Self, ParseStakeError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseStakeError(raw.to_string()));
        }
        BigUint::parse_bytes(raw.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| ParseStakeError(raw.to_string()))
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Renders the amount in tokens as a decimal string.
    ///
    /// The integer part is always present, and at least one fractional digit
    /// is always printed so the value reads as a decimal (`"50.0"`, `"0.5"`,
    /// `"1.000000000000000000000001"`). Trailing zeros beyond that are trimmed.
    pub fn to_token_string(&self) -> String {
        let scale = yocto_per_token();
        let whole = &self.0 / &scale;
        let frac = &self.0 % &scale;

        let padded = format!("{:0>width$}", frac.to_string(), width = YOCTO_DECIMALS as usize);
        let trimmed = padded.trim_end_matches('0');
        let frac_digits = if trimmed.is_empty() { "0" } else { trimmed };

        format!("{}.{}", whole, frac_digits)
    }
}

/// 10^24, the number of yocto in one token.
fn yocto_per_token() -> BigUint {
    BigUint::from(10u32).pow(YOCTO_DECIMALS)
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token_string())
    }
}

impl FromStr for Stake {
    type Err = ParseStakeError;

    /// Parses a raw yocto amount. See [`Stake::parse_yocto`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_yocto(s)
    }
}

impl Add for Stake {
    type Output = Stake;

    fn add(self, rhs: Stake) -> Stake {
        Stake(self.0 + rhs.0)
    }
}

impl<'a> AddAssign<&'a Stake> for Stake {
    fn add_assign(&mut self, rhs: &'a Stake) {
        self.0 += &rhs.0;
    }
}

impl AddAssign for Stake {
    fn add_assign(&mut self, rhs: Stake) {
        self.0 += rhs.0;
    }
}

impl<'a> Sum<&'a Stake> for Stake {
    fn sum<I: Iterator<Item = &'a Stake>>(iter: I) -> Stake {
        iter.fold(Stake::zero(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

impl Sum for Stake {
    fn sum<I: Iterator<Item = Stake>>(iter: I) -> Stake {
        iter.fold(Stake::zero(), Add::add)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

/// Accepts the RPC's decimal string, and also bare JSON integers (some
/// archival nodes and test fixtures send those).
impl<'de> Deserialize<'de> for Stake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StakeVisitor;

        impl<'de> Visitor<'de> for StakeVisitor {
            type Value = Stake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a yocto amount as a decimal string or non-negative integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Stake, E> {
                Stake::parse_yocto(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Stake, E> {
                Ok(Stake::from_yocto(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Stake, E> {
                u64::try_from(v)
                    .map(Stake::from_yocto)
                    .map_err(|_| E::custom(format!("negative stake {}", v)))
            }
        }

        deserializer.deserialize_any(StakeVisitor)
    }
}

/// Serializes a stake as a JSON *number* in tokens, without a trip through
/// `f64`. Used by the report via `#[serde(serialize_with = ...)]`.
pub fn serialize_as_tokens<S: Serializer>(stake: &Stake, serializer: S) -> Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(stake.to_token_string()).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_whole_tokens_with_one_decimal() {
        let stake = Stake::parse_yocto("50000000000000000000000000").unwrap();
        assert_eq!(stake.to_string(), "50.0");
        assert_eq!(Stake::zero().to_string(), "0.0");
    }

    #[test]
    fn keeps_every_significant_yocto() {
        // 10^24 + 1 yocto is not representable in f64 at all.
        let stake = Stake::parse_yocto("1000000000000000000000001").unwrap();
        assert_eq!(stake.to_string(), "1.000000000000000000000001");

        let half = Stake::parse_yocto("500000000000000000000000").unwrap();
        assert_eq!(half.to_string(), "0.5");

        let one = Stake::from_yocto(1u32);
        assert_eq!(one.to_string(), "0.000000000000000000000001");
    }

    #[test]
    fn handles_network_scale_amounts() {
        // ~1.2 billion tokens: a whole network's worth of stake.
        let raw = "1234567890123456789012345678901234";
        let stake = Stake::parse_yocto(raw).unwrap();
        assert_eq!(stake.to_string(), "1234567890.123456789012345678901234");
    }

    #[test]
    fn rejects_non_integer_input() {
        for bad in ["", "-5", "+5", "1e24", "12.5", "1_000", " 42", "0x10"] {
            assert!(Stake::parse_yocto(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn sums_exactly() {
        let amounts = [
            Stake::parse_yocto("1000000000000000000000001").unwrap(),
            Stake::parse_yocto("2999999999999999999999999").unwrap(),
            Stake::from_tokens(6),
        ];
        let total: Stake = amounts.iter().sum();
        assert_eq!(total, Stake::from_tokens(10));
    }

    #[test]
    fn deserializes_strings_and_integers() {
        let from_str: Stake = serde_json::from_str("\"75000000000000000000000000\"").unwrap();
        assert_eq!(from_str, Stake::from_tokens(75));

        let from_int: Stake = serde_json::from_str("42").unwrap();
        assert_eq!(from_int, Stake::from_yocto(42u32));

        assert!(serde_json::from_str::<Stake>("-1").is_err());
        assert!(serde_json::from_str::<Stake>("1.5").is_err());
        assert!(serde_json::from_str::<Stake>("\"abc\"").is_err());
    }

    #[test]
    fn serializes_as_raw_json_number() {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(serialize_with = "serialize_as_tokens")]
            stake: Stake,
        }

        let w = Wrapper {
            stake: Stake::parse_yocto("1234567890123456789012345678901234").unwrap(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"stake":1234567890.123456789012345678901234}"#);
    }
}
