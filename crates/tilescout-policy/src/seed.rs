use std::{fmt, str::FromStr};

use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seed of the policy's random source.
///
/// Two policies built from the same seed and fed the same inputs make the
/// same decisions. Serialized as a 32-character hex string.
///
/// ```
/// use rand::Rng as _;
/// use tilescout_policy::PolicySeed;
///
/// let seed: PolicySeed = rand::rng().random();
/// let parsed: PolicySeed = seed.to_string().parse().unwrap();
/// assert_eq!(seed, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicySeed(pub(crate) [u8; 16]);

impl PolicySeed {
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub const fn as_u128(self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

impl fmt::Display for PolicySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.as_u128())
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParsePolicySeedError {
    #[display("invalid seed: expected 32 hex characters, got {_0}")]
    Length(#[error(not(source))] usize),
    #[display("invalid seed: {_0}")]
    Hex(std::num::ParseIntError),
}

impl FromStr for PolicySeed {
    type Err = ParsePolicySeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(ParsePolicySeedError::Length(s.len()));
        }
        let value = u128::from_str_radix(s, 16).map_err(ParsePolicySeedError::Hex)?;
        Ok(Self::from_u128(value))
    }
}

impl Serialize for PolicySeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicySeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        hex_str.parse().map_err(serde::de::Error::custom)
    }
}

impl Distribution<PolicySeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PolicySeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PolicySeed(seed)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng as _;

    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        let seed: PolicySeed = rand::rng().random();
        let json = serde_json::to_string(&seed).unwrap();
        assert_eq!(json.len(), 34);
        let back: PolicySeed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed, back);
    }

    #[test]
    fn test_leading_zeros_preserved() {
        let seed = PolicySeed::from_u128(0xab);
        assert_eq!(seed.to_string(), "000000000000000000000000000000ab");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            "abc".parse::<PolicySeed>(),
            Err(ParsePolicySeedError::Length(3))
        ));
        assert!(matches!(
            "zz000000000000000000000000000000".parse::<PolicySeed>(),
            Err(ParsePolicySeedError::Hex(_))
        ));
        assert!(serde_json::from_str::<PolicySeed>("\"1234\"").is_err());
    }
}
