//! # Claim Topics
//!
//! The closed set of claim topics the platform attests. One definition,
//! exhaustive `match` everywhere — unknown topic strings are rejected at
//! the boundary instead of being stored as free text.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A claim topic: the subject matter an issuer attests about an identity.
///
/// Serialized as SCREAMING_SNAKE_CASE strings to match the document
/// contract (`"KYC_APPROVED"`, `"ACCREDITED_INVESTOR"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimTopic {
    /// Know-your-customer verification passed. The minimum requirement for
    /// every transfer.
    KycApproved,
    /// Accredited-investor determination under the applicable regime.
    AccreditedInvestor,
    /// Anti-money-laundering screening cleared.
    AmlCleared,
    /// Residence country is on the offering's whitelist.
    CountryWhitelisted,
    /// Investor categorization (retail/professional/institutional).
    InvestorCategory,
}

impl ClaimTopic {
    /// All topics, in canonical order.
    pub const ALL: [ClaimTopic; 5] = [
        ClaimTopic::KycApproved,
        ClaimTopic::AccreditedInvestor,
        ClaimTopic::AmlCleared,
        ClaimTopic::CountryWhitelisted,
        ClaimTopic::InvestorCategory,
    ];

    /// Return the canonical string representation of this topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KycApproved => "KYC_APPROVED",
            Self::AccreditedInvestor => "ACCREDITED_INVESTOR",
            Self::AmlCleared => "AML_CLEARED",
            Self::CountryWhitelisted => "COUNTRY_WHITELISTED",
            Self::InvestorCategory => "INVESTOR_CATEGORY",
        }
    }
}

impl std::fmt::Display for ClaimTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimTopic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KYC_APPROVED" => Ok(Self::KycApproved),
            "ACCREDITED_INVESTOR" => Ok(Self::AccreditedInvestor),
            "AML_CLEARED" => Ok(Self::AmlCleared),
            "COUNTRY_WHITELISTED" => Ok(Self::CountryWhitelisted),
            "INVESTOR_CATEGORY" => Ok(Self::InvestorCategory),
            other => Err(ValidationError::UnknownTopic(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_roundtrips_through_string() {
        for topic in ClaimTopic::ALL {
            let parsed: ClaimTopic = topic.as_str().parse().unwrap();
            assert_eq!(topic, parsed);
        }
    }

    #[test]
    fn every_topic_roundtrips_through_serde() {
        for topic in ClaimTopic::ALL {
            let json = serde_json::to_string(&topic).unwrap();
            assert_eq!(json, format!("\"{}\"", topic.as_str()));
            let back: ClaimTopic = serde_json::from_str(&json).unwrap();
            assert_eq!(topic, back);
        }
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let err = "SPACE_LAW_CLEARED".parse::<ClaimTopic>().unwrap_err();
        assert!(format!("{err}").contains("SPACE_LAW_CLEARED"));
    }

    #[test]
    fn topic_ordering_is_stable() {
        // BTreeSet<ClaimTopic> in TrustedIssuer relies on Ord being defined.
        assert!(ClaimTopic::KycApproved < ClaimTopic::AccreditedInvestor);
    }
}
