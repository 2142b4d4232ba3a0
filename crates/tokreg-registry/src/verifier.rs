//! # Transfer Eligibility
//!
//! The two-party gate consulted before a token transfer settles: both the
//! sender and the receiver must be `VERIFIED` identities holding every
//! required claim. Privileged platform addresses (mint source, burn sink,
//! treasury) bypass their own side of the check.
//!
//! A denial is a normal answer carrying a diagnostic, not an error: the
//! caller (typically the token module's transfer hook) turns it into a
//! rejected transfer, and the reason names which side failed and why.

use std::collections::BTreeSet;

use serde::Serialize;

use tokreg_core::{
    claim_validity, ClaimTopic, ClaimValidity, IdentityRecord, IdentityStatus,
    InvalidClaimReason, RegistryError, WalletAddress,
};

use crate::registry::IdentityRegistry;

/// Which party a transfer denial concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferSide {
    /// The sending address.
    Sender,
    /// The receiving address.
    Receiver,
}

impl TransferSide {
    fn label(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

/// The gate's answer for a proposed transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferDecision {
    /// Whether the transfer may proceed.
    pub eligible: bool,
    /// Denial diagnostic; `None` when eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The side the denial concerns; `None` when eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<TransferSide>,
}

impl TransferDecision {
    fn allow() -> Self {
        Self {
            eligible: true,
            reason: None,
            side: None,
        }
    }

    fn deny(side: TransferSide, reason: String) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
            side: Some(side),
        }
    }
}

/// The transfer eligibility verifier.
#[derive(Clone)]
pub struct EligibilityVerifier {
    registry: IdentityRegistry,
    required_topics: Vec<ClaimTopic>,
    privileged: BTreeSet<WalletAddress>,
}

impl EligibilityVerifier {
    /// Create a verifier over the identity registry.
    ///
    /// `required_topics` is the claim set both parties must hold;
    /// `privileged` addresses skip their own side of the check.
    pub fn new(
        registry: IdentityRegistry,
        required_topics: Vec<ClaimTopic>,
        privileged: BTreeSet<WalletAddress>,
    ) -> Self {
        Self {
            registry,
            required_topics,
            privileged,
        }
    }

    /// Create a verifier with the default requirement (KYC approval) and no
    /// privileged addresses.
    pub fn with_defaults(registry: IdentityRegistry) -> Self {
        Self::new(registry, vec![ClaimTopic::KycApproved], BTreeSet::new())
    }

    /// Decide whether a transfer between two addresses may proceed.
    ///
    /// Sides are checked sender-first; the decision names the first side
    /// that fails. Errors surface only for infrastructure faults — an
    /// unregistered party is an ineligible transfer, not an error.
    pub async fn check_transfer(
        &self,
        sender: &WalletAddress,
        receiver: &WalletAddress,
    ) -> Result<TransferDecision, RegistryError> {
        for (side, address) in [
            (TransferSide::Sender, sender),
            (TransferSide::Receiver, receiver),
        ] {
            if self.privileged.contains(address) {
                continue;
            }
            let record = self.registry.get_identity(address).await?;
            if let Some(reason) = self.side_failure(side, record.as_ref()) {
                tracing::debug!(
                    sender = %sender,
                    receiver = %receiver,
                    side = side.label(),
                    reason,
                    "transfer denied"
                );
                return Ok(TransferDecision::deny(side, reason));
            }
        }
        Ok(TransferDecision::allow())
    }

    /// First failure for one side, evaluated against the identity's claim
    /// projection.
    fn side_failure(&self, side: TransferSide, record: Option<&IdentityRecord>) -> Option<String> {
        let label = side.label();
        let Some(record) = record else {
            return Some(format!("{label} identity is not registered"));
        };
        if record.status != IdentityStatus::Verified {
            return Some(format!(
                "{label} identity status is {}, not VERIFIED",
                record.status
            ));
        }

        let now = chrono::Utc::now();
        for &topic in &self.required_topics {
            match record.claim_for_topic(topic) {
                None => return Some(format!("{label} is missing required claim {topic}")),
                Some(reference) => {
                    if let ClaimValidity::Invalid { reason } =
                        claim_validity(reference.status, reference.expires_at, now)
                    {
                        let detail = match reason {
                            InvalidClaimReason::Expired => "has expired",
                            InvalidClaimReason::Revoked => "is revoked",
                        };
                        return Some(format!("{label} claim {topic} {detail}"));
                    }
                }
            }
        }
        None
    }
}
