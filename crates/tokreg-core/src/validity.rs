//! # Claim Validity
//!
//! Validity is a pure function of `(status, expires_at, now)` evaluated at
//! every read. The stored `EXPIRED` status is a best-effort hint written
//! back lazily by the claims engine; two readers racing to expire the same
//! claim both get the same answer from this function regardless of which
//! write-back lands first.

use chrono::{DateTime, Utc};

use crate::record::ClaimStatus;

const SECONDS_PER_DAY: i64 = 86_400;

/// Why a claim is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidClaimReason {
    /// The claim was explicitly revoked.
    Revoked,
    /// The claim's expiry has passed (or its stored status is `EXPIRED`).
    Expired,
}

impl InvalidClaimReason {
    /// The denial message surfaced to callers.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Revoked => "Claim status is REVOKED",
            Self::Expired => "Claim has expired",
        }
    }
}

/// The outcome of a claim validity evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimValidity {
    /// The claim counts toward compliance checks.
    Valid {
        /// Days until expiry (ceiling), if the claim is time-bounded.
        expires_in_days: Option<i64>,
    },
    /// The claim does not count.
    Invalid {
        /// Machine-distinguishable reason.
        reason: InvalidClaimReason,
    },
}

impl ClaimValidity {
    /// Whether the claim is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Evaluate claim validity at instant `now`.
///
/// Precedence: revocation is terminal and wins over expiry; time-based
/// expiry wins over the stored status, so a claim past `expires_at` is
/// invalid even while still stored as `ACTIVE`.
pub fn claim_validity(
    status: ClaimStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ClaimValidity {
    if status == ClaimStatus::Revoked {
        return ClaimValidity::Invalid {
            reason: InvalidClaimReason::Revoked,
        };
    }

    if let Some(expiry) = expires_at {
        if expiry <= now {
            return ClaimValidity::Invalid {
                reason: InvalidClaimReason::Expired,
            };
        }
    }

    if status == ClaimStatus::Expired {
        // Stored status says expired but the timestamp does not (e.g. the
        // expiry was extended directly in the store). The stored status is
        // the hint we have; stay invalid until an explicit renewal.
        return ClaimValidity::Invalid {
            reason: InvalidClaimReason::Expired,
        };
    }

    let expires_in_days = expires_at.map(|expiry| {
        let seconds = (expiry - now).num_seconds();
        (seconds + SECONDS_PER_DAY - 1).div_euclid(SECONDS_PER_DAY)
    });

    ClaimValidity::Valid { expires_in_days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn active_unbounded_is_valid() {
        let v = claim_validity(ClaimStatus::Active, None, Utc::now());
        assert_eq!(v, ClaimValidity::Valid { expires_in_days: None });
    }

    #[test]
    fn active_with_future_expiry_is_valid_with_days() {
        let now = Utc::now();
        let v = claim_validity(
            ClaimStatus::Active,
            Some(now + Duration::days(365)),
            now,
        );
        assert_eq!(
            v,
            ClaimValidity::Valid {
                expires_in_days: Some(365)
            }
        );
    }

    #[test]
    fn days_to_expiry_uses_ceiling() {
        let now = Utc::now();
        // One second into the future still counts as one day remaining.
        let v = claim_validity(ClaimStatus::Active, Some(now + Duration::seconds(1)), now);
        assert_eq!(v, ClaimValidity::Valid { expires_in_days: Some(1) });

        let v = claim_validity(
            ClaimStatus::Active,
            Some(now + Duration::days(2) + Duration::seconds(1)),
            now,
        );
        assert_eq!(v, ClaimValidity::Valid { expires_in_days: Some(3) });
    }

    #[test]
    fn past_expiry_invalid_even_while_stored_active() {
        let now = Utc::now();
        let v = claim_validity(ClaimStatus::Active, Some(now - Duration::seconds(1)), now);
        assert_eq!(
            v,
            ClaimValidity::Invalid {
                reason: InvalidClaimReason::Expired
            }
        );
    }

    #[test]
    fn expiry_exactly_now_is_expired() {
        let now = Utc::now();
        let v = claim_validity(ClaimStatus::Active, Some(now), now);
        assert!(!v.is_valid());
    }

    #[test]
    fn revoked_is_invalid_regardless_of_expiry() {
        let now = Utc::now();
        let v = claim_validity(ClaimStatus::Revoked, Some(now + Duration::days(10)), now);
        assert_eq!(
            v,
            ClaimValidity::Invalid {
                reason: InvalidClaimReason::Revoked
            }
        );
    }

    #[test]
    fn revocation_wins_over_expiry() {
        let now = Utc::now();
        let v = claim_validity(ClaimStatus::Revoked, Some(now - Duration::days(1)), now);
        assert_eq!(
            v,
            ClaimValidity::Invalid {
                reason: InvalidClaimReason::Revoked
            }
        );
    }

    #[test]
    fn stored_expired_is_invalid_even_with_future_timestamp() {
        let now = Utc::now();
        let v = claim_validity(ClaimStatus::Expired, Some(now + Duration::days(5)), now);
        assert_eq!(
            v,
            ClaimValidity::Invalid {
                reason: InvalidClaimReason::Expired
            }
        );
    }

    #[test]
    fn reason_messages() {
        assert_eq!(InvalidClaimReason::Expired.message(), "Claim has expired");
        assert_eq!(
            InvalidClaimReason::Revoked.message(),
            "Claim status is REVOKED"
        );
    }

    proptest! {
        /// Expiry monotonicity: any claim whose expiry is at or before `now`
        /// is invalid no matter what status the store holds.
        #[test]
        fn expired_claims_never_validate(offset_secs in 0i64..10_000_000, status_idx in 0usize..3) {
            let status = [ClaimStatus::Active, ClaimStatus::Revoked, ClaimStatus::Expired][status_idx];
            let now = Utc::now();
            let expiry = now - Duration::seconds(offset_secs);
            let v = claim_validity(status, Some(expiry), now);
            prop_assert!(!v.is_valid());
        }

        /// A valid bounded claim always reports at least one day to expiry,
        /// and never more than the real distance rounded up.
        #[test]
        fn valid_days_are_positive_ceiling(secs in 1i64..400 * 86_400) {
            let now = Utc::now();
            let expiry = now + Duration::seconds(secs);
            if let ClaimValidity::Valid { expires_in_days: Some(days) } =
                claim_validity(ClaimStatus::Active, Some(expiry), now)
            {
                prop_assert!(days >= 1);
                prop_assert!(days <= secs / 86_400 + 1);
            } else {
                prop_assert!(false, "expected valid claim");
            }
        }
    }
}
