//! # API Route Modules
//!
//! Route modules for the compliance registry API surface:
//!
//! - `identities` — registration (single and batch), verification
//!   diagnostics, status lifecycle, claim detachment, reconcile.
//! - `claims` — issuance composed with identity attachment, verification,
//!   revocation, renewal, bulk updates, expired sweep.
//! - `issuers` — trusted issuer registration and lookup.
//! - `transfers` — the two-party transfer eligibility gate.
//! - `audit` — read-only audit history and chain integrity.

pub mod audit;
pub mod claims;
pub mod identities;
pub mod issuers;
pub mod transfers;
