//! Provider implementations for name lookups.
//!
//! Each provider implements [`crate::AvailabilityChecker`] and owns all of
//! its transport details.

/// OSRS and RS3 hiscore lookups
pub mod hiscores;

pub use hiscores::{default_endpoint, HiscoreClient};
