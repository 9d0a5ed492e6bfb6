//! Ledger object identifiers
//!
//! Object ids are 32 bytes rendered as `0x` followed by 64 lowercase hex
//! characters. Anything else is rejected before it can reach the ledger.

use crate::error::{PolicyError, Result};

/// Length of a rendered identifier, prefix included
pub const POLICY_ID_LEN: usize = 66;

const PREFIX: &str = "0x";

/// Structural check only; says nothing about whether the object exists.
pub fn is_well_formed(id: &str) -> bool {
    id.len() == POLICY_ID_LEN
        && id.starts_with(PREFIX)
        && id[PREFIX.len()..]
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Like [`is_well_formed`] but as a `Result` for `?` call sites.
pub fn check(id: &str) -> Result<()> {
    if is_well_formed(id) {
        Ok(())
    } else {
        Err(PolicyError::MalformedIdentifier(id.to_string()))
    }
}
