//! Ledger clock helpers.
//!
//! All deadline checks read the ledger timestamp once per operation through
//! these helpers; nothing in the workspace polls time.

use soroban_sdk::Env;

pub struct TimeUtils;

impl TimeUtils {
    /// Current ledger timestamp.
    pub fn now(e: &Env) -> u64 {
        e.ledger().timestamp()
    }

    /// `now + period`, rejecting deadlines that would overflow u64.
    pub fn checked_deadline(e: &Env, period: u64) -> Option<u64> {
        Self::now(e).checked_add(period)
    }
}
