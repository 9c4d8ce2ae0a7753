//! Input validation helpers.

use soroban_sdk::{Address, Env, String};

/// Canonical all-zero Stellar account strkey.
const ZERO_STRKEY: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

pub struct Validation;

impl Validation {
    /// True if `address` is the all-zero account identity.
    pub fn is_zero_address(e: &Env, address: &Address) -> bool {
        let zero = Address::from_string(&String::from_str(e, ZERO_STRKEY));
        *address == zero
    }

    pub fn is_positive(amount: i128) -> bool {
        amount > 0
    }
}
