#![no_std]

//! Unvalidated rate feed for tests.
//!
//! Accepts any rate and timestamp, including the non-positive rates the
//! real feed refuses, so consumers can exercise their bad-feed handling.
//! Before the first update it serves a zero rate.

use soroban_sdk::{contract, contractimpl, contracttype, Env};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PriceData {
    pub rate: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Rate,
}

#[contract]
pub struct MockOracleContract;

#[contractimpl]
impl MockOracleContract {
    pub fn set_rate(e: Env, rate: i128, timestamp: u64) {
        e.storage()
            .instance()
            .set(&DataKey::Rate, &PriceData { rate, timestamp });
    }

    pub fn latest_rate(e: Env) -> PriceData {
        e.storage()
            .instance()
            .get(&DataKey::Rate)
            .unwrap_or(PriceData {
                rate: 0,
                timestamp: 0,
            })
    }
}
