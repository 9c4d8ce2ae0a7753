#![no_std]

//! Admin-fed exchange-rate feed.
//!
//! Serves the native-asset-to-USD rate the ledger uses to enforce its
//! minimum-commitment threshold. Rates are stored in 8-decimal fixed
//! precision together with the ledger time they were set.

use soroban_sdk::{contract, contracterror, contractimpl, contracttype, symbol_short, Address, Env};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum OracleError {
    /// Contract has already been initialized
    AlreadyInitialized = 1,
    /// Contract has not been initialized
    NotInitialized = 2,
    /// Caller is not the feed admin
    Unauthorized = 3,
    /// Rates must be positive
    InvalidRate = 4,
    /// No rate has been published yet
    NoRate = 5,
}

/// Exchange rate in 8-decimal fixed precision with the ledger time it was
/// published.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PriceData {
    pub rate: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Rate,
}

/// Decimal places of every published rate.
pub const DECIMALS: u32 = 8;

#[contract]
pub struct PriceOracleContract;

#[contractimpl]
impl PriceOracleContract {
    pub fn initialize(e: Env, admin: Address) -> Result<(), OracleError> {
        if e.storage().instance().has(&DataKey::Admin) {
            return Err(OracleError::AlreadyInitialized);
        }
        e.storage().instance().set(&DataKey::Admin, &admin);
        Ok(())
    }

    /// Publish a new rate. Only the feed admin may call this; non-positive
    /// rates are refused at the source.
    pub fn set_rate(e: Env, caller: Address, rate: i128) -> Result<(), OracleError> {
        caller.require_auth();
        let admin: Address = e
            .storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(OracleError::NotInitialized)?;
        if caller != admin {
            return Err(OracleError::Unauthorized);
        }
        if rate <= 0 {
            return Err(OracleError::InvalidRate);
        }

        let data = PriceData {
            rate,
            timestamp: e.ledger().timestamp(),
        };
        e.storage().instance().set(&DataKey::Rate, &data);

        e.events()
            .publish((symbol_short!("RateSet"), caller), (rate, data.timestamp));
        Ok(())
    }

    /// Latest published rate.
    pub fn latest_rate(e: Env) -> Result<PriceData, OracleError> {
        e.storage()
            .instance()
            .get(&DataKey::Rate)
            .ok_or(OracleError::NoRate)
    }

    pub fn decimals(_e: Env) -> u32 {
        DECIMALS
    }

    pub fn get_admin(e: Env) -> Result<Address, OracleError> {
        e.storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(OracleError::NotInitialized)
    }
}
