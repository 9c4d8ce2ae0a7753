//! Global pause flag.
//!
//! The flag lives in instance storage under a fixed key so that contracts
//! can also seed it explicitly at initialization. Flipping it publishes an
//! audit event stamped with the ledger time.

use soroban_sdk::{symbol_short, Env, Symbol};

pub struct Pausable;

impl Pausable {
    pub const PAUSED_KEY: Symbol = symbol_short!("PAUSED");

    pub fn is_paused(e: &Env) -> bool {
        e.storage()
            .instance()
            .get(&Self::PAUSED_KEY)
            .unwrap_or(false)
    }

    pub fn pause(e: &Env) {
        e.storage().instance().set(&Self::PAUSED_KEY, &true);
        e.events()
            .publish((symbol_short!("paused"),), e.ledger().timestamp());
    }

    pub fn unpause(e: &Env) {
        e.storage().instance().set(&Self::PAUSED_KEY, &false);
        e.events()
            .publish((symbol_short!("unpaused"),), e.ledger().timestamp());
    }
}
