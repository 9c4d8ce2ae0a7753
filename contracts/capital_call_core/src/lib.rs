#![no_std]

//! Capital-commitment and capital-call ledger for a pooled-investment fund.
//!
//! Tracks how much each Limited Partner has committed, how the commitment is
//! split into scheduled tranches and ad-hoc cash calls, how much has been
//! paid against each, and which administrators may create, pay, execute,
//! reverse or penalize those obligations.

use shared_utils::{Pausable, SafeMath, TimeUtils, Validation};
use soroban_sdk::{
    contract, contractclient, contracterror, contractimpl, contracttype, symbol_short, token,
    Address, Env, Vec,
};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    /// Caller lacks the role required for this operation
    Unauthorized = 1,
    /// Identity is the zero address, or violates an admin-set rule
    InvalidParty = 2,
    /// No active commitment is registered for this identity
    UnknownLP = 3,
    /// Identity already holds an active commitment
    AlreadyRegistered = 4,
    /// Schedule percentages, periods or end time are inconsistent
    InvalidSchedule = 5,
    /// Commitment value is under the USD minimum
    BelowMinimum = 6,
    /// Amount must be positive (or non-zero for parameters)
    InvalidAmount = 7,
    /// Call deadline is in the past, beyond the LP's end time, or not after
    /// the previous call's deadline
    DeadlineOutOfRange = 8,
    /// Call or tranche index does not exist
    UnknownCall = 9,
    /// Cash call has already been executed
    AlreadyExecuted = 10,
    /// Cash call has not been executed
    NotExecuted = 11,
    /// Tranche deadline has passed
    Expired = 12,
    /// Payment would exceed the target's required amount
    Overpayment = 13,
    /// Custodied balance is smaller than the requested withdrawal
    InsufficientFunds = 14,
    /// Withdrawal recipient is the zero address
    InvalidRecipient = 15,
    /// Rate feed reported a non-positive rate
    InvalidPriceData = 16,
    /// Contract is paused
    Paused = 17,
    /// Contract has not been initialized
    NotInitialized = 18,
    /// Contract has already been initialized
    AlreadyInitialized = 19,
    /// A value-moving operation is already in progress
    ReentrancyDetected = 20,
    /// Balance arithmetic overflowed
    MathOverflow = 21,
}

// ============================================================================
// Data Types
// ============================================================================

/// A scheduled slice of an LP's commitment.
///
/// `deadline` is a hard payment cutoff: payments against the tranche are
/// refused once the ledger time has passed it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tranche {
    /// Whole-percent share of the commitment due by `deadline`
    pub percent: u32,
    pub deadline: u64,
    pub paid_amount: i128,
}

/// Schedule input at registration: a percentage plus a period relative to
/// the registration time.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrancheSpec {
    pub percent: u32,
    pub period: u64,
}

/// Per-LP commitment record.
///
/// Revocation zeroes the amount fields but keeps the record as a tombstone;
/// `commitment_amount > 0` is the definition of "is an LP".
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commitment {
    pub lp: Address,
    pub commitment_amount: i128,
    pub total_paid: i128,
    /// Cumulative penalties assessed; raises the outstanding balance
    pub penalty_assessed: i128,
    /// No call against this LP may be scheduled past this time
    pub end_time: u64,
    pub registered_at: u64,
    pub tranches: Vec<Tranche>,
}

/// An administrator-issued payment request layered on the tranche schedule.
///
/// `deadline` is the moment the call becomes due (`is_call_due` flips); the
/// payment window is closed by execution, not by the deadline.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CashCall {
    pub amount: i128,
    pub paid_amount: i128,
    pub deadline: u64,
    pub executed: bool,
    pub created_at: u64,
}

/// Target of a payment: a scheduled tranche or an ad-hoc cash call.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PaymentTarget {
    Tranche(u32),
    Call(u32),
}

/// Rate feed data (defined locally for cross-contract calls).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PriceData {
    pub rate: i128,
    pub timestamp: u64,
}

/// Client interface of the exchange-rate feed contract.
#[contractclient(name = "RateFeedClient")]
pub trait RateFeed {
    fn latest_rate(env: Env) -> PriceData;
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admins,              // Vec<Address>, always contains DefaultAdmin
    DefaultAdmin,        // Address with exclusive admin-set rights
    Asset,               // custody token contract
    Oracle,              // rate feed contract
    MinCommitmentUsd,    // i128, 18-decimal USD
    CustodiedBalance,    // i128, unattributed + attributed custody
    ReentrancyGuard,     // bool, held across value transfers
    Commitment(Address), // lp -> Commitment
    CallCount(Address),  // lp -> number of live calls
    Call(Address, u32),  // (lp, index) -> CashCall
}

/// Decimal places reported by the rate feed.
const FEED_DECIMALS: u32 = 8;
/// One whole unit of the feed's fixed-point rate.
const FEED_ONE: i128 = 10i128.pow(FEED_DECIMALS);
/// One whole unit in the ledger's 18-decimal internal precision.
const ONE: i128 = 1_000_000_000_000_000_000;
/// Default minimum commitment: 10,000 USD in internal precision.
const DEFAULT_MIN_COMMITMENT_USD: i128 = 10_000 * ONE;

// ─── Storage helpers ──────────────────────────────────────────────────────────

fn read_admins(e: &Env) -> Vec<Address> {
    e.storage()
        .instance()
        .get(&DataKey::Admins)
        .unwrap_or(Vec::new(e))
}

fn write_admins(e: &Env, admins: &Vec<Address>) {
    e.storage().instance().set(&DataKey::Admins, admins);
}

fn read_default_admin(e: &Env) -> Result<Address, Error> {
    e.storage()
        .instance()
        .get(&DataKey::DefaultAdmin)
        .ok_or(Error::NotInitialized)
}

fn read_asset(e: &Env) -> Result<Address, Error> {
    e.storage()
        .instance()
        .get(&DataKey::Asset)
        .ok_or(Error::NotInitialized)
}

fn read_min_commitment(e: &Env) -> Result<i128, Error> {
    e.storage()
        .instance()
        .get(&DataKey::MinCommitmentUsd)
        .ok_or(Error::NotInitialized)
}

fn read_custodied(e: &Env) -> i128 {
    e.storage()
        .instance()
        .get(&DataKey::CustodiedBalance)
        .unwrap_or(0)
}

fn write_custodied(e: &Env, balance: i128) {
    e.storage()
        .instance()
        .set(&DataKey::CustodiedBalance, &balance);
}

fn read_commitment(e: &Env, lp: &Address) -> Option<Commitment> {
    e.storage()
        .persistent()
        .get(&DataKey::Commitment(lp.clone()))
}

fn write_commitment(e: &Env, commitment: &Commitment) {
    e.storage()
        .persistent()
        .set(&DataKey::Commitment(commitment.lp.clone()), commitment);
}

/// Commitment record with `commitment_amount > 0`; tombstones left by
/// revocation are not LPs.
fn read_active_commitment(e: &Env, lp: &Address) -> Result<Commitment, Error> {
    match read_commitment(e, lp) {
        Some(c) if c.commitment_amount > 0 => Ok(c),
        _ => Err(Error::UnknownLP),
    }
}

fn read_call_count(e: &Env, lp: &Address) -> u32 {
    e.storage()
        .persistent()
        .get(&DataKey::CallCount(lp.clone()))
        .unwrap_or(0)
}

fn write_call_count(e: &Env, lp: &Address, count: u32) {
    e.storage()
        .persistent()
        .set(&DataKey::CallCount(lp.clone()), &count);
}

fn write_call(e: &Env, lp: &Address, call_id: u32, call: &CashCall) {
    e.storage()
        .persistent()
        .set(&DataKey::Call(lp.clone(), call_id), call);
}

/// Call records from a revoked registration are superseded in place when the
/// identity re-registers, so existence alone is not enough: the index must
/// be under the current generation's counter.
fn read_live_call(e: &Env, lp: &Address, call_id: u32) -> Result<CashCall, Error> {
    if call_id >= read_call_count(e, lp) {
        return Err(Error::UnknownCall);
    }
    e.storage()
        .persistent()
        .get(&DataKey::Call(lp.clone(), call_id))
        .ok_or(Error::UnknownCall)
}

// ─── Authorization and guards ─────────────────────────────────────────────────

fn require_admin(e: &Env, caller: &Address) -> Result<(), Error> {
    caller.require_auth();
    if !read_admins(e).contains(caller) {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

fn require_default_admin(e: &Env, caller: &Address) -> Result<(), Error> {
    caller.require_auth();
    if *caller != read_default_admin(e)? {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

fn require_not_paused(e: &Env) -> Result<(), Error> {
    if Pausable::is_paused(e) {
        return Err(Error::Paused);
    }
    Ok(())
}

/// Taken after validation and held across the external token call of a
/// value-moving operation. A failed transfer traps and rolls the flag back
/// with the rest of the state.
fn lock_reentrancy(e: &Env) -> Result<(), Error> {
    let held: bool = e
        .storage()
        .instance()
        .get(&DataKey::ReentrancyGuard)
        .unwrap_or(false);
    if held {
        return Err(Error::ReentrancyDetected);
    }
    e.storage().instance().set(&DataKey::ReentrancyGuard, &true);
    Ok(())
}

fn release_reentrancy(e: &Env) {
    e.storage()
        .instance()
        .set(&DataKey::ReentrancyGuard, &false);
}

// ─── Derived values ───────────────────────────────────────────────────────────

/// Outstanding balance: commitment plus penalties minus payments, clamped
/// at zero.
fn remaining_of(commitment: &Commitment) -> Result<i128, Error> {
    let owed = SafeMath::checked_add(commitment.commitment_amount, commitment.penalty_assessed)
        .ok_or(Error::MathOverflow)?;
    if owed > commitment.total_paid {
        Ok(owed - commitment.total_paid)
    } else {
        Ok(0)
    }
}

/// Amount due against one tranche: `commitment_amount * percent / 100`.
fn tranche_due(commitment: &Commitment, tranche: &Tranche) -> Result<i128, Error> {
    SafeMath::percent_of(commitment.commitment_amount, tranche.percent).ok_or(Error::MathOverflow)
}

/// USD value of a native-asset amount via the rate feed.
///
/// Multiplying the 18-decimal amount by the 8-decimal rate and dividing by
/// one feed unit rescales the result into the 18-decimal internal USD unit
/// without pushing the intermediate product past i128 range.
fn usd_value(e: &Env, amount: i128) -> Result<i128, Error> {
    let oracle: Address = e
        .storage()
        .instance()
        .get(&DataKey::Oracle)
        .ok_or(Error::NotInitialized)?;
    let data = RateFeedClient::new(e, &oracle).latest_rate();
    if data.rate <= 0 {
        return Err(Error::InvalidPriceData);
    }
    SafeMath::mul_div(amount, data.rate, FEED_ONE).ok_or(Error::MathOverflow)
}

#[contract]
pub struct CapitalCallCoreContract;

#[contractimpl]
impl CapitalCallCoreContract {
    // ========================================================================
    // Initialization and pause
    // ========================================================================

    /// Initialize the ledger with its default admin, custody token and rate
    /// feed. The default admin is also the first member of the admin set.
    pub fn initialize(e: Env, admin: Address, asset: Address, oracle: Address) -> Result<(), Error> {
        if e.storage().instance().has(&DataKey::DefaultAdmin) {
            return Err(Error::AlreadyInitialized);
        }
        if Validation::is_zero_address(&e, &admin) {
            return Err(Error::InvalidParty);
        }

        let mut admins = Vec::new(&e);
        admins.push_back(admin.clone());
        write_admins(&e, &admins);
        e.storage().instance().set(&DataKey::DefaultAdmin, &admin);
        e.storage().instance().set(&DataKey::Asset, &asset);
        e.storage().instance().set(&DataKey::Oracle, &oracle);
        e.storage()
            .instance()
            .set(&DataKey::MinCommitmentUsd, &DEFAULT_MIN_COMMITMENT_USD);
        write_custodied(&e, 0);
        e.storage().instance().set(&Pausable::PAUSED_KEY, &false);
        Ok(())
    }

    /// Pause every state-mutating entry point except admin-role changes and
    /// `unpause`. Caller must be an admin.
    pub fn pause(e: Env, caller: Address) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;
        Pausable::pause(&e);
        Ok(())
    }

    /// Lift the pause. Caller must be an admin.
    pub fn unpause(e: Env, caller: Address) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        Pausable::unpause(&e);
        Ok(())
    }

    pub fn is_paused(e: Env) -> bool {
        Pausable::is_paused(&e)
    }

    // ========================================================================
    // Access control
    // ========================================================================

    pub fn is_admin(e: Env, id: Address) -> bool {
        read_admins(&e).contains(&id)
    }

    pub fn get_admins(e: Env) -> Vec<Address> {
        read_admins(&e)
    }

    pub fn get_default_admin(e: Env) -> Result<Address, Error> {
        read_default_admin(&e)
    }

    /// Add an ordinary admin. Only the default admin may call this.
    pub fn add_admin(e: Env, caller: Address, admin: Address) -> Result<(), Error> {
        require_default_admin(&e, &caller)?;
        if Validation::is_zero_address(&e, &admin) {
            return Err(Error::InvalidParty);
        }
        let mut admins = read_admins(&e);
        if admins.contains(&admin) {
            return Err(Error::InvalidParty);
        }
        admins.push_back(admin.clone());
        write_admins(&e, &admins);

        e.events()
            .publish((symbol_short!("AdminAdd"), admin), TimeUtils::now(&e));
        Ok(())
    }

    /// Remove an ordinary admin. The default admin is always a member and
    /// cannot be removed, which keeps the set non-empty.
    pub fn remove_admin(e: Env, caller: Address, admin: Address) -> Result<(), Error> {
        require_default_admin(&e, &caller)?;
        if admin == read_default_admin(&e)? {
            return Err(Error::InvalidParty);
        }
        let mut admins = read_admins(&e);
        let index = admins.first_index_of(&admin).ok_or(Error::InvalidParty)?;
        admins.remove(index);
        write_admins(&e, &admins);

        e.events()
            .publish((symbol_short!("AdminRem"), admin), TimeUtils::now(&e));
        Ok(())
    }

    /// Hand the default-admin role to another identity, granting it ordinary
    /// membership if absent. The outgoing default admin stays a member.
    pub fn transfer_default_admin(e: Env, caller: Address, new_admin: Address) -> Result<(), Error> {
        require_default_admin(&e, &caller)?;
        if Validation::is_zero_address(&e, &new_admin) {
            return Err(Error::InvalidParty);
        }
        let mut admins = read_admins(&e);
        if !admins.contains(&new_admin) {
            admins.push_back(new_admin.clone());
            write_admins(&e, &admins);
        }
        e.storage()
            .instance()
            .set(&DataKey::DefaultAdmin, &new_admin);

        e.events().publish(
            (symbol_short!("AdminXfer"), caller, new_admin),
            TimeUtils::now(&e),
        );
        Ok(())
    }

    // ========================================================================
    // Commitment registry
    // ========================================================================

    pub fn is_lp(e: Env, lp: Address) -> bool {
        read_active_commitment(&e, &lp).is_ok()
    }

    /// Register a new LP commitment.
    ///
    /// The schedule is materialized at registration time: each tranche
    /// deadline becomes `now + period`. A non-empty schedule's percentages
    /// must sum to exactly 100 and its deadlines must be strictly increasing
    /// and within `end_time`. An identity revoked earlier may register again;
    /// its call counter restarts at zero.
    pub fn register_commitment(
        e: Env,
        caller: Address,
        lp: Address,
        amount: i128,
        schedule: Vec<TrancheSpec>,
        end_time: u64,
    ) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        if Validation::is_zero_address(&e, &lp) {
            return Err(Error::InvalidParty);
        }
        if read_active_commitment(&e, &lp).is_ok() {
            return Err(Error::AlreadyRegistered);
        }
        if !Validation::is_positive(amount) {
            return Err(Error::InvalidAmount);
        }

        let now = TimeUtils::now(&e);
        if end_time <= now {
            return Err(Error::InvalidSchedule);
        }

        if usd_value(&e, amount)? < read_min_commitment(&e)? {
            return Err(Error::BelowMinimum);
        }

        let mut tranches = Vec::new(&e);
        if !schedule.is_empty() {
            let mut percent_sum: u32 = 0;
            let mut last_deadline = now;
            for spec in schedule.iter() {
                if spec.percent == 0 {
                    return Err(Error::InvalidSchedule);
                }
                percent_sum = percent_sum
                    .checked_add(spec.percent)
                    .ok_or(Error::InvalidSchedule)?;
                let deadline =
                    TimeUtils::checked_deadline(&e, spec.period).ok_or(Error::MathOverflow)?;
                if deadline <= last_deadline || deadline > end_time {
                    return Err(Error::InvalidSchedule);
                }
                last_deadline = deadline;
                tranches.push_back(Tranche {
                    percent: spec.percent,
                    deadline,
                    paid_amount: 0,
                });
            }
            if percent_sum != 100 {
                return Err(Error::InvalidSchedule);
            }
        }

        let commitment = Commitment {
            lp: lp.clone(),
            commitment_amount: amount,
            total_paid: 0,
            penalty_assessed: 0,
            end_time,
            registered_at: now,
            tranches,
        };
        write_commitment(&e, &commitment);
        write_call_count(&e, &lp, 0);

        e.events()
            .publish((symbol_short!("CommitSet"), lp), (amount, end_time, now));
        Ok(())
    }

    /// Commitment record for an LP, including revoked tombstones.
    pub fn get_commitment(e: Env, lp: Address) -> Result<Commitment, Error> {
        read_commitment(&e, &lp).ok_or(Error::UnknownLP)
    }

    /// Outstanding balance for an LP, clamped at zero.
    pub fn remaining_commitment(e: Env, lp: Address) -> Result<i128, Error> {
        let commitment = read_commitment(&e, &lp).ok_or(Error::UnknownLP)?;
        remaining_of(&commitment)
    }

    /// Set the USD minimum for new commitments. Admin-only; zero is not a
    /// valid minimum.
    pub fn set_minimum_commitment(e: Env, caller: Address, usd_amount: i128) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;
        if !Validation::is_positive(usd_amount) {
            return Err(Error::InvalidAmount);
        }
        e.storage()
            .instance()
            .set(&DataKey::MinCommitmentUsd, &usd_amount);
        Ok(())
    }

    pub fn get_minimum_commitment(e: Env) -> Result<i128, Error> {
        read_min_commitment(&e)
    }

    // ========================================================================
    // Call scheduler
    // ========================================================================

    /// Issue a cash call against an LP.
    ///
    /// Deadlines are strictly increasing across an LP's calls and must stay
    /// within the LP's end time, so calls fall due in creation order.
    pub fn create_call(
        e: Env,
        caller: Address,
        lp: Address,
        amount: i128,
        deadline: u64,
    ) -> Result<u32, Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        let commitment = read_active_commitment(&e, &lp)?;
        if !Validation::is_positive(amount) {
            return Err(Error::InvalidAmount);
        }
        let now = TimeUtils::now(&e);
        if deadline <= now || deadline > commitment.end_time {
            return Err(Error::DeadlineOutOfRange);
        }
        let count = read_call_count(&e, &lp);
        if count > 0 {
            let previous = read_live_call(&e, &lp, count - 1)?;
            if deadline <= previous.deadline {
                return Err(Error::DeadlineOutOfRange);
            }
        }

        let call = CashCall {
            amount,
            paid_amount: 0,
            deadline,
            executed: false,
            created_at: now,
        };
        write_call(&e, &lp, count, &call);
        write_call_count(&e, &lp, count + 1);

        e.events().publish(
            (symbol_short!("CallNew"), lp),
            (count, amount, deadline, now),
        );
        Ok(count)
    }

    /// Latch a cash call as executed, closing its payment window.
    pub fn execute_call(e: Env, caller: Address, lp: Address, call_id: u32) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        read_active_commitment(&e, &lp)?;
        let mut call = read_live_call(&e, &lp, call_id)?;
        if call.executed {
            return Err(Error::AlreadyExecuted);
        }
        call.executed = true;
        write_call(&e, &lp, call_id, &call);

        e.events().publish(
            (symbol_short!("CallExec"), lp),
            (call_id, call.amount, TimeUtils::now(&e)),
        );
        Ok(())
    }

    /// Clear an executed call's latch, reopening its payment window.
    pub fn reverse_execution(
        e: Env,
        caller: Address,
        lp: Address,
        call_id: u32,
    ) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        read_active_commitment(&e, &lp)?;
        let mut call = read_live_call(&e, &lp, call_id)?;
        if !call.executed {
            return Err(Error::NotExecuted);
        }
        call.executed = false;
        write_call(&e, &lp, call_id, &call);

        e.events().publish(
            (symbol_short!("CallRvrt"), lp),
            (call_id, TimeUtils::now(&e)),
        );
        Ok(())
    }

    /// True iff the call is not executed and its deadline has been reached.
    pub fn is_call_due(e: Env, lp: Address, call_id: u32) -> Result<bool, Error> {
        let call = read_live_call(&e, &lp, call_id)?;
        Ok(!call.executed && TimeUtils::now(&e) >= call.deadline)
    }

    pub fn get_call(e: Env, lp: Address, call_id: u32) -> Result<CashCall, Error> {
        read_live_call(&e, &lp, call_id)
    }

    pub fn get_call_count(e: Env, lp: Address) -> u32 {
        read_call_count(&e, &lp)
    }

    // ========================================================================
    // Payment ledger
    // ========================================================================

    /// Apply a payment from `payer` against one of `lp`'s obligations.
    ///
    /// The only operation that moves value into the fund. All checks run
    /// before the first write; the token transfer happens last, under the
    /// reentrancy guard.
    pub fn apply_payment(
        e: Env,
        payer: Address,
        lp: Address,
        target: PaymentTarget,
        amount: i128,
    ) -> Result<(), Error> {
        payer.require_auth();
        require_not_paused(&e)?;

        if !Validation::is_positive(amount) {
            return Err(Error::InvalidAmount);
        }
        let asset = read_asset(&e)?;
        let mut commitment = read_active_commitment(&e, &lp)?;
        let now = TimeUtils::now(&e);

        let mut paid_call: Option<(u32, CashCall)> = None;
        match &target {
            PaymentTarget::Tranche(index) => {
                let mut tranche = commitment.tranches.get(*index).ok_or(Error::UnknownCall)?;
                if now > tranche.deadline {
                    return Err(Error::Expired);
                }
                let due = tranche_due(&commitment, &tranche)?;
                let new_paid = SafeMath::checked_add(tranche.paid_amount, amount)
                    .ok_or(Error::MathOverflow)?;
                if new_paid > due {
                    return Err(Error::Overpayment);
                }
                tranche.paid_amount = new_paid;
                commitment.tranches.set(*index, tranche);
            }
            PaymentTarget::Call(index) => {
                let mut call = read_live_call(&e, &lp, *index)?;
                if call.executed {
                    return Err(Error::AlreadyExecuted);
                }
                let new_paid =
                    SafeMath::checked_add(call.paid_amount, amount).ok_or(Error::MathOverflow)?;
                if new_paid > call.amount {
                    return Err(Error::Overpayment);
                }
                call.paid_amount = new_paid;
                paid_call = Some((*index, call));
            }
        }
        let new_total_paid =
            SafeMath::checked_add(commitment.total_paid, amount).ok_or(Error::MathOverflow)?;
        // total payments never pass the commitment plus assessed penalties,
        // even when cash calls over-ask
        let owed = SafeMath::checked_add(commitment.commitment_amount, commitment.penalty_assessed)
            .ok_or(Error::MathOverflow)?;
        if new_total_paid > owed {
            return Err(Error::Overpayment);
        }
        let new_balance =
            SafeMath::checked_add(read_custodied(&e), amount).ok_or(Error::MathOverflow)?;

        lock_reentrancy(&e)?;

        commitment.total_paid = new_total_paid;
        write_commitment(&e, &commitment);
        if let Some((index, call)) = paid_call {
            write_call(&e, &lp, index, &call);
        }
        write_custodied(&e, new_balance);

        token::Client::new(&e, &asset).transfer(&payer, &e.current_contract_address(), &amount);

        release_reentrancy(&e);

        e.events()
            .publish((symbol_short!("Paid"), lp, payer), (target, amount, now));
        Ok(())
    }

    // ========================================================================
    // Penalty engine
    // ========================================================================

    /// Penalize an LP for non-compliance.
    ///
    /// `before_tranche = Some(i)` forfeits the payment credit of every
    /// tranche strictly before `i` (with `total_paid` reduced to match).
    /// A positive `penalty_amount` is added obligation, raising the LP's
    /// outstanding balance. `revoke_access` zeroes the amount fields,
    /// demoting the identity to a re-registrable tombstone.
    pub fn apply_penalty(
        e: Env,
        caller: Address,
        lp: Address,
        before_tranche: Option<u32>,
        penalty_amount: i128,
        revoke_access: bool,
    ) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        let mut commitment = read_active_commitment(&e, &lp)?;
        if penalty_amount < 0 {
            return Err(Error::InvalidAmount);
        }
        let now = TimeUtils::now(&e);

        if let Some(cutoff) = before_tranche {
            if cutoff > commitment.tranches.len() {
                return Err(Error::UnknownCall);
            }
            let mut forfeited: i128 = 0;
            for index in 0..cutoff {
                let mut tranche = commitment.tranches.get(index).ok_or(Error::UnknownCall)?;
                forfeited = SafeMath::checked_add(forfeited, tranche.paid_amount)
                    .ok_or(Error::MathOverflow)?;
                tranche.paid_amount = 0;
                commitment.tranches.set(index, tranche);
            }
            commitment.total_paid = SafeMath::checked_sub(commitment.total_paid, forfeited)
                .ok_or(Error::MathOverflow)?;
            e.events().publish(
                (symbol_short!("Forfeit"), lp.clone()),
                (cutoff, forfeited, now),
            );
        }

        if penalty_amount > 0 {
            commitment.penalty_assessed =
                SafeMath::checked_add(commitment.penalty_assessed, penalty_amount)
                    .ok_or(Error::MathOverflow)?;
            e.events()
                .publish((symbol_short!("Penalty"), lp.clone()), (penalty_amount, now));
        }

        if revoke_access {
            commitment.commitment_amount = 0;
            commitment.total_paid = 0;
            commitment.penalty_assessed = 0;
            let mut cleared = Vec::new(&e);
            for tranche in commitment.tranches.iter() {
                cleared.push_back(Tranche {
                    paid_amount: 0,
                    ..tranche
                });
            }
            commitment.tranches = cleared;
            e.events()
                .publish((symbol_short!("Revoked"), lp.clone()), now);
        }

        write_commitment(&e, &commitment);
        Ok(())
    }

    // ========================================================================
    // Custody
    // ========================================================================

    /// Accept an unattributed deposit into custody. Value lands in the fund
    /// without being credited to any LP until `apply_payment` is called.
    pub fn deposit(e: Env, from: Address, amount: i128) -> Result<(), Error> {
        from.require_auth();
        require_not_paused(&e)?;

        if !Validation::is_positive(amount) {
            return Err(Error::InvalidAmount);
        }
        let asset = read_asset(&e)?;
        let new_balance =
            SafeMath::checked_add(read_custodied(&e), amount).ok_or(Error::MathOverflow)?;

        write_custodied(&e, new_balance);
        token::Client::new(&e, &asset).transfer(&from, &e.current_contract_address(), &amount);
        Ok(())
    }

    /// Disburse custodied value. Admin-only and reentrancy-guarded.
    pub fn withdraw(e: Env, caller: Address, recipient: Address, amount: i128) -> Result<(), Error> {
        require_admin(&e, &caller)?;
        require_not_paused(&e)?;

        if Validation::is_zero_address(&e, &recipient) {
            return Err(Error::InvalidRecipient);
        }
        if !Validation::is_positive(amount) {
            return Err(Error::InvalidAmount);
        }
        let asset = read_asset(&e)?;
        let balance = read_custodied(&e);
        if balance < amount {
            return Err(Error::InsufficientFunds);
        }

        lock_reentrancy(&e)?;

        write_custodied(&e, balance - amount);
        token::Client::new(&e, &asset).transfer(&e.current_contract_address(), &recipient, &amount);

        release_reentrancy(&e);

        e.events().publish(
            (symbol_short!("Withdraw"), recipient),
            (amount, TimeUtils::now(&e)),
        );
        Ok(())
    }

    pub fn custodied_balance(e: Env) -> i128 {
        read_custodied(&e)
    }
}
