//! Checked arithmetic helpers.
//!
//! Every balance mutation in the workspace goes through these; a `None`
//! return surfaces as a discrete overflow error in the calling contract
//! rather than a wrap or a panic.

pub struct SafeMath;

impl SafeMath {
    pub fn checked_add(a: i128, b: i128) -> Option<i128> {
        a.checked_add(b)
    }

    pub fn checked_sub(a: i128, b: i128) -> Option<i128> {
        a.checked_sub(b)
    }

    /// `a * b / denom` with overflow-checked multiplication.
    pub fn mul_div(a: i128, b: i128, denom: i128) -> Option<i128> {
        if denom == 0 {
            return None;
        }
        a.checked_mul(b)?.checked_div(denom)
    }

    /// Whole-percent share of an amount.
    pub fn percent_of(amount: i128, percent: u32) -> Option<i128> {
        Self::mul_div(amount, percent as i128, 100)
    }
}
