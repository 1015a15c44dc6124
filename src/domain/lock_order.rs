//! Canonical lock acquisition order for units of work that hold two account locks.
//!
//! Every transfer touching `{a, b}` locks the smaller id first, whatever its
//! direction, so two opposite transfers can never each hold one lock while
//! waiting on the other.

use super::account::AccountId;

/// A pair of account ids in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOrder {
    pub first: AccountId,
    pub second: AccountId,
    /// `true` when `first` is the second argument given to [`lock_order`].
    pub swapped: bool,
}

/// Orders two account ids numerically, smaller first.
pub fn lock_order(a: AccountId, b: AccountId) -> LockOrder {
    if a <= b {
        LockOrder {
            first: a,
            second: b,
            swapped: false,
        }
    } else {
        LockOrder {
            first: b,
            second: a,
            swapped: true,
        }
    }
}

impl LockOrder {
    /// Puts a pair of values given in argument order into lock order.
    pub fn arrange<T>(&self, a: T, b: T) -> (T, T) {
        if self.swapped { (b, a) } else { (a, b) }
    }

    /// Puts a pair of values produced in lock order back into argument order.
    pub fn restore<T>(&self, first: T, second: T) -> (T, T) {
        if self.swapped {
            (second, first)
        } else {
            (first, second)
        }
    }
}
