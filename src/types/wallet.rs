//! Wallet type: the per-user balance state
//!
//! The balance is a single non-negative scalar owned exclusively by the
//! settlement engine. No other component writes it.

use super::transaction::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-user balance state
///
/// At every observable instant the balance equals the sum of the signed
/// deltas of all applied settlements for this user, and is never negative.
/// `version` increments on every applied delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Number of settlements applied to this wallet
    pub version: u64,
}

impl Wallet {
    /// Create an empty wallet for a user
    pub fn new(user_id: UserId) -> Self {
        Wallet {
            user_id,
            balance: Decimal::ZERO,
            version: 0,
        }
    }
}
