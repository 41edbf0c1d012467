//! Transaction data model for the wager ledger
//!
//! This module defines the Transaction record — the unit of monetary intent
//! and its resolution — together with its lifecycle status, payment methods,
//! and the typed metadata attached at creation time.
//!
//! Metadata is a tagged union keyed by `(type, payment method)`. Each variant
//! carries the fields that combination requires, and the repository rejects a
//! creation request whose variant does not match its type/method pair. The
//! append-only `history` vector records every status transition for audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User identifier (owning user of a transaction and its wallet)
pub type UserId = Uuid;

/// Transaction identifier, system-generated at creation
pub type TransactionId = Uuid;

/// Transaction types supported by the ledger
///
/// Deposits, wins, and bonuses credit the owning user's balance; withdrawals
/// and bets debit it. The signed delta is applied exactly once, by the
/// settlement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credit funds from an external payment instrument
    Deposit,

    /// Debit funds toward an external destination (PIX key, bank account)
    Withdrawal,

    /// Debit a stake placed on a game
    Bet,

    /// Credit a game payout
    Win,

    /// Credit granted by the platform (campaign bonus, bet refund)
    Bonus,
}

impl TransactionType {
    /// Whether this type credits the user's balance
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::Win | TransactionType::Bonus
        )
    }

    /// Signed balance delta for a transaction of this type
    ///
    /// Deposits, wins, and bonuses are positive; withdrawals and bets are
    /// negative.
    pub fn signed_delta(&self, amount: Decimal) -> Decimal {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Bet => "BET",
            TransactionType::Win => "WIN",
            TransactionType::Bonus => "BONUS",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a transaction
///
/// A transaction is created `Pending` and moves along the state machine's
/// allowed edges to exactly one terminal state. Terminal states are
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Initial state: created, awaiting confirmation or settlement
    Pending,

    /// Terminal: settled, balance delta applied
    Completed,

    /// Terminal: confirmation failed or settlement rejected
    Failed,

    /// Terminal: cancelled before settlement
    Cancelled,
}

impl TransactionStatus {
    /// Whether this status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method of a deposit or withdrawal
///
/// Required for deposits and withdrawals; bets, wins, and bonuses are
/// internal movements and carry no method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Instant provider with asynchronous webhook confirmation
    Pix,

    /// Manual bank transfer
    BankTransfer,

    /// Card charge with synchronous confirmation
    Card,
}

/// Type of a PIX destination key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixKeyType {
    Cpf,
    Email,
    Phone,
    Random,
}

/// Typed, method-specific transaction metadata
///
/// Validated at creation: the variant must match the transaction's
/// `(type, payment method)` pair. Provider confirmation payloads are kept
/// separately in [`Transaction::provider_metadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    /// Card deposit: masked instrument identifier, never the full number
    CardDeposit {
        card_last_four: String,
        card_holder: Option<String>,
    },

    /// PIX deposit awaiting webhook confirmation
    PixDeposit { payer_document: Option<String> },

    /// Bank transfer deposit
    BankTransferDeposit { bank_reference: Option<String> },

    /// PIX withdrawal: destination key is mandatory
    PixWithdrawal {
        pix_key: String,
        pix_key_type: PixKeyType,
    },

    /// Bank transfer withdrawal
    BankTransferWithdrawal { account_number: String },

    /// Stake placed on a game
    Bet {
        game_id: String,
        bet_details: Option<serde_json::Value>,
    },

    /// Game payout
    Win { game_id: String },

    /// Platform-granted credit
    Bonus { campaign: String },

    /// Compensating credit for a cancelled bet whose stake was reserved
    Refund { refunds: TransactionId },
}

impl TransactionMetadata {
    /// Whether this variant is valid for the given type/method combination
    pub fn matches(&self, tx_type: TransactionType, method: Option<PaymentMethod>) -> bool {
        match (tx_type, method, self) {
            (
                TransactionType::Deposit,
                Some(PaymentMethod::Card),
                TransactionMetadata::CardDeposit { .. },
            ) => true,
            (
                TransactionType::Deposit,
                Some(PaymentMethod::Pix),
                TransactionMetadata::PixDeposit { .. },
            ) => true,
            (
                TransactionType::Deposit,
                Some(PaymentMethod::BankTransfer),
                TransactionMetadata::BankTransferDeposit { .. },
            ) => true,
            (
                TransactionType::Withdrawal,
                Some(PaymentMethod::Pix),
                TransactionMetadata::PixWithdrawal { .. },
            ) => true,
            (
                TransactionType::Withdrawal,
                Some(PaymentMethod::BankTransfer),
                TransactionMetadata::BankTransferWithdrawal { .. },
            ) => true,
            (TransactionType::Bet, None, TransactionMetadata::Bet { .. }) => true,
            (TransactionType::Win, None, TransactionMetadata::Win { .. }) => true,
            (TransactionType::Bonus, None, TransactionMetadata::Bonus { .. }) => true,
            (TransactionType::Bonus, None, TransactionMetadata::Refund { .. }) => true,
            _ => false,
        }
    }
}

/// One entry of the append-only status transition history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: TransactionStatus,
    pub to: TransactionStatus,

    /// Who drove the transition: a user id, "provider", "admin:<id>", or
    /// "system"
    pub actor: String,

    pub at: DateTime<Utc>,
}

/// Parameters for creating a transaction
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,

    /// Idempotency key correlating this transaction with an external
    /// confirmation event; globally unique when present
    pub external_reference: Option<String>,

    pub metadata: TransactionMetadata,
}

/// A monetary transaction record
///
/// Created `Pending`, mutated only through state machine transitions,
/// retained indefinitely as the audit trail. `id`, `user_id`, `tx_type`,
/// and `amount` are immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub external_reference: Option<String>,
    pub metadata: TransactionMetadata,

    /// Opaque payload attached by the confirming provider
    pub provider_metadata: Option<serde_json::Value>,

    /// Append-only record of every status transition
    pub history: Vec<StatusChange>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Store-assigned monotonic sequence, the deterministic recency
    /// tiebreaker for listings
    pub seq: u64,
}

impl Transaction {
    /// Build a new `Pending` transaction from validated creation parameters
    pub fn new(request: CreateTransaction, seq: u64) -> Self {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            tx_type: request.tx_type,
            amount: request.amount,
            status: TransactionStatus::Pending,
            payment_method: request.payment_method,
            external_reference: request.external_reference,
            metadata: request.metadata,
            provider_metadata: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            settled_at: None,
            cancelled_at: None,
            seq,
        }
    }

    /// Signed balance delta this transaction applies when settled
    pub fn signed_delta(&self) -> Decimal {
        self.tx_type.signed_delta(self.amount)
    }
}
