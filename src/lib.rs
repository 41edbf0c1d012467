//! Wager Ledger Library
//! # Overview
//!
//! This library provides the transaction ledger and settlement engine for a
//! wagering platform: an append-style record of every money movement
//! (deposits, withdrawals, bets, wins, bonuses) with exactly-once settlement
//! of balance effects.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Transaction, Wallet, errors, queries)
//! - [`config`] - Engine tunables
//! - [`core`] - Business logic components:
//!   - [`core::ledger_store`] - Concurrent in-memory store and wallet locks
//!   - [`core::state_machine`] - Transaction lifecycle transitions
//!   - [`core::repository`] - Idempotent transaction creation and listing
//!   - [`core::settlement`] - Atomic, exactly-once balance delta application
//!   - [`core::engine`] - The `LedgerEngine` facade
//! - [`adapters`] - Normalization of payment provider confirmations
//!
//! # Transaction Types
//!
//! The ledger records five transaction types:
//!
//! - **Deposit**: Credit funds into a user's wallet via a payment provider
//! - **Withdrawal**: Debit funds out to a payment destination
//! - **Bet**: Debit a wager stake
//! - **Win**: Credit a game payout
//! - **Bonus**: Credit a promotional or compensating amount
//!
//! # Lifecycle
//!
//! Every transaction is created `PENDING` and ends in exactly one terminal
//! state: `COMPLETED` (delta applied), `FAILED` (rejected, no delta), or
//! `CANCELLED` (withdrawn, reserved stakes compensated). Terminal
//! transactions are immutable.
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//! use wager_ledger::{
//!     CreateTransaction, LedgerEngine, PaymentMethod, TransactionMetadata,
//!     TransactionType,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wager_ledger::LedgerError> {
//! let ledger = LedgerEngine::default();
//! let user = Uuid::new_v4();
//!
//! let deposit = ledger.create_transaction(CreateTransaction {
//!     user_id: user,
//!     tx_type: TransactionType::Deposit,
//!     amount: Decimal::new(10_000, 2),
//!     payment_method: Some(PaymentMethod::Card),
//!     external_reference: None,
//!     metadata: TransactionMetadata::CardDeposit {
//!         card_last_four: "4242".to_string(),
//!         card_holder: None,
//!     },
//! })?;
//!
//! ledger.settle_now(deposit.id, "system").await?;
//! assert_eq!(ledger.balance(user)?, Decimal::new(10_000, 2));
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod adapters;
pub mod config;
pub mod core;
pub mod types;

pub use adapters::{
    CardChargeAdapter, ConfirmationAdapter, ConfirmationEvent, ConfirmationOutcome,
    PixWebhookAdapter,
};
pub use config::LedgerConfig;
pub use core::{LedgerEngine, SettlementEngine, TransactionRepository};
pub use types::{
    CreateTransaction, LedgerError, Page, PageRequest, PaymentMethod, PixKeyType, StatusChange,
    Transaction, TransactionFilter, TransactionId, TransactionMetadata, TransactionStatus,
    TransactionType, UserId, Wallet,
};
