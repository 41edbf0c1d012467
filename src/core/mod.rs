//! Core ledger logic
//!
//! This module contains the ledger's processing components:
//! - `ledger_store` - In-memory store for transactions, wallets, and settlement markers
//! - `state_machine` - Transaction lifecycle transition rules
//! - `repository` - Validated, idempotent transaction creation and querying
//! - `settlement` - Exactly-once balance delta application
//! - `engine` - Public facade wiring the components together

pub mod engine;
pub mod ledger_store;
pub mod repository;
pub mod settlement;
pub mod state_machine;

pub use engine::LedgerEngine;
pub use ledger_store::{InsertOutcome, LedgerStore, SettlementRecord};
pub use repository::TransactionRepository;
pub use settlement::SettlementEngine;
