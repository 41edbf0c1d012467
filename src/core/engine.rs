//! Ledger engine
//!
//! The public facade over the ledger: it wires the repository and the
//! settlement engine together and exposes the operations a host application
//! calls — creating transactions, settling them, reacting to provider
//! confirmations, cancellations with stake compensation, admin overrides,
//! and read access to transactions and balances.
//!
//! Reads and creation are synchronous; any operation that can touch a
//! balance is async because settlement may back off on wallet contention.

use crate::config::LedgerConfig;
use crate::core::ledger_store::LedgerStore;
use crate::core::repository::TransactionRepository;
use crate::core::settlement::SettlementEngine;
use crate::types::{
    CreateTransaction, LedgerError, Page, PageRequest, Transaction, TransactionFilter,
    TransactionId, TransactionStatus, UserId,
};
use crate::adapters::{ConfirmationEvent, ConfirmationOutcome};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// The wagering ledger: transaction lifecycle plus balance settlement
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    store: Arc<LedgerStore>,
    repository: TransactionRepository,
    settlement: SettlementEngine,
    config: LedgerConfig,
}

impl LedgerEngine {
    pub fn new(config: LedgerConfig) -> Self {
        let store = Arc::new(LedgerStore::open());
        LedgerEngine {
            repository: TransactionRepository::new(store.clone()),
            settlement: SettlementEngine::new(store.clone(), config.clone()),
            store,
            config,
        }
    }

    /// Shut the ledger down; subsequent mutations fail with `Store`
    pub fn close(&self) {
        self.store.close();
    }

    /// Record a new PENDING transaction
    ///
    /// Idempotent on `external_reference`: replaying a creation with the same
    /// reference and matching identity returns the existing transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed requests, `Conflict` when the reference is
    /// already bound to a different transaction.
    pub fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<Transaction, LedgerError> {
        self.repository.create(request)
    }

    /// Settle a pending transaction, applying its balance delta exactly once
    pub async fn settle_now(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        self.settlement.settle(id, actor).await
    }

    /// Place a bet stake: debit the wallet while the bet stays PENDING
    ///
    /// The bet is completed later by `settle_now` (game resolved) or
    /// compensated by `cancel_transaction` (game voided).
    pub async fn reserve_stake(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        self.settlement.reserve(id, actor).await
    }

    /// Apply a provider confirmation to the transaction it references
    ///
    /// Resolves the event's external reference, attaches the provider's raw
    /// payload for audit, then settles (paid) or fails (declined) the
    /// transaction. Confirmations for transactions already in a terminal
    /// state are acknowledged without effect, so provider retries are safe.
    ///
    /// # Errors
    ///
    /// `NotFound` if the reference is not bound to any transaction.
    pub async fn confirm_external_payment(
        &self,
        event: ConfirmationEvent,
    ) -> Result<Transaction, LedgerError> {
        let id = self
            .store
            .resolve_reference(&event.external_reference)
            .ok_or_else(|| LedgerError::not_found(event.external_reference.clone()))?;

        let tx = self
            .store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
        if tx.status.is_terminal() {
            info!(
                id = %id,
                status = %tx.status,
                reference = %event.external_reference,
                "confirmation replay for terminal transaction ignored"
            );
            return Ok(tx);
        }

        self.store.update_transaction(id, |t| {
            t.provider_metadata = Some(event.provider_metadata.clone());
            t.updated_at = Utc::now();
            Ok(())
        })?;

        match event.outcome {
            ConfirmationOutcome::Paid => self.settlement.settle(id, "provider").await,
            ConfirmationOutcome::Failed => {
                match self.settlement.fail(id, "provider").await {
                    Ok(tx) => Ok(tx),
                    // A concurrent settle or cancel won the race; replaying
                    // a decline against a terminal transaction is a no-op
                    Err(LedgerError::InvalidTransition { .. }) => {
                        let current = self
                            .store
                            .transaction(id)
                            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
                        Ok(current)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Cancel a pending transaction
    ///
    /// A cancelled bet whose stake was already reserved is made whole with a
    /// compensating bonus credit, applied in the same atomic unit as the
    /// cancellation.
    pub async fn cancel_transaction(
        &self,
        id: TransactionId,
        requested_by: &str,
    ) -> Result<Transaction, LedgerError> {
        self.settlement.cancel(id, requested_by).await
    }

    /// Force a pending transaction into a terminal state (back-office use)
    ///
    /// Every target routes through the settlement engine: COMPLETED applies
    /// the balance effect, CANCELLED and FAILED compensate a reserved stake.
    /// PENDING is not a target.
    pub async fn admin_set_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        admin: &str,
    ) -> Result<Transaction, LedgerError> {
        let actor = format!("admin:{admin}");
        match status {
            TransactionStatus::Pending => Err(LedgerError::validation(
                "PENDING is not a valid override target",
            )),
            TransactionStatus::Completed => self.settlement.settle(id, &actor).await,
            TransactionStatus::Cancelled => self.settlement.cancel(id, &actor).await,
            TransactionStatus::Failed => self.settlement.fail(id, &actor).await,
        }
    }

    /// Fetch a transaction by id
    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.repository.find_by_id(id)
    }

    /// Fetch a transaction by its external reference
    pub fn get_by_reference(&self, reference: &str) -> Result<Transaction, LedgerError> {
        self.repository.find_by_reference(reference)
    }

    /// Current settled balance for a user (zero for unknown users)
    pub fn balance(&self, user: UserId) -> Result<Decimal, LedgerError> {
        self.store.balance(user)
    }

    /// List transactions, newest first, with filtering and pagination
    ///
    /// `user` of `None` lists across all users (back-office view). A page
    /// request without an explicit size uses the configured default.
    pub fn list_transactions(
        &self,
        user: Option<UserId>,
        filter: &TransactionFilter,
        page: Option<PageRequest>,
    ) -> Result<Page<Transaction>, LedgerError> {
        let page = page.unwrap_or_else(|| PageRequest::new(1, self.config.default_page_size));
        Ok(self.repository.list(user, filter, page))
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        LedgerEngine::new(LedgerConfig::default())
    }
}
