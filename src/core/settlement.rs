//! Settlement engine
//!
//! The only component permitted to mutate a user's balance, and the only
//! path out of PENDING for any transaction that can carry a balance effect.
//! A settlement applies a transaction's signed delta and its status
//! transition as one atomic unit scoped to the owning user: both happen
//! while that user's wallet lock is held, so no observer can ever see a
//! state where status and balance effect disagree. Cancellations and
//! failures take the same lock, which is what keeps them from interleaving
//! with an in-flight delta application on the same user.
//!
//! # Idempotency
//!
//! The settlement marker (see [`SettlementRecord`]) is the authoritative
//! guard, not the transaction status: a bet stake may be applied while the
//! bet is still PENDING (`reserve`), and a repeated `settle` for an applied
//! transaction is a no-op returning the already-applied result. The marker
//! is checked and written only under the wallet lock.
//!
//! # Contention
//!
//! Wallet locks are acquired with `try_lock` and a bounded retry loop with
//! backoff. Operations on the same user never interleave their
//! read-validate-write sequences; operations on different users proceed
//! fully in parallel. The lock is never held across an await point, so
//! every future in this module is `Send` and may hop runtime threads.

use crate::config::LedgerConfig;
use crate::core::ledger_store::{LedgerStore, SettlementRecord};
use crate::core::state_machine;
use crate::types::{
    CreateTransaction, LedgerError, Transaction, TransactionId, TransactionMetadata,
    TransactionStatus, TransactionType, UserId, Wallet,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Applies balance deltas exactly once per transaction
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    store: Arc<LedgerStore>,
    config: LedgerConfig,
}

impl SettlementEngine {
    pub fn new(store: Arc<LedgerStore>, config: LedgerConfig) -> Self {
        SettlementEngine { store, config }
    }

    /// Settle a transaction: apply its delta and drive PENDING -> COMPLETED
    ///
    /// Idempotent: a transaction whose delta was already applied (settled, or
    /// a bet stake reserved earlier) is not applied again — a reserved bet is
    /// completed without touching the balance, and an already-completed
    /// transaction is returned as-is.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the transaction does not exist
    /// - `InvalidTransition` if it is terminal without an applied delta
    /// - `InsufficientFunds` if a debit exceeds the balance; the transaction
    ///   is transitioned to FAILED and the balance is untouched
    /// - `ContentionRetryExhausted` if the wallet lock stayed contended
    pub async fn settle(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
        if tx.status.is_terminal() {
            // Both the marker and a terminal status are immutable once set,
            // so a replay of a finished settlement needs no lock.
            if self.store.settlement(id).is_some() {
                debug!(id = %id, status = %tx.status, "repeated settle is a no-op");
                return Ok(tx);
            }
            return Err(LedgerError::invalid_transition(
                id,
                tx.status,
                TransactionStatus::Completed,
            ));
        }

        self.apply(tx, true, actor).await
    }

    /// Reserve a bet stake: apply the debit while the bet stays PENDING
    ///
    /// Used by the wagering flow to take the stake at placement time, before
    /// the game resolves. A later `settle` of the same bet finds the marker
    /// and only completes the status; a `cancel` compensates the stake with
    /// a refund credit. Idempotent on repeat.
    pub async fn reserve(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
        if tx.tx_type != TransactionType::Bet {
            return Err(LedgerError::validation(format!(
                "only bet stakes can be reserved, got {}",
                tx.tx_type
            )));
        }
        if tx.status.is_terminal() {
            return Err(LedgerError::invalid_transition(
                id,
                tx.status,
                TransactionStatus::Completed,
            ));
        }

        self.apply(tx, false, actor).await
    }

    /// Cancel a pending transaction
    ///
    /// Runs under the owning user's wallet lock. A cancelled bet whose stake
    /// was already reserved is made whole in the same atomic unit: the
    /// compensating bonus credit is created, applied, and completed before
    /// the lock is released.
    pub async fn cancel(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        self.terminate(id, TransactionStatus::Cancelled, actor).await
    }

    /// Fail a pending transaction
    ///
    /// Same locking discipline as `cancel`, including stake compensation for
    /// a reserved bet: a FAILED transaction never keeps an applied delta.
    pub async fn fail(
        &self,
        id: TransactionId,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        self.terminate(id, TransactionStatus::Failed, actor).await
    }

    /// Acquire the wallet lock with bounded retries, then commit
    async fn apply(
        &self,
        tx: Transaction,
        complete: bool,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        let delta = tx.signed_delta();
        let handle = self.store.wallet_handle(tx.user_id);
        let mut wallet = self.acquire(&handle, tx.user_id).await?;
        self.commit(&mut wallet, &tx, delta, complete, actor)
    }

    /// Drive a pending transaction into a no-delta terminal state
    async fn terminate(
        &self,
        id: TransactionId,
        to: TransactionStatus,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
        let handle = self.store.wallet_handle(tx.user_id);
        let mut wallet = self.acquire(&handle, tx.user_id).await?;

        self.store.ensure_open()?;
        let current = self
            .store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;

        // Pre-flight the compensation arithmetic before the first write
        let compensate =
            current.tx_type == TransactionType::Bet && self.store.settlement(id).is_some();
        let compensated_balance = if compensate {
            wallet
                .balance
                .checked_add(current.amount)
                .ok_or_else(|| LedgerError::store("balance arithmetic overflow"))?
        } else {
            wallet.balance
        };

        let updated = self
            .store
            .update_transaction(id, |t| state_machine::apply_transition(t, to, actor))?;

        if compensate {
            self.refund_stake(&mut wallet, &current, compensated_balance)?;
        }
        Ok(updated)
    }

    /// Credit back a reserved stake, as a settled bonus transaction
    ///
    /// Caller holds the wallet lock and has pre-validated the arithmetic.
    fn refund_stake(
        &self,
        wallet: &mut Wallet,
        bet: &Transaction,
        new_balance: Decimal,
    ) -> Result<(), LedgerError> {
        let mut refund = Transaction::new(
            CreateTransaction {
                user_id: bet.user_id,
                tx_type: TransactionType::Bonus,
                amount: bet.amount,
                payment_method: None,
                external_reference: None,
                metadata: TransactionMetadata::Refund { refunds: bet.id },
            },
            self.store.next_seq(),
        );
        state_machine::apply_transition(&mut refund, TransactionStatus::Completed, "system")?;
        let refund_id = refund.id;
        self.store.insert_unique(refund)?;

        wallet.balance = new_balance;
        wallet.version += 1;
        self.store.record_settlement(SettlementRecord {
            transaction_id: refund_id,
            user_id: bet.user_id,
            delta: bet.amount,
            balance_after: new_balance,
            applied_at: Utc::now(),
        });
        info!(
            id = %bet.id,
            refund = %refund_id,
            amount = %bet.amount,
            "reserved stake refunded"
        );
        Ok(())
    }

    /// Acquire a wallet lock with bounded retries and backoff
    ///
    /// The `try_lock` result is dropped before each sleep; no lock or guard
    /// ever lives across the await.
    async fn acquire<'a>(
        &self,
        wallet: &'a Mutex<Wallet>,
        user: UserId,
    ) -> Result<MutexGuard<'a, Wallet>, LedgerError> {
        let mut attempts: u32 = 0;
        loop {
            match wallet.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(LedgerError::store("wallet lock poisoned"));
                }
                Err(TryLockError::WouldBlock) => {}
            }
            attempts += 1;
            if attempts >= self.config.settle_max_attempts {
                warn!(user = %user, attempts, "wallet lock contention exhausted");
                return Err(LedgerError::contention(user, attempts));
            }
            tokio::time::sleep(Duration::from_millis(self.config.settle_retry_backoff_ms))
                .await;
        }
    }

    /// The atomic unit: validate, apply delta, record marker, transition
    ///
    /// Runs entirely under the wallet lock; commits in full or not at all
    /// (the FAILED transition on insufficient funds touches no balance).
    fn commit(
        &self,
        wallet: &mut Wallet,
        tx: &Transaction,
        delta: Decimal,
        complete: bool,
        actor: &str,
    ) -> Result<Transaction, LedgerError> {
        self.store.ensure_open()?;

        let current = self
            .store
            .transaction(tx.id)
            .ok_or_else(|| LedgerError::not_found(tx.id.to_string()))?;

        // A concurrent duplicate may have applied the delta first
        if self.store.settlement(tx.id).is_some() {
            if complete && current.status == TransactionStatus::Pending {
                // Reserved bet: complete the status, the stake already left
                return self.store.update_transaction(tx.id, |t| {
                    state_machine::apply_transition(t, TransactionStatus::Completed, actor)
                });
            }
            debug!(id = %tx.id, status = %current.status, "delta already applied");
            return Ok(current);
        }

        // A cancel or admin override may have landed before the lock
        if current.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_transition(
                tx.id,
                current.status,
                TransactionStatus::Completed,
            ));
        }

        if delta < Decimal::ZERO && wallet.balance < delta.abs() {
            let balance = wallet.balance;
            self.store.update_transaction(tx.id, |t| {
                state_machine::apply_transition(t, TransactionStatus::Failed, actor)
            })?;
            warn!(
                user = %tx.user_id,
                id = %tx.id,
                %balance,
                requested = %tx.amount,
                "debit exceeds balance, transaction failed"
            );
            return Err(LedgerError::insufficient_funds(
                tx.user_id,
                balance,
                tx.amount,
            ));
        }

        let new_balance = wallet
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::store("balance arithmetic overflow"))?;
        wallet.balance = new_balance;
        wallet.version += 1;
        self.store.record_settlement(SettlementRecord {
            transaction_id: tx.id,
            user_id: tx.user_id,
            delta,
            balance_after: new_balance,
            applied_at: Utc::now(),
        });

        let updated = if complete {
            self.store.update_transaction(tx.id, |t| {
                state_machine::apply_transition(t, TransactionStatus::Completed, actor)
            })?
        } else {
            self.store.update_transaction(tx.id, |t| {
                t.updated_at = Utc::now();
                Ok(())
            })?
        };

        info!(
            user = %tx.user_id,
            id = %tx.id,
            %delta,
            balance = %new_balance,
            reserved = !complete,
            "settlement applied"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repository::TransactionRepository;
    use crate::types::PaymentMethod;
    use uuid::Uuid;

    fn fixture() -> (Arc<LedgerStore>, TransactionRepository, SettlementEngine) {
        let store = Arc::new(LedgerStore::open());
        let repository = TransactionRepository::new(store.clone());
        let settlement = SettlementEngine::new(store.clone(), LedgerConfig::default());
        (store, repository, settlement)
    }

    fn deposit(repo: &TransactionRepository, user: UserId, amount: i64) -> Transaction {
        repo.create(CreateTransaction {
            user_id: user,
            tx_type: TransactionType::Deposit,
            amount: Decimal::new(amount, 2),
            payment_method: Some(PaymentMethod::Pix),
            external_reference: None,
            metadata: TransactionMetadata::PixDeposit {
                payer_document: None,
            },
        })
        .unwrap()
    }

    fn withdrawal(repo: &TransactionRepository, user: UserId, amount: i64) -> Transaction {
        repo.create(CreateTransaction {
            user_id: user,
            tx_type: TransactionType::Withdrawal,
            amount: Decimal::new(amount, 2),
            payment_method: Some(PaymentMethod::BankTransfer),
            external_reference: None,
            metadata: TransactionMetadata::BankTransferWithdrawal {
                account_number: "0001-12345".to_string(),
            },
        })
        .unwrap()
    }

    fn bet(repo: &TransactionRepository, user: UserId, amount: i64) -> Transaction {
        repo.create(CreateTransaction {
            user_id: user,
            tx_type: TransactionType::Bet,
            amount: Decimal::new(amount, 2),
            payment_method: None,
            external_reference: None,
            metadata: TransactionMetadata::Bet {
                game_id: "crash-7".to_string(),
                bet_details: None,
            },
        })
        .unwrap()
    }

    fn refund_of(store: &LedgerStore, bet_id: TransactionId) -> Option<Transaction> {
        store
            .all_transactions()
            .into_iter()
            .find(|tx| tx.metadata == TransactionMetadata::Refund { refunds: bet_id })
    }

    #[tokio::test]
    async fn test_settle_deposit_credits_balance() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        let settled = engine.settle(tx.id, "system").await.unwrap();

        assert_eq!(settled.status, TransactionStatus::Completed);
        assert!(settled.settled_at.is_some());
        assert_eq!(store.balance(user).unwrap(), Decimal::new(10000, 2));
    }

    #[tokio::test]
    async fn test_repeated_settle_applies_once() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        engine.settle(tx.id, "system").await.unwrap();
        let replay = engine.settle(tx.id, "system").await.unwrap();

        assert_eq!(replay.status, TransactionStatus::Completed);
        assert_eq!(store.balance(user).unwrap(), Decimal::new(10000, 2));
        // Exactly one transition recorded
        assert_eq!(replay.history.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_settlement_futures_run_on_spawned_tasks() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        let worker = engine.clone();
        tokio::spawn(async move { worker.settle(tx.id, "system").await })
            .await
            .unwrap()
            .unwrap();

        let stake = bet(&repo, user, 2000);
        let worker = engine.clone();
        tokio::spawn(async move { worker.reserve(stake.id, "system").await })
            .await
            .unwrap()
            .unwrap();

        let worker = engine.clone();
        tokio::spawn(async move { worker.cancel(stake.id, "system").await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.balance(user).unwrap(), Decimal::new(10000, 2));
    }

    #[tokio::test]
    async fn test_withdrawal_beyond_balance_fails_and_leaves_balance() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let funding = deposit(&repo, user, 3000);
        engine.settle(funding.id, "system").await.unwrap();

        let tx = withdrawal(&repo, user, 5000);
        let result = engine.settle(tx.id, "system").await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(
            store.transaction(tx.id).unwrap().status,
            TransactionStatus::Failed
        );
        assert_eq!(store.balance(user).unwrap(), Decimal::new(3000, 2));
        // No marker: the delta was never applied
        assert!(store.settlement(tx.id).is_none());
    }

    #[tokio::test]
    async fn test_withdrawal_within_balance_debits() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();

        let tx = withdrawal(&repo, user, 4000);
        engine.settle(tx.id, "system").await.unwrap();

        assert_eq!(store.balance(user).unwrap(), Decimal::new(6000, 2));
    }

    #[tokio::test]
    async fn test_settle_terminal_transaction_is_invalid() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);
        engine.cancel(tx.id, "system").await.unwrap();

        let result = engine.settle(tx.id, "system").await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(store.balance(user).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_settle_unknown_transaction_is_not_found() {
        let (_, _, engine) = fixture();
        let result = engine.settle(Uuid::new_v4(), "system").await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reserve_debits_but_keeps_bet_pending() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();

        let stake = bet(&repo, user, 2000);
        let reserved = engine.reserve(stake.id, user.to_string().as_str()).await.unwrap();

        assert_eq!(reserved.status, TransactionStatus::Pending);
        assert_eq!(store.balance(user).unwrap(), Decimal::new(8000, 2));
        assert!(store.settlement(stake.id).is_some());
    }

    #[tokio::test]
    async fn test_settle_after_reserve_completes_without_second_debit() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();

        let stake = bet(&repo, user, 2000);
        engine.reserve(stake.id, "system").await.unwrap();
        let settled = engine.settle(stake.id, "system").await.unwrap();

        assert_eq!(settled.status, TransactionStatus::Completed);
        assert_eq!(store.balance(user).unwrap(), Decimal::new(8000, 2));
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();

        let stake = bet(&repo, user, 2000);
        engine.reserve(stake.id, "system").await.unwrap();
        engine.reserve(stake.id, "system").await.unwrap();

        assert_eq!(store.balance(user).unwrap(), Decimal::new(8000, 2));
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_bets() {
        let (_, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        let result = engine.reserve(tx.id, "system").await;
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_reserve_beyond_balance_fails_bet() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();

        let stake = bet(&repo, user, 2000);
        let result = engine.reserve(stake.id, "system").await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(
            store.transaction(stake.id).unwrap().status,
            TransactionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_cancel_reserved_bet_compensates_in_one_unit() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();
        let stake = bet(&repo, user, 2000);
        engine.reserve(stake.id, "system").await.unwrap();

        let cancelled = engine.cancel(stake.id, "system").await.unwrap();

        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(store.balance(user).unwrap(), Decimal::new(10000, 2));

        // The refund is already settled when cancel returns: completed
        // status, marker recorded, nothing left pending
        let refund = refund_of(&store, stake.id).unwrap();
        assert_eq!(refund.status, TransactionStatus::Completed);
        assert!(store.settlement(refund.id).is_some());
    }

    #[tokio::test]
    async fn test_fail_reserved_bet_compensates_too() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        engine.settle(deposit(&repo, user, 10000).id, "system").await.unwrap();
        let stake = bet(&repo, user, 2000);
        engine.reserve(stake.id, "system").await.unwrap();

        let failed = engine.fail(stake.id, "provider").await.unwrap();

        assert_eq!(failed.status, TransactionStatus::Failed);
        // No terminal state keeps an applied delta
        assert_eq!(store.balance(user).unwrap(), Decimal::new(10000, 2));
        assert!(refund_of(&store, stake.id).is_some());
    }

    #[tokio::test]
    async fn test_cancel_unreserved_transaction_moves_no_money() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        let cancelled = engine.cancel(tx.id, &user.to_string()).await.unwrap();

        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(store.balance(user).unwrap(), Decimal::ZERO);
        assert!(refund_of(&store, tx.id).is_none());
    }

    #[tokio::test]
    async fn test_cancel_terminal_transaction_is_invalid() {
        let (_, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);
        engine.settle(tx.id, "system").await.unwrap();

        let result = engine.cancel(tx.id, "system").await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_contention_exhaustion_surfaces_retryable_error() {
        let (store, repo, _) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        let engine = SettlementEngine::new(
            store.clone(),
            LedgerConfig {
                settle_max_attempts: 2,
                settle_retry_backoff_ms: 1,
                ..LedgerConfig::default()
            },
        );

        // Hold the wallet lock for the duration of the settle attempt
        let handle = store.wallet_handle(user);
        let guard = handle.lock().unwrap();
        let result = engine.settle(tx.id, "system").await;
        drop(guard);

        assert!(matches!(
            result,
            Err(LedgerError::ContentionRetryExhausted { attempts: 2, .. })
        ));
        // Nothing half-settled: still pending, no marker, no balance change
        assert_eq!(
            store.transaction(tx.id).unwrap().status,
            TransactionStatus::Pending
        );
        assert!(store.settlement(tx.id).is_none());
        assert_eq!(store.balance(user).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_settle_on_closed_store_mutates_nothing() {
        let (store, repo, engine) = fixture();
        let user = Uuid::new_v4();
        let tx = deposit(&repo, user, 10000);

        store.close();
        let result = engine.settle(tx.id, "system").await;

        assert!(matches!(result, Err(LedgerError::Store { .. })));
        assert!(store.settlement(tx.id).is_none());
    }
}
