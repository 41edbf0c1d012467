//! Transaction lifecycle state machine
//!
//! Validates and applies status transitions. The only allowed edges are
//! PENDING -> COMPLETED, PENDING -> FAILED, and PENDING -> CANCELLED; every
//! edge originating from a terminal state fails with `InvalidTransition` and
//! performs no mutation. Each applied transition is appended to the
//! transaction's history with the acting party and timestamp.

use crate::types::{LedgerError, StatusChange, Transaction, TransactionStatus};
use chrono::Utc;

/// Whether the edge `from -> to` is permitted
pub fn can_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
    from == TransactionStatus::Pending && to.is_terminal()
}

/// Apply a status transition in place
///
/// On success the transition is appended to the audit history, `updated_at`
/// is bumped, and `settled_at`/`cancelled_at` are stamped for the matching
/// terminal states. On failure the transaction is untouched.
pub fn apply_transition(
    tx: &mut Transaction,
    to: TransactionStatus,
    actor: &str,
) -> Result<(), LedgerError> {
    let from = tx.status;
    if !can_transition(from, to) {
        return Err(LedgerError::invalid_transition(tx.id, from, to));
    }

    let now = Utc::now();
    tx.history.push(StatusChange {
        from,
        to,
        actor: actor.to_string(),
        at: now,
    });
    tx.status = to;
    tx.updated_at = now;
    match to {
        TransactionStatus::Completed => tx.settled_at = Some(now),
        TransactionStatus::Cancelled => tx.cancelled_at = Some(now),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CreateTransaction, TransactionMetadata, TransactionType,
    };
    use rstest::rstest;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn pending_bonus() -> Transaction {
        Transaction::new(
            CreateTransaction {
                user_id: Uuid::new_v4(),
                tx_type: TransactionType::Bonus,
                amount: Decimal::new(1000, 2),
                payment_method: None,
                external_reference: None,
                metadata: TransactionMetadata::Bonus {
                    campaign: "welcome".to_string(),
                },
            },
            0,
        )
    }

    #[rstest]
    #[case::to_completed(TransactionStatus::Completed)]
    #[case::to_failed(TransactionStatus::Failed)]
    #[case::to_cancelled(TransactionStatus::Cancelled)]
    fn test_pending_can_reach_every_terminal_state(#[case] to: TransactionStatus) {
        assert!(can_transition(TransactionStatus::Pending, to));
    }

    #[rstest]
    #[case::from_completed(TransactionStatus::Completed)]
    #[case::from_failed(TransactionStatus::Failed)]
    #[case::from_cancelled(TransactionStatus::Cancelled)]
    fn test_terminal_states_permit_no_edges(#[case] from: TransactionStatus) {
        assert!(!can_transition(from, TransactionStatus::Completed));
        assert!(!can_transition(from, TransactionStatus::Failed));
        assert!(!can_transition(from, TransactionStatus::Cancelled));
        assert!(!can_transition(from, TransactionStatus::Pending));
    }

    #[test]
    fn test_pending_to_pending_is_not_an_edge() {
        assert!(!can_transition(
            TransactionStatus::Pending,
            TransactionStatus::Pending
        ));
    }

    #[test]
    fn test_apply_transition_records_history() {
        let mut tx = pending_bonus();

        apply_transition(&mut tx, TransactionStatus::Completed, "system").unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.settled_at.is_some());
        assert_eq!(tx.history.len(), 1);
        assert_eq!(tx.history[0].from, TransactionStatus::Pending);
        assert_eq!(tx.history[0].to, TransactionStatus::Completed);
        assert_eq!(tx.history[0].actor, "system");
    }

    #[test]
    fn test_apply_transition_stamps_cancelled_at() {
        let mut tx = pending_bonus();

        apply_transition(&mut tx, TransactionStatus::Cancelled, "admin:ops").unwrap();

        assert_eq!(tx.status, TransactionStatus::Cancelled);
        assert!(tx.cancelled_at.is_some());
        assert!(tx.settled_at.is_none());
    }

    #[test]
    fn test_terminal_transaction_is_immutable() {
        let mut tx = pending_bonus();
        apply_transition(&mut tx, TransactionStatus::Failed, "provider").unwrap();

        let before = tx.clone();
        let result = apply_transition(&mut tx, TransactionStatus::Completed, "provider");

        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransition {
                from: TransactionStatus::Failed,
                to: TransactionStatus::Completed,
                ..
            })
        ));
        // No mutation on a rejected edge
        assert_eq!(tx, before);
    }
}
