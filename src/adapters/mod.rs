//! Confirmation adapters
//!
//! Payment providers report the outcome of externally processed payments in
//! their own webhook and response shapes. An adapter normalizes one
//! provider's payload into a [`ConfirmationEvent`], the single shape the
//! ledger engine consumes; provider formats never leak past this boundary.
//!
//! Adapters only translate. They hold no state and make no ledger calls;
//! a normalized event is handed to
//! [`LedgerEngine::confirm_external_payment`](crate::core::LedgerEngine::confirm_external_payment).

pub mod card;
pub mod pix;

pub use card::CardChargeAdapter;
pub use pix::PixWebhookAdapter;

use crate::types::LedgerError;
use serde_json::Value;

/// Provider verdict on an external payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Paid,
    Failed,
}

/// A provider notification, normalized
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationEvent {
    /// The provider's identifier for the payment, matched against the
    /// transaction's external reference
    pub external_reference: String,

    pub outcome: ConfirmationOutcome,

    /// The raw provider payload, retained on the transaction for audit
    pub provider_metadata: Value,
}

/// Translates one provider's payloads into confirmation events
pub trait ConfirmationAdapter {
    /// Provider name, used in logs and gateway errors
    fn provider(&self) -> &'static str;

    /// Normalize a raw provider payload
    ///
    /// # Errors
    ///
    /// `ExternalGatewayError` when the payload is missing required fields or
    /// carries a status the adapter does not recognize.
    fn normalize(&self, payload: &Value) -> Result<ConfirmationEvent, LedgerError>;
}
