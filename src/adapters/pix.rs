//! PIX webhook adapter
//!
//! The PIX gateway posts payment notifications with the event nested under a
//! `requestBody` key:
//!
//! ```json
//! {
//!   "requestBody": {
//!     "status": "PAID",
//!     "external_id": "PIX_1700000000000",
//!     "transactionId": "abc-123",
//!     "dateApproval": "2024-11-14T10:00:00Z",
//!     "creditParty": { "name": "..." }
//!   }
//! }
//! ```
//!
//! `external_id` is mandatory: a notification is only ever applied to the
//! transaction carrying that exact reference, never to "whichever payment
//! happens to be pending".

use super::{ConfirmationAdapter, ConfirmationEvent, ConfirmationOutcome};
use crate::types::LedgerError;
use serde_json::Value;

const PROVIDER: &str = "pix";

#[derive(Debug, Clone, Copy, Default)]
pub struct PixWebhookAdapter;

impl PixWebhookAdapter {
    pub fn new() -> Self {
        PixWebhookAdapter
    }
}

impl ConfirmationAdapter for PixWebhookAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn normalize(&self, payload: &Value) -> Result<ConfirmationEvent, LedgerError> {
        let body = payload
            .get("requestBody")
            .ok_or_else(|| LedgerError::gateway(PROVIDER, "missing requestBody"))?;

        let external_reference = body
            .get("external_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| LedgerError::gateway(PROVIDER, "missing external_id"))?
            .to_string();

        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::gateway(PROVIDER, "missing status"))?;

        let outcome = match status {
            "PAID" => ConfirmationOutcome::Paid,
            "FAILED" | "CANCELLED" | "EXPIRED" => ConfirmationOutcome::Failed,
            other => {
                return Err(LedgerError::gateway(
                    PROVIDER,
                    format!("unrecognized status {other:?}"),
                ));
            }
        };

        Ok(ConfirmationEvent {
            external_reference,
            outcome,
            provider_metadata: body.clone(),
        })
    }
}
