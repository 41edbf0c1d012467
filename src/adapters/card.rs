//! Card charge adapter
//!
//! Card deposits are authorized synchronously: the acquirer's charge
//! response comes back in the same call that created the charge. The
//! response carries an `authorized` flag, the acquirer's `charge_id`, and
//! our `reference` echoed back:
//!
//! ```json
//! {
//!   "authorized": true,
//!   "charge_id": "ch_9f2b1",
//!   "reference": "CARD_1700000000000",
//!   "card_last_four": "4242"
//! }
//! ```

use super::{ConfirmationAdapter, ConfirmationEvent, ConfirmationOutcome};
use crate::types::LedgerError;
use serde_json::Value;

const PROVIDER: &str = "card";

#[derive(Debug, Clone, Copy, Default)]
pub struct CardChargeAdapter;

impl CardChargeAdapter {
    pub fn new() -> Self {
        CardChargeAdapter
    }
}

impl ConfirmationAdapter for CardChargeAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn normalize(&self, payload: &Value) -> Result<ConfirmationEvent, LedgerError> {
        let external_reference = payload
            .get("reference")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| LedgerError::gateway(PROVIDER, "missing reference"))?
            .to_string();

        let authorized = payload
            .get("authorized")
            .and_then(Value::as_bool)
            .ok_or_else(|| LedgerError::gateway(PROVIDER, "missing authorized flag"))?;

        let outcome = if authorized {
            ConfirmationOutcome::Paid
        } else {
            ConfirmationOutcome::Failed
        };

        Ok(ConfirmationEvent {
            external_reference,
            outcome,
            provider_metadata: payload.clone(),
        })
    }
}
