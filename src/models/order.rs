//! Checkout orders mirrored from payment providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Currency, PaymentProvider, Plan};

/// Maps a provider order ID back to the user who started checkout.
///
/// Stored at `orders/{order_id}`. Written once when checkout starts and
/// read during payment verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Provider order ID (also used as document ID)
    pub order_id: String,
    pub uid: String,
    pub plan: Plan,
    pub provider: PaymentProvider,
    /// Charged amount in the currency's minor unit
    pub amount_minor: u64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}
