//! Shapes the model is asked to produce.
//!
//! Every field is required: a response missing any of them fails to decode as
//! a whole. Values are not range-checked.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPrediction {
    /// Forward-looking period label, e.g. "February".
    pub month: String,
    pub predicted_revenue: f64,
    /// Expected in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightAction {
    Restock,
    Discount,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryInsight {
    pub product_id: String,
    pub product_name: String,
    pub action: InsightAction,
    pub reason: String,
    pub priority: InsightPriority,
}
