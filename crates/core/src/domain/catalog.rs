use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    Rod,
    Reel,
    Line,
    Lure,
    Accessory,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rod => "ROD",
            Self::Reel => "REEL",
            Self::Line => "LINE",
            Self::Lure => "LURE",
            Self::Accessory => "ACCESSORY",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one catalog entry as the console holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub category: ProductCategory,
    pub price: f64,
    pub cost: f64,
    pub stock: u32,
    pub min_stock_level: u32,
    pub sales_last_month: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Product {
    /// Units missing to reach the minimum stock level; negative when above it.
    pub fn stock_shortfall(&self) -> i64 {
        i64::from(self.min_stock_level) - i64::from(self.stock)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price at the time of sale.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub date: DateTime<Utc>,
    pub total: f64,
    pub items: Vec<SaleLineItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
}
