//! Prompt text, output schemas and request assembly for the three advisory calls.
//!
//! Everything here is pure: the same snapshots always produce the same request.

use crate::advisory::Persona;
use crate::domain::catalog::{Product, Sale};
use crate::domain::chat::ChatMessage;
use crate::llm::{GenerateRequest, Turn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

pub const FORECAST_PERIODS: usize = 3;
pub const CHAT_MAX_OUTPUT_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleSummary {
    pub date: DateTime<Utc>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub stock: u32,
    pub min_stock: u32,
    pub last_month_sales: u32,
}

impl<'a> From<&'a Product> for StockLine<'a> {
    fn from(p: &'a Product) -> Self {
        Self {
            id: &p.id,
            name: &p.name,
            stock: p.stock,
            min_stock: p.min_stock_level,
            last_month_sales: p.sales_last_month,
        }
    }
}

pub fn sale_summaries(sales: &[Sale]) -> Vec<SaleSummary> {
    sales
        .iter()
        .map(|s| SaleSummary {
            date: s.date,
            total: s.total,
        })
        .collect()
}

pub fn forecast_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "month": {"type": "STRING"},
                "predictedRevenue": {"type": "NUMBER"},
                "confidence": {"type": "NUMBER"},
                "reasoning": {"type": "STRING"}
            },
            "required": ["month", "predictedRevenue", "confidence", "reasoning"]
        }
    })
}

pub fn forecast_request(summaries: &[SaleSummary], persona: &Persona) -> GenerateRequest {
    let data = to_json(summaries);
    let prompt = [
        format!(
            "Analyze the following sales data (date and total revenue) for {}, a fishing tackle shop.",
            persona.shop_name
        ),
        format!("Predict the sales trend for the next {FORECAST_PERIODS} months."),
        "Return a JSON array with month name, predicted revenue, confidence score (0-1), and a short reasoning string.".to_string(),
        String::new(),
        format!("Data: {data}"),
    ]
    .join("\n");

    GenerateRequest::prompt(prompt).with_response_schema(forecast_schema())
}

pub fn inventory_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "productId": {"type": "STRING"},
                "productName": {"type": "STRING"},
                "action": {"type": "STRING", "enum": ["RESTOCK", "DISCOUNT", "HOLD"]},
                "reason": {"type": "STRING"},
                "priority": {"type": "STRING", "enum": ["HIGH", "MEDIUM", "LOW"]}
            },
            "required": ["productId", "productName", "action", "reason", "priority"]
        }
    })
}

pub fn inventory_request(lines: &[StockLine<'_>], persona: &Persona) -> GenerateRequest {
    let data = to_json(lines);
    let prompt = [
        format!(
            "You are an inventory manager AI for {}. Analyze this fishing tackle inventory.",
            persona.shop_name
        ),
        "Identify items that need restocking (stock < minStock or high sales), items that are overstocked/slow-moving (high stock, low sales), and items that are fine.".to_string(),
        "Use RESTOCK, DISCOUNT or HOLD as the action and HIGH, MEDIUM or LOW as the priority.".to_string(),
        "Return a JSON array of insights.".to_string(),
        String::new(),
        format!("Inventory Data: {data}"),
    ]
    .join("\n");

    GenerateRequest::prompt(prompt).with_response_schema(inventory_schema())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Field-ordered output of plain structs with string keys; this cannot fail.
    serde_json::to_string(value).expect("prompt data serialize failed")
}

/// One line per product: `name ($price) - CATEGORY - Stock: n`.
pub fn render_catalog(products: &[Product]) -> String {
    products
        .iter()
        .map(|p| format!("{} (${}) - {} - Stock: {}", p.name, p.price, p.category, p.stock))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chat_system_instruction(persona: &Persona, catalog: &str) -> String {
    format!(
        "You are '{assistant}', an expert fishing guide and shop assistant for '{shop}'.\n\
You help customers choose the right gear based on their target fish and conditions.\n\
You have access to the current shop inventory:\n\
---\n\
{catalog}\n\
---\n\
Only recommend items in stock. Be friendly, concise, and helpful.",
        assistant = persona.assistant_name,
        shop = persona.shop_name,
    )
}

pub fn chat_request(
    history: &[ChatMessage],
    message: &str,
    products: &[Product],
    persona: &Persona,
) -> GenerateRequest {
    let mut turns: Vec<Turn> = history
        .iter()
        .map(|m| Turn {
            role: m.role,
            text: m.text.clone(),
        })
        .collect();
    turns.push(Turn::user(message));

    GenerateRequest {
        turns,
        ..Default::default()
    }
    .with_system_instruction(chat_system_instruction(persona, &render_catalog(products)))
    .with_max_output_tokens(CHAT_MAX_OUTPUT_TOKENS)
}
