//! AI advisory operations: sales forecast, inventory insights and the shop assistant chat.
//!
//! Each operation builds one request from caller snapshots, sends it through the injected
//! [`LlmClient`] and decodes the reply. Operations return a tagged [`AdvisoryError`] on
//! failure; the `*_or_*` variants log the error and return the fallback value instead.

pub mod error;
pub mod limits;
pub mod prompt;

use crate::config::Settings;
use crate::domain::advisory::{InventoryInsight, SalesPrediction};
use crate::domain::catalog::{Product, Sale};
use crate::domain::chat::{ChatMessage, ChatRole};
use crate::llm::retry::RetryPolicy;
use crate::llm::{json, GenerateRequest, LlmClient};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

pub use error::{Advice, AdvisoryError, CONNECTION_FALLBACK, NO_REPLY_FALLBACK};
pub use limits::AdvisoryLimits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub shop_name: String,
    pub assistant_name: String,
}

impl Default for Persona {
    fn default() -> Self {
        let settings = Settings::default();
        Self::from_settings(&settings)
    }
}

impl Persona {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            shop_name: settings.shop_name.clone(),
            assistant_name: settings.assistant_name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Advisor {
    llm: Arc<dyn LlmClient>,
    persona: Persona,
    limits: AdvisoryLimits,
    retry: RetryPolicy,
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("provider", &self.llm.provider())
            .field("persona", &self.persona)
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Advisor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            persona: Persona::default(),
            limits: AdvisoryLimits::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(llm: Arc<dyn LlmClient>, settings: &Settings) -> Self {
        let retry = match settings.retries {
            Some(n) => RetryPolicy::default().with_max_attempts(n),
            None => RetryPolicy::default(),
        };

        Self {
            llm,
            persona: Persona::from_settings(settings),
            limits: AdvisoryLimits::from_settings(settings),
            retry,
        }
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_limits(mut self, limits: AdvisoryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn limits(&self) -> &AdvisoryLimits {
        &self.limits
    }

    /// Opening message for a fresh chat.
    pub fn greeting(&self, id: impl Into<String>, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage::new(
            id,
            ChatRole::Assistant,
            format!(
                "Hello! I'm {}, your expert fishing guide. How can I help you find the perfect gear today?",
                self.persona.assistant_name
            ),
            at,
        )
    }

    /// Forecasts the next periods from the most recent sales, capped at the configured limit.
    pub async fn forecast_sales(
        &self,
        sales: &[Sale],
    ) -> Result<Vec<SalesPrediction>, AdvisoryError> {
        self.forecast_sales_with_limit(sales, self.limits.forecast_sales)
            .await
    }

    pub async fn forecast_sales_with_limit(
        &self,
        sales: &[Sale],
        limit: usize,
    ) -> Result<Vec<SalesPrediction>, AdvisoryError> {
        let recent = limits::tail(sales, limit);
        let summaries = prompt::sale_summaries(recent);
        let req = prompt::forecast_request(&summaries, &self.persona);

        let text = self.dispatch("forecast_sales", &req).await?;
        let predictions = json::parse_array::<SalesPrediction>(&text)
            .map_err(|e| AdvisoryError::Malformed(format!("{e:#}")))?;

        tracing::debug!(
            sales_in = sales.len(),
            sales_sent = recent.len(),
            predictions = predictions.len(),
            "sales forecast ready"
        );
        Ok(predictions)
    }

    pub async fn forecast_sales_or_empty(&self, sales: &[Sale]) -> Vec<SalesPrediction> {
        let res = self.forecast_sales(sales).await;
        or_fallback("forecast_sales", res, |_| Vec::new())
    }

    /// Classifies products into restock/discount/hold. The model's answer is not reconciled
    /// against `products`.
    pub async fn analyze_inventory(
        &self,
        products: &[Product],
    ) -> Result<Vec<InventoryInsight>, AdvisoryError> {
        let selected = limits::select_for_analysis(products, self.limits.inventory_products);
        if selected.len() < products.len() {
            tracing::warn!(
                products_in = products.len(),
                products_sent = selected.len(),
                "inventory exceeds analysis cap; sending most under-stocked products"
            );
        }

        let lines: Vec<prompt::StockLine<'_>> =
            selected.into_iter().map(prompt::StockLine::from).collect();
        let req = prompt::inventory_request(&lines, &self.persona);

        let text = self.dispatch("analyze_inventory", &req).await?;
        let insights = json::parse_array::<InventoryInsight>(&text)
            .map_err(|e| AdvisoryError::Malformed(format!("{e:#}")))?;

        tracing::debug!(
            products_sent = lines.len(),
            insights = insights.len(),
            "inventory insights ready"
        );
        Ok(insights)
    }

    pub async fn analyze_inventory_or_empty(&self, products: &[Product]) -> Vec<InventoryInsight> {
        let res = self.analyze_inventory(products).await;
        or_fallback("analyze_inventory", res, |_| Vec::new())
    }

    /// Replies to `message` given the full prior `history` and the live catalog.
    pub async fn converse(
        &self,
        history: &[ChatMessage],
        message: &str,
        products: &[Product],
    ) -> Result<String, AdvisoryError> {
        let req = prompt::chat_request(history, message, products, &self.persona);
        self.dispatch("converse", &req).await
    }

    pub async fn converse_or_fallback(
        &self,
        history: &[ChatMessage],
        message: &str,
        products: &[Product],
    ) -> String {
        let res = self.converse(history, message, products).await;
        or_fallback("converse", res, |err| err.chat_fallback().to_string())
    }

    async fn dispatch(
        &self,
        operation: &'static str,
        req: &GenerateRequest,
    ) -> Result<String, AdvisoryError> {
        let res = self
            .retry
            .run(|| self.llm.generate(req))
            .await
            .map_err(|e| {
                tracing::debug!(operation, error = %format!("{e:#}"), "LLM call failed");
                AdvisoryError::from_llm(&e)
            })?;

        match res.text {
            Some(text) => Ok(text),
            None => {
                tracing::debug!(
                    operation,
                    finish_reason = res.finish_reason.as_deref().unwrap_or("-"),
                    "LLM returned no text"
                );
                Err(AdvisoryError::EmptyResponse)
            }
        }
    }
}

fn or_fallback<T>(
    operation: &'static str,
    res: Result<T, AdvisoryError>,
    fallback: impl FnOnce(&AdvisoryError) -> T,
) -> T {
    match res {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(
                operation,
                reason = err.reason(),
                error = %err,
                "advisory call failed; returning fallback"
            );
            fallback(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advisory::{InsightAction, InsightPriority};
    use crate::domain::catalog::{ProductCategory, SaleLineItem};
    use crate::llm::error::LlmDiagnosticsError;
    use crate::llm::{GenerateResponse, Provider};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted replies and records every request it receives.
    struct ScriptedClient {
        replies: Mutex<VecDeque<anyhow::Result<GenerateResponse>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<anyhow::Result<GenerateResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn text(text: &str) -> Arc<Self> {
            Self::new(vec![Ok(GenerateResponse {
                text: Some(text.to_string()),
                finish_reason: Some("STOP".to_string()),
            })])
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.requests.lock().unwrap().push(req.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerateResponse::default()))
        }
    }

    fn http_failure(status: u16) -> anyhow::Error {
        LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage: "http",
            status: Some(status),
            detail: format!("status={status}"),
            raw_output: None,
        }
        .into()
    }

    fn advisor(client: Arc<ScriptedClient>) -> Advisor {
        Advisor::new(client).with_retry_policy(
            RetryPolicy::default()
                .with_max_attempts(3)
                .with_base_delay(Duration::ZERO),
        )
    }

    fn sales(n: usize) -> Vec<Sale> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        (0..n)
            .map(|i| Sale {
                id: format!("s{i}"),
                date: start + ChronoDuration::hours(i as i64),
                total: i as f64,
                items: vec![SaleLineItem {
                    product_id: "p1".to_string(),
                    name: "Lure".to_string(),
                    quantity: 1,
                    price: i as f64,
                }],
                customer_name: None,
            })
            .collect()
    }

    fn product(id: &str, stock: u32, min: u32) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Item {id}"),
            sku: format!("SKU-{id}"),
            category: ProductCategory::Reel,
            price: 80.0,
            cost: 40.0,
            stock,
            min_stock_level: min,
            sales_last_month: 3,
            image_url: None,
            description: None,
        }
    }

    fn submitted_sales(req: &GenerateRequest) -> Vec<Value> {
        let text = &req.turns[0].text;
        let data = text.split("Data: ").nth(1).unwrap();
        serde_json::from_str::<Vec<Value>>(data).unwrap()
    }

    #[tokio::test]
    async fn forecast_sends_whole_history_when_short() {
        let client = ScriptedClient::text("[]");
        let out = advisor(client.clone()).forecast_sales(&sales(7)).await.unwrap();
        assert!(out.is_empty());

        let reqs = client.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(submitted_sales(&reqs[0]).len(), 7);
    }

    #[tokio::test]
    async fn forecast_sends_only_last_fifty() {
        let client = ScriptedClient::text("[]");
        advisor(client.clone()).forecast_sales(&sales(80)).await.unwrap();

        let sent = submitted_sales(&client.requests()[0]);
        assert_eq!(sent.len(), 50);
        assert_eq!(sent[0]["total"], 30.0);
        assert_eq!(sent[49]["total"], 79.0);
    }

    #[tokio::test]
    async fn forecast_decodes_prediction_unchanged() {
        let client = ScriptedClient::text(
            r#"[{"month":"Jan","predictedRevenue":1000,"confidence":0.8,"reasoning":"steady"}]"#,
        );
        let out = advisor(client).forecast_sales(&sales(3)).await.unwrap();
        assert_eq!(
            out,
            vec![SalesPrediction {
                month: "Jan".to_string(),
                predicted_revenue: 1000.0,
                confidence: 0.8,
                reasoning: "steady".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn forecast_unparsable_text_is_malformed_and_falls_back_empty() {
        let client = ScriptedClient::text("The trend looks strong!");
        let a = advisor(client.clone());
        let err = a.forecast_sales(&sales(3)).await.unwrap_err();
        assert_eq!(err.reason(), "malformed");

        let client = ScriptedClient::text("The trend looks strong!");
        assert!(advisor(client.clone()).forecast_sales_or_empty(&sales(3)).await.is_empty());
        // Decode failures are not retried.
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn inventory_request_lists_every_product_field() {
        let client = ScriptedClient::text("[]");
        let products = vec![product("a", 1, 5), product("b", 30, 5)];
        advisor(client.clone()).analyze_inventory(&products).await.unwrap();

        let text = &client.requests()[0].turns[0].text;
        assert!(text.contains(
            r#"{"id":"a","name":"Item a","stock":1,"minStock":5,"lastMonthSales":3}"#
        ));
        assert!(text.contains(
            r#"{"id":"b","name":"Item b","stock":30,"minStock":5,"lastMonthSales":3}"#
        ));
    }

    #[tokio::test]
    async fn inventory_decodes_insights() {
        let client = ScriptedClient::text(
            r#"[{"productId":"a","productName":"Item a","action":"RESTOCK","reason":"below minimum","priority":"HIGH"}]"#,
        );
        let out = advisor(client)
            .analyze_inventory(&[product("a", 1, 5)])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].action, InsightAction::Restock);
        assert_eq!(out[0].priority, InsightPriority::High);
    }

    #[tokio::test]
    async fn inventory_missing_priority_rejects_whole_response() {
        let body = r#"[
            {"productId":"a","productName":"Item a","action":"RESTOCK","reason":"low","priority":"HIGH"},
            {"productId":"b","productName":"Item b","action":"HOLD","reason":"fine"}
        ]"#;
        let err = advisor(ScriptedClient::text(body))
            .analyze_inventory(&[product("a", 1, 5)])
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "malformed");

        let out = advisor(ScriptedClient::text(body))
            .analyze_inventory_or_empty(&[product("a", 1, 5)])
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn inventory_cap_sends_most_understocked() {
        let client = ScriptedClient::text("[]");
        let products = vec![product("fine", 40, 5), product("low", 0, 5), product("ok", 6, 5)];
        advisor(client.clone())
            .with_limits(AdvisoryLimits {
                forecast_sales: 50,
                inventory_products: 1,
            })
            .analyze_inventory(&products)
            .await
            .unwrap();

        let text = &client.requests()[0].turns[0].text;
        assert!(text.contains(r#""id":"low""#));
        assert!(!text.contains(r#""id":"fine""#));
        assert!(!text.contains(r#""id":"ok""#));
    }

    #[tokio::test]
    async fn converse_returns_reply_and_appends_one_user_turn() {
        let client = ScriptedClient::text("Grab the 10lb braid.");
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let a = advisor(client.clone());
        let history = vec![
            a.greeting("0", at),
            ChatMessage::new("1", ChatRole::User, "bass?", at),
            ChatMessage::new("2", ChatRole::Assistant, "Spinnerbait.", at),
        ];

        let reply = a
            .converse(&history, "line?", &[product("a", 2, 1)])
            .await
            .unwrap();
        assert_eq!(reply, "Grab the 10lb braid.");

        let req = &client.requests()[0];
        assert_eq!(req.turns.len(), history.len() + 1);
        for (turn, msg) in req.turns.iter().zip(&history) {
            assert_eq!(turn.role, msg.role);
            assert_eq!(turn.text, msg.text);
        }
        let last = req.turns.last().unwrap();
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.text, "line?");
    }

    #[tokio::test]
    async fn converse_without_text_uses_no_reply_fallback() {
        let client = ScriptedClient::new(vec![Ok(GenerateResponse::default())]);
        let reply = advisor(client).converse_or_fallback(&[], "hi", &[]).await;
        assert_eq!(reply, NO_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn converse_failure_uses_connection_fallback() {
        let client = ScriptedClient::new(vec![Err(http_failure(403))]);
        let reply = advisor(client.clone())
            .converse_or_fallback(&[], "hi", &[])
            .await;
        assert_eq!(reply, CONNECTION_FALLBACK);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let client = ScriptedClient::new(vec![
            Err(http_failure(503)),
            Err(http_failure(429)),
            Ok(GenerateResponse {
                text: Some("Hi there".to_string()),
                finish_reason: None,
            }),
        ]);
        let reply = advisor(client.clone()).converse(&[], "hi", &[]).await.unwrap();
        assert_eq!(reply, "Hi there");
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn rejected_reason_carries_status() {
        let client = ScriptedClient::new(vec![Err(http_failure(401))]);
        let err = advisor(client).forecast_sales(&sales(2)).await.unwrap_err();
        assert!(matches!(err, AdvisoryError::Rejected { status: 401, .. }));
    }

    #[test]
    fn greeting_uses_assistant_name() {
        let client = ScriptedClient::text("");
        let a = advisor(client).with_persona(Persona {
            shop_name: "Reel Deal".to_string(),
            assistant_name: "Marina".to_string(),
        });
        let msg = a.greeting("g", Utc::now());
        assert_eq!(msg.role, ChatRole::Assistant);
        assert!(msg.text.starts_with("Hello! I'm Marina,"));
    }
}
