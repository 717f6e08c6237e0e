use axum::{extract::State, routing::get, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tackle_core::advisory::{Advice, Advisor};
use tackle_core::domain::advisory::{InventoryInsight, SalesPrediction};
use tackle_core::domain::catalog::{Product, Sale};
use tackle_core::domain::chat::{ChatMessage, ChatRole};
use tackle_core::llm::gemini::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tackle_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if settings.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY missing; advisory endpoints will report unavailable");
    }

    let llm = match GeminiClient::from_settings(&settings) {
        Ok(llm) => llm,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            return Err(e);
        }
    };
    tracing::info!(model = llm.model(), "gemini client ready");
    let advisor = Advisor::from_settings(Arc::new(llm), &settings);
    tracing::info!(?advisor, "advisor configured");

    let app = router(AppState { advisor });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/advisory/greeting", get(greeting))
        .route("/advisory/forecast", post(forecast))
        .route("/advisory/inventory", post(inventory))
        .route("/advisory/chat", post(chat))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    advisor: Advisor,
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
    sales: Vec<Sale>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InventoryBody {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    history: Vec<ChatMessage>,
    message: String,
    #[serde(default)]
    products: Vec<Product>,
}

async fn greeting(State(state): State<AppState>) -> Json<ChatMessage> {
    Json(state.advisor.greeting(Uuid::new_v4().to_string(), Utc::now()))
}

async fn forecast(
    State(state): State<AppState>,
    Json(body): Json<ForecastBody>,
) -> Json<Advice<Vec<SalesPrediction>>> {
    // Callers may narrow the window but never widen it past the configured cap.
    let cap = state.advisor.limits().forecast_sales;
    let limit = body.limit.map_or(cap, |limit| limit.min(cap));
    let res = state
        .advisor
        .forecast_sales_with_limit(&body.sales, limit)
        .await;

    Json(unavailable_logged("forecast", Advice::from_result(res, |_| Vec::new())))
}

async fn inventory(
    State(state): State<AppState>,
    Json(body): Json<InventoryBody>,
) -> Json<Advice<Vec<InventoryInsight>>> {
    let res = state.advisor.analyze_inventory(&body.products).await;
    Json(unavailable_logged("inventory", Advice::from_result(res, |_| Vec::new())))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Json<Advice<ChatMessage>> {
    let res = state
        .advisor
        .converse(&body.history, &body.message, &body.products)
        .await;

    let advice = Advice::from_result(res, |err| err.chat_fallback().to_string()).map(|text| {
        ChatMessage::new(Uuid::new_v4().to_string(), ChatRole::Assistant, text, Utc::now())
    });
    Json(unavailable_logged("chat", advice))
}

fn unavailable_logged<T>(route: &'static str, advice: Advice<T>) -> Advice<T> {
    if let Advice::Unavailable { reason, detail, .. } = &advice {
        tracing::warn!(route, reason, detail = %detail, "advisor unavailable; serving fallback");
        if is_reportable(reason) {
            sentry::capture_message(
                &format!("advisor unavailable on {route}: {reason}"),
                sentry::Level::Warning,
            );
        }
    }
    advice
}

/// Provider faults go to Sentry. A missing credential or a blocked reply is
/// expected steady state and only logged.
fn is_reportable(reason: &str) -> bool {
    matches!(reason, "transport" | "rejected" | "malformed")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &tackle_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
