use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tackle_core::advisory::{Advice, Advisor};
use tackle_core::domain::catalog::{Product, Sale};
use tackle_core::domain::chat::{ChatMessage, ChatRole};
use tackle_core::llm::gemini::GeminiClient;

#[derive(Debug, Parser)]
#[command(name = "tackle_worker")]
struct Args {
    #[command(subcommand)]
    job: Job,

    /// Exit non-zero when the advisor is unavailable.
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Debug, Subcommand)]
enum Job {
    /// Forecast the next months of revenue from a JSON array of sales.
    Forecast {
        #[arg(long)]
        sales: PathBuf,

        /// Most recent sales to send (defaults to ADVISOR_FORECAST_LIMIT or 50).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Restock/discount/hold insights from a JSON array of products.
    Inventory {
        #[arg(long)]
        products: PathBuf,
    },

    /// Ask the shop assistant one question.
    Chat {
        #[arg(long)]
        products: PathBuf,

        /// JSON array of prior chat messages.
        #[arg(long)]
        history: Option<PathBuf>,

        #[arg(long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tackle_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let llm = GeminiClient::from_settings(&settings)?;
    tracing::debug!(model = llm.model(), "gemini client ready");
    let advisor = Advisor::from_settings(Arc::new(llm), &settings);

    let available = match run(&advisor, args.job).await {
        Ok(available) => available,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "advisory job failed");
            return Err(err);
        }
    };

    if args.strict && !available {
        anyhow::bail!("advisor unavailable");
    }
    Ok(())
}

/// Runs one job and prints its advice. Returns whether the advisor answered.
async fn run(advisor: &Advisor, job: Job) -> anyhow::Result<bool> {
    match job {
        Job::Forecast { sales, limit } => {
            let sales: Vec<Sale> = read_json(&sales)?;
            let limit = limit.unwrap_or(advisor.limits().forecast_sales);
            let res = advisor.forecast_sales_with_limit(&sales, limit).await;
            emit("forecast", Advice::from_result(res, |_| Vec::new()))
        }
        Job::Inventory { products } => {
            let products: Vec<Product> = read_json(&products)?;
            let res = advisor.analyze_inventory(&products).await;
            emit("inventory", Advice::from_result(res, |_| Vec::new()))
        }
        Job::Chat {
            products,
            history,
            message,
        } => {
            let products: Vec<Product> = read_json(&products)?;
            let history: Vec<ChatMessage> = match history {
                Some(path) => read_json(&path)?,
                None => vec![advisor.greeting(Uuid::new_v4().to_string(), Utc::now())],
            };

            let res = advisor.converse(&history, &message, &products).await;
            let advice = Advice::from_result(res, |err| err.chat_fallback().to_string())
                .map(|text| {
                    ChatMessage::new(Uuid::new_v4().to_string(), ChatRole::Assistant, text, Utc::now())
                });
            emit("chat", advice)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn emit<T: Serialize>(job: &'static str, advice: Advice<T>) -> anyhow::Result<bool> {
    let available = advice.is_ok();
    if let Advice::Unavailable { reason, detail, .. } = &advice {
        tracing::warn!(job, reason, detail = %detail, "advisor unavailable; printing fallback");
    }

    let out = serde_json::to_string_pretty(&advice).context("failed to serialize advice")?;
    println!("{out}");
    Ok(available)
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
