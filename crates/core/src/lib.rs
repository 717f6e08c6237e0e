pub mod advisory;
pub mod domain;
pub mod llm;

pub mod config {
    use anyhow::Context;

    const DEFAULT_SHOP_NAME: &str = "HookLineSinker";
    const DEFAULT_ASSISTANT_NAME: &str = "Finley";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub shop_name: String,
        pub assistant_name: String,
        pub forecast_limit: Option<usize>,
        pub inventory_limit: Option<usize>,
        pub retries: Option<u32>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from any key lookup. Blank values count as unset.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let nonblank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            Ok(Self {
                gemini_api_key: nonblank("GEMINI_API_KEY").or_else(|| nonblank("API_KEY")),
                sentry_dsn: nonblank("SENTRY_DSN"),
                shop_name: nonblank("ADVISOR_SHOP_NAME")
                    .unwrap_or_else(|| DEFAULT_SHOP_NAME.to_string()),
                assistant_name: nonblank("ADVISOR_ASSISTANT_NAME")
                    .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
                forecast_limit: parse_number(
                    "ADVISOR_FORECAST_LIMIT",
                    nonblank("ADVISOR_FORECAST_LIMIT"),
                )?,
                inventory_limit: parse_number(
                    "ADVISOR_INVENTORY_LIMIT",
                    nonblank("ADVISOR_INVENTORY_LIMIT"),
                )?,
                retries: parse_number(
                    "ADVISOR_RETRIES",
                    nonblank("ADVISOR_RETRIES"),
                )?,
            })
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                gemini_api_key: None,
                sentry_dsn: None,
                shop_name: DEFAULT_SHOP_NAME.to_string(),
                assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
                forecast_limit: None,
                inventory_limit: None,
                retries: None,
            }
        }
    }

    fn parse_number<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        raw.map(|s| {
            s.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a number (got {s:?})"))
        })
        .transpose()
    }

}
