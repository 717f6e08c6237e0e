use crate::config::Settings;
use crate::domain::catalog::Product;

pub const DEFAULT_FORECAST_SALES: usize = 50;
pub const DEFAULT_INVENTORY_PRODUCTS: usize = 200;

/// Upper bounds on how much caller data goes into a single prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisoryLimits {
    /// Most recent sales sent for forecasting.
    pub forecast_sales: usize,
    /// Products sent for inventory analysis.
    pub inventory_products: usize,
}

impl Default for AdvisoryLimits {
    fn default() -> Self {
        Self {
            forecast_sales: DEFAULT_FORECAST_SALES,
            inventory_products: DEFAULT_INVENTORY_PRODUCTS,
        }
    }
}

impl AdvisoryLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            forecast_sales: settings.forecast_limit.unwrap_or(defaults.forecast_sales),
            inventory_products: settings
                .inventory_limit
                .unwrap_or(defaults.inventory_products),
        }
    }
}

/// The last `limit` items in caller order.
pub fn tail<T>(items: &[T], limit: usize) -> &[T] {
    &items[items.len().saturating_sub(limit)..]
}

/// Picks at most `cap` products, preferring the ones furthest below their minimum stock
/// level. The selection keeps caller order.
pub fn select_for_analysis(products: &[Product], cap: usize) -> Vec<&Product> {
    if products.len() <= cap {
        return products.iter().collect();
    }

    let mut ranked: Vec<usize> = (0..products.len()).collect();
    // Stable sort: equal shortfalls keep caller order.
    ranked.sort_by_key(|&i| std::cmp::Reverse(products[i].stock_shortfall()));
    ranked.truncate(cap);
    ranked.sort_unstable();

    ranked.into_iter().map(|i| &products[i]).collect()
}
