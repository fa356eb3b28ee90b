// ===============================
// src/domain.rs
// ===============================
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---- Backtest ----
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord { pub day: String, pub unit_price: f64, pub qty: f64 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantitySource { Column(String), Synthesized { seeded: bool } }
impl QuantitySource {
    pub fn is_deterministic(&self) -> bool {
        match self { QuantitySource::Column(_) => true, QuantitySource::Synthesized { seeded } => *seeded }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome { pub ai_price: f64, pub ai_qty: f64, pub elasticity: f64, pub static_revenue: f64, pub dynamic_revenue: f64 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub day: String,
    #[serde(rename = "Static_Revenue")] pub static_revenue: f64,
    #[serde(rename = "Dynamic_Revenue")] pub dynamic_revenue: f64,
    #[serde(rename = "Revenue_Uplift_Percentage")] pub uplift_pct: f64,
}

// ---- Pricing API ----
fn default_price_lag_1d() -> f64 { 25.50 }
fn default_price_lag_7d() -> f64 { 25.00 }
fn default_sales_lag_7d() -> f64 { 4.0 }
fn default_month() -> i64 { 1 }

/// Body `POST /predict`. Wajib: `Unit_Price`, `sales_lag_1d`, `sales_rolling_avg_7d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRequest {
    #[serde(rename = "Unit_Price")]
    pub unit_price: f64,
    #[serde(default = "default_price_lag_1d")]
    pub price_lag_1d: f64,
    #[serde(default = "default_price_lag_7d")]
    pub price_lag_7d: f64,
    pub sales_lag_1d: f64,
    #[serde(default = "default_sales_lag_7d")]
    pub sales_lag_7d: f64,
    pub sales_rolling_avg_7d: f64,
    #[serde(default)]
    pub day_of_week: i64,
    #[serde(default)]
    pub is_weekend: i64,
    #[serde(default = "default_month")]
    pub month: i64,
}

pub const FEATURE_ORDER: [&str; 9] = [
    "Unit_Price",
    "price_lag_1d",
    "price_lag_7d",
    "sales_lag_1d",
    "sales_lag_7d",
    "sales_rolling_avg_7d",
    "day_of_week",
    "is_weekend",
    "month",
];

impl PricingRequest {
    /// Vektor fitur dengan urutan tetap (`FEATURE_ORDER`); slot 0 diganti harga kandidat.
    pub fn features(&self, price: f64) -> [f64; 9] {
        [
            price,
            self.price_lag_1d,
            self.price_lag_7d,
            self.sales_lag_1d,
            self.sales_lag_7d,
            self.sales_rolling_avg_7d,
            self.day_of_week as f64,
            self.is_weekend as f64,
            self.month as f64,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecommendation {
    pub status: String,
    pub current_price: f64,
    pub recommended_price: f64,
    pub predicted_revenue: f64,
    pub uplift_detected: bool,
}

// ---- Recorder ----
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationEvent { pub ts: DateTime<Utc>, pub request: PricingRequest, pub recommendation: PricingRecommendation, pub predictor: String }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { Recommendation(RecommendationEvent), Note(String) }
