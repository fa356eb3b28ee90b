// ===============================
// src/predictor.rs
// ===============================
//
// Prediksi demand (qty) untuk satu harga kandidat.
//
// Dua varian, dipilih SEKALI saat startup (lihat `DemandPredictor::load`):
// 1) LearnedModel    : artefak model (JSON linear) via trait `DemandModel`.
//                      Jika predict gagal -> formula linear
//                      max(0, 50 - 1.5*price + 0.5*sales_lag_1d), tidak pernah error ke caller.
// 2) FormulaFallback : tanpa model sama sekali -> formula simulasi
//                      base 10, sensitivitas harga 1.2, boost penjualan (x1.2 saat weekend).
//
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{PricingRequest, FEATURE_ORDER};
use crate::metrics::MODEL_FALLBACKS;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("feature shape mismatch: model expects {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("feature order mismatch at index {index}: model expects {expected}")]
    FeatureOrder { index: usize, expected: String },
    #[error("model produced a non-finite prediction")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kapabilitas model: vektor fitur terurut -> qty.
pub trait DemandModel: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}

/// Artefak model linear: `{"features": [...], "coefficients": [...], "intercept": 0.0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDemandModel {
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearDemandModel {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl DemandModel for LinearDemandModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        // nama fitur artefak harus sama persis dengan urutan training
        for (index, name) in self.features.iter().enumerate() {
            if FEATURE_ORDER.get(index) != Some(&name.as_str()) {
                return Err(ModelError::FeatureOrder { index, expected: name.clone() });
            }
        }
        if self.features.len() != FEATURE_ORDER.len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.features.len(),
                got: FEATURE_ORDER.len(),
            });
        }

        let y = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        if y.is_finite() { Ok(y) } else { Err(ModelError::NonFinite) }
    }
}

// ---- Formula ----

/// Fallback saat model gagal dipanggil.
pub fn model_failure_qty(price: f64, sales_lag_1d: f64) -> f64 {
    (50.0 - price * 1.5 + sales_lag_1d * 0.5).max(0.0)
}

const BASE_DEMAND: f64 = 10.0;
const PRICE_SENSITIVITY: f64 = 1.2;
const WEEKEND_BOOST: f64 = 1.2;

/// Simulasi saat tidak ada model sama sekali.
pub fn simulated_qty(req: &PricingRequest, price: f64) -> f64 {
    let mut sales_boost = req.sales_lag_1d * 0.8 + req.sales_rolling_avg_7d * 0.5;
    if req.is_weekend == 1 {
        sales_boost *= WEEKEND_BOOST;
    }
    (BASE_DEMAND - price * 0.1 * PRICE_SENSITIVITY + sales_boost).max(0.0)
}

pub enum DemandPredictor {
    LearnedModel(Box<dyn DemandModel>),
    FormulaFallback,
}

impl std::fmt::Debug for DemandPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl DemandPredictor {
    /// Artefak hilang / rusak -> warning + FormulaFallback.
    pub fn load(path: &Path) -> Self {
        match LinearDemandModel::from_path(path) {
            Ok(model) => {
                info!(path = %path.display(), features = model.features.len(), "model loaded");
                DemandPredictor::LearnedModel(Box::new(model))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model not available, using simulation formula");
                DemandPredictor::FormulaFallback
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DemandPredictor::LearnedModel(_) => "learned_model",
            DemandPredictor::FormulaFallback => "formula_fallback",
        }
    }

    pub fn predict_qty(&self, req: &PricingRequest, price: f64) -> f64 {
        match self {
            DemandPredictor::LearnedModel(model) => match model.predict(&req.features(price)) {
                Ok(q) => q.max(0.0),
                Err(e) => {
                    debug!(error = %e, price, "model predict failed, using linear fallback");
                    MODEL_FALLBACKS.inc();
                    model_failure_qty(price, req.sales_lag_1d)
                }
            },
            DemandPredictor::FormulaFallback => simulated_qty(req, price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn request(lag1: f64, rolling: f64, weekend: i64) -> PricingRequest {
        PricingRequest {
            unit_price: 20.0,
            price_lag_1d: 25.5,
            price_lag_7d: 25.0,
            sales_lag_1d: lag1,
            sales_lag_7d: 4.0,
            sales_rolling_avg_7d: rolling,
            day_of_week: 2,
            is_weekend: weekend,
            month: 6,
        }
    }

    fn linear(intercept: f64, price_coef: f64) -> LinearDemandModel {
        let mut coefficients = vec![0.0; FEATURE_ORDER.len()];
        coefficients[0] = price_coef;
        LinearDemandModel {
            features: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            coefficients,
            intercept,
        }
    }

    struct Failing;
    impl DemandModel for Failing {
        fn predict(&self, _: &[f64]) -> Result<f64, ModelError> {
            Err(ModelError::NonFinite)
        }
    }

    #[test]
    fn simulation_formula_weekday_and_weekend() {
        // boost = 3*0.8 + 3.5*0.5 = 4.15
        let weekday = simulated_qty(&request(3.0, 3.5, 0), 25.0);
        assert!(approx(weekday, 10.0 - 3.0 + 4.15));
        let weekend = simulated_qty(&request(3.0, 3.5, 1), 25.0);
        assert!(approx(weekend, 10.0 - 3.0 + 4.15 * 1.2));
    }

    #[test]
    fn simulation_formula_clamps_at_zero() {
        assert_eq!(simulated_qty(&request(0.0, 0.0, 0), 1000.0), 0.0);
    }

    #[test]
    fn model_failure_formula() {
        assert!(approx(model_failure_qty(20.0, 4.0), 22.0));
        assert_eq!(model_failure_qty(100.0, 4.0), 0.0);
    }

    #[test]
    fn linear_model_predicts() {
        let m = linear(40.0, -1.0);
        let req = request(3.0, 3.5, 0);
        assert!(approx(m.predict(&req.features(15.0)).unwrap(), 25.0));
    }

    #[test]
    fn linear_model_shape_mismatch() {
        let mut m = linear(40.0, -1.0);
        m.coefficients.pop();
        let err = m.predict(&request(3.0, 3.5, 0).features(15.0)).unwrap_err();
        assert_eq!(err, ModelError::ShapeMismatch { expected: 8, got: 9 });
    }

    #[test]
    fn linear_model_feature_order_mismatch() {
        let mut m = linear(40.0, -1.0);
        m.features.swap(0, 1);
        let err = m.predict(&request(3.0, 3.5, 0).features(15.0)).unwrap_err();
        assert!(matches!(err, ModelError::FeatureOrder { index: 0, .. }));
    }

    #[test]
    fn learned_model_failure_falls_back_silently() {
        let p = DemandPredictor::LearnedModel(Box::new(Failing));
        let q = p.predict_qty(&request(4.0, 3.5, 0), 20.0);
        assert!(approx(q, 22.0));
    }

    #[test]
    fn learned_model_output_is_clamped_at_zero() {
        let p = DemandPredictor::LearnedModel(Box::new(linear(-10.0, 0.0)));
        assert_eq!(p.predict_qty(&request(3.0, 3.5, 0), 20.0), 0.0);
    }

    #[test]
    fn missing_artifact_selects_formula() {
        let path = std::env::temp_dir().join("price_optima_no_such_model.json");
        let p = DemandPredictor::load(&path);
        assert_eq!(p.kind(), "formula_fallback");
    }

    #[test]
    fn artifact_loads_from_json() {
        let path = std::env::temp_dir().join(format!("price_optima_model_{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&linear(30.0, -0.5)).unwrap()).unwrap();
        let p = DemandPredictor::load(&path);
        assert_eq!(p.kind(), "learned_model");
        assert!(approx(p.predict_qty(&request(3.0, 3.5, 0), 20.0), 20.0));
        let _ = fs::remove_file(&path);
    }
}
