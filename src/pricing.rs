// ===============================
// src/pricing.rs
// ===============================
//
// Brute-force search harga: 8 multiplier tetap dari harga sekarang,
// revenue = qty_prediksi * harga, pilih revenue tertinggi.
//
// Tie-break: iterasi urut PRICE_MULTIPLIERS, ganti hanya jika revenue > best
// (strict). Kandidat pertama yang mencapai maksimum yang menang.
//
use tracing::debug;

use crate::domain::{PricingRecommendation, PricingRequest};
use crate::metrics::CANDIDATES_EVALUATED;
use crate::predictor::DemandPredictor;

pub const PRICE_MULTIPLIERS: [f64; 8] = [0.8, 0.9, 0.95, 1.0, 1.05, 1.1, 1.2, 1.3];

/// Dibulatkan dari nilai biner eksak (25.5 * 0.95 = 24.2249.. -> 24.22).
pub fn round2(v: f64) -> f64 {
    format!("{v:.2}").parse().unwrap_or(v)
}

pub fn candidate_prices(current_price: f64) -> [f64; 8] {
    PRICE_MULTIPLIERS.map(|m| round2(current_price * m))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best_price: f64,
    pub best_revenue: f64,
    /// Revenue di harga sekarang (informasi saja, tidak dipakai untuk seleksi)
    pub base_revenue: f64,
    pub revenues: [f64; 8],
}

pub fn search(predictor: &DemandPredictor, req: &PricingRequest) -> SearchOutcome {
    let current_price = req.unit_price;
    let candidates = candidate_prices(current_price);

    let mut best_price = current_price;
    let mut best_revenue = -1.0;
    let mut base_revenue = 0.0;
    let mut revenues = [0.0; 8];

    for (i, &price) in candidates.iter().enumerate() {
        let qty = predictor.predict_qty(req, price);
        let revenue = qty * price;
        revenues[i] = revenue;

        if price == current_price {
            base_revenue = revenue;
        }
        if revenue > best_revenue {
            best_revenue = revenue;
            best_price = price;
        }
    }
    CANDIDATES_EVALUATED.inc_by(candidates.len() as u64);

    SearchOutcome { best_price, best_revenue, base_revenue, revenues }
}

pub fn recommend(predictor: &DemandPredictor, req: &PricingRequest) -> PricingRecommendation {
    let out = search(predictor, req);
    debug!(
        current_price = req.unit_price,
        best_price = out.best_price,
        best_revenue = out.best_revenue,
        base_revenue = out.base_revenue,
        "price search done"
    );

    PricingRecommendation {
        status: "success".to_string(),
        current_price: req.unit_price,
        recommended_price: out.best_price,
        predicted_revenue: round2(out.best_revenue),
        uplift_detected: out.best_price != req.unit_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{model_failure_qty, simulated_qty, DemandModel, ModelError};

    fn request(price: f64, lag1: f64, rolling: f64) -> PricingRequest {
        PricingRequest {
            unit_price: price,
            price_lag_1d: 25.5,
            price_lag_7d: 25.0,
            sales_lag_1d: lag1,
            sales_lag_7d: 4.0,
            sales_rolling_avg_7d: rolling,
            day_of_week: 1,
            is_weekend: 0,
            month: 3,
        }
    }

    // Argmax independen (strict >, urutan kandidat)
    fn argmax(prices: &[f64], qty: impl Fn(f64) -> f64) -> f64 {
        let mut best = (prices[0], prices[0] * qty(prices[0]));
        for &p in &prices[1..] {
            let r = p * qty(p);
            if r > best.1 {
                best = (p, r);
            }
        }
        best.0
    }

    struct Constant(f64);
    impl DemandModel for Constant {
        fn predict(&self, _: &[f64]) -> Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    struct Broken;
    impl DemandModel for Broken {
        fn predict(&self, f: &[f64]) -> Result<f64, ModelError> {
            Err(ModelError::ShapeMismatch { expected: 12, got: f.len() })
        }
    }

    #[test]
    fn candidates_for_price_100() {
        assert_eq!(candidate_prices(100.0), [80.0, 90.0, 95.0, 100.0, 105.0, 110.0, 120.0, 130.0]);
    }

    #[test]
    fn candidates_are_rounded_to_cents() {
        for p in candidate_prices(19.99) {
            assert_eq!(round2(p), p);
        }
        assert_eq!(candidate_prices(19.99)[3], 19.99);
    }

    #[test]
    fn half_cent_products_round_on_exact_value() {
        assert_eq!(candidate_prices(25.5)[2], 24.22);
        assert_eq!(candidate_prices(99.95)[1], 89.95);
        assert_eq!(round2(1.15 * 1.3), 1.49);
    }

    #[test]
    fn negative_model_output_still_picks_a_candidate() {
        let predictor = DemandPredictor::LearnedModel(Box::new(Constant(-5.0)));
        let req = request(10.005, 1.0, 1.0);
        let rec = recommend(&predictor, &req);
        assert!(candidate_prices(10.005).contains(&rec.recommended_price));
        assert_eq!(rec.recommended_price, 8.0);
        assert_eq!(rec.predicted_revenue, 0.0);
        assert!(rec.uplift_detected);
    }

    #[test]
    fn formula_search_matches_independent_argmax() {
        let req = request(100.0, 50.0, 20.0);
        let expected = argmax(&candidate_prices(100.0), |p| simulated_qty(&req, p));
        let rec = recommend(&DemandPredictor::FormulaFallback, &req);
        assert_eq!(rec.recommended_price, expected);
        assert_eq!(rec.recommended_price, 130.0);
        assert!(rec.uplift_detected);
        assert_eq!(rec.current_price, 100.0);
        assert_eq!(rec.status, "success");
    }

    #[test]
    fn model_failure_search_matches_independent_argmax() {
        // qty = 52 - 1.5p, optimum 17.33 -> kandidat 18
        let req = request(20.0, 4.0, 3.0);
        let predictor = DemandPredictor::LearnedModel(Box::new(Broken));
        let expected = argmax(&candidate_prices(20.0), |p| model_failure_qty(p, 4.0));
        let rec = recommend(&predictor, &req);
        assert_eq!(rec.recommended_price, expected);
        assert_eq!(rec.recommended_price, 18.0);
        assert_eq!(rec.predicted_revenue, 450.0);
    }

    #[test]
    fn ties_keep_first_candidate() {
        // qty 0 di semua kandidat: revenue 0 > -1 hanya untuk kandidat pertama
        let predictor = DemandPredictor::LearnedModel(Box::new(Constant(0.0)));
        let rec = recommend(&predictor, &request(50.0, 1.0, 1.0));
        assert_eq!(rec.recommended_price, 40.0);
        assert_eq!(rec.predicted_revenue, 0.0);
        assert!(rec.uplift_detected);
    }

    #[test]
    fn baseline_is_informational_only() {
        let predictor = DemandPredictor::LearnedModel(Box::new(Constant(2.0)));
        let out = search(&predictor, &request(10.0, 1.0, 1.0));
        assert_eq!(out.base_revenue, 20.0);
        assert_eq!(out.best_price, 13.0);
        assert_eq!(out.best_revenue, 26.0);
    }

    #[test]
    fn result_is_always_a_candidate() {
        for price in [0.99, 7.5, 25.5, 310.0] {
            for lag in [0.0, 3.0, 40.0] {
                let req = request(price, lag, 3.5);
                let rec = recommend(&DemandPredictor::FormulaFallback, &req);
                assert!(candidate_prices(price).contains(&rec.recommended_price));
                if rec.recommended_price == price {
                    assert!(!rec.uplift_detected);
                }
            }
        }
    }
}
