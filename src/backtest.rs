// ===============================
// src/backtest.rs
// ===============================
//
// Backtest revenue: static (harga historis) vs dynamic (harga hasil heuristik).
//
// Alur per baris:
//   1) decide_price   : qty >= 8 -> +10%, 3..8 -> tetap, < 3 -> -5%
//   2) elasticity_for : turun harga -> -2.0, naik/tetap -> -0.5
//   3) ai_qty         = max(0, qty * (1 + pct_change * elasticity))
//   4) revenue        : static = price * qty, dynamic = ai_price * ai_qty
// Lalu agregasi per `day`, hitung uplift %, tulis N hari pertama ke CSV.
//
// Jika kolom qty tidak ditemukan, qty disintesis acak uniform [5, 50).
// Tanpa seed hasilnya tidak deterministik (summary.deterministic = false).
//
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use ahash::AHashMap as HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BacktestConfig, ColumnMapping};
use crate::domain::{DailyAggregate, QuantitySource, RowOutcome, SalesRecord};

pub const HIGH_DEMAND_QTY: f64 = 8.0;
pub const LOW_DEMAND_QTY: f64 = 3.0;
pub const RAISE_FACTOR: f64 = 1.10;
pub const DISCOUNT_FACTOR: f64 = 0.95;
pub const DISCOUNT_ELASTICITY: f64 = -2.0;
pub const RAISE_ELASTICITY: f64 = -0.5;
pub const SYNTH_QTY_MIN: u32 = 5;
pub const SYNTH_QTY_MAX: u32 = 50; // eksklusif

pub const REPORT_HEADER: [&str; 4] =
    ["day", "Static_Revenue", "Dynamic_Revenue", "Revenue_Uplift_Percentage"];

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("error loading file {path}: {source}")]
    Open { path: String, source: std::io::Error },
    #[error("error reading CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not find a price column (aliases tried: {0})")]
    MissingPriceColumn(String),
    #[error("error writing report {path}: {source}")]
    Report { path: String, source: csv::Error },
}

/// "  Unit Price " -> "unit_price"
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub price: usize,
    pub qty: Option<usize>,
    pub day: Option<usize>,
}

fn resolve_one(aliases: &[String], headers: &[String]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

impl ColumnMapping {
    /// `headers` harus sudah dinormalisasi.
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns, BacktestError> {
        let price = resolve_one(&self.price, headers)
            .ok_or_else(|| BacktestError::MissingPriceColumn(self.price.join(", ")))?;
        Ok(ResolvedColumns {
            price,
            qty: resolve_one(&self.qty, headers),
            day: resolve_one(&self.day, headers),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSales {
    pub records: Vec<SalesRecord>,
    pub quantity_source: QuantitySource,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

pub fn synthesize_quantity<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(SYNTH_QTY_MIN..SYNTH_QTY_MAX) as f64
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Baca tabel penjualan. `seeded` hanya dipakai untuk menandai determinisme qty sintetis.
pub fn load_sales<R: Read, G: Rng>(
    input: R,
    mapping: &ColumnMapping,
    rng: &mut G,
    seeded: bool,
) -> Result<LoadedSales, BacktestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let cols = mapping.resolve(&headers)?;

    let quantity_source = match cols.qty {
        Some(i) => QuantitySource::Column(headers[i].clone()),
        None => {
            warn!("no quantity column found, generating random quantities");
            QuantitySource::Synthesized { seeded }
        }
    };

    let mut records = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        rows_read += 1;
        // +2: baris header + 1-based
        let line = idx + 2;
        let row = result?;

        let price = match parse_number(row.get(cols.price)) {
            Some(p) if p > 0.0 => p,
            _ => {
                warn!(line, "skip row: price missing, non-numeric or not positive");
                rows_skipped += 1;
                continue;
            }
        };

        let qty = match cols.qty {
            Some(i) => match parse_number(row.get(i)) {
                Some(q) if q >= 0.0 => q,
                _ => {
                    warn!(line, "skip row: quantity missing, non-numeric or negative");
                    rows_skipped += 1;
                    continue;
                }
            },
            None => synthesize_quantity(rng),
        };

        let day = match cols.day {
            Some(i) => match row.get(i).map(str::trim).filter(|s| !s.is_empty()) {
                Some(d) => d.to_string(),
                None => {
                    warn!(line, "skip row: empty day");
                    rows_skipped += 1;
                    continue;
                }
            },
            None => (idx + 1).to_string(),
        };

        records.push(SalesRecord { day, unit_price: price, qty });
    }

    Ok(LoadedSales { records, quantity_source, rows_read, rows_skipped })
}

// ---- Simulasi per baris ----

pub fn decide_price(current_price: f64, qty: f64) -> f64 {
    if qty >= HIGH_DEMAND_QTY {
        current_price * RAISE_FACTOR
    } else if qty >= LOW_DEMAND_QTY {
        current_price
    } else {
        current_price * DISCOUNT_FACTOR
    }
}

pub fn elasticity_for(price_change_pct: f64) -> f64 {
    if price_change_pct < 0.0 {
        DISCOUNT_ELASTICITY
    } else {
        RAISE_ELASTICITY
    }
}

pub fn simulate_row(rec: &SalesRecord) -> RowOutcome {
    let ai_price = decide_price(rec.unit_price, rec.qty);
    let price_change_pct = (ai_price - rec.unit_price) / rec.unit_price;
    let elasticity = elasticity_for(price_change_pct);
    let demand_change_pct = price_change_pct * elasticity;
    let ai_qty = (rec.qty * (1.0 + demand_change_pct)).max(0.0);

    RowOutcome {
        ai_price,
        ai_qty,
        elasticity,
        static_revenue: rec.unit_price * rec.qty,
        dynamic_revenue: ai_price * ai_qty,
    }
}

// ---- Agregasi harian ----

/// Numerik dulu (urut nilai), lalu non-numerik (urut leksikografis).
pub fn compare_days(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Static revenue 0 -> uplift 0.0 (bukan NaN/inf).
pub fn uplift_pct(static_revenue: f64, dynamic_revenue: f64) -> f64 {
    if static_revenue == 0.0 {
        return 0.0;
    }
    (dynamic_revenue - static_revenue) / static_revenue * 100.0
}

pub fn aggregate_daily(records: &[SalesRecord], outcomes: &[RowOutcome]) -> Vec<DailyAggregate> {
    let mut sums: HashMap<&str, (f64, f64)> = HashMap::new();
    for (rec, out) in records.iter().zip(outcomes) {
        let e = sums.entry(rec.day.as_str()).or_insert((0.0, 0.0));
        e.0 += out.static_revenue;
        e.1 += out.dynamic_revenue;
    }

    let mut daily: Vec<DailyAggregate> = sums
        .into_iter()
        .map(|(day, (s, d))| DailyAggregate {
            day: day.to_string(),
            static_revenue: s,
            dynamic_revenue: d,
            uplift_pct: uplift_pct(s, d),
        })
        .collect();
    daily.sort_by(|a, b| compare_days(&a.day, &b.day));
    daily
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    let r = (v * f).round() / f;
    if r == 0.0 { 0.0 } else { r }
}

pub fn format_uplift(pct: f64) -> String {
    format!("{:.1}%", round_to(pct, 1))
}

pub fn report_row(d: &DailyAggregate) -> [String; 4] {
    [
        d.day.clone(),
        format!("{:.2}", round_to(d.static_revenue, 2)),
        format!("{:.2}", round_to(d.dynamic_revenue, 2)),
        format_uplift(d.uplift_pct),
    ]
}

/// Tulis `limit` hari pertama. Parent directory dibuat jika belum ada.
pub fn write_report(path: &Path, daily: &[DailyAggregate], limit: usize) -> Result<(), BacktestError> {
    let report_err = |source: csv::Error| BacktestError::Report {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| report_err(e.into()))?;
        }
    }

    let mut w = csv::Writer::from_path(path).map_err(report_err)?;
    w.write_record(REPORT_HEADER).map_err(report_err)?;
    for d in daily.iter().take(limit) {
        w.write_record(report_row(d)).map_err(report_err)?;
    }
    w.flush().map_err(|e| report_err(e.into()))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct BacktestSummary {
    pub rows_read: usize,
    pub rows_used: usize,
    pub rows_skipped: usize,
    pub quantity_source: QuantitySource,
    pub deterministic: bool,
    pub days: usize,
    pub total_static: f64,
    pub total_dynamic: f64,
    pub total_uplift_pct: f64,
    pub daily: Vec<DailyAggregate>,
}

/// Jalankan backtest penuh. Report hanya ditulis setelah semua baris diproses.
pub fn run(cfg: &BacktestConfig) -> Result<BacktestSummary, BacktestError> {
    let file = File::open(&cfg.input).map_err(|source| BacktestError::Open {
        path: cfg.input.display().to_string(),
        source,
    })?;
    info!(input = %cfg.input.display(), "backtest: loaded input");

    let mut rng = match cfg.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let loaded = load_sales(file, &cfg.columns, &mut rng, cfg.seed.is_some())?;
    let deterministic = loaded.quantity_source.is_deterministic();
    if !deterministic {
        warn!("quantities synthesized without --seed: output is non-deterministic");
    }

    info!(rows = loaded.records.len(), "backtest: calculating revenue");
    let outcomes: Vec<RowOutcome> = loaded.records.iter().map(simulate_row).collect();
    let daily = aggregate_daily(&loaded.records, &outcomes);

    write_report(&cfg.output, &daily, cfg.report_rows)?;

    let total_static: f64 = daily.iter().map(|d| d.static_revenue).sum();
    let total_dynamic: f64 = daily.iter().map(|d| d.dynamic_revenue).sum();
    let summary = BacktestSummary {
        rows_read: loaded.rows_read,
        rows_used: loaded.records.len(),
        rows_skipped: loaded.rows_skipped,
        quantity_source: loaded.quantity_source,
        deterministic,
        days: daily.len(),
        total_static,
        total_dynamic,
        total_uplift_pct: uplift_pct(total_static, total_dynamic),
        daily,
    };

    info!(
        output = %cfg.output.display(),
        days = summary.days,
        rows_used = summary.rows_used,
        rows_skipped = summary.rows_skipped,
        uplift = %format_uplift(summary.total_uplift_pct),
        "backtest: report saved"
    );
    for d in summary.daily.iter().take(cfg.preview_rows) {
        let [day, s, dy, up] = report_row(d);
        info!(%day, static_revenue = %s, dynamic_revenue = %dy, uplift = %up, "daily");
    }

    Ok(summary)
}
