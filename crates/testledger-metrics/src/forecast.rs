use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use testledger_core::model::{Campaign, ExecutionLogRow, Judgment};

/// Per-date rollup of the history ledger: defects found that day and the
/// running count of items judged OK so far.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub ng_count: i64,
    pub ok_cumulative: i64,
}

/// One plotted day: actuals from the ledger next to the fitted curve.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub daily_defect_count: i64,
    pub cumulative_defect_count: i64,
    pub actual_remaining_tests: i64,
    pub predicted_remaining_tests: f64,
    pub predicted_defects: f64,
}

/// The forecast series plus the campaign parameters echoed back for chart
/// rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub ng_plan_count: i64,
    pub points: Vec<ForecastPoint>,
}

/// Collapses the dated execution log into one row per calendar date,
/// ordered ascending.
pub fn daily_rollups(log: &[ExecutionLogRow]) -> Vec<DailyRollup> {
    let mut per_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for row in log {
        let entry = per_day.entry(row.execution_date).or_insert((0, 0));
        match row.judgment {
            Some(Judgment::Ng) => entry.0 += 1,
            Some(Judgment::Ok) | Some(Judgment::ReferenceOk) => entry.1 += 1,
            _ => {}
        }
    }

    let mut ok_cumulative = 0;
    per_day
        .into_iter()
        .map(|(date, (ng_count, ok_today))| {
            ok_cumulative += ok_today;
            DailyRollup {
                date,
                ng_count,
                ok_cumulative,
            }
        })
        .collect()
}

/// Fits the bounded S-curve over the campaign window. The `100 * exp_term`
/// denominator suppresses movement near day zero and accelerates
/// convergence mid-campaign; defect discovery starts slow, accelerates,
/// then tapers. Empty rollups yield an empty series.
pub fn forecast_series(
    rollups: &[DailyRollup],
    campaign: &Campaign,
    total_target_items: i64,
    as_of: NaiveDate,
) -> ForecastReport {
    let horizon = as_of.min(campaign.end_date);
    let total_test_days = days_since(campaign.start_date, horizon).max(0) + 1;
    let total_test_days = total_test_days.max(1);
    let lambda = 0.35 * (31.0 / total_test_days as f64);

    let total = total_target_items as f64;
    let ng_plan = campaign.ng_plan_count as f64;

    let mut cumulative_defect_count = 0;
    let points = rollups
        .iter()
        .map(|r| {
            let elapsed_days = days_since(campaign.start_date, r.date).max(1);
            let exp_term = (-lambda * elapsed_days as f64).exp();
            let curve = (1.0 - exp_term) / (1.0 + 100.0 * exp_term);

            cumulative_defect_count += r.ng_count;

            ForecastPoint {
                date: r.date,
                daily_defect_count: r.ng_count,
                cumulative_defect_count,
                actual_remaining_tests: total_target_items - r.ok_cumulative,
                predicted_remaining_tests: round1(total - total * curve),
                predicted_defects: round1(ng_plan * curve),
            }
        })
        .collect();

    ForecastReport {
        start_date: campaign.start_date,
        end_date: campaign.end_date,
        ng_plan_count: campaign.ng_plan_count,
        points,
    }
}

fn days_since(start: NaiveDate, d: NaiveDate) -> i64 {
    (d - start).num_days()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
