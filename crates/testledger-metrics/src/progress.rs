use serde::Serialize;
use std::collections::BTreeMap;
use testledger_core::model::{Judgment, ProgressInput};

/// Completion rollup for one `(first_layer, second_layer)` classification
/// pair. Rates are fractions in `[0, 1]`, never NaN.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressRow {
    pub first_layer: String,
    pub second_layer: String,
    pub total: i64,
    pub excluded: i64,
    pub target: i64,
    pub completed: i64,
    pub not_started: i64,
    pub in_progress: i64,
    pub ok: i64,
    pub ng: i64,
    pub ok_rate: f64,
    pub progress_rate: f64,
}

#[derive(Default)]
struct Acc {
    total: i64,
    excluded: i64,
    completed: i64,
    not_started: i64,
    in_progress: i64,
    ok: i64,
    ng: i64,
}

/// Groups items by the two classification labels and counts the judgment
/// buckets. Pure function over a committed snapshot; output is ordered by
/// the labels ascending.
pub fn aggregate(inputs: &[ProgressInput]) -> Vec<ProgressRow> {
    let mut groups: BTreeMap<(String, String), Acc> = BTreeMap::new();

    for input in inputs {
        let acc = groups
            .entry((input.first_layer.clone(), input.second_layer.clone()))
            .or_default();
        acc.total += 1;

        if !input.is_target || input.judgment == Some(Judgment::Excluded) {
            acc.excluded += 1;
        }

        // Exhaustive on purpose: a new judgment value must be placed in a
        // bucket here before this compiles.
        match input.judgment {
            Some(Judgment::Ok) | Some(Judgment::ReferenceOk) => {
                acc.completed += 1;
                acc.ok += 1;
            }
            Some(Judgment::Ng) => {
                acc.completed += 1;
                acc.ng += 1;
            }
            Some(Judgment::Untouched) => acc.not_started += 1,
            Some(Judgment::Reserved) | Some(Judgment::QaInProgress) => acc.in_progress += 1,
            Some(Judgment::ReExecutionExcluded) | Some(Judgment::Excluded) => {}
            None => {
                if input.is_target {
                    acc.not_started += 1;
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|((first_layer, second_layer), acc)| {
            let target = acc.total - acc.excluded;
            ProgressRow {
                first_layer,
                second_layer,
                total: acc.total,
                excluded: acc.excluded,
                target,
                completed: acc.completed,
                not_started: acc.not_started,
                in_progress: acc.in_progress,
                ok: acc.ok,
                ng: acc.ng,
                ok_rate: rate(acc.ok, target),
                progress_rate: rate(acc.completed, target),
            }
        })
        .collect()
}

fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
