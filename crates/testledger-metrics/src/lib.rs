pub mod forecast;
pub mod progress;

use chrono::NaiveDate;
use testledger_core::auth::AccessGate;
use testledger_core::errors::LedgerError;
use testledger_core::storage::Store;
use tracing::debug;

/// Progress rollup for a whole group, straight off a committed snapshot.
pub fn progress_for_group(
    store: &Store,
    gate: &dyn AccessGate,
    user: &str,
    group_id: i64,
) -> anyhow::Result<Vec<progress::ProgressRow>> {
    if !gate.can_view(user, group_id) {
        return Err(LedgerError::permission().into());
    }
    let inputs = store.progress_inputs(group_id)?;
    debug!(group_id, items = inputs.len(), "aggregating progress");
    Ok(progress::aggregate(&inputs))
}

/// Forecast series for a whole group. Requires a planned campaign; a group
/// with no recorded history produces an empty series, not an error.
pub fn forecast_for_group(
    store: &Store,
    gate: &dyn AccessGate,
    user: &str,
    group_id: i64,
    as_of: NaiveDate,
) -> anyhow::Result<forecast::ForecastReport> {
    if !gate.can_view(user, group_id) {
        return Err(LedgerError::permission().into());
    }
    let campaign = store.campaign(group_id)?.ok_or_else(|| {
        LedgerError::validation(format!("group {} has no planned campaign", group_id))
    })?;
    let log = store.execution_log(group_id)?;
    let rollups = forecast::daily_rollups(&log);
    let total_target_items = store.total_target_items(group_id)?;
    debug!(group_id, days = rollups.len(), "fitting forecast");
    Ok(forecast::forecast_series(
        &rollups,
        &campaign,
        total_target_items,
        as_of,
    ))
}
