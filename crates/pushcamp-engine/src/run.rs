//! Campaign orchestration.
//!
//! One pass: fetch the directory snapshot, narrow it to targets, resolve a
//! device per target, then hand everything to the batch scheduler. Fatal
//! errors propagate to the caller before any challenge is issued;
//! per-account failures only ever become result-log rows.

use std::sync::Arc;

use pushcamp_core::config::CampaignConfig;
use pushcamp_core::error::Result;
use pushcamp_core::traits::ProviderGateway;

use crate::directory;
use crate::eligibility;
use crate::results::ResultLog;
use crate::scheduler::{BatchScheduler, CancelFlag, RunStats};
use crate::select::{self, ConfirmFn, SelectionCriteria};

/// Execute one campaign run against the provider.
pub async fn run_campaign(
    config: &CampaignConfig,
    criteria: &SelectionCriteria,
    gateway: Arc<dyn ProviderGateway>,
    log: &mut ResultLog,
    confirm: &ConfirmFn,
    cancel: &CancelFlag,
) -> Result<RunStats> {
    tracing::info!("fetching directory accounts");
    let accounts = directory::fetch_all_accounts(gateway.as_ref()).await?;

    let targets =
        select::select_targets(accounts, criteria, log.handles(), gateway.as_ref(), confirm)
            .await?;

    let plans = eligibility::resolve_eligibility(targets, gateway.as_ref()).await;
    if plans.is_empty() {
        return Err(pushcamp_core::PushCampError::EmptySelection(
            "no accounts are dispatchable with the parameters provided".into(),
        ));
    }

    tracing::info!("dispatching challenges to {} accounts", plans.len());
    BatchScheduler::from_config(config).run(plans, gateway, log, cancel).await
}
