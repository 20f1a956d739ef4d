//! Batch scheduler.
//!
//! Coordinator loop: Filling → Dispatching → Pacing, repeated until the
//! queue drains. Each batch gets a fresh worker pool of at most
//! `batch_size` concurrent challenge loops, fully joined before the batch's
//! rows are appended to the result log as a unit. The inter-batch wait only
//! protects the provider from bursts, so a batch that dispatched nothing
//! (all synthetic unreachable) skips it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pushcamp_core::config::CampaignConfig;
use pushcamp_core::error::Result;
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::{ChallengeOutcome, Outcome};
use tokio::sync::Notify;
use tokio::task::JoinSet;

use crate::eligibility::DispatchPlan;
use crate::results::{ResultLog, ResultRow};
use crate::retry::{self, RetryPolicy};

/// Cooperative cancellation shared between the coordinator, the workers,
/// and the signal handler. Cancelling also wakes any task parked in
/// [`CancelFlag::sleep`], so the long pacing and intra-user waits end
/// immediately instead of running out their full duration.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    wakeup: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.wakeup.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early when the flag is cancelled.
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.0.wakeup.notified();
        tokio::pin!(notified);
        // Register before the flag check so a cancel landing in between
        // still wakes the select below.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

/// Totals for one campaign run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Batches that reached the Dispatching state.
    pub batches: usize,
    /// Accounts handed to challenge workers (as opposed to synthetic rows).
    pub dispatched: usize,
    /// Rows appended to the result log, synthetic ones included.
    pub rows: usize,
    pub outcomes: HashMap<Outcome, usize>,
    /// True when the run stopped early on operator interrupt.
    pub interrupted: bool,
}

impl RunStats {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    fn tally(&mut self, rows: &[ResultRow]) {
        self.rows += rows.len();
        for row in rows {
            // Row results are our own outcome tags; anything else counts as
            // a provider error bucket.
            let outcome = [
                Outcome::Allowed,
                Outcome::Denied,
                Outcome::TimedOut,
                Outcome::LockedOut,
                Outcome::FraudFlagged,
                Outcome::Unreachable,
                Outcome::ProviderError,
            ]
            .into_iter()
            .find(|o| o.as_str() == row.result)
            .unwrap_or(Outcome::ProviderError);
            *self.outcomes.entry(outcome).or_insert(0) += 1;
        }
    }
}

/// Drives the batch loop for one campaign run.
pub struct BatchScheduler {
    batch_size: usize,
    batch_wait: Duration,
    policy: RetryPolicy,
    push_text: String,
}

impl BatchScheduler {
    pub fn from_config(config: &CampaignConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_wait: config.batch_wait(),
            policy: RetryPolicy { attempts: config.retry_count.max(1), wait: config.retry_wait() },
            push_text: config.push_text.clone(),
        }
    }

    /// Run every plan to completion, appending each batch's outcomes to the
    /// log before pacing. Returns totals; an interrupt leaves already
    /// appended rows valid and resumable.
    pub async fn run(
        &self,
        plans: Vec<DispatchPlan>,
        gateway: Arc<dyn ProviderGateway>,
        log: &mut ResultLog,
        cancel: &CancelFlag,
    ) -> Result<RunStats> {
        let mut queue: VecDeque<DispatchPlan> = plans.into();
        let mut stats = RunStats::default();

        while !queue.is_empty() {
            if cancel.is_cancelled() {
                tracing::info!("interrupt received, stopping before the next batch");
                stats.interrupted = true;
                break;
            }

            // Filling: pop up to batch_size accounts.
            let batch: Vec<DispatchPlan> = {
                let take = self.batch_size.min(queue.len());
                queue.drain(..take).collect()
            };
            stats.batches += 1;
            tracing::info!(
                "batch {}: {} accounts ({} remaining)",
                stats.batches,
                batch.len(),
                queue.len()
            );

            // Dispatching: fresh pool per batch, joined to completion.
            let mut rows: Vec<ResultRow> = Vec::with_capacity(batch.len());
            let mut pool: JoinSet<Option<ResultRow>> = JoinSet::new();
            let mut dispatched = 0usize;

            for plan in batch {
                match plan.device {
                    None => {
                        let outcome = ChallengeOutcome::unreachable("Unable to push notification");
                        rows.push(ResultRow::from_outcome(&plan.account, &outcome));
                    }
                    Some(device) => {
                        dispatched += 1;
                        let gateway = Arc::clone(&gateway);
                        let cancel = cancel.clone();
                        let policy = self.policy.clone();
                        let push_text = self.push_text.clone();
                        let account = plan.account;
                        pool.spawn(async move {
                            retry::run_challenge_loop(
                                gateway.as_ref(),
                                &account,
                                &device,
                                &push_text,
                                &policy,
                                &cancel,
                            )
                            .await
                            .map(|outcome| ResultRow::from_outcome(&account, &outcome))
                        });
                    }
                }
            }
            stats.dispatched += dispatched;

            // Rows land in completion order within the batch. A `None` means
            // the interrupt beat the worker to its first attempt; the account
            // was never challenged and stays eligible for a resumed run.
            while let Some(joined) = pool.join_next().await {
                match joined {
                    Ok(Some(row)) => rows.push(row),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("challenge worker failed: {e}"),
                }
            }

            stats.tally(&rows);
            log.append_rows(&rows)?;

            // Pacing: protects the provider from bursts, so an all-skip
            // batch (zero provider calls) does not wait. An interrupt cuts
            // the wait short; the loop head then stops the run.
            if !queue.is_empty() && dispatched > 0 && !cancel.is_cancelled() {
                tracing::info!("waiting {}s until next batch", self.batch_wait.as_secs());
                cancel.sleep(self.batch_wait).await;
            }
        }

        if cancel.is_cancelled() {
            stats.interrupted = true;
        }
        Ok(stats)
    }
}
