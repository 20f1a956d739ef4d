//! Per-account challenge retry loop.
//!
//! Bounded by the configured attempt budget. Transport failures are never
//! retried (a retry against a misbehaving endpoint risks duplicate pushes),
//! and fraud / lockout / allow all terminate immediately regardless of the
//! remaining budget. Only deny and timeout consume further attempts.

use std::time::Duration;

use chrono::Utc;
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::{Account, ChallengeOutcome, ChallengeResponse, Device, Outcome};

use crate::scheduler::CancelFlag;

/// Lockouts sometimes surface as deny/timeout with this status message
/// instead of a "locked_out" status.
pub const DISABLED_STATUS_MSG: &str = "Your account is disabled";

/// Attempt budget and intra-user pacing for one account's loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub wait: Duration,
}

enum Verdict {
    Terminal(Outcome),
    Retry(Outcome),
}

fn classify(resp: &ChallengeResponse) -> Verdict {
    if resp.status == "fraud" {
        return Verdict::Terminal(Outcome::FraudFlagged);
    }
    if resp.status == "locked_out" || resp.status_msg.contains(DISABLED_STATUS_MSG) {
        return Verdict::Terminal(Outcome::LockedOut);
    }
    if resp.result == "allow" {
        return Verdict::Terminal(Outcome::Allowed);
    }
    if resp.status == "timeout" {
        Verdict::Retry(Outcome::TimedOut)
    } else {
        Verdict::Retry(Outcome::Denied)
    }
}

fn finish(outcome: Outcome, resp: ChallengeResponse) -> ChallengeOutcome {
    ChallengeOutcome {
        outcome,
        result: resp.result,
        status: resp.status,
        status_msg: resp.status_msg,
        completed_at: Utc::now(),
    }
}

/// Drive one account to a terminal outcome. Returns `None` only when an
/// interrupt landed before the first attempt was issued; the account then
/// has no outcome and stays eligible for a resumed run. Every other path
/// produces exactly one outcome, including provider failure.
pub async fn run_challenge_loop(
    gateway: &dyn ProviderGateway,
    account: &Account,
    device: &Device,
    push_text: &str,
    policy: &RetryPolicy,
    cancel: &CancelFlag,
) -> Option<ChallengeOutcome> {
    // A zero-attempt policy still means one attempt.
    let attempts = policy.attempts.max(1);
    let mut last: Option<(Outcome, ChallengeResponse)> = None;

    for attempt in 1..=attempts {
        // The in-flight attempt is allowed to finish after an interrupt;
        // a new one is never started.
        if cancel.is_cancelled() {
            break;
        }

        let resp = match gateway
            .send_push_challenge(&account.account_id, &device.device_id, push_text)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(
                    "challenge call for {} failed on attempt {attempt}: {e}",
                    account.username
                );
                return Some(finish(
                    Outcome::ProviderError,
                    ChallengeResponse {
                        result: String::new(),
                        status: "invalid_request".into(),
                        status_msg: format!("unable to issue challenge: {e}"),
                    },
                ));
            }
        };

        match classify(&resp) {
            Verdict::Terminal(outcome) => {
                tracing::info!("{}: {} on attempt {attempt}", account.username, outcome);
                return Some(finish(outcome, resp));
            }
            Verdict::Retry(outcome) => {
                tracing::debug!(
                    "{}: {} on attempt {attempt}/{attempts}",
                    account.username,
                    outcome,
                );
                last = Some((outcome, resp));
                if attempt == attempts {
                    break;
                }
                cancel.sleep(policy.wait).await;
            }
        }
    }

    last.map(|(outcome, resp)| finish(outcome, resp))
}
