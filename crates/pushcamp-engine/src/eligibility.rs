//! Push-eligibility resolution and device selection.
//!
//! For each selected account, compute the push-capable device subset and
//! pick exactly one device, honoring any operator hint. A mismatched hint
//! drops the account outright rather than paging a number the operator did
//! not intend; an account with no capable device stays in the queue so the
//! scheduler can record a synthetic `unreachable` outcome for it.

use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::{Account, Device};
use rand::seq::SliceRandom;

use crate::lists::normalize_number;
use crate::select::Target;

/// One account headed for the scheduler. `device: None` marks an account
/// with nothing to push to; it produces a synthetic outcome, not a call.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub account: Account,
    pub device: Option<Device>,
}

/// Map selected targets to dispatch plans, preserving order.
pub async fn resolve_eligibility(
    targets: Vec<Target>,
    gateway: &dyn ProviderGateway,
) -> Vec<DispatchPlan> {
    let mut plans = Vec::with_capacity(targets.len());

    for target in targets {
        let Target { mut account, number_hint } = target;

        // Snapshots from some directories omit devices; refresh once before
        // declaring the account unreachable.
        if account.devices.is_empty() {
            match gateway.list_devices(&account.account_id).await {
                Ok(devices) => account.devices = devices,
                Err(e) => {
                    tracing::warn!("device lookup for {} failed: {e}", account.username)
                }
            }
        }

        let eligible: Vec<Device> =
            account.devices.iter().filter(|d| d.push_capable()).cloned().collect();

        if eligible.is_empty() {
            tracing::warn!(
                "no push-capable device for {}, will be recorded as unreachable",
                account.username
            );
            plans.push(DispatchPlan { account, device: None });
            continue;
        }

        let selected = match &number_hint {
            Some(hint) => {
                match eligible.iter().find(|d| normalize_number(&d.number) == *hint) {
                    Some(device) => device.clone(),
                    None => {
                        // Never fall back silently: a wrong number must not be paged.
                        tracing::warn!(
                            "provided number for {} matches no push-capable device, skipping",
                            account.username
                        );
                        continue;
                    }
                }
            }
            None => eligible
                .choose(&mut rand::thread_rng())
                .cloned()
                .expect("eligible set is non-empty"),
        };

        plans.push(DispatchPlan { account, device: Some(selected) });
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockGateway, account, account_with_devices, device, push_device};

    fn target(account: Account, hint: Option<&str>) -> Target {
        Target { account, number_hint: hint.map(String::from) }
    }

    fn two_device_account() -> Account {
        account_with_devices(
            "U1",
            "ada",
            vec![
                push_device("DP1", "+1555000111"),
                device("DP2", "+1555000222", true, &["sms"]),
            ],
        )
    }

    #[tokio::test]
    async fn test_hint_selects_exact_eligible_device() {
        let gateway = MockGateway::default();
        let plans =
            resolve_eligibility(vec![target(two_device_account(), Some("+1555000111"))], &gateway)
                .await;
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].device.as_ref().unwrap().device_id, "DP1");
    }

    #[tokio::test]
    async fn test_mismatched_hint_skips_account_entirely() {
        let gateway = MockGateway::default();
        let plans =
            resolve_eligibility(vec![target(two_device_account(), Some("+1555000999"))], &gateway)
                .await;
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn test_hint_matching_only_non_eligible_device_skips() {
        // DP2 carries the number but has no push capability; exact-match
        // applies to the eligible subset only.
        let gateway = MockGateway::default();
        let plans =
            resolve_eligibility(vec![target(two_device_account(), Some("+1555000222"))], &gateway)
                .await;
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn test_no_devices_becomes_synthetic_plan() {
        let gateway = MockGateway::default();
        let plans = resolve_eligibility(vec![target(account("U2", "bob"), None)], &gateway).await;
        assert_eq!(plans.len(), 1);
        assert!(plans[0].device.is_none());
    }

    #[tokio::test]
    async fn test_random_choice_is_among_eligible_only() {
        let gateway = MockGateway::default();
        for _ in 0..20 {
            let plans =
                resolve_eligibility(vec![target(two_device_account(), None)], &gateway).await;
            assert_eq!(plans[0].device.as_ref().unwrap().device_id, "DP1");
        }
    }

    #[tokio::test]
    async fn test_empty_snapshot_refreshes_via_gateway() {
        let mut gateway = MockGateway::default();
        gateway
            .devices
            .insert("U3".into(), vec![push_device("DP9", "+1555000333")]);
        let plans = resolve_eligibility(vec![target(account("U3", "carol"), None)], &gateway).await;
        assert_eq!(plans[0].device.as_ref().unwrap().device_id, "DP9");
    }
}
