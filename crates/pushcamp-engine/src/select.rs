//! Target selection pipeline.
//!
//! Four narrowing stages over the directory snapshot, in order: explicit
//! user list, group filter, resume/ignore exclusion, active-status filter.
//! Each stage only ever removes accounts. Group resolution is the one stage
//! that talks to the provider; partial resolution pauses at an operator
//! yes/no continuation point supplied by the caller.

use std::collections::HashSet;

use pushcamp_core::error::{PushCampError, Result};
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::Account;

use crate::lists::UserListEntry;

/// Run-scoped selection inputs, resolved from CLI flags and list files.
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Explicit targets; `None` means "the whole directory".
    pub user_list: Option<Vec<UserListEntry>>,
    /// Group names to filter by; `None` means no group filter.
    pub group_names: Option<Vec<String>>,
    /// Handles to exclude.
    pub ignore: HashSet<String>,
}

/// A selected account plus the device hint stage 1 attached to it.
#[derive(Debug, Clone)]
pub struct Target {
    pub account: Account,
    /// Normalized phone-number hint; `None` means random device choice.
    pub number_hint: Option<String>,
}

/// The operator yes/no continuation point for partial group resolution.
pub type ConfirmFn = dyn Fn(&str) -> bool + Send + Sync;

/// Narrow the directory snapshot down to the accounts this run will process.
pub async fn select_targets(
    accounts: Vec<Account>,
    criteria: &SelectionCriteria,
    resume_handles: &HashSet<String>,
    gateway: &dyn ProviderGateway,
    confirm: &ConfirmFn,
) -> Result<Vec<Target>> {
    // Stage 1: explicit user list.
    let mut targets: Vec<Target> = match &criteria.user_list {
        Some(entries) => {
            let matched: Vec<Target> = accounts
                .into_iter()
                .filter_map(|account| {
                    entries
                        .iter()
                        .find(|e| account.matches_handle(&e.handle))
                        .map(|e| Target { number_hint: e.number_hint.clone(), account })
                })
                .collect();
            if matched.is_empty() {
                return Err(PushCampError::EmptySelection(
                    "no directory accounts matched the provided user list".into(),
                ));
            }
            matched
        }
        None => accounts
            .into_iter()
            .map(|account| Target { account, number_hint: None })
            .collect(),
    };

    // Stage 2: group filter.
    if let Some(names) = &criteria.group_names {
        targets = filter_by_groups(targets, names, gateway, confirm).await?;
    }

    // Stage 3: resume dedup and ignore list.
    targets.retain(|t| {
        let resumed = resume_handles.contains(&t.account.username)
            || resume_handles.contains(&t.account.email)
            || resume_handles.contains(&t.account.account_id);
        if resumed {
            tracing::debug!("{} already in result log, skipping", t.account.username);
            return false;
        }
        let ignored = criteria.ignore.contains(&t.account.username)
            || criteria.ignore.contains(&t.account.email);
        if ignored {
            tracing::debug!("{} is on the ignore list, skipping", t.account.username);
        }
        !ignored
    });

    // Stage 4: only active accounts receive challenges.
    targets.retain(|t| t.account.status.is_active());

    if targets.is_empty() {
        return Err(PushCampError::EmptySelection(
            "no accounts will receive push notifications with the parameters provided".into(),
        ));
    }
    tracing::info!("{} accounts selected", targets.len());
    Ok(targets)
}

async fn filter_by_groups(
    targets: Vec<Target>,
    names: &[String],
    gateway: &dyn ProviderGateway,
    confirm: &ConfirmFn,
) -> Result<Vec<Target>> {
    let requested: Vec<String> = names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    let groups = gateway.list_groups().await?;
    let resolved: Vec<_> = groups
        .iter()
        .filter(|g| requested.iter().any(|r| r == &g.name))
        .collect();

    if resolved.is_empty() {
        return Err(PushCampError::NoSuchGroup(requested.join(", ")));
    }

    if resolved.len() < requested.len() {
        let resolved_names: Vec<&str> = resolved.iter().map(|g| g.name.as_str()).collect();
        let missing: Vec<&str> = requested
            .iter()
            .map(String::as_str)
            .filter(|r| !resolved_names.contains(r))
            .collect();
        let prompt = format!(
            "Groups not found: {}. Continue with {} only?",
            missing.join(", "),
            resolved_names.join(", ")
        );
        if !confirm(&prompt) {
            return Err(PushCampError::Aborted(
                "operator declined partial group selection".into(),
            ));
        }
    }

    // Authoritative membership: explicit member lookups, unioned with the
    // membership names the directory inlined on each account snapshot. A
    // failed member lookup degrades to the inline data.
    let mut member_ids: HashSet<String> = HashSet::new();
    for group in &resolved {
        match gateway.list_group_members(&group.group_id).await {
            Ok(ids) => member_ids.extend(ids),
            Err(e) => tracing::warn!("member lookup for group '{}' failed: {e}", group.name),
        }
    }
    let resolved_names: HashSet<&str> = resolved.iter().map(|g| g.name.as_str()).collect();

    let kept: Vec<Target> = targets
        .into_iter()
        .filter(|t| {
            member_ids.contains(&t.account.account_id)
                || t.account.groups.iter().any(|g| resolved_names.contains(g.as_str()))
        })
        .collect();

    if kept.is_empty() {
        return Err(PushCampError::EmptySelection(format!(
            "no accounts belong to: {}",
            resolved_names.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockGateway, account, account_in_groups, push_device};
    use pushcamp_core::types::{AccountStatus, Group};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_confirm_expected(_: &str) -> bool {
        panic!("confirmation prompt should not be reached");
    }

    fn snapshot() -> Vec<Account> {
        vec![
            account("U1", "ada"),
            account("U2", "bob"),
            account("U3", "carol"),
        ]
    }

    #[tokio::test]
    async fn test_no_criteria_keeps_active_accounts_in_order() {
        let gateway = MockGateway::default();
        let targets = select_targets(
            snapshot(),
            &SelectionCriteria::default(),
            &HashSet::new(),
            &gateway,
            &no_confirm_expected,
        )
        .await
        .unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.account.username.as_str()).collect();
        assert_eq!(names, vec!["ada", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_resume_handles_are_never_reselected() {
        let gateway = MockGateway::default();
        let resume: HashSet<String> = ["bob".to_string()].into();
        let targets = select_targets(
            snapshot(),
            &SelectionCriteria::default(),
            &resume,
            &gateway,
            &no_confirm_expected,
        )
        .await
        .unwrap();
        assert!(targets.iter().all(|t| t.account.username != "bob"));
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn test_ignore_list_matches_email_or_username() {
        let gateway = MockGateway::default();
        let criteria = SelectionCriteria {
            ignore: ["ada@example.com".to_string(), "carol".to_string()].into(),
            ..Default::default()
        };
        let targets =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &no_confirm_expected)
                .await
                .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].account.username, "bob");
    }

    #[tokio::test]
    async fn test_inactive_accounts_are_dropped() {
        let gateway = MockGateway::default();
        let mut accounts = snapshot();
        accounts[1].status = AccountStatus::Other("disabled".into());
        let targets = select_targets(
            accounts,
            &SelectionCriteria::default(),
            &HashSet::new(),
            &gateway,
            &no_confirm_expected,
        )
        .await
        .unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn test_user_list_attaches_hints_and_narrows() {
        let gateway = MockGateway::default();
        let criteria = SelectionCriteria {
            user_list: Some(vec![
                UserListEntry {
                    handle: "ada@example.com".into(),
                    number_hint: Some("+1555000111".into()),
                },
                UserListEntry { handle: "carol".into(), number_hint: None },
            ]),
            ..Default::default()
        };
        let targets =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &no_confirm_expected)
                .await
                .unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].number_hint.as_deref(), Some("+1555000111"));
        assert_eq!(targets[1].number_hint, None);
    }

    #[tokio::test]
    async fn test_user_list_with_zero_matches_is_fatal() {
        let gateway = MockGateway::default();
        let criteria = SelectionCriteria {
            user_list: Some(vec![UserListEntry {
                handle: "nobody@example.com".into(),
                number_hint: None,
            }]),
            ..Default::default()
        };
        let err =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &no_confirm_expected)
                .await;
        assert!(matches!(err, Err(PushCampError::EmptySelection(_))));
    }

    #[tokio::test]
    async fn test_unresolved_groups_are_fatal() {
        let mut gateway = MockGateway::default();
        gateway.groups = vec![Group { group_id: "G1".into(), name: "Sales".into() }];
        let criteria = SelectionCriteria {
            group_names: Some(vec!["Ghosts".into()]),
            ..Default::default()
        };
        let err =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &no_confirm_expected)
                .await;
        assert!(matches!(err, Err(PushCampError::NoSuchGroup(_))));
    }

    #[tokio::test]
    async fn test_partial_group_resolution_requires_confirmation() {
        let mut gateway = MockGateway::default();
        gateway.groups = vec![Group { group_id: "G1".into(), name: "Sales".into() }];
        gateway.members.insert("G1".into(), vec!["U1".into()]);
        let criteria = SelectionCriteria {
            group_names: Some(vec!["Sales".into(), "Ghosts".into()]),
            ..Default::default()
        };

        static PROMPTS: AtomicUsize = AtomicUsize::new(0);
        let accept = |prompt: &str| {
            PROMPTS.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Ghosts"));
            assert!(prompt.contains("Sales"));
            true
        };
        let targets =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &accept)
                .await
                .unwrap();
        assert_eq!(PROMPTS.load(Ordering::SeqCst), 1);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].account.account_id, "U1");

        let decline = |_: &str| false;
        let err =
            select_targets(snapshot(), &criteria, &HashSet::new(), &gateway, &decline).await;
        assert!(matches!(err, Err(PushCampError::Aborted(_))));
    }

    #[tokio::test]
    async fn test_group_filter_uses_inline_memberships_too() {
        let mut gateway = MockGateway::default();
        gateway.groups = vec![Group { group_id: "G1".into(), name: "Sales".into() }];
        // No explicit member lookup data; the snapshot carries the names.
        let accounts = vec![
            account_in_groups("U1", "ada", &["Sales"], vec![push_device("DP1", "+1555000111")]),
            account("U2", "bob"),
        ];
        let criteria = SelectionCriteria {
            group_names: Some(vec!["Sales".into()]),
            ..Default::default()
        };
        let targets =
            select_targets(accounts, &criteria, &HashSet::new(), &gateway, &no_confirm_expected)
                .await
                .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].account.username, "ada");
    }
}
