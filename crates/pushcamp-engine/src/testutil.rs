//! Shared test fixtures: a scriptable in-memory gateway and snapshot builders.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pushcamp_core::error::{PushCampError, Result};
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::{
    Account, AccountStatus, ChallengeResponse, Device, Group,
};

pub fn device(id: &str, number: &str, activated: bool, caps: &[&str]) -> Device {
    Device {
        device_id: id.into(),
        number: number.into(),
        activated,
        capabilities: caps.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn push_device(id: &str, number: &str) -> Device {
    device(id, number, true, &["push", "sms"])
}

pub fn account(id: &str, username: &str) -> Account {
    account_with_devices(id, username, vec![])
}

pub fn account_with_devices(id: &str, username: &str, devices: Vec<Device>) -> Account {
    account_in_groups(id, username, &[], devices)
}

pub fn account_in_groups(id: &str, username: &str, groups: &[&str], devices: Vec<Device>) -> Account {
    Account {
        account_id: id.into(),
        username: username.into(),
        email: format!("{username}@example.com"),
        status: AccountStatus::Active,
        groups: groups.iter().map(|g| g.to_string()).collect(),
        devices,
    }
}

pub fn resp(result: &str, status: &str, msg: &str) -> ChallengeResponse {
    ChallengeResponse { result: result.into(), status: status.into(), status_msg: msg.into() }
}

/// In-memory gateway with scripted challenge responses and concurrency
/// accounting for the dispatch-boundedness property.
pub struct MockGateway {
    pub accounts: Vec<Account>,
    /// Fail `list_accounts` for any offset at or past this value.
    pub fail_accounts_at_offset: Option<u64>,
    pub groups: Vec<Group>,
    pub members: HashMap<String, Vec<String>>,
    pub devices: HashMap<String, Vec<Device>>,
    /// Returned when no script is queued for the account.
    pub default_response: ChallengeResponse,
    /// Artificial latency per challenge call, to force worker overlap.
    pub push_delay: Duration,
    pub push_calls: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    pages_served: AtomicUsize,
    scripts: Mutex<HashMap<String, VecDeque<Result<ChallengeResponse>>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            fail_accounts_at_offset: None,
            groups: Vec::new(),
            members: HashMap::new(),
            devices: HashMap::new(),
            default_response: resp("allow", "allow", "Success. Logging you in..."),
            push_delay: Duration::ZERO,
            push_calls: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            pages_served: AtomicUsize::new(0),
            scripts: Mutex::new(HashMap::new()),
        }
    }
}

impl MockGateway {
    /// Queue the next challenge response for an account.
    pub fn script(&self, account_id: &str, response: Result<ChallengeResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(account_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn account_pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    async fn list_accounts(&self, offset: u64, limit: u64) -> Result<Vec<Account>> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        if let Some(fail_at) = self.fail_accounts_at_offset
            && offset >= fail_at
        {
            return Err(PushCampError::Provider("simulated page failure".into()));
        }
        let start = (offset as usize).min(self.accounts.len());
        let end = (start + limit as usize).min(self.accounts.len());
        Ok(self.accounts[start..end].to_vec())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.clone())
    }

    async fn list_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        Ok(self.members.get(group_id).cloned().unwrap_or_default())
    }

    async fn list_devices(&self, account_id: &str) -> Result<Vec<Device>> {
        Ok(self.devices.get(account_id).cloned().unwrap_or_default())
    }

    async fn send_push_challenge(
        &self,
        account_id: &str,
        _device_id: &str,
        _push_text: &str,
    ) -> Result<ChallengeResponse> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if self.push_delay > Duration::ZERO {
            tokio::time::sleep(self.push_delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(account_id)
            .and_then(|queue| queue.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match scripted {
            Some(response) => response,
            None => Ok(self.default_response.clone()),
        }
    }
}
