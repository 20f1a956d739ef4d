//! The `ProviderGateway` contract.
//!
//! The engine never speaks the provider's wire protocol; it depends on this
//! trait only. The Duo-compatible implementation lives in
//! `pushcamp-providers`, and tests script their own in-memory gateway.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Account, ChallengeResponse, Device, Group};

/// Directory and challenge operations against the identity provider.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Fetch one page of the account directory. An empty page means the
    /// traversal is complete.
    async fn list_accounts(&self, offset: u64, limit: u64) -> Result<Vec<Account>>;

    /// All groups known to the directory.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Account ids belonging to a group.
    async fn list_group_members(&self, group_id: &str) -> Result<Vec<String>>;

    /// Devices registered to an account. Only needed when the account
    /// snapshot did not inline them.
    async fn list_devices(&self, account_id: &str) -> Result<Vec<Device>>;

    /// Issue one push challenge to one device. Synchronous from the caller's
    /// perspective: the response carries the user's answer or a timeout.
    async fn send_push_challenge(
        &self,
        account_id: &str,
        device_id: &str,
        push_text: &str,
    ) -> Result<ChallengeResponse>;
}
