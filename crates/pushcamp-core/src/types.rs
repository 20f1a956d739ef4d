//! Directory snapshot types and challenge outcomes.
//!
//! `Account` and `Device` are read-only snapshots fetched once per run.
//! Gateway implementations validate the provider's wire shapes at their own
//! boundary and hand these typed values to the engine.

use chrono::{DateTime, Utc};

/// Capability tag a device must carry to receive a push.
pub const PUSH_CAPABILITY: &str = "push";

/// Membership status of a directory account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    /// Any non-active state (disabled, bypass, locked out, ...).
    Other(String),
}

impl AccountStatus {
    pub fn from_raw(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("active") {
            AccountStatus::Active
        } else {
            AccountStatus::Other(raw.to_string())
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// A phone/authenticator entry attached to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device_id: String,
    /// Phone number as the directory stores it, country code prefix included.
    pub number: String,
    pub activated: bool,
    pub capabilities: Vec<String>,
}

impl Device {
    /// Push-eligible iff activated and the capability set contains "push".
    pub fn push_capable(&self) -> bool {
        self.activated && self.capabilities.iter().any(|c| c == PUSH_CAPABILITY)
    }
}

/// A directory identity eligible to receive push challenges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub username: String,
    pub email: String,
    pub status: AccountStatus,
    /// Group membership names, as inlined by the directory (may be empty).
    pub groups: Vec<String>,
    pub devices: Vec<Device>,
}

impl Account {
    /// True when `needle` names this account by either handle form.
    pub fn matches_handle(&self, needle: &str) -> bool {
        needle == self.username || needle == self.email
    }
}

/// A directory group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub group_id: String,
    pub name: String,
}

/// Raw provider answer to a single push challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    /// "allow" / "deny" / empty on transport failure.
    pub result: String,
    /// Finer status: "allow", "deny", "timeout", "fraud", "locked_out", ...
    pub status: String,
    pub status_msg: String,
}

/// Terminal classification of a challenge (or skip) for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    Denied,
    TimedOut,
    LockedOut,
    FraudFlagged,
    /// No push-eligible device; never reached the provider.
    Unreachable,
    /// Transport or provider failure on the challenge call itself.
    ProviderError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::TimedOut => "timed_out",
            Outcome::LockedOut => "locked_out",
            Outcome::FraudFlagged => "fraud_flagged",
            Outcome::Unreachable => "unreachable",
            Outcome::ProviderError => "provider_error",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal, immutable result of one account's challenge loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub outcome: Outcome,
    pub result: String,
    pub status: String,
    pub status_msg: String,
    pub completed_at: DateTime<Utc>,
}

impl ChallengeOutcome {
    /// Synthetic outcome for an account that never reached the provider.
    pub fn unreachable(message: &str) -> Self {
        Self {
            outcome: Outcome::Unreachable,
            result: String::new(),
            status: String::new(),
            status_msg: message.to_string(),
            completed_at: Utc::now(),
        }
    }
}
