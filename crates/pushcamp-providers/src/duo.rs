//! Duo-compatible REST gateway.
//!
//! Speaks the Admin v1 API for directory reads and the Auth v2 API for push
//! challenges. Every request is signed: HMAC-SHA512 over the canonical
//! request (date, method, host, path, sorted params), sent as HTTP Basic
//! auth with the integration key as the user and the hex signature as the
//! password. Wire shapes are validated here and converted to typed snapshot
//! values; nothing dict-shaped escapes this module.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use pushcamp_core::config::ApiCredentials;
use pushcamp_core::error::{PushCampError, Result};
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::{Account, AccountStatus, ChallengeResponse, Device, Group};

const USERS_PATH: &str = "/admin/v1/users";
const GROUPS_PATH: &str = "/admin/v1/groups";
const AUTH_PATH: &str = "/auth/v2/auth";

/// Gateway backed by a Duo-compatible REST endpoint.
pub struct DuoGateway {
    host: String,
    admin: ApiCredentials,
    auth: ApiCredentials,
    client: reqwest::Client,
}

impl DuoGateway {
    pub fn new(host: &str, admin: ApiCredentials, auth: ApiCredentials) -> Result<Self> {
        if host.is_empty() {
            return Err(PushCampError::Config("provider host must not be empty".into()));
        }
        if admin.is_empty() {
            return Err(PushCampError::Credentials(
                "admin integration key and secret key are required".into(),
            ));
        }
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            admin,
            auth,
            client: reqwest::Client::new(),
        })
    }

    /// Signed call returning the `response` field of the Duo envelope.
    async fn call(
        &self,
        creds: &ApiCredentials,
        method: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let date = Utc::now().to_rfc2822();
        let query = canon_params(params);
        let signature = sign_request(creds, &date, method, &self.host, path, &query);
        let basic = BASE64.encode(format!("{}:{}", creds.ikey, signature));

        let url = if method == "GET" && !query.is_empty() {
            format!("https://{}{}?{}", self.host, path, query)
        } else {
            format!("https://{}{}", self.host, path)
        };

        let mut req = self
            .client
            .request(method.parse().unwrap_or(reqwest::Method::GET), &url)
            .header("Date", &date)
            .header("Authorization", format!("Basic {basic}"));
        if method == "POST" {
            req = req
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(query);
        }

        tracing::debug!("{method} https://{}{path}", self.host);
        let resp = req
            .send()
            .await
            .map_err(|e| PushCampError::Http(format!("{} {path} failed: {e}", self.host)))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PushCampError::Http(format!("{path} returned non-JSON ({status}): {e}")))?;
        unwrap_envelope(path, status.as_u16(), body)
    }
}

#[async_trait]
impl ProviderGateway for DuoGateway {
    async fn list_accounts(&self, offset: u64, limit: u64) -> Result<Vec<Account>> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let response = self
            .call(
                &self.admin,
                "GET",
                USERS_PATH,
                &[("limit", &limit), ("offset", &offset)],
            )
            .await?;
        parse_accounts(&response)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let response = self.call(&self.admin, "GET", GROUPS_PATH, &[]).await?;
        parse_groups(&response)
    }

    async fn list_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        let path = format!("{GROUPS_PATH}/{group_id}/users");
        let response = self.call(&self.admin, "GET", &path, &[]).await?;
        let members = response
            .as_array()
            .ok_or_else(|| PushCampError::Provider(format!("{path}: expected an array")))?
            .iter()
            .filter_map(|u| u["user_id"].as_str().map(String::from))
            .collect();
        Ok(members)
    }

    async fn list_devices(&self, account_id: &str) -> Result<Vec<Device>> {
        let path = format!("{USERS_PATH}/{account_id}/phones");
        let response = self.call(&self.admin, "GET", &path, &[]).await?;
        let raw: Vec<RawPhone> = serde_json::from_value(response)
            .map_err(|e| PushCampError::Provider(format!("{path}: bad phone shape: {e}")))?;
        Ok(raw.into_iter().map(RawPhone::into_device).collect())
    }

    async fn send_push_challenge(
        &self,
        account_id: &str,
        device_id: &str,
        push_text: &str,
    ) -> Result<ChallengeResponse> {
        if self.auth.is_empty() {
            return Err(PushCampError::Credentials(
                "auth integration key and secret key are required to send challenges".into(),
            ));
        }
        let response = self
            .call(
                &self.auth,
                "POST",
                AUTH_PATH,
                &[
                    ("device", device_id),
                    ("factor", "push"),
                    ("type", push_text),
                    ("user_id", account_id),
                ],
            )
            .await?;
        Ok(ChallengeResponse {
            result: response["result"].as_str().unwrap_or_default().to_string(),
            status: response["status"].as_str().unwrap_or_default().to_string(),
            status_msg: response["status_msg"].as_str().unwrap_or_default().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUser {
    user_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    phones: Vec<RawPhone>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default)]
    group_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawPhone {
    phone_id: String,
    #[serde(default)]
    number: String,
    #[serde(default)]
    activated: bool,
    #[serde(default)]
    capabilities: Vec<String>,
}

impl RawPhone {
    fn into_device(self) -> Device {
        Device {
            device_id: self.phone_id,
            number: self.number,
            activated: self.activated,
            capabilities: self.capabilities,
        }
    }
}

fn parse_accounts(response: &Value) -> Result<Vec<Account>> {
    let raw: Vec<RawUser> = serde_json::from_value(response.clone())
        .map_err(|e| PushCampError::Provider(format!("{USERS_PATH}: bad user shape: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|u| Account {
            status: AccountStatus::from_raw(&u.status),
            groups: u.groups.into_iter().map(|g| g.name).collect(),
            devices: u.phones.into_iter().map(RawPhone::into_device).collect(),
            account_id: u.user_id,
            username: u.username,
            email: u.email,
        })
        .collect())
}

fn parse_groups(response: &Value) -> Result<Vec<Group>> {
    let raw: Vec<RawGroup> = serde_json::from_value(response.clone())
        .map_err(|e| PushCampError::Provider(format!("{GROUPS_PATH}: bad group shape: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|g| Group { group_id: g.group_id, name: g.name })
        .collect())
}

/// Check the `{"stat": ..., "response": ...}` envelope and extract `response`.
fn unwrap_envelope(path: &str, http_status: u16, body: Value) -> Result<Value> {
    match body["stat"].as_str() {
        Some("OK") => Ok(body["response"].clone()),
        Some(_) => {
            let code = body["code"].as_u64().unwrap_or(http_status as u64);
            let message = body["message"].as_str().unwrap_or("unknown error");
            let detail = body["message_detail"].as_str().unwrap_or_default();
            Err(PushCampError::Provider(format!("{path}: {code} {message} {detail}").trim_end().to_string()))
        }
        None => Err(PushCampError::Provider(format!(
            "{path}: missing stat field (HTTP {http_status})"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Request signing
// ---------------------------------------------------------------------------

/// RFC 3986 percent-encoding over UTF-8 bytes.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Sorted, encoded `k=v&...` string used both as payload and in the
/// canonical request, so the signature always matches what is sent.
fn canon_params(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded.join("&")
}

fn sign_request(
    creds: &ApiCredentials,
    date: &str,
    method: &str,
    host: &str,
    path: &str,
    query: &str,
) -> String {
    let canon = format!(
        "{date}\n{}\n{}\n{path}\n{query}",
        method.to_uppercase(),
        host.to_lowercase()
    );
    let mut mac = Hmac::<Sha512>::new_from_slice(creds.skey.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(canon.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .fold(String::with_capacity(128), |mut acc, b| {
            acc.push_str(&format!("{b:02x}"));
            acc
        })
}
