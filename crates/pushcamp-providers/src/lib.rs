//! # Pushcamp Providers
//!
//! `ProviderGateway` implementations. Currently one backend: the Duo
//! Admin v1 / Auth v2 REST API with HMAC-signed requests. The engine only
//! ever sees the trait, so further backends slot in here.

pub mod duo;

use pushcamp_core::config::ApiCredentials;
use pushcamp_core::error::Result;
use pushcamp_core::traits::ProviderGateway;

/// Create the gateway for a target host.
///
/// `admin` signs directory reads; `auth` signs challenge calls. The auth
/// pair may be empty for directory-only modes such as group listing, in
/// which case any challenge call fails with a credentials error.
pub fn create_gateway(
    host: &str,
    admin: ApiCredentials,
    auth: ApiCredentials,
) -> Result<Box<dyn ProviderGateway>> {
    Ok(Box::new(duo::DuoGateway::new(host, admin, auth)?))
}
