//! Paginated directory snapshot fetch.
//!
//! An empty page ends the traversal. A page fetch that fails ends the
//! traversal too — partial directory data is still actionable — but
//! retrieving nothing at all is fatal.

use pushcamp_core::error::{PushCampError, Result};
use pushcamp_core::traits::ProviderGateway;
use pushcamp_core::types::Account;

const PAGE_SIZE: u64 = 300;

/// Fetch the full account snapshot for this run.
pub async fn fetch_all_accounts(gateway: &dyn ProviderGateway) -> Result<Vec<Account>> {
    let mut accounts: Vec<Account> = Vec::new();
    let mut offset = 0u64;

    loop {
        match gateway.list_accounts(offset, PAGE_SIZE).await {
            Ok(page) if page.is_empty() => break,
            Ok(page) => {
                offset += page.len() as u64;
                accounts.extend(page);
            }
            Err(e) => {
                tracing::warn!(
                    "directory fetch stopped at offset {offset}, continuing with {} accounts: {e}",
                    accounts.len()
                );
                break;
            }
        }
    }

    if accounts.is_empty() {
        return Err(PushCampError::EmptySelection(
            "no accounts retrieved from the directory".into(),
        ));
    }
    tracing::info!("retrieved {} directory accounts", accounts.len());
    Ok(accounts)
}
