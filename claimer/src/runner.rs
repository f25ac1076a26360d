//! One complete claim run: sign in, claim, record, tear down.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::ClaimConfig;
use crate::credentials::{Credentials, Prompter};
use crate::direct::claim_direct_offers;
use crate::driver::PageDriver;
use crate::errors::ClaimError;
use crate::evidence::EvidenceDir;
use crate::external::claim_external_offers;
use crate::ledger::{Ledger, LedgerDocument};
use crate::migrate::migrate;
use crate::page::Page;
use crate::session::SessionBootstrapper;
use crate::utils::datetime;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub account: String,
    pub direct_claimed: usize,
    pub external_processed: usize,
    /// External offers that need the game account linked by hand
    pub link_required: Vec<String>,
}

/// Runs the whole claim flow on `driver`.
///
/// The ledger is written and the browser closed exactly once whether the
/// flow succeeds or fails; a flow failure takes precedence over a failure to
/// write the ledger when both happen.
#[instrument(skip_all)]
pub async fn run(
    driver: Arc<dyn PageDriver>,
    config: &ClaimConfig,
    prompter: Arc<dyn Prompter>,
) -> Result<RunSummary, ClaimError> {
    let page = Page::new(driver, config.operation_timeout());
    let mut ledger = match Ledger::load(config.ledger_path()).await {
        Ok(ledger) => ledger,
        Err(e) => {
            close(&page).await;
            return Err(e);
        }
    };

    let credentials = Credentials::new(config, prompter);
    let result = claim_all(&page, config, credentials, &mut ledger.data).await;
    if let Err(e) = &result {
        error!("Claim run failed: {}", e);
    }

    let flushed = ledger.write().await;
    close(&page).await;

    let summary = result?;
    flushed?;
    Ok(summary)
}

async fn close(page: &Page) {
    if let Err(e) = page.close().await {
        warn!("Closing the browser failed: {}", e);
    }
}

async fn claim_all(
    page: &Page,
    config: &ClaimConfig,
    credentials: Credentials,
    ledger: &mut LedgerDocument,
) -> Result<RunSummary, ClaimError> {
    let account = SessionBootstrapper::new(page, config, credentials)
        .establish()
        .await?;
    migrate(ledger, &account.name);
    let bucket = ledger.bucket_mut(&account.name);

    let evidence = EvidenceDir::new(config.screenshots_dir());
    let direct_claimed = claim_direct_offers(page, bucket, &evidence, config.dry_run).await?;
    let external = claim_external_offers(page, bucket, &evidence, config.dry_run).await?;

    evidence
        .capture(page.screenshot(true), evidence.run_path(&datetime()))
        .await;

    info!(
        account = %account.name,
        direct_claimed,
        external_processed = external.processed,
        "Claim run finished"
    );
    Ok(RunSummary {
        account: account.name,
        direct_claimed,
        external_processed: external.processed,
        link_required: external.link_required,
    })
}
