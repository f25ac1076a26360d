//! Offers fulfilled on a third-party store.
//!
//! Claiming one of these navigates away and removes the card from the list,
//! so the list is queried again after every claim instead of being walked
//! from a snapshot.

use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::direct::{open_game_offers, CARD_TITLE};
use crate::driver::ElementHandle;
use crate::errors::ClaimError;
use crate::evidence::EvidenceDir;
use crate::ledger::{AccountBucket, ClaimRecord};
use crate::offer::{Offer, OfferKind};
use crate::page::{outcome, race, Page};
use crate::session::URL_CLAIM;

pub(crate) const EXTERNAL_CARD: &str =
    r#"div[data-a-target="offer-list-FGWP_FULL"] >> [data-a-target="item-card"]:has(p:text-is("Claim"))"#;
pub(crate) const CLAIM_TEXT: &str = "text=Claim";
pub(crate) const CLAIM_NOW: &str = r#"button:has-text("Claim now")"#;
pub(crate) const COMPLETE_CLAIM: &str = r#"button:has-text("Complete Claim")"#;
pub(crate) const LINK_ACCOUNT: &str = r#"div:has-text("Link game account")"#;
pub(crate) const STORE_SUBTITLE: &str = r#"[data-a-target="hero-header-subtitle"]"#;
pub(crate) const CODE_INPUT: &str = r#"input[type="text"]"#;
pub(crate) const LEGACY_LINK: &str = r#"li:has-text("Click here") >> a"#;

const LEGACY_GAMES: &str = "legacy games";

/// Stores that hand out a code, with the page it is redeemed on.
const REDEEM_URLS: &[(&str, &str)] = &[
    ("gog.com", "https://www.gog.com/redeem"),
    (LEGACY_GAMES, "https://www.legacygames.com/primedeal"),
    ("microsoft games", "https://redeem.microsoft.com"),
];

/// Lower-cased store name from a subtitle like `"3 Full PC Games on Legacy Games"`.
pub fn derive_store_name(subtitle: &str) -> String {
    let lower = subtitle.trim().to_lowercase();
    match lower.rfind(" on ") {
        Some(i) => lower[i + " on ".len()..].trim().to_string(),
        None => lower,
    }
}

/// Redemption page for stores that give out a code.
pub fn redeem_url(store: &str) -> Option<&'static str> {
    REDEEM_URLS
        .iter()
        .find(|(name, _)| *name == store)
        .map(|(_, url)| *url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    ClaimNow,
    CompleteClaim,
    LinkAccount,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExternalReport {
    /// Offers whose claim affordance was triggered
    pub processed: usize,
    /// Titles that need the game account linked by hand
    pub link_required: Vec<String>,
}

/// Works through the external offers one at a time until none is left that
/// hasn't been attempted in this run.
#[instrument(skip_all, fields(dry_run = dry_run))]
pub async fn claim_external_offers(
    page: &Page,
    bucket: &mut AccountBucket,
    evidence: &EvidenceDir,
    dry_run: bool,
) -> Result<ExternalReport, ClaimError> {
    let mut report = ExternalReport::default();
    let mut attempted = HashSet::new();

    loop {
        let cards = page.locator(EXTERNAL_CARD).all().await?;
        info!("Number of free unclaimed games (external stores): {}", cards.len());
        if cards.is_empty() {
            break;
        }

        let mut next = None;
        for card in cards {
            let title = card_title(page, &card).await?;
            if attempted.insert(title.clone()) {
                next = Some((card, title));
                break;
            }
        }
        let Some((card, title)) = next else {
            debug!("Every listed external offer was already attempted");
            break;
        };

        let offer = Offer::external(title);
        info!("Current free game: {}", offer.title);
        if dry_run {
            continue;
        }

        claim_one(page, card, &offer, bucket, evidence, &mut report).await?;
        report.processed += 1;

        page.goto(URL_CLAIM).await?;
        open_game_offers(page).await?;
    }
    Ok(report)
}

async fn card_title(page: &Page, card: &ElementHandle) -> Result<String, ClaimError> {
    let title = page
        .locator(CARD_TITLE)
        .within(card.clone())
        .inner_text()
        .await
        .map_err(|e| ClaimError::claim_ui("Could not read the offer title", e))?;
    Ok(title.trim().to_string())
}

async fn claim_one(
    page: &Page,
    card: ElementHandle,
    offer: &Offer,
    bucket: &mut AccountBucket,
    evidence: &EvidenceDir,
    report: &mut ExternalReport,
) -> Result<(), ClaimError> {
    let ui = |what: &str| {
        let context = format!("{what} for \"{}\"", offer.title);
        move |e: ClaimError| ClaimError::claim_ui(context, e)
    };

    page.locator(CLAIM_TEXT)
        .within(card)
        .click()
        .await
        .map_err(ui("Could not open the offer"))?;

    let claim_now = page.locator(CLAIM_NOW);
    let complete_claim = page.locator(COMPLETE_CLAIM);
    let link_account = page.locator(LINK_ACCOUNT);
    let confirmation = race(vec![
        outcome(claim_now.click(), Confirmation::ClaimNow),
        outcome(complete_claim.click(), Confirmation::CompleteClaim),
        outcome(link_account.wait(), Confirmation::LinkAccount),
    ])
    .await
    .map_err(ui("No claim confirmation appeared"))?;
    debug!(?confirmation, "Claim confirmed");

    let subtitle = page
        .locator(STORE_SUBTITLE)
        .inner_text()
        .await
        .map_err(ui("Could not read the store name"))?;
    let store = derive_store_name(&subtitle);
    info!("  External store: {}", store);

    let link_required = confirmation == Confirmation::LinkAccount
        || page.locator(LINK_ACCOUNT).count().await? > 0;
    if link_required {
        warn!("  Account linking is required to claim this offer!");
        report.link_required.push(offer.title.clone());
        return Ok(());
    }

    let mut code = None;
    if let Some(default_url) = redeem_url(&store) {
        let value = page
            .locator(CODE_INPUT)
            .input_value()
            .await
            .map_err(ui("Could not read the redemption code"))?;
        info!("  Code to redeem game: {}", value);
        let redeem_at = if store == LEGACY_GAMES {
            // The destination differs between promotions.
            page.locator(LEGACY_LINK)
                .attribute("href")
                .await
                .map_err(ui("Could not read the redemption link"))?
                .unwrap_or_else(|| default_url.to_string())
        } else {
            default_url.to_string()
        };
        info!("  URL to redeem game: {}", redeem_at);
        code = Some(value.trim().to_string()).filter(|c| !c.is_empty());
    }

    let url = page.url().await?;
    bucket.insert_if_absent(
        offer.title.clone(),
        ClaimRecord::external(&offer.title, store, code, Some(url)),
    );
    evidence
        .capture(
            page.screenshot(true),
            evidence.offer_path(OfferKind::External, &offer.title),
        )
        .await;
    Ok(())
}
