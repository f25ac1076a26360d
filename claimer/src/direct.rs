//! Offers claimed in place on the storefront.
//!
//! Claiming a direct offer does not reshuffle the list, so the cards are
//! snapshotted once and walked in order.

use tracing::{info, instrument};

use crate::errors::ClaimError;
use crate::evidence::EvidenceDir;
use crate::ledger::{AccountBucket, ClaimRecord};
use crate::offer::{Offer, OfferKind};
use crate::page::Page;
use crate::selector::Selector;

pub(crate) const GAME_TAB: &str = r#"button[data-type="Game"]"#;
pub(crate) const OFFER_LIST: &str = r#"div[data-a-target="offer-list-FGWP_FULL"]"#;
pub(crate) const COLLECTED: &str = r#"p:has-text("Collected")"#;
pub(crate) const DIRECT_CARD: &str =
    r#"div[data-a-target="offer-list-FGWP_FULL"] >> [data-a-target="item-card"]:has-text("Claim game")"#;
pub(crate) const CARD_TITLE: &str = ".item-card-details__body__primary";
pub(crate) const CLAIM_GAME_BUTTON: &str = r#"button:has-text("Claim game")"#;

/// Selects the game category and waits for its offer list.
pub async fn open_game_offers(page: &Page) -> Result<(), ClaimError> {
    page.locator(GAME_TAB)
        .click()
        .await
        .map_err(|e| ClaimError::claim_ui("Could not select the game offers", e))?;
    page.locator(OFFER_LIST)
        .wait()
        .await
        .map_err(|e| ClaimError::claim_ui("Game offer list did not render", e))?;
    Ok(())
}

/// Claims every direct offer currently listed and returns how many were
/// claimed. In dry-run the offers are only logged.
#[instrument(skip_all, fields(dry_run = dry_run))]
pub async fn claim_direct_offers(
    page: &Page,
    bucket: &mut AccountBucket,
    evidence: &EvidenceDir,
    dry_run: bool,
) -> Result<usize, ClaimError> {
    open_game_offers(page).await?;
    info!(
        "Number of already claimed games (total): {}",
        page.locator(Selector::from(OFFER_LIST).then(COLLECTED))
            .count()
            .await?
    );

    let cards = page.locator(DIRECT_CARD).all().await?;
    info!("Number of free unclaimed games (Prime Gaming): {}", cards.len());

    let mut claimed = 0;
    for card in cards {
        let title = page
            .locator(CARD_TITLE)
            .within(card.clone())
            .inner_text()
            .await
            .map_err(|e| ClaimError::claim_ui("Could not read the offer title", e))?;
        let offer = Offer::direct(title.trim());
        info!("Current free game: {}", offer.title);
        if dry_run {
            continue;
        }

        evidence
            .capture(
                page.screenshot_element(&card),
                evidence.offer_path(OfferKind::Direct, &offer.title),
            )
            .await;
        page.locator(CLAIM_GAME_BUTTON)
            .within(card)
            .click()
            .await
            .map_err(|e| ClaimError::claim_ui(format!("Could not claim \"{}\"", offer.title), e))?;

        bucket.insert_if_absent(offer.title.clone(), ClaimRecord::internal(&offer.title));
        claimed += 1;
    }
    Ok(claimed)
}
