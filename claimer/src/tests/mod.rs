mod fake_driver;
mod runner_tests;

use std::sync::Arc;
use std::time::Duration;

use crate::direct::{CARD_TITLE, CLAIM_GAME_BUTTON, DIRECT_CARD, GAME_TAB, OFFER_LIST};
use crate::external::{CLAIM_NOW, CLAIM_TEXT, EXTERNAL_CARD, STORE_SUBTITLE};
use crate::session::{SIGN_IN_BUTTON, URL_CLAIM, USER_NAME};
use crate::Page;
use fake_driver::{FakeDriver, FakeState};

pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

pub fn page_on(driver: &FakeDriver) -> Page {
    Page::new(Arc::new(driver.clone()), Some(TEST_TIMEOUT))
}

/// Storefront already signed in as `account`, showing an empty game list.
pub fn signed_in_storefront(account: &str) -> FakeDriver {
    let driver = FakeDriver::new();
    driver.with(|s| {
        s.navigate(URL_CLAIM);
        s.element(USER_NAME, None, "user-name", &format!(" {account} "));
        s.set(GAME_TAB, None, &["game-tab"]);
        s.set(OFFER_LIST, None, &["offer-list"]);
    });
    driver
}

/// Storefront that shows the sign-in button until `sign_in` completes.
pub fn signed_out_storefront() -> FakeDriver {
    let driver = FakeDriver::new();
    driver.with(|s| {
        s.navigate(URL_CLAIM);
        s.set(SIGN_IN_BUTTON, None, &["sign-in"]);
        s.set(GAME_TAB, None, &["game-tab"]);
        s.set(OFFER_LIST, None, &["offer-list"]);
    });
    driver
}

/// Lists direct offers as `(card id, title)` pairs.
pub fn direct_cards(s: &mut FakeState, cards: &[(&str, &str)]) {
    let ids: Vec<&str> = cards.iter().map(|(id, _)| *id).collect();
    s.set(DIRECT_CARD, None, &ids);
    for &(id, title) in cards {
        s.element(CARD_TITLE, Some(id), &format!("{id}-title"), title);
        s.set(CLAIM_GAME_BUTTON, Some(id), &[format!("{id}-claim").as_str()]);
    }
}

/// Lists external offers. Claiming one opens its detail page on a store
/// described by `subtitle` and removes the card from the list.
pub fn external_cards(s: &mut FakeState, cards: &[(&str, &str)], subtitle: &str) {
    let ids: Vec<&str> = cards.iter().map(|(id, _)| *id).collect();
    s.set(EXTERNAL_CARD, None, &ids);
    s.element(STORE_SUBTITLE, None, "store-subtitle", subtitle);
    s.set(CLAIM_NOW, None, &["claim-now"]);
    for &(id, title) in cards {
        let claim = format!("{id}-claim");
        s.element(CARD_TITLE, Some(id), &format!("{id}-title"), title);
        s.set(CLAIM_TEXT, Some(id), &[claim.as_str()]);
        let card = id.to_string();
        s.on_click(&claim, move |s| {
            s.remove_match(EXTERNAL_CARD, None, &card);
            s.navigate(&format!("https://gaming.amazon.com/details/{card}"));
        });
    }
}

/// Number of claim affordances that were clicked.
pub fn claim_clicks(driver: &FakeDriver) -> usize {
    driver.with(|s| s.clicks.iter().filter(|c| c.ends_with("-claim")).count())
}
