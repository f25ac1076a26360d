//! Prime Gaming offer claiming through browser automation
//!
//! This crate signs into the storefront in a real browser, claims the free
//! game offers that are listed for the account and keeps a per-account ledger
//! of what was claimed, with screenshots as evidence. Page interaction follows
//! Playwright's model: [`Page`] and [`Locator`] wait on [`Selector`]s, on top
//! of a [`driver::PageDriver`] backend.

pub mod config;
pub mod credentials;
pub mod direct;
pub mod driver;
pub mod errors;
pub mod evidence;
pub mod external;
pub mod ledger;
pub mod locator;
pub mod migrate;
pub mod offer;
pub mod page;
pub mod runner;
pub mod selector;
pub mod session;
pub mod store;
#[cfg(test)]
mod tests;
pub mod utils;

pub use config::ClaimConfig;
pub use credentials::{Credentials, NoPrompt, OtpCode, PromptKind, Prompter};
pub use driver::{CdpDriver, ElementHandle, PageDriver};
pub use errors::ClaimError;
pub use ledger::{AccountBucket, ClaimRecord, Ledger, LedgerDocument};
pub use locator::Locator;
pub use offer::{Offer, OfferKind};
pub use page::{Page, UrlMatcher};
pub use runner::{run, RunSummary};
pub use selector::Selector;
pub use session::{AuthenticatedAccount, SessionBootstrapper};
pub use store::JsonDb;
