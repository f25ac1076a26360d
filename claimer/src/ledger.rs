//! Per-account record of every offer ever claimed.
//!
//! File layout:
//!
//! ```json
//! { "<account>": { "<offer title>": { "title": "…", "time": "…", "store": "…", "code": "…", "url": "…" } } }
//! ```
//!
//! Older versions kept a flat `{ "claimed": [...], "runs": n }` list; it is
//! carried through untouched until [`crate::migrate`] folds it into the
//! account's bucket.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

use crate::store::JsonDb;
use crate::utils::datetime;

/// `store` value of offers fulfilled on the storefront itself.
pub const STORE_INTERNAL: &str = "internal";

pub type Ledger = JsonDb<LedgerDocument>;

fn default_store() -> String {
    STORE_INTERNAL.to_string()
}

/// Evidence that an offer was claimed for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub title: String,
    #[serde(default)]
    pub time: String,
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ClaimRecord {
    /// Record for an offer claimed in place on the storefront.
    pub fn internal(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            time: datetime(),
            store: default_store(),
            code: None,
            url: None,
        }
    }

    /// Record for an offer fulfilled on a third-party store.
    pub fn external(
        title: impl Into<String>,
        store: impl Into<String>,
        code: Option<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            time: datetime(),
            store: store.into(),
            code,
            url,
        }
    }
}

/// Offers claimed by one account, keyed by title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountBucket(BTreeMap<String, ClaimRecord>);

impl AccountBucket {
    /// Stores `record` unless `title` is already present; never overwrites.
    /// Returns whether the record was inserted.
    pub fn insert_if_absent(&mut self, title: impl Into<String>, record: ClaimRecord) -> bool {
        match self.0.entry(title.into()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.0.contains_key(title)
    }

    pub fn get(&self, title: &str) -> Option<&ClaimRecord> {
        self.0.get(title)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Root of the ledger file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    /// Legacy flat list of claims without an account key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed: Option<Vec<ClaimRecord>>,
    /// Legacy run counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<serde_json::Value>,
    #[serde(flatten)]
    pub accounts: BTreeMap<String, AccountBucket>,
}

impl LedgerDocument {
    pub fn bucket(&self, account: &str) -> Option<&AccountBucket> {
        self.accounts.get(account)
    }

    /// The account's bucket, created empty on first use.
    pub fn bucket_mut(&mut self, account: &str) -> &mut AccountBucket {
        self.accounts.entry(account.to_string()).or_default()
    }

    pub fn has_legacy(&self) -> bool {
        self.claimed.is_some()
    }
}
