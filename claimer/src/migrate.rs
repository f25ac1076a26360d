use tracing::info;

use crate::ledger::LedgerDocument;

/// Folds the legacy flat claim list into `account`'s bucket and drops the
/// legacy fields.
///
/// Does nothing when the account already has a bucket or there is no legacy
/// list, so it can run at the start of every session. Returns whether
/// anything was migrated.
pub fn migrate(ledger: &mut LedgerDocument, account: &str) -> bool {
    if ledger.accounts.contains_key(account) || !ledger.has_legacy() {
        return false;
    }
    let legacy = ledger.claimed.take().unwrap_or_default();
    let migrated = legacy.len();
    let bucket = ledger.bucket_mut(account);
    for record in legacy {
        bucket.insert_if_absent(record.title.clone(), record);
    }
    ledger.runs = None;
    info!(account, migrated, "Migrated legacy claim list");
    true
}
