/// How an offer is fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferKind {
    /// Claimed in place on the storefront
    Direct,
    /// Redirects to a third-party store for a code or account linking
    External,
}

impl OfferKind {
    /// Evidence subdirectory for this kind of offer.
    pub fn dir_name(self) -> &'static str {
        match self {
            OfferKind::Direct => "internal",
            OfferKind::External => "external",
        }
    }
}

/// An offer as currently shown on the page. Never persisted; it is
/// re-derived on every pass because claiming changes what is listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub title: String,
    pub kind: OfferKind,
    pub claimable_now: bool,
}

impl Offer {
    pub fn direct(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: OfferKind::Direct,
            claimable_now: true,
        }
    }

    pub fn external(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: OfferKind::External,
            claimable_now: true,
        }
    }
}
