use crate::{ClaimError, Selector};

pub mod cdp;
pub mod launcher;

pub use cdp::CdpDriver;
pub use launcher::{BrowserOptions, TabInfo};

/// Opaque reference to an element resolved by a driver.
///
/// Handles are only meaningful to the driver that produced them and go stale
/// once the page navigates away.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// What a screenshot should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture<'a> {
    /// The visible viewport
    Viewport,
    /// The whole scrollable page
    FullPage,
    /// The bounding box of one element
    Element(&'a ElementHandle),
}

/// The common trait that every browser backend must implement.
///
/// Methods do not wait: waiting, timeouts and races are layered on top by
/// [`crate::Page`] and [`crate::Locator`].
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the tab and wait until the DOM is parsed
    async fn goto(&self, url: &str) -> Result<(), ClaimError>;

    /// URL of the top-level document
    async fn current_url(&self) -> Result<String, ClaimError>;

    /// Number of top-level navigations committed so far
    fn navigation_count(&self) -> u64;

    /// All elements currently matching `selector`, searched inside `root` when given
    async fn query_all(
        &self,
        selector: &Selector,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, ClaimError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), ClaimError>;

    /// Replace the value of an input
    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), ClaimError>;

    /// Focus the element and type text as keyboard input
    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), ClaimError>;

    /// Tick a checkbox if it isn't ticked already
    async fn check(&self, element: &ElementHandle) -> Result<(), ClaimError>;

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, ClaimError>;

    async fn input_value(&self, element: &ElementHandle) -> Result<String, ClaimError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, ClaimError>;

    /// PNG bytes
    async fn screenshot(&self, capture: Capture<'_>) -> Result<Vec<u8>, ClaimError>;

    /// Tear the browser down
    async fn close(&self) -> Result<(), ClaimError>;
}
