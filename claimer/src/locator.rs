use tracing::{debug, instrument};

use crate::driver::{ElementHandle, PageDriver};
use crate::errors::ClaimError;
use crate::page::{read_timeout, SharedTimeout, POLL_INTERVAL};
use crate::selector::Selector;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A high-level API for finding and interacting with page elements
///
/// Actions wait for the first match, bounded by the page's operation timeout
/// (read when the wait starts) unless the locator carries its own.
#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn PageDriver>,
    selector: Selector,
    page_timeout: SharedTimeout,
    timeout: Option<Duration>,
    root: Option<ElementHandle>,
}

impl Locator {
    /// Create a new locator with the given selector
    pub(crate) fn new(
        driver: Arc<dyn PageDriver>,
        page_timeout: SharedTimeout,
        selector: Selector,
    ) -> Self {
        Self {
            driver,
            selector,
            page_timeout,
            timeout: None,
            root: None,
        }
    }

    /// Override the page timeout for this locator instance.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the root element for this locator
    pub fn within(mut self, element: ElementHandle) -> Self {
        self.root = Some(element);
        self
    }

    fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.or_else(|| read_timeout(&self.page_timeout))
    }

    /// All current matches, without waiting.
    pub async fn all(&self) -> Result<Vec<ElementHandle>, ClaimError> {
        match self.driver.query_all(&self.selector, self.root.as_ref()).await {
            Err(e) if e.is_transient() => Ok(Vec::new()),
            other => other,
        }
    }

    /// Number of current matches, without waiting.
    pub async fn count(&self) -> Result<usize, ClaimError> {
        Ok(self.all().await?.len())
    }

    /// Wait for an element matching the locator to appear.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn wait(&self) -> Result<ElementHandle, ClaimError> {
        if let Selector::Invalid(reason) = &self.selector {
            return Err(ClaimError::InvalidSelector(reason.clone()));
        }
        let timeout = self.effective_timeout();
        let started = Instant::now();
        loop {
            if let Some(element) = self.all().await?.into_iter().next() {
                debug!(element = element.id(), "Element found");
                return Ok(element);
            }
            if let Some(t) = timeout {
                if started.elapsed() >= t {
                    return Err(ClaimError::Timeout(format!(
                        "Timed out after {t:?} waiting for element \"{}\"",
                        self.selector
                    )));
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn click(&self) -> Result<(), ClaimError> {
        let element = self.wait().await?;
        self.driver.click(&element).await
    }

    pub async fn fill(&self, value: &str) -> Result<(), ClaimError> {
        let element = self.wait().await?;
        self.driver.fill(&element, value).await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), ClaimError> {
        let element = self.wait().await?;
        self.driver.type_text(&element, text).await
    }

    pub async fn check(&self) -> Result<(), ClaimError> {
        let element = self.wait().await?;
        self.driver.check(&element).await
    }

    pub async fn inner_text(&self) -> Result<String, ClaimError> {
        let element = self.wait().await?;
        self.driver.inner_text(&element).await
    }

    pub async fn input_value(&self) -> Result<String, ClaimError> {
        let element = self.wait().await?;
        self.driver.input_value(&element).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, ClaimError> {
        let element = self.wait().await?;
        self.driver.attribute(&element, name).await
    }
}
