//! The shared browser tab the claim flows drive.
//!
//! A [`Page`] wraps a [`PageDriver`] with the run-wide operation timeout,
//! navigation waits and the "first to resolve" race used by the speculative
//! waits during sign-in and claiming.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{select_ok, BoxFuture, FutureExt};
use tracing::{debug, instrument};

use crate::driver::{Capture, ElementHandle, PageDriver};
use crate::{ClaimError, Locator, Selector};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared operation timeout; `None` waits forever.
pub(crate) type SharedTimeout = Arc<Mutex<Option<Duration>>>;

pub(crate) fn read_timeout(timeout: &SharedTimeout) -> Option<Duration> {
    *timeout.lock().unwrap_or_else(|e| e.into_inner())
}

/// How a navigation target is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlMatcher {
    Exact(String),
    Contains(String),
}

impl UrlMatcher {
    pub fn exact(url: impl Into<String>) -> Self {
        UrlMatcher::Exact(url.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        UrlMatcher::Contains(fragment.into())
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Exact(expected) => url == expected,
            UrlMatcher::Contains(fragment) => url.contains(fragment.as_str()),
        }
    }
}

#[derive(Clone)]
pub struct Page {
    driver: Arc<dyn PageDriver>,
    timeout: SharedTimeout,
}

impl Page {
    pub fn new(driver: Arc<dyn PageDriver>, timeout: Option<Duration>) -> Self {
        Self {
            driver,
            timeout: Arc::new(Mutex::new(timeout)),
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        read_timeout(&self.timeout)
    }

    pub fn set_default_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner()) = timeout;
    }

    /// Lifts the operation timeout until the returned guard is dropped.
    pub fn suspend_timeout(&self) -> TimeoutSuspension {
        let previous = self.default_timeout();
        self.set_default_timeout(None);
        debug!(?previous, "Operation timeout suspended");
        TimeoutSuspension {
            timeout: self.timeout.clone(),
            previous,
        }
    }

    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.driver.clone(), self.timeout.clone(), selector.into())
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn goto(&self, url: &str) -> Result<(), ClaimError> {
        self.driver.goto(url).await
    }

    pub async fn url(&self) -> Result<String, ClaimError> {
        self.driver.current_url().await
    }

    pub fn navigation_count(&self) -> u64 {
        self.driver.navigation_count()
    }

    /// Waits for a navigation committed after `since` (a value of
    /// [`Page::navigation_count`]) that lands on a matching URL.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait_for_navigation(
        &self,
        since: u64,
        matcher: &UrlMatcher,
    ) -> Result<String, ClaimError> {
        let timeout = self.default_timeout();
        let started = Instant::now();
        loop {
            if self.driver.navigation_count() > since {
                match self.driver.current_url().await {
                    Ok(url) if matcher.matches(&url) => return Ok(url),
                    Ok(_) => {}
                    Err(e) if e.is_transient() => {}
                    Err(e) => return Err(e),
                }
            }
            if let Some(t) = timeout {
                if started.elapsed() >= t {
                    return Err(ClaimError::Timeout(format!(
                        "Timed out after {t:?} waiting for navigation to {matcher:?}"
                    )));
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, ClaimError> {
        let capture = if full_page {
            Capture::FullPage
        } else {
            Capture::Viewport
        };
        self.driver.screenshot(capture).await
    }

    pub async fn screenshot_element(&self, element: &ElementHandle) -> Result<Vec<u8>, ClaimError> {
        self.driver.screenshot(Capture::Element(element)).await
    }

    pub async fn close(&self) -> Result<(), ClaimError> {
        self.driver.close().await
    }
}

/// Restores the operation timeout that was active before
/// [`Page::suspend_timeout`].
pub struct TimeoutSuspension {
    timeout: SharedTimeout,
    previous: Option<Duration>,
}

impl Drop for TimeoutSuspension {
    fn drop(&mut self) {
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner()) = self.previous;
        debug!(timeout = ?self.previous, "Operation timeout restored");
    }
}

/// Boxes a wait condition that yields `value` once it resolves.
pub fn outcome<'a, F, T, V>(future: F, value: V) -> BoxFuture<'a, Result<V, ClaimError>>
where
    F: Future<Output = Result<T, ClaimError>> + Send + 'a,
    V: Send + 'a,
{
    async move {
        future.await?;
        Ok(value)
    }
    .boxed()
}

/// Runs the conditions together and returns the value of the first one that
/// succeeds; the others are dropped. Fails with the last error when every
/// condition fails.
pub async fn race<'a, V>(
    conditions: Vec<BoxFuture<'a, Result<V, ClaimError>>>,
) -> Result<V, ClaimError> {
    if conditions.is_empty() {
        return Err(ClaimError::InvalidArgument(
            "race needs at least one condition".to_string(),
        ));
    }
    let (value, _abandoned) = select_ok(conditions).await?;
    Ok(value)
}
