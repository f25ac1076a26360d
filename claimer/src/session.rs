//! Brings the page to a signed-in state and reports who is signed in.
//!
//! Sign-in follow-ups are speculative: after submitting credentials the page
//! may come back with an error, ask for a second factor, or go straight to the
//! storefront. Two watcher tasks look for the first two outcomes while the
//! main flow waits for the storefront; whichever watcher never fires is
//! aborted.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClaimConfig;
use crate::credentials::Credentials;
use crate::errors::ClaimError;
use crate::page::{outcome, race, Page, UrlMatcher};

pub const URL_CLAIM: &str = "https://gaming.amazon.com/home";
pub const URL_SIGNED_IN: &str = "https://gaming.amazon.com/home?signedIn=true";

pub(crate) const SIGN_IN_BUTTON: &str = r#"button:has-text("Sign in")"#;
pub(crate) const USER_NAME: &str = r#"[data-a-target="user-dropdown-first-name-text"]"#;
pub(crate) const COOKIE_ACCEPT: &str =
    r#"[aria-label="Cookies usage disclaimer banner"] >> button:has-text("Accept Cookies")"#;
pub(crate) const EMAIL_INPUT: &str = "[name=email]";
pub(crate) const PASSWORD_INPUT: &str = "[name=password]";
pub(crate) const REMEMBER_ME: &str = "[name=rememberMe]";
pub(crate) const SUBMIT: &str = r#"input[type="submit"]"#;
pub(crate) const SIGN_IN_ALERT: &str = ".a-alert-content";
pub(crate) const REMEMBER_DEVICE: &str = "[name=rememberDevice]";
pub(crate) const OTP_INPUT: &str = "input[name=otpCode]";

const COOKIE_BANNER_WAIT: Duration = Duration::from_secs(10);
const SIGN_IN_PATH: &str = "/ap/signin";
const MFA_PATH: &str = "/ap/mfa";

/// The signed-in account the run claims for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Landing {
    SignedIn,
    SignedOut,
}

#[derive(Debug)]
enum SignInOutcome {
    SignedIn,
    /// The sign-in form came back with this error text
    Rejected(String),
}

pub struct SessionBootstrapper<'a> {
    page: &'a Page,
    config: &'a ClaimConfig,
    credentials: Credentials,
}

impl<'a> SessionBootstrapper<'a> {
    pub fn new(page: &'a Page, config: &'a ClaimConfig, credentials: Credentials) -> Self {
        Self {
            page,
            config,
            credentials,
        }
    }

    /// Signs in if needed and returns the account's display name.
    #[instrument(skip(self))]
    pub async fn establish(&self) -> Result<AuthenticatedAccount, ClaimError> {
        self.page
            .goto(URL_CLAIM)
            .await
            .map_err(|e| ClaimError::auth("Could not open the storefront", e))?;

        loop {
            let landing = self.wait_for_landing().await?;
            self.dismiss_cookie_banner();
            if landing == Landing::SignedIn {
                break;
            }
            warn!("Not signed in anymore.");
            match self.sign_in().await? {
                SignInOutcome::SignedIn => {}
                SignInOutcome::Rejected(message) => {
                    error!(message = %message, "Sign-in was rejected");
                    if self.credentials.is_configured() {
                        return Err(ClaimError::AuthFailure(format!(
                            "Configured credentials were rejected: {message}"
                        )));
                    }
                    self.page.goto(URL_CLAIM).await?;
                }
            }
        }

        let name = self
            .page
            .locator(USER_NAME)
            .inner_text()
            .await
            .map_err(|e| ClaimError::auth("Could not read the signed-in account name", e))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ClaimError::AuthFailure(
                "Signed-in account name is empty".to_string(),
            ));
        }
        info!(account = name, "Signed in as {}", name);
        Ok(AuthenticatedAccount {
            name: name.to_string(),
        })
    }

    /// Either marker may show up first; whichever does decides the branch.
    async fn wait_for_landing(&self) -> Result<Landing, ClaimError> {
        let signed_out = self.page.locator(SIGN_IN_BUTTON);
        let signed_in = self.page.locator(USER_NAME);
        let landing = race(vec![
            outcome(signed_out.wait(), Landing::SignedOut),
            outcome(signed_in.wait(), Landing::SignedIn),
        ])
        .await
        .map_err(|e| ClaimError::auth("Neither signed-in nor signed-out page appeared", e))?;
        debug!(?landing, "Landing page recognised");
        Ok(landing)
    }

    /// Clicks the cookie banner away if it shows up; nobody waits for it.
    fn dismiss_cookie_banner(&self) {
        let accept = self.page.locator(COOKIE_ACCEPT).with_timeout(COOKIE_BANNER_WAIT);
        tokio::spawn(async move {
            if let Err(e) = accept.click().await {
                debug!("No cookie banner dismissed: {}", e);
            }
        });
    }

    async fn sign_in(&self) -> Result<SignInOutcome, ClaimError> {
        self.page
            .locator(SIGN_IN_BUTTON)
            .click()
            .await
            .map_err(|e| ClaimError::auth("Could not open the sign-in form", e))?;

        // A human may be typing; nothing below is allowed to time out.
        let _suspended = self.page.suspend_timeout();
        info!("Leave the prompts empty to log in in the browser instead (not possible in headless mode).");
        let email = self.credentials.email().await?;
        let password = self.credentials.password().await?;

        let (Some(email), Some(password)) = (email, password) else {
            if self.config.headless {
                return Err(ClaimError::AuthFailure(
                    "No credentials available in headless mode. Run again with --show to log in in the browser.".to_string(),
                ));
            }
            info!("Waiting for you to login in the browser.");
            let since = self.page.navigation_count();
            self.page
                .wait_for_navigation(since, &UrlMatcher::exact(URL_SIGNED_IN))
                .await?;
            return Ok(SignInOutcome::SignedIn);
        };

        self.page.locator(EMAIL_INPUT).fill(&email).await?;
        self.page.locator(PASSWORD_INPUT).fill(&password).await?;
        self.page.locator(REMEMBER_ME).check().await?;
        let since = self.page.navigation_count();
        self.page.locator(SUBMIT).click().await?;

        let mut watchers = LoginWatchers::spawn(self.page, &self.credentials, since);
        let rejected = watchers.rejected();
        let signed_in = UrlMatcher::exact(URL_SIGNED_IN);
        let outcome = tokio::select! {
            reached = self.page.wait_for_navigation(since, &signed_in) => {
                reached?;
                SignInOutcome::SignedIn
            }
            Some(message) = rejected => SignInOutcome::Rejected(message),
        };
        drop(watchers);
        Ok(outcome)
    }
}

/// Follow-up watchers started after submitting credentials. Dropping the
/// value aborts whichever of them is still pending.
struct LoginWatchers {
    rejected: Option<oneshot::Receiver<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoginWatchers {
    fn spawn(page: &Page, credentials: &Credentials, since: u64) -> Self {
        let (tx, rx) = oneshot::channel();

        let wrong_credentials = {
            let page = page.clone();
            tokio::spawn(async move {
                match watch_wrong_credentials(&page, since).await {
                    Ok(message) => {
                        let _ = tx.send(message);
                    }
                    Err(e) => debug!("Wrong-credentials watcher stopped: {}", e),
                }
            })
        };

        let second_factor = {
            let page = page.clone();
            let credentials = credentials.clone();
            tokio::spawn(async move {
                if let Err(e) = watch_second_factor(&page, &credentials, since).await {
                    debug!("Second-factor watcher stopped: {}", e);
                }
            })
        };

        Self {
            rejected: Some(rx),
            tasks: vec![wrong_credentials, second_factor],
        }
    }

    /// Resolves with the on-page error if the sign-in form comes back;
    /// resolves to `None` if that watcher gives up.
    fn rejected(&mut self) -> impl std::future::Future<Output = Option<String>> {
        let rx = self.rejected.take();
        async move {
            match rx {
                Some(rx) => rx.await.ok(),
                None => None,
            }
        }
    }
}

impl Drop for LoginWatchers {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn watch_wrong_credentials(page: &Page, since: u64) -> Result<String, ClaimError> {
    page.wait_for_navigation(since, &UrlMatcher::contains(SIGN_IN_PATH))
        .await?;
    let message = page.locator(SIGN_IN_ALERT).inner_text().await?;
    Ok(message.trim().to_string())
}

async fn watch_second_factor(
    page: &Page,
    credentials: &Credentials,
    since: u64,
) -> Result<(), ClaimError> {
    page.wait_for_navigation(since, &UrlMatcher::contains(MFA_PATH))
        .await?;
    info!("Two-Step Verification - enter the One Time Password (OTP), e.g. generated by your Authenticator App");
    page.locator(REMEMBER_DEVICE).check().await?;
    let code = credentials.otp().await?;
    page.locator(OTP_INPUT).type_text(code.as_str()).await?;
    page.locator(SUBMIT).click().await?;
    debug!("Second factor submitted");
    Ok(())
}
