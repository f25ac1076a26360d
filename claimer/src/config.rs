use std::path::PathBuf;
use std::time::Duration;

/// Process-wide settings for one claim run.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// Run the browser without a window
    pub headless: bool,
    /// Bound on every wait, except during interactive sign-in
    pub timeout: Duration,
    /// Discover and log offers without claiming or recording anything
    pub dry_run: bool,
    /// Disables operation timeouts entirely
    pub debug: bool,
    pub width: u32,
    pub height: u32,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Base32 TOTP seed for the second factor
    pub otp_key: Option<String>,
    /// Browser profile, screenshots, logs and the ledger live here
    pub data_dir: PathBuf,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(60),
            dry_run: false,
            debug: false,
            width: 1280,
            height: 1280,
            email: None,
            password: None,
            otp_key: None,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ClaimConfig {
    /// Timeout installed on the page; `None` in debug mode.
    pub fn operation_timeout(&self) -> Option<Duration> {
        (!self.debug).then_some(self.timeout)
    }

    pub fn browser_dir(&self) -> PathBuf {
        self.data_dir.join("browser")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.data_dir.join("screenshots").join("prime-gaming")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("prime-gaming.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
