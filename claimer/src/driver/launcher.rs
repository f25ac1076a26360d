use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::errors::ClaimError;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// How the browser process is started.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chromium/Chrome executable
    pub executable: PathBuf,
    /// Persistent profile, so cookies and remembered devices survive runs
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    pub debug_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub websocket_url: Option<String>,
}

/// HTTP side of the DevTools endpoint: discovery of tabs and their sockets.
#[derive(Debug, Clone)]
pub struct DevToolsEndpoint {
    base_url: String,
    client: reqwest::Client,
}

impl DevToolsEndpoint {
    pub fn new(debug_port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{debug_port}"),
            client: reqwest::Client::new(),
        }
    }

    /// Check if a browser is listening with DevTools enabled
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/json/version", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Get list of all open targets
    pub async fn get_tabs(&self) -> Result<Vec<TabInfo>, ClaimError> {
        let response = self
            .client
            .get(format!("{}/json/list", self.base_url))
            .send()
            .await
            .map_err(|e| ClaimError::Browser(format!("Failed to get tabs: {e}")))?;

        let tabs: Vec<TabInfo> = response
            .json()
            .await
            .map_err(|e| ClaimError::Browser(format!("Failed to parse tabs: {e}")))?;

        debug!("Found {} open tabs", tabs.len());
        Ok(tabs)
    }

    pub async fn new_tab(&self) -> Result<TabInfo, ClaimError> {
        let response = self
            .client
            .put(format!("{}/json/new?about:blank", self.base_url))
            .send()
            .await
            .map_err(|e| ClaimError::Browser(format!("Failed to open tab: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| ClaimError::Browser(format!("Failed to parse new tab: {e}")))
    }

    /// First page target; the persistent profile normally restores one.
    pub async fn page_socket_url(&self) -> Result<String, ClaimError> {
        let tab = match self.get_tabs().await?.into_iter().find(|t| t.kind == "page") {
            Some(tab) => tab,
            None => self.new_tab().await?,
        };
        debug!(tab = %tab.id, url = %tab.url, "Attaching to tab");
        tab.websocket_url
            .ok_or_else(|| ClaimError::Browser(format!("Tab {} has no debugger socket", tab.id)))
    }
}

/// Starts the browser and waits for its DevTools endpoint.
pub async fn launch(options: &BrowserOptions) -> Result<(Child, DevToolsEndpoint), ClaimError> {
    std::fs::create_dir_all(&options.user_data_dir)?;

    let mut command = Command::new(&options.executable);
    command
        .arg(format!("--remote-debugging-port={}", options.debug_port))
        .arg(format!("--user-data-dir={}", options.user_data_dir.display()))
        .arg(format!("--window-size={},{}", options.width, options.height))
        .arg("--lang=en-US")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-blink-features=AutomationControlled");
    if options.headless {
        command.arg("--headless=new");
    }
    command
        .arg("about:blank")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        ClaimError::Browser(format!(
            "Failed to start browser {}: {e}",
            options.executable.display()
        ))
    })?;

    let endpoint = DevToolsEndpoint::new(options.debug_port);
    let started = Instant::now();
    while !endpoint.is_available().await {
        if started.elapsed() >= STARTUP_TIMEOUT {
            return Err(ClaimError::Browser(format!(
                "Browser did not expose DevTools on port {} within {STARTUP_TIMEOUT:?}",
                options.debug_port
            )));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    info!(
        port = options.debug_port,
        headless = options.headless,
        "Browser started"
    );
    Ok((child, endpoint))
}
