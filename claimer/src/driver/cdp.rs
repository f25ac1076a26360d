//! Chrome DevTools Protocol backend.
//!
//! One WebSocket per tab: a writer task drains an unbounded channel into the
//! socket, a reader task routes command responses back to their callers via
//! oneshot channels and counts top-level navigations from `Page` events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::launcher::{self, BrowserOptions};
use super::{Capture, ElementHandle, PageDriver};
use crate::{ClaimError, Selector};

const QUERY_PRELUDE: &str = include_str!("query.js");
const DETACHED_MARKER: &str = "claimer-detached";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

// Reduce type complexity for Clippy
type CdpResult = Result<Value, String>;
type PendingMap = HashMap<u64, oneshot::Sender<CdpResult>>;
type Pending = Arc<Mutex<PendingMap>>;
type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct CdpRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CdpIncoming {
    Response {
        id: u64,
        result: Option<Value>,
        error: Option<CdpErrorBody>,
    },
    Event {
        method: String,
        #[serde(default)]
        params: Value,
    },
}

pub struct CdpDriver {
    sender: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    navigations: Arc<AtomicU64>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    browser: Mutex<Option<Child>>,
    command_timeout: Duration,
}

impl CdpDriver {
    /// Starts a browser and attaches to its first tab.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, ClaimError> {
        let (child, endpoint) = launcher::launch(options).await?;
        let socket_url = endpoint.page_socket_url().await?;
        let driver = Self::connect(&socket_url, Some(child)).await?;
        driver.call("Page.enable", json!({})).await?;
        driver.call("Runtime.enable", json!({})).await?;
        Ok(driver)
    }

    /// Attaches to a tab's debugger socket; `browser` is torn down on close.
    pub async fn connect(socket_url: &str, browser: Option<Child>) -> Result<Self, ClaimError> {
        let (socket, _response) = connect_async(socket_url)
            .await
            .map_err(|e| ClaimError::Browser(format!("DevTools handshake failed: {e}")))?;
        let (mut sink, stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        // writer task
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("DevTools send error: {}", e);
                    break;
                }
            }
        });

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let navigations = Arc::new(AtomicU64::new(0));
        let reader = tokio::spawn(read_loop(stream, pending.clone(), navigations.clone()));
        info!(socket = %socket_url, "Attached to DevTools session");

        Ok(Self {
            sender: tx,
            pending,
            next_id: AtomicU64::new(1),
            navigations,
            reader,
            writer,
            browser: Mutex::new(browser),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClaimError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel::<CdpResult>();
        self.pending.lock().await.insert(id, tx);

        let payload = serde_json::to_string(&CdpRequest { id, method, params })?;
        if self.sender.send(Message::Text(payload)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClaimError::Browser("DevTools connection is closed".into()));
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(protocol_error(method, message)),
            Ok(Err(_canceled)) => Err(ClaimError::Browser(format!(
                "DevTools connection closed while waiting for {method}"
            ))),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(ClaimError::Timeout(format!(
                    "{method} got no response within {:?}",
                    self.command_timeout
                )))
            }
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, ClaimError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            if message.contains(DETACHED_MARKER) {
                return Err(ClaimError::ElementDetached(message));
            }
            return Err(ClaimError::Browser(format!("Script failed: {message}")));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    /// Runs `body` with `el` bound to the referenced element.
    async fn with_element(&self, element: &ElementHandle, body: &str) -> Result<Value, ClaimError> {
        let id = serde_json::to_string(element.id())?;
        let script = format!(
            "{QUERY_PRELUDE}\n(() => {{ const el = window.__claimer.get({id}); {body} }})()"
        );
        self.evaluate(&script).await
    }

    async fn element_box(&self, element: &ElementHandle) -> Result<ElementBox, ClaimError> {
        let value = self
            .with_element(
                element,
                "el.scrollIntoView({ block: 'center', inline: 'center' });
                 const r = el.getBoundingClientRect();
                 return { x: r.left, y: r.top, width: r.width, height: r.height,
                          scroll_x: window.scrollX, scroll_y: window.scrollY };",
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn mouse(&self, kind: &str, x: f64, y: f64) -> Result<(), ClaimError> {
        self.call(
            "Input.dispatchMouseEvent",
            json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
        )
        .await?;
        Ok(())
    }

    async fn wait_for_dom(&self) -> Result<(), ClaimError> {
        let started = Instant::now();
        loop {
            match self.evaluate("document.readyState").await {
                Ok(Value::String(state)) if state != "loading" => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_transient() => {}
                Err(ClaimError::Browser(_)) => {}
                Err(e) => return Err(e),
            }
            if started.elapsed() >= self.command_timeout {
                return Err(ClaimError::Timeout(format!(
                    "DOM not ready within {:?}",
                    self.command_timeout
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct ElementBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    scroll_x: f64,
    scroll_y: f64,
}

fn protocol_error(method: &str, message: String) -> ClaimError {
    if message.contains("context was destroyed") || message.contains("Cannot find context") {
        ClaimError::ElementDetached(format!("{method}: {message}"))
    } else {
        ClaimError::Browser(format!("{method} failed: {message}"))
    }
}

async fn read_loop(mut stream: SplitStream<Socket>, pending: Pending, navigations: Arc<AtomicU64>) {
    while let Some(Ok(msg)) = stream.next().await {
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        match serde_json::from_str::<CdpIncoming>(&txt) {
            Ok(CdpIncoming::Response { id, result, error }) => {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(match error {
                        Some(err) => Err(format!("{} ({})", err.message, err.code)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    });
                }
            }
            Ok(CdpIncoming::Event { method, params }) => match method.as_str() {
                "Page.frameNavigated" if params.pointer("/frame/parentId").is_none() => {
                    let count = navigations.fetch_add(1, Ordering::SeqCst) + 1;
                    let url = params
                        .pointer("/frame/url")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    debug!(count, url, "Top-level navigation");
                }
                "Inspector.detached" => {
                    warn!(reason = %params, "DevTools session detached");
                }
                _ => {}
            },
            Err(e) => warn!("Invalid DevTools message: {}", e),
        }
    }
    // Dropping the senders fails every caller still waiting.
    pending.lock().await.clear();
    debug!("DevTools reader finished");
}

#[async_trait::async_trait]
impl PageDriver for CdpDriver {
    async fn goto(&self, url: &str) -> Result<(), ClaimError> {
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(ClaimError::Browser(format!("Navigation to {url} failed: {error}")));
            }
        }
        self.wait_for_dom().await
    }

    async fn current_url(&self) -> Result<String, ClaimError> {
        let value = self.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn navigation_count(&self) -> u64 {
        self.navigations.load(Ordering::SeqCst)
    }

    async fn query_all(
        &self,
        selector: &Selector,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, ClaimError> {
        let query = selector.to_query()?;
        let root = serde_json::to_string(&root.map(ElementHandle::id))?;
        let script = format!(
            "{QUERY_PRELUDE}\n(() => {{
                const c = window.__claimer;
                const root = {root};
                const roots = root === null ? [document] : [c.get(root)];
                return c.query({query}, roots).map((e) => c.store(e));
            }})()"
        );
        let ids: Vec<String> = serde_json::from_value(self.evaluate(&script).await?)?;
        Ok(ids.into_iter().map(ElementHandle::new).collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), ClaimError> {
        let b = self.element_box(element).await?;
        if b.width <= 0.0 || b.height <= 0.0 {
            debug!(element = element.id(), "Element has no box, clicking via script");
            self.with_element(element, "el.click();").await?;
            return Ok(());
        }
        let (x, y) = (b.x + b.width / 2.0, b.y + b.height / 2.0);
        self.mouse("mouseMoved", x, y).await?;
        self.mouse("mousePressed", x, y).await?;
        self.mouse("mouseReleased", x, y).await
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), ClaimError> {
        let value = serde_json::to_string(value)?;
        self.with_element(
            element,
            &format!(
                "el.focus();
                 const proto = el instanceof HTMLTextAreaElement
                     ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
                 Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value});
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
            ),
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), ClaimError> {
        self.with_element(element, "el.focus();").await?;
        self.call("Input.insertText", json!({ "text": text })).await?;
        Ok(())
    }

    async fn check(&self, element: &ElementHandle) -> Result<(), ClaimError> {
        let checked = self
            .with_element(element, "if (!el.checked) el.click(); return el.checked;")
            .await?;
        if checked != Value::Bool(true) {
            return Err(ClaimError::Browser(format!(
                "Element {} did not become checked",
                element.id()
            )));
        }
        Ok(())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, ClaimError> {
        let value = self
            .with_element(element, "return el.innerText ?? el.textContent ?? '';")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn input_value(&self, element: &ElementHandle) -> Result<String, ClaimError> {
        let value = self.with_element(element, "return el.value ?? '';").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, ClaimError> {
        let name = serde_json::to_string(name)?;
        let value = self
            .with_element(element, &format!("return el.getAttribute({name});"))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn screenshot(&self, capture: Capture<'_>) -> Result<Vec<u8>, ClaimError> {
        let params = match capture {
            Capture::Viewport => json!({ "format": "png" }),
            Capture::FullPage => {
                let size = self
                    .evaluate(
                        "({ width: document.documentElement.scrollWidth,
                            height: document.documentElement.scrollHeight })",
                    )
                    .await?;
                json!({
                    "format": "png",
                    "captureBeyondViewport": true,
                    "clip": { "x": 0, "y": 0, "width": size["width"], "height": size["height"], "scale": 1 },
                })
            }
            Capture::Element(element) => {
                let b = self.element_box(element).await?;
                json!({
                    "format": "png",
                    "captureBeyondViewport": true,
                    "clip": {
                        "x": b.x + b.scroll_x,
                        "y": b.y + b.scroll_y,
                        "width": b.width,
                        "height": b.height,
                        "scale": 1,
                    },
                })
            }
        };
        let result = self.call("Page.captureScreenshot", params).await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ClaimError::Browser("Screenshot returned no data".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| ClaimError::Browser(format!("Screenshot is not base64: {e}")))
    }

    async fn close(&self) -> Result<(), ClaimError> {
        if let Err(e) = self.call("Browser.close", json!({})).await {
            debug!("Browser.close: {}", e);
        }
        if let Some(mut child) = self.browser.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("Browser did not exit, killing it");
                    child.kill().await?;
                }
            }
        }
        self.reader.abort();
        self.writer.abort();
        Ok(())
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_messages_are_told_apart() {
        let response: CdpIncoming =
            serde_json::from_str(r#"{"id":7,"result":{"frameId":"F1"}}"#).unwrap();
        assert!(matches!(response, CdpIncoming::Response { id: 7, result: Some(_), error: None }));

        let failure: CdpIncoming = serde_json::from_str(
            r#"{"id":8,"error":{"code":-32000,"message":"Cannot find context with specified id"}}"#,
        )
        .unwrap();
        match failure {
            CdpIncoming::Response { id, error: Some(err), .. } => {
                assert_eq!(id, 8);
                assert_eq!(err.code, -32000);
            }
            other => panic!("unexpected {other:?}"),
        }

        let event: CdpIncoming = serde_json::from_str(
            r#"{"method":"Page.frameNavigated","params":{"frame":{"id":"F1","url":"https://gaming.amazon.com/home"}}}"#,
        )
        .unwrap();
        match event {
            CdpIncoming::Event { method, params } => {
                assert_eq!(method, "Page.frameNavigated");
                assert!(params.pointer("/frame/parentId").is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn destroyed_contexts_are_transient() {
        assert!(protocol_error("Runtime.evaluate", "Execution context was destroyed.".into())
            .is_transient());
        assert!(protocol_error("Runtime.evaluate", "Cannot find context with specified id".into())
            .is_transient());
        assert!(!protocol_error("Page.navigate", "Invalid url".into()).is_transient());
    }
}
