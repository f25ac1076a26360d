//! In-memory [`PageDriver`] for exercising the claim flows without a browser.
//!
//! Elements are registered per `(root, selector)` pair, where the selector is
//! compared in its canonical `Display` form. Clicks and navigations can run a
//! hook that rewrites the fake page, which is how the scenarios model the
//! storefront reacting to the flow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::driver::{Capture, ElementHandle, PageDriver};
use crate::{ClaimError, Selector};

type Hook = Arc<dyn Fn(&mut FakeState) + Send + Sync>;
type GotoHook = Arc<dyn Fn(&mut FakeState, &str) + Send + Sync>;

#[derive(Default)]
pub struct FakeState {
    pub url: String,
    pub navigations: u64,
    elements: HashMap<(Option<String>, String), Vec<String>>,
    texts: HashMap<String, String>,
    values: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
    on_click: HashMap<String, Hook>,
    on_goto: Option<GotoHook>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub typed: Vec<(String, String)>,
    pub checks: Vec<String>,
    pub gotos: Vec<String>,
    pub screenshots: usize,
    pub closed: usize,
    pub fail_screenshots: bool,
}

fn key(selector: &str, root: Option<&str>) -> (Option<String>, String) {
    (root.map(str::to_string), Selector::from(selector).to_string())
}

impl FakeState {
    /// Makes `ids` the matches of `selector` (inside `root` when given).
    pub fn set(&mut self, selector: &str, root: Option<&str>, ids: &[&str]) {
        self.elements
            .insert(key(selector, root), ids.iter().map(|s| s.to_string()).collect());
    }

    /// Registers a single element with its text.
    pub fn element(&mut self, selector: &str, root: Option<&str>, id: &str, text: &str) {
        self.set(selector, root, &[id]);
        self.texts.insert(id.to_string(), text.to_string());
    }

    pub fn remove(&mut self, selector: &str, root: Option<&str>) {
        self.elements.remove(&key(selector, root));
    }

    /// Drops `id` from the matches of `selector`.
    pub fn remove_match(&mut self, selector: &str, root: Option<&str>, id: &str) {
        if let Some(ids) = self.elements.get_mut(&key(selector, root)) {
            ids.retain(|i| i != id);
        }
    }

    pub fn text(&mut self, id: &str, text: &str) {
        self.texts.insert(id.to_string(), text.to_string());
    }

    pub fn value(&mut self, id: &str, value: &str) {
        self.values.insert(id.to_string(), value.to_string());
    }

    pub fn attribute(&mut self, id: &str, name: &str, value: &str) {
        self.attributes
            .insert((id.to_string(), name.to_string()), value.to_string());
    }

    /// Commits a top-level navigation.
    pub fn navigate(&mut self, url: &str) {
        self.url = url.to_string();
        self.navigations += 1;
    }

    pub fn on_click(&mut self, id: &str, hook: impl Fn(&mut FakeState) + Send + Sync + 'static) {
        self.on_click.insert(id.to_string(), Arc::new(hook));
    }

    pub fn on_goto(&mut self, hook: impl Fn(&mut FakeState, &str) + Send + Sync + 'static) {
        self.on_goto = Some(Arc::new(hook));
    }
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn text_of(&self, element: &ElementHandle) -> String {
        self.with(|s| s.texts.get(element.id()).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<(), ClaimError> {
        self.with(|s| {
            s.gotos.push(url.to_string());
            s.navigate(url);
            if let Some(hook) = s.on_goto.clone() {
                hook(s, url);
            }
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ClaimError> {
        Ok(self.with(|s| s.url.clone()))
    }

    fn navigation_count(&self) -> u64 {
        self.with(|s| s.navigations)
    }

    async fn query_all(
        &self,
        selector: &Selector,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, ClaimError> {
        let key = (root.map(|r| r.id().to_string()), selector.to_string());
        Ok(self.with(|s| {
            s.elements
                .get(&key)
                .map(|ids| ids.iter().map(ElementHandle::new).collect())
                .unwrap_or_default()
        }))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), ClaimError> {
        self.with(|s| {
            s.clicks.push(element.id().to_string());
            if let Some(hook) = s.on_click.get(element.id()).cloned() {
                hook(s);
            }
        });
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), ClaimError> {
        self.with(|s| {
            s.fills.push((element.id().to_string(), value.to_string()));
            s.values.insert(element.id().to_string(), value.to_string());
        });
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), ClaimError> {
        self.with(|s| s.typed.push((element.id().to_string(), text.to_string())));
        Ok(())
    }

    async fn check(&self, element: &ElementHandle) -> Result<(), ClaimError> {
        self.with(|s| s.checks.push(element.id().to_string()));
        Ok(())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, ClaimError> {
        Ok(self.text_of(element))
    }

    async fn input_value(&self, element: &ElementHandle) -> Result<String, ClaimError> {
        Ok(self.with(|s| s.values.get(element.id()).cloned().unwrap_or_default()))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, ClaimError> {
        Ok(self.with(|s| {
            s.attributes
                .get(&(element.id().to_string(), name.to_string()))
                .cloned()
        }))
    }

    async fn screenshot(&self, _capture: Capture<'_>) -> Result<Vec<u8>, ClaimError> {
        self.with(|s| {
            if s.fail_screenshots {
                return Err(ClaimError::Browser("screenshot failed".to_string()));
            }
            s.screenshots += 1;
            Ok(b"\x89PNG".to_vec())
        })
    }

    async fn close(&self) -> Result<(), ClaimError> {
        self.with(|s| s.closed += 1);
        Ok(())
    }
}
