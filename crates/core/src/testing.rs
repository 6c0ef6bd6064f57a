//! Scripted in-memory browser session for tests.
//!
//! [`FakeSession`] keeps a tiny model of a page: a URL, a set of visible
//! selectors, form values and a few behaviors wired to clicks, fills and
//! navigations. Selectors are matched by exact string, so tests use the same
//! selector constants as the code under test.
//!
//! Time-based changes go through [`FakeSession::schedule`]; they are applied
//! lazily whenever the session is read, which keeps them deterministic under
//! `#[tokio::test(start_paused = true)]`.
//!
//! ```ignore
//! let session = FakeSession::new("https://site/login");
//! session.schedule(Duration::from_secs(12), Mutation::Navigate("https://site/home".into()));
//! session.on_click_hide("#banner-accept", "#banner-accept");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::{E2eError, Result};
use crate::session::{BrowserSession, LoadState, SessionFactory};

/// A change to the fake page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	Show(String),
	Hide(String),
	Navigate(String),
	Enable(String),
	Disable(String),
	SetText(String, String),
	SetValue(String, String),
}

/// Computes page changes from the value just typed into an input.
pub type FillHook = Arc<dyn Fn(&str) -> Vec<Mutation> + Send + Sync>;

/// Comparable view of the page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
	pub url: String,
	pub visible: BTreeSet<String>,
	pub disabled: BTreeSet<String>,
	pub values: BTreeMap<String, String>,
}

#[derive(Default)]
struct State {
	url: String,
	visible: BTreeSet<String>,
	disabled: BTreeSet<String>,
	texts: BTreeMap<String, String>,
	values: BTreeMap<String, String>,
	attributes: HashMap<(String, String), String>,
	failing_queries: BTreeSet<String>,
	hanging_queries: BTreeSet<String>,
	failing_clicks: BTreeSet<String>,
	redirects: HashMap<String, String>,
	on_click: Vec<(String, Mutation)>,
	on_goto: Vec<(String, Mutation)>,
	on_fill: Vec<(String, FillHook)>,
	scheduled: Vec<(Instant, Mutation)>,
	clicks: Vec<String>,
	presses: Vec<(String, String)>,
	visits: Vec<String>,
	evaluations: Vec<String>,
	screenshots: Vec<PathBuf>,
	queries: HashMap<String, usize>,
	storage: serde_json::Value,
	restored: Option<serde_json::Value>,
	closed: bool,
}

impl State {
	fn apply(&mut self, mutation: Mutation) {
		match mutation {
			Mutation::Show(sel) => {
				self.visible.insert(sel);
			}
			Mutation::Hide(sel) => {
				self.visible.remove(&sel);
			}
			Mutation::Navigate(url) => self.url = url,
			Mutation::Enable(sel) => {
				self.disabled.remove(&sel);
			}
			Mutation::Disable(sel) => {
				self.disabled.insert(sel);
			}
			Mutation::SetText(sel, text) => {
				self.texts.insert(sel, text);
			}
			Mutation::SetValue(sel, value) => {
				self.values.insert(sel, value);
			}
		}
	}

	fn apply_due(&mut self) {
		let now = Instant::now();
		let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
			.into_iter()
			.partition(|(at, _)| *at <= now);
		self.scheduled = pending;
		for (_, mutation) in due {
			self.apply(mutation);
		}
	}

	fn set_value(&mut self, selector: &str, value: &str) {
		self.values.insert(selector.to_string(), value.to_string());
		let hooks: Vec<FillHook> = self
			.on_fill
			.iter()
			.filter(|(sel, _)| sel == selector)
			.map(|(_, hook)| Arc::clone(hook))
			.collect();
		for hook in hooks {
			for mutation in hook(value) {
				self.apply(mutation);
			}
		}
	}
}

pub struct FakeSession {
	created: Instant,
	state: Mutex<State>,
}

impl std::fmt::Debug for FakeSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FakeSession").field("url", &self.state.lock().url).finish()
	}
}

enum QueryPlan {
	Answer,
	Fail,
	Hang,
}

impl FakeSession {
	pub fn new(url: &str) -> Self {
		Self {
			created: Instant::now(),
			state: Mutex::new(State {
				url: url.to_string(),
				storage: serde_json::json!({ "cookies": [], "origins": [] }),
				..State::default()
			}),
		}
	}

	pub fn show(&self, selector: &str) {
		self.state.lock().visible.insert(selector.to_string());
	}

	pub fn hide(&self, selector: &str) {
		self.state.lock().visible.remove(selector);
	}

	pub fn disable(&self, selector: &str) {
		self.state.lock().disabled.insert(selector.to_string());
	}

	pub fn set_text(&self, selector: &str, text: &str) {
		self.state.lock().texts.insert(selector.to_string(), text.to_string());
	}

	pub fn set_value(&self, selector: &str, value: &str) {
		self.state.lock().values.insert(selector.to_string(), value.to_string());
	}

	pub fn set_attribute(&self, selector: &str, name: &str, value: &str) {
		self.state
			.lock()
			.attributes
			.insert((selector.to_string(), name.to_string()), value.to_string());
	}

	pub fn set_storage(&self, state: serde_json::Value) {
		self.state.lock().storage = state;
	}

	/// Queries against `selector` return an engine-style error.
	pub fn fail_queries(&self, selector: &str) {
		self.state.lock().failing_queries.insert(selector.to_string());
	}

	/// Queries against `selector` never resolve.
	pub fn hang_queries(&self, selector: &str) {
		self.state.lock().hanging_queries.insert(selector.to_string());
	}

	pub fn fail_clicks(&self, selector: &str) {
		self.state.lock().failing_clicks.insert(selector.to_string());
	}

	/// Navigating to `from` lands on `to` instead.
	pub fn redirect(&self, from: &str, to: &str) {
		self.state.lock().redirects.insert(from.to_string(), to.to_string());
	}

	pub fn on_click(&self, selector: &str, mutation: Mutation) {
		self.state.lock().on_click.push((selector.to_string(), mutation));
	}

	pub fn on_click_hide(&self, click: &str, hide: &str) {
		self.on_click(click, Mutation::Hide(hide.to_string()));
	}

	/// Apply `mutation` whenever navigation lands on a URL containing `fragment`.
	pub fn on_goto(&self, fragment: &str, mutation: Mutation) {
		self.state.lock().on_goto.push((fragment.to_string(), mutation));
	}

	/// Run `hook` with the new value every time `selector` is filled or cleared.
	pub fn on_fill(&self, selector: &str, hook: impl Fn(&str) -> Vec<Mutation> + Send + Sync + 'static) {
		let hook: FillHook = Arc::new(hook);
		self.state.lock().on_fill.push((selector.to_string(), hook));
	}

	/// Apply `mutation` once `after` has elapsed since the session was created.
	pub fn schedule(&self, after: Duration, mutation: Mutation) {
		self.state.lock().scheduled.push((self.created + after, mutation));
	}

	pub fn snapshot(&self) -> Snapshot {
		let mut state = self.state.lock();
		state.apply_due();
		Snapshot {
			url: state.url.clone(),
			visible: state.visible.clone(),
			disabled: state.disabled.clone(),
			values: state.values.clone(),
		}
	}

	pub fn clicks(&self) -> Vec<String> {
		self.state.lock().clicks.clone()
	}

	pub fn presses(&self) -> Vec<(String, String)> {
		self.state.lock().presses.clone()
	}

	pub fn visits(&self) -> Vec<String> {
		self.state.lock().visits.clone()
	}

	pub fn evaluations(&self) -> Vec<String> {
		self.state.lock().evaluations.clone()
	}

	pub fn screenshots(&self) -> Vec<PathBuf> {
		self.state.lock().screenshots.clone()
	}

	pub fn restored_state(&self) -> Option<serde_json::Value> {
		self.state.lock().restored.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	pub fn queries_for(&self, selector: &str) -> usize {
		self.state.lock().queries.get(selector).copied().unwrap_or(0)
	}

	pub fn total_queries(&self) -> usize {
		self.state.lock().queries.values().sum()
	}

	async fn query<T>(&self, selector: &str, read: impl FnOnce(&State) -> T) -> Result<T> {
		let plan = {
			let mut state = self.state.lock();
			state.apply_due();
			*state.queries.entry(selector.to_string()).or_default() += 1;
			if state.hanging_queries.contains(selector) {
				QueryPlan::Hang
			} else if state.failing_queries.contains(selector) {
				QueryPlan::Fail
			} else {
				QueryPlan::Answer
			}
		};
		match plan {
			QueryPlan::Answer => Ok(read(&self.state.lock())),
			QueryPlan::Fail => Err(E2eError::JsEval(format!("element query failed: {selector}"))),
			QueryPlan::Hang => std::future::pending().await,
		}
	}
}

#[async_trait]
impl BrowserSession for FakeSession {
	async fn goto(&self, url: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.apply_due();
		state.visits.push(url.to_string());
		let landed = state.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
		state.url = landed.clone();
		let effects: Vec<Mutation> = state
			.on_goto
			.iter()
			.filter(|(fragment, _)| landed.contains(fragment.as_str()))
			.map(|(_, mutation)| mutation.clone())
			.collect();
		for mutation in effects {
			state.apply(mutation);
		}
		Ok(())
	}

	fn url(&self) -> String {
		let mut state = self.state.lock();
		state.apply_due();
		state.url.clone()
	}

	async fn wait_for_load_state(&self, _state: LoadState) -> Result<()> {
		Ok(())
	}

	async fn is_visible(&self, selector: &str) -> Result<bool> {
		self.query(selector, |s| s.visible.contains(selector)).await
	}

	async fn is_enabled(&self, selector: &str) -> Result<bool> {
		self.query(selector, |s| !s.disabled.contains(selector)).await
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		self.query(selector, |s| usize::from(s.visible.contains(selector))).await
	}

	async fn text(&self, selector: &str) -> Result<Option<String>> {
		self.query(selector, |s| s.texts.get(selector).cloned()).await
	}

	async fn input_value(&self, selector: &str) -> Result<String> {
		self.query(selector, |s| s.values.get(selector).cloned().unwrap_or_default())
			.await
	}

	async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
		self.query(selector, |s| {
			s.attributes
				.get(&(selector.to_string(), name.to_string()))
				.cloned()
		})
		.await
	}

	async fn click(&self, selector: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.apply_due();
		if state.failing_clicks.contains(selector) {
			return Err(E2eError::JsEval(format!("element is not attached: {selector}")));
		}
		state.clicks.push(selector.to_string());
		let effects: Vec<Mutation> = state
			.on_click
			.iter()
			.filter(|(sel, _)| sel == selector)
			.map(|(_, mutation)| mutation.clone())
			.collect();
		for mutation in effects {
			state.apply(mutation);
		}
		Ok(())
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.apply_due();
		state.set_value(selector, value);
		Ok(())
	}

	async fn clear(&self, selector: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.apply_due();
		state.set_value(selector, "");
		Ok(())
	}

	async fn press(&self, selector: &str, key: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.apply_due();
		state.presses.push((selector.to_string(), key.to_string()));
		if key == "Delete" || key == "Backspace" {
			state.set_value(selector, "");
		}
		Ok(())
	}

	async fn evaluate(&self, expression: &str) -> Result<String> {
		self.state.lock().evaluations.push(expression.to_string());
		Ok("null".to_string())
	}

	async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<()> {
		self.state.lock().screenshots.push(path.to_path_buf());
		Ok(())
	}

	async fn storage_state(&self) -> Result<serde_json::Value> {
		Ok(self.state.lock().storage.clone())
	}

	async fn restore_storage_state(&self, state: &serde_json::Value) -> Result<()> {
		self.state.lock().restored = Some(state.clone());
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.state.lock().closed = true;
		Ok(())
	}
}

/// Hands out a fresh scripted session per scenario.
pub struct FakeFactory {
	build: Box<dyn Fn(&str) -> Arc<FakeSession> + Send + Sync>,
	opened: Mutex<Vec<(String, Arc<FakeSession>)>>,
}

impl FakeFactory {
	pub fn new(build: impl Fn(&str) -> Arc<FakeSession> + Send + Sync + 'static) -> Self {
		Self {
			build: Box::new(build),
			opened: Mutex::new(Vec::new()),
		}
	}

	/// Sessions opened so far, keyed by scenario name.
	pub fn opened(&self) -> Vec<(String, Arc<FakeSession>)> {
		self.opened.lock().clone()
	}

	pub fn session_for(&self, scenario: &str) -> Option<Arc<FakeSession>> {
		self.opened
			.lock()
			.iter()
			.find(|(name, _)| name == scenario)
			.map(|(_, session)| Arc::clone(session))
	}
}

#[async_trait]
impl SessionFactory for FakeFactory {
	async fn open(&self, scenario: &str) -> Result<Arc<dyn BrowserSession>> {
		let session = (self.build)(scenario);
		self.opened.lock().push((scenario.to_string(), Arc::clone(&session)));
		Ok(session as Arc<dyn BrowserSession>)
	}
}
