//! Handing control to a human and waiting for the result.
//!
//! The login flow needs someone to read an SMS code and type it in. The
//! automation fills what it can, then [`ManualHandoff::await_completion`]
//! polls the page at a fixed cadence until the post-login view shows up or
//! the budget runs out.
//!
//! Each tick is two phases: banner dismissal (result discarded), then a
//! read-only evaluation. Running out of budget is a normal outcome
//! ([`HandoffOutcome::TimedOut`]), not an error; the caller decides what a
//! timeout means.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::banner::BannerDismisser;
use crate::config::SuiteConfig;
use crate::error::{E2eError, Result};
use crate::heuristic::{CompletionReason, SuccessRules};
use crate::session::BrowserSession;

/// State of one wait. Consumed when it resolves.
#[derive(Debug)]
pub struct PollSession {
	started: Instant,
	deadline: Instant,
	initial_url: String,
	last_observed_url: String,
	ticks: u32,
}

impl PollSession {
	pub fn start(initial_url: String, budget: Duration) -> Self {
		let started = Instant::now();
		Self {
			started,
			deadline: started + budget,
			last_observed_url: initial_url.clone(),
			initial_url,
			ticks: 0,
		}
	}

	pub fn expired(&self) -> bool {
		Instant::now() >= self.deadline
	}

	/// Latest instant a tick's page queries may run until.
	pub fn tick_limit(&self, interval: Duration) -> Instant {
		self.deadline + interval
	}

	pub fn observe(&mut self, url: String) {
		self.ticks += 1;
		self.last_observed_url = url;
	}

	pub fn url_changed(&self) -> bool {
		self.last_observed_url != self.initial_url
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	pub fn initial_url(&self) -> &str {
		&self.initial_url
	}

	fn complete(self, reason: CompletionReason) -> HandoffOutcome {
		HandoffOutcome::Completed {
			reason,
			ticks: self.ticks,
			elapsed: self.started.elapsed(),
			url: self.last_observed_url,
		}
	}

	fn time_out(self) -> HandoffOutcome {
		HandoffOutcome::TimedOut {
			ticks: self.ticks,
			elapsed: self.started.elapsed(),
			url: self.last_observed_url,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum HandoffOutcome {
	Completed {
		reason: CompletionReason,
		ticks: u32,
		#[serde(serialize_with = "as_millis")]
		elapsed: Duration,
		url: String,
	},
	TimedOut {
		ticks: u32,
		#[serde(serialize_with = "as_millis")]
		elapsed: Duration,
		url: String,
	},
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
	s.serialize_u64(d.as_millis() as u64)
}

impl HandoffOutcome {
	pub fn completed(&self) -> bool {
		matches!(self, HandoffOutcome::Completed { .. })
	}

	pub fn ticks(&self) -> u32 {
		match self {
			HandoffOutcome::Completed { ticks, .. } | HandoffOutcome::TimedOut { ticks, .. } => *ticks,
		}
	}

	pub fn elapsed(&self) -> Duration {
		match self {
			HandoffOutcome::Completed { elapsed, .. } | HandoffOutcome::TimedOut { elapsed, .. } => *elapsed,
		}
	}

	pub fn url(&self) -> &str {
		match self {
			HandoffOutcome::Completed { url, .. } | HandoffOutcome::TimedOut { url, .. } => url,
		}
	}

	/// The completion reason, or [`E2eError::HandoffNotCompleted`] for callers
	/// that cannot continue without the human.
	pub fn require_completed(&self) -> Result<CompletionReason> {
		match self {
			HandoffOutcome::Completed { reason, .. } => Ok(*reason),
			HandoffOutcome::TimedOut { elapsed, url, .. } => Err(E2eError::HandoffNotCompleted {
				waited_secs: elapsed.as_secs(),
				url: url.clone(),
			}),
		}
	}
}

#[derive(Debug, Clone)]
pub struct ManualHandoff {
	banner: BannerDismisser,
	rules: SuccessRules,
	interval: Duration,
}

impl ManualHandoff {
	pub fn new(banner: BannerDismisser, rules: SuccessRules, interval: Duration) -> Self {
		Self { banner, rules, interval }
	}

	pub fn from_config(config: &SuiteConfig) -> Result<Self> {
		Ok(Self::new(
			BannerDismisser::cookie_consent(&config.banner),
			SuccessRules::campaign(config.host()?, config.heuristic.clone()),
			config.handoff.interval(),
		))
	}

	pub fn rules(&self) -> &SuccessRules {
		&self.rules
	}

	pub fn banner(&self) -> &BannerDismisser {
		&self.banner
	}

	/// Wait for a human to finish an out-of-band step.
	///
	/// Sleeps one interval per tick and cuts a tick's page queries off at
	/// `budget + interval`, so the call returns no later than one interval
	/// after `budget`. A zero budget returns [`HandoffOutcome::TimedOut`]
	/// without polling.
	pub async fn await_completion(&self, session: &dyn BrowserSession, budget: Duration, message: &str) -> HandoffOutcome {
		announce(message, budget);

		let mut poll = PollSession::start(session.url(), budget);

		while !poll.expired() {
			tokio::time::sleep(self.interval).await;

			// Slow queries must not stretch the wait past one interval over budget.
			let tick = tokio::time::timeout_at(poll.tick_limit(self.interval), async {
				let _ = self.banner.dismiss_if_present(session).await;
				let url = session.url();
				let evaluation = self.rules.evaluate_at(session, &url).await;
				(url, evaluation)
			})
			.await;
			let Ok((url, evaluation)) = tick else {
				poll.observe(session.url());
				warn!(elapsed_secs = poll.elapsed().as_secs(), "page queries overran the wait, counting tick as not complete");
				continue;
			};
			poll.observe(url);

			let reason = evaluation
				.reason
				.or_else(|| poll.url_changed().then_some(CompletionReason::UrlChanged));

			if let Some(reason) = reason {
				info!(
					%reason,
					from = poll.initial_url(),
					to = %evaluation.url,
					primary = evaluation.primary_visible,
					secondary = evaluation.secondary_visible,
					"manual step detected"
				);
				return poll.complete(reason);
			}

			info!(elapsed_secs = poll.elapsed().as_secs(), url = %evaluation.url, "still waiting for manual step");
		}

		let outcome = poll.time_out();
		info!(elapsed_secs = outcome.elapsed().as_secs(), url = outcome.url(), "manual step wait timed out, continuing");
		outcome
	}
}

fn announce(message: &str, budget: Duration) {
	info!(budget_secs = budget.as_secs(), "{message}");
	eprintln!();
	eprintln!("{message}");
	eprintln!("Timeout: {} seconds", budget.as_secs());
	eprintln!("Waiting for manual operations...");
	eprintln!();
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{BannerConfig, HeuristicConfig};
	use crate::testing::{FakeSession, Mutation};

	const A: &str = r#"text="ENTER TAB CODE HERE""#;
	const B: &str = r#"text="PROGRAMS""#;
	const D: &str = r#"input[placeholder*="ENTER TAB CODE"]"#;
	const BANNER: &str = r#"button:has-text("ACCEPT COOKIES")"#;

	fn handoff() -> ManualHandoff {
		ManualHandoff::new(
			BannerDismisser::cookie_consent(&BannerConfig::default()),
			SuccessRules::campaign("site", HeuristicConfig::default()),
			Duration::from_secs(5),
		)
	}

	#[tokio::test(start_paused = true)]
	async fn budget_equal_to_interval_times_out_after_one_tick() {
		let session = FakeSession::new("https://site/login");
		let started = Instant::now();

		let outcome = handoff().await_completion(&session, Duration::from_secs(5), "waiting").await;

		assert!(!outcome.completed());
		assert_eq!(outcome.ticks(), 1);
		assert_eq!(started.elapsed(), Duration::from_secs(5));
	}

	#[tokio::test(start_paused = true)]
	async fn timed_out_outcome_maps_to_handoff_error() {
		let session = FakeSession::new("https://site/login");
		let outcome = handoff().await_completion(&session, Duration::from_secs(10), "waiting").await;

		let err = outcome.require_completed().unwrap_err();
		assert!(matches!(err, E2eError::HandoffNotCompleted { waited_secs: 10, .. }));
		assert_eq!(err.code(), crate::error::ErrorCode::HandoffNotCompleted);
	}

	#[tokio::test(start_paused = true)]
	async fn zero_budget_never_polls() {
		let session = FakeSession::new("https://site/login");
		let outcome = handoff().await_completion(&session, Duration::ZERO, "waiting").await;
		assert_eq!(outcome.ticks(), 0);
		assert_eq!(session.total_queries(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn returns_on_the_first_tick_markers_show() {
		let session = FakeSession::new("https://site/login");
		// Markers land between the third and fourth tick.
		session.schedule(Duration::from_secs(17), Mutation::Show(A.into()));
		session.schedule(Duration::from_secs(17), Mutation::Show(B.into()));
		session.schedule(Duration::from_secs(17), Mutation::Show(D.into()));

		let outcome = handoff().await_completion(&session, Duration::from_secs(300), "waiting").await;

		assert!(matches!(
			outcome,
			HandoffOutcome::Completed {
				reason: CompletionReason::Markers,
				ticks: 4,
				..
			}
		));
		assert_eq!(outcome.elapsed(), Duration::from_secs(20));
	}

	#[tokio::test(start_paused = true)]
	async fn url_change_alone_completes() {
		let session = FakeSession::new("https://site/login");
		session.schedule(Duration::from_secs(6), Mutation::Navigate("https://site/login/verify".into()));

		let outcome = handoff().await_completion(&session, Duration::from_secs(60), "waiting").await;

		assert!(matches!(
			outcome,
			HandoffOutcome::Completed {
				reason: CompletionReason::UrlChanged,
				ticks: 2,
				..
			}
		));
		assert_eq!(outcome.url(), "https://site/login/verify");
	}

	#[tokio::test(start_paused = true)]
	async fn markers_win_tie_with_url_change() {
		let session = FakeSession::new("https://site/login");
		session.schedule(Duration::from_secs(3), Mutation::Navigate("https://site/home".into()));
		session.schedule(Duration::from_secs(3), Mutation::Show(A.into()));
		session.schedule(Duration::from_secs(3), Mutation::Show(B.into()));
		session.schedule(Duration::from_secs(3), Mutation::Show(D.into()));

		let outcome = handoff().await_completion(&session, Duration::from_secs(60), "waiting").await;
		assert!(matches!(
			outcome,
			HandoffOutcome::Completed {
				reason: CompletionReason::Markers,
				ticks: 1,
				..
			}
		));
	}

	#[tokio::test(start_paused = true)]
	async fn banner_is_dismissed_during_polling() {
		let session = FakeSession::new("https://site/login");
		session.schedule(Duration::from_secs(7), Mutation::Show(BANNER.into()));
		session.on_click_hide(BANNER, BANNER);

		let outcome = handoff().await_completion(&session, Duration::from_secs(15), "waiting").await;

		assert!(!outcome.completed());
		assert_eq!(session.clicks(), vec![BANNER.to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn returns_within_budget_plus_one_interval() {
		for budget_secs in [1u64, 4, 5, 6, 11, 30] {
			let session = FakeSession::new("https://site/login");
			let started = Instant::now();
			let budget = Duration::from_secs(budget_secs);

			let outcome = handoff().await_completion(&session, budget, "waiting").await;

			assert!(!outcome.completed());
			assert!(started.elapsed() >= budget);
			assert!(started.elapsed() <= budget + Duration::from_secs(5), "budget {budget_secs}s overran");
		}
	}

	#[tokio::test(start_paused = true)]
	async fn hanging_queries_are_cut_off_at_budget_plus_interval() {
		let session = FakeSession::new("https://site/login");
		let handoff = handoff();
		let selectors = handoff
			.banner()
			.probes()
			.iter()
			.chain(handoff.rules().primary().iter())
			.chain(handoff.rules().secondary().iter())
			.map(|probe| probe.selector.clone())
			.collect::<Vec<_>>();
		for selector in &selectors {
			session.show(selector);
			session.hang_queries(selector);
		}
		let started = Instant::now();

		let outcome = handoff.await_completion(&session, Duration::from_secs(5), "waiting").await;

		assert!(!outcome.completed());
		assert_eq!(outcome.ticks(), 1);
		assert_eq!(started.elapsed(), Duration::from_secs(10));
	}

	#[test]
	fn outcome_serializes_with_status_tag() {
		let outcome = HandoffOutcome::TimedOut {
			ticks: 60,
			elapsed: Duration::from_secs(300),
			url: "https://site/login".into(),
		};
		let json = serde_json::to_value(&outcome).unwrap();
		assert_eq!(json["status"], "timedOut");
		assert_eq!(json["elapsed"], 300_000);
	}
}
