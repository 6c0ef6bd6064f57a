//! loyalty-e2e: end-to-end flows for the Monster Energy loyalty campaign site
//!
//! The crate drives a real browser through the login form, hands the SMS step
//! to a human, saves the resulting auth state and replays it for the
//! protected-page scenarios.
//!
//! Everything that touches the page goes through [`session::BrowserSession`],
//! so the flows run unchanged against Playwright (`engine`) or the scripted
//! fake in `testing`.

pub mod auth_state;
pub mod banner;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod expect;
pub mod handoff;
pub mod harness;
pub mod heuristic;
pub mod logging;
pub mod pages;
pub mod probe;
pub mod session;
pub mod suite;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod verify;

pub use auth_state::{AuthState, AuthSummary};
pub use banner::{BannerDismisser, Dismissal};
pub use config::SuiteConfig;
pub use engine::{PlaywrightLauncher, PlaywrightSession};
pub use error::{E2eError, ErrorCode, Result};
pub use handoff::{HandoffOutcome, ManualHandoff};
pub use harness::{Project, Registry, RunReport, Runner, Scenario, ScenarioReport, Selection, Status};
pub use heuristic::{CompletionReason, SuccessRules};
pub use session::{BrowserSession, LoadState, SessionFactory};
pub use verify::VerifiedLogin;
