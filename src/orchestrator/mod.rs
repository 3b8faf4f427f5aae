//! Dashboard: launches and stops the game, collects its scores, serves the
//! control plane over HTTP.
//!
//! - `process`: launcher/child abstraction and the terminate-then-kill stop
//! - `logbook`: bounded event ring with a durable JSON mirror
//! - `dashboard`: the orchestrator-owned state object and its transitions
//! - `server`: axum routes over a shared [`Dashboard`]

pub mod dashboard;
pub mod logbook;
pub mod process;
pub mod server;

pub use dashboard::{Clock, Dashboard, SystemClock, Theme};
pub use logbook::Logbook;
pub use process::{CommandLauncher, Launcher, StopPolicy};
pub use server::{SharedDashboard, router};
