//! Ingestion orchestration module.
//!
//! [`EmailCollector`] is the single trigger surface: it runs the poll,
//! merge, and classify pass over every linked account of a user, either
//! inline or detached on the runtime, and carries the message actions
//! (delete, archive, unsubscribe, fetch). Runs publish progress through a
//! [`RunTracker`] and finish with a [`RunReport`].

pub mod actions;
pub mod error;
pub mod poll;
pub mod progress;
pub mod runner;

pub use error::CollectorError;
pub use poll::DEFAULT_REFRESH_BUFFER_SECONDS;
pub use progress::{RunHandle, RunPhase, RunState, RunStatus, RunTracker};
pub use runner::{EmailCollector, RunOutcome, RunReport};
