//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod serve;
mod show;
mod threads;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use serve::run_serve;
pub use show::run_show;
pub use threads::run_threads;

/// Shown whenever a turn fails. Details go to the log only.
pub(crate) const GENERATION_FAILED_NOTICE: &str =
    "Sorry, I couldn't generate a response right now. Please try again in a moment.";
