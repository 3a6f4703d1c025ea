//! DoctorBot - a conversational medical information assistant
//!
//! A ReAct-style agent that answers health questions by deciding, turn by
//! turn, whether to consult a tool (a local document index or a web search)
//! or to give a final answer. Every conversation is a resumable thread.
//!
//! # Architecture
//!
//! - `agent` - message model, protocol parser, router, agent step, tool
//!   executor and the graph runner that drives a turn
//! - `tools` - the `Tool` trait, the registry and the built-in tools
//! - `llm` - text generation over an OpenAI-compatible API
//! - `threads` - durable per-thread conversation snapshots
//! - `embedding` / `vector_store` - the similarity index read by the retriever
//! - `orchestrator` - wires all of the above from `config`
//!
//! # Example
//!
//! ```rust,no_run
//! use doctorbot::config::Settings;
//! use doctorbot::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings, None)?;
//!
//!     let result = orchestrator
//!         .runner()
//!         .run_turn("my-thread", "I have a fever and a headache")
//!         .await?;
//!     println!("{}", result.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod threads;
pub mod tools;
pub mod vector_store;

pub use error::{DoctorBotError, Result};
