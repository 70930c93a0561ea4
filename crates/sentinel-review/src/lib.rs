//! # sentinel-review
//!
//! Remote review for the Sentinel runtime.
//!
//! This crate provides:
//! - [`ReviewProtocol`]: submit / poll / fetch / report against any
//!   `ReviewBackend`, with per-review deadlines, retrying polls, and run-wide
//!   cancellation through [`AbortSignal`]
//! - [`HttpBackend`]: the REST backend client (reqwest)
//! - [`InMemoryBackend`]: a local backend with a reviewer API
//! - [`HumanSupervisor`] and [`ModelSupervisor`]
//! - [`Reported`]: reports a local supervisor's decisions to the backend
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env();
//! let backend = Arc::new(HttpBackend::new(config.clone())?);
//! let protocol = Arc::new(ReviewProtocol::new(backend, &config));
//! let human = HumanSupervisor::from_config("on-call", protocol, &config)
//!     .with_console(ReviewConsole::stderr());
//! ```

pub mod config;
pub mod console;
pub mod http;
pub mod human;
pub mod memory;
pub mod model;
pub mod protocol;
pub mod reported;

pub use config::ClientConfig;
pub use console::ReviewConsole;
pub use http::HttpBackend;
pub use human::HumanSupervisor;
pub use memory::InMemoryBackend;
pub use model::{ChatCompletionsConfig, ChatCompletionsModel, LanguageModel, ModelSupervisor};
pub use protocol::{AbortSignal, ReviewProtocol};
pub use reported::Reported;
