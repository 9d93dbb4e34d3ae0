//! SageAI server
//!
//! A chat backend that answers questions grounded on user-uploaded files by
//! driving a remote assistant run to completion.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server
//! - **Grounded chat**: multi-step job orchestration (context, entry, run,
//!   polling, answer extraction) over an injected provider capability
//! - **OpenAI client**: Assistants API provider and file upload
//!
//! # Modules
//!
//! - [`api`]: HTTP handlers and router
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`grounded`]: orchestrator, poll loop, error taxonomy
//! - [`openai`]: reqwest-based OpenAI client
//! - [`server`]: state wiring and server startup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod config;
pub mod grounded;
pub mod openai;
pub mod server;

use crate::config::AppConfig;

use grounded::GroundedChatOrchestrator;
use openai::FileUploader;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Grounded chat orchestrator; `None` when no assistant is configured.
    pub grounded: Option<GroundedChatOrchestrator>,
    /// File uploader; `None` when no API key is configured.
    pub uploader: Option<Arc<dyn FileUploader>>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
