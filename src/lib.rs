//! # dropp-client
//!
//! Client library for the dropp personal file storage service.
//!
//! - **Session**: token + user id from the `dropp://auth` login callback,
//!   persisted through a typed [`session::SessionStore`] (JSON file or OS
//!   keychain).
//! - **API**: bearer-authenticated list, quota, upload, delete and signed
//!   blob download ([`api`]).
//! - **Transfers**: refresh, quota-checked upload, download to disk and
//!   delete, run on tokio worker tasks with results delivered through a
//!   single completion queue ([`transfer`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use dropp_client::api::ApiClient;
//! use dropp_client::session::SessionManager;
//! use dropp_client::transfer::{run_until_idle, Action, FileBrowser, TransferWorkflow};
//!
//! # async fn example() -> dropp_client::Result<()> {
//! let api = Arc::new(ApiClient::new(dropp_client::api::DEFAULT_BASE_URL)?);
//! let session = SessionManager::in_memory();
//! session.complete_login("dropp://auth?session_token=abc&user_id=42")?;
//!
//! let (workflow, mut completions) = TransferWorkflow::new(api, session, "downloads".into());
//! let mut browser = FileBrowser::new();
//! browser.dispatch(&workflow, Action::Refresh);
//! run_until_idle(&workflow, &mut completions, &mut browser).await;
//!
//! for file in browser.files() {
//!     println!("{} ({} bytes)", file.name, file.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod session;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DroppError, Result};
pub use format::format_bytes;
