//! YÖK Akademik collaborator scraper
//!
//! Searches the YÖK Akademik researcher registry for a name, collects the
//! matching profiles, and reads the collaboration graph of a chosen profile.
//! Results are written incrementally as JSON snapshots in a per-session
//! directory while a dispatcher turns snapshot changes into session events.
//!
//! # Features
//!
//! - **Incremental snapshots**: every result page and every collaborator is
//!   persisted atomically as soon as it is read
//! - **Session dispatcher**: one coordinator task, file watching, and a
//!   subscriber queue per consumer
//! - **Headless Chromium**: driven over CDP with `chromiumoxide`
//!
//! # Example
//!
//! ```no_run
//! use yok_akademik::dispatch::{Dispatcher, ProcessLauncher};
//! use yok_akademik::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let launcher = ProcessLauncher::current(&config)?;
//!     let handle = Dispatcher::new(config, launcher).spawn();
//!
//!     let session_id = handle.start_session("Ayşe Kaya").await?;
//!     let mut events = handle.subscribe(session_id.as_str()).await?;
//!     while let Some(event) = events.recv().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod feed;
pub mod models;
pub mod store;

pub use config::Config;
pub use dispatch::{Dispatcher, DispatcherHandle, ProfileSelector};
pub use error::{BrowserError, DispatchError, ScrapeError, StoreError};
pub use store::{SessionDir, SessionStore};
