//! protube-dl - client for a remote video download service.
//!
//! The library turns pasted links into tracked download sessions: it fetches
//! metadata, asks the service for the finished file, reports progress either
//! from pushed service events or from a client-side simulation, and hands
//! every state change to a [`PresentationSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use protube_dl::{ClientConfig, Coordinator, HttpRemote, NullSink};
//!
//! # async fn example() -> protube_dl::Result<()> {
//! let config = ClientConfig::default().with_api_url("http://127.0.0.1:5000");
//! let remote = HttpRemote::new(&config)?;
//! let coordinator = Coordinator::new(remote, config, Arc::new(NullSink));
//!
//! let summary = coordinator
//!     .submit_links("https://www.youtube.com/watch?v=abc\n", "720p", "mp4")
//!     .await?;
//! println!("{} saved, {} failed", summary.completed_count(), summary.failed_count());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod filename;
pub mod format;
pub mod fs;
pub mod links;
pub mod progress;
pub mod remote;
pub mod session;
pub mod sink;
pub mod stats;
pub mod tracker;

// Re-export main types for convenience
pub use config::{AppConfig, ClientConfig, ProgressMode};
pub use download::{Coordinator, LinkOutcome};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration};
pub use fs::{DiskSaver, FileSystem, TokioFileSystem};
pub use links::{parse_links, require_links, require_playlist_link};
pub use progress::{ProgressReporter, ProgressSource, SimulationSettings};
pub use remote::{HttpRemote, PushChannel, PushEvent, RemoteService};
pub use session::{PlaylistProgress, Session, SessionState};
pub use sink::{NoticeBoard, NoticeKind, NullSink, PresentationSink};
pub use stats::{BatchSummary, FailedLink};
pub use tracker::{SessionHandle, SessionTracker};
