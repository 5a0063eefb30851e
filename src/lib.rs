//! A client for the beanstalkd TCP work queue protocol.
//!
//! A [`Connection`] owns one TCP stream and issues one command at a time,
//! waiting for the full response before returning. Producers `use` a tube and
//! `put` jobs into it; consumers `watch` tubes, `reserve` jobs, and then
//! `delete`, `release`, or `bury` them.
//!
//! ```no_run
//! # async fn run() -> enchanted_client::Result<()> {
//! use std::time::Duration;
//!
//! use enchanted_client::Connection;
//!
//! let mut conn = Connection::connect("127.0.0.1:11300").await?;
//! conn.use_tube("emails").await?;
//! let id = conn
//!     .put(b"hello", 0, Duration::ZERO, Duration::from_secs(30))
//!     .await?;
//!
//! conn.watch("emails").await?;
//! let job = conn.reserve().await?;
//! assert_eq!(job.id(), id);
//! conn.delete(job.id()).await?;
//! conn.quit().await;
//! # Ok(())
//! # }
//! ```
pub mod connection;
pub mod error;
pub mod line_reader;
pub mod parser;
pub mod transport;
pub mod types;
pub mod util;

pub use connection::Connection;
pub use error::{Error, Result, ServerError};
pub use types::job::Job;
pub use types::stats;
