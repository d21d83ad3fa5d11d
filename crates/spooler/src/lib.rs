//! Spooled byte streams that live in memory when small and on disk when large.
//!
//! A [`Spooler`] decides, from the number of bytes a caller expects to hold,
//! whether a new [`SpooledStream`] is backed by a pre-sized memory buffer or
//! by a file. The stream is seekable either way and owns the cleanup of its
//! backing file: closing, disposing or dropping it removes the file according
//! to its [`DisposePolicy`].
//!
//! # Key Features
//!
//! - **Threshold selection**: lengths below [`SpoolOptions::threshold`] stay in memory
//! - **Idempotent disposal**: teardown runs once, never fails, and reports delete errors to a [`DeleteErrorSink`]
//! - **Transform pipelines**: copies can run through nested [`Transform`]s that observe bytes in flight
//! - **Cancellable copies**: a failed or canceled copy never leaves its file behind
//!
//! # Example
//!
//! ```
//! use spooler::{CopyOptions, SpoolOptions, Spooler};
//! use tokio::io::AsyncReadExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> spooler::Result<()> {
//! let spooler = Spooler::new(SpoolOptions::new().threshold(1024));
//! let data = vec![1u8; 4096];
//!
//! let mut stream = spooler
//!     .copy_to_spooled_stream(data.as_slice(), data.len() as u64, CopyOptions::new())
//!     .await?;
//! assert!(stream.is_file_based());
//!
//! stream.rewind().await?;
//! let mut out = Vec::new();
//! stream.read_to_end(&mut out).await?;
//! assert_eq!(out, data);
//! # Ok(())
//! # }
//! ```

pub use self::copy::{CopyOptions, DEFAULT_COPY_BUFFER_SIZE};
pub use self::error::{Error, Result};
pub use self::medium::Medium;
pub use self::options::{
    DEFAULT_FILE_BUFFER_SIZE, DEFAULT_TEMP_PREFIX, DEFAULT_THRESHOLD, DisposePolicy, FileAccess, FileMode,
    FileOptions, FileShare, SpoolOptions,
};
pub use self::sink::{DeleteErrorSink, LogSink, NoopSink};
pub use self::spooler::Spooler;
pub use self::stream::SpooledStream;
pub use self::transform::{BoxWriter, Transform, TransformStage};
pub use tokio_util::sync::CancellationToken;

mod copy;
mod error;
mod medium;
mod options;
mod sink;
mod spooler;
mod stream;
pub mod transform;
