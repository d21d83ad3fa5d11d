//! Copy orchestration: spool a source into a fresh [`SpooledStream`],
//! optionally through a chain of [`Transform`]s.
//!
//! A copy that fails for any reason (I/O, a transform, cancellation) disposes
//! the stream it created before the error is returned, so no backing file
//! outlives a failed call. The returned stream is left positioned after the
//! last copied byte; callers seek back to the start before reading.

use std::future::Future;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::transform::{self, Transform};
use crate::{Error, Result, SpoolOptions, SpooledStream, Spooler};

pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Per-call parameters for [`Spooler::copy_to_spooled_stream`].
#[derive(Clone, Debug, Default)]
pub struct CopyOptions {
    pub file_path:   Option<PathBuf>,
    pub options:     Option<SpoolOptions>,
    pub buffer_size: Option<usize>,
    pub cancel:      Option<CancellationToken>,
}

impl CopyOptions {
    pub fn new() -> Self { Self::default() }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn options(mut self, options: SpoolOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn resolved_buffer_size(&self) -> Result<usize> {
        match self.buffer_size {
            Some(0) => Err(Error::InvalidArgument("copy buffer size must be positive".into())),
            Some(size) => Ok(size),
            None => Ok(DEFAULT_COPY_BUFFER_SIZE),
        }
    }
}

impl Spooler {
    /// Spool all of `source` into a new stream sized for `expected_len` bytes.
    pub async fn copy_to_spooled_stream<R>(
        &self,
        mut source: R,
        expected_len: u64,
        copy: CopyOptions,
    ) -> Result<SpooledStream>
    where
        R: AsyncRead + Unpin,
    {
        let buffer_size = copy.resolved_buffer_size()?;
        let mut stream = self.create(expected_len, &copy).await?;

        let copied = pump(&mut source, &mut stream, buffer_size, copy.cancel.as_ref()).await;
        settle(stream, copied.map(drop)).await
    }

    /// Spool all of `source` through `transforms` into a new stream.
    ///
    /// Each transform wraps the writer produced by the previous one. Once every
    /// byte is written and flushed, the transforms are finalized in reverse.
    pub async fn copy_to_spooled_stream_with<R, T>(
        &self,
        mut source: R,
        expected_len: u64,
        transforms: &mut [T],
        copy: CopyOptions,
    ) -> Result<SpooledStream>
    where
        R: AsyncRead + Unpin,
        T: Transform,
    {
        if transforms.is_empty() {
            return Err(Error::EmptyCollection("transforms"));
        }
        let buffer_size = copy.resolved_buffer_size()?;
        let mut stream = self.create(expected_len, &copy).await?;

        let result = run_pipeline(
            &mut source,
            &mut stream,
            transforms,
            buffer_size,
            copy.cancel.as_ref(),
        )
        .await;
        settle(stream, result).await
    }

    async fn create(&self, expected_len: u64, copy: &CopyOptions) -> Result<SpooledStream> {
        self.create_spooled_stream(expected_len, copy.file_path.as_deref(), copy.options.as_ref())
            .await
    }
}

async fn run_pipeline<R, T>(
    source: &mut R,
    stream: &mut SpooledStream,
    transforms: &mut [T],
    buffer_size: usize,
    cancel: Option<&CancellationToken>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    T: Transform,
{
    {
        let mut writer = transform::set_up_all(transforms, Box::new(&mut *stream))?;
        pump(source, &mut writer, buffer_size, cancel).await?;
    }
    transform::finalize_all(transforms)
}

/// Hand the stream back, or dispose it and surface the original error.
async fn settle(mut stream: SpooledStream, result: Result<()>) -> Result<SpooledStream> {
    match result {
        Ok(()) => Ok(stream),
        Err(e) => {
            tracing::debug!(path = ?stream.try_file_path(), error = %e, "copy failed, disposing spooled stream");
            stream.dispose_async().await;
            Err(e)
        }
    }
}

/// Copy `source` into `dest` until EOF, then flush `dest`.
pub(crate) async fn pump<R, W>(
    source: &mut R,
    dest: &mut W,
    buffer_size: usize,
    cancel: Option<&CancellationToken>,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let mut copied = 0u64;

    loop {
        let n = cancellable(cancel, source.read(&mut buf)).await??;
        if n == 0 {
            break;
        }
        cancellable(cancel, dest.write_all(&buf[..n])).await??;
        copied += n as u64;
    }
    cancellable(cancel, dest.flush()).await??;

    Ok(copied)
}

async fn cancellable<F: Future>(cancel: Option<&CancellationToken>, fut: F) -> Result<F::Output> {
    let Some(token) = cancel else {
        return Ok(fut.await);
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Canceled),
        out = fut => Ok(out),
    }
}
