//! Seekable facade over a memory or file medium.
//!
//! A [`SpooledStream`] forwards every read, write and seek unmodified to its
//! [`Medium`]. It owns the medium for the purpose of closing it, and it owns the
//! cleanup of the backing file. Disposal can be triggered through
//! [`close`](SpooledStream::close), [`dispose`](SpooledStream::dispose),
//! [`dispose_async`](SpooledStream::dispose_async) or by dropping the stream.
//! All of them funnel into one teardown that runs at most once and never fails.

use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, ReadBuf};

use crate::copy::pump;
use crate::error::disposed;
use crate::{DeleteErrorSink, DisposePolicy, Error, Medium, Result};

pub struct SpooledStream {
    medium:             Option<Medium>,
    path:               Option<PathBuf>,
    policy:             DisposePolicy,
    error_sink:         Option<Arc<dyn DeleteErrorSink>>,
    disposed:           bool,
    deletion_attempted: bool,
}

impl SpooledStream {
    /// Wrap an in-memory buffer. The position starts at zero.
    pub fn from_memory(buffer: Vec<u8>, policy: DisposePolicy) -> Self {
        Self::with_medium(Medium::Memory(io::Cursor::new(buffer)), None, policy)
    }

    /// Wrap an open file handle backed by `path`.
    ///
    /// Fails with [`Error::InvalidArgument`] when the handle cannot seek
    /// (pipes, sockets, character devices).
    pub async fn from_file(mut file: File, path: impl Into<PathBuf>, policy: DisposePolicy) -> Result<Self> {
        let path = path.into();
        if let Err(e) = file.stream_position().await {
            return Err(Error::InvalidArgument(format!(
                "medium for {} is not seekable: {e}",
                path.display()
            )));
        }
        Ok(Self::with_medium(Medium::File(file), Some(path), policy))
    }

    fn with_medium(medium: Medium, path: Option<PathBuf>, policy: DisposePolicy) -> Self {
        Self {
            medium: Some(medium),
            path,
            policy,
            error_sink: None,
            disposed: false,
            deletion_attempted: false,
        }
    }

    /// Route deletion failures to `sink` instead of the log.
    pub fn with_error_sink(mut self, sink: Arc<dyn DeleteErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    pub fn is_file_based(&self) -> bool { self.path.is_some() }

    pub fn is_disposed(&self) -> bool { self.disposed }

    pub fn policy(&self) -> DisposePolicy { self.policy }

    pub fn file_path(&self) -> Result<&Path> {
        self.try_file_path()
            .ok_or_else(|| Error::InvalidOperation("spooled stream is memory-backed and has no file path".into()))
    }

    pub fn try_file_path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Mediums exposed here never time out.
    pub fn can_timeout(&self) -> bool { false }

    pub async fn len(&mut self) -> Result<u64> { Ok(self.medium_mut()?.len().await?) }

    pub async fn is_empty(&mut self) -> Result<bool> { Ok(self.len().await? == 0) }

    pub async fn set_len(&mut self, len: u64) -> Result<()> { Ok(self.medium_mut()?.set_len(len).await?) }

    pub async fn position(&mut self) -> Result<u64> { Ok(self.stream_position().await?) }

    pub async fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Copy from the current position to the end into `dest`.
    pub async fn copy_to<W>(&mut self, dest: &mut W, buffer_size: usize) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if buffer_size == 0 {
            return Err(Error::InvalidArgument("copy buffer size must be positive".into()));
        }
        pump(self, dest, buffer_size, None).await
    }

    /// Reclaim the medium. Only allowed once the stream was disposed under
    /// [`DisposePolicy::LeaveOpen`].
    pub fn take_medium(&mut self) -> Result<Medium> {
        if !self.disposed || self.policy.closes() {
            return Err(Error::InvalidOperation(
                "medium can only be taken after disposal with leave-open policy".into(),
            ));
        }
        self.medium
            .take()
            .ok_or_else(|| Error::InvalidOperation("medium has already been taken".into()))
    }

    /// Same as [`dispose`](Self::dispose).
    pub fn close(&mut self) { self.dispose() }

    /// Blocks until writes still in flight on a file medium have landed.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        tracing::trace!(path = ?self.path, policy = ?self.policy, "disposing spooled stream");

        if self.policy.closes() {
            if let Some(medium) = self.medium.take() {
                if let Err(e) = medium.close() {
                    tracing::warn!(path = ?self.path, error = %e, "flush before close failed");
                }
            }
        }

        if let Some(path) = self.pending_deletion() {
            if let Err(e) = std::fs::remove_file(&path) {
                self.report_delete_error(&e);
            }
        }

        self.disposed = true;
    }

    /// Flushes a file medium before closing it, so data written under
    /// [`DisposePolicy::CloseOnly`] is on disk once this returns.
    pub async fn dispose_async(&mut self) {
        if self.disposed {
            return;
        }
        tracing::trace!(path = ?self.path, policy = ?self.policy, "disposing spooled stream");

        if self.policy.closes() {
            if let Some(medium) = self.medium.take() {
                if let Err(e) = medium.close_async().await {
                    tracing::warn!(path = ?self.path, error = %e, "flush before close failed");
                }
            }
        }

        if let Some(path) = self.pending_deletion() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                self.report_delete_error(&e);
            }
        }

        self.disposed = true;
    }

    /// Returns the file to delete, marking the attempt as made.
    fn pending_deletion(&mut self) -> Option<PathBuf> {
        if !self.policy.deletes() || self.deletion_attempted {
            return None;
        }
        let path = self.path.clone()?;
        self.deletion_attempted = true;
        Some(path)
    }

    fn report_delete_error(&self, error: &io::Error) {
        match &self.error_sink {
            Some(sink) => sink.report(self, error),
            None => tracing::warn!(path = ?self.path, error = %error, "failed to delete spooled file"),
        }
    }

    fn medium_mut(&mut self) -> io::Result<&mut Medium> {
        match &mut self.medium {
            Some(medium) if !self.disposed => Ok(medium),
            _ => Err(disposed()),
        }
    }
}

impl Drop for SpooledStream {
    fn drop(&mut self) { self.dispose() }
}

impl fmt::Debug for SpooledStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpooledStream")
            .field("medium", &self.medium)
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("has_error_sink", &self.error_sink.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl AsyncRead for SpooledStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().medium_mut() {
            Ok(medium) => Pin::new(medium).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncWrite for SpooledStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut().medium_mut() {
            Ok(medium) => Pin::new(medium).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().medium_mut() {
            Ok(medium) => Pin::new(medium).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().medium_mut() {
            Ok(medium) => Pin::new(medium).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncSeek for SpooledStream {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        Pin::new(self.get_mut().medium_mut()?).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut().medium_mut() {
            Ok(medium) => Pin::new(medium).poll_complete(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn file_stream(path: &Path, policy: DisposePolicy) -> SpooledStream {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .unwrap();
        SpooledStream::from_file(file, path, policy).await.unwrap()
    }

    fn counting_sink() -> (Arc<AtomicUsize>, Arc<dyn DeleteErrorSink>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sink: Arc<dyn DeleteErrorSink> = Arc::new(move |_: &SpooledStream, _: &io::Error| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sink)
    }

    #[tokio::test]
    async fn memory_stream_forwards_io() {
        let mut stream = SpooledStream::from_memory(Vec::new(), DisposePolicy::default());
        stream.write_all(b"spooled bytes").await.unwrap();
        assert_eq!(stream.len().await.unwrap(), 13);
        assert_eq!(stream.position().await.unwrap(), 13);

        stream.rewind().await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"spooled bytes");

        assert!(!stream.is_file_based());
        assert!(!stream.can_timeout());
        assert!(stream.try_file_path().is_none());
        assert!(matches!(stream.file_path(), Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn file_stream_exposes_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backing.bin");
        let stream = file_stream(&path, DisposePolicy::default()).await;

        assert!(stream.is_file_based());
        assert_eq!(stream.file_path().unwrap(), path.as_path());
        assert_eq!(stream.try_file_path(), Some(path.as_path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn from_file_rejects_unseekable_handle() {
        use std::os::fd::OwnedFd;
        use std::os::unix::net::UnixStream;

        let (left, _right) = UnixStream::pair().unwrap();
        let file = File::from_std(std::fs::File::from(OwnedFd::from(left)));

        let result = SpooledStream::from_file(file, "socket", DisposePolicy::default()).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn dispose_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delete.bin");
        let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose).await;
        stream.write_all(b"data").await.unwrap();
        assert!(path.exists());

        stream.dispose_async().await;
        assert!(stream.is_disposed());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.bin");
        {
            let _stream = file_stream(&path, DisposePolicy::DeleteAndClose).await;
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn close_is_dispose() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("close.bin");
        let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose).await;

        stream.close();
        assert!(stream.is_disposed());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn close_only_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.bin");
        let mut stream = file_stream(&path, DisposePolicy::CloseOnly).await;
        stream.write_all(b"kept").await.unwrap();

        stream.dispose_async().await;
        assert!(stream.is_disposed());
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
        assert!(matches!(stream.take_medium(), Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn leave_open_keeps_handle_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("open.bin");
        let mut stream = file_stream(&path, DisposePolicy::LeaveOpen).await;
        stream.write_all(b"still open").await.unwrap();

        stream.dispose();
        assert!(path.exists());
        assert!(stream.write_all(b"x").await.is_err());

        let mut medium = stream.take_medium().unwrap();
        medium.seek(SeekFrom::Start(0)).await.unwrap();
        let mut out = String::new();
        medium.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "still open");
        assert!(matches!(stream.take_medium(), Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn take_medium_requires_disposal() {
        let mut stream = SpooledStream::from_memory(Vec::new(), DisposePolicy::LeaveOpen);
        assert!(matches!(stream.take_medium(), Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn io_after_dispose_fails() {
        let mut stream = SpooledStream::from_memory(b"abc".to_vec(), DisposePolicy::default());
        stream.dispose();

        let mut buf = [0u8; 3];
        assert!(stream.read(&mut buf).await.is_err());
        assert!(stream.write_all(b"abc").await.is_err());
        assert!(stream.seek(SeekFrom::Start(0)).await.is_err());
        assert!(matches!(stream.len().await, Err(Error::Io(_))));
    }

    // Deleting a file that is still open needs Unix semantics.
    #[cfg(unix)]
    #[tokio::test]
    async fn dispose_is_idempotent_across_entry_points() {
        for calls in [1usize, 3, 7] {
            let dir = tempdir().unwrap();
            let path = dir.path().join("idempotent.bin");
            let (count, sink) = counting_sink();
            let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose)
                .await
                .with_error_sink(sink);

            // Removing the file first makes every deletion attempt observable.
            std::fs::remove_file(&path).unwrap();

            for i in 0..calls {
                match i % 3 {
                    0 => stream.dispose(),
                    1 => stream.close(),
                    _ => stream.dispose_async().await,
                }
            }
            drop(stream);

            assert_eq!(count.load(Ordering::SeqCst), 1, "{calls} dispose calls");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delete_failure_reaches_sink_with_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = seen.clone();
        let sink: Arc<dyn DeleteErrorSink> = Arc::new(move |stream: &SpooledStream, e: &io::Error| {
            record
                .lock()
                .unwrap()
                .push((stream.try_file_path().map(Path::to_path_buf), e.kind()));
        });
        let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose)
            .await
            .with_error_sink(sink);

        std::fs::remove_file(&path).unwrap();
        stream.dispose_async().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(Some(path.clone()), io::ErrorKind::NotFound)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delete_failure_without_sink_is_swallowed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unsinked.bin");
        let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose).await;

        std::fs::remove_file(&path).unwrap();
        stream.dispose();
        assert!(stream.is_disposed());
    }

    #[tokio::test]
    async fn memory_stream_never_attempts_deletion() {
        let (count, sink) = counting_sink();
        let mut stream = SpooledStream::from_memory(Vec::new(), DisposePolicy::DeleteAndClose).with_error_sink(sink);
        stream.dispose_async().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn copy_to_writes_remaining_bytes() {
        let mut stream = SpooledStream::from_memory(b"0123456789".to_vec(), DisposePolicy::default());
        stream.seek(SeekFrom::Start(4)).await.unwrap();

        let mut out = Vec::new();
        let copied = stream.copy_to(&mut out, 3).await.unwrap();
        assert_eq!(copied, 6);
        assert_eq!(out, b"456789");

        assert!(matches!(stream.copy_to(&mut out, 0).await, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn set_len_truncates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncate.bin");
        let mut stream = file_stream(&path, DisposePolicy::DeleteAndClose).await;
        stream.write_all(&[1u8; 64]).await.unwrap();
        stream.flush().await.unwrap();

        stream.set_len(8).await.unwrap();
        assert_eq!(stream.len().await.unwrap(), 8);
        assert!(!stream.is_empty().await.unwrap());
    }

    async fn write_then_close(path: &Path, drop_instead: bool) -> u64 {
        let mut stream = file_stream(path, DisposePolicy::CloseOnly).await;
        stream.write_all(&vec![0x5a; 1 << 20]).await.unwrap();
        if drop_instead {
            drop(stream);
        } else {
            stream.close();
        }
        std::fs::metadata(path).unwrap().len()
    }

    #[tokio::test]
    async fn sync_close_waits_for_pending_writes() {
        let dir = tempdir().unwrap();
        for i in 0..20 {
            let path = dir.path().join(format!("close-{i}.bin"));
            assert_eq!(write_then_close(&path, i % 2 == 1).await, 1 << 20, "round {i}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sync_close_waits_for_pending_writes_on_multi_thread_runtime() {
        let dir = tempdir().unwrap();
        for i in 0..20 {
            let path = dir.path().join(format!("close-mt-{i}.bin"));
            assert_eq!(write_then_close(&path, i % 2 == 1).await, 1 << 20, "round {i}");
        }
    }
}
