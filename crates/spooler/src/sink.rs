use std::io;

use crate::SpooledStream;

/// Receives file-deletion failures that disposal swallows.
pub trait DeleteErrorSink: Send + Sync {
    fn report(&self, stream: &SpooledStream, error: &io::Error);
}

impl<F> DeleteErrorSink for F
where
    F: Fn(&SpooledStream, &io::Error) + Send + Sync,
{
    fn report(&self, stream: &SpooledStream, error: &io::Error) { self(stream, error) }
}

/// Default sink: emits a `warn` event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DeleteErrorSink for LogSink {
    fn report(&self, stream: &SpooledStream, error: &io::Error) {
        tracing::warn!(
            path = ?stream.try_file_path(),
            error = %error,
            "failed to delete spooled file"
        );
    }
}

/// Discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl DeleteErrorSink for NoopSink {
    fn report(&self, _stream: &SpooledStream, _error: &io::Error) {}
}
