use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{DeleteErrorSink, Error, LogSink, Result, SpoolOptions, SpooledStream};

/// Chooses a backing medium for each spooled stream and drives copies into it.
#[derive(Clone)]
pub struct Spooler {
    options:    SpoolOptions,
    error_sink: Arc<dyn DeleteErrorSink>,
}

impl Default for Spooler {
    fn default() -> Self { Self::new(SpoolOptions::default()) }
}

impl std::fmt::Debug for Spooler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spooler").field("options", &self.options).finish_non_exhaustive()
    }
}

impl Spooler {
    pub fn new(options: SpoolOptions) -> Self {
        Self {
            options,
            error_sink: Arc::new(LogSink),
        }
    }

    /// Sink handed to every file-backed stream this spooler creates.
    pub fn with_error_sink(mut self, sink: impl DeleteErrorSink + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    pub fn options(&self) -> &SpoolOptions { &self.options }

    /// Create an empty stream able to hold `expected_len` bytes.
    ///
    /// Lengths below the threshold get a pre-sized memory buffer. Anything
    /// else gets a file at `file_path`, or at a fresh temporary path when none
    /// is given.
    pub async fn create_spooled_stream(
        &self,
        expected_len: u64,
        file_path: Option<&Path>,
        options: Option<&SpoolOptions>,
    ) -> Result<SpooledStream> {
        let options = options.unwrap_or(&self.options);

        if options.uses_memory(expected_len) {
            let too_large =
                || Error::InvalidArgument(format!("expected length {expected_len} does not fit in memory"));
            let capacity = usize::try_from(expected_len).map_err(|_| too_large())?;
            let mut buffer = Vec::new();
            buffer.try_reserve_exact(capacity).map_err(|_| too_large())?;

            tracing::debug!(expected_len, threshold = options.threshold, medium = "memory", "spooling");
            return Ok(SpooledStream::from_memory(buffer, options.dispose_policy));
        }

        if options.file.buffer_size == 0 {
            return Err(Error::InvalidArgument("file buffer size must be positive".into()));
        }

        let (path, generated) = match file_path {
            Some(path) => (path.to_path_buf(), false),
            None => (temp_path(options)?, true),
        };
        tracing::debug!(
            expected_len,
            threshold = options.threshold,
            medium = "file",
            path = %path.display(),
            "spooling"
        );

        let mut file = match options.file.open_options().open(&path).await {
            Ok(file) => file,
            Err(e) => {
                if generated {
                    let _ = std::fs::remove_file(&path);
                }
                return Err(e.into());
            }
        };
        file.set_max_buf_size(options.file.buffer_size);

        let stream = SpooledStream::from_file(file, path, options.dispose_policy).await?;
        Ok(stream.with_error_sink(self.error_sink.clone()))
    }
}

/// Reserve a uniquely named file in the configured temp directory.
fn temp_path(options: &SpoolOptions) -> io::Result<PathBuf> {
    let dir = options.resolved_temp_dir();
    tempfile::Builder::new()
        .prefix(&options.temp_prefix)
        .tempfile_in(&dir)?
        .into_temp_path()
        .keep()
        .map_err(io::Error::from)
}
