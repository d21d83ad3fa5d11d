use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Payloads shorter than this stay in memory.
pub const DEFAULT_THRESHOLD: u64 = 80 * 1024;

/// Read-ahead / write-behind buffer used by file-backed mediums.
pub const DEFAULT_FILE_BUFFER_SIZE: usize = 64 * 1024;

pub const DEFAULT_TEMP_PREFIX: &str = ".spool";

/// What happens to the backing medium when a spooled stream is disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisposePolicy {
    /// Close the medium and delete its file, if it has one.
    #[default]
    DeleteAndClose,
    /// Close the medium, keep the file.
    CloseOnly,
    /// Neither close nor delete; the medium can be reclaimed with
    /// [`SpooledStream::take_medium`](crate::SpooledStream::take_medium).
    LeaveOpen,
}

impl DisposePolicy {
    pub fn closes(self) -> bool { !matches!(self, Self::LeaveOpen) }

    pub fn deletes(self) -> bool { matches!(self, Self::DeleteAndClose) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileMode {
    /// Fail if the file already exists.
    CreateNew,
    /// Create the file, truncating any existing content.
    #[default]
    CreateOrTruncate,
    /// Open an existing file.
    Open,
    OpenOrCreate,
    /// Open an existing file and truncate it.
    Truncate,
    Append,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAccess {
    Read,
    Write,
    #[default]
    ReadWrite,
}

/// Sharing granted to other handles while the file is open.
///
/// Enforced on Windows only; Unix has no mandatory share modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileShare {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
    Delete,
}

impl FileShare {
    #[cfg(windows)]
    fn share_mode(self) -> u32 {
        const FILE_SHARE_READ: u32 = 0x1;
        const FILE_SHARE_WRITE: u32 = 0x2;
        const FILE_SHARE_DELETE: u32 = 0x4;

        match self {
            Self::None => 0,
            Self::Read => FILE_SHARE_READ,
            Self::Write => FILE_SHARE_WRITE,
            Self::ReadWrite => FILE_SHARE_READ | FILE_SHARE_WRITE,
            Self::Delete => FILE_SHARE_DELETE,
        }
    }
}

/// Parameters for opening a backing file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    pub mode:        FileMode,
    pub access:      FileAccess,
    pub share:       FileShare,
    pub buffer_size: usize,
}

impl Default for FileOptions {
    fn default() -> Self { Self::new() }
}

impl FileOptions {
    pub fn new() -> Self {
        Self {
            mode:        FileMode::default(),
            access:      FileAccess::default(),
            share:       FileShare::default(),
            buffer_size: DEFAULT_FILE_BUFFER_SIZE,
        }
    }

    pub fn mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn access(mut self, access: FileAccess) -> Self {
        self.access = access;
        self
    }

    pub fn share(mut self, share: FileShare) -> Self {
        self.share = share;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub(crate) fn open_options(&self) -> tokio::fs::OpenOptions {
        let mut options = tokio::fs::OpenOptions::new();

        match self.access {
            FileAccess::Read => options.read(true),
            FileAccess::Write => options.write(true),
            FileAccess::ReadWrite => options.read(true).write(true),
        };

        match self.mode {
            FileMode::CreateNew => options.create_new(true),
            FileMode::CreateOrTruncate => options.create(true).truncate(true),
            FileMode::Open => &mut options,
            FileMode::OpenOrCreate => options.create(true),
            FileMode::Truncate => options.truncate(true),
            FileMode::Append => options.append(true).create(true),
        };

        #[cfg(windows)]
        options.share_mode(self.share.share_mode());

        options
    }
}

/// Configuration for a [`Spooler`](crate::Spooler).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolOptions {
    pub threshold:      u64,
    pub file:           FileOptions,
    pub temp_dir:       Option<PathBuf>,
    pub temp_prefix:    String,
    pub dispose_policy: DisposePolicy,
}

impl Default for SpoolOptions {
    fn default() -> Self { Self::new() }
}

impl SpoolOptions {
    pub fn new() -> Self {
        Self {
            threshold:      DEFAULT_THRESHOLD,
            file:           FileOptions::new(),
            temp_dir:       None,
            temp_prefix:    DEFAULT_TEMP_PREFIX.to_string(),
            dispose_policy: DisposePolicy::default(),
        }
    }

    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn file(mut self, file: FileOptions) -> Self {
        self.file = file;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.dispose_policy = policy;
        self
    }

    pub fn uses_memory(&self, expected_len: u64) -> bool { expected_len < self.threshold }

    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .as_deref()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
    }
}
