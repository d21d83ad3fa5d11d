use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use digest::DynDigest;
use spooler::transform::{BoxWriter, Transform, TransformStage};
use spooler::{Error, Result};
use tokio::io::AsyncWrite;

use crate::{HashAlgorithm, HashEncoding, encode_digest};

type SharedDigest = Arc<Mutex<Option<Box<dyn DynDigest + Send>>>>;

fn lock(state: &SharedDigest) -> MutexGuard<'_, Option<Box<dyn DynDigest + Send>>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transform that hashes every byte of a copy on its way to the destination.
pub struct HashTransform {
    name:      String,
    algorithm: String,
    encoding:  HashEncoding,
    state:     SharedDigest,
    stage:     TransformStage,
    digest:    Option<Vec<u8>>,
}

impl HashTransform {
    /// Wrap an arbitrary hasher. The transform is named after `algorithm`
    /// until [`with_name`](Self::with_name) says otherwise.
    pub fn new(hasher: Box<dyn DynDigest + Send>, algorithm: impl Into<String>, encoding: HashEncoding) -> Self {
        let algorithm = algorithm.into();
        Self {
            name: algorithm.clone(),
            algorithm,
            encoding,
            state: Arc::new(Mutex::new(Some(hasher))),
            stage: TransformStage::default(),
            digest: None,
        }
    }

    /// Upper-case hex transform named after `algorithm`.
    pub fn from_algorithm(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm.hasher(), algorithm.as_str(), HashEncoding::default())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_encoding(mut self, encoding: HashEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn algorithm(&self) -> &str { &self.algorithm }

    pub fn encoding(&self) -> HashEncoding { self.encoding }

    pub fn is_finalized(&self) -> bool { self.stage.is_finalized() }

    /// Raw digest. Available once the transform is finalized.
    pub fn digest(&self) -> Result<&[u8]> {
        self.digest
            .as_deref()
            .ok_or_else(|| Error::InvalidOperation(format!("hash `{}` is not finalized", self.name)))
    }

    /// Digest in the configured encoding.
    pub fn hash_string(&self) -> Result<String> { Ok(encode_digest(self.digest()?, self.encoding)) }
}

impl Transform for HashTransform {
    fn name(&self) -> &str { &self.name }

    fn set_up<'a>(&mut self, inner: BoxWriter<'a>) -> Result<BoxWriter<'a>> {
        self.stage.set_up(&self.name)?;
        Ok(Box::new(HashingWriter {
            inner,
            state: self.state.clone(),
        }))
    }

    /// Finish the digest. A copy that wrote nothing yields the digest of the
    /// empty input rather than an error. Fails with
    /// [`Error::InvalidOperation`] before `set_up`, on a second call, or when
    /// the digest state is gone.
    fn finalize(&mut self) -> Result<()> {
        self.stage.finalize(&self.name)?;
        let hasher = lock(&self.state).take().ok_or_else(|| {
            Error::InvalidOperation(format!("hash `{}` has no digest state to finalize", self.name))
        })?;
        let digest = hasher.finalize().into_vec();
        tracing::trace!(name = %self.name, algorithm = %self.algorithm, "hash finalized");
        self.digest = Some(digest);
        Ok(())
    }
}

impl fmt::Debug for HashTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTransform")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("encoding", &self.encoding)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Feeds the bytes `inner` accepted into the shared digest.
struct HashingWriter<'a> {
    inner: BoxWriter<'a>,
    state: SharedDigest,
}

impl AsyncWrite for HashingWriter<'_> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        if let Some(hasher) = lock(&this.state).as_mut() {
            hasher.update(&buf[..n]);
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
