//! Transform pipeline contract.
//!
//! A [`Transform`] wraps the destination writer of a copy so it can observe or
//! alter bytes in flight, then produces its result in [`Transform::finalize`].
//! Transforms nest: the first wraps the spooled stream and each following one
//! wraps the writer returned by its predecessor. Finalization runs in reverse,
//! innermost layers last.

use tokio::io::AsyncWrite;

use crate::{Error, Result};

pub type BoxWriter<'a> = Box<dyn AsyncWrite + Unpin + Send + 'a>;

pub trait Transform: Send {
    /// Name used for lookups and error reporting.
    fn name(&self) -> &str;

    /// Wrap `inner`. Called at most once per transform.
    fn set_up<'a>(&mut self, inner: BoxWriter<'a>) -> Result<BoxWriter<'a>>;

    /// Complete the computation once every byte has been written and flushed.
    fn finalize(&mut self) -> Result<()>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn name(&self) -> &str { (**self).name() }

    fn set_up<'a>(&mut self, inner: BoxWriter<'a>) -> Result<BoxWriter<'a>> { (**self).set_up(inner) }

    fn finalize(&mut self) -> Result<()> { (**self).finalize() }
}

/// Apply `set_up` in order, returning the outermost writer.
pub fn set_up_all<'a, T: Transform>(transforms: &mut [T], inner: BoxWriter<'a>) -> Result<BoxWriter<'a>> {
    transforms
        .iter_mut()
        .try_fold(inner, |writer, transform| transform.set_up(writer))
}

/// Apply `finalize` in reverse order, stopping at the first failure.
pub fn finalize_all<T: Transform>(transforms: &mut [T]) -> Result<()> {
    transforms
        .iter_mut()
        .rev()
        .try_for_each(|transform| transform.finalize())
}

/// Lifecycle bookkeeping for a transform: `Idle → SetUp → Finalized`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformStage {
    #[default]
    Idle,
    SetUp,
    Finalized,
}

impl TransformStage {
    pub fn set_up(&mut self, name: &str) -> Result<()> {
        match self {
            Self::Idle => {
                *self = Self::SetUp;
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!(
                "transform `{name}` has already been set up"
            ))),
        }
    }

    pub fn finalize(&mut self, name: &str) -> Result<()> {
        match self {
            Self::SetUp => {
                *self = Self::Finalized;
                Ok(())
            }
            Self::Idle => Err(Error::InvalidOperation(format!(
                "transform `{name}` must be set up before it is finalized"
            ))),
            Self::Finalized => Err(Error::InvalidOperation(format!(
                "transform `{name}` has already been finalized"
            ))),
        }
    }

    pub fn is_finalized(self) -> bool { self == Self::Finalized }
}
