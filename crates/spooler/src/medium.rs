use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;

/// Concrete byte store underneath a [`SpooledStream`](crate::SpooledStream).
#[derive(Debug)]
pub enum Medium {
    Memory(Cursor<Vec<u8>>),
    File(File),
}

impl Medium {
    /// In-memory medium with room for `capacity` bytes.
    pub fn memory(capacity: usize) -> Self { Self::Memory(Cursor::new(Vec::with_capacity(capacity))) }

    pub fn is_file(&self) -> bool { matches!(self, Self::File(_)) }

    /// Current length. A file medium first flushes writes still in flight.
    pub async fn len(&mut self) -> io::Result<u64> {
        match self {
            Self::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            Self::File(file) => {
                file.flush().await?;
                Ok(file.metadata().await?.len())
            }
        }
    }

    pub async fn set_len(&mut self, len: u64) -> io::Result<()> {
        match self {
            Self::Memory(cursor) => {
                let len = usize::try_from(len)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds address space"))?;
                cursor.get_mut().resize(len, 0);
                Ok(())
            }
            Self::File(file) => file.set_len(len).await,
        }
    }

    /// Close synchronously, first waiting for any write still in flight.
    ///
    /// On a multi-thread runtime the wait moves off the worker with
    /// `block_in_place`. Elsewhere the calling thread parks until tokio's
    /// blocking pool finishes the pending operation.
    pub(crate) fn close(self) -> io::Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::File(mut file) => {
                let flushed = drain(&mut file);
                match file.try_into_std() {
                    Ok(std) => drop(std),
                    Err(file) => drop(file),
                }
                flushed
            }
        }
    }

    /// Flush pending writes, then close.
    pub(crate) async fn close_async(self) -> io::Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::File(mut file) => {
                let flushed = file.flush().await;
                drop(file);
                flushed
            }
        }
    }
}

fn drain(file: &mut File) -> io::Result<()> {
    let flush = task::unconstrained(file.flush());
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(|| handle.block_on(flush))
        }
        _ => futures::executor::block_on(flush),
    }
}

impl AsyncRead for Medium {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            Self::File(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Medium {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).poll_write(cx, buf),
            Self::File(file) => Pin::new(file).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).poll_flush(cx),
            Self::File(file) => Pin::new(file).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).poll_shutdown(cx),
            Self::File(file) => Pin::new(file).poll_shutdown(cx),
        }
    }
}

impl AsyncSeek for Medium {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).start_seek(position),
            Self::File(file) => Pin::new(file).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut() {
            Self::Memory(cursor) => Pin::new(cursor).poll_complete(cx),
            Self::File(file) => Pin::new(file).poll_complete(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    #[tokio::test]
    async fn memory_medium_round_trip() {
        let mut medium = Medium::memory(16);
        medium.write_all(b"hello world").await.unwrap();
        assert_eq!(medium.len().await.unwrap(), 11);

        medium.seek(SeekFrom::Start(6)).await.unwrap();
        let mut tail = String::new();
        medium.read_to_string(&mut tail).await.unwrap();
        assert_eq!(tail, "world");
    }

    #[tokio::test]
    async fn memory_medium_set_len_pads_with_zeros() {
        let mut medium = Medium::memory(0);
        medium.write_all(b"ab").await.unwrap();
        medium.set_len(4).await.unwrap();

        let Medium::Memory(cursor) = &medium else { panic!("expected memory medium") };
        assert_eq!(cursor.get_ref(), &[b'a', b'b', 0, 0]);
    }

    #[tokio::test]
    async fn file_medium_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("medium.bin")).await.unwrap();
        let mut medium = Medium::File(file);

        medium.write_all(&[7u8; 300]).await.unwrap();
        assert!(medium.is_file());
        assert_eq!(medium.len().await.unwrap(), 300);

        medium.set_len(10).await.unwrap();
        assert_eq!(medium.len().await.unwrap(), 10);
        medium.close_async().await.unwrap();
    }
}
