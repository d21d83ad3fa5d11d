//! Hash transforms for spooled copies.
//!
//! A [`HashTransform`] observes every byte a [`spooler::Spooler`] copy writes
//! and yields the digest once the copy has finished. Several transforms can run
//! in one pass; [`HashTransforms`] keeps them addressable by name.
//!
//! # Example
//!
//! ```
//! use spooler::{CopyOptions, Spooler};
//! use spooler_verify::{HashAlgorithm, HashTransforms};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> spooler::Result<()> {
//! let data = b"hello world";
//! let mut hashes = HashTransforms::from_algorithms([HashAlgorithm::Sha1, HashAlgorithm::Sha256])?;
//!
//! let _stream = Spooler::default()
//!     .copy_to_spooled_stream_with(&data[..], data.len() as u64, hashes.as_mut_slice(), CopyOptions::new())
//!     .await?;
//!
//! assert_eq!(hashes.hash_string("sha1")?, "2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED");
//! # Ok(())
//! # }
//! ```

pub use self::encoding::{HashEncoding, encode_digest};
pub use self::hasher::HashAlgorithm;
pub use self::set::HashTransforms;
pub use self::transform::HashTransform;

mod encoding;
mod hasher;
mod set;
mod transform;
