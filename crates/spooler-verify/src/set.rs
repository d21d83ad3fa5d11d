use std::ops::{Deref, DerefMut};

use spooler::transform::Transform;
use spooler::{Error, Result};

use crate::{HashAlgorithm, HashTransform};

/// Ordered set of [`HashTransform`]s with unique names.
///
/// Derefs to `[HashTransform]`, so it can be handed straight to
/// [`Spooler::copy_to_spooled_stream_with`](spooler::Spooler::copy_to_spooled_stream_with)
/// and queried by name afterwards.
#[derive(Debug, Default)]
pub struct HashTransforms(Vec<HashTransform>);

impl HashTransforms {
    pub fn new() -> Self { Self::default() }

    /// One upper-hex transform per algorithm, named after it.
    pub fn from_algorithms(algorithms: impl IntoIterator<Item = HashAlgorithm>) -> Result<Self> {
        algorithms
            .into_iter()
            .try_fold(Self::new(), |set, algorithm| set.with(HashTransform::from_algorithm(algorithm)))
    }

    /// Fails with [`Error::InvalidArgument`] if the name is taken.
    pub fn push(&mut self, transform: HashTransform) -> Result<()> {
        if self.0.iter().any(|t| t.name() == transform.name()) {
            return Err(Error::InvalidArgument(format!(
                "a hash transform named `{}` is already registered",
                transform.name()
            )));
        }
        self.0.push(transform);
        Ok(())
    }

    pub fn with(mut self, transform: HashTransform) -> Result<Self> {
        self.push(transform)?;
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.0.iter().map(|t| t.name()) }

    pub fn get(&self, name: &str) -> Result<&HashTransform> {
        self.0.iter().find(|t| t.name() == name).ok_or_else(|| Error::NotFound {
            name:       name.to_string(),
            registered: self.names().map(str::to_string).collect(),
        })
    }

    pub fn digest(&self, name: &str) -> Result<&[u8]> { self.get(name)?.digest() }

    pub fn hash_string(&self, name: &str) -> Result<String> { self.get(name)?.hash_string() }

    pub fn as_mut_slice(&mut self) -> &mut [HashTransform] { &mut self.0 }

    pub fn into_inner(self) -> Vec<HashTransform> { self.0 }
}

impl Deref for HashTransforms {
    type Target = [HashTransform];

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl DerefMut for HashTransforms {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEncoding;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut set = HashTransforms::new();
        set.push(HashTransform::from_algorithm(HashAlgorithm::Sha1)).unwrap();

        let duplicate = HashTransform::from_algorithm(HashAlgorithm::Sha256).with_name("sha1");
        assert!(matches!(set.push(duplicate), Err(Error::InvalidArgument(_))));
        assert_eq!(set.len(), 1);

        let result = HashTransforms::from_algorithms([HashAlgorithm::Sha256, HashAlgorithm::Sha256]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn same_algorithm_under_distinct_names() {
        let set = HashTransforms::new()
            .with(HashTransform::from_algorithm(HashAlgorithm::Sha256))
            .unwrap()
            .with(
                HashTransform::from_algorithm(HashAlgorithm::Sha256)
                    .with_name("sha256-b64")
                    .with_encoding(HashEncoding::Base64),
            )
            .unwrap();

        assert_eq!(set.names().collect::<Vec<_>>(), ["sha256", "sha256-b64"]);
    }

    #[test]
    fn unknown_name_lists_registered() {
        let set = HashTransforms::from_algorithms([HashAlgorithm::Sha1, HashAlgorithm::Sha512]).unwrap();

        let Err(Error::NotFound { name, registered }) = set.get("md5") else {
            panic!("expected NotFound");
        };
        assert_eq!(name, "md5");
        assert_eq!(registered, ["sha1", "sha512"]);
        assert!(matches!(set.hash_string("md5"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn lookups_before_finalize_fail() {
        let set = HashTransforms::from_algorithms([HashAlgorithm::Sha1]).unwrap();
        assert!(matches!(set.digest("sha1"), Err(Error::InvalidOperation(_))));
    }
}
