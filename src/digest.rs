use std::fmt;

/// Algorithm used to compute a content digest.
///
/// See [`Digest`] for an example.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    SHA256,
    SHA512,
}

impl DigestAlgorithm {
    fn prefix(&self) -> &'static str {
        match self {
            DigestAlgorithm::SHA256 => "sha256",
            DigestAlgorithm::SHA512 => "sha512",
        }
    }

    /// Length of the hash value, in hexadecimal digits.
    fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::SHA256 => 256 / 8 * 2,
            DigestAlgorithm::SHA512 => 512 / 8 * 2,
        }
    }
}

/// Content digest that pins a reference to a specific image.
///
/// It contains the algorithm (like `SHA256`) and its value as a
/// hexadecimal string.
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// const DIGEST: &str = "123456789012345678901234567890123456789012345678901234567890ABCD";
///
/// let digest = Digest::try_from(format!("sha256:{}", DIGEST)).unwrap();
/// assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
/// assert_eq!(digest.hash_value(), DIGEST);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct Digest {
    hash: String,
    algorithm: DigestAlgorithm,
}

/// Errors from the digest parser.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DigestError {
    #[error("Invalid digest algorithm.")]
    InvalidAlgorithm,

    #[error("Invalid digest value.")]
    InvalidValue,
}

impl Digest {
    /// Original string to build this instance (`algorithm:hash_value`).
    pub fn source(&self) -> &str {
        &self.hash
    }

    pub fn hash_value(&self) -> &str {
        self.hash
            .split_once(':')
            .map(|(_, h)| h)
            .unwrap_or_default()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(hash: String) -> Result<Self, Self::Error> {
        let (algorithm, value) = hash
            .split_once(':')
            .ok_or(DigestError::InvalidAlgorithm)?;

        let algorithm = [DigestAlgorithm::SHA256, DigestAlgorithm::SHA512]
            .into_iter()
            .find(|a| a.prefix() == algorithm)
            .ok_or(DigestError::InvalidAlgorithm)?;

        // The hash value must have the expected length, and it
        // must only contain hexadecimal digits.
        if value.len() != algorithm.hex_len() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidValue);
        }

        Ok(Digest { hash, algorithm })
    }
}

impl TryFrom<&str> for Digest {
    type Error = DigestError;

    fn try_from(hash: &str) -> Result<Self, Self::Error> {
        Digest::try_from(hash.to_owned())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

#[test]
fn parse_valid_digests() {
    let sha256 = format!("sha256:{}", "a".repeat(64));
    let digest = Digest::try_from(sha256.as_str()).unwrap();
    assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
    assert_eq!(digest.source(), sha256);
    assert_eq!(digest.to_string(), sha256);

    let sha512 = format!("sha512:{}", "0F".repeat(64));
    let digest = Digest::try_from(sha512.as_str()).unwrap();
    assert_eq!(digest.algorithm(), DigestAlgorithm::SHA512);
    assert_eq!(digest.hash_value(), "0F".repeat(64));
}

#[test]
fn reject_invalid_digest() {
    assert_eq!(Digest::try_from("md5:0000"), Err(DigestError::InvalidAlgorithm));
    assert_eq!(Digest::try_from("0000"), Err(DigestError::InvalidAlgorithm));
    assert_eq!(Digest::try_from("sha256:0000"), Err(DigestError::InvalidValue));

    // Right length, wrong characters.
    assert_eq!(
        Digest::try_from(format!("sha256:{:064}", "x")),
        Err(DigestError::InvalidValue)
    );

    // A SHA512 value with a SHA256 prefix.
    assert_eq!(
        Digest::try_from(format!("sha256:{}", "1".repeat(128))),
        Err(DigestError::InvalidValue)
    );
}

#[test]
fn digest_in_json() {
    #[derive(serde::Deserialize, Debug)]
    struct Example {
        digest: Digest,
    }

    let json = format!(r#"{{"digest": "sha256:{}"}}"#, "b".repeat(64));
    let example: Example = serde_json::from_str(&json).unwrap();
    assert_eq!(example.digest.hash_value(), "b".repeat(64));

    assert!(serde_json::from_str::<Example>(r#"{"digest": "sha1:00"}"#).is_err());
}
