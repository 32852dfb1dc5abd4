//! File and text digests for the checksum generator.

use std::fmt;
use std::str::FromStr;

use futures::io::AsyncRead;
use md5::Md5;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;

use crate::error::ToolError;
use crate::source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecksumAlgorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl ChecksumAlgorithm {
    pub const ALL: [Self; 5] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Length of the lowercase hex digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ToolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized: String = input
            .trim()
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(ToolError::UnsupportedAlgorithm(input.trim().to_string())),
        }
    }
}

pub fn checksum_bytes(bytes: &[u8], algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
        ChecksumAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
        ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        ChecksumAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
        ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    }
}

/// Reads the whole source, then digests it.
pub async fn compute_checksum<R>(source: R, algorithm: ChecksumAlgorithm) -> Result<String, ToolError>
where
    R: AsyncRead + Unpin,
{
    let bytes = source::read_all(source).await?;
    debug!(bytes = bytes.len(), %algorithm, "checksum");
    Ok(checksum_bytes(&bytes, algorithm))
}

/// Case- and whitespace-insensitive digest comparison.
pub fn compare_hashes(a: &str, b: &str) -> bool {
    normalize_hash(a) == normalize_hash(b)
}

/// `None` when no expected value was supplied.
pub fn compare_to_expected(actual: &str, expected: &str) -> Option<bool> {
    if expected.trim().is_empty() {
        return None;
    }
    Some(compare_hashes(actual, expected))
}

fn normalize_hash(hash: &str) -> String {
    hash.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
