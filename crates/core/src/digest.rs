// Content digests (`sha256:<hex>`)

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

const SHA256: &str = "sha256";
const SHA256_HEX_LEN: usize = 64;

/// A content digest identifying an image manifest independent of any tag.
///
/// Only `sha256` is accepted, which is what every registry in practice serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    hex: String,
}

impl Digest {
    /// Parse a digest of the form `sha256:<64 lowercase hex chars>`.
    pub fn parse(s: &str) -> CoreResult<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| CoreError::digest(s, "missing algorithm separator"))?;

        if algorithm != SHA256 {
            return Err(CoreError::digest(
                s,
                format!("unsupported algorithm {:?}", algorithm),
            ));
        }

        if hex.len() != SHA256_HEX_LEN {
            return Err(CoreError::digest(
                s,
                format!("expected {} hex characters, got {}", SHA256_HEX_LEN, hex.len()),
            ));
        }

        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(CoreError::digest(s, "digest must be lowercase hex"));
        }

        Ok(Self {
            hex: hex.to_string(),
        })
    }

    /// Compute the sha256 digest of raw content.
    pub fn sha256_of(content: &[u8]) -> Self {
        Self {
            hex: hex::encode(Sha256::digest(content)),
        }
    }

    pub fn algorithm(&self) -> &str {
        SHA256
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", SHA256, self.hex)
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
