use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{DigestError, DigestResult};

/// Read buffer used when streaming content through a digester.
const CHUNK_SIZE: usize = 64 * 1024;

/// A checksum algorithm that both sides of a migration can record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "sha-256")]
    Sha256,
    #[default]
    #[serde(rename = "sha-512")]
    Sha512,
    #[serde(rename = "blake3")]
    Blake3,
}

impl DigestAlgorithm {
    /// The name used inside digest urns (`urn:<name>:<hex>`).
    pub fn urn_name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha512 => "sha-512",
            Self::Blake3 => "blake3",
        }
    }

    /// Start an incremental digest in this algorithm.
    pub fn digester(&self) -> Digester {
        Digester::new(*self)
    }

    /// Digest a byte slice, returning lowercase hex.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        let mut d = self.digester();
        d.update(data);
        d.finalize_hex()
    }

    /// Stream a reader to the end, returning lowercase hex.
    pub fn hex_digest_reader<R: Read>(&self, mut reader: R) -> DigestResult<String> {
        let mut d = self.digester();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            d.update(&buf[..n]);
        }
        Ok(d.finalize_hex())
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn_name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    /// Accepts the urn names plus the common spellings found in exports
    /// (`SHA-256`, `sha256`, `SHA512`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "sha-256" | "sha256" => Ok(Self::Sha256),
            "sha-512" | "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            _ => Err(DigestError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Incremental hasher over one of the supported algorithms.
pub enum Digester {
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// An algorithm-qualified checksum as recorded by a target store,
/// e.g. `urn:sha-512:9b71d2...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DigestUrn {
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex.
    pub hex: String,
}

impl DigestUrn {
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into().to_ascii_lowercase(),
        }
    }

    /// Parse `urn:<algorithm>:<hex>`.
    pub fn parse(urn: &str) -> DigestResult<Self> {
        let rest = urn
            .strip_prefix("urn:")
            .ok_or_else(|| DigestError::MalformedUrn(urn.to_string()))?;
        let (alg, value) = rest
            .split_once(':')
            .ok_or_else(|| DigestError::MalformedUrn(urn.to_string()))?;
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::MalformedUrn(urn.to_string()));
        }
        Ok(Self::new(alg.parse()?, value))
    }

    /// Find the first urn in `urns` recorded with `algorithm`.
    ///
    /// Urns in other (or unsupported) algorithms are ignored.
    pub fn find<'a, I>(urns: I, algorithm: DigestAlgorithm) -> Option<Self>
    where
        I: IntoIterator<Item = &'a String>,
    {
        urns.into_iter()
            .filter_map(|u| Self::parse(u).ok())
            .find(|u| u.algorithm == algorithm)
    }

    pub fn matches_hex(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

impl fmt::Display for DigestUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:{}", self.algorithm.urn_name(), self.hex)
    }
}
