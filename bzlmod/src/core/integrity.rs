use std::fmt;
use std::str;
use std::str::FromStr;

use anyhow::{bail, ensure, Context, Result};
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

/// A Subresource Integrity string, as used by registry `source.json` files
/// and archive overrides: `<algorithm>-<base64 digest>`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Integrity {
    algorithm: Algorithm,
    digest: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    fn prefix(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    fn digest_len(self) -> usize {
        match self {
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }
}

impl Integrity {
    pub fn parse(s: &str) -> Result<Self> {
        fn inner(s: &str) -> Result<Integrity> {
            let Some((prefix, hash)) = s.split_once('-') else {
                bail!("integrity is missing algorithm prefix");
            };

            let algorithm = match prefix {
                "sha256" => Algorithm::Sha256,
                "sha384" => Algorithm::Sha384,
                "sha512" => Algorithm::Sha512,
                _ => bail!("unsupported integrity algorithm: {prefix}"),
            };

            let digest = BASE64.decode(hash.as_bytes())?;
            ensure!(
                digest.len() == algorithm.digest_len(),
                "invalid digest length {}, {} digests are {} bytes",
                digest.len(),
                algorithm.prefix(),
                algorithm.digest_len()
            );

            Ok(Integrity { algorithm, digest })
        }

        inner(s).with_context(|| format!("failed to parse integrity: {s}"))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Computes the sha256 integrity of raw content.
    pub fn compute_sha256(content: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::Sha256,
            digest: sha2::Sha256::digest(content).to_vec(),
        }
    }

    /// Checks raw content against this integrity value.
    pub fn verify(&self, content: &[u8]) -> bool {
        let digest = match self.algorithm {
            Algorithm::Sha256 => sha2::Sha256::digest(content).to_vec(),
            Algorithm::Sha384 => sha2::Sha384::digest(content).to_vec(),
            Algorithm::Sha512 => sha2::Sha512::digest(content).to_vec(),
        };
        digest == self.digest
    }
}

impl FromStr for Integrity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Integrity {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Integrity> for String {
    fn from(value: Integrity) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.prefix(), BASE64.encode(&self.digest))
    }
}

impl fmt::Debug for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integrity({self})")
    }
}
