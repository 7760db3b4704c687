//! The gossiped value: root certificate record plus API-server URLs.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on a decoded payload. Anything larger is rejected as malformed.
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 20;

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
}

/// A trusted root certificate as seen by the mesh.
///
/// The payload is opaque; nothing here parses or validates it. Records are
/// never edited after construction, a newer record replaces an older one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootCertificate {
    /// Certificate payload (usually DER).
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
    /// Start of the validity period, Unix milliseconds.
    pub not_before: u64,
    /// Only used to break ties between records with equal `not_before`.
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl RootCertificate {
    /// Create a record.
    pub fn new(bytes: Vec<u8>, not_before: u64, signature: Vec<u8>) -> Self {
        Self {
            bytes,
            not_before,
            signature,
        }
    }

    /// Total order used to pick a winner between two records.
    ///
    /// Later `not_before` is greater. Equal timestamps fall back to the
    /// signature bytes, then the payload bytes.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        self.not_before
            .cmp(&other.not_before)
            .then_with(|| self.signature.cmp(&other.signature))
            .then_with(|| self.bytes.cmp(&other.bytes))
    }

    /// Check if this record should replace `other`.
    pub fn supersedes(&self, other: &Self) -> bool {
        self.priority_cmp(other) == Ordering::Greater
    }

    /// First bytes of the signature as hex, for log lines.
    pub fn signature_prefix(&self) -> String {
        hex::encode(&self.signature[..self.signature.len().min(8)])
    }
}

impl std::fmt::Display for RootCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "root CA (not_before={}, sig={}, {} bytes)",
            self.not_before,
            self.signature_prefix(),
            self.bytes.len()
        )
    }
}

/// One node's knowledge of the cluster.
///
/// `ClusterInfo::default()` (no certificate, no URLs) is the identity of
/// [`merge`](crate::merge()).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Best known root certificate, shared between snapshots.
    pub root_certificate: Option<Arc<RootCertificate>>,
    /// Known API-server endpoints.
    pub apiserver_urls: BTreeSet<String>,
}

impl ClusterInfo {
    /// Create a value from an optional certificate and any URLs.
    pub fn new<I, S>(root_certificate: Option<RootCertificate>, apiserver_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root_certificate: root_certificate.map(Arc::new),
            apiserver_urls: apiserver_urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the root certificate.
    #[must_use]
    pub fn with_root_certificate(mut self, certificate: RootCertificate) -> Self {
        self.root_certificate = Some(Arc::new(certificate));
        self
    }

    /// Add an API-server URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.apiserver_urls.insert(url.into());
        self
    }

    /// True when there is neither a certificate nor any URL.
    pub fn is_empty(&self) -> bool {
        self.root_certificate.is_none() && self.apiserver_urls.is_empty()
    }

    /// `not_before` of the held certificate, if any.
    pub fn not_before(&self) -> Option<u64> {
        self.root_certificate.as_ref().map(|c| c.not_before)
    }

    /// Serialize for the wire. Never limited, so held state always encodes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        wire().serialize(self).map_err(Error::Encode)
    }

    /// Size of [`encode`](Self::encode)'s output.
    pub fn encoded_len(&self) -> Result<u64> {
        wire().serialized_size(self).map_err(Error::Encode)
    }

    /// Fail with [`Error::PayloadTooLarge`] unless peers would accept this value.
    pub fn check_payload_size(&self) -> Result<()> {
        let size = self.encoded_len()?;
        if size > MAX_PAYLOAD_BYTES {
            return Err(Error::PayloadTooLarge {
                size,
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        Ok(())
    }

    /// Parse a wire payload. Trailing bytes and oversized payloads are errors.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        wire()
            .with_limit(MAX_PAYLOAD_BYTES)
            .deserialize(buf)
            .map_err(Error::Decode)
    }
}

impl std::fmt::Display for ClusterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root_certificate {
            Some(cert) => write!(f, "{{{}, urls: [", cert)?,
            None => write!(f, "{{no root CA, urls: [")?,
        }
        for (i, url) in self.apiserver_urls.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", url)?;
        }
        write!(f, "]}}")
    }
}
