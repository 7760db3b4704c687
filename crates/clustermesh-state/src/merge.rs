//! The merge engine.
//!
//! Pure functions only: no locks, no logging, no failure cases.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::info::{ClusterInfo, RootCertificate};

/// Outcome of merging `theirs` into `ours`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Merged {
    /// The reconciled value.
    pub result: ClusterInfo,
    /// What `result` has that `ours` did not: the part worth re-broadcasting.
    pub delta: ClusterInfo,
}

/// Decide whether their root certificate beats ours.
///
/// Any certificate beats none. Otherwise the later `not_before` wins and
/// equal timestamps go to the greater signature.
pub fn should_use_their_root_certificate(
    ours: Option<&RootCertificate>,
    theirs: &RootCertificate,
) -> bool {
    match ours {
        None => true,
        Some(ours) => theirs.supersedes(ours),
    }
}

/// Merge `theirs` into `ours`.
///
/// `result` is the same whichever side is passed first. `delta` holds the
/// certificate only when it was replaced, and only the URLs `ours` lacked.
pub fn merge(ours: &ClusterInfo, theirs: &ClusterInfo) -> Merged {
    let mut result = ClusterInfo {
        root_certificate: ours.root_certificate.clone(),
        apiserver_urls: ours.apiserver_urls.clone(),
    };
    let mut delta = ClusterInfo::default();

    if let Some(their_cert) = &theirs.root_certificate {
        if should_use_their_root_certificate(ours.root_certificate.as_deref(), their_cert) {
            result.root_certificate = Some(Arc::clone(their_cert));
            delta.root_certificate = Some(Arc::clone(their_cert));
        }
    }

    let learned: BTreeSet<String> = theirs
        .apiserver_urls
        .difference(&ours.apiserver_urls)
        .cloned()
        .collect();
    result.apiserver_urls.extend(learned.iter().cloned());
    delta.apiserver_urls = learned;

    Merged { result, delta }
}
