// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The client's on-disk half of trust-on-first-use certificate pinning
//! one PEM-free, raw-DER file per hostname under a certificate
//! folder, named by the base64url encoding of the hostname so arbitrary
//! host strings never collide with path separators.

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use screenplay_net::CertPinStore;

/// A [`CertPinStore`] backed by `<crt_folder>/<base64url(hostname)>.pem`.
#[derive(Debug, Clone)]
pub struct FileCertPinStore {
    crt_folder: PathBuf,
}

impl FileCertPinStore {
    /// Pin certificates under `crt_folder`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if `crt_folder` cannot be created.
    pub fn new(crt_folder: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&crt_folder)?;
        Ok(Self { crt_folder })
    }

    fn path_for(&self, host: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(host.as_bytes());
        self.crt_folder.join(format!("{encoded}.pem"))
    }
}

impl CertPinStore for FileCertPinStore {
    fn load_pinned(&self, host: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(host)).ok()
    }

    fn store_pinned(&self, host: &str, der: &[u8]) {
        if let Err(err) = fs::write(self.path_for(host), der) {
            tracing::warn!(host, ?err, "failed to persist pinned certificate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_pinned_certificate() {
        let dir = tempdir();
        let store = FileCertPinStore::new(dir.clone()).expect("create store");
        assert!(store.load_pinned("example.invalid").is_none());

        store.store_pinned("example.invalid", &[1, 2, 3, 4]);
        assert_eq!(store.load_pinned("example.invalid"), Some(vec![1, 2, 3, 4]));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn distinct_hosts_do_not_collide_on_disk() {
        let dir = tempdir();
        let store = FileCertPinStore::new(dir.clone()).expect("create store");
        store.store_pinned("a.example", &[1]);
        store.store_pinned("a/b.example", &[2]);
        assert_eq!(store.load_pinned("a.example"), Some(vec![1]));
        assert_eq!(store.load_pinned("a/b.example"), Some(vec![2]));
        let _ = fs::remove_dir_all(&dir);
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        dir.push(format!("screenplay-client-pin-store-test-{nanos}"));
        dir
    }
}
