// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! TLS acceptor/connector construction and the trust-on-first-use server
//! certificate verifier.
//!
//! The server side is a plain `rustls::ServerConfig` built from a
//! certificate chain and key on disk — nothing unusual. The client side is
//! the interesting part: rather than validating against a CA root, the
//! client pins whatever certificate it sees the first time it talks to a
//! host and refuses to silently accept a different one later. Where that
//! pin is persisted is left to the caller (`screenplay-client` backs it
//! with a file per hostname); this module only needs a place to read and
//! write one certificate's bytes.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error as TlsError, ServerConfig, SignatureScheme};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::NetError;

/// Load a PEM certificate chain from disk.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, NetError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(NetError::Io)
}

/// Load a single PEM private key from disk (PKCS#8 or RSA).
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, NetError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| NetError::Tls(format!("no private key found in {}", path.display())))
}

/// Build a server-side TLS acceptor from a certificate chain and key.
pub fn server_acceptor(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, NetError> {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| NetError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Persists and retrieves the single pinned certificate for a hostname.
///
/// Implemented by the cert store each endpoint keeps on disk
/// (`<crt_folder>/<base64url(hostname)>.pem` on the client).
pub trait CertPinStore: fmt::Debug + Send + Sync {
    /// The DER bytes of the certificate previously pinned for `host`, if
    /// any.
    fn load_pinned(&self, host: &str) -> Option<Vec<u8>>;
    /// Persist `der` as the pinned certificate for `host`.
    fn store_pinned(&self, host: &str, der: &[u8]);
}

/// A [`ServerCertVerifier`] that trusts a host's certificate on first
/// contact and thereafter requires an exact byte match.
#[derive(Debug)]
pub struct TofuVerifier<S: CertPinStore> {
    host: String,
    store: Arc<S>,
    provider: CryptoProvider,
}

impl<S: CertPinStore> TofuVerifier<S> {
    /// Build a verifier that pins certificates for `host` through `store`.
    #[must_use]
    pub fn new(host: String, store: Arc<S>) -> Self {
        Self {
            host,
            store,
            provider: rustls::crypto::ring::default_provider(),
        }
    }
}

impl<S: CertPinStore> ServerCertVerifier for TofuVerifier<S> {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let presented = end_entity.as_ref();
        match self.store.load_pinned(&self.host) {
            Some(pinned) if pinned == presented => Ok(ServerCertVerified::assertion()),
            Some(_) => Err(TlsError::General(format!(
                "certificate for {} does not match the pinned certificate",
                self.host
            ))),
            None => {
                self.store.store_pinned(&self.host, presented);
                tracing::warn!(host = %self.host, "pinning certificate on first contact");
                Ok(ServerCertVerified::assertion())
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Build a client-side TLS connector that trusts-on-first-use via `store`.
pub fn client_connector<S: CertPinStore + 'static>(host: String, store: Arc<S>) -> TlsConnector {
    let verifier = Arc::new(TofuVerifier::new(host, store));
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MemPinStore(Mutex<Option<Vec<u8>>>);

    impl CertPinStore for MemPinStore {
        fn load_pinned(&self, _host: &str) -> Option<Vec<u8>> {
            self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
        }

        fn store_pinned(&self, _host: &str, der: &[u8]) {
            *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(der.to_vec());
        }
    }

    #[test]
    fn first_contact_pins_then_matches() {
        let store = Arc::new(MemPinStore::default());
        let verifier = TofuVerifier::new("example.invalid".to_string(), store.clone());
        let cert = CertificateDer::from(vec![1, 2, 3, 4]);
        let name = ServerName::try_from("example.invalid").expect("valid name");
        let now = UnixTime::now();

        verifier
            .verify_server_cert(&cert, &[], &name, &[], now)
            .expect("first contact pins");
        assert_eq!(store.load_pinned("example.invalid"), Some(vec![1, 2, 3, 4]));

        verifier
            .verify_server_cert(&cert, &[], &name, &[], now)
            .expect("matching cert verifies");
    }

    #[test]
    fn mismatched_cert_is_rejected() {
        let store = Arc::new(MemPinStore::default());
        let verifier = TofuVerifier::new("example.invalid".to_string(), store);
        let name = ServerName::try_from("example.invalid").expect("valid name");
        let now = UnixTime::now();
        let first = CertificateDer::from(vec![1, 2, 3]);
        let second = CertificateDer::from(vec![4, 5, 6]);

        verifier
            .verify_server_cert(&first, &[], &name, &[], now)
            .expect("first contact pins");
        assert!(verifier
            .verify_server_cert(&second, &[], &name, &[], now)
            .is_err());
    }
}
