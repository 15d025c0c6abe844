//! Certificate trust decisions for the secured channel.
//!
//! Gateways present self-signed certificates whose subject is the bridge
//! id, not the address we dialed. Trust is therefore decided by an
//! explicit [`TrustEvaluator`] that sees the presented chain and the
//! target address, and returns accept or reject. A rejection falls back
//! to ordinary webpki verification against the bundled public roots.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, trace};

use crate::error::Error;

// ── Decision ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Accept,
    Reject,
}

/// `(certificate chain, target address) → accept | reject`.
///
/// The chain is leaf-first. Implementations must be pure: no I/O, no
/// caching across calls.
pub trait TrustEvaluator: fmt::Debug + Send + Sync {
    fn evaluate(
        &self,
        chain: &[CertificateDer<'_>],
        target: &ServerName<'_>,
        now: UnixTime,
    ) -> TrustDecision;
}

// ── GatewayTrust ─────────────────────────────────────────────────────

/// Default evaluator for local gateways.
///
/// 1. A chain that validates against the pinned vendor root is accepted,
///    even when the certificate names don't cover the dialed address.
/// 2. Any certificate is accepted for private-range IP targets.
/// 3. Everything else is rejected.
#[derive(Debug, Default)]
pub struct GatewayTrust {
    pinned: Option<Arc<WebPkiServerVerifier>>,
}

impl GatewayTrust {
    /// Evaluator with no pinned root (private-range rule only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin one or more vendor root certificates.
    pub fn with_pinned_roots(roots: Vec<CertificateDer<'static>>) -> Result<Self, Error> {
        let mut store = RootCertStore::empty();
        for root in roots {
            store
                .add(root)
                .map_err(|e| Error::Tls(format!("invalid pinned root: {e}")))?;
        }

        let verifier =
            WebPkiServerVerifier::builder_with_provider(Arc::new(store), crypto_provider())
                .build()
                .map_err(|e| Error::Tls(format!("failed to build pinned verifier: {e}")))?;

        Ok(Self {
            pinned: Some(verifier),
        })
    }

    /// Load pinned roots from a PEM bundle on disk.
    pub fn from_pem_file(path: &Path) -> Result<Self, Error> {
        let pem = std::fs::read(path)
            .map_err(|e| Error::Tls(format!("failed to read pinned root: {e}")))?;
        let roots = CertificateDer::pem_slice_iter(&pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Tls(format!("invalid pinned root PEM: {e}")))?;
        if roots.is_empty() {
            return Err(Error::Tls(format!(
                "no certificates in {}",
                path.display()
            )));
        }
        Self::with_pinned_roots(roots)
    }

    pub fn has_pinned_root(&self) -> bool {
        self.pinned.is_some()
    }

    fn validates_against_pin(
        &self,
        chain: &[CertificateDer<'_>],
        target: &ServerName<'_>,
        now: UnixTime,
    ) -> bool {
        let (Some(pinned), Some((leaf, intermediates))) = (&self.pinned, chain.split_first())
        else {
            return false;
        };

        match pinned.verify_server_cert(leaf, intermediates, target, &[], now) {
            Ok(_) => true,
            // Chain is good, only the name differs.
            Err(rustls::Error::InvalidCertificate(ref e)) if is_name_mismatch(e) => true,
            Err(e) => {
                debug!(error = %e, "chain does not validate against pinned root");
                false
            }
        }
    }
}

impl TrustEvaluator for GatewayTrust {
    fn evaluate(
        &self,
        chain: &[CertificateDer<'_>],
        target: &ServerName<'_>,
        now: UnixTime,
    ) -> TrustDecision {
        if self.validates_against_pin(chain, target, now) {
            trace!(?target, "accepted via pinned root");
            return TrustDecision::Accept;
        }

        if target_is_private(target) {
            trace!(?target, "accepted: private-range target");
            return TrustDecision::Accept;
        }

        debug!(?target, "rejected: public target without pinned chain");
        TrustDecision::Reject
    }
}

// `NotValidForNameContext` is the newer spelling of the same condition.
fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(err, CertificateError::NotValidForName)
        || format!("{err:?}").starts_with("NotValidForName")
}

// ── Private-range classification ─────────────────────────────────────

/// RFC 1918, loopback and link-local IPv4; loopback, ULA and link-local IPv6.
pub fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_address(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn target_is_private(target: &ServerName<'_>) -> bool {
    match target {
        ServerName::IpAddress(ip) => is_private_address(IpAddr::from(*ip)),
        ServerName::DnsName(name) => name
            .as_ref()
            .parse::<IpAddr>()
            .is_ok_and(is_private_address),
        _ => false,
    }
}

// ── rustls verifier ──────────────────────────────────────────────────

pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// rustls verifier that consults a [`TrustEvaluator`] first and falls
/// back to webpki verification against public roots on rejection.
#[derive(Debug)]
pub struct GatewayCertVerifier {
    evaluator: Arc<dyn TrustEvaluator>,
    fallback: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl GatewayCertVerifier {
    pub fn new(evaluator: Arc<dyn TrustEvaluator>) -> Result<Self, Error> {
        let provider = crypto_provider();
        let roots: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        let fallback = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| Error::Tls(format!("failed to build default verifier: {e}")))?;

        Ok(Self {
            evaluator,
            fallback,
            provider,
        })
    }

    /// Build a rustls client config that uses this verifier.
    pub fn into_client_config(self) -> Result<rustls::ClientConfig, Error> {
        let provider = self.provider.clone();
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self))
            .with_no_client_auth();
        Ok(config)
    }
}

impl ServerCertVerifier for GatewayCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        match self.evaluator.evaluate(&chain, server_name, now) {
            TrustDecision::Accept => Ok(ServerCertVerified::assertion()),
            TrustDecision::Reject => self.fallback.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};

    fn self_signed() -> CertificateDer<'static> {
        let certified = rcgen::generate_simple_self_signed(vec!["001788fffe4a5b6c".into()]).unwrap();
        certified.cert.der().clone()
    }

    fn name(raw: &'static str) -> ServerName<'static> {
        ServerName::try_from(raw).unwrap()
    }

    #[test]
    fn private_ranges() {
        for raw in ["10.0.0.4", "172.16.3.9", "192.168.1.20", "127.0.0.1", "169.254.0.7", "fd00::1", "fe80::1", "::1"] {
            assert!(is_private_address(raw.parse().unwrap()), "{raw} should be private");
        }
        for raw in ["8.8.8.8", "172.32.0.1", "100.64.0.1", "2001:4860::8888", "1.1.1.1"] {
            assert!(!is_private_address(raw.parse().unwrap()), "{raw} should be public");
        }
    }

    #[test]
    fn self_signed_private_target_accepted() {
        let verifier = GatewayCertVerifier::new(Arc::new(GatewayTrust::new())).unwrap();
        let cert = self_signed();

        let result =
            verifier.verify_server_cert(&cert, &[], &name("192.168.1.20"), &[], UnixTime::now());
        assert!(result.is_ok());
    }

    #[test]
    fn self_signed_public_target_rejected() {
        let verifier = GatewayCertVerifier::new(Arc::new(GatewayTrust::new())).unwrap();
        let cert = self_signed();

        let result = verifier.verify_server_cert(&cert, &[], &name("8.8.8.8"), &[], UnixTime::now());
        assert!(result.is_err());
    }

    #[test]
    fn hostname_targets_are_not_private() {
        let trust = GatewayTrust::new();
        let decision = trust.evaluate(&[self_signed()], &name("bridge.example.com"), UnixTime::now());
        assert_eq!(decision, TrustDecision::Reject);
    }

    #[test]
    fn pinned_root_accepts_public_target() {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let leaf = CertificateParams::new(vec!["001788fffe4a5b6c".into()])
            .unwrap()
            .signed_by(&leaf_key, &ca, &ca_key)
            .unwrap();

        let trust = GatewayTrust::with_pinned_roots(vec![ca.der().clone()]).unwrap();
        assert!(trust.has_pinned_root());

        let decision = trust.evaluate(&[leaf.der().clone()], &name("8.8.8.8"), UnixTime::now());
        assert_eq!(decision, TrustDecision::Accept);

        // A certificate from some other issuer is still rejected.
        let decision = trust.evaluate(&[self_signed()], &name("8.8.8.8"), UnixTime::now());
        assert_eq!(decision, TrustDecision::Reject);
    }
}
