//! TLS configuration for upstream cluster connections.

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use thiserror::Error;

/// Errors from TLS configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Identity PEM is invalid
    #[error("identity PEM is invalid: {0}")]
    InvalidIdentityPem(#[source] std::io::Error),

    /// Identity PEM is missing a private key: the key must be PKCS8 or RSA/PKCS1 or SEC1
    #[error("identity PEM is missing a private key: the key must be PKCS8 or RSA/PKCS1 or SEC1")]
    MissingPrivateKey,

    /// Identity PEM is missing a certificate
    #[error("identity PEM is missing certificate")]
    MissingCertificate,

    /// Invalid private key
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(#[source] rustls::Error),

    /// Unknown private key format
    #[error("unknown private key format")]
    UnknownPrivateKeyFormat,

    // Using type-erased error to avoid depending on webpki
    /// Failed to add a root certificate
    #[error("failed to add a root certificate: {0}")]
    AddRootCertificate(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Create a `rustls::ClientConfig` from DER root certs and an optional
/// client identity.
///
/// Without root certs the server certificate cannot be verified, so
/// `accept_invalid` is expected to be set in that case.
pub fn rustls_client_config(
    identity_pem: Option<&[u8]>,
    root_certs: Option<&[Vec<u8>]>,
    accept_invalid: bool,
) -> Result<ClientConfig, Error> {
    let config_builder = ClientConfig::builder().with_root_certificates(root_store(root_certs)?);

    let mut client_config = if let Some((chain, pkey)) = identity_pem.map(client_auth).transpose()? {
        config_builder
            .with_client_auth_cert(chain, pkey)
            .map_err(Error::InvalidPrivateKey)?
    } else {
        config_builder.with_no_client_auth()
    };

    if accept_invalid {
        client_config
            .dangerous()
            .set_certificate_verifier(std::sync::Arc::new(NoCertificateVerification {}));
    }
    Ok(client_config)
}

fn root_store(root_certs: Option<&[Vec<u8>]>) -> Result<rustls::RootCertStore, Error> {
    let mut root_store = rustls::RootCertStore::empty();
    if let Some(certs) = root_certs {
        for der in certs {
            root_store
                .add(CertificateDer::from(der.clone()))
                .map_err(|e| Error::AddRootCertificate(Box::new(e)))?;
        }
    }
    Ok(root_store)
}

fn client_auth(data: &[u8]) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
    use rustls_pemfile::Item;

    let mut cert_chain = Vec::new();
    let mut pkcs8_key = None;
    let mut rsa_key = None;
    let mut ec_key = None;
    let mut reader = std::io::Cursor::new(data);
    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(Error::InvalidIdentityPem)? {
            Item::X509Certificate(cert) => cert_chain.push(cert),
            Item::Pkcs8Key(key) => pkcs8_key = Some(PrivateKeyDer::Pkcs8(key)),
            Item::Pkcs1Key(key) => rsa_key = Some(PrivateKeyDer::Pkcs1(key)),
            Item::Sec1Key(key) => ec_key = Some(PrivateKeyDer::Sec1(key)),
            _ => return Err(Error::UnknownPrivateKeyFormat),
        }
    }

    let private_key = pkcs8_key.or(rsa_key).or(ec_key).ok_or(Error::MissingPrivateKey)?;
    if cert_chain.is_empty() {
        return Err(Error::MissingCertificate);
    }
    Ok((cert_chain, private_key))
}

#[derive(Debug)]
struct NoCertificateVerification {}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer],
        _server_name: &ServerName,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_else(|| {
                rustls::crypto::ring::default_provider()
                    .signature_verification_algorithms
                    .supported_schemes()
            })
    }
}
