//! TLS acceptor construction.
//!
//! The operator points `--cert-dir` at a directory holding a PEM certificate
//! chain and its private key, in the layout certbot produces:
//!
//! ```text
//! <cert-dir>/cert.pem      certificate chain, leaf first
//! <cert-dir>/privkey.pem   PKCS#8, PKCS#1 or SEC1 private key
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

/// Certificate chain file name inside the certificate directory.
pub const CERT_FILE: &str = "cert.pem";

/// Private key file name inside the certificate directory.
pub const KEY_FILE: &str = "privkey.pem";

/// Builds a TLS acceptor from `cert.pem` and `privkey.pem` in `cert_dir`.
///
/// # Errors
///
/// Returns an error if either file is missing or unreadable, holds no usable
/// PEM item, or the key does not match the certificate.
pub fn load_acceptor(cert_dir: &Path) -> anyhow::Result<TlsAcceptor> {
    let cert_path = cert_dir.join(CERT_FILE);
    let key_path = cert_dir.join(KEY_FILE);

    let certs = CertificateDer::pem_file_iter(&cert_path)
        .with_context(|| format!("failed to open certificate {}", cert_path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificate {}", cert_path.display()))?;
    anyhow::ensure!(
        !certs.is_empty(),
        "no certificate found in {}",
        cert_path.display()
    );

    let key = PrivateKeyDer::from_pem_file(&key_path)
        .with_context(|| format!("failed to load private key {}", key_path.display()))?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("TLS provider rejected the default protocol versions")?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .context("certificate and private key do not form a valid pair")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
