use {
    super::*,
    rustls::{
        crypto::ring,
        pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
    },
    std::path::Path,
};

pub(super) fn acceptor(cert: &Path, key: &Path) -> Result<TlsAcceptor> {
    let certs = CertificateDer::pem_file_iter(cert)
        .with_context(|| format!("failed to open certificate `{}`", cert.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificate `{}`", cert.display()))?;

    ensure!(
        !certs.is_empty(),
        "no certificates found in `{}`",
        cert.display()
    );

    let key = PrivateKeyDer::from_pem_file(key)
        .with_context(|| format!("failed to load private key `{}`", key.display()))?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .context("failed to configure TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate or key")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
