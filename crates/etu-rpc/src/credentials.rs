//! Transport security selection.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig as TlsClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::{Endpoint, Environment};
use crate::status::Status;
use crate::transport::BoxedStream;

/// How a channel secures its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelCredentials {
    /// TLS, server verified against the bundled web PKI roots.
    Tls,
    /// Plaintext TCP, no server authentication.
    Insecure,
}

impl ChannelCredentials {
    #[must_use]
    pub fn from_flag(use_encrypted_transport: bool) -> Self {
        if use_encrypted_transport {
            ChannelCredentials::Tls
        } else {
            ChannelCredentials::Insecure
        }
    }

    #[must_use]
    pub fn is_encrypted(self) -> bool {
        self == ChannelCredentials::Tls
    }

    /// Wrap a connected TCP stream according to these credentials.
    pub(crate) async fn secure(
        self,
        stream: TcpStream,
        endpoint: &Endpoint,
    ) -> Result<BoxedStream, Status> {
        match self {
            ChannelCredentials::Insecure => Ok(Box::new(stream)),
            ChannelCredentials::Tls => {
                let connector = tls_connector()?;
                let server_name = ServerName::try_from(endpoint.host().to_owned()).map_err(|e| {
                    Status::unavailable(format!("invalid TLS server name {}: {e}", endpoint.host()))
                })?;
                let tls = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| Status::unavailable(format!("TLS handshake failed: {e}")))?;
                Ok(Box::new(tls))
            }
        }
    }
}

/// Credentials for a deployment environment: TLS in production, plaintext otherwise.
#[must_use]
pub fn credentials(environment: Environment) -> ChannelCredentials {
    ChannelCredentials::from_flag(environment.is_production())
}

fn tls_connector() -> Result<TlsConnector, Status> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = TlsClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Status::unavailable(format!("TLS configuration error: {e}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
