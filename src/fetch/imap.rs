//! IMAP over TLS, implementing [`MailTransport`] and [`MailSession`].
//!
//! Connections use implicit TLS on the account's port (993 by default).
//! Certificates are not verified: self-hosted mail servers with self-signed
//! certificates are common among the accounts this engine syncs.
//!
//! Every network step is bounded so that one unresponsive server cannot stall
//! the run. Commands share a short limit; the body download of a label's most
//! recent messages gets [`DEFAULT_BODY_FETCH_TIMEOUT`], since a single large
//! attachment can take far longer than a handshake.

use chrono::NaiveDate;
use futures::TryStreamExt;
use itertools::Itertools;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};
use crate::fetch::mail::{MailSession, MailTransport};
use crate::models::MailAccount;

pub const DEFAULT_IMAP_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_BODY_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Await `fut` for at most `limit`, folding both the timeout and the IMAP
/// error into [`IngestError::Transport`].
async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(IngestError::Transport(format!("{what}: {e}"))),
        Err(_) => Err(IngestError::Transport(format!("timed out: {what}"))),
    }
}

/// Connects to IMAP servers over implicit TLS.
#[derive(Clone)]
pub struct ImapTransport {
    tls: TlsConnector,
    timeout: Duration,
    body_timeout: Duration,
}

impl std::fmt::Debug for ImapTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapTransport")
            .field("timeout", &self.timeout)
            .field("body_timeout", &self.body_timeout)
            .finish_non_exhaustive()
    }
}

impl ImapTransport {
    /// `timeout` bounds connect, login and every command except the body
    /// fetch, which is bounded by `body_timeout` (never shorter than `timeout`).
    pub fn new(timeout: Duration, body_timeout: Duration) -> Result<Self> {
        let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| IngestError::Config(format!("tls setup: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth();
        Ok(Self {
            tls: TlsConnector::from(Arc::new(config)),
            timeout,
            body_timeout: body_timeout.max(timeout),
        })
    }
}

impl MailTransport for ImapTransport {
    type Session = ImapSession;

    #[instrument(level = "info", skip_all, fields(host = %account.host, port = account.port))]
    async fn connect(&self, account: &MailAccount, password: &str) -> Result<ImapSession> {
        let tcp = bounded(
            self.timeout,
            "tcp connect",
            TcpStream::connect((account.host.as_str(), account.port)),
        )
        .await?;

        let server_name = ServerName::try_from(account.host.clone())
            .map_err(|e| IngestError::Config(format!("invalid host {}: {e}", account.host)))?;
        let tls = bounded(
            self.timeout,
            "tls handshake",
            self.tls.connect(server_name, tcp),
        )
        .await?;

        let client = async_imap::Client::new(tls);
        let session = bounded(
            self.timeout,
            "login",
            async { client.login(&account.email, password).await.map_err(|(e, _)| e) },
        )
        .await?;

        info!("Connected to IMAP server");
        Ok(ImapSession {
            inner: session,
            timeout: self.timeout,
            body_timeout: self.body_timeout,
        })
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    inner: async_imap::Session<TlsStream<TcpStream>>,
    timeout: Duration,
    body_timeout: Duration,
}

impl std::fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession").finish_non_exhaustive()
    }
}

impl MailSession for ImapSession {
    async fn open(&mut self, container: &str) -> Result<()> {
        match timeout(self.timeout, self.inner.select(container)).await {
            Ok(Ok(mailbox)) => {
                debug!(container, exists = mailbox.exists, "Selected container");
                Ok(())
            }
            Ok(Err(e)) if matches!(e, async_imap::error::Error::No(_)) => {
                Err(IngestError::ContainerNotFound(format!("{container}: {e}")))
            }
            Ok(Err(e)) => Err(IngestError::Transport(format!("select {container}: {e}"))),
            Err(_) => Err(IngestError::Transport(format!("timed out: select {container}"))),
        }
    }

    async fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>> {
        let query = format!("SINCE {}", since.format("%d-%b-%Y"));
        let uids = bounded(self.timeout, "search", self.inner.uid_search(&query)).await?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let uid_set = uids.iter().join(",");
        let inner = &mut self.inner;
        let fetches = bounded(self.body_timeout, "fetch", async {
            let stream = inner.uid_fetch(&uid_set, "(UID BODY.PEEK[])").await?;
            stream.try_collect::<Vec<async_imap::types::Fetch>>().await
        })
        .await?;

        Ok(fetches
            .iter()
            .filter_map(|f| Some((f.uid?, f.body()?.to_vec())))
            .collect())
    }

    async fn close(mut self) -> Result<()> {
        bounded(self.timeout, "logout", self.inner.logout()).await
    }
}
