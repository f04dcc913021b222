use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme};

use super::{ByteChannel, Interest, Transfer, blocked_or, wait_for_read, wait_for_write};
use crate::config::{TlsOptions, TlsVersion, VerifyMode};
use crate::error::{Error, Result};

/// Certificate verifier that accepts every server certificate.
///
/// Installed for [`VerifyMode::None`]. Signatures are still checked against
/// the presented certificate, so the session is encrypted, just not
/// authenticated.
#[derive(Debug)]
pub struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl NoVerification {
    #[must_use]
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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

/// Build the rustls configuration described by `options`.
///
/// A caller-supplied `client_config` wins over every other field.
///
/// # Errors
///
/// - `Error::Tls` if the protocol versions are rejected or the CA bundle
///   cannot be loaded
pub fn build_client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>> {
    if let Some(config) = &options.client_config {
        return Ok(Arc::clone(config));
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions: &[&'static rustls::SupportedProtocolVersion] = match options.version {
        Some(TlsVersion::Tls12) => &[&rustls::version::TLS12],
        Some(TlsVersion::Tls13) => &[&rustls::version::TLS13],
        None => rustls::ALL_VERSIONS,
    };
    let builder =
        ClientConfig::builder_with_provider(Arc::clone(&provider)).with_protocol_versions(versions)?;

    let config = match options.verify_mode {
        VerifyMode::None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification::new(provider)))
            .with_no_client_auth(),
        VerifyMode::Peer => {
            let mut roots =
                RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            if let Some(path) = &options.ca_file {
                for cert in load_certs_from_file(path)? {
                    roots.add(cert)?;
                }
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };

    Ok(Arc::new(config))
}

/// Read every certificate from a PEM file.
///
/// # Errors
///
/// Returns `Error::Tls` if the file cannot be read or holds no certificates.
pub fn load_certs_from_file(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("cannot parse {}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

#[derive(Debug)]
struct Session {
    conn: ClientConnection,
    plaintext: BytesMut,
}

/// rustls client session over a non-blocking TCP stream.
#[derive(Debug)]
pub struct TlsChannel {
    stream: TcpStream,
    session: Mutex<Session>,
}

impl TlsChannel {
    /// Run the TLS handshake on a blocking stream, then switch it to
    /// non-blocking mode.
    ///
    /// `handshake_timeout` bounds each socket read and write while the
    /// handshake runs.
    ///
    /// # Errors
    ///
    /// - `Error::Tls` for an unusable server name or a failed handshake
    /// - `Error::Io` if the socket mode cannot be changed
    pub fn connect(
        mut stream: TcpStream,
        host: &str,
        config: Arc<ClientConfig>,
        handshake_timeout: Option<Duration>,
    ) -> Result<Self> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Tls(format!("invalid server name: {host}")))?;
        let mut conn = ClientConnection::new(config, server_name)?;

        stream.set_read_timeout(handshake_timeout)?;
        stream.set_write_timeout(handshake_timeout)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut stream)
                .map_err(|e| Error::Tls(format!("handshake failed: {e}")))?;
        }
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;
        stream.set_nonblocking(true)?;

        log::debug!(
            "TLS established with {host} ({:?})",
            conn.protocol_version()
        );

        Ok(Self {
            stream,
            session: Mutex::new(Session {
                conn,
                plaintext: BytesMut::new(),
            }),
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move decrypted application data out of rustls into the staging buffer.
    fn drain_plaintext(session: &mut Session) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        loop {
            match session.conn.reader().read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => session.plaintext.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Send pending TLS records until done or the socket pushes back.
    fn push_records(&self, session: &mut Session) -> io::Result<Transfer> {
        let mut socket = &self.stream;
        while session.conn.wants_write() {
            match session.conn.write_tls(&mut socket) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(_) => {}
                Err(e) => return blocked_or(e, Interest::Write),
            }
        }
        Ok(Transfer::Ready(0))
    }

    fn take_plaintext(session: &mut Session, buf: &mut [u8]) -> usize {
        let n = buf.len().min(session.plaintext.len());
        buf[..n].copy_from_slice(&session.plaintext[..n]);
        session.plaintext.advance(n);
        n
    }
}

impl ByteChannel for TlsChannel {
    fn read(&self, buf: &mut [u8]) -> io::Result<Transfer> {
        let mut session = self.session();
        loop {
            if !session.plaintext.is_empty() {
                return Ok(Transfer::Ready(Self::take_plaintext(&mut session, buf)));
            }

            // key updates and alerts may need an answer before more data flows
            if let Transfer::Blocked(_) = self.push_records(&mut session)? {
                return Ok(Transfer::Blocked(Interest::Write));
            }

            let mut socket = &self.stream;
            match session.conn.read_tls(&mut socket) {
                Ok(0) => return Ok(Transfer::Ready(0)),
                Ok(_) => {
                    let state = session
                        .conn
                        .process_new_packets()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    Self::drain_plaintext(&mut session)?;
                    if state.peer_has_closed() && session.plaintext.is_empty() {
                        return Ok(Transfer::Ready(0));
                    }
                }
                Err(e) => return blocked_or(e, Interest::Read),
            }
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<Transfer> {
        let mut session = self.session();
        if let Transfer::Blocked(interest) = self.push_records(&mut session)? {
            return Ok(Transfer::Blocked(interest));
        }

        let accepted = session.conn.writer().write(buf)?;
        if accepted == 0 && !buf.is_empty() {
            return Ok(Transfer::Blocked(Interest::Write));
        }
        // opportunistic; flush reports anything left behind
        self.push_records(&mut session)?;
        Ok(Transfer::Ready(accepted))
    }

    fn flush(&self) -> io::Result<Transfer> {
        let mut session = self.session();
        self.push_records(&mut session)
    }

    fn has_buffered_bytes(&self) -> bool {
        !self.session().plaintext.is_empty()
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        if self.has_buffered_bytes() {
            return Ok(true);
        }
        wait_for_read(&self.stream, timeout)
    }

    fn wait_writable(&self, timeout: Duration) -> io::Result<bool> {
        Ok(wait_for_write(timeout))
    }

    fn shutdown(&self) {
        {
            let mut session = self.session();
            session.conn.send_close_notify();
            let _ = self.push_records(&mut session);
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
