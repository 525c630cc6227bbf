//! TLS client configuration for probing.
//!
//! Certificates are never verified: the probes talk to test servers with
//! self-signed certificates and only care about framing behavior.

use std::io;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

pub const ALPN_H2: &[u8] = b"h2";
pub const ALPN_H2C: &[u8] = b"h2c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    /// ALPN protocols offered, in preference order.
    pub alpn: Vec<Vec<u8>>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            alpn: vec![ALPN_H2.to_vec()],
        }
    }
}

impl TlsOptions {
    pub fn with_alpn(mut self, protocols: &[&[u8]]) -> Self {
        self.alpn = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }
}

#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0
            .signature_verification_algorithms
            .supported_schemes()
            .to_vec()
    }
}

/// Build a client config for `options`.
pub fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, rustls::Error> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(rustls::ALL_VERSIONS)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
        .with_no_client_auth();
    config.alpn_protocols = options.alpn.clone();
    Ok(Arc::new(config))
}

pub fn server_name(name: &str) -> io::Result<ServerName<'static>> {
    ServerName::try_from(name.to_owned())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{name}: {e}")))
}

/// Whether a handshake error means the peer refused us, as opposed to a local failure.
pub fn is_peer_rejection(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => true,
        io::ErrorKind::InvalidData => err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .is_some_and(|e| {
                matches!(
                    e,
                    rustls::Error::AlertReceived(_)
                        | rustls::Error::PeerIncompatible(_)
                        | rustls::Error::NoApplicationProtocol
                )
            }),
        _ => false,
    }
}

/// TLS record content types.
const RECORD_ALERT: u8 = 0x15;
const RECORD_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

/// TLS 1.0 on the record layer, as most stacks send for the first flight.
const RECORD_VERSION: u16 = 0x0301;
pub const LEGACY_TLS11: u16 = 0x0302;

/// CBC suites every TLS 1.1 server understands, plus the renegotiation SCSV.
const LEGACY_CIPHER_SUITES: [u16; 7] = [0xc013, 0xc014, 0xc009, 0xc00a, 0x002f, 0x0035, 0x00ff];

/// A ClientHello record that offers nothing newer than `version`.
///
/// The TLS stack refuses to send anything below 1.2, so probes that check a
/// server turns down old versions write this on a bare TCP stream instead.
pub fn legacy_client_hello(server_name: &str, version: u16) -> Vec<u8> {
    let mut random = [0u8; 32];
    if aws_lc_rs::default_provider()
        .secure_random
        .fill(&mut random)
        .is_err()
    {
        random = [0x5a; 32];
    }

    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(&version.to_be_bytes());
    body.extend_from_slice(&random);
    // empty session id
    body.push(0);
    body.extend_from_slice(&((LEGACY_CIPHER_SUITES.len() * 2) as u16).to_be_bytes());
    for suite in LEGACY_CIPHER_SUITES {
        body.extend_from_slice(&suite.to_be_bytes());
    }
    // null compression only
    body.extend_from_slice(&[1, 0]);

    let mut extensions = Vec::new();
    let is_ip = server_name.parse::<std::net::IpAddr>().is_ok();
    if !server_name.is_empty() && !is_ip && server_name.len() <= 253 {
        let name = server_name.as_bytes();
        let list_len = name.len() + 3;
        extensions.extend_from_slice(&0x0000u16.to_be_bytes());
        extensions.extend_from_slice(&((list_len + 2) as u16).to_be_bytes());
        extensions.extend_from_slice(&(list_len as u16).to_be_bytes());
        extensions.push(0);
        extensions.extend_from_slice(&(name.len() as u16).to_be_bytes());
        extensions.extend_from_slice(name);
    }
    // ALPN: h2
    extensions.extend_from_slice(&0x0010u16.to_be_bytes());
    extensions.extend_from_slice(&((ALPN_H2.len() + 3) as u16).to_be_bytes());
    extensions.extend_from_slice(&((ALPN_H2.len() + 1) as u16).to_be_bytes());
    extensions.push(ALPN_H2.len() as u8);
    extensions.extend_from_slice(ALPN_H2);

    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = Vec::with_capacity(4 + body.len());
    handshake.push(HANDSHAKE_CLIENT_HELLO);
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut record = Vec::with_capacity(5 + handshake.len());
    record.push(RECORD_HANDSHAKE);
    record.extend_from_slice(&RECORD_VERSION.to_be_bytes());
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

/// How a server answered a [`legacy_client_hello`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyReply {
    Alert { level: u8, description: u8 },
    ServerHello { version: u16 },
    /// Too short to tell, or not TLS at all.
    Other,
}

pub fn classify_legacy_reply(bytes: &[u8]) -> LegacyReply {
    match bytes {
        [RECORD_ALERT, _, _, _, _, level, description, ..] => LegacyReply::Alert {
            level: *level,
            description: *description,
        },
        [RECORD_HANDSHAKE, _, _, _, _, HANDSHAKE_SERVER_HELLO, _, _, _, hi, lo, ..] => {
            LegacyReply::ServerHello {
                version: u16::from_be_bytes([*hi, *lo]),
            }
        }
        _ => LegacyReply::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_sets_alpn() {
        let options = TlsOptions::default().with_alpn(&[ALPN_H2C]);
        let config = client_config(&options).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2c".to_vec()]);
    }

    #[test]
    fn legacy_hello_is_a_well_formed_record() {
        let hello = legacy_client_hello("example.test", LEGACY_TLS11);
        assert_eq!(hello[0], RECORD_HANDSHAKE);
        let record_len = u16::from_be_bytes([hello[3], hello[4]]) as usize;
        assert_eq!(hello.len(), 5 + record_len);

        assert_eq!(hello[5], HANDSHAKE_CLIENT_HELLO);
        let hs_len = u32::from_be_bytes([0, hello[6], hello[7], hello[8]]) as usize;
        assert_eq!(record_len, 4 + hs_len);
        assert_eq!(&hello[9..11], &LEGACY_TLS11.to_be_bytes());

        let tail = &hello[hello.len() - 2..];
        assert_eq!(tail, ALPN_H2);
        assert!(hello.windows(12).any(|w| w == b"example.test"));
    }

    #[test]
    fn legacy_hello_omits_sni_for_ip_literals() {
        let hello = legacy_client_hello("127.0.0.1", LEGACY_TLS11);
        assert!(!hello.windows(9).any(|w| w == b"127.0.0.1"));
    }

    #[test]
    fn classifies_replies() {
        assert_eq!(
            classify_legacy_reply(&[0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x46]),
            LegacyReply::Alert {
                level: 2,
                description: 0x46
            }
        );
        assert_eq!(
            classify_legacy_reply(&[0x16, 0x03, 0x02, 0x00, 0x30, 0x02, 0x00, 0x00, 0x2c, 0x03, 0x02]),
            LegacyReply::ServerHello { version: 0x0302 }
        );
        assert_eq!(classify_legacy_reply(b"HTTP/1.1"), LegacyReply::Other);
        assert_eq!(classify_legacy_reply(&[]), LegacyReply::Other);
    }

    #[test]
    fn eof_and_reset_are_rejections() {
        assert!(is_peer_rejection(&io::Error::from(io::ErrorKind::UnexpectedEof)));
        assert!(is_peer_rejection(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_peer_rejection(&io::Error::from(io::ErrorKind::PermissionDenied)));

        let alert = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(rustls::AlertDescription::ProtocolVersion),
        );
        assert!(is_peer_rejection(&alert));
    }
}
