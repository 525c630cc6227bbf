//! Connection driver.
//!
//! A [`Conn`] owns one transport (TLS or plain TCP, or any in-memory stream in
//! tests) for the lifetime of a scenario. All reads are bounded by absolute
//! deadlines so a silent server shows up as [`Error::Timeout`], never a hang.

use std::io;
use std::time::Duration;

use h2interop_frame::{
    FRAME_HEADER_LEN, Frame, FrameCodec, FrameError, FrameHeader, GoAwayFrame, Http1Frame,
    PREFACE, SettingsFrame, frame_type,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

use crate::InteropCtx;
use crate::tls::{self, TlsOptions};

/// How long to wait for more bytes of an HTTP/1 answer before taking what arrived.
pub const HTTP1_READ_GRACE: Duration = Duration::from_millis(100);

/// Any byte stream a connection can run over.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Transport is up (TLS handshake done, if any); nothing sent yet.
    Connected,
    PrefaceSent,
    Streaming,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection closed by peer")]
    Eof,

    #[error("deadline exceeded")]
    Timeout,

    #[error("dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake with {server_name}: {source}")]
    Handshake {
        server_name: String,
        #[source]
        source: io::Error,
    },

    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error(transparent)]
    Frame(FrameError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Eof => Self::Eof,
            FrameError::Io(e) => Self::Io(e),
            other => Self::Frame(other),
        }
    }
}

impl Error {
    /// The peer closed or reset the connection.
    pub fn is_closure(&self) -> bool {
        match self {
            Self::Eof => true,
            Self::Io(e) => is_closure_kind(e.kind()),
            _ => false,
        }
    }
}

fn is_closure_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

/// One probe connection.
pub struct Conn {
    io: Box<dyn Io>,
    state: ConnState,
    alpn: Option<Vec<u8>>,
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("state", &self.state)
            .field("alpn", &self.alpn)
            .finish_non_exhaustive()
    }
}

impl Conn {
    /// Connect with ALPN `h2`, over TLS when `ctx.use_tls` is set.
    pub async fn connect(ctx: &InteropCtx) -> Result<Self, Error> {
        Self::connect_with(ctx, &TlsOptions::default()).await
    }

    pub async fn connect_with(ctx: &InteropCtx, options: &TlsOptions) -> Result<Self, Error> {
        let tcp = Self::dial(ctx).await?;
        if !ctx.use_tls {
            return Ok(Self::from_io(tcp));
        }

        let server_name = ctx.server_name().to_owned();
        let handshake_err = |source: io::Error| Error::Handshake {
            server_name: server_name.clone(),
            source,
        };

        let config = tls::client_config(options).map_err(|e| handshake_err(io::Error::other(e)))?;
        let name = tls::server_name(&server_name).map_err(handshake_err)?;
        let stream = tokio::time::timeout(ctx.timeout, TlsConnector::from(config).connect(name, tcp))
            .await
            .map_err(|_| handshake_err(io::ErrorKind::TimedOut.into()))?
            .map_err(handshake_err)?;

        let alpn = stream.get_ref().1.alpn_protocol().map(<[u8]>::to_vec);
        debug!(
            server_name = %server_name,
            alpn = ?alpn.as_deref().map(String::from_utf8_lossy),
            "TLS established"
        );

        let mut conn = Self::from_io(stream);
        conn.alpn = alpn;
        Ok(conn)
    }

    /// Plain TCP connection to the target, bounded by `ctx.timeout`.
    pub async fn dial(ctx: &InteropCtx) -> Result<TcpStream, Error> {
        let addr = ctx.authority();
        let connect = TcpStream::connect(addr.as_str());
        let tcp = match tokio::time::timeout(ctx.timeout, connect).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(source)) => return Err(Error::Dial { addr, source }),
            Err(_) => {
                return Err(Error::Dial {
                    addr,
                    source: io::ErrorKind::TimedOut.into(),
                });
            }
        };
        tcp.set_nodelay(true)?;
        debug!(%addr, "connected");
        Ok(tcp)
    }

    /// Wrap an already established stream.
    pub fn from_io(io: impl Io + 'static) -> Self {
        Self {
            io: Box::new(io),
            state: ConnState::Connected,
            alpn: None,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Protocol the server selected via ALPN, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    pub async fn send_preface(&mut self) -> Result<(), Error> {
        self.send_raw(PREFACE).await?;
        self.state = ConnState::PrefaceSent;
        Ok(())
    }

    /// Write arbitrary bytes, e.g. a corrupted preface or a hand-built frame.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!(len = bytes.len(), "send raw");
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    pub async fn send_frame<F: FrameCodec>(&mut self, frame: &F) -> Result<(), Error> {
        let bytes = frame.marshal_binary()?;
        let header = frame.header();
        debug!(
            frame_type = frame.frame_type(),
            flags = header.flags,
            stream_id = header.stream_id,
            len = bytes.len() - FRAME_HEADER_LEN,
            "send frame"
        );
        self.send_raw(&bytes).await
    }

    /// Client preface followed by `settings`.
    pub async fn handshake(&mut self, settings: &SettingsFrame) -> Result<(), Error> {
        self.send_preface().await?;
        self.send_frame(settings).await?;
        self.state = ConnState::Streaming;
        Ok(())
    }

    /// Read until `buf` is full or the stream ends. Returns how much was read.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut read = 0;
        while read < buf.len() {
            match self.io.read(&mut buf[read..]).await {
                Ok(0) => break,
                Ok(n) => read += n,
                // TLS streams report a missing close_notify this way
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(read)
    }

    /// Read one frame without a deadline.
    pub async fn read_frame(&mut self) -> Result<Frame, Error> {
        let result = self.read_frame_inner().await;
        match &result {
            Ok(frame) => {
                if self.state == ConnState::PrefaceSent {
                    self.state = ConnState::Streaming;
                }
                debug!(%frame, "recv frame");
            }
            Err(e) if e.is_closure() => self.state = ConnState::Closed,
            Err(_) => {}
        }
        result
    }

    async fn read_frame_inner(&mut self) -> Result<Frame, Error> {
        let mut head = [0u8; FRAME_HEADER_LEN];
        let read = self.fill(&mut head).await?;
        if read == 0 {
            return Err(Error::Eof);
        }
        if read < FRAME_HEADER_LEN {
            return Err(FrameError::ShortHeader { read }.into());
        }
        let header = FrameHeader::from_bytes(&head);

        if header.frame_type == frame_type::HTTP1 {
            let data = self.read_http1_body(header.length as usize).await?;
            return Ok(Frame::Http1(Http1Frame { header, data }));
        }

        let expected = header.length as usize;
        let mut payload = vec![0u8; expected];
        let read = self.fill(&mut payload).await?;
        if read < expected {
            return Err(FrameError::ShortPayload { expected, read }.into());
        }
        Ok(Frame::decode(header, &payload)?)
    }

    /// The "length" of an HTTP/1 answer is ASCII text, so stop at EOF or when
    /// the peer goes quiet rather than waiting for that many bytes.
    async fn read_http1_body(&mut self, limit: usize) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        while data.len() < limit {
            let want = chunk.len().min(limit - data.len());
            match tokio::time::timeout(HTTP1_READ_GRACE, self.io.read(&mut chunk[..want])).await {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => data.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) if is_closure_kind(e.kind()) => break,
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        Ok(data)
    }

    /// Read one frame, giving up at `deadline`.
    pub async fn read_frame_before(&mut self, deadline: Instant) -> Result<Frame, Error> {
        tokio::time::timeout_at(deadline, self.read_frame())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// One raw read. `Ok(0)` means the peer closed the stream.
    pub async fn read_raw(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        match tokio::time::timeout(timeout, self.io.read(buf)).await {
            Err(_) => Err(Error::Timeout),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Read frames until `pick` accepts one, within `timeout`.
    ///
    /// Frames `pick` rejects are logged and dropped.
    pub async fn read_until<T>(
        &mut self,
        timeout: Duration,
        mut pick: impl FnMut(&Frame) -> Option<T>,
    ) -> Result<T, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let frame = self.read_frame_before(deadline).await?;
            if let Some(found) = pick(&frame) {
                return Ok(found);
            }
            debug!(%frame, "ignoring frame");
        }
    }

    /// Wait for a GOAWAY, ignoring other frames. An HTTP/1 answer ends the wait.
    pub async fn expect_goaway_soon(&mut self, timeout: Duration) -> Result<GoAwayFrame, Error> {
        self.read_until(timeout, |frame| match frame {
            Frame::GoAway(goaway) => Some(Ok(goaway.clone())),
            Frame::Http1(_) => Some(Err(Error::UnexpectedFrame(frame.to_string()))),
            _ => None,
        })
        .await?
    }

    /// Read frames until the peer closes the connection.
    pub async fn expect_eof(&mut self, timeout: Duration) -> Result<(), Error> {
        match self.read_until(timeout, |_| None::<()>).await {
            Err(e) if e.is_closure() => Ok(()),
            other => other,
        }
    }

    /// Discard raw bytes until the peer closes the connection. Returns the number discarded.
    pub async fn drain_until_eof(&mut self, timeout: Duration) -> Result<usize, Error> {
        let deadline = Instant::now() + timeout;
        let mut drained = 0;
        let mut buf = [0u8; 4096];
        loop {
            let read = tokio::time::timeout_at(deadline, self.io.read(&mut buf))
                .await
                .map_err(|_| Error::Timeout)?;
            match read {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(e) if is_closure_kind(e.kind()) => break,
                Err(e) => return Err(e.into()),
            }
        }
        self.state = ConnState::Closed;
        trace!(drained, "peer closed");
        Ok(drained)
    }

    /// Shut the transport down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.state == ConnState::Closed {
            return;
        }
        self.state = ConnState::Closed;
        if let Err(e) = self.io.shutdown().await {
            trace!(error = %e, "shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h2interop_frame::{PingFrame, SettingId, SettingsParameter, UnknownFrame};
    use tokio::io::{DuplexStream, duplex};

    fn pair() -> (Conn, DuplexStream) {
        let (client, server) = duplex(64 * 1024);
        (Conn::from_io(client), server)
    }

    #[tokio::test]
    async fn handshake_writes_preface_then_settings() {
        let (mut conn, mut server) = pair();
        let settings = SettingsFrame::new(vec![SettingsParameter::new(
            SettingId::MAX_FRAME_SIZE,
            16_383,
        )]);
        conn.handshake(&settings).await.unwrap();
        assert_eq!(conn.state(), ConnState::Streaming);

        let mut preface = [0u8; 24];
        server.read_exact(&mut preface).await.unwrap();
        assert_eq!(&preface, PREFACE);

        let mut frame = [0u8; 15];
        server.read_exact(&mut frame).await.unwrap();
        assert_eq!(
            frame,
            [0, 0, 6, 4, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0x3f, 0xff]
        );
    }

    #[tokio::test]
    async fn reads_frames_in_order() {
        let (mut conn, mut server) = pair();
        let ping = PingFrame::new(*b"01234567").to_ack();
        server
            .write_all(&SettingsFrame::ack().marshal_binary().unwrap())
            .await
            .unwrap();
        server
            .write_all(&ping.marshal_binary().unwrap())
            .await
            .unwrap();

        assert!(matches!(conn.read_frame().await, Ok(Frame::Settings(s)) if s.is_ack()));
        match conn.read_frame().await {
            Ok(Frame::Ping(p)) => {
                assert!(p.is_ack());
                assert_eq!(p.data, ping.data);
                assert_eq!(p.header.length, 8);
            }
            other => panic!("expected PING ACK, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn eof_before_header_is_eof() {
        let (mut conn, server) = pair();
        drop(server);
        assert!(matches!(conn.read_frame().await, Err(Error::Eof)));
        assert_eq!(conn.state(), ConnState::Closed);
    }

    #[tokio::test]
    async fn partial_header_is_a_frame_error() {
        let (mut conn, mut server) = pair();
        server.write_all(&[0, 0, 8]).await.unwrap();
        drop(server);
        assert!(matches!(
            conn.read_frame().await,
            Err(Error::Frame(FrameError::ShortHeader { read: 3 }))
        ));
    }

    #[tokio::test]
    async fn truncated_payload_is_a_frame_error() {
        let (mut conn, mut server) = pair();
        server
            .write_all(&[0, 0, 8, 6, 0, 0, 0, 0, 0, b'0', b'1'])
            .await
            .unwrap();
        drop(server);
        assert!(matches!(
            conn.read_frame().await,
            Err(Error::Frame(FrameError::ShortPayload {
                expected: 8,
                read: 2
            }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (mut conn, _server) = pair();
        let deadline = Instant::now() + Duration::from_millis(300);
        assert!(matches!(
            conn.read_frame_before(deadline).await,
            Err(Error::Timeout)
        ));
        assert!(matches!(
            conn.expect_goaway_soon(Duration::from_millis(300)).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn read_until_skips_other_frames() {
        let (mut conn, mut server) = pair();
        for ty in [0x0a, 0x0b, 0xfe] {
            let unknown = UnknownFrame::new(ty, vec![1, 2, 3]);
            server
                .write_all(&unknown.marshal_binary().unwrap())
                .await
                .unwrap();
        }
        let goaway = GoAwayFrame::new(0, 6, b"bye".to_vec());
        server
            .write_all(&goaway.marshal_binary().unwrap())
            .await
            .unwrap();

        let got = conn.expect_goaway_soon(Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.error_code, 6);
        assert_eq!(got.debug_data, b"bye");
    }

    #[tokio::test]
    async fn expect_eof_accepts_frames_then_close() {
        let (mut conn, mut server) = pair();
        let goaway = GoAwayFrame::new(0, 1, Vec::new());
        server
            .write_all(&goaway.marshal_binary().unwrap())
            .await
            .unwrap();
        drop(server);
        conn.expect_eof(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn http1_answer_does_not_block() {
        let (mut conn, mut server) = pair();
        server
            .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        // server stays open; the grace period ends the read
        let frame = conn.read_frame().await.unwrap();
        let Frame::Http1(http1) = frame else {
            panic!("expected HTTP/1 answer, got {frame:?}");
        };
        assert_eq!(http1.status_line(), "HTTP/1.1 400 Bad Request");
        drop(server);
    }

    #[tokio::test(start_paused = true)]
    async fn http1_answer_ends_goaway_wait() {
        let (mut conn, mut server) = pair();
        server
            .write_all(b"HTTP/1.1 505 HTTP Version Not Supported\r\n\r\n")
            .await
            .unwrap();
        drop(server);
        match conn.expect_goaway_soon(Duration::from_secs(1)).await {
            Err(Error::UnexpectedFrame(text)) => assert!(text.contains("505")),
            other => panic!("expected UnexpectedFrame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_counts_bytes_until_close() {
        let (mut conn, mut server) = pair();
        server.write_all(b"garbage").await.unwrap();
        drop(server);
        assert_eq!(conn.drain_until_eof(Duration::from_secs(1)).await.unwrap(), 7);
        assert_eq!(conn.state(), ConnState::Closed);
    }

    #[tokio::test]
    async fn read_raw_reports_close_as_zero() {
        let (mut conn, server) = pair();
        drop(server);
        let mut buf = [0u8; 16];
        assert_eq!(conn.read_raw(&mut buf, Duration::from_secs(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut conn, _server) = pair();
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state(), ConnState::Closed);
    }

    #[test]
    fn frame_eof_maps_to_eof() {
        assert!(matches!(Error::from(FrameError::Eof), Error::Eof));
        let reset = Error::from(FrameError::Io(io::ErrorKind::ConnectionReset.into()));
        assert!(reset.is_closure());
        assert!(!Error::Timeout.is_closure());
    }
}
