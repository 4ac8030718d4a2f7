//! Owns the TCP socket: blocking `send_frame`/`recv_frame` with a fixed
//! read timeout, and detection of the panel's `+++` disconnect marker.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::TexecomError;
use crate::frame::Frame;

/// The panel silently drops frames sent too soon after connect.
const POST_CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Matches the protocol spec's 2-3s guidance; used both for read timeout
/// and as the outer bound on how long we wait for a response.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

const HEADER_LEN: usize = 4;
const DISCONNECT_MARKER: [u8; 3] = [b'+', b'+', b'+'];

/// What `recv_frame` produced.
pub enum RecvOutcome {
    Frame(Frame),
    PeerDisconnect,
    Timeout,
}

pub struct SessionTransport {
    stream: TcpStream,
    pub last_sent_frame: Option<Vec<u8>>,
    pub last_send_time: Instant,
    closed: bool,
}

impl SessionTransport {
    /// Connects to `addr`, waits out the mandatory post-connect delay, and
    /// sets the fixed read timeout.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TexecomError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let _ = stream.set_nodelay(true);
        debug!("connected; waiting {:?} before first send", POST_CONNECT_DELAY);
        thread::sleep(POST_CONNECT_DELAY);
        Ok(SessionTransport {
            stream,
            last_sent_frame: None,
            last_send_time: Instant::now(),
            closed: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Serialises and writes `frame`, remembering the encoded bytes for
    /// possible retransmission.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), TexecomError> {
        let wire = frame.encode();
        self.write_raw(&wire)
    }

    /// Re-sends the exact bytes of the last frame sent, byte for byte.
    pub fn retransmit_last(&mut self) -> Result<(), TexecomError> {
        let wire = self
            .last_sent_frame
            .clone()
            .expect("retransmit_last called with no prior send");
        self.write_raw(&wire)
    }

    fn write_raw(&mut self, wire: &[u8]) -> Result<(), TexecomError> {
        trace!("send {} bytes: {:02x?}", wire.len(), wire);
        self.stream.write_all(wire)?;
        self.last_sent_frame = Some(wire.to_vec());
        self.last_send_time = Instant::now();
        Ok(())
    }

    /// Reads exactly one frame, or detects timeout / peer disconnect.
    pub fn recv_frame(&mut self) -> Result<RecvOutcome, TexecomError> {
        let mut header = [0u8; HEADER_LEN];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if is_timeout(&e) => return Ok(RecvOutcome::Timeout),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.closed = true;
                return Ok(RecvOutcome::PeerDisconnect);
            }
            Err(e) => return Err(e.into()),
        }

        if header[0..3] == DISCONNECT_MARKER {
            warn!("panel sent '+++' disconnect marker");
            self.closed = true;
            return Ok(RecvOutcome::PeerDisconnect);
        }

        let total_length = header[2] as usize;
        if total_length < HEADER_LEN {
            return Err(TexecomError::FrameShort {
                expected: HEADER_LEN,
                got: total_length,
            });
        }
        let mut rest = vec![0u8; total_length - HEADER_LEN];
        match self.stream.read_exact(&mut rest) {
            Ok(()) => {}
            Err(e) if is_timeout(&e) => return Ok(RecvOutcome::Timeout),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.closed = true;
                return Ok(RecvOutcome::PeerDisconnect);
            }
            Err(e) => return Err(e.into()),
        }

        let frame = Frame::decode(&header, &rest)?;
        Ok(RecvOutcome::Frame(frame))
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameType;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn happy_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut header = [0u8; HEADER_LEN];
            sock.read_exact(&mut header).unwrap();
            let len = header[2] as usize - HEADER_LEN;
            let mut rest = vec![0u8; len];
            sock.read_exact(&mut rest).unwrap();

            let response = Frame::new(FrameType::Response, header[3], vec![0x01, 0x06]);
            sock.write_all(&response.encode()).unwrap();
        });

        let mut transport = SessionTransport::connect(addr).unwrap();
        let cmd = Frame::new(FrameType::Command, 0, vec![0x01, b'1', b'2', b'3', b'4']);
        transport.send_frame(&cmd).unwrap();

        match transport.recv_frame().unwrap() {
            RecvOutcome::Frame(f) => {
                assert_eq!(f.frame_type, FrameType::Response);
                assert_eq!(f.sequence, 0);
                assert_eq!(f.body, vec![0x01, 0x06]);
            }
            _ => panic!("expected a frame"),
        }
        server.join().unwrap();
    }

    #[test]
    fn disconnect_marker_is_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut header = [0u8; HEADER_LEN];
            sock.read_exact(&mut header).unwrap();
            let len = header[2] as usize - HEADER_LEN;
            let mut rest = vec![0u8; len];
            sock.read_exact(&mut rest).unwrap();
            sock.write_all(&[b'+', b'+', b'+', 0x00]).unwrap();
        });

        let mut transport = SessionTransport::connect(addr).unwrap();
        let cmd = Frame::new(FrameType::Command, 0, vec![0x17]);
        transport.send_frame(&cmd).unwrap();

        assert!(matches!(
            transport.recv_frame().unwrap(),
            RecvOutcome::PeerDisconnect
        ));
        assert!(transport.is_closed());
        server.join().unwrap();
    }

    #[test]
    fn read_timeout_is_surfaced() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            // Hold the connection open without sending anything.
            thread::sleep(Duration::from_secs(3));
            drop(sock);
        });

        let mut transport = SessionTransport::connect(addr).unwrap();
        let cmd = Frame::new(FrameType::Command, 0, vec![0x17]);
        transport.send_frame(&cmd).unwrap();

        assert!(matches!(transport.recv_frame().unwrap(), RecvOutcome::Timeout));
        server.join().unwrap();
    }
}
