//! The protocol engine: assigns sequence numbers, sends commands,
//! demultiplexes Response/Message/Command frames, and retransmits on
//! timeout. Owns the socket and the three sequence counters exclusively.

use std::time::Duration;

use log::warn;

use crate::counters::SessionCounters;
use crate::error::TexecomError;
use crate::events::{decode_message, Event};
use crate::frame::{Frame, FrameType};
use crate::transport::{RecvOutcome, SessionTransport};
use crate::zone::ZoneCache;

const MAX_ATTEMPTS: u8 = 3;
const NAK: u8 = 0x15;
const CMD_LOGIN: u8 = 0x01;

/// How long the application loop may go without sending before it must
/// issue a keep-alive probe.
pub const KEEP_ALIVE_IDLE: Duration = Duration::from_secs(30);

pub struct ProtocolEngine {
    transport: SessionTransport,
    counters: SessionCounters,
}

impl ProtocolEngine {
    pub fn new(transport: SessionTransport) -> Self {
        ProtocolEngine {
            transport,
            counters: SessionCounters::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub fn idle_for(&self) -> Duration {
        self.transport.last_send_time.elapsed()
    }

    /// Sends `cmd_id` with `args`, demultiplexing any Message frames that
    /// arrive before the matching Response and handing them to `on_event`.
    /// Retransmits the identical frame up to `MAX_ATTEMPTS` total on
    /// timeout. Returns the response body with the echoed command-id byte
    /// still attached.
    pub fn send_command(
        &mut self,
        cmd_id: u8,
        args: &[u8],
        zones: &ZoneCache,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Vec<u8>, TexecomError> {
        let seq = self.counters.next_tx_seq();
        let mut body = Vec::with_capacity(args.len() + 1);
        body.push(cmd_id);
        body.extend_from_slice(args);
        let frame = Frame::new(FrameType::Command, seq, body);
        self.transport.send_frame(&frame)?;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.await_response(cmd_id, zones, on_event)? {
                Some(response) => return Ok(response),
                None if attempt < MAX_ATTEMPTS => {
                    warn!(
                        "timed out waiting for response to 0x{:02x} (attempt {}/{}), retransmitting",
                        cmd_id, attempt, MAX_ATTEMPTS
                    );
                    self.transport.retransmit_last()?;
                }
                None => return Err(TexecomError::RetriesExhausted),
            }
        }
        unreachable!("loop always returns or errors by the final attempt")
    }

    /// Reads frames until the matching Response arrives (`Some`), a
    /// retry-worthy timeout happens (`None`), or a fatal error occurs.
    fn await_response(
        &mut self,
        cmd_id: u8,
        zones: &ZoneCache,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Option<Vec<u8>>, TexecomError> {
        loop {
            match self.transport.recv_frame()? {
                RecvOutcome::Timeout => return Ok(None),
                RecvOutcome::PeerDisconnect => return Err(TexecomError::PeerDisconnect),
                RecvOutcome::Frame(frame) => match frame.frame_type {
                    FrameType::Message => self.dispatch_message(frame.sequence, frame.body, zones, on_event),
                    FrameType::Command => {
                        warn!("received unexpected Command frame from panel; dropping");
                    }
                    FrameType::Response => {
                        if let Err(e) = self.counters.accept_response(frame.sequence) {
                            warn!("dropping response with unexpected sequence: {}", e);
                            continue;
                        }
                        return self.validate_response(cmd_id, frame.body).map(Some);
                    }
                },
            }
        }
    }

    /// For the application's idle loop: performs a single bounded read and
    /// dispatches it if it's a Message, without an outstanding command.
    /// Returns promptly on timeout so the caller can re-check keep-alive.
    pub fn poll_idle(&mut self, zones: &ZoneCache, on_event: &mut dyn FnMut(Event)) -> Result<(), TexecomError> {
        match self.transport.recv_frame()? {
            RecvOutcome::Timeout => Ok(()),
            RecvOutcome::PeerDisconnect => Err(TexecomError::PeerDisconnect),
            RecvOutcome::Frame(frame) => {
                match frame.frame_type {
                    FrameType::Message => self.dispatch_message(frame.sequence, frame.body, zones, on_event),
                    _ => warn!("dropping unexpected {:?} frame while idle", frame.frame_type),
                }
                Ok(())
            }
        }
    }

    fn dispatch_message(&mut self, seq: u8, body: Vec<u8>, zones: &ZoneCache, on_event: &mut dyn FnMut(Event)) {
        match self.counters.accept_message(seq) {
            Ok(()) => match decode_message(&body, zones) {
                Ok(event) => on_event(event),
                Err(e) => warn!("dropping malformed message: {}", e),
            },
            Err(e) => warn!("dropping out-of-order message: {}", e),
        }
    }

    fn validate_response(&self, cmd_id: u8, body: Vec<u8>) -> Result<Vec<u8>, TexecomError> {
        let echoed = *body.first().ok_or_else(|| TexecomError::MalformedPayload {
            command: "RESPONSE",
            detail: "empty response body".to_string(),
        })?;

        // A NAK echoing LOGIN takes priority over the id check below: it
        // fires both for a direct login rejection (echoed == cmd_id ==
        // CMD_LOGIN) and for session expiry surfacing mid-command (echoed
        // == CMD_LOGIN while some other command was actually sent).
        if echoed == CMD_LOGIN && body.get(1) == Some(&NAK) {
            return Err(TexecomError::LoginRejected);
        }

        if echoed == cmd_id {
            return Ok(body);
        }

        Err(TexecomError::Desync(format!(
            "response echoed wrong command id: sent 0x{:02x}, got 0x{:02x}",
            cmd_id, echoed
        )))
    }
}
