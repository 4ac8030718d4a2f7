//! The three independent, wrapping sequence-number spaces the engine must
//! keep straight: outbound command sequence, inbound response sequence
//! (must match the outstanding command), and inbound message sequence
//! (strictly monotonic modulo 256).

use crate::error::TexecomError;

#[derive(Debug, Default)]
pub struct SessionCounters {
    tx_next: u8,
    rx_last_response_expected: Option<u8>,
    rx_last_message: Option<u8>,
}

impl SessionCounters {
    pub fn new() -> Self {
        SessionCounters::default()
    }

    /// Assigns the sequence number for the next outbound command,
    /// post-incrementing `tx_next` with wrap at 256, and records it as the
    /// sequence a response must match.
    pub fn next_tx_seq(&mut self) -> u8 {
        let seq = self.tx_next;
        self.tx_next = self.tx_next.wrapping_add(1);
        self.rx_last_response_expected = Some(seq);
        seq
    }

    pub fn tx_next(&self) -> u8 {
        self.tx_next
    }

    /// Validates a Response frame's sequence against the outstanding
    /// command. Does not consume the outstanding-command slot; the caller
    /// clears it once the response is fully handled.
    pub fn accept_response(&self, seq: u8) -> Result<(), TexecomError> {
        match self.rx_last_response_expected {
            Some(expected) if expected == seq => Ok(()),
            Some(expected) => Err(TexecomError::SequenceMismatch { expected, got: seq }),
            None => Err(TexecomError::SequenceMismatch { expected: 0, got: seq }),
        }
    }

    /// Validates and, if accepted, records a Message frame's sequence:
    /// it must be exactly `(rx_last_message + 1) mod 256`, unless no
    /// message has been accepted yet this session (sentinel).
    pub fn accept_message(&mut self, seq: u8) -> Result<(), TexecomError> {
        match self.rx_last_message {
            None => {
                self.rx_last_message = Some(seq);
                Ok(())
            }
            Some(last) => {
                let expected = last.wrapping_add(1);
                if expected == seq {
                    self.rx_last_message = Some(seq);
                    Ok(())
                } else {
                    Err(TexecomError::SequenceMismatch { expected, got: seq })
                }
            }
        }
    }
}
