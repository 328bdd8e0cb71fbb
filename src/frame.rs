use crate::crc;
use crate::error::FrameError;
use std::fmt;

/// First byte of every data response.
pub const START_MARKER: u8 = b'(';
/// Line terminator for commands and responses.
pub const TERMINATOR: u8 = b'\r';

const ACK: &[u8] = b"ACK";

/// Builds the wire bytes of a command: `<text><crc-high><crc-low>\r`.
pub fn build_command(text: &str) -> Vec<u8> {
    let mut tx_buffer = Vec::with_capacity(text.len() + 3);
    tx_buffer.extend_from_slice(text.as_bytes());
    crc::append_crc(&mut tx_buffer);
    tx_buffer.push(TERMINATOR);
    tx_buffer
}

/// Appends the terminator to a command whose checksum is already part of the text.
pub(crate) fn build_precomputed(text_with_crc: &[u8]) -> Vec<u8> {
    let mut tx_buffer = Vec::with_capacity(text_with_crc.len() + 1);
    tx_buffer.extend_from_slice(text_with_crc);
    tx_buffer.push(TERMINATOR);
    tx_buffer
}

/// A response line whose checksum has been verified. The checksum bytes are stripped.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedLine(Vec<u8>);

impl ValidatedLine {
    /// The full line without checksum, including the start marker if present.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The line with one leading start marker removed.
    pub fn payload(&self) -> &[u8] {
        self.0.strip_prefix(&[START_MARKER]).unwrap_or(&self.0)
    }

    pub fn is_ack(&self) -> bool {
        is_ack(&self.0)
    }
}

impl fmt::Debug for ValidatedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatedLine({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Checks the trailing checksum of a line read from the transport (terminator excluded).
pub fn accept_response(raw_line: &[u8]) -> Result<ValidatedLine, FrameError> {
    let Some((body, received)) = crc::split_crc(raw_line) else {
        log::warn!("Response too short - received={:02X?}", raw_line);
        return Err(FrameError::TooShort {
            len: raw_line.len(),
        });
    };
    let calculated = crc::crc16(body);
    if calculated != received {
        log::warn!(
            "Invalid checksum - calculated={:04X} received={:04X} buffer={:02X?}",
            calculated,
            received,
            raw_line
        );
        return Err(FrameError::CrcMismatch {
            calculated,
            received,
        });
    }
    Ok(ValidatedLine(body.to_vec()))
}

/// `true` when the line, with at most one leading start marker removed, starts with `ACK`.
pub fn is_ack(line: &[u8]) -> bool {
    line.strip_prefix(&[START_MARKER])
        .unwrap_or(line)
        .starts_with(ACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        crc::append_crc(&mut frame);
        frame
    }

    #[test]
    fn command_layout() {
        assert_eq!(
            build_command("QPIGS"),
            [b'Q', b'P', b'I', b'G', b'S', 0xB7, 0xA9, b'\r']
        );
    }

    #[test]
    fn command_is_not_nul_terminated() {
        let tx_buffer = build_command("QMOD");
        assert_eq!(tx_buffer.len(), 7);
        assert!(!tx_buffer.contains(&0));
    }

    #[test]
    fn accept_strips_checksum() {
        let line = accept_response(&with_crc(b"(B")).unwrap();
        assert_eq!(line.as_bytes(), b"(B");
        assert_eq!(line.payload(), b"B");
    }

    #[test]
    fn accept_rejects_short_lines() {
        assert_eq!(
            accept_response(b"(\x00"),
            Err(FrameError::TooShort { len: 2 })
        );
        assert_eq!(accept_response(b""), Err(FrameError::TooShort { len: 0 }));
    }

    #[test]
    fn accept_rejects_bad_checksum() {
        let mut frame = with_crc(b"(B");
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(
            accept_response(&frame),
            Err(FrameError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn ack_detection() {
        assert!(is_ack(b"(ACK"));
        assert!(is_ack(b"ACK"));
        assert!(!is_ack(b"(NAK"));
        assert!(!is_ack(b"NAK"));
        assert!(!is_ack(b"((ACK"));
        assert!(!is_ack(b"(AC"));

        let line = accept_response(&with_crc(b"(ACK")).unwrap();
        assert!(line.is_ack());
    }
}
