/// Reasons a received line is rejected before any decoding happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer than three bytes were read, so there is no payload to checksum.
    #[error("Response too short ({len} bytes)")]
    TooShort { len: usize },
    /// The trailing CRC does not match the payload.
    #[error("CRC mismatch - calculated={calculated:04X} received={received:04X}")]
    CrcMismatch { calculated: u16, received: u16 },
}

/// Errors returned by a [`Connection`](crate::connection::Connection).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),
    /// The inverter answered a setter command with `NAK`.
    #[error("Command rejected by inverter")]
    Nak,
    /// The command is not part of the selected protocol revision.
    #[error("Command '{0}' is not supported by this protocol revision")]
    Unsupported(&'static str),
    /// Error of the underlying line transport, passed through unchanged.
    #[error("IO error: {0}")]
    Transport(#[from] std::io::Error),
}

/// A textual setting value that names none of the accepted choices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} '{value}', expected one of: {expected}")]
pub struct ParseSettingError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}
