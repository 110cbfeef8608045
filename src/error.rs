use thiserror::Error;

/// Errors raised by the transmuxer.
///
/// The [`Transmuxer`](crate::Transmuxer) entry points only return
/// [`MuxError::Ended`]; data faults describe skipped input and travel inside
/// [`TransmuxEvent::Error`](crate::TransmuxEvent::Error). `Io` is for
/// callers reading segments from files or sockets.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A track cannot be described, e.g. video without SPS/PPS.
    #[error("codec error: {0}")]
    Codec(String),

    /// A bitstream header (ADTS, SPS) failed to parse.
    #[error("parser error: {0}")]
    Parser(String),

    /// Malformed transport stream packet, PES header or PSI section.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("transmuxer already ended")]
    Ended,
}

pub type Result<T> = std::result::Result<T, MuxError>;
