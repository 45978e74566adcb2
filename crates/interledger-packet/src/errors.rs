use super::AddressError;
use std::str::Utf8Error;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O Error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("Chrono Error: {0}")]
    ChronoErr(#[from] chrono::ParseError),
    #[error("PacketType Error: {0}")]
    PacketTypeError(#[from] PacketTypeError),
    #[error("Trailing bytes after packet: {0}")]
    TrailingBytes(usize),
    #[error("Invalid Address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("Invalid Packet: {0}")]
    InvalidPacket(String),
    #[error("UTF-8 Error: {0}")]
    Utf8Err(#[from] Utf8Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PacketTypeError {
    #[error("PacketType data not found")]
    Eof,
    #[error("PacketType {0} is not supported")]
    Unknown(u8),
    #[error("PacketType {1} expected, found {0}")]
    Unexpected(u8, u8),
}
