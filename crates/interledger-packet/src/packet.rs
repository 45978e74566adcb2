use std::convert::TryFrom;
use std::fmt;
use std::str;
use std::time::SystemTime;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::oer::{self, BufOerExt, MutBufOerExt};
use super::{Address, ErrorCode, PacketTypeError, ParseError};

const AMOUNT_LEN: usize = 8;
const EXPIRY_LEN: usize = 17;
const CONDITION_LEN: usize = 32;
const FULFILLMENT_LEN: usize = 32;
const ERROR_CODE_LEN: usize = 3;

static INTERLEDGER_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Prepare = 12,
    Fulfill = 13,
    Reject = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketTypeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            12 => Ok(PacketType::Prepare),
            13 => Ok(PacketType::Fulfill),
            14 => Ok(PacketType::Reject),
            _ => Err(PacketTypeError::Unknown(byte)),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Packet {
    Prepare(Prepare),
    Fulfill(Fulfill),
    Reject(Reject),
}

impl TryFrom<&[u8]> for Packet {
    type Error = ParseError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        let first = *buffer.first().ok_or(PacketTypeError::Eof)?;
        match PacketType::try_from(first)? {
            PacketType::Prepare => Ok(Packet::Prepare(Prepare::try_from(buffer)?)),
            PacketType::Fulfill => Ok(Packet::Fulfill(Fulfill::try_from(buffer)?)),
            PacketType::Reject => Ok(Packet::Reject(Reject::try_from(buffer)?)),
        }
    }
}

impl From<Packet> for BytesMut {
    fn from(packet: Packet) -> Self {
        match packet {
            Packet::Prepare(prepare) => prepare.into(),
            Packet::Fulfill(fulfill) => fulfill.into(),
            Packet::Reject(reject) => reject.into(),
        }
    }
}

impl From<Prepare> for Packet {
    fn from(prepare: Prepare) -> Self {
        Packet::Prepare(prepare)
    }
}

impl From<Fulfill> for Packet {
    fn from(fulfill: Fulfill) -> Self {
        Packet::Fulfill(fulfill)
    }
}

impl From<Reject> for Packet {
    fn from(reject: Reject) -> Self {
        Packet::Reject(reject)
    }
}

/// A request to transfer `amount` to `destination`, locked by the
/// `execution_condition` until `expires_at`.
#[derive(PartialEq, Eq, Clone)]
pub struct Prepare {
    amount: u64,
    expires_at: SystemTime,
    execution_condition: [u8; 32],
    destination: Address,
    data: Bytes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrepareBuilder<'a> {
    pub amount: u64,
    pub expires_at: SystemTime,
    pub execution_condition: &'a [u8; 32],
    pub destination: Address,
    pub data: &'a [u8],
}

impl<'a> PrepareBuilder<'a> {
    pub fn build(&self) -> Prepare {
        Prepare {
            amount: self.amount,
            // The wire format only carries millisecond precision
            expires_at: truncate_to_millis(self.expires_at),
            execution_condition: *self.execution_condition,
            destination: self.destination.clone(),
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

impl Prepare {
    #[inline]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    #[inline]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    #[inline]
    pub fn execution_condition(&self) -> &[u8; 32] {
        &self.execution_condition
    }

    #[inline]
    pub fn destination(&self) -> &Address {
        &self.destination
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn to_bytes(&self) -> BytesMut {
        let destination_size = oer::predict_var_octet_string(self.destination.len());
        let data_size = oer::predict_var_octet_string(self.data.len());
        let content_len =
            AMOUNT_LEN + EXPIRY_LEN + CONDITION_LEN + destination_size + data_size;
        let mut buffer = BytesMut::with_capacity(1 + oer::predict_var_octet_string(content_len));

        buffer.put_u8(PacketType::Prepare as u8);
        buffer.put_var_octet_string_length(content_len);
        buffer.put_u64(self.amount);
        buffer.put_slice(format_timestamp(self.expires_at).as_bytes());
        buffer.put_slice(&self.execution_condition[..]);
        buffer.put_var_octet_string(&self.destination);
        buffer.put_var_octet_string(&self.data);
        buffer
    }
}

impl TryFrom<&[u8]> for Prepare {
    type Error = ParseError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        let mut content = deserialize_envelope(PacketType::Prepare, buffer)?;
        let amount = content.read_u64::<BigEndian>()?;
        let expires_at = parse_timestamp(content.read_bytes(EXPIRY_LEN)?)?;

        let mut execution_condition = [0; CONDITION_LEN];
        execution_condition.copy_from_slice(content.read_bytes(CONDITION_LEN)?);

        let destination = Address::try_from(content.read_var_octet_string()?)?;
        let data = Bytes::copy_from_slice(content.read_var_octet_string()?);
        ensure_consumed(content)?;

        Ok(Prepare {
            amount,
            expires_at,
            execution_condition,
            destination,
            data,
        })
    }
}

impl From<Prepare> for BytesMut {
    fn from(prepare: Prepare) -> Self {
        prepare.to_bytes()
    }
}

impl fmt::Debug for Prepare {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Prepare")
            .field("destination", &self.destination)
            .field("amount", &self.amount)
            .field(
                "expires_at",
                &DateTime::<Utc>::from(self.expires_at).to_rfc3339(),
            )
            .field("execution_condition", &hex::encode(self.execution_condition))
            .field("data_length", &self.data.len())
            .finish()
    }
}

#[derive(PartialEq, Eq, Clone)]
pub struct Fulfill {
    fulfillment: [u8; 32],
    data: Bytes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FulfillBuilder<'a> {
    pub fulfillment: &'a [u8; 32],
    pub data: &'a [u8],
}

impl<'a> FulfillBuilder<'a> {
    pub fn build(&self) -> Fulfill {
        Fulfill {
            fulfillment: *self.fulfillment,
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

impl Fulfill {
    #[inline]
    pub fn fulfillment(&self) -> &[u8; 32] {
        &self.fulfillment
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn to_bytes(&self) -> BytesMut {
        let content_len = FULFILLMENT_LEN + oer::predict_var_octet_string(self.data.len());
        let mut buffer = BytesMut::with_capacity(1 + oer::predict_var_octet_string(content_len));

        buffer.put_u8(PacketType::Fulfill as u8);
        buffer.put_var_octet_string_length(content_len);
        buffer.put_slice(&self.fulfillment[..]);
        buffer.put_var_octet_string(&self.data);
        buffer
    }
}

impl TryFrom<&[u8]> for Fulfill {
    type Error = ParseError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        let mut content = deserialize_envelope(PacketType::Fulfill, buffer)?;
        let mut fulfillment = [0; FULFILLMENT_LEN];
        fulfillment.copy_from_slice(content.read_bytes(FULFILLMENT_LEN)?);
        let data = Bytes::copy_from_slice(content.read_var_octet_string()?);
        ensure_consumed(content)?;
        Ok(Fulfill { fulfillment, data })
    }
}

impl From<Fulfill> for BytesMut {
    fn from(fulfill: Fulfill) -> Self {
        fulfill.to_bytes()
    }
}

impl fmt::Debug for Fulfill {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Fulfill")
            .field("fulfillment", &hex::encode(self.fulfillment))
            .field("data_length", &self.data.len())
            .finish()
    }
}

#[derive(PartialEq, Eq, Clone)]
pub struct Reject {
    code: ErrorCode,
    triggered_by: Option<Address>,
    message: Bytes,
    data: Bytes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RejectBuilder<'a> {
    pub code: ErrorCode,
    pub message: &'a [u8],
    pub triggered_by: Option<&'a Address>,
    pub data: &'a [u8],
}

impl<'a> RejectBuilder<'a> {
    pub fn build(&self) -> Reject {
        Reject {
            code: self.code,
            triggered_by: self.triggered_by.cloned(),
            message: Bytes::copy_from_slice(self.message),
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

impl Reject {
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn triggered_by(&self) -> Option<&Address> {
        self.triggered_by.as_ref()
    }

    #[inline]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn to_bytes(&self) -> BytesMut {
        let triggered_by: &[u8] = match self.triggered_by {
            Some(ref address) => address.as_ref(),
            None => &[],
        };
        let content_len = ERROR_CODE_LEN
            + oer::predict_var_octet_string(triggered_by.len())
            + oer::predict_var_octet_string(self.message.len())
            + oer::predict_var_octet_string(self.data.len());
        let mut buffer = BytesMut::with_capacity(1 + oer::predict_var_octet_string(content_len));

        buffer.put_u8(PacketType::Reject as u8);
        buffer.put_var_octet_string_length(content_len);
        buffer.put_slice(&<[u8; 3]>::from(self.code)[..]);
        buffer.put_var_octet_string(triggered_by);
        buffer.put_var_octet_string(&self.message);
        buffer.put_var_octet_string(&self.data);
        buffer
    }
}

impl TryFrom<&[u8]> for Reject {
    type Error = ParseError;

    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        let mut content = deserialize_envelope(PacketType::Reject, buffer)?;
        let mut code = [0; ERROR_CODE_LEN];
        code.copy_from_slice(content.read_bytes(ERROR_CODE_LEN)?);

        // An empty triggered_by is allowed on the wire
        let triggered_by = content.read_var_octet_string()?;
        let triggered_by = if triggered_by.is_empty() {
            None
        } else {
            Some(Address::try_from(triggered_by)?)
        };
        let message = Bytes::copy_from_slice(content.read_var_octet_string()?);
        let data = Bytes::copy_from_slice(content.read_var_octet_string()?);
        ensure_consumed(content)?;

        Ok(Reject {
            code: ErrorCode::new(code),
            triggered_by,
            message,
            data,
        })
    }
}

impl From<Reject> for BytesMut {
    fn from(reject: Reject) -> Self {
        reject.to_bytes()
    }
}

impl fmt::Debug for Reject {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Reject")
            .field("code", &self.code)
            .field("message", &String::from_utf8_lossy(&self.message))
            .field("triggered_by", &self.triggered_by)
            .field("data_length", &self.data.len())
            .finish()
    }
}

fn deserialize_envelope(packet_type: PacketType, mut reader: &[u8]) -> Result<&[u8], ParseError> {
    let got_type = reader.read_u8().map_err(|_| PacketTypeError::Eof)?;
    if got_type != packet_type as u8 {
        return Err(PacketTypeError::Unexpected(got_type, packet_type as u8).into());
    }
    let content = reader.read_var_octet_string()?;
    ensure_consumed(reader)?;
    Ok(content)
}

fn ensure_consumed(rest: &[u8]) -> Result<(), ParseError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ParseError::TrailingBytes(rest.len()))
    }
}

fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format(INTERLEDGER_TIMESTAMP_FORMAT)
        .to_string()
}

fn parse_timestamp(bytes: &[u8]) -> Result<SystemTime, ParseError> {
    let timestamp = str::from_utf8(bytes)?;
    let naive = NaiveDateTime::parse_from_str(timestamp, INTERLEDGER_TIMESTAMP_FORMAT)?;
    Ok(SystemTime::from(Utc.from_utc_datetime(&naive)))
}

fn truncate_to_millis(time: SystemTime) -> SystemTime {
    let datetime = DateTime::<Utc>::from(time);
    let millis = datetime.timestamp_millis();
    match Utc.timestamp_millis_opt(millis).single() {
        Some(truncated) => SystemTime::from(truncated),
        None => time,
    }
}

/// Payload of an F08 Amount Too Large reject: the amount the connector
/// received followed by the largest amount it accepts, both big-endian `u64`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxPacketAmountDetails {
    amount_received: u64,
    max_amount: u64,
}

impl MaxPacketAmountDetails {
    #[inline]
    pub fn new(amount_received: u64, max_amount: u64) -> Self {
        MaxPacketAmountDetails {
            amount_received,
            max_amount,
        }
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, std::io::Error> {
        let amount_received = bytes.read_u64::<BigEndian>()?;
        let max_amount = bytes.read_u64::<BigEndian>()?;
        Ok(MaxPacketAmountDetails::new(amount_received, max_amount))
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0x00_u8; 16];
        let mut writer = &mut bytes[..];
        writer.put_u64(self.amount_received);
        writer.put_u64(self.max_amount);
        bytes
    }

    #[inline]
    pub fn amount_received(&self) -> u64 {
        self.amount_received
    }

    #[inline]
    pub fn max_amount(&self) -> u64 {
        self.max_amount
    }
}

#[cfg(test)]
mod fixtures {
    use super::*;
    use once_cell::sync::Lazy;
    use std::time::{Duration, UNIX_EPOCH};

    pub static EXECUTION_CONDITION: [u8; 32] = *b"\
        \x11\x7b\x43\x4f\x1a\x54\xe9\x04\x4f\x4f\x54\x92\x3b\x2c\xff\x9e\
        \x4a\x6d\x42\x0a\xe2\x81\xd5\x02\x5d\x7b\xb0\x40\xc4\xb4\xc0\x4a\
    ";
    pub static FULFILLMENT: [u8; 32] = *b"\
        \x11\x7b\x43\x4f\x1a\x54\xe9\x04\x4f\x4f\x54\x92\x3b\x2c\xff\x9e\
        \x4a\x6d\x42\x0a\xe2\x81\xd5\x02\x5d\x7b\xb0\x40\xc4\xb4\xc0\x4a\
    ";

    // 2017-12-23T01:21:40.549Z
    pub static EXPIRES_AT: Lazy<SystemTime> =
        Lazy::new(|| UNIX_EPOCH + Duration::from_millis(1_513_992_100_549));

    pub static PREPARE: Lazy<Prepare> = Lazy::new(|| {
        PrepareBuilder {
            amount: 107,
            expires_at: *EXPIRES_AT,
            execution_condition: &EXECUTION_CONDITION,
            destination: Address::new("example.alice"),
            data: b"hello",
        }
        .build()
    });

    pub static PREPARE_BYTES: Lazy<Vec<u8>> = Lazy::new(|| {
        let mut bytes = vec![12, 77];
        bytes.extend(&[0, 0, 0, 0, 0, 0, 0, 107]);
        bytes.extend(b"20171223012140549");
        bytes.extend(&EXECUTION_CONDITION[..]);
        bytes.push(13);
        bytes.extend(b"example.alice");
        bytes.push(5);
        bytes.extend(b"hello");
        bytes
    });
}
