//! CCP wire messages, carried as the `data` of zero-amount Prepares sent to
//! the `peer.route.*` addresses.

use crate::RoutingTableId;

use std::cmp;
use std::convert::TryFrom;
use std::time::SystemTime;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes};
use interledger_packet::{
    oer::{BufOerExt, MutBufOerExt},
    Address, AddressPrefix, Fulfill, FulfillBuilder, ParseError, Prepare, PrepareBuilder,
};
use once_cell::sync::Lazy;
use std::io::Read;
use tracing::error;

pub static CCP_CONTROL_DESTINATION: Lazy<Address> = Lazy::new(|| Address::new("peer.route.control"));
pub static CCP_UPDATE_DESTINATION: Lazy<Address> = Lazy::new(|| Address::new("peer.route.update"));
pub const PEER_PROTOCOL_FULFILLMENT: [u8; 32] = [0; 32];
pub const PEER_PROTOCOL_CONDITION: [u8; 32] = [
    102, 104, 122, 173, 248, 98, 189, 119, 108, 143, 193, 139, 142, 159, 142, 32, 8, 151, 20, 133,
    110, 226, 51, 179, 144, 42, 89, 29, 13, 95, 41, 37,
];
const FLAG_OPTIONAL: u8 = 0x80;
const FLAG_TRANSITIVE: u8 = 0x40;
const FLAG_PARTIAL: u8 = 0x20;
const FLAG_UTF8: u8 = 0x10;

/// The Fulfill sent back for every accepted CCP message.
pub static CCP_RESPONSE: Lazy<Fulfill> = Lazy::new(|| {
    FulfillBuilder {
        fulfillment: &PEER_PROTOCOL_FULFILLMENT,
        data: &[],
    }
    .build()
});

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Mode {
    Idle = 0,
    Sync = 1,
}

impl TryFrom<u8> for Mode {
    type Error = ParseError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(Mode::Idle),
            1 => Ok(Mode::Sync),
            _ => Err(ParseError::InvalidPacket(format!(
                "Unexpected mode: {}",
                val
            ))),
        }
    }
}

fn check_peer_protocol_prepare(prepare: &Prepare, destination: &Address) -> Result<(), ParseError> {
    if prepare.destination() != destination {
        return Err(ParseError::InvalidPacket(format!(
            "Packet is not a CCP message. Destination: {}",
            prepare.destination()
        )));
    }

    if prepare.execution_condition() != &PEER_PROTOCOL_CONDITION {
        error!("Unexpected condition: {:x?}", prepare.execution_condition());
        return Err(ParseError::InvalidPacket(format!(
            "Wrong condition: {}",
            hex::encode(prepare.execution_condition()),
        )));
    }
    Ok(())
}

fn check_expiry(prepare: &Prepare) -> Result<(), ParseError> {
    if prepare.expires_at() < SystemTime::now() {
        return Err(ParseError::InvalidPacket("Packet expired".to_string()));
    }
    Ok(())
}

fn peer_protocol_prepare(destination: &Address, expires_at: SystemTime, data: &[u8]) -> Prepare {
    PrepareBuilder {
        destination: destination.clone(),
        amount: 0,
        expires_at,
        execution_condition: &PEER_PROTOCOL_CONDITION,
        data,
    }
    .build()
}

/// Caps a peer-supplied element count by the bytes left to decode; every
/// element takes at least one.
fn bounded_capacity(count: u64, remaining: &[u8]) -> usize {
    cmp::min(count, remaining.len() as u64) as usize
}

fn read_routing_table_id(data: &mut &[u8]) -> Result<RoutingTableId, ParseError> {
    let mut id = [0; 16];
    data.read_exact(&mut id)?;
    Ok(RoutingTableId::from_bytes(id))
}

/// Sent by a peer to ask us to start (`Sync`) or stop (`Idle`) sending it
/// route updates, starting after the epoch it last saw.
#[derive(Clone, PartialEq, Debug)]
pub struct RouteControlRequest {
    pub mode: Mode,
    pub last_known_routing_table_id: RoutingTableId,
    pub last_known_epoch: u32,
    pub features: Vec<String>,
}

impl TryFrom<&Prepare> for RouteControlRequest {
    type Error = ParseError;

    fn try_from(prepare: &Prepare) -> Result<Self, Self::Error> {
        check_expiry(prepare)?;
        RouteControlRequest::try_from_without_expiry(prepare)
    }
}

impl RouteControlRequest {
    pub(crate) fn try_from_without_expiry(prepare: &Prepare) -> Result<Self, ParseError> {
        check_peer_protocol_prepare(prepare, &CCP_CONTROL_DESTINATION)?;

        let mut data = prepare.data();
        let mode = Mode::try_from(data.read_u8()?)?;
        let last_known_routing_table_id = read_routing_table_id(&mut data)?;
        let last_known_epoch = data.read_u32::<BigEndian>()?;
        let num_features = data.read_var_uint()?;
        let mut features: Vec<String> = Vec::with_capacity(bounded_capacity(num_features, data));
        for _ in 0..num_features {
            features.push(std::str::from_utf8(data.read_var_octet_string()?)?.to_owned());
        }

        Ok(RouteControlRequest {
            mode,
            last_known_routing_table_id,
            last_known_epoch,
            features,
        })
    }

    pub fn to_prepare(&self, expires_at: SystemTime) -> Prepare {
        let mut data = Vec::new();
        data.put_u8(self.mode as u8);
        data.put_slice(self.last_known_routing_table_id.as_bytes());
        data.put_u32(self.last_known_epoch);
        data.put_var_uint(self.features.len() as u64);
        for feature in self.features.iter() {
            data.put_var_octet_string(feature.as_bytes());
        }
        peer_protocol_prepare(&CCP_CONTROL_DESTINATION, expires_at, &data)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct RouteProp {
    pub is_optional: bool,
    pub is_transitive: bool,
    pub is_partial: bool,
    pub id: u16,
    pub is_utf8: bool,
    pub value: Bytes,
}

impl RouteProp {
    /// Advances `data` past the prop.
    pub fn read_from(data: &mut &[u8]) -> Result<Self, ParseError> {
        let meta = data.read_u8()?;
        let id = data.read_u16::<BigEndian>()?;
        let value = Bytes::copy_from_slice(data.read_var_octet_string()?);

        Ok(RouteProp {
            is_optional: meta & FLAG_OPTIONAL != 0,
            is_transitive: meta & FLAG_TRANSITIVE != 0,
            is_partial: meta & FLAG_PARTIAL != 0,
            id,
            is_utf8: meta & FLAG_UTF8 != 0,
            value,
        })
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        let mut meta: u8 = 0;
        if self.is_optional {
            meta |= FLAG_OPTIONAL;
        }
        if self.is_partial {
            meta |= FLAG_PARTIAL;
        }
        if self.is_transitive {
            meta |= FLAG_TRANSITIVE;
        }
        if self.is_utf8 {
            meta |= FLAG_UTF8;
        }

        buf.put_u8(meta);
        buf.put_u16(self.id);
        buf.put_var_octet_string(&self.value[..]);
    }
}

/// A route as announced on the wire.
#[derive(Clone, PartialEq, Debug)]
pub struct NewRoute {
    pub prefix: AddressPrefix,
    pub path: Vec<Address>,
    pub auth: [u8; 32],
    pub props: Vec<RouteProp>,
}

impl NewRoute {
    /// Advances `data` past the route.
    pub fn read_from(data: &mut &[u8]) -> Result<Self, ParseError> {
        let prefix = AddressPrefix::try_from(data.read_var_octet_string()?)?;
        let path_len = data.read_var_uint()?;
        let mut path = Vec::with_capacity(bounded_capacity(path_len, data));
        for _ in 0..path_len {
            path.push(Address::try_from(data.read_var_octet_string()?)?);
        }
        let mut auth = [0; 32];
        data.read_exact(&mut auth)?;

        let prop_len = data.read_var_uint()?;
        let mut props = Vec::with_capacity(bounded_capacity(prop_len, data));
        for _ in 0..prop_len {
            props.push(RouteProp::read_from(data)?);
        }

        Ok(NewRoute {
            prefix,
            path,
            auth,
            props,
        })
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_var_octet_string(self.prefix.as_str());
        buf.put_var_uint(self.path.len() as u64);
        for address in self.path.iter() {
            buf.put_var_octet_string(address.as_str());
        }
        buf.put_slice(&self.auth[..]);
        buf.put_var_uint(self.props.len() as u64);
        for prop in self.props.iter() {
            prop.write_to(buf);
        }
    }
}

/// An incremental update covering epochs `[from_epoch_index, to_epoch_index)`
/// of the speaker's routing table.
#[derive(Clone, PartialEq, Debug)]
pub struct RouteUpdateRequest {
    pub routing_table_id: RoutingTableId,
    pub current_epoch_index: u32,
    pub from_epoch_index: u32,
    pub to_epoch_index: u32,
    pub hold_down_time: u32,
    pub speaker: Address,
    pub new_routes: Vec<NewRoute>,
    pub withdrawn_routes: Vec<AddressPrefix>,
}

impl TryFrom<&Prepare> for RouteUpdateRequest {
    type Error = ParseError;

    fn try_from(prepare: &Prepare) -> Result<Self, Self::Error> {
        check_expiry(prepare)?;
        RouteUpdateRequest::try_from_without_expiry(prepare)
    }
}

impl RouteUpdateRequest {
    pub(crate) fn try_from_without_expiry(prepare: &Prepare) -> Result<Self, ParseError> {
        check_peer_protocol_prepare(prepare, &CCP_UPDATE_DESTINATION)?;

        let mut data = prepare.data();
        let routing_table_id = read_routing_table_id(&mut data)?;
        let current_epoch_index = data.read_u32::<BigEndian>()?;
        let from_epoch_index = data.read_u32::<BigEndian>()?;
        let to_epoch_index = data.read_u32::<BigEndian>()?;
        let hold_down_time = data.read_u32::<BigEndian>()?;
        let speaker = Address::try_from(data.read_var_octet_string()?)?;
        let new_routes_len = data.read_var_uint()?;
        let mut new_routes = Vec::with_capacity(bounded_capacity(new_routes_len, data));
        for _ in 0..new_routes_len {
            new_routes.push(NewRoute::read_from(&mut data)?);
        }
        let withdrawn_routes_len = data.read_var_uint()?;
        let mut withdrawn_routes =
            Vec::with_capacity(bounded_capacity(withdrawn_routes_len, data));
        for _ in 0..withdrawn_routes_len {
            withdrawn_routes.push(AddressPrefix::try_from(data.read_var_octet_string()?)?);
        }

        Ok(RouteUpdateRequest {
            routing_table_id,
            current_epoch_index,
            from_epoch_index,
            to_epoch_index,
            hold_down_time,
            speaker,
            new_routes,
            withdrawn_routes,
        })
    }

    pub fn is_heartbeat(&self) -> bool {
        self.new_routes.is_empty() && self.withdrawn_routes.is_empty()
    }

    pub fn to_prepare(&self, expires_at: SystemTime) -> Prepare {
        let mut data = Vec::new();
        data.put_slice(self.routing_table_id.as_bytes());
        data.put_u32(self.current_epoch_index);
        data.put_u32(self.from_epoch_index);
        data.put_u32(self.to_epoch_index);
        data.put_u32(self.hold_down_time);
        data.put_var_octet_string(self.speaker.as_str());
        data.put_var_uint(self.new_routes.len() as u64);
        for route in self.new_routes.iter() {
            route.write_to(&mut data);
        }
        data.put_var_uint(self.withdrawn_routes.len() as u64);
        for prefix in self.withdrawn_routes.iter() {
            data.put_var_octet_string(prefix.as_str());
        }
        peer_protocol_prepare(&CCP_UPDATE_DESTINATION, expires_at, &data)
    }
}

#[cfg(test)]
mod route_control_request {
    use super::*;
    use crate::fixtures::*;
    use std::time::Duration;

    #[test]
    fn deserialize() {
        let prepare = Prepare::try_from(&CONTROL_REQUEST_SERIALIZED[..]).unwrap();
        let request = RouteControlRequest::try_from_without_expiry(&prepare).unwrap();
        assert_eq!(request, *CONTROL_REQUEST);
    }

    #[test]
    fn serialize() {
        let prepare = CONTROL_REQUEST.to_prepare(SystemTime::now() + Duration::from_secs(60));
        let test_prepare = Prepare::try_from(&CONTROL_REQUEST_SERIALIZED[..]).unwrap();
        // Expiry differs, the payload must not
        assert_eq!(prepare.data(), test_prepare.data());
        assert_eq!(prepare.destination(), &*CCP_CONTROL_DESTINATION);
        assert_eq!(prepare.amount(), 0);
    }

    #[test]
    fn errors_with_wrong_destination() {
        let bytes = hex::decode("0c6c0000000000000000323031353036313630303031303030303066687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f292512706565722e726f7574652e636f6e74726f6b1f0170d1a134a0df4f47964f6e19e2ab379000000020010203666f6f03626172").unwrap();
        let prepare = Prepare::try_from(&bytes[..]).unwrap();
        let result = RouteControlRequest::try_from_without_expiry(&prepare);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid Packet: Packet is not a CCP message. Destination: peer.route.controk"
        );
    }

    #[test]
    fn errors_with_wrong_condition() {
        let bytes = hex::decode("0c6c0000000000000000323031353036313630303031303030303066687aadf862bd776c8fc18b8e9f8e21089714856ee233b3902a591d0d5f292512706565722e726f7574652e636f6e74726f6c1f0170d1a134a0df4f47964f6e19e2ab379000000020010203666f6f03626172").unwrap();
        let prepare = Prepare::try_from(&bytes[..]).unwrap();
        let result = RouteControlRequest::try_from_without_expiry(&prepare);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid Packet: Wrong condition: 66687aadf862bd776c8fc18b8e9f8e21089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn errors_with_expired_packet() {
        let prepare = Prepare::try_from(&CONTROL_REQUEST_SERIALIZED[..]).unwrap();
        let result = RouteControlRequest::try_from(&prepare);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid Packet: Packet expired"
        );
    }

    #[test]
    fn errors_with_oversized_feature_count() {
        let mut data = Vec::new();
        data.put_u8(Mode::Sync as u8);
        data.put_slice(&[0; 16]);
        data.put_u32(0);
        data.put_var_uint(0x0fff_ffff_ffff_ffff);
        let prepare = peer_protocol_prepare(
            &CCP_CONTROL_DESTINATION,
            SystemTime::now() + Duration::from_secs(60),
            &data,
        );
        assert!(RouteControlRequest::try_from(&prepare).is_err());
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!(Mode::try_from(2).is_err());
        assert_eq!(Mode::try_from(1).unwrap(), Mode::Sync);
    }
}
