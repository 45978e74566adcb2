//! ILP address types.
//!
//! Reference: [ILP Addresses - v2.0.0](https://github.com/interledger/rfcs/blob/master/0015-ilp-addresses/0015-ilp-addresses.md).

// Addresses are never empty.
#![allow(clippy::len_without_is_empty)]

use std::convert::TryFrom;
use std::fmt;
use std::str::{self, FromStr};

const MAX_ADDRESS_LENGTH: usize = 1023;

static SCHEMES: &[&str] = &[
    "g", "private", "example", "peer", "self", "test", "test1", "test2", "test3", "local",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is longer than 1023 bytes (got {0})")]
    TooLong(usize),
    #[error("invalid address scheme: {0:?}")]
    InvalidScheme(String),
    #[error("invalid address segment: {0:?}")]
    InvalidSegment(String),
    #[error("address must contain at least two segments")]
    MissingSegments,
    #[error("address is not valid UTF-8")]
    NotUtf8,
}

/// A validated ILP address such as `test.alice.paul`.
#[derive(Clone, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Address(String);

impl Address {
    /// Creates an address from a static string. Mostly useful for constants
    /// and tests; runtime input should go through `FromStr` or `TryFrom`.
    ///
    /// # Panics
    ///
    /// Panics if the string is not a valid ILP address.
    pub fn new(address: &'static str) -> Self {
        match Address::from_str(address) {
            Ok(address) => address,
            Err(err) => panic!("invalid ILP address {:?}: {}", address, err),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ```text
    /// scheme = "g" / "private" / "example" / "peer" / "self" /
    ///          "test" / "test1" / "test2" / "test3" / "local"
    /// ```
    pub fn scheme(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    pub fn segments(&self) -> str::Split<'_, char> {
        self.0.split('.')
    }

    pub fn with_suffix(&self, suffix: &str) -> Result<Address, AddressError> {
        Address::from_str(&format!("{}.{}", self.0, suffix))
    }

    /// True if `prefix` covers this address, component by component.
    pub fn has_prefix(&self, prefix: &AddressPrefix) -> bool {
        component_prefix(&self.0, prefix.as_str())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        validate(address, 2)?;
        Ok(Address(address.to_owned()))
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = AddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let address = str::from_utf8(bytes).map_err(|_| AddressError::NotUtf8)?;
        Address::from_str(address)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(address: String) -> Result<Self, Self::Error> {
        validate(&address, 2)?;
        Ok(Address(address))
    }
}

impl AsRef<str> for Address {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_tuple("Address").field(&self.0).finish()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A routing prefix. Unlike an [`Address`] it may consist of a scheme
/// alone (`g`), which matches every address under that allocation scheme.
#[derive(Clone, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct AddressPrefix(String);

impl AddressPrefix {
    /// # Panics
    ///
    /// Panics if the string is not a valid prefix.
    pub fn new(prefix: &'static str) -> Self {
        match AddressPrefix::from_str(prefix) {
            Ok(prefix) => prefix,
            Err(err) => panic!("invalid ILP address prefix {:?}: {}", prefix, err),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Number of dot-separated components.
    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    pub fn matches(&self, address: &Address) -> bool {
        address.has_prefix(self)
    }

    /// True if every address covered by `other` is also covered by `self`.
    pub fn covers(&self, other: &AddressPrefix) -> bool {
        component_prefix(&other.0, &self.0)
    }
}

impl FromStr for AddressPrefix {
    type Err = AddressError;

    fn from_str(prefix: &str) -> Result<Self, Self::Err> {
        validate(prefix, 1)?;
        Ok(AddressPrefix(prefix.to_owned()))
    }
}

impl TryFrom<&[u8]> for AddressPrefix {
    type Error = AddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let prefix = str::from_utf8(bytes).map_err(|_| AddressError::NotUtf8)?;
        AddressPrefix::from_str(prefix)
    }
}

impl From<Address> for AddressPrefix {
    fn from(address: Address) -> Self {
        AddressPrefix(address.0)
    }
}

impl From<&Address> for AddressPrefix {
    fn from(address: &Address) -> Self {
        AddressPrefix(address.0.clone())
    }
}

impl AsRef<str> for AddressPrefix {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for AddressPrefix {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for AddressPrefix {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_tuple("AddressPrefix").field(&self.0).finish()
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.0)
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let string = String::deserialize(deserializer)?;
            Address::try_from(string).map_err(de::Error::custom)
        }
    }

    impl Serialize for AddressPrefix {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.0)
        }
    }

    impl<'de> Deserialize<'de> for AddressPrefix {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let string = String::deserialize(deserializer)?;
            AddressPrefix::from_str(&string).map_err(de::Error::custom)
        }
    }
}

fn component_prefix(address: &str, prefix: &str) -> bool {
    address.starts_with(prefix)
        && (address.len() == prefix.len() || address.as_bytes()[prefix.len()] == b'.')
}

fn validate(address: &str, min_segments: usize) -> Result<(), AddressError> {
    if address.len() > MAX_ADDRESS_LENGTH {
        return Err(AddressError::TooLong(address.len()));
    }
    let mut segments = 0;
    for (i, segment) in address.split('.').enumerate() {
        segments += 1;
        if i == 0 && !SCHEMES.contains(&segment) {
            return Err(AddressError::InvalidScheme(segment.to_owned()));
        }
        if segment.is_empty() || !segment.bytes().all(is_segment_byte) {
            return Err(AddressError::InvalidSegment(segment.to_owned()));
        }
    }
    if segments < min_segments {
        return Err(AddressError::MissingSegments);
    }
    Ok(())
}

/// <https://github.com/interledger/rfcs/blob/master/0015-ilp-addresses/0015-ilp-addresses.md#address-requirements>
fn is_segment_byte(byte: u8) -> bool {
    byte == b'_' || byte == b'-' || byte == b'~' || byte.is_ascii_alphanumeric()
}
