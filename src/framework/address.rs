//! # Actor Addresses
//!
//! An [`ActorAddress`] identifies one actor on the whole network: the process hosting it and
//! the actor's number inside that process. Actor number `0` is the process itself, which is
//! where responses to pending requests are delivered.
//!
//! The canonical string form is `hex(process_id):hex(actor_number)`, both sides zero-padded to
//! 16 digits. It is used on the wire and anywhere an address faces the outside world.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Actor numbers strictly below this value are reserved for well-known singleton actors.
///
/// Generated actor numbers start here and only ever grow.
pub const WELL_KNOWN_MAX: u64 = 66536;

/// Globally unique identity of an actor (or of a process, when `actor_number == 0`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorAddress {
    process_id: u64,
    actor_number: u64,
}

impl ActorAddress {
    pub const fn new(process_id: u64, actor_number: u64) -> Self {
        Self {
            process_id,
            actor_number,
        }
    }

    /// The address of a process as a whole.
    pub const fn process(process_id: u64) -> Self {
        Self::new(process_id, 0)
    }

    pub const fn process_id(&self) -> u64 {
        self.process_id
    }

    pub const fn actor_number(&self) -> u64 {
        self.actor_number
    }

    /// True when this address designates the process itself rather than one of its actors.
    pub const fn is_process(&self) -> bool {
        self.actor_number == 0
    }

    /// True for addresses in the reserved well-known range (excluding the process address).
    pub const fn is_well_known(&self) -> bool {
        self.actor_number != 0 && self.actor_number < WELL_KNOWN_MAX
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:016x}", self.process_id, self.actor_number)
    }
}

impl fmt::Debug for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorAddress({self})")
    }
}

/// Errors produced when parsing the `process:actor` string form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("missing ':' separator in address {0:?}")]
    MissingSeparator(String),
    #[error("invalid hexadecimal component {0:?}")]
    InvalidHex(String),
}

fn parse_hex(part: &str) -> Result<u64, AddressParseError> {
    // from_str_radix tolerates a leading '+', which is not part of the canonical form.
    if part.is_empty() || part.len() > 16 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AddressParseError::InvalidHex(part.to_string()));
    }
    u64::from_str_radix(part, 16).map_err(|_| AddressParseError::InvalidHex(part.to_string()))
}

impl FromStr for ActorAddress {
    type Err = AddressParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (process, actor) = input
            .split_once(':')
            .ok_or_else(|| AddressParseError::MissingSeparator(input.to_string()))?;
        Ok(Self::new(parse_hex(process)?, parse_hex(actor)?))
    }
}

impl Serialize for ActorAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActorAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_is_zero_padded_hex() {
        let address = ActorAddress::new(0xabc, 66536);
        assert_eq!(address.to_string(), "0000000000000abc:00000000000103e8");
    }

    #[test]
    fn parses_back_to_the_same_address() {
        for (process, actor) in [(0, 0), (1, 2), (u64::MAX, WELL_KNOWN_MAX), (0xdead_beef, u64::MAX)] {
            let address = ActorAddress::new(process, actor);
            assert_eq!(address.to_string().parse::<ActorAddress>(), Ok(address));
        }
    }

    #[test]
    fn accepts_short_hex_components() {
        assert_eq!("a:1".parse::<ActorAddress>(), Ok(ActorAddress::new(10, 1)));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(matches!(
            "abc".parse::<ActorAddress>(),
            Err(AddressParseError::MissingSeparator(_))
        ));
        for bad in [":1", "1:", "+1:2", "1:-2", "xyz:1", "1:2:3", "11111111111111111:1"] {
            assert!(bad.parse::<ActorAddress>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn serializes_as_a_json_string() {
        let address = ActorAddress::new(3, 4);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0000000000000003:0000000000000004\"");
        let back: ActorAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
        assert!(serde_json::from_str::<ActorAddress>("\"nope\"").is_err());
    }

    #[test]
    fn process_addresses() {
        let process = ActorAddress::process(7);
        assert!(process.is_process());
        assert!(!process.is_well_known());
        assert!(ActorAddress::new(7, 1).is_well_known());
        assert!(!ActorAddress::new(7, WELL_KNOWN_MAX).is_well_known());
    }
}
