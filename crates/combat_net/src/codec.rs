//! MessagePack codec helpers.
//!
//! All combat payloads (requests, broadcasts, snapshots) travel as
//! MessagePack. Structs are encoded with field names so host and observer
//! builds can add optional fields without breaking each other.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec_named(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

#[cfg(test)]
mod tests {
    use combat_core::{
        AuthorityChannel, Broadcast, CombatIdentity, FieldValue, PlayerEntity, PlayerProfile,
    };

    use super::*;

    #[test]
    fn test_broadcast_survives_the_wire() {
        let mut channel = AuthorityChannel::new();
        let entity = PlayerEntity(1);
        channel
            .spawn(entity, CombatIdentity(3), PlayerProfile::new(9, "carol"), 100.0)
            .unwrap();
        channel.publish(entity, &[FieldValue::Health(42.5)]).unwrap();

        for broadcast in channel.drain_outbox() {
            let bytes = encode(&broadcast).unwrap();
            let restored: Broadcast = decode(&bytes).unwrap();
            assert_eq!(restored, broadcast);
        }
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<Broadcast, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(NetError::Decode(_))));
    }
}
