use crate::structure::{entity_id::*, vendor_id::VendorId};
use core::fmt;
use rand::{rngs::SmallRng, Rng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GUID {
    pub guid_prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl GUID {
    pub const UNKNOW: Self = Self {
        guid_prefix: GuidPrefix::UNKNOW,
        entity_id: EntityId::UNKNOW,
    };

    pub fn new(guid_prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self {
            guid_prefix,
            entity_id,
        }
    }

    pub fn new_participant_guid(small_rng: &mut SmallRng) -> Self {
        Self {
            guid_prefix: GuidPrefix::new(small_rng),
            entity_id: EntityId::PARTICIPANT,
        }
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID {{ {} }}", self)
    }
}

impl fmt::Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.guid_prefix, self.entity_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GuidPrefix {
    pub guid_prefix: [u8; 12],
}

impl GuidPrefix {
    pub const UNKNOW: Self = Self {
        guid_prefix: [0x00; 12],
    };

    /// random prefix whose first two bytes are the vendor id
    pub fn new(small_rng: &mut SmallRng) -> Self {
        let mut bytes: [u8; 12] = small_rng.gen();
        bytes[0] = VendorId::THIS_IMPLEMENTATION.vendor_id[0];
        bytes[1] = VendorId::THIS_IMPLEMENTATION.vendor_id[1];
        Self { guid_prefix: bytes }
    }
}

impl fmt::Display for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.guid_prefix {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_guid_prefix() {
        let mut small_rng = SmallRng::seed_from_u64(7);
        let a = GuidPrefix::new(&mut small_rng);
        let b = GuidPrefix::new(&mut small_rng);
        assert_ne!(a, b);
        assert_eq!(a.guid_prefix[0..2], VendorId::THIS_IMPLEMENTATION.vendor_id);

        let guid = GUID::new(a, EntityId::new([0, 3, 0], EntityKind::PUBLISHER));
        assert_eq!(guid.to_string().len(), 24 + 1 + 8);
    }
}
