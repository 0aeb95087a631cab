use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorId {
    pub vendor_id: [u8; 2],
}

impl VendorId {
    // No vendor id is assigned to this implementation.
    pub const THIS_IMPLEMENTATION: Self = Self::VENDORID_UNKNOW;

    pub const VENDORID_UNKNOW: Self = Self {
        vendor_id: [0x00; 2],
    };
}
