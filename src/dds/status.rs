//! Communication statuses delivered to DataWriters and DataReaders.
//!
//! For more details on each variant, please refer to the DDS specification.
//! DDS v1.4 spec, 2.2.4 Listeners, Conditions, and Wait-sets

use crate::structure::GUID;
use enumflags2::{bitflags, BitFlags};

/// DDS v1.4 spec, 2.2.4.1 Communication Status
#[bitflags]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    OfferedIncompatibleQos = 1 << 5,
    RequestedIncompatibleQos = 1 << 6,
    SampleRejected = 1 << 8,
    DataAvailable = 1 << 10,
    PublicationMatched = 1 << 13,
    SubscriptionMatched = 1 << 14,
}

pub type StatusMask = BitFlags<StatusKind>;

pub enum DataWriterStatusChanged {
    OfferedIncompatibleQos(String),
    PublicationMatched(PublicationMatchedStatus),
}

impl DataWriterStatusChanged {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::OfferedIncompatibleQos(_) => StatusKind::OfferedIncompatibleQos,
            Self::PublicationMatched(_) => StatusKind::PublicationMatched,
        }
    }
}

pub enum DataReaderStatusChanged {
    SampleRejected(String),
    RequestedIncompatibleQos(String),
    DataAvailable,
    SubscriptionMatched(SubscriptionMatchedStatus),
}

impl DataReaderStatusChanged {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::SampleRejected(_) => StatusKind::SampleRejected,
            Self::RequestedIncompatibleQos(_) => StatusKind::RequestedIncompatibleQos,
            Self::DataAvailable => StatusKind::DataAvailable,
            Self::SubscriptionMatched(_) => StatusKind::SubscriptionMatched,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicationMatchedStatus {
    pub total_count: i32,
    pub total_count_change: i32,
    pub current_count: i32,
    pub current_count_change: i32,
    /// This is diffarent form DDS spec.
    /// The GUID is remote reader's one.
    pub guid: GUID,
}

impl PublicationMatchedStatus {
    pub fn new(
        total_count: i32,
        total_count_change: i32,
        current_count: i32,
        current_count_change: i32,
        guid: GUID,
    ) -> Self {
        Self {
            total_count,
            total_count_change,
            current_count,
            current_count_change,
            guid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionMatchedStatus {
    pub total_count: i32,
    pub total_count_change: i32,
    pub current_count: i32,
    pub current_count_change: i32,
    /// This is diffarent form DDS spec.
    /// The GUID is remote writer's one.
    pub guid: GUID,
}

impl SubscriptionMatchedStatus {
    pub fn new(
        total_count: i32,
        total_count_change: i32,
        current_count: i32,
        current_count_change: i32,
        guid: GUID,
    ) -> Self {
        Self {
            total_count,
            total_count_change,
            current_count,
            current_count_change,
            guid,
        }
    }
}
