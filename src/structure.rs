//! identifiers, time and payload types shared by DDS entities

mod duration;
mod entity_id;
mod guid;
mod payload;
mod time;
mod topic_kind;
mod vendor_id;

#[doc(inline)]
pub use {
    duration::Duration,
    entity_id::{EntityId, EntityKind},
    guid::{GuidPrefix, GUID},
    payload::{RepresentationIdentifier, SerializedPayload},
    time::{SequenceNumber, Timestamp},
    topic_kind::TopicKind,
};

pub(crate) use vendor_id::VendorId;

/// Identifier of a DDS domain.
pub type DomainId = u16;
