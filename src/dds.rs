//!  Data Distribution Service (DDS) APIs

mod datareader;
mod datawriter;
pub mod key;
mod participant;
mod participant_factory;
mod publisher;
pub mod qos;
mod sample_info;
pub mod status;
mod subscriber;
mod topic;
mod type_support;

pub use key::{DdsData, KeyHash};

pub use {
    datareader::DataReader,
    datawriter::DataWriter,
    participant::DomainParticipant,
    participant_factory::DomainParticipantFactory,
    publisher::Publisher,
    sample_info::{InstanceStateKind, Sample, SampleInfo, SampleStateKind},
    status::{DataReaderStatusChanged, DataWriterStatusChanged, StatusKind, StatusMask},
    subscriber::Subscriber,
    topic::Topic,
    type_support::TypeSupport,
};

use crate::structure::DomainId;

/// Selects the default domain of the configuration.
pub const DOMAIN_ID_DEFAULT: DomainId = DomainId::MAX;

/// DDS InstanceHandle_t, the key hash of an instance.
pub type InstanceHandle = KeyHash;

/// HANDLE_NIL
pub const HANDLE_NIL: InstanceHandle = KeyHash::NIL;
