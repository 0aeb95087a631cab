use crate::dds::InstanceHandle;
use crate::delivery::cache::CacheChange;
use crate::structure::{Timestamp, GUID};

/// DDS v1.4 spec, 2.2.2.5.1.3 Sample States
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SampleStateKind {
    Read,
    NotRead,
}

/// DDS v1.4 spec, 2.2.2.5.1.5 Instance States
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InstanceStateKind {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_state: SampleStateKind,
    pub instance_state: InstanceStateKind,
    /// false for samples that only carry an instance state change
    pub valid_data: bool,
    pub source_timestamp: Timestamp,
    pub instance_handle: InstanceHandle,
    pub publication_handle: GUID,
}

impl SampleInfo {
    pub(crate) fn new(change: &CacheChange, instance_state: InstanceStateKind) -> Self {
        Self {
            sample_state: change.sample_state,
            instance_state,
            valid_data: change.data_value().is_some(),
            source_timestamp: change.source_timestamp,
            instance_handle: change.instance_handle,
            publication_handle: change.writer_guid,
        }
    }
}

/// A sample taken or read from a DataReader.
///
/// `data` is `None` when `info.valid_data` is false.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<D> {
    pub data: Option<D>,
    pub info: SampleInfo,
}
