//! Datagram layout of the UDP transport.
//!
//! A frame is a CDR little endian encoded `SampleFrame`: one change of one
//! DataWriter together with what a remote bus needs to match it.

use crate::dds::{
    key::KeyHash,
    qos::{
        policy::{Durability, Partition, Reliability},
        DataWriterQosBuilder, DataWriterQosPolicies,
    },
};
use crate::delivery::{
    cache::{CacheChange, ChangeKind},
    EndpointInfo,
};
use crate::structure::{SequenceNumber, SerializedPayload, Timestamp, GUID};
use bytes::Bytes;
use cdr::{CdrLe, Infinite};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FRAME_MAGIC: [u8; 4] = *b"UDDS";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("cdr: {0}")]
    Cdr(#[from] cdr::Error),
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleFrame {
    magic: [u8; 4],
    pub writer_guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub partition: Vec<String>,
    pub reliability: Reliability,
    pub durability: Durability,
    pub kind: ChangeKind,
    pub instance_handle: KeyHash,
    pub sequence_number: SequenceNumber,
    pub source_timestamp: Timestamp,
    has_data: bool,
    payload: Vec<u8>,
}

impl SampleFrame {
    pub fn new(writer: &EndpointInfo, qos: &DataWriterQosPolicies, change: &CacheChange) -> Self {
        let payload = change.data_value().map(|p| p.to_bytes().to_vec());
        Self {
            magic: FRAME_MAGIC,
            writer_guid: writer.guid,
            topic_name: writer.topic_name.clone(),
            type_name: writer.type_name.clone(),
            partition: writer.partition.name.clone(),
            reliability: qos.reliability(),
            durability: qos.durability(),
            kind: change.kind,
            instance_handle: change.instance_handle,
            sequence_number: change.sequence_number,
            source_timestamp: change.source_timestamp,
            has_data: payload.is_some(),
            payload: payload.unwrap_or_default(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        Ok(cdr::serialize::<_, _, CdrLe>(self, Infinite)?)
    }

    pub fn decode(datagram: &[u8]) -> Result<Self, FrameError> {
        let frame: Self = cdr::deserialize(datagram)?;
        if frame.magic != FRAME_MAGIC {
            return Err(FrameError::BadMagic(frame.magic));
        }
        Ok(frame)
    }

    pub fn writer_info(&self) -> EndpointInfo {
        EndpointInfo {
            guid: self.writer_guid,
            topic_name: self.topic_name.clone(),
            type_name: self.type_name.clone(),
            partition: Partition {
                name: self.partition.clone(),
            },
        }
    }

    /// Only the policies carried by the frame differ from the defaults.
    pub fn writer_qos(&self) -> DataWriterQosPolicies {
        DataWriterQosBuilder::new()
            .reliability(self.reliability)
            .durability(self.durability)
            .build()
    }

    pub fn into_change(self) -> CacheChange {
        let data = if self.has_data {
            Some(SerializedPayload::from_bytes(Bytes::from(self.payload)))
        } else {
            None
        };
        CacheChange::new(
            self.kind,
            self.writer_guid,
            self.sequence_number,
            self.source_timestamp,
            data,
            self.instance_handle,
        )
    }
}
