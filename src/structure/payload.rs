use crate::error::{DdsError, DdsResult};
use bytes::Bytes;
use cdr::{CdrBe, CdrLe, Infinite};
use serde::{Deserialize, Serialize};

/// RTPS 2.3, 10.2 Serialized Payload Representation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepresentationIdentifier {
    bytes: [u8; 2],
}

impl RepresentationIdentifier {
    pub const CDR_BE: Self = Self {
        bytes: [0x00, 0x00],
    };
    pub const CDR_LE: Self = Self {
        bytes: [0x00, 0x01],
    };
}

/// Encapsulated sample data: a 4 byte CDR header followed by the body.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SerializedPayload {
    value: Bytes,
}

impl SerializedPayload {
    pub fn new_from_cdr_data<D: Serialize>(
        data: &D,
        representation_identifier: RepresentationIdentifier,
    ) -> DdsResult<Self> {
        let serialized = if representation_identifier == RepresentationIdentifier::CDR_BE {
            cdr::serialize::<_, _, CdrBe>(data, Infinite)
        } else if representation_identifier == RepresentationIdentifier::CDR_LE {
            cdr::serialize::<_, _, CdrLe>(data, Infinite)
        } else {
            return Err(DdsError::Unsupported(format!(
                "representation identifier {:?}",
                representation_identifier
            )));
        };
        let value = serialized.map_err(|e| DdsError::Error(format!("CDR serialize: {e}")))?;
        Ok(Self {
            value: Bytes::from(value),
        })
    }

    pub fn from_bytes(value: Bytes) -> Self {
        Self { value }
    }

    pub fn representation_identifier(&self) -> Option<RepresentationIdentifier> {
        if self.value.len() < 4 {
            return None;
        }
        Some(RepresentationIdentifier {
            bytes: [self.value[0], self.value[1]],
        })
    }

    pub fn deserialize<D: for<'de> Deserialize<'de>>(&self) -> DdsResult<D> {
        cdr::deserialize::<D>(&self.value)
            .map_err(|e| DdsError::Error(format!("CDR deserialize: {e}")))
    }

    pub fn to_bytes(&self) -> Bytes {
        self.value.clone()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i16,
    }

    #[test]
    fn test_cdr_le_payload() {
        let p = Point { x: 1, y: -2 };
        let payload =
            SerializedPayload::new_from_cdr_data(&p, RepresentationIdentifier::CDR_LE).unwrap();
        assert_eq!(
            payload.to_bytes().as_ref(),
            &[0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0xfe, 0xff]
        );
        assert_eq!(
            payload.representation_identifier(),
            Some(RepresentationIdentifier::CDR_LE)
        );
        assert_eq!(payload.deserialize::<Point>().unwrap(), p);
    }

    #[test]
    fn test_truncated_payload() {
        let payload = SerializedPayload::from_bytes(Bytes::from_static(&[0x00, 0x01, 0x00]));
        assert_eq!(payload.representation_identifier(), None);
        assert!(payload.deserialize::<Point>().is_err());
    }
}
