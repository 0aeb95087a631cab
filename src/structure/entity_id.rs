use crate::structure::TopicKind;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifies an entity inside its participant.
#[derive(PartialEq, Clone, Copy, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId {
    entity_key: [u8; 3],
    entity_kind: EntityKind,
}

impl EntityId {
    pub const UNKNOW: Self = Self {
        entity_key: [0x00; 3],
        entity_kind: EntityKind::UNKNOW_USER_DEFIND,
    };

    pub const PARTICIPANT: Self = Self {
        entity_key: [0x00, 0x00, 0x01],
        entity_kind: EntityKind::PARTICIPANT_BUILT_IN,
    };

    pub fn new(entity_key: [u8; 3], entity_kind: EntityKind) -> Self {
        Self {
            entity_key,
            entity_kind,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId {{ entity_key: {:?}, entity_kind: {:?} }}",
            self.entity_key, self.entity_kind
        )
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}",
            self.entity_key[0], self.entity_key[1], self.entity_key[2], self.entity_kind.value
        )
    }
}

#[derive(PartialEq, Clone, Copy, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityKind {
    value: u8,
}

impl EntityKind {
    // RTPS 2.3, 9.3.1.2
    pub const UNKNOW_USER_DEFIND: Self = Self { value: 0x00 };
    pub const WRITER_WITH_KEY_USER_DEFIND: Self = Self { value: 0x02 };
    pub const WRITER_NO_KEY_USER_DEFIND: Self = Self { value: 0x03 };
    pub const READER_NO_KEY_USER_DEFIND: Self = Self { value: 0x04 };
    pub const READER_WITH_KEY_USER_DEFIND: Self = Self { value: 0x07 };
    pub const PARTICIPANT_BUILT_IN: Self = Self { value: 0xc1 };

    // self difined
    pub const PUBLISHER: Self = Self { value: 0x40 };
    pub const SUBSCRIBER: Self = Self { value: 0x41 };
    pub const TOPIC: Self = Self { value: 0x42 };

    pub fn writer(kind: TopicKind) -> Self {
        match kind {
            TopicKind::WithKey => Self::WRITER_WITH_KEY_USER_DEFIND,
            TopicKind::NoKey => Self::WRITER_NO_KEY_USER_DEFIND,
        }
    }

    pub fn reader(kind: TopicKind) -> Self {
        match kind {
            TopicKind::WithKey => Self::READER_WITH_KEY_USER_DEFIND,
            TopicKind::NoKey => Self::READER_NO_KEY_USER_DEFIND,
        }
    }
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNKNOW_USER_DEFIND => write!(f, "EntityKind: UNKNOW_USER_DEFIND(0x00)"),
            Self::WRITER_WITH_KEY_USER_DEFIND => {
                write!(f, "EntityKind: WRITER_WITH_KEY_USER_DEFIND(0x02)")
            }
            Self::WRITER_NO_KEY_USER_DEFIND => {
                write!(f, "EntityKind: WRITER_NO_KEY_USER_DEFIND(0x03)")
            }
            Self::READER_NO_KEY_USER_DEFIND => {
                write!(f, "EntityKind: READER_NO_KEY_USER_DEFIND(0x04)")
            }
            Self::READER_WITH_KEY_USER_DEFIND => {
                write!(f, "EntityKind: READER_WITH_KEY_USER_DEFIND(0x07)")
            }
            Self::PARTICIPANT_BUILT_IN => write!(f, "EntityKind: PARTICIPANT_BUILT_IN(0xC1)"),
            Self::PUBLISHER => write!(f, "EntityKind: PUBLISHER(0x40)"),
            Self::SUBSCRIBER => write!(f, "EntityKind: SUBSCRIBER(0x41)"),
            Self::TOPIC => write!(f, "EntityKind: TOPIC(0x42)"),
            _ => write!(f, "EntityKind: OTHER(0x{:02X})", self.value),
        }
    }
}
