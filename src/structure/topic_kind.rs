use serde::{Deserialize, Serialize};

/// Whether samples of a Topic are distinguished by key fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicKind {
    NoKey,
    WithKey,
}

impl TopicKind {
    pub fn from_with_key(is_with_key: bool) -> Self {
        if is_with_key {
            Self::WithKey
        } else {
            Self::NoKey
        }
    }
}
