//! Type support of the `HelloWorldData` IDL module.
//!
//! ```idl
//! module HelloWorldData {
//!   enum Message_Type { SYSTEM_INFO_MESSAGE, SYSTEM_ERROR_MESSAGE, BUS_MESSAGE };
//!   struct System_Info_Type  { string process; long thread; string desc; };
//!   struct System_Error_Type { long errorCode; };
//!   struct Bus_Message_Type  { long busId; long data; long length; };
//!   union Message_Union switch (Message_Type) {
//!     case SYSTEM_INFO_MESSAGE:  System_Info_Type  msg1;
//!     case SYSTEM_ERROR_MESSAGE: System_Error_Type msg2;
//!     case BUS_MESSAGE:          Bus_Message_Type  msg3;
//!   };
//!   struct Msg { long msgID; Message_Union msg; };
//!   #pragma keylist Msg msgID
//! };
//! ```
//!
//! A union is a Rust enum whose variants are declared in discriminator order:
//! CDR encodes it as the 32 bit discriminator followed by the active branch.

use crate::dds::TypeSupport;
use crate::DdsData;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum MessageType {
    SystemInfoMessage = 0,
    SystemErrorMessage = 1,
    BusMessage = 2,
}

impl MessageType {
    /// IDL enumerator name
    pub fn name(&self) -> &'static str {
        match self {
            Self::SystemInfoMessage => "SYSTEM_INFO_MESSAGE",
            Self::SystemErrorMessage => "SYSTEM_ERROR_MESSAGE",
            Self::BusMessage => "BUS_MESSAGE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// System_Info_Type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfoType {
    pub process: String,
    pub thread: i32,
    pub desc: String,
}

/// System_Error_Type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemErrorType {
    pub error_code: i32,
}

/// Bus_Message_Type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessageType {
    pub bus_id: i32,
    pub data: i32,
    pub length: i32,
}

/// Message_Union
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageUnion {
    Msg1(SystemInfoType),
    Msg2(SystemErrorType),
    Msg3(BusMessageType),
}

impl MessageUnion {
    pub fn discriminator(&self) -> MessageType {
        match self {
            Self::Msg1(_) => MessageType::SystemInfoMessage,
            Self::Msg2(_) => MessageType::SystemErrorMessage,
            Self::Msg3(_) => MessageType::BusMessage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DdsData)]
#[dds_data(type_name = "HelloWorldData::Msg")]
pub struct Msg {
    #[key]
    pub msg_id: i32,
    pub msg: MessageUnion,
}

pub type MsgTypeSupport = TypeSupport<Msg>;

impl Msg {
    /// Console lines showing every field, one field per line.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!("    Message ID  : {}", self.msg_id),
            format!("    Message_Type: {}", self.msg.discriminator()),
        ];
        match &self.msg {
            MessageUnion::Msg1(info) => {
                lines.push(format!("    Process     : {}", info.process));
                lines.push(format!("    Thread      : {}", info.thread));
                lines.push(format!("    Description : {}", info.desc));
            }
            MessageUnion::Msg2(error) => {
                lines.push(format!("    Error Code  : {}", error.error_code));
            }
            MessageUnion::Msg3(bus) => {
                lines.push(format!("    Bus ID      : {}", bus.bus_id));
                lines.push(format!("    Data        : {}", bus.data));
                lines.push(format!("    Length      : {}", bus.length));
            }
        }
        lines
    }
}

/// The three messages published by the HelloWorldData publisher, one per union case.
pub fn sample_messages() -> [Msg; 3] {
    [
        Msg {
            msg_id: 1,
            msg: MessageUnion::Msg1(SystemInfoType {
                process: "process.exe".to_string(),
                thread: 6892,
                desc: "Application started.".to_string(),
            }),
        },
        Msg {
            msg_id: 2,
            msg: MessageUnion::Msg2(SystemErrorType { error_code: 1321 }),
        },
        Msg {
            msg_id: 3,
            msg: MessageUnion::Msg3(BusMessageType {
                bus_id: 13,
                data: 10101110,
                length: 8,
            }),
        },
    ]
}
