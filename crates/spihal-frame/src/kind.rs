//! Message kinds carried in the first header byte.

use crate::error::FrameError;

/// The eight message tags of the wire protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Init = 0x01,
    Deinit = 0x02,
    Transfer = 0x03,
    Send = 0x04,
    Receive = 0x05,
    SetConfig = 0x06,
    GetStatus = 0x07,
    /// Every reply from the peer uses this tag.
    Response = 0x80,
}

impl MessageKind {
    /// Wire byte for this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Init => "INIT",
            MessageKind::Deinit => "DEINIT",
            MessageKind::Transfer => "TRANSFER",
            MessageKind::Send => "SEND",
            MessageKind::Receive => "RECEIVE",
            MessageKind::SetConfig => "SET_CONFIG",
            MessageKind::GetStatus => "GET_STATUS",
            MessageKind::Response => "RESPONSE",
        }
    }

    /// Returns true for kinds a client sends as requests.
    pub fn is_request(self) -> bool {
        self != MessageKind::Response
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::Init),
            0x02 => Ok(MessageKind::Deinit),
            0x03 => Ok(MessageKind::Transfer),
            0x04 => Ok(MessageKind::Send),
            0x05 => Ok(MessageKind::Receive),
            0x06 => Ok(MessageKind::SetConfig),
            0x07 => Ok(MessageKind::GetStatus),
            0x80 => Ok(MessageKind::Response),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}
