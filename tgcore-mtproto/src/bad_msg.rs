//! `bad_msg_notification` error codes.
//!
//! See [Service Messages about Messages](https://core.telegram.org/mtproto/service_messages_about_messages).

use std::fmt;

/// The eleven codes a server may put in `bad_msg_notification.error_code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BadMsgCode {
    MsgIdTooLow,
    MsgIdTooHigh,
    MsgIdBadLowBits,
    ContainerMsgIdReused,
    MsgTooOld,
    SeqNoTooLow,
    SeqNoTooHigh,
    SeqNoExpectedEven,
    SeqNoExpectedOdd,
    BadServerSalt,
    InvalidContainer,
}

impl BadMsgCode {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            16 => Self::MsgIdTooLow,
            17 => Self::MsgIdTooHigh,
            18 => Self::MsgIdBadLowBits,
            19 => Self::ContainerMsgIdReused,
            20 => Self::MsgTooOld,
            32 => Self::SeqNoTooLow,
            33 => Self::SeqNoTooHigh,
            34 => Self::SeqNoExpectedEven,
            35 => Self::SeqNoExpectedOdd,
            48 => Self::BadServerSalt,
            64 => Self::InvalidContainer,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            Self::MsgIdTooLow => 16,
            Self::MsgIdTooHigh => 17,
            Self::MsgIdBadLowBits => 18,
            Self::ContainerMsgIdReused => 19,
            Self::MsgTooOld => 20,
            Self::SeqNoTooLow => 32,
            Self::SeqNoTooHigh => 33,
            Self::SeqNoExpectedEven => 34,
            Self::SeqNoExpectedOdd => 35,
            Self::BadServerSalt => 48,
            Self::InvalidContainer => 64,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MsgIdTooLow => {
                "The msg_id is too low, the client time has to be synchronized."
            }
            Self::MsgIdTooHigh => {
                "The msg_id is too high, the client time has to be synchronized."
            }
            Self::MsgIdBadLowBits => {
                "Incorrect two lower order of the msg_id bits, the server expects the client message msg_id to be divisible by 4."
            }
            Self::ContainerMsgIdReused => {
                "The container msg_id is the same as the msg_id of a previously received message."
            }
            Self::MsgTooOld => "The message is too old, it cannot be verified by the server.",
            Self::SeqNoTooLow => "The msg_seqno is too low.",
            Self::SeqNoTooHigh => "The msg_seqno is too high.",
            Self::SeqNoExpectedEven => "An even msg_seqno was expected, but an odd one was received.",
            Self::SeqNoExpectedOdd => "An odd msg_seqno was expected, but an even one was received.",
            Self::BadServerSalt => "Bad server salt.",
            Self::InvalidContainer => "Invalid container.",
        }
    }

    /// Codes after which the request may be sent again with a fresh msg_id.
    pub fn is_resendable(self) -> bool {
        matches!(
            self,
            Self::MsgIdTooLow
                | Self::MsgIdTooHigh
                | Self::SeqNoTooLow
                | Self::SeqNoTooHigh
                | Self::BadServerSalt
        )
    }

    /// Codes that mean the local clock is off.
    pub fn needs_clock_sync(self) -> bool {
        matches!(self, Self::MsgIdTooLow | Self::MsgIdTooHigh)
    }
}

impl fmt::Display for BadMsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.description())
    }
}

/// Human-readable text for any code, including ones outside the table.
pub fn describe(code: i32) -> String {
    match BadMsgCode::from_code(code) {
        Some(c) => c.to_string(),
        None => format!("[{code}] Unknown error code"),
    }
}
