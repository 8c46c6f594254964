//! EAP-MSCHAPv2 packet codec (draft-kamath-pppext-eap-mschapv2)
//!
//! Every packet lives in the EAP Type-Data field and starts with a common
//! header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    OpCode     |  MS-CHAPv2-ID |           MS-Length           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Value-Size   |  Value ...  (Challenge and Response only)
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All length fields arrive from the peer. Decoders check them against the
//! protocol range *and* the number of bytes actually received before
//! slicing anything.

use thiserror::Error;

/// Authenticator / peer challenge length
pub const CHALLENGE_LEN: usize = 16;
/// NT-Response length
pub const NT_RESPONSE_LEN: usize = 24;
/// OpCode, MS-CHAPv2-ID and MS-Length
pub const HEADER_LEN: usize = 4;
/// Header plus Value-Size
pub const VALUE_HEADER_LEN: usize = HEADER_LEN + 1;
/// Value-Size of a Response: peer challenge, reserved, NT-Response and flags
pub const RESPONSE_VALUE_SIZE: u8 = 49;
/// Smallest legal MS-Length of a Response (empty name)
pub const MIN_RESPONSE_LENGTH: usize = VALUE_HEADER_LEN + RESPONSE_VALUE_SIZE as usize;
/// Largest accepted MS-Length of a Response
pub const MAX_RESPONSE_LENGTH: usize = 315;
/// Bytes of the success message carried in a Success packet ("S=" + 40 hex)
pub const SUCCESS_MESSAGE_LEN: usize = 42;
/// Fixed length of an outbound Success packet
pub const SUCCESS_PACKET_LEN: usize = HEADER_LEN + SUCCESS_MESSAGE_LEN;
/// Encrypted new password (516 bytes) following the Change-Password header
pub const ENCRYPTED_PASSWORD_LEN: usize = 516;
/// Offset of the encrypted-hash / peer-challenge / NT-Response / flags tail
pub const CHANGE_TAIL_OFFSET: usize = HEADER_LEN + ENCRYPTED_PASSWORD_LEN;
/// Encrypted hash (16), peer challenge (16), reserved (8), NT-Response (24), flags (2)
pub const CHANGE_TAIL_LEN: usize = 66;
/// Minimum Type-Data length of a Change-Password packet
pub const CHANGE_PASSWORD_LEN: usize = CHANGE_TAIL_OFFSET + CHANGE_TAIL_LEN;

/// EAP-MSCHAPv2 OpCodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Ack (0) - sent by some peers instead of echoing Success
    Ack = 0,
    /// Challenge (1)
    Challenge = 1,
    /// Response (2)
    Response = 2,
    /// Success (3)
    Success = 3,
    /// Failure (4)
    Failure = 4,
    /// Change-Password (7)
    ChangePassword = 7,
}

impl OpCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OpCode::Ack),
            1 => Some(OpCode::Challenge),
            2 => Some(OpCode::Response),
            3 => Some(OpCode::Success),
            4 => Some(OpCode::Failure),
            7 => Some(OpCode::ChangePassword),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Errors raised while encoding or decoding EAP-MSCHAPv2 packets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Unknown OpCode: {0}")]
    UnknownOpCode(u8),

    #[error("Unexpected OpCode: expected {expected:?}, got {actual}")]
    UnexpectedOpCode { expected: OpCode, actual: u8 },

    #[error("Invalid Value-Size: expected {expected}, got {actual}")]
    InvalidValueSize { expected: u8, actual: u8 },

    #[error("MS-Length {0} outside the legal range")]
    InvalidMsLength(usize),

    #[error("MS-Length {declared} exceeds the {actual} bytes received")]
    Truncated { declared: usize, actual: usize },

    #[error("Backend message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    #[error("Packet too long: {0} bytes")]
    TooLong(usize),
}

fn check_len(data: &[u8], expected: usize) -> Result<(), CodecError> {
    if data.len() < expected {
        return Err(CodecError::TooShort {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn check_opcode(data: &[u8], expected: OpCode) -> Result<(), CodecError> {
    if data[0] != expected.as_u8() {
        return Err(CodecError::UnexpectedOpCode {
            expected,
            actual: data[0],
        });
    }
    Ok(())
}

fn ms_length(data: &[u8]) -> usize {
    u16::from_be_bytes([data[2], data[3]]) as usize
}

fn write_header(buffer: &mut Vec<u8>, opcode: OpCode, mschapv2_id: u8, length: usize) {
    buffer.push(opcode.as_u8());
    buffer.push(mschapv2_id);
    buffer.extend_from_slice(&(length as u16).to_be_bytes());
}

/// Challenge packet (server → peer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePacket {
    pub mschapv2_id: u8,
    pub challenge: [u8; CHALLENGE_LEN],
    /// Server identity, at most 255 bytes (enforced by configuration)
    pub server_name: Vec<u8>,
}

impl ChallengePacket {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let length = VALUE_HEADER_LEN + CHALLENGE_LEN + self.server_name.len();
        if length > u16::MAX as usize {
            return Err(CodecError::TooLong(length));
        }

        let mut buffer = Vec::with_capacity(length);
        write_header(&mut buffer, OpCode::Challenge, self.mschapv2_id, length);
        buffer.push(CHALLENGE_LEN as u8);
        buffer.extend_from_slice(&self.challenge);
        buffer.extend_from_slice(&self.server_name);
        Ok(buffer)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        check_len(data, VALUE_HEADER_LEN + CHALLENGE_LEN)?;
        check_opcode(data, OpCode::Challenge)?;

        if data[4] as usize != CHALLENGE_LEN {
            return Err(CodecError::InvalidValueSize {
                expected: CHALLENGE_LEN as u8,
                actual: data[4],
            });
        }

        let length = ms_length(data);
        if length < VALUE_HEADER_LEN + CHALLENGE_LEN {
            return Err(CodecError::InvalidMsLength(length));
        }
        if length > data.len() {
            return Err(CodecError::Truncated {
                declared: length,
                actual: data.len(),
            });
        }

        let mut challenge = [0u8; CHALLENGE_LEN];
        challenge.copy_from_slice(&data[VALUE_HEADER_LEN..VALUE_HEADER_LEN + CHALLENGE_LEN]);

        Ok(ChallengePacket {
            mschapv2_id: data[1],
            challenge,
            server_name: data[VALUE_HEADER_LEN + CHALLENGE_LEN..length].to_vec(),
        })
    }
}

/// Response packet (peer → server)
///
/// ```text
/// | OpCode=2 | ID | MS-Length | Value-Size=49 |
/// | Peer-Challenge (16) | Reserved (8) | NT-Response (24) | Flags (1) |
/// | Name ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub mschapv2_id: u8,
    pub peer_challenge: [u8; CHALLENGE_LEN],
    pub reserved: [u8; 8],
    pub nt_response: [u8; NT_RESPONSE_LEN],
    pub flags: u8,
    /// Peer's user name, exactly `MS-Length - 54` bytes
    pub name: Vec<u8>,
}

impl ResponsePacket {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        check_len(data, VALUE_HEADER_LEN)?;
        check_opcode(data, OpCode::Response)?;

        if data[4] != RESPONSE_VALUE_SIZE {
            return Err(CodecError::InvalidValueSize {
                expected: RESPONSE_VALUE_SIZE,
                actual: data[4],
            });
        }

        let length = ms_length(data);
        if !(MIN_RESPONSE_LENGTH..=MAX_RESPONSE_LENGTH).contains(&length) {
            return Err(CodecError::InvalidMsLength(length));
        }
        if length > data.len() {
            return Err(CodecError::Truncated {
                declared: length,
                actual: data.len(),
            });
        }

        let value = &data[VALUE_HEADER_LEN..MIN_RESPONSE_LENGTH];
        let mut peer_challenge = [0u8; CHALLENGE_LEN];
        let mut reserved = [0u8; 8];
        let mut nt_response = [0u8; NT_RESPONSE_LEN];
        peer_challenge.copy_from_slice(&value[0..16]);
        reserved.copy_from_slice(&value[16..24]);
        nt_response.copy_from_slice(&value[24..48]);

        Ok(ResponsePacket {
            mschapv2_id: data[1],
            peer_challenge,
            reserved,
            nt_response,
            flags: value[48],
            name: data[MIN_RESPONSE_LENGTH..length].to_vec(),
        })
    }

    /// Encode a Response. Only peers send these; the server side uses it
    /// for tooling and tests.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let length = MIN_RESPONSE_LENGTH + self.name.len();
        if length > MAX_RESPONSE_LENGTH {
            return Err(CodecError::InvalidMsLength(length));
        }

        let mut buffer = Vec::with_capacity(length);
        write_header(&mut buffer, OpCode::Response, self.mschapv2_id, length);
        buffer.push(RESPONSE_VALUE_SIZE);
        buffer.extend_from_slice(&self.peer_challenge);
        buffer.extend_from_slice(&self.reserved);
        buffer.extend_from_slice(&self.nt_response);
        buffer.push(self.flags);
        buffer.extend_from_slice(&self.name);
        Ok(buffer)
    }

    /// User name as text, replacing invalid UTF-8
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Success packet (server → peer), always 46 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessPacket {
    pub mschapv2_id: u8,
    pub message: [u8; SUCCESS_MESSAGE_LEN],
}

impl SuccessPacket {
    /// Build from an MS-CHAP2-Success value: one ident byte followed by
    /// the "S=<40 hex>" authenticator response. Extra trailing bytes are
    /// not carried.
    pub fn from_backend_message(mschapv2_id: u8, value: &[u8]) -> Result<Self, CodecError> {
        if value.len() < 1 + SUCCESS_MESSAGE_LEN {
            return Err(CodecError::MessageTooShort {
                expected: 1 + SUCCESS_MESSAGE_LEN,
                actual: value.len(),
            });
        }

        let mut message = [0u8; SUCCESS_MESSAGE_LEN];
        message.copy_from_slice(&value[1..1 + SUCCESS_MESSAGE_LEN]);
        Ok(SuccessPacket {
            mschapv2_id,
            message,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SUCCESS_PACKET_LEN);
        write_header(&mut buffer, OpCode::Success, self.mschapv2_id, SUCCESS_PACKET_LEN);
        buffer.extend_from_slice(&self.message);
        buffer
    }
}

/// Failure packet (server → peer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePacket {
    pub mschapv2_id: u8,
    /// "E=eeeeeeeeee R=r C=cccc... V=vvvvvvvvvv M=<msg>"
    pub message: Vec<u8>,
}

impl FailurePacket {
    /// Build from an MS-CHAP-Error value: one ident byte followed by the
    /// failure text, which is carried verbatim.
    pub fn from_backend_message(mschapv2_id: u8, value: &[u8]) -> Result<Self, CodecError> {
        if value.is_empty() {
            return Err(CodecError::MessageTooShort {
                expected: 1,
                actual: 0,
            });
        }

        Ok(FailurePacket {
            mschapv2_id,
            message: value[1..].to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let length = HEADER_LEN + self.message.len();
        if length > u16::MAX as usize {
            return Err(CodecError::TooLong(length));
        }

        let mut buffer = Vec::with_capacity(length);
        write_header(&mut buffer, OpCode::Failure, self.mschapv2_id, length);
        buffer.extend_from_slice(&self.message);
        Ok(buffer)
    }
}

/// Change-Password packet (peer → server), sent after a password-expired
/// failure (E=648).
///
/// ```text
/// | OpCode=7 | ID | MS-Length |
/// | Encrypted-Password (516) |
/// | Encrypted-Hash (16) | Peer-Challenge (16) | Reserved (8) |
/// | NT-Response (24) | Flags (2) |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePasswordPacket {
    pub mschapv2_id: u8,
    pub encrypted_password: [u8; ENCRYPTED_PASSWORD_LEN],
    /// Everything after the encrypted password, passed through untouched
    pub tail: [u8; CHANGE_TAIL_LEN],
}

impl ChangePasswordPacket {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        check_len(data, CHANGE_PASSWORD_LEN)?;
        check_opcode(data, OpCode::ChangePassword)?;

        let mut encrypted_password = [0u8; ENCRYPTED_PASSWORD_LEN];
        let mut tail = [0u8; CHANGE_TAIL_LEN];
        encrypted_password.copy_from_slice(&data[HEADER_LEN..CHANGE_TAIL_OFFSET]);
        tail.copy_from_slice(&data[CHANGE_TAIL_OFFSET..CHANGE_PASSWORD_LEN]);

        Ok(ChangePasswordPacket {
            mschapv2_id: data[1],
            encrypted_password,
            tail,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(CHANGE_PASSWORD_LEN);
        write_header(&mut buffer, OpCode::ChangePassword, self.mschapv2_id, CHANGE_PASSWORD_LEN);
        buffer.extend_from_slice(&self.encrypted_password);
        buffer.extend_from_slice(&self.tail);
        buffer
    }
}
