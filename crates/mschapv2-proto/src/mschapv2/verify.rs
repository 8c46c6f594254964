//! Bridge between the session and the credential backend.
//!
//! The backend speaks in RADIUS attributes (MS-CHAP-Challenge,
//! MS-CHAP2-Response, MS-CHAP2-Success, MS-CHAP-Error, MS-MPPE-*); this
//! module turns session data into those requests and the backend's reply
//! back into Success/Failure packets plus key material.

use super::codec::{FailurePacket, SuccessPacket, CHALLENGE_LEN, NT_RESPONSE_LEN};
use super::password::ChangePasswordRequest;
use super::ProtocolError;
use crate::attributes::{split_mppe_keys, take_microsoft, Attribute, AttributeType, MsAttributeType};
use crate::packet::PacketError;
use thiserror::Error;
use tracing::debug;

/// Length of an MS-CHAP2-Response value: ident, flags, peer challenge,
/// reserved, NT-Response
pub const CHAP2_RESPONSE_LEN: usize = 50;

/// Credential backend failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Credential backend unavailable: {0}")]
    Unavailable(String),

    #[error("Operation not supported by credential backend: {0}")]
    Unsupported(&'static str),
}

/// What the backend decided, with its reply attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// Credentials valid; reply carries MS-CHAP2-Success and usually MPPE keys
    Accept(Vec<Attribute>),
    /// Credentials invalid; reply usually carries MS-CHAP-Error
    Reject(Vec<Attribute>),
}

/// External credential store performing the MSCHAPv2 computations.
pub trait CredentialBackend: Send + Sync {
    /// Check an NT-Response against the user's credentials
    fn verify_password(&self, request: &VerifyRequest) -> Result<BackendOutcome, BackendError>;

    /// Apply a password change requested after a password-expired failure
    fn change_password(
        &self,
        _request: &ChangePasswordRequest,
    ) -> Result<BackendOutcome, BackendError> {
        Err(BackendError::Unsupported("change-password"))
    }
}

/// A verification request built from a peer Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// MS-CHAPv2-ID of the Response
    pub ident: u8,
    pub flags: u8,
    /// The session's authenticator challenge
    pub auth_challenge: [u8; CHALLENGE_LEN],
    /// Peer challenge, already replaced by the session override if one is set
    pub peer_challenge: [u8; CHALLENGE_LEN],
    pub reserved: [u8; 8],
    pub nt_response: [u8; NT_RESPONSE_LEN],
    /// Name from the Response packet
    pub username: String,
}

impl VerifyRequest {
    /// MS-CHAP2-Response value as carried in RADIUS (RFC 2548 Section 2.3.2)
    pub fn chap2_response(&self) -> [u8; CHAP2_RESPONSE_LEN] {
        let mut value = [0u8; CHAP2_RESPONSE_LEN];
        value[0] = self.ident;
        value[1] = self.flags;
        value[2..18].copy_from_slice(&self.peer_challenge);
        value[18..26].copy_from_slice(&self.reserved);
        value[26..50].copy_from_slice(&self.nt_response);
        value
    }

    /// MS-CHAP-Challenge, MS-CHAP2-Response and User-Name
    pub fn to_attributes(&self, user_name: &str) -> Result<Vec<Attribute>, PacketError> {
        Ok(vec![
            Attribute::microsoft(MsAttributeType::ChapChallenge, self.auth_challenge.to_vec())?,
            Attribute::microsoft(MsAttributeType::Chap2Response, self.chap2_response().to_vec())?,
            Attribute::string(AttributeType::UserName as u8, user_name)?,
        ])
    }
}

/// The session-level meaning of a backend or upstream reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success {
        packet: SuccessPacket,
        keys: Vec<Attribute>,
        reply: Vec<Attribute>,
    },
    Failure {
        /// `None` when no error detail is sent to the peer
        packet: Option<FailurePacket>,
        /// Authenticator challenge to expect on the peer's retry
        new_challenge: Option<[u8; CHALLENGE_LEN]>,
    },
}

/// Interpret an accepting reply: MS-CHAP2-Success becomes the Success
/// packet, MPPE attributes become keys, everything else is kept for the
/// final Access-Accept.
pub fn interpret_accept(mut reply: Vec<Attribute>, mschapv2_id: u8) -> Result<Verdict, ProtocolError> {
    let success = take_microsoft(&mut reply, MsAttributeType::Chap2Success)
        .ok_or(ProtocolError::MissingAttribute("MS-CHAP2-Success"))?;
    let packet = SuccessPacket::from_backend_message(mschapv2_id, &success.value)?;
    let (keys, reply) = split_mppe_keys(reply);

    Ok(Verdict::Success { packet, keys, reply })
}

/// Interpret a rejecting reply.
///
/// Without `send_error` the peer gets a bare EAP Failure. With it, the
/// MS-CHAP-Error text is relayed and its `C=` value, when parseable, becomes
/// the challenge for the peer's next attempt.
pub fn interpret_reject(
    mut reply: Vec<Attribute>,
    mschapv2_id: u8,
    send_error: bool,
) -> Result<Verdict, ProtocolError> {
    if !send_error {
        return Ok(Verdict::Failure {
            packet: None,
            new_challenge: None,
        });
    }

    let error = take_microsoft(&mut reply, MsAttributeType::ChapError)
        .ok_or(ProtocolError::MissingAttribute("MS-CHAP-Error"))?;
    let packet = FailurePacket::from_backend_message(mschapv2_id, &error.value)?;

    debug!(message = %String::from_utf8_lossy(&packet.message), "MS-CHAP-Error");
    let new_challenge = match ErrorMessage::parse(&packet.message) {
        Some(parsed) => {
            debug!(
                error = parsed.error_code,
                retry = parsed.retry,
                challenge = %hex::encode(parsed.challenge),
                "Found new challenge in MS-CHAP-Error"
            );
            Some(parsed.challenge)
        }
        None => {
            debug!("Could not parse new challenge from MS-CHAP-Error");
            None
        }
    };

    Ok(Verdict::Failure {
        packet: Some(packet),
        new_challenge,
    })
}

/// The leading fields of an MS-CHAP-Error message: `E=<code> R=<retry> C=<hex>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error_code: i32,
    pub retry: i32,
    pub challenge: [u8; CHALLENGE_LEN],
}

impl ErrorMessage {
    /// Parse the text following the ident byte. Anything after the
    /// challenge (V=, M=) is ignored.
    pub fn parse(text: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(text).ok()?;
        let mut fields = text.split_whitespace();

        let error_code = fields.next()?.strip_prefix("E=")?.parse().ok()?;
        let retry = fields.next()?.strip_prefix("R=")?.parse().ok()?;
        let challenge_hex = fields.next()?.strip_prefix("C=")?;

        let mut challenge = [0u8; CHALLENGE_LEN];
        hex::decode_to_slice(challenge_hex, &mut challenge).ok()?;

        Some(ErrorMessage {
            error_code,
            retry,
            challenge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE_HEX: &str = "000102030405060708090A0B0C0D0E0F";

    fn success_value() -> Vec<u8> {
        let mut value = vec![0x01];
        value.extend_from_slice(b"S=");
        value.extend_from_slice(&[b'F'; 40]);
        value
    }

    #[test]
    fn test_chap2_response_layout() {
        let request = VerifyRequest {
            ident: 0x11,
            flags: 0x22,
            auth_challenge: [0; 16],
            peer_challenge: [0x33; 16],
            reserved: [0; 8],
            nt_response: [0x44; 24],
            username: "alice".into(),
        };
        let value = request.chap2_response();
        assert_eq!(value[0], 0x11);
        assert_eq!(value[1], 0x22);
        assert_eq!(&value[2..18], &[0x33; 16]);
        assert_eq!(&value[18..26], &[0; 8]);
        assert_eq!(&value[26..50], &[0x44; 24]);

        let attrs = request.to_attributes("CORP\\alice").unwrap();
        assert!(attrs[0].is_microsoft(MsAttributeType::ChapChallenge));
        assert!(attrs[1].is_microsoft(MsAttributeType::Chap2Response));
        assert_eq!(attrs[2].as_string().unwrap(), "CORP\\alice");
    }

    #[test]
    fn test_interpret_accept_separates_keys() {
        let reply = vec![
            Attribute::microsoft(MsAttributeType::MppeRecvKey, vec![1; 34]).unwrap(),
            Attribute::microsoft(MsAttributeType::Chap2Success, success_value()).unwrap(),
            Attribute::string(AttributeType::Class as u8, "gold").unwrap(),
            Attribute::microsoft(MsAttributeType::MppeSendKey, vec![2; 34]).unwrap(),
        ];

        let Verdict::Success { packet, keys, reply } = interpret_accept(reply, 5).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(packet.mschapv2_id, 5);
        assert_eq!(&packet.message[..], &success_value()[1..]);
        assert_eq!(keys.len(), 2);
        assert_eq!(reply, vec![Attribute::string(AttributeType::Class as u8, "gold").unwrap()]);
    }

    #[test]
    fn test_interpret_accept_without_success_attribute() {
        let result = interpret_accept(vec![], 1);
        assert_eq!(result, Err(ProtocolError::MissingAttribute("MS-CHAP2-Success")));
    }

    #[test]
    fn test_interpret_reject_without_send_error() {
        let reply = vec![Attribute::microsoft(MsAttributeType::ChapError, b"\x01E=691 R=0".to_vec()).unwrap()];
        assert_eq!(
            interpret_reject(reply, 1, false).unwrap(),
            Verdict::Failure {
                packet: None,
                new_challenge: None
            }
        );
    }

    #[test]
    fn test_interpret_reject_extracts_new_challenge() {
        let text = format!("E=648 R=1 C={} V=3 M=Password expired", CHALLENGE_HEX);
        let mut value = vec![0x02];
        value.extend_from_slice(text.as_bytes());
        let reply = vec![Attribute::microsoft(MsAttributeType::ChapError, value).unwrap()];

        let Verdict::Failure { packet, new_challenge } = interpret_reject(reply, 2, true).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(packet.unwrap().message, text.as_bytes());
        assert_eq!(new_challenge, Some(core::array::from_fn(|i| i as u8)));
    }

    #[test]
    fn test_interpret_reject_keeps_challenge_on_unparseable_error() {
        let reply = vec![Attribute::microsoft(MsAttributeType::ChapError, b"\x02E=691 R=0".to_vec()).unwrap()];
        let Verdict::Failure { packet, new_challenge } = interpret_reject(reply, 2, true).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(packet.unwrap().message, b"E=691 R=0");
        assert_eq!(new_challenge, None);
    }

    #[test]
    fn test_interpret_reject_missing_error_attribute() {
        assert_eq!(
            interpret_reject(vec![], 1, true),
            Err(ProtocolError::MissingAttribute("MS-CHAP-Error"))
        );
    }

    #[test]
    fn test_parse_error_message() {
        let parsed = ErrorMessage::parse(format!("E=691 R=1 C={}", CHALLENGE_HEX).as_bytes()).unwrap();
        assert_eq!(parsed.error_code, 691);
        assert_eq!(parsed.retry, 1);
        assert_eq!(parsed.challenge[15], 0x0F);

        // Lowercase hex is fine
        let lower = format!("E=691 R=1 C={}", CHALLENGE_HEX.to_lowercase());
        assert!(ErrorMessage::parse(lower.as_bytes()).is_some());
    }

    #[test]
    fn test_parse_error_message_rejects_partial_matches() {
        assert!(ErrorMessage::parse(b"").is_none());
        assert!(ErrorMessage::parse(b"E=691").is_none());
        assert!(ErrorMessage::parse(b"E=691 R=1").is_none());
        assert!(ErrorMessage::parse(b"E=abc R=1 C=000102030405060708090A0B0C0D0E0F").is_none());
        assert!(ErrorMessage::parse(b"E=691 R=1 C=0001020304").is_none());
        assert!(ErrorMessage::parse(b"E=691 R=1 C=ZZ0102030405060708090A0B0C0D0E0F").is_none());
        assert!(ErrorMessage::parse(b"R=1 E=691 C=000102030405060708090A0B0C0D0E0F").is_none());
    }
}
