//! Change-Password requests (RFC 2548 Sections 2.3.3 and 2.3.4)

use super::codec::{ChangePasswordPacket, CHALLENGE_LEN, CHANGE_TAIL_LEN, ENCRYPTED_PASSWORD_LEN};
use crate::attributes::{Attribute, AttributeType, MsAttributeType};
use crate::packet::PacketError;

/// Opcode byte leading MS-CHAP2-CPW
pub const CPW_CODE: u8 = 7;
/// Code byte leading every MS-CHAP-NT-Enc-PW chunk
pub const NT_ENC_PW_CODE: u8 = 6;
/// Encrypted password bytes per MS-CHAP-NT-Enc-PW attribute
pub const NT_ENC_PW_CHUNK_LEN: usize = 243;

/// A password change to hand to the credential backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePasswordRequest {
    pub ident: u8,
    /// Authenticator challenge of the failed attempt
    pub auth_challenge: [u8; CHALLENGE_LEN],
    pub encrypted_password: [u8; ENCRYPTED_PASSWORD_LEN],
    /// Encrypted hash, peer challenge, reserved, NT-Response and flags
    pub tail: [u8; CHANGE_TAIL_LEN],
    /// User-Name of the outer request, when known
    pub username: Option<String>,
}

impl ChangePasswordRequest {
    pub fn new(
        packet: &ChangePasswordPacket,
        auth_challenge: [u8; CHALLENGE_LEN],
        username: Option<String>,
    ) -> Self {
        ChangePasswordRequest {
            ident: packet.mschapv2_id,
            auth_challenge,
            encrypted_password: packet.encrypted_password,
            tail: packet.tail,
            username,
        }
    }

    /// MS-CHAP2-CPW: code, ident, then the 66-byte tail
    pub fn cpw_attribute(&self) -> Result<Attribute, PacketError> {
        let mut value = Vec::with_capacity(2 + CHANGE_TAIL_LEN);
        value.push(CPW_CODE);
        value.push(self.ident);
        value.extend_from_slice(&self.tail);
        Attribute::microsoft(MsAttributeType::Chap2Cpw, value)
    }

    /// The encrypted password split into MS-CHAP-NT-Enc-PW chunks of
    /// 243, 243 and 30 bytes, each prefixed with code, ident and a
    /// big-endian sequence number starting at 1.
    pub fn nt_enc_pw_attributes(&self) -> Result<Vec<Attribute>, PacketError> {
        self.encrypted_password
            .chunks(NT_ENC_PW_CHUNK_LEN)
            .zip(1u16..)
            .map(|(chunk, seq)| {
                let mut value = Vec::with_capacity(4 + chunk.len());
                value.push(NT_ENC_PW_CODE);
                value.push(self.ident);
                value.extend_from_slice(&seq.to_be_bytes());
                value.extend_from_slice(chunk);
                Attribute::microsoft(MsAttributeType::ChapNtEncPw, value)
            })
            .collect()
    }

    /// Everything the backend needs: CPW, the encrypted password chunks,
    /// the challenge and User-Name when known
    pub fn to_attributes(&self) -> Result<Vec<Attribute>, PacketError> {
        let mut attributes = vec![self.cpw_attribute()?];
        attributes.extend(self.nt_enc_pw_attributes()?);
        attributes.push(Attribute::microsoft(
            MsAttributeType::ChapChallenge,
            self.auth_challenge.to_vec(),
        )?);
        if let Some(username) = &self.username {
            attributes.push(Attribute::string(AttributeType::UserName as u8, username.as_str())?);
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChangePasswordRequest {
        let mut encrypted_password = [0u8; ENCRYPTED_PASSWORD_LEN];
        for (i, byte) in encrypted_password.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        ChangePasswordRequest {
            ident: 9,
            auth_challenge: [0xCC; 16],
            encrypted_password,
            tail: [0x5A; CHANGE_TAIL_LEN],
            username: Some("alice".into()),
        }
    }

    #[test]
    fn test_cpw_attribute() {
        let attr = request().cpw_attribute().unwrap();
        assert!(attr.is_microsoft(MsAttributeType::Chap2Cpw));
        assert_eq!(attr.value.len(), 68);
        assert_eq!(attr.value[0], 7);
        assert_eq!(attr.value[1], 9);
        assert_eq!(&attr.value[2..], &[0x5A; CHANGE_TAIL_LEN]);
    }

    #[test]
    fn test_nt_enc_pw_chunks() {
        let req = request();
        let chunks = req.nt_enc_pw_attributes().unwrap();
        assert_eq!(chunks.len(), 3);

        let sizes: Vec<usize> = chunks.iter().map(|c| c.value.len() - 4).collect();
        assert_eq!(sizes, vec![243, 243, 30]);

        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.is_microsoft(MsAttributeType::ChapNtEncPw));
            assert_eq!(chunk.value[0], 6);
            assert_eq!(chunk.value[1], 9);
            assert_eq!(u16::from_be_bytes([chunk.value[2], chunk.value[3]]), i as u16 + 1);
        }

        // Chunks reassemble to the original password blob
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.value[4..].to_vec()).collect();
        assert_eq!(joined, req.encrypted_password.to_vec());
    }

    #[test]
    fn test_to_attributes() {
        let attrs = request().to_attributes().unwrap();
        assert_eq!(attrs.len(), 6);
        assert!(attrs[4].is_microsoft(MsAttributeType::ChapChallenge));
        assert_eq!(attrs[5].as_string().unwrap(), "alice");

        let anonymous = ChangePasswordRequest {
            username: None,
            ..request()
        };
        assert_eq!(anonymous.to_attributes().unwrap().len(), 5);
    }
}
