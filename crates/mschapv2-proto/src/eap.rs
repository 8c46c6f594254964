//! EAP (Extensible Authentication Protocol) Support
//!
//! This module implements EAP protocol structures as defined in RFC 3748
//! and EAP over RADIUS as defined in RFC 3579.
//!
//! # EAP Packet Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Code      |  Identifier   |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |  Type-Data ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::attributes::{Attribute, AttributeType};
use crate::packet::Packet;
use thiserror::Error;

/// EAP packet code (first byte of EAP packet)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapCode {
    /// Request packet (Code 1)
    Request = 1,
    /// Response packet (Code 2)
    Response = 2,
    /// Success packet (Code 3)
    Success = 3,
    /// Failure packet (Code 4)
    Failure = 4,
}

impl EapCode {
    /// Convert from u8 to EapCode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EapCode::Request),
            2 => Some(EapCode::Response),
            3 => Some(EapCode::Success),
            4 => Some(EapCode::Failure),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// EAP method types (RFC 3748 and IANA registry)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapType {
    /// Identity (Type 1) - RFC 3748
    Identity = 1,
    /// Notification (Type 2) - RFC 3748
    Notification = 2,
    /// Nak (Type 3) - RFC 3748
    Nak = 3,
    /// EAP-TTLS (Type 21) - RFC 5281
    Ttls = 21,
    /// PEAP (Type 25) - draft-josefsson-pppext-eap-tls-eap
    Peap = 25,
    /// EAP-MSCHAPv2 (Type 26) - draft-kamath-pppext-eap-mschapv2
    MsChapV2 = 26,
}

impl EapType {
    /// Convert from u8 to EapType
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EapType::Identity),
            2 => Some(EapType::Notification),
            3 => Some(EapType::Nak),
            21 => Some(EapType::Ttls),
            25 => Some(EapType::Peap),
            26 => Some(EapType::MsChapV2),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// EAP packet structure
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapPacket {
    /// EAP code (Request, Response, Success, Failure)
    pub code: EapCode,
    /// Identifier for matching requests and responses (0-255)
    pub identifier: u8,
    /// EAP type (only present for Request/Response)
    pub eap_type: Option<EapType>,
    /// Type-specific data
    pub data: Vec<u8>,
}

impl EapPacket {
    /// EAP header length (code, identifier, length)
    pub const HEADER_LENGTH: usize = 4;

    /// Create a new EAP packet
    pub fn new(code: EapCode, identifier: u8, eap_type: Option<EapType>, data: Vec<u8>) -> Self {
        EapPacket {
            code,
            identifier,
            eap_type,
            data,
        }
    }

    /// Create an EAP-MSCHAPv2 Request carrying the given type-data
    pub fn mschapv2_request(identifier: u8, data: Vec<u8>) -> Self {
        Self::new(EapCode::Request, identifier, Some(EapType::MsChapV2), data)
    }

    /// Create an EAP-MSCHAPv2 Response carrying the given type-data
    pub fn mschapv2_response(identifier: u8, data: Vec<u8>) -> Self {
        Self::new(EapCode::Response, identifier, Some(EapType::MsChapV2), data)
    }

    /// Create an EAP Identity Response
    pub fn identity_response(identifier: u8, identity: &str) -> Self {
        EapPacket {
            code: EapCode::Response,
            identifier,
            eap_type: Some(EapType::Identity),
            data: identity.as_bytes().to_vec(),
        }
    }

    /// Create an EAP Success packet
    pub fn success(identifier: u8) -> Self {
        EapPacket {
            code: EapCode::Success,
            identifier,
            eap_type: None,
            data: Vec::new(),
        }
    }

    /// Create an EAP Failure packet
    pub fn failure(identifier: u8) -> Self {
        EapPacket {
            code: EapCode::Failure,
            identifier,
            eap_type: None,
            data: Vec::new(),
        }
    }

    /// Parse EAP packet from bytes
    ///
    /// # Packet Format
    /// - Code (1 byte)
    /// - Identifier (1 byte)
    /// - Length (2 bytes, network byte order)
    /// - Type (1 byte, only for Request/Response)
    /// - Type-Data (variable length)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EapError> {
        if bytes.len() < Self::HEADER_LENGTH {
            return Err(EapError::PacketTooShort {
                expected: Self::HEADER_LENGTH,
                actual: bytes.len(),
            });
        }

        let code = EapCode::from_u8(bytes[0]).ok_or(EapError::InvalidCode(bytes[0]))?;
        let identifier = bytes[1];
        let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;

        if length < Self::HEADER_LENGTH {
            return Err(EapError::InvalidLength(length));
        }
        if bytes.len() < length {
            return Err(EapError::PacketTooShort {
                expected: length,
                actual: bytes.len(),
            });
        }

        let (eap_type, data) = match code {
            EapCode::Request | EapCode::Response => {
                if length < Self::HEADER_LENGTH + 1 {
                    return Err(EapError::InvalidLength(length));
                }
                let type_byte = bytes[4];
                let eap_type = EapType::from_u8(type_byte).ok_or(EapError::UnknownType(type_byte))?;
                (Some(eap_type), bytes[5..length].to_vec())
            }
            // Success and Failure packets have no Type field
            EapCode::Success | EapCode::Failure => (None, Vec::new()),
        };

        Ok(EapPacket {
            code,
            identifier,
            eap_type,
            data,
        })
    }

    /// Encode EAP packet to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = self.length();
        let mut bytes = Vec::with_capacity(length);

        bytes.push(self.code.as_u8());
        bytes.push(self.identifier);
        bytes.extend_from_slice(&(length as u16).to_be_bytes());

        if let (EapCode::Request | EapCode::Response, Some(eap_type)) = (self.code, self.eap_type) {
            bytes.push(eap_type.as_u8());
            bytes.extend_from_slice(&self.data);
        }

        bytes
    }

    /// Get the total length of the packet
    pub fn length(&self) -> usize {
        match (self.code, self.eap_type) {
            (EapCode::Request | EapCode::Response, Some(_)) => {
                Self::HEADER_LENGTH + 1 + self.data.len()
            }
            _ => Self::HEADER_LENGTH,
        }
    }
}

/// EAP-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EapError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Invalid EAP code: {0}")]
    InvalidCode(u8),

    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),

    #[error("Unknown EAP type: {0}")]
    UnknownType(u8),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

// =============================================================================
// RADIUS Integration Helpers (RFC 3579)
// =============================================================================

/// Convert an EAP packet to RADIUS EAP-Message attribute(s)
///
/// Per RFC 3579, EAP packets are encapsulated in EAP-Message attributes (Type 79).
/// If the EAP packet is larger than 253 bytes, it MUST be split across multiple
/// EAP-Message attributes.
///
/// # Example
/// ```
/// use mschapv2_proto::eap::{EapPacket, eap_to_radius_attributes};
///
/// let eap = EapPacket::success(1);
/// let attributes = eap_to_radius_attributes(&eap).unwrap();
/// assert_eq!(attributes.len(), 1);
/// assert_eq!(attributes[0].attr_type, 79); // EAP-Message
/// ```
pub fn eap_to_radius_attributes(eap_packet: &EapPacket) -> Result<Vec<Attribute>, EapError> {
    eap_packet
        .to_bytes()
        .chunks(Attribute::MAX_VALUE_LENGTH)
        .map(|chunk| {
            Attribute::new(AttributeType::EapMessage as u8, chunk.to_vec()).map_err(|e| {
                EapError::EncodingError(format!("Failed to create EAP-Message attribute: {}", e))
            })
        })
        .collect()
}

/// Extract EAP packet from RADIUS packet
///
/// Per RFC 3579, EAP packets may be fragmented across multiple EAP-Message
/// attributes. This function reassembles all EAP-Message attributes into a
/// single EAP packet.
///
/// # Returns
/// The reassembled EAP packet, or None if no EAP-Message attributes found
pub fn eap_from_radius_packet(radius_packet: &Packet) -> Result<Option<EapPacket>, EapError> {
    let mut eap_bytes = Vec::new();
    for attr in radius_packet.find_all_attributes(AttributeType::EapMessage as u8) {
        eap_bytes.extend_from_slice(&attr.value);
    }

    if eap_bytes.is_empty() {
        return Ok(None);
    }

    EapPacket::from_bytes(&eap_bytes).map(Some)
}

/// Add an EAP packet to a RADIUS packet as EAP-Message attribute(s)
pub fn add_eap_to_radius_packet(
    radius_packet: &mut Packet,
    eap_packet: &EapPacket,
) -> Result<(), EapError> {
    radius_packet.extend_attributes(eap_to_radius_attributes(eap_packet)?);
    Ok(())
}
