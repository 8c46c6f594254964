//! EAP-MSCHAPv2 Server Method
//!
//! This crate implements the server side of EAP-MSCHAPv2 as carried in
//! RADIUS (RFC 3579, draft-kamath-pppext-eap-mschapv2, RFC 2548).
//!
//! # Features
//!
//! - EAP-MSCHAPv2 packet codec with bounds-checked decoding
//! - Per-peer session state machine (Challenge, Success, Failure, retry)
//! - Pluggable credential backend for the MSCHAPv2 computations
//! - Password change after a password-expired failure
//! - Suspension and one-shot resume for proxied inner verification
//! - MPPE key extraction for the final Access-Accept
//!
//! # Example
//!
//! ```rust
//! use mschapv2_proto::mschapv2::{ChallengeMaterial, MschapV2Config, Session};
//! use mschapv2_proto::eap::EapType;
//! use std::sync::Arc;
//!
//! // Answer an EAP Identity Response (identifier 1) with a Challenge
//! let config = Arc::new(MschapV2Config::default());
//! let (session, challenge) = Session::init(config, ChallengeMaterial::generate(), 1).unwrap();
//!
//! assert_eq!(challenge.identifier, 2);
//! assert_eq!(challenge.eap_type, Some(EapType::MsChapV2));
//! assert!(session.extracted_keys().is_empty());
//! ```

pub mod attributes;
pub mod eap;
pub mod mschapv2;
pub mod packet;

pub use attributes::{Attribute, AttributeType, ControlAttributeType, MsAttributeType, VENDOR_MICROSOFT};
pub use eap::{EapCode, EapError, EapPacket, EapType};
pub use mschapv2::{
    BackendError, BackendOutcome, CredentialBackend, InboundRound, MschapV2Config, ProcessResult,
    ProtocolError, ResumeTicket, Session, SessionState, Suspension, UpstreamReply,
};
pub use packet::{Code, Packet, PacketError};
