//! EAP-MSCHAPv2 server method (draft-kamath-pppext-eap-mschapv2)
//!
//! # Exchange
//!
//! ```text
//! Peer                                Server
//!  |  <-- Challenge (auth challenge)    |   state: ChallengeSent
//!  |  Response (NT-Response) -->        |   verify via CredentialBackend
//!  |  <-- Success (S=...)               |   state: SuccessSent
//!  |  Success / Ack -->                 |   EAP Success + MPPE keys
//! ```
//!
//! On a rejected Response the server may send a Failure packet carrying
//! `E= R= C=`. The peer can then retry with a new Response, request a
//! password change, or give up with a Failure.
//!
//! The MSCHAPv2 cryptography itself (NT-Response check, authenticator
//! response, MPPE key derivation) is done by the [`CredentialBackend`].

mod challenge;
mod codec;
mod config;
mod password;
mod session;
mod tunnel;
mod verify;

pub use challenge::{generate_challenge, ChallengeMaterial, ChallengeSeed};
pub use codec::{
    ChallengePacket, ChangePasswordPacket, CodecError, FailurePacket, OpCode, ResponsePacket,
    SuccessPacket, CHALLENGE_LEN, CHANGE_PASSWORD_LEN, ENCRYPTED_PASSWORD_LEN, MAX_RESPONSE_LENGTH,
    MIN_RESPONSE_LENGTH, NT_RESPONSE_LEN, SUCCESS_PACKET_LEN,
};
pub use config::{default_identity, MschapV2Config, MAX_IDENTITY_LEN};
pub use password::{ChangePasswordRequest, NT_ENC_PW_CHUNK_LEN};
pub use session::{InboundRound, ProcessResult, Session, SessionState};
pub use tunnel::{strip_nt_domain, ProxyRequest, ResumeTicket, Suspension, UpstreamReply};
pub use verify::{
    interpret_accept, interpret_reject, BackendError, BackendOutcome, CredentialBackend,
    ErrorMessage, Verdict, VerifyRequest,
};

use crate::eap::{EapCode, EapType};
use crate::packet::{Code, PacketError};
use thiserror::Error;

/// Why a round could not be completed. Never returned to the transport:
/// the session logs it and answers with a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed EAP packet: length {0}")]
    Malformed(usize),

    #[error("Unexpected EAP code: {0:?}")]
    UnexpectedEapCode(EapCode),

    #[error("Unexpected EAP type: {0:?}")]
    UnexpectedEapType(Option<EapType>),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unexpected OpCode {opcode:?} in state {state:?}")]
    UnexpectedOpCode { state: SessionState, opcode: OpCode },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Attribute error: {0}")]
    Attribute(#[from] PacketError),

    #[error("Reply has no {0} attribute")]
    MissingAttribute(&'static str),

    #[error("Upstream server answered {0:?}")]
    UpstreamRejected(Code),

    #[error("No upstream reply is pending")]
    NoPendingUpstream,

    #[error("Resume ticket does not match the pending upstream request")]
    TicketMismatch,

    #[error("Round received while waiting for upstream reply")]
    AwaitingUpstream,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
