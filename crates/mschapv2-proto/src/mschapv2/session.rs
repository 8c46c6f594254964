//! Per-peer EAP-MSCHAPv2 session and its state machine.

use super::challenge::ChallengeMaterial;
use super::codec::{ChallengePacket, ChangePasswordPacket, OpCode, ResponsePacket, CHALLENGE_LEN};
use super::config::MschapV2Config;
use super::password::ChangePasswordRequest;
use super::tunnel::{strip_nt_domain, ProxyRequest, ResumeTicket, Suspension, UpstreamReply};
use super::verify::{
    interpret_accept, interpret_reject, BackendOutcome, CredentialBackend, Verdict, VerifyRequest,
};
use super::ProtocolError;
use crate::attributes::Attribute;
use crate::eap::{EapCode, EapPacket, EapType};
use crate::packet::Code;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Last MSCHAPv2 packet sent to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ChallengeSent,
    SuccessSent,
    FailureSent,
}

/// One inbound EAP round as seen by the method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRound {
    pub packet: EapPacket,
    /// Verification must be proxied to a home server instead of the
    /// local backend (tunnelled inner method)
    pub proxy_inner: bool,
    /// User-Name of the carrying RADIUS request, if any
    pub user_name: Option<String>,
}

impl InboundRound {
    pub fn new(packet: EapPacket) -> Self {
        InboundRound {
            packet,
            proxy_inner: false,
            user_name: None,
        }
    }

    pub fn with_proxy_inner(mut self, proxy_inner: bool) -> Self {
        self.proxy_inner = proxy_inner;
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }
}

/// Outcome of a round
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Send this EAP Request and wait for the next round
    Continue(EapPacket),
    /// Forward the request upstream and come back with `Session::resume`
    Suspend(Suspension),
    /// Authentication finished; MPPE keys and reply attributes for the Accept
    Success {
        keys: Vec<Attribute>,
        reply: Vec<Attribute>,
    },
    /// Authentication failed; send EAP Failure
    Failure,
}

impl ProcessResult {
    /// RADIUS code carrying this result, `None` while suspended
    pub fn radius_code(&self) -> Option<Code> {
        match self {
            ProcessResult::Continue(_) => Some(Code::AccessChallenge),
            ProcessResult::Suspend(_) => None,
            ProcessResult::Success { .. } => Some(Code::AccessAccept),
            ProcessResult::Failure => Some(Code::AccessReject),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessResult::Success { .. } | ProcessResult::Failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingUpstream {
    nonce: u64,
    /// EAP identifier of the round that was suspended
    eap_id: u8,
}

/// EAP-MSCHAPv2 session, owned by whoever drives the EAP conversation
#[derive(Debug)]
pub struct Session {
    id: u64,
    config: Arc<MschapV2Config>,
    state: SessionState,
    auth_challenge: [u8; CHALLENGE_LEN],
    peer_challenge: Option<[u8; CHALLENGE_LEN]>,
    extracted_keys: Vec<Attribute>,
    saved_reply_attributes: Vec<Attribute>,
    pending_upstream: Option<PendingUpstream>,
}

impl Session {
    /// Start a session and build the Challenge answering the EAP round with
    /// the given identifier.
    pub fn init(
        config: Arc<MschapV2Config>,
        material: ChallengeMaterial,
        identifier: u8,
    ) -> Result<(Session, EapPacket), ProtocolError> {
        let next_id = identifier.wrapping_add(1);
        let challenge = ChallengePacket {
            mschapv2_id: next_id,
            challenge: material.auth_challenge,
            server_name: config.identity.as_bytes().to_vec(),
        };
        let request = EapPacket::mschapv2_request(next_id, challenge.encode()?);

        let session = Session {
            id: rand::rng().random(),
            config,
            state: SessionState::ChallengeSent,
            auth_challenge: material.auth_challenge,
            peer_challenge: material.peer_challenge,
            extracted_keys: Vec::new(),
            saved_reply_attributes: Vec::new(),
            pending_upstream: None,
        };
        debug!(session = session.id, eap_id = next_id, "Issued EAP-MSCHAPv2 challenge");

        Ok((session, request))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &MschapV2Config {
        &self.config
    }

    /// Challenge the next Response is checked against
    pub fn auth_challenge(&self) -> &[u8; CHALLENGE_LEN] {
        &self.auth_challenge
    }

    pub fn peer_challenge(&self) -> Option<&[u8; CHALLENGE_LEN]> {
        self.peer_challenge.as_ref()
    }

    /// MPPE key attributes, empty until a verification succeeded
    pub fn extracted_keys(&self) -> &[Attribute] {
        &self.extracted_keys
    }

    pub fn saved_reply_attributes(&self) -> &[Attribute] {
        &self.saved_reply_attributes
    }

    /// Waiting for `resume`
    pub fn is_suspended(&self) -> bool {
        self.pending_upstream.is_some()
    }

    /// Run one inbound round through the state machine.
    ///
    /// Every error ends the session: it is logged and reported as
    /// [`ProcessResult::Failure`].
    pub fn process(&mut self, round: &InboundRound, backend: &dyn CredentialBackend) -> ProcessResult {
        match self.step(round, backend) {
            Ok(result) => result,
            Err(e) => {
                warn!(session = self.id, state = ?self.state, error = %e, "EAP-MSCHAPv2 round failed");
                ProcessResult::Failure
            }
        }
    }

    /// Apply the home server's reply to a suspended round
    pub fn resume(&mut self, ticket: ResumeTicket, reply: UpstreamReply) -> ProcessResult {
        match self.try_resume(ticket, reply) {
            Ok(result) => result,
            Err(e) => {
                warn!(session = self.id, error = %e, "EAP-MSCHAPv2 resume failed");
                ProcessResult::Failure
            }
        }
    }

    fn step(
        &mut self,
        round: &InboundRound,
        backend: &dyn CredentialBackend,
    ) -> Result<ProcessResult, ProtocolError> {
        let packet = &round.packet;

        let length = packet.length();
        if length <= EapPacket::HEADER_LENGTH + 1 {
            return Err(ProtocolError::Malformed(length));
        }
        if packet.code != EapCode::Response {
            return Err(ProtocolError::UnexpectedEapCode(packet.code));
        }
        if packet.eap_type != Some(EapType::MsChapV2) {
            return Err(ProtocolError::UnexpectedEapType(packet.eap_type));
        }
        if self.pending_upstream.is_some() {
            return Err(ProtocolError::AwaitingUpstream);
        }

        let opcode_byte = *packet.data.first().ok_or(ProtocolError::Malformed(length))?;
        let opcode = OpCode::from_u8(opcode_byte).ok_or(super::CodecError::UnknownOpCode(opcode_byte))?;
        debug!(session = self.id, state = ?self.state, ?opcode, eap_id = packet.identifier, "EAP-MSCHAPv2 round");

        match (self.state, opcode) {
            (SessionState::ChallengeSent | SessionState::FailureSent, OpCode::Response) => {
                self.handle_response(round, backend)
            }
            (SessionState::ChallengeSent, OpCode::Failure) => {
                debug!(session = self.id, "Peer declined to continue");
                Ok(ProcessResult::Failure)
            }
            (SessionState::FailureSent, OpCode::Failure) => {
                debug!(session = self.id, "Peer acknowledged failure");
                Ok(ProcessResult::Failure)
            }
            (SessionState::SuccessSent, OpCode::Success | OpCode::Ack) => Ok(ProcessResult::Success {
                keys: self.extracted_keys.clone(),
                reply: self.saved_reply_attributes.clone(),
            }),
            (SessionState::FailureSent, OpCode::ChangePassword) => self.handle_change_password(round, backend),
            (state, opcode) => Err(ProtocolError::UnexpectedOpCode { state, opcode }),
        }
    }

    fn handle_response(
        &mut self,
        round: &InboundRound,
        backend: &dyn CredentialBackend,
    ) -> Result<ProcessResult, ProtocolError> {
        let response = ResponsePacket::decode(&round.packet.data)?;

        let request = VerifyRequest {
            ident: response.mschapv2_id,
            flags: response.flags,
            auth_challenge: self.auth_challenge,
            peer_challenge: self.peer_challenge.unwrap_or(response.peer_challenge),
            reserved: response.reserved,
            nt_response: response.nt_response,
            username: response.name_lossy(),
        };

        if round.proxy_inner {
            let user_name = self.forwarded_user_name(round, Some(request.username.as_str()));
            let attributes = request.to_attributes(user_name.as_deref().unwrap_or_default())?;
            return Ok(self.suspend(attributes, round.packet.identifier));
        }

        debug!(session = self.id, user = %request.username, "Verifying MSCHAPv2 response");
        let outcome = backend.verify_password(&request)?;
        self.apply_outcome(outcome, round.packet.identifier)
    }

    fn handle_change_password(
        &mut self,
        round: &InboundRound,
        backend: &dyn CredentialBackend,
    ) -> Result<ProcessResult, ProtocolError> {
        let packet = ChangePasswordPacket::decode(&round.packet.data)?;

        if round.proxy_inner {
            let username = self.forwarded_user_name(round, None);
            let request = ChangePasswordRequest::new(&packet, self.auth_challenge, username);
            let attributes = request.to_attributes()?;
            return Ok(self.suspend(attributes, round.packet.identifier));
        }

        let request = ChangePasswordRequest::new(&packet, self.auth_challenge, round.user_name.clone());
        debug!(session = self.id, "Submitting password change");
        let outcome = backend.change_password(&request)?;
        self.apply_outcome(outcome, round.packet.identifier)
    }

    /// Outer User-Name if present, else `fallback`; NT domain removed when
    /// configured
    fn forwarded_user_name(&self, round: &InboundRound, fallback: Option<&str>) -> Option<String> {
        let name = round.user_name.as_deref().or(fallback)?;
        if self.config.with_ntdomain_hack {
            Some(strip_nt_domain(name).to_string())
        } else {
            Some(name.to_string())
        }
    }

    fn suspend(&mut self, attributes: Vec<Attribute>, eap_id: u8) -> ProcessResult {
        let ticket = ResumeTicket::issue(self.id);
        self.pending_upstream = Some(PendingUpstream {
            nonce: ticket.nonce(),
            eap_id,
        });
        debug!(session = self.id, attributes = attributes.len(), "Proxying inner verification upstream");

        ProcessResult::Suspend(Suspension {
            request: ProxyRequest { attributes },
            ticket,
        })
    }

    fn try_resume(&mut self, ticket: ResumeTicket, reply: UpstreamReply) -> Result<ProcessResult, ProtocolError> {
        let pending = self.pending_upstream.take().ok_or(ProtocolError::NoPendingUpstream)?;
        if ticket.session_id() != self.id || ticket.nonce() != pending.nonce {
            return Err(ProtocolError::TicketMismatch);
        }

        if !reply.is_accept() {
            self.state = SessionState::FailureSent;
            return Err(ProtocolError::UpstreamRejected(reply.code));
        }

        let verdict = interpret_accept(reply.attributes, pending.eap_id)?;
        self.apply_verdict(verdict, pending.eap_id)
    }

    fn apply_outcome(&mut self, outcome: BackendOutcome, eap_id: u8) -> Result<ProcessResult, ProtocolError> {
        let verdict = match outcome {
            BackendOutcome::Accept(reply) => interpret_accept(reply, eap_id)?,
            BackendOutcome::Reject(reply) => interpret_reject(reply, eap_id, self.config.send_error)?,
        };
        self.apply_verdict(verdict, eap_id)
    }

    /// Record the verdict and build the packet for the peer. The MSCHAPv2
    /// identifier echoes the inbound EAP identifier; the EAP Request uses
    /// the next one.
    fn apply_verdict(&mut self, verdict: Verdict, eap_id: u8) -> Result<ProcessResult, ProtocolError> {
        let next_id = eap_id.wrapping_add(1);

        match verdict {
            Verdict::Success { packet, keys, reply } => {
                debug!(session = self.id, keys = keys.len(), "MSCHAPv2 authentication accepted");
                self.extracted_keys = keys;
                self.saved_reply_attributes = reply;
                self.state = SessionState::SuccessSent;
                Ok(ProcessResult::Continue(EapPacket::mschapv2_request(next_id, packet.encode())))
            }
            Verdict::Failure { packet, new_challenge } => {
                self.state = SessionState::FailureSent;
                let Some(packet) = packet else {
                    debug!(session = self.id, "MSCHAPv2 authentication rejected");
                    return Ok(ProcessResult::Failure);
                };

                if let Some(challenge) = new_challenge {
                    self.auth_challenge = challenge;
                }
                debug!(session = self.id, "MSCHAPv2 authentication rejected, peer may retry");
                Ok(ProcessResult::Continue(EapPacket::mschapv2_request(next_id, packet.encode()?)))
            }
        }
    }
}
