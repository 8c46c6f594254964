//! EAP-MSCHAPv2 RADIUS handler
//!
//! Drives [`Session`]s from RADIUS Access-Requests. Sessions live in a
//! concurrent table keyed by the RADIUS State attribute the handler hands
//! out with every Access-Challenge.
//!
//! # Example
//!
//! ```no_run
//! use mschapv2_proto::eap::{add_eap_to_radius_packet, EapPacket};
//! use mschapv2_proto::{Code, Packet};
//! use mschapv2_server::{Config, MschapV2Handler, UnavailableBackend};
//! use std::sync::Arc;
//!
//! let handler = MschapV2Handler::from_config(&Config::default(), Arc::new(UnavailableBackend));
//!
//! let mut request = Packet::new(Code::AccessRequest, 1);
//! add_eap_to_radius_packet(&mut request, &EapPacket::identity_response(1, "alice")).unwrap();
//!
//! // Access-Challenge carrying the EAP-MSCHAPv2 Challenge and a State
//! let reply = handler.start(&request, &[]).unwrap();
//! ```

use crate::config::Config;
use dashmap::DashMap;
use mschapv2_proto::eap::{eap_from_radius_packet, eap_to_radius_attributes, EapError, EapPacket};
use mschapv2_proto::mschapv2::{
    ChallengeMaterial, ChallengeSeed, CredentialBackend, InboundRound, MschapV2Config, ProcessResult,
    ProtocolError, ResumeTicket, Session, UpstreamReply,
};
use mschapv2_proto::{Attribute, AttributeType, Code, Packet, PacketError};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the random part of a State value, in bytes
const STATE_KEY_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Request has no EAP-Message")]
    MissingEapMessage,
    #[error("Request has no State")]
    MissingState,
    #[error("Unknown or expired session")]
    UnknownSession,
    #[error("No upstream reply expected for this session")]
    NoPendingUpstream,
    #[error("EAP error: {0}")]
    Eap(#[from] EapError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Attribute error: {0}")]
    Attribute(#[from] PacketError),
}

/// What to answer the RADIUS client with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Access-Accept: EAP Success, MPPE keys and saved reply attributes
    Accept { attributes: Vec<Attribute> },
    /// Access-Reject: EAP Failure
    Reject { attributes: Vec<Attribute> },
    /// Access-Challenge: next EAP Request plus the State to echo
    Challenge { state: String, attributes: Vec<Attribute> },
    /// Inner verification goes to a home server; resume with `state` once
    /// its reply arrives
    Proxy { state: String, attributes: Vec<Attribute> },
}

impl AuthResult {
    /// RADIUS code of the reply to the client. A proxied request has no
    /// reply yet; its attributes form an Access-Request to the home server.
    pub fn code(&self) -> Code {
        match self {
            AuthResult::Accept { .. } => Code::AccessAccept,
            AuthResult::Reject { .. } => Code::AccessReject,
            AuthResult::Challenge { .. } => Code::AccessChallenge,
            AuthResult::Proxy { .. } => Code::AccessRequest,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match self {
            AuthResult::Accept { attributes }
            | AuthResult::Reject { attributes }
            | AuthResult::Challenge { attributes, .. }
            | AuthResult::Proxy { attributes, .. } => attributes,
        }
    }

    /// State value for Challenge and Proxy results
    pub fn state(&self) -> Option<&str> {
        match self {
            AuthResult::Challenge { state, .. } | AuthResult::Proxy { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Build the outgoing packet. Only an Access-Challenge carries State;
    /// it is never forwarded upstream.
    pub fn to_packet(&self, identifier: u8) -> Result<Packet, PacketError> {
        let mut packet = Packet::new(self.code(), identifier);
        packet.extend_attributes(self.attributes().iter().cloned());
        if let AuthResult::Challenge { state, .. } = self {
            packet.add_attribute(Attribute::string(AttributeType::State as u8, state.as_str())?);
        }
        Ok(packet)
    }
}

/// A session plus the bookkeeping the table needs
struct TrackedSession {
    session: Session,
    last_activity: Instant,
    /// Identifier of the last EAP Response seen, for the final EAP Failure
    last_eap_id: u8,
}

/// EAP-MSCHAPv2 handler managing all in-flight sessions
pub struct MschapV2Handler {
    config: Arc<MschapV2Config>,
    backend: Arc<dyn CredentialBackend>,
    session_timeout: Duration,
    sessions: DashMap<String, TrackedSession>,
    /// Outstanding upstream continuations, keyed like `sessions`
    tickets: DashMap<String, ResumeTicket>,
}

impl MschapV2Handler {
    pub fn new(config: Arc<MschapV2Config>, backend: Arc<dyn CredentialBackend>, session_timeout: Duration) -> Self {
        MschapV2Handler {
            config,
            backend,
            session_timeout,
            sessions: DashMap::new(),
            tickets: DashMap::new(),
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn CredentialBackend>) -> Self {
        Self::new(Arc::new(config.mschapv2.clone()), backend, config.session_timeout())
    }

    /// Start EAP-MSCHAPv2 for an Access-Request carrying the peer's EAP
    /// Response (normally Identity).
    ///
    /// `control` holds policy attributes; an MS-CHAP-Challenge there is used
    /// as the authenticator challenge instead of a random one, and an
    /// MS-CHAP-Peer-Challenge next to it overrides the peer's challenge.
    pub fn start(&self, request: &Packet, control: &[Attribute]) -> Result<AuthResult, HandlerError> {
        let eap = eap_from_radius_packet(request)?.ok_or(HandlerError::MissingEapMessage)?;
        let material = ChallengeMaterial::from_seed(&ChallengeSeed::from_control(control));

        let (session, challenge) = Session::init(Arc::clone(&self.config), material, eap.identifier)?;
        let state = new_state_key();
        info!(session = session.id(), state = %state, "Starting EAP-MSCHAPv2");

        let attributes = eap_to_radius_attributes(&challenge)?;
        self.sessions.insert(
            state.clone(),
            TrackedSession {
                session,
                last_activity: Instant::now(),
                last_eap_id: eap.identifier,
            },
        );

        Ok(AuthResult::Challenge { state, attributes })
    }

    /// Process an Access-Request continuing an existing session.
    ///
    /// Any error rejects the request; the session, if found, is dropped.
    pub fn handle(&self, request: &Packet, proxy_inner: bool) -> AuthResult {
        match self.try_handle(request, proxy_inner) {
            Ok(result) => result,
            Err(e) => {
                warn!(identifier = request.identifier, error = %e, "Rejecting EAP-MSCHAPv2 request");
                reject(eap_identifier(request))
            }
        }
    }

    /// Feed the home server's reply back into the suspended session.
    ///
    /// Any error rejects the request with an EAP Failure echoing the
    /// session's last EAP identifier; the session, if found, is dropped.
    pub fn resume(&self, state: &str, upstream: &Packet) -> AuthResult {
        match self.try_resume(state, upstream) {
            Ok(result) => result,
            Err(e) => {
                warn!(state = %state, error = %e, "Rejecting proxied EAP-MSCHAPv2 session");
                let eap_id = self
                    .sessions
                    .remove(state)
                    .map(|(_, tracked)| tracked.last_eap_id)
                    .unwrap_or(0);
                reject(eap_id)
            }
        }
    }

    /// Drop sessions idle longer than the session timeout. Returns how many
    /// were removed.
    pub fn cleanup_expired(&self) -> usize {
        let timeout = self.session_timeout;
        let mut expired = Vec::new();

        self.sessions.retain(|key, tracked| {
            let keep = tracked.last_activity.elapsed() <= timeout;
            if !keep {
                expired.push(key.clone());
            }
            keep
        });
        for key in &expired {
            self.tickets.remove(key);
        }

        if !expired.is_empty() {
            debug!(
                removed = expired.len(),
                remaining = self.sessions.len(),
                "EAP-MSCHAPv2 session cleanup completed"
            );
        }
        expired.len()
    }

    /// Number of sessions in progress (suspended ones included)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions waiting for a home server
    pub fn pending_upstream_count(&self) -> usize {
        self.tickets.len()
    }

    fn try_handle(&self, request: &Packet, proxy_inner: bool) -> Result<AuthResult, HandlerError> {
        let state = request
            .find_attribute(AttributeType::State as u8)
            .ok_or(HandlerError::MissingState)?;
        let key = String::from_utf8(state.value.clone()).map_err(|_| HandlerError::UnknownSession)?;

        // Out of the table while the round runs; a concurrent duplicate
        // finds nothing and is rejected.
        let (key, mut tracked) = self.sessions.remove(&key).ok_or(HandlerError::UnknownSession)?;
        let eap = eap_from_radius_packet(request)
            .map_err(HandlerError::from)
            .and_then(|eap| eap.ok_or(HandlerError::MissingEapMessage));
        let eap = match eap {
            Ok(eap) => eap,
            Err(e) => {
                self.tickets.remove(&key);
                return Err(e);
            }
        };

        let mut round = InboundRound::new(eap).with_proxy_inner(proxy_inner);
        if let Some(user_name) = request
            .find_attribute(AttributeType::UserName as u8)
            .and_then(|a| a.as_string().ok())
        {
            round = round.with_user_name(user_name);
        }

        tracked.last_eap_id = round.packet.identifier;
        let result = tracked.session.process(&round, self.backend.as_ref());
        self.finish(key, tracked, result)
    }

    fn try_resume(&self, state: &str, upstream: &Packet) -> Result<AuthResult, HandlerError> {
        let (_, ticket) = self.tickets.remove(state).ok_or(HandlerError::NoPendingUpstream)?;
        let (key, mut tracked) = self.sessions.remove(state).ok_or(HandlerError::UnknownSession)?;

        debug!(state = %key, code = ?upstream.code, "Resuming EAP-MSCHAPv2 session");
        let result = tracked.session.resume(ticket, UpstreamReply::from_packet(upstream));
        self.finish(key, tracked, result)
    }

    /// Turn a session outcome into a RADIUS answer, keeping the session
    /// only while the conversation goes on
    fn finish(&self, key: String, mut tracked: TrackedSession, result: ProcessResult) -> Result<AuthResult, HandlerError> {
        let eap_id = tracked.last_eap_id;

        match result {
            ProcessResult::Continue(request) => {
                let attributes = eap_to_radius_attributes(&request)?;
                tracked.last_activity = Instant::now();
                self.sessions.insert(key.clone(), tracked);
                Ok(AuthResult::Challenge { state: key, attributes })
            }
            ProcessResult::Suspend(suspension) => {
                tracked.last_activity = Instant::now();
                self.sessions.insert(key.clone(), tracked);
                self.tickets.insert(key.clone(), suspension.ticket);
                Ok(AuthResult::Proxy {
                    state: key,
                    attributes: suspension.request.attributes,
                })
            }
            ProcessResult::Success { keys, reply } => {
                info!(session = tracked.session.id(), "EAP-MSCHAPv2 authentication succeeded");
                let mut attributes = eap_to_radius_attributes(&EapPacket::success(eap_id))?;
                attributes.extend(keys);
                attributes.extend(reply);
                Ok(AuthResult::Accept { attributes })
            }
            ProcessResult::Failure => {
                info!(session = tracked.session.id(), "EAP-MSCHAPv2 authentication failed");
                self.tickets.remove(&key);
                Ok(reject(eap_id))
            }
        }
    }
}

fn new_state_key() -> String {
    let mut bytes = [0u8; STATE_KEY_LEN];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Identifier of the EAP packet in a request, read without full parsing
fn eap_identifier(request: &Packet) -> u8 {
    request
        .find_attribute(AttributeType::EapMessage as u8)
        .and_then(|a| a.value.get(1).copied())
        .unwrap_or(0)
}

fn reject(eap_id: u8) -> AuthResult {
    AuthResult::Reject {
        attributes: eap_to_radius_attributes(&EapPacket::failure(eap_id)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UnavailableBackend;
    use mschapv2_proto::eap::{add_eap_to_radius_packet, EapCode};

    fn handler(timeout: Duration) -> MschapV2Handler {
        MschapV2Handler::new(Arc::new(MschapV2Config::default()), Arc::new(UnavailableBackend), timeout)
    }

    fn identity_request() -> Packet {
        let mut request = Packet::new(Code::AccessRequest, 1);
        add_eap_to_radius_packet(&mut request, &EapPacket::identity_response(5, "alice")).unwrap();
        request
    }

    #[test]
    fn test_start_issues_challenge_with_state() {
        let handler = handler(Duration::from_secs(300));
        let result = handler.start(&identity_request(), &[]).unwrap();

        let state = result.state().unwrap().to_string();
        assert_eq!(state.len(), 2 * STATE_KEY_LEN);
        assert_eq!(result.code(), Code::AccessChallenge);
        assert_eq!(handler.session_count(), 1);

        let packet = result.to_packet(1).unwrap();
        assert_eq!(packet.find_attribute(AttributeType::State as u8).unwrap().value, state.as_bytes());
        let eap = eap_from_radius_packet(&packet).unwrap().unwrap();
        assert_eq!(eap.code, EapCode::Request);
        assert_eq!(eap.identifier, 6);
    }

    #[test]
    fn test_start_without_eap_message() {
        let handler = handler(Duration::from_secs(300));
        let request = Packet::new(Code::AccessRequest, 1);
        assert!(matches!(handler.start(&request, &[]), Err(HandlerError::MissingEapMessage)));
        assert_eq!(handler.session_count(), 0);
    }

    #[test]
    fn test_state_keys_are_unique() {
        assert_ne!(new_state_key(), new_state_key());
    }

    #[test]
    fn test_cleanup_expired() {
        let handler = handler(Duration::from_millis(1));
        handler.start(&identity_request(), &[]).unwrap();
        handler.start(&identity_request(), &[]).unwrap();
        assert_eq!(handler.session_count(), 2);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(handler.cleanup_expired(), 2);
        assert_eq!(handler.session_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_active_sessions() {
        let handler = handler(Duration::from_secs(300));
        handler.start(&identity_request(), &[]).unwrap();
        assert_eq!(handler.cleanup_expired(), 0);
        assert_eq!(handler.session_count(), 1);
    }

    #[test]
    fn test_proxy_result_never_carries_state() {
        let result = AuthResult::Proxy {
            state: "abc".to_string(),
            attributes: vec![],
        };
        let packet = result.to_packet(3).unwrap();
        assert_eq!(packet.code, Code::AccessRequest);
        assert!(packet.find_attribute(AttributeType::State as u8).is_none());
    }

    #[test]
    fn test_reject_carries_eap_failure() {
        let AuthResult::Reject { attributes } = reject(9) else {
            panic!("expected reject");
        };
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].value, vec![4, 9, 0, 4]);
    }

    #[test]
    fn test_unexpected_upstream_reply_echoes_last_eap_id() {
        let handler = handler(Duration::from_secs(300));
        let result = handler.start(&identity_request(), &[]).unwrap();
        let state = result.state().unwrap().to_string();

        let result = handler.resume(&state, &Packet::new(Code::AccessAccept, 1));
        let AuthResult::Reject { attributes } = result else {
            panic!("expected reject");
        };
        assert_eq!(attributes[0].value, vec![4, 5, 0, 4]);
        assert_eq!(handler.session_count(), 0);

        // Unknown session: nothing to echo
        let AuthResult::Reject { attributes } = handler.resume("feedface", &Packet::new(Code::AccessAccept, 1)) else {
            panic!("expected reject");
        };
        assert_eq!(attributes[0].value, vec![4, 0, 0, 4]);
    }
}
