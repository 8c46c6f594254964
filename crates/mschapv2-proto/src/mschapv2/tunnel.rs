//! Suspension of a session while inner verification is proxied upstream.
//!
//! Inside a tunnel (PEAP, TTLS) the outer server may hand the MSCHAPv2
//! exchange to a home server instead of checking credentials locally. The
//! session then stops with a [`Suspension`]: the attributes to forward and a
//! one-shot [`ResumeTicket`] that must come back with the upstream reply.

use crate::attributes::Attribute;
use crate::packet::{Code, Packet};
use rand::Rng;

/// Attributes to send to the home server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub attributes: Vec<Attribute>,
}

/// Proof that a session is waiting for exactly one upstream reply.
///
/// Not `Clone`. Resuming consumes the ticket, so a reply is applied at most
/// once.
#[derive(Debug, PartialEq, Eq)]
pub struct ResumeTicket {
    session_id: u64,
    nonce: u64,
}

impl ResumeTicket {
    pub(crate) fn issue(session_id: u64) -> Self {
        ResumeTicket {
            session_id,
            nonce: rand::rng().random(),
        }
    }

    /// Identity of the session that issued this ticket
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub(crate) fn nonce(&self) -> u64 {
        self.nonce
    }
}

/// Returned by `Session::process` instead of an EAP packet
#[derive(Debug, PartialEq, Eq)]
pub struct Suspension {
    pub request: ProxyRequest,
    pub ticket: ResumeTicket,
}

/// The home server's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub code: Code,
    pub attributes: Vec<Attribute>,
}

impl UpstreamReply {
    pub fn new(code: Code, attributes: Vec<Attribute>) -> Self {
        UpstreamReply { code, attributes }
    }

    pub fn from_packet(packet: &Packet) -> Self {
        UpstreamReply {
            code: packet.code,
            attributes: packet.attributes.clone(),
        }
    }

    pub fn is_accept(&self) -> bool {
        self.code == Code::AccessAccept
    }
}

/// Drop the NT domain from "DOMAIN\user". Only the first backslash counts.
///
/// ```
/// use mschapv2_proto::mschapv2::strip_nt_domain;
///
/// assert_eq!(strip_nt_domain("CORP\\alice"), "alice");
/// assert_eq!(strip_nt_domain("alice"), "alice");
/// ```
pub fn strip_nt_domain(username: &str) -> &str {
    match username.split_once('\\') {
        Some((_, user)) => user,
        None => username,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeType;

    #[test]
    fn test_strip_nt_domain() {
        assert_eq!(strip_nt_domain("CORP\\alice"), "alice");
        assert_eq!(strip_nt_domain("A\\B\\carol"), "B\\carol");
        assert_eq!(strip_nt_domain("\\bob"), "bob");
        assert_eq!(strip_nt_domain("alice@example.com"), "alice@example.com");
        assert_eq!(strip_nt_domain(""), "");
    }

    #[test]
    fn test_tickets_are_distinct() {
        let first = ResumeTicket::issue(42);
        let second = ResumeTicket::issue(42);
        assert_eq!(first.session_id(), 42);
        assert_eq!(second.session_id(), 42);
        // Same session, different continuation
        assert_ne!(first.nonce(), second.nonce());
    }

    #[test]
    fn test_upstream_reply_from_packet() {
        let mut packet = Packet::new(Code::AccessAccept, 9);
        packet.add_attribute(Attribute::string(AttributeType::Class as u8, "gold").unwrap());

        let reply = UpstreamReply::from_packet(&packet);
        assert!(reply.is_accept());
        assert_eq!(reply.attributes.len(), 1);
        assert!(!UpstreamReply::new(Code::AccessReject, vec![]).is_accept());
    }
}
