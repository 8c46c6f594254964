//! EAP-MSCHAPv2 Handler
//!
//! This crate drives the EAP-MSCHAPv2 sessions of `mschapv2-proto` from
//! RADIUS Access-Requests.
//!
//! # Features
//!
//! - Concurrent session table keyed by RADIUS State
//! - Suspend/resume for inner verification proxied to a home server
//! - Idle session expiry
//! - JSON configuration
//!
//! # Example
//!
//! ```rust
//! use mschapv2_proto::eap::{add_eap_to_radius_packet, EapPacket};
//! use mschapv2_proto::{Code, Packet};
//! use mschapv2_server::{AuthResult, Config, MschapV2Handler, UnavailableBackend};
//! use std::sync::Arc;
//!
//! let handler = MschapV2Handler::from_config(&Config::default(), Arc::new(UnavailableBackend));
//!
//! let mut request = Packet::new(Code::AccessRequest, 1);
//! add_eap_to_radius_packet(&mut request, &EapPacket::identity_response(0, "alice")).unwrap();
//!
//! let reply = handler.start(&request, &[]).unwrap();
//! assert!(matches!(reply, AuthResult::Challenge { .. }));
//! assert_eq!(handler.session_count(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod handler;

pub use backend::UnavailableBackend;
pub use config::{Config, ConfigError};
pub use handler::{AuthResult, HandlerError, MschapV2Handler};
