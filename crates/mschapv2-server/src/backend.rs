//! Credential backends shipped with the server crate

use mschapv2_proto::mschapv2::{
    BackendError, BackendOutcome, ChangePasswordRequest, CredentialBackend, VerifyRequest,
};
use tracing::warn;

/// Backend for deployments where every inner verification is proxied to a
/// home server. Any local verification attempt fails the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

impl CredentialBackend for UnavailableBackend {
    fn verify_password(&self, request: &VerifyRequest) -> Result<BackendOutcome, BackendError> {
        warn!(user = %request.username, "No local credential store, cannot verify MSCHAPv2 response");
        Err(BackendError::Unavailable("no local credential store".to_string()))
    }

    fn change_password(&self, _request: &ChangePasswordRequest) -> Result<BackendOutcome, BackendError> {
        Err(BackendError::Unavailable("no local credential store".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_backend() {
        let request = VerifyRequest {
            ident: 1,
            flags: 0,
            auth_challenge: [0; 16],
            peer_challenge: [0; 16],
            reserved: [0; 8],
            nt_response: [0; 24],
            username: "alice".to_string(),
        };
        assert!(matches!(
            UnavailableBackend.verify_password(&request),
            Err(BackendError::Unavailable(_))
        ));
    }
}
