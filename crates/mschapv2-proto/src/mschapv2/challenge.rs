//! Challenge material for a new EAP-MSCHAPv2 session.

use super::codec::CHALLENGE_LEN;
use crate::attributes::{Attribute, ControlAttributeType, MsAttributeType};
use rand::Rng;
use tracing::warn;

/// Generate a random 16-byte authenticator challenge
pub fn generate_challenge() -> [u8; CHALLENGE_LEN] {
    let mut rng = rand::rng();
    let mut challenge = [0u8; CHALLENGE_LEN];
    rng.fill(&mut challenge);
    challenge
}

/// Operator-supplied challenge values, typically taken from control
/// attributes set by policy before the method starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeSeed {
    /// Authenticator challenge to use instead of a random one
    pub auth_challenge: Option<Vec<u8>>,
    /// Peer challenge overriding whatever the peer claims to have used
    pub peer_challenge: Option<Vec<u8>>,
}

impl ChallengeSeed {
    /// Seed with the MS-CHAP-Challenge and MS-CHAP-Peer-Challenge found
    /// among control attributes, if any
    pub fn from_control(control: &[Attribute]) -> Self {
        ChallengeSeed {
            auth_challenge: control
                .iter()
                .find(|a| a.is_microsoft(MsAttributeType::ChapChallenge))
                .map(|a| a.value.clone()),
            peer_challenge: control
                .iter()
                .find(|a| a.is_control(ControlAttributeType::ChapPeerChallenge))
                .map(|a| a.value.clone()),
        }
    }

    pub fn with_peer_challenge(mut self, peer_challenge: Vec<u8>) -> Self {
        self.peer_challenge = Some(peer_challenge);
        self
    }
}

/// The challenge values a session is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMaterial {
    pub auth_challenge: [u8; CHALLENGE_LEN],
    pub peer_challenge: Option<[u8; CHALLENGE_LEN]>,
}

impl ChallengeMaterial {
    /// Fresh random authenticator challenge, no peer challenge override
    pub fn generate() -> Self {
        ChallengeMaterial {
            auth_challenge: generate_challenge(),
            peer_challenge: None,
        }
    }

    /// Reuse seeded values where they are usable.
    ///
    /// A seeded value of the wrong length is ignored with a warning. The peer
    /// challenge override only applies together with a seeded authenticator
    /// challenge; with a random authenticator challenge it is dropped.
    pub fn from_seed(seed: &ChallengeSeed) -> Self {
        let auth_challenge = seed.auth_challenge.as_deref().and_then(|value| {
            let challenge = to_challenge(value);
            if challenge.is_none() {
                warn!(length = value.len(), "Seeded MS-CHAP-Challenge has incorrect length, ignoring it");
            }
            challenge
        });

        let Some(auth_challenge) = auth_challenge else {
            return Self::generate();
        };

        let peer_challenge = seed.peer_challenge.as_deref().and_then(|value| {
            let challenge = to_challenge(value);
            if challenge.is_none() {
                warn!(length = value.len(), "Seeded peer challenge has incorrect length, ignoring it");
            }
            challenge
        });

        ChallengeMaterial {
            auth_challenge,
            peer_challenge,
        }
    }
}

fn to_challenge(value: &[u8]) -> Option<[u8; CHALLENGE_LEN]> {
    value.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_challenge_is_random() {
        // Two identical 128-bit draws would point at a broken RNG
        assert_ne!(generate_challenge(), generate_challenge());
    }

    #[test]
    fn test_seeded_challenges_are_reused() {
        let seed = ChallengeSeed {
            auth_challenge: Some((0..16).collect()),
            peer_challenge: Some(vec![0xAB; 16]),
        };
        let material = ChallengeMaterial::from_seed(&seed);

        assert_eq!(material.auth_challenge, core::array::from_fn(|i| i as u8));
        assert_eq!(material.peer_challenge, Some([0xAB; 16]));
    }

    #[test]
    fn test_wrong_length_seed_is_ignored() {
        let seed = ChallengeSeed {
            auth_challenge: Some(vec![1; 8]),
            peer_challenge: Some(vec![2; 16]),
        };
        let material = ChallengeMaterial::from_seed(&seed);

        assert_ne!(material.auth_challenge[..8], [1; 8]);
        // No usable authenticator challenge, so the peer override goes too
        assert_eq!(material.peer_challenge, None);
    }

    #[test]
    fn test_wrong_length_peer_challenge_is_ignored() {
        let seed = ChallengeSeed {
            auth_challenge: Some(vec![1; 16]),
            peer_challenge: Some(vec![2; 15]),
        };
        let material = ChallengeMaterial::from_seed(&seed);
        assert_eq!(material.auth_challenge, [1; 16]);
        assert_eq!(material.peer_challenge, None);
    }

    #[test]
    fn test_peer_challenge_alone_is_dropped() {
        let seed = ChallengeSeed::default().with_peer_challenge(vec![3; 16]);
        let material = ChallengeMaterial::from_seed(&seed);
        assert_eq!(material.peer_challenge, None);
    }

    #[test]
    fn test_seed_from_control_attributes() {
        let control = vec![Attribute::microsoft(MsAttributeType::ChapChallenge, vec![5; 16]).unwrap()];
        let seed = ChallengeSeed::from_control(&control);
        assert_eq!(seed.auth_challenge, Some(vec![5; 16]));
        assert_eq!(seed.peer_challenge, None);
        assert_eq!(ChallengeSeed::from_control(&[]), ChallengeSeed::default());
    }

    #[test]
    fn test_peer_challenge_from_control_attributes() {
        let control = vec![
            Attribute::microsoft(MsAttributeType::ChapChallenge, vec![5; 16]).unwrap(),
            Attribute::control(ControlAttributeType::ChapPeerChallenge, vec![6; 16]).unwrap(),
        ];
        let material = ChallengeMaterial::from_seed(&ChallengeSeed::from_control(&control));
        assert_eq!(material.auth_challenge, [5; 16]);
        assert_eq!(material.peer_challenge, Some([6; 16]));

        // Without a seeded authenticator challenge the override is dropped
        let material = ChallengeMaterial::from_seed(&ChallengeSeed::from_control(&control[1..]));
        assert_eq!(material.peer_challenge, None);
    }
}
