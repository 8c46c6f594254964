use super::ProtocolError;

/// Maximum length of the server identity carried in Challenge packets
pub const MAX_IDENTITY_LEN: usize = 255;

/// Default server identity, "<product>-<version>"
pub fn default_identity() -> String {
    format!("eap-mschapv2-{}", env!("CARGO_PKG_VERSION"))
}

/// EAP-MSCHAPv2 method settings, read-only once a handler is built
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MschapV2Config {
    /// Strip the NT domain ("DOMAIN\user") from User-Name before proxying
    #[cfg_attr(feature = "serde", serde(default))]
    pub with_ntdomain_hack: bool,

    /// Send MS-CHAP error details (E=, R=, C=) to the peer on failure
    #[cfg_attr(feature = "serde", serde(default))]
    pub send_error: bool,

    /// Server name embedded in Challenge packets
    #[cfg_attr(feature = "serde", serde(default = "default_identity"))]
    pub identity: String,
}

impl Default for MschapV2Config {
    fn default() -> Self {
        MschapV2Config {
            with_ntdomain_hack: false,
            send_error: false,
            identity: default_identity(),
        }
    }
}

impl MschapV2Config {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.identity.len() > MAX_IDENTITY_LEN {
            return Err(ProtocolError::InvalidConfig(format!(
                "identity is too long: {} bytes (max {})",
                self.identity.len(),
                MAX_IDENTITY_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MschapV2Config::default();
        assert!(!config.with_ntdomain_hack);
        assert!(!config.send_error);
        assert!(config.identity.starts_with("eap-mschapv2-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identity_length_limit() {
        let mut config = MschapV2Config {
            identity: "a".repeat(255),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.identity.push('a');
        assert!(matches!(config.validate(), Err(ProtocolError::InvalidConfig(_))));
    }
}
