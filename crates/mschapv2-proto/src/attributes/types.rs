/// RADIUS Attribute Types used around EAP-MSCHAPv2 (RFC 2865, RFC 3579)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// State (24) - RFC 2865
    State = 24,
    /// Class (25) - RFC 2865
    Class = 25,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout = 27,
    /// Proxy-State (33) - RFC 2865
    ProxyState = 33,
    /// Tunnel-Private-Group-ID (81) - RFC 2868
    TunnelPrivateGroupId = 81,
    /// EAP-Message (79) - RFC 3579
    /// Encapsulates EAP packets for transport over RADIUS
    EapMessage = 79,
    /// Message-Authenticator (80) - RFC 2869
    MessageAuthenticator = 80,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            18 => Some(AttributeType::ReplyMessage),
            24 => Some(AttributeType::State),
            25 => Some(AttributeType::Class),
            26 => Some(AttributeType::VendorSpecific),
            27 => Some(AttributeType::SessionTimeout),
            33 => Some(AttributeType::ProxyState),
            79 => Some(AttributeType::EapMessage),
            80 => Some(AttributeType::MessageAuthenticator),
            81 => Some(AttributeType::TunnelPrivateGroupId),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// IANA private enterprise number of Microsoft
pub const VENDOR_MICROSOFT: u32 = 311;

/// Microsoft Vendor-Specific attribute types (RFC 2548)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsAttributeType {
    /// MS-CHAP-Error (2)
    ChapError = 2,
    /// MS-CHAP-NT-Enc-PW (6)
    ChapNtEncPw = 6,
    /// MS-MPPE-Encryption-Policy (7)
    MppeEncryptionPolicy = 7,
    /// MS-MPPE-Encryption-Types (8)
    MppeEncryptionTypes = 8,
    /// MS-CHAP-Challenge (11)
    ChapChallenge = 11,
    /// MS-MPPE-Send-Key (16)
    MppeSendKey = 16,
    /// MS-MPPE-Recv-Key (17)
    MppeRecvKey = 17,
    /// MS-CHAP2-Response (25)
    Chap2Response = 25,
    /// MS-CHAP2-Success (26)
    Chap2Success = 26,
    /// MS-CHAP2-CPW (27)
    Chap2Cpw = 27,
}

impl MsAttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(MsAttributeType::ChapError),
            6 => Some(MsAttributeType::ChapNtEncPw),
            7 => Some(MsAttributeType::MppeEncryptionPolicy),
            8 => Some(MsAttributeType::MppeEncryptionTypes),
            11 => Some(MsAttributeType::ChapChallenge),
            16 => Some(MsAttributeType::MppeSendKey),
            17 => Some(MsAttributeType::MppeRecvKey),
            25 => Some(MsAttributeType::Chap2Response),
            26 => Some(MsAttributeType::Chap2Success),
            27 => Some(MsAttributeType::Chap2Cpw),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// MPPE send/recv keys and the two encryption-policy attributes
    pub fn is_mppe_key(self) -> bool {
        matches!(
            self,
            MsAttributeType::MppeEncryptionPolicy
                | MsAttributeType::MppeEncryptionTypes
                | MsAttributeType::MppeSendKey
                | MsAttributeType::MppeRecvKey
        )
    }
}

/// Vendor-Id 0 is reserved by IANA; it marks server-internal attributes
/// that only live in control lists and never go on the wire
pub const VENDOR_INTERNAL: u32 = 0;

/// Server-internal control attribute types, set by policy before the
/// method starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlAttributeType {
    /// MS-CHAP-Peer-Challenge: peer challenge override, honoured only
    /// together with a control MS-CHAP-Challenge
    ChapPeerChallenge = 1,
}

impl ControlAttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ControlAttributeType::ChapPeerChallenge),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_attribute_conversion() {
        assert_eq!(MsAttributeType::from_u8(26), Some(MsAttributeType::Chap2Success));
        assert_eq!(MsAttributeType::from_u8(2), Some(MsAttributeType::ChapError));
        assert_eq!(MsAttributeType::from_u8(99), None);
        assert_eq!(MsAttributeType::Chap2Cpw.as_u8(), 27);
    }

    #[test]
    fn test_mppe_key_set() {
        let keys: Vec<u8> = (0..=255u8)
            .filter_map(MsAttributeType::from_u8)
            .filter(|t| t.is_mppe_key())
            .map(MsAttributeType::as_u8)
            .collect();
        assert_eq!(keys, vec![7, 8, 16, 17]);
    }
}
