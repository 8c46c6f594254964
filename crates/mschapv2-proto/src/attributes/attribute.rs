use super::types::{ControlAttributeType, MsAttributeType, VENDOR_INTERNAL, VENDOR_MICROSOFT};
use crate::packet::PacketError;

/// RADIUS attribute, either standard (RFC 2865 Section 5) or Vendor-Specific
/// (RFC 2865 Section 5.26) with a one-byte vendor type.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Type (26)    |    Length     |            Vendor-Id
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      Vendor-Id (cont)           | Vendor type   | Vendor length |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Vendor-Id for Vendor-Specific attributes, `None` for standard ones
    pub vendor: Option<u32>,
    /// Attribute type (or vendor type when `vendor` is set)
    pub attr_type: u8,
    /// Attribute value
    pub value: Vec<u8>,
}

impl Attribute {
    /// Maximum value length of a standard attribute (253 bytes)
    pub const MAX_VALUE_LENGTH: usize = 253;
    /// Maximum value length of a vendor attribute (253 minus the 6-byte vendor header)
    pub const MAX_VENDOR_VALUE_LENGTH: usize = 247;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        check_length(value.len(), Self::MAX_VALUE_LENGTH)?;
        Ok(Attribute {
            vendor: None,
            attr_type,
            value,
        })
    }

    /// Create a string attribute
    pub fn string(attr_type: u8, value: impl Into<String>) -> Result<Self, PacketError> {
        Self::new(attr_type, value.into().into_bytes())
    }

    /// Create a Vendor-Specific attribute
    pub fn vendor_specific(vendor: u32, vendor_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        check_length(value.len(), Self::MAX_VENDOR_VALUE_LENGTH)?;
        Ok(Attribute {
            vendor: Some(vendor),
            attr_type: vendor_type,
            value,
        })
    }

    /// Create a Microsoft Vendor-Specific attribute
    pub fn microsoft(attr: MsAttributeType, value: Vec<u8>) -> Result<Self, PacketError> {
        Self::vendor_specific(VENDOR_MICROSOFT, attr.as_u8(), value)
    }

    /// Create a server-internal control attribute
    pub fn control(attr: ControlAttributeType, value: Vec<u8>) -> Result<Self, PacketError> {
        Self::vendor_specific(VENDOR_INTERNAL, attr.as_u8(), value)
    }

    /// Check whether this is the given standard attribute
    pub fn is(&self, attr_type: u8) -> bool {
        self.vendor.is_none() && self.attr_type == attr_type
    }

    /// Check whether this is the given Microsoft attribute
    pub fn is_microsoft(&self, attr: MsAttributeType) -> bool {
        self.vendor == Some(VENDOR_MICROSOFT) && self.attr_type == attr.as_u8()
    }

    pub fn is_control(&self, attr: ControlAttributeType) -> bool {
        self.vendor == Some(VENDOR_INTERNAL) && self.attr_type == attr.as_u8()
    }

    /// MS-MPPE key or encryption-policy attribute
    pub fn is_mppe_key(&self) -> bool {
        self.vendor == Some(VENDOR_MICROSOFT)
            && MsAttributeType::from_u8(self.attr_type).is_some_and(MsAttributeType::is_mppe_key)
    }

    /// Try to interpret value as a string
    pub fn as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.value.clone())
    }
}

fn check_length(len: usize, max: usize) -> Result<(), PacketError> {
    if len > max {
        return Err(PacketError::AttributeError(format!(
            "Attribute value too long: {} bytes (max {})",
            len, max
        )));
    }
    Ok(())
}

/// Remove and return the first Microsoft attribute of the given type
pub fn take_microsoft(attributes: &mut Vec<Attribute>, attr: MsAttributeType) -> Option<Attribute> {
    let index = attributes.iter().position(|a| a.is_microsoft(attr))?;
    Some(attributes.remove(index))
}

/// Split a reply into (MPPE key/policy attributes, everything else),
/// preserving the relative order of both halves.
pub fn split_mppe_keys(attributes: Vec<Attribute>) -> (Vec<Attribute>, Vec<Attribute>) {
    attributes.into_iter().partition(Attribute::is_mppe_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeType;

    #[test]
    fn test_string_attribute() {
        let attr = Attribute::string(AttributeType::UserName as u8, "testuser").unwrap();
        assert_eq!(attr.attr_type, 1);
        assert!(attr.vendor.is_none());
        assert_eq!(attr.as_string().unwrap(), "testuser");
    }

    #[test]
    fn test_max_value_length() {
        assert!(Attribute::new(1, vec![0u8; 254]).is_err());
        assert!(Attribute::microsoft(MsAttributeType::ChapNtEncPw, vec![0u8; 247]).is_ok());
        assert!(Attribute::microsoft(MsAttributeType::ChapNtEncPw, vec![0u8; 248]).is_err());
    }

    #[test]
    fn test_standard_type_does_not_match_vendor_type() {
        // MS-CHAP-Error shares its number with User-Password
        let attr = Attribute::microsoft(MsAttributeType::ChapError, b"xE=691".to_vec()).unwrap();
        assert!(!attr.is(2));
        assert!(attr.is_microsoft(MsAttributeType::ChapError));
    }

    #[test]
    fn test_control_attribute_is_not_microsoft() {
        let attr = Attribute::control(ControlAttributeType::ChapPeerChallenge, vec![0; 16]).unwrap();
        assert!(attr.is_control(ControlAttributeType::ChapPeerChallenge));
        assert!(!attr.is(1));
        assert!(!attr.is_mppe_key());
        assert_eq!(attr.vendor, Some(VENDOR_INTERNAL));
    }

    #[test]
    fn test_take_microsoft() {
        let mut attrs = vec![
            Attribute::string(AttributeType::ReplyMessage as u8, "hi").unwrap(),
            Attribute::microsoft(MsAttributeType::Chap2Success, b"\x01S=00".to_vec()).unwrap(),
        ];
        let success = take_microsoft(&mut attrs, MsAttributeType::Chap2Success).unwrap();
        assert_eq!(success.value, b"\x01S=00");
        assert_eq!(attrs.len(), 1);
        assert!(take_microsoft(&mut attrs, MsAttributeType::Chap2Success).is_none());
    }

    #[test]
    fn test_split_mppe_keys() {
        let attrs = vec![
            Attribute::microsoft(MsAttributeType::MppeSendKey, vec![1; 34]).unwrap(),
            Attribute::string(AttributeType::ReplyMessage as u8, "welcome").unwrap(),
            Attribute::microsoft(MsAttributeType::MppeRecvKey, vec![2; 34]).unwrap(),
            Attribute::microsoft(MsAttributeType::MppeEncryptionPolicy, vec![0, 0, 0, 1]).unwrap(),
            Attribute::microsoft(MsAttributeType::MppeEncryptionTypes, vec![0, 0, 0, 6]).unwrap(),
            // Vendor 9 type 16 is not an MPPE key
            Attribute::vendor_specific(9, 16, vec![3]).unwrap(),
        ];

        let (keys, rest) = split_mppe_keys(attrs);
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(Attribute::is_mppe_key));
        assert_eq!(keys[0].attr_type, 16);
        assert_eq!(keys[1].attr_type, 17);
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|a| !a.is_mppe_key()));
    }
}
