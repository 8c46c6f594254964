use super::Code;
use crate::attributes::{Attribute, MsAttributeType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Attribute error: {0}")]
    AttributeError(String),
}

/// RADIUS packet as handed over by the outer transport.
///
/// Only the parts the EAP method looks at are modelled: the code, the
/// identifier and the attribute list. Authenticators and wire encoding
/// belong to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet type (1 byte)
    pub code: Code,
    /// Packet identifier for matching requests/responses (1 byte)
    pub identifier: u8,
    /// List of attributes
    pub attributes: Vec<Attribute>,
}

impl Packet {
    pub fn new(code: Code, identifier: u8) -> Self {
        Packet {
            code,
            identifier,
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn extend_attributes(&mut self, attributes: impl IntoIterator<Item = Attribute>) {
        self.attributes.extend(attributes);
    }

    /// Find the first standard attribute of the given type
    pub fn find_attribute(&self, attr_type: u8) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(attr_type))
    }

    /// Find all standard attributes of the given type, in order
    pub fn find_all_attributes(&self, attr_type: u8) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.is(attr_type))
    }

    /// Find the first Microsoft Vendor-Specific attribute of the given type
    pub fn find_microsoft(&self, attr: MsAttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is_microsoft(attr))
    }
}
