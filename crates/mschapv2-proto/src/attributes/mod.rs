//! RADIUS attributes as seen by the EAP-MSCHAPv2 method.

mod attribute;
mod types;

pub use attribute::{split_mppe_keys, take_microsoft, Attribute};
pub use types::{AttributeType, ControlAttributeType, MsAttributeType, VENDOR_INTERNAL, VENDOR_MICROSOFT};
