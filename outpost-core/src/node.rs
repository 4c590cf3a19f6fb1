//! Node identity types.
//!
//! [`NodeIdentity`] is built once from configuration at startup and never
//! mutated afterwards. It is the registration payload sent to the Registry
//! and the public face of the status endpoint.

use serde::{Deserialize, Serialize};

/// Tag the Registry uses to classify self-registered community nodes.
pub const COMMUNITY_TAG: &str = "Community";

/// Contact details for the people operating this node.
///
/// All fields are free-form strings; empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Operator name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Zalo handle.
    pub zalo: String,
    /// Email address.
    pub email: String,
    /// Facebook profile or page.
    pub facebook: String,
}

/// The identity this node registers with the Registry.
///
/// Registration is idempotent: repeated sends update the Registry record
/// keyed by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Human-readable node name shown in node listings.
    pub name: String,
    /// Public base URL clients use to reach this node.
    pub url: String,
    /// Node classification tag; always [`COMMUNITY_TAG`] for this binary.
    pub tag: String,
    /// Operator contact details.
    pub contact: ContactInfo,
}

impl NodeIdentity {
    /// Creates a community node identity.
    pub fn new(name: impl Into<String>, url: impl Into<String>, contact: ContactInfo) -> Self {
        NodeIdentity {
            name: name.into(),
            url: url.into(),
            tag: COMMUNITY_TAG.to_owned(),
            contact,
        }
    }
}
