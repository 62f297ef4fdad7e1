use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::attribute_value::{AttributeValue, Attributes};

/// Reserved attribute holding the requesting user's id.
pub const USER_ID_ATTRIBUTE: &str = "$userId";
/// Reserved attribute holding the requesting client's address.
pub const IP_ATTRIBUTE: &str = "$ip";

/// An evaluation request: who is asking, and the attributes to evaluate against.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub context: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl EvaluationRequest {
    pub fn new(user_id: impl Into<String>, context: Attributes) -> Self {
        EvaluationRequest {
            user_id: user_id.into(),
            context,
            debug: None,
        }
    }

    /// Copies the user id and, when known, the client address into the reserved attributes so
    /// that constraints can target them.
    pub fn bind(&mut self, remote_addr: Option<&str>) {
        self.context.insert(USER_ID_ATTRIBUTE, self.user_id.as_str());
        if let Some(addr) = remote_addr {
            self.context.insert(IP_ATTRIBUTE, addr);
        }
    }

    /// Whether evaluations of this request should carry their trace.
    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// A digest of the attribute set, independent of insertion order. Two requests with equal
    /// attributes hash equally; the value type takes part, so `1` and `"1"` differ.
    pub fn hash(&self) -> String {
        let mut hash = Sha1::new();
        for (name, value) in self.context.iter().sorted_by_key(|(name, _)| *name) {
            write_bytes(&mut hash, name.as_bytes());
            write_value(&mut hash, value);
        }
        base16ct::lower::encode_string(&hash.finalize())
    }
}

fn write_bytes(hash: &mut Sha1, bytes: &[u8]) {
    hash.update((bytes.len() as u64).to_be_bytes());
    hash.update(bytes);
}

fn write_value(hash: &mut Sha1, value: &AttributeValue) {
    match value {
        AttributeValue::Bool(b) => hash.update([b'b', *b as u8]),
        AttributeValue::Int(i) => {
            hash.update([b'i']);
            hash.update(i.to_be_bytes());
        }
        AttributeValue::UInt(u) => {
            hash.update([b'u']);
            hash.update(u.to_be_bytes());
        }
        AttributeValue::Float(f) => {
            hash.update([b'f']);
            hash.update(f.to_bits().to_be_bytes());
        }
        AttributeValue::String(s) => {
            hash.update([b's']);
            write_bytes(hash, s.as_bytes());
        }
        AttributeValue::Bytes(bytes) => {
            hash.update([b'y']);
            write_bytes(hash, bytes);
        }
    }
}
