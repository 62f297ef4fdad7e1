use serde::{Deserialize, Serialize};

use crate::flag_value::FlagValue;
use crate::util::is_false;

/// One of the values a flag can resolve to.
///
/// A flag marks exactly one variant as its default when enabled and one as its default when
/// disabled. The same variant may carry both markers.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: FlagValue,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_when_on: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_when_off: bool,
}

impl Variant {
    pub fn new(id: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Variant {
            id: id.into(),
            description: None,
            value: value.into(),
            default_when_on: false,
            default_when_off: false,
        }
    }

    pub fn when_on(mut self) -> Self {
        self.default_when_on = true;
        self
    }

    pub fn when_off(mut self) -> Self {
        self.default_when_off = true;
        self
    }
}
