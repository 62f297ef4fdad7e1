use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::error::Error;
use crate::eval::{Outcome, Trace};
use crate::flag::Flag;
use crate::flag_value::FlagValue;

/// The record of one flag evaluated for one request.
///
/// Only the flag key, the answer or error, and the optional trace are serialized. The flag id,
/// version and request hash identify what the record was computed from, see
/// [Evaluation::is_stale].
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(skip)]
    pub flag_id: String,
    #[serde(skip)]
    pub flag_version: u64,
    #[serde(skip)]
    pub request_hash: String,
    pub flag_key: String,
    pub value: Option<FlagValue>,
    pub error: Option<Error>,
    pub stack_trace: Option<Vec<Trace>>,
}

impl Evaluation {
    fn for_flag(flag: &Flag, request_hash: &str) -> Self {
        Evaluation {
            flag_id: flag.id.clone(),
            flag_version: flag.version,
            request_hash: request_hash.to_string(),
            flag_key: flag.key.clone(),
            ..Evaluation::default()
        }
    }

    /// Builds the record from a walk of `flag`. The trace is kept only when `debug` is set.
    pub fn from_outcome(flag: &Flag, request_hash: &str, outcome: &Outcome, debug: bool) -> Self {
        Evaluation {
            value: outcome.answer.cloned(),
            stack_trace: debug.then(|| outcome.stack()),
            ..Evaluation::for_flag(flag, request_hash)
        }
    }

    pub fn from_error(flag: &Flag, request_hash: &str, error: Error) -> Self {
        Evaluation {
            error: Some(error),
            ..Evaluation::for_flag(flag, request_hash)
        }
    }

    /// A cached evaluation is stale once the flag changed version or identity, or the request
    /// attributes no longer hash the same.
    pub fn is_stale(&self, flag: &Flag, request_hash: &str) -> bool {
        self.flag_id != flag.id
            || self.flag_version != flag.version
            || self.request_hash != request_hash
    }
}
