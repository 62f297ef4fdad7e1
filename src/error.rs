use serde::Serialize;
use thiserror::Error as ThisError;

/// Error is returned when a flag could not be evaluated, and describes why.
///
/// Configuration errors ([Error::NoDefaultVariant], [Error::NoVariantToDistribute],
/// [Error::InvalidNetwork], [Error::InvalidFlag]) are user-actionable: the flag or segment data
/// needs fixing. They are never replaced by a guessed answer.
#[derive(Clone, Debug, PartialEq, Serialize, ThisError)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Error {
    /// NoDefaultVariant indicates the flag has no variant marked as the default for its current
    /// on/off state.
    #[error("no default variant defined for flag")]
    NoDefaultVariant,
    /// NoVariantToDistribute indicates a rule matched but its distribution list was empty or
    /// its first entry did not reference a usable variant.
    #[error("no variants to distribute, please check the rule configuration")]
    NoVariantToDistribute,
    /// InvalidNetwork indicates a network constraint was configured with a malformed CIDR block.
    #[error("invalid network `{cidr}` in constraint")]
    InvalidNetwork {
        /// The reference value that failed to parse.
        cidr: String,
    },
    /// InvalidFlag indicates the flag or segment failed configuration validation.
    #[error("invalid flag: {reason}")]
    InvalidFlag {
        /// A description of the failed check.
        reason: String,
    },
    /// FlagNotFound indicates the store has no flag with the requested key.
    #[error("flag `{key}` not found")]
    FlagNotFound {
        /// The requested flag key.
        key: String,
    },
    /// Store indicates the flag store failed to answer a lookup.
    #[error("store error: {message}")]
    Store {
        /// The message reported by the store.
        message: String,
    },
}

impl Error {
    /// Returns a stable code for the error, so clients of a transport can recognise it without
    /// parsing the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoDefaultVariant => "NoDefaultVariant",
            Error::NoVariantToDistribute => "NoVariantToDistribute",
            Error::InvalidNetwork { .. } => "InvalidNetwork",
            Error::InvalidFlag { .. } => "InvalidFlag",
            Error::FlagNotFound { .. } => "NotFound",
            Error::Store { .. } => "StoreError",
        }
    }

    /// Returns true for errors caused by broken flag or segment configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::NoDefaultVariant
                | Error::NoVariantToDistribute
                | Error::InvalidNetwork { .. }
                | Error::InvalidFlag { .. }
        )
    }

    pub(crate) fn invalid_flag(reason: impl Into<String>) -> Self {
        Error::InvalidFlag {
            reason: reason.into(),
        }
    }
}
