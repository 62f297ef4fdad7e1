use std::thread;

use serde::Deserialize;

/// Tunables of a [crate::FlagEvaluator].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    /// Upper bound on the worker threads used by [crate::FlagEvaluator::evaluate_all].
    pub max_workers: usize,
    /// Run [crate::Flag::validate] before evaluating each flag.
    pub validate_flags: bool,
}

impl EvaluatorConfig {
    pub(crate) fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            max_workers: thread::available_parallelism().map_or(1, |n| n.get()),
            validate_flags: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn config_parse() {
        let config: EvaluatorConfig =
            serde_json::from_str(r#"{"maxWorkers": 4, "validateFlags": true}"#).unwrap();
        assert_that!(config).is_equal_to(EvaluatorConfig {
            max_workers: 4,
            validate_flags: true,
        });

        let partial: EvaluatorConfig = serde_json::from_str(r#"{"validateFlags": true}"#).unwrap();
        assert_that!(partial.max_workers).is_equal_to(EvaluatorConfig::default().max_workers);
    }

    #[test]
    fn at_least_one_worker() {
        let config = EvaluatorConfig {
            max_workers: 0,
            ..EvaluatorConfig::default()
        };
        assert_that!(config.workers()).is_equal_to(1);
    }
}
