use std::panic;
use std::sync::Arc;
use std::thread;

use log::{debug, error};

use crate::config::EvaluatorConfig;
use crate::error::Error;
use crate::eval::evaluate;
use crate::evaluation::Evaluation;
use crate::flag::Flag;
use crate::request::EvaluationRequest;
use crate::segment::Segment;
use crate::store::Store;

/// Evaluates flags from a [Store] for incoming requests.
pub struct FlagEvaluator<S> {
    store: S,
    config: EvaluatorConfig,
}

impl<S: Store> FlagEvaluator<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EvaluatorConfig::default())
    }

    pub fn with_config(store: S, config: EvaluatorConfig) -> Self {
        FlagEvaluator { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Evaluates the flag with key `flag_key`.
    ///
    /// Lookup, validation and evaluation failures are all returned as errors. Only
    /// [FlagEvaluator::evaluate_all] records failures on the evaluations themselves.
    pub fn evaluate(
        &self,
        flag_key: &str,
        request: &EvaluationRequest,
    ) -> Result<Evaluation, Error> {
        let mut flag = self.store.find_flag_by_key(flag_key)?;
        let segments = self.segments()?;
        evaluate_flag(
            &mut flag,
            &segments,
            request,
            &request.hash(),
            self.config.validate_flags,
        )
    }

    /// Evaluates every flag in the store, spreading the work over at most
    /// [EvaluatorConfig::max_workers] threads. The result keeps the store's flag order, and a
    /// failing flag does not affect the others.
    pub fn evaluate_all(&self, request: &EvaluationRequest) -> Result<Vec<Evaluation>, Error> {
        let mut flags = self.store.find_all_flags()?;
        if flags.is_empty() {
            return Ok(Vec::new());
        }
        let segments = self.segments()?;
        let hash = request.hash();
        let validate = self.config.validate_flags;

        let workers = self.config.workers().min(flags.len());
        let chunk_size = (flags.len() + workers - 1) / workers;
        debug!("evaluating {} flags on {} workers", flags.len(), workers);

        let (segments, hash) = (&segments, &hash);
        thread::scope(|scope| {
            let handles: Vec<_> = flags
                .chunks_mut(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter_mut()
                            .map(|flag| evaluate_entry(flag, segments, request, hash, validate))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut evaluations = Vec::with_capacity(handles.len() * chunk_size);
            for handle in handles {
                match handle.join() {
                    Ok(chunk) => evaluations.extend(chunk),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            Ok(evaluations)
        })
    }

    fn segments(&self) -> Result<Vec<Arc<Segment>>, Error> {
        Ok(self
            .store
            .find_all_segments()?
            .into_iter()
            .map(Arc::new)
            .collect())
    }
}

fn evaluate_flag(
    flag: &mut Flag,
    segments: &[Arc<Segment>],
    request: &EvaluationRequest,
    request_hash: &str,
    validate: bool,
) -> Result<Evaluation, Error> {
    flag.populate(segments);
    if validate {
        flag.validate()?;
    }
    let outcome = evaluate(&request.context, &*flag)?;
    Ok(Evaluation::from_outcome(flag, request_hash, &outcome, request.is_debug()))
}

// Failures are recorded on the entry so that sibling flags still get evaluated.
fn evaluate_entry(
    flag: &mut Flag,
    segments: &[Arc<Segment>],
    request: &EvaluationRequest,
    request_hash: &str,
    validate: bool,
) -> Evaluation {
    match evaluate_flag(flag, segments, request, request_hash, validate) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            error!("failed to evaluate flag {}: {}", flag.key, e);
            Evaluation::from_error(flag, request_hash, e)
        }
    }
}
