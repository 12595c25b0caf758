//! The fixpoint driver.
//!
//! One external request is resolved as a sequence of rounds over its own
//! invocation log. Each round has two phases. First every sync is matched
//! (`when`) and extended (`where`) concurrently against a snapshot of the
//! log and of concept state. Then the surviving frames are dispatched
//! (`then`). No `then` action runs until every `where` clause of the round
//! has finished. The round is a barrier. Its results are appended in
//! registry order, then frame order, then `then` order, and only then does
//! the next round start. A round that appends nothing means the request is
//! quiescent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use concord_core::{ConceptRegistry, Fields, InvocationLog, InvocationRecord, Outcome, Value};
use futures::future::join_all;

use crate::dispatch::{Invocation, dispatch_frame};
use crate::error::{DispatchError, EngineError, RegistryError, ResponseError};
use crate::frame::{Frames, QueryContext};
use crate::matcher::match_frontier;
use crate::registry::SyncRegistry;
use crate::sync::Synchronization;

/// Concept and operations that carry external requests and responses.
pub const REQUESTING: &str = "Requesting";
pub const REQUEST: &str = "request";
pub const RESPOND: &str = "respond";

/// Per-request resource bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_rounds: u32,
    pub max_log_len: usize,
    pub request_timeout: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_rounds: 32,
            max_log_len: 4096,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Cooperative cancellation signal, checked between rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The first record of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub concept: String,
    pub action: String,
    pub input: Fields,
    pub output: Fields,
}

impl Seed {
    /// An external request for `path` (e.g. `/Profile/updateName`).
    ///
    /// The input is the body plus `path`; `path` wins over a body field of
    /// the same name. The output carries a fresh request id.
    pub fn request(path: &str, body: Fields) -> Self {
        let mut input = body;
        input.insert("path".into(), Value::String(path.to_string()));
        let mut output = Fields::new();
        output.insert(
            REQUEST.into(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        Self {
            concept: REQUESTING.into(),
            action: REQUEST.into(),
            input,
            output,
        }
    }

    /// An action that has already run, so syncs can react to it.
    pub fn action(
        concept: impl Into<String>,
        action: impl Into<String>,
        input: Fields,
        outcome: Outcome,
    ) -> Self {
        Self {
            concept: concept.into(),
            action: action.into(),
            input,
            output: outcome.into_fields(),
        }
    }
}

/// The quiescent log of one request.
#[derive(Debug, Clone)]
pub struct Resolution {
    log: InvocationLog,
    rounds: u32,
}

impl Resolution {
    pub fn log(&self) -> &InvocationLog {
        &self.log
    }

    pub fn into_log(self) -> InvocationLog {
        self.log
    }

    /// Rounds run, including the final empty one.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Id assigned to the seed request, if the seed was a request.
    pub fn request_id(&self) -> Option<&str> {
        self.log
            .get(0)
            .filter(|r| r.is(REQUESTING, REQUEST))
            .and_then(|r| r.output.get(REQUEST))
            .and_then(Value::as_str)
    }

    pub fn responses(&self) -> Vec<&InvocationRecord> {
        self.log.find(REQUESTING, RESPOND).collect()
    }

    /// The single response body: the respond input without `request`.
    pub fn response(&self) -> Result<Fields, ResponseError> {
        match self.responses().as_slice() {
            [] => Err(ResponseError::NoResponse),
            [only] => {
                let mut body = only.input.clone();
                body.remove(REQUEST);
                Ok(body)
            }
            many => Err(ResponseError::Multiple(many.len())),
        }
    }

    /// Every logged call to `concept.action`.
    pub fn invocations<'a>(&'a self, concept: &'a str, action: &'a str) -> Vec<&'a InvocationRecord> {
        self.log.find(concept, action).collect()
    }
}

/// Resolves requests against a sync registry and a set of concepts.
#[derive(Clone)]
pub struct SyncEngine {
    syncs: SyncRegistry,
    concepts: Arc<ConceptRegistry>,
    limits: EngineLimits,
}

impl SyncEngine {
    /// Create an engine. Fails if any sync names an unknown operation.
    pub fn new(
        syncs: SyncRegistry,
        concepts: Arc<ConceptRegistry>,
        limits: EngineLimits,
    ) -> Result<Self, RegistryError> {
        syncs.validate_against(&concepts)?;
        Ok(Self {
            syncs,
            concepts,
            limits,
        })
    }

    pub fn syncs(&self) -> &SyncRegistry {
        &self.syncs
    }

    pub fn concepts(&self) -> &Arc<ConceptRegistry> {
        &self.concepts
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    pub async fn resolve(&self, seed: Seed) -> Result<Resolution, EngineError> {
        self.resolve_with_cancel(seed, &CancelFlag::new()).await
    }

    /// Run rounds until quiescence, a limit, or cancellation.
    ///
    /// Cancellation is observed between rounds; actions already dispatched
    /// in the current round are not rolled back.
    pub async fn resolve_with_cancel(
        &self,
        seed: Seed,
        cancel: &CancelFlag,
    ) -> Result<Resolution, EngineError> {
        let started = Instant::now();
        let original_input = Arc::new(seed.input.clone());
        let route = match seed.input.get("path").and_then(Value::as_str) {
            Some(path) => path.to_string(),
            None => format!("/{}/{}", seed.concept, seed.action),
        };

        let mut log = InvocationLog::new();
        log.append(seed.concept, seed.action, seed.input, seed.output);

        let ctx = QueryContext::new(Arc::clone(&self.concepts));
        let mut frontier = 0;
        let mut rounds = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(%route, rounds, "Request cancelled");
                return Err(EngineError::Cancelled);
            }
            if started.elapsed() > self.limits.request_timeout {
                tracing::error!(%route, rounds, "Request timed out");
                return Err(EngineError::Timeout {
                    limit_ms: self.limits.request_timeout.as_millis() as u64,
                });
            }
            if rounds >= self.limits.max_rounds {
                tracing::error!(%route, rounds, "Request did not reach quiescence");
                return Err(EngineError::NonTermination { rounds });
            }
            rounds += 1;

            // Every where clause reads concept state before any then runs.
            let records = log.records();
            let selections = self
                .syncs
                .iter()
                .map(|sync| self.select(sync, &ctx, records, &original_input, frontier));
            let mut firing = Vec::new();
            for (sync, frames) in self.syncs.iter().zip(join_all(selections).await) {
                let frames = frames?;
                if !frames.is_empty() {
                    firing.push((sync, frames));
                }
            }

            let dispatches = firing
                .iter()
                .map(|(sync, frames)| self.dispatch(sync, frames));
            let results = join_all(dispatches).await;

            let round_start = log.next_seq();
            for invocations in results {
                for invocation in invocations? {
                    if log.len() >= self.limits.max_log_len {
                        tracing::error!(%route, len = log.len(), "Invocation log overflow");
                        return Err(EngineError::LogOverflow {
                            limit: self.limits.max_log_len,
                        });
                    }
                    log.append(
                        invocation.concept,
                        invocation.action,
                        invocation.input,
                        invocation.output,
                    );
                }
            }

            let appended = log.next_seq() - round_start;
            tracing::debug!(%route, round = rounds, appended, "Round complete");
            if appended == 0 {
                tracing::info!(
                    %route,
                    rounds,
                    records = log.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request quiescent"
                );
                return Ok(Resolution { log, rounds });
            }
            frontier = round_start;
        }
    }

    /// Match and extend one sync against the log as it stood when the
    /// round began. Returns the frames that will fire.
    async fn select(
        &self,
        sync: &Synchronization,
        ctx: &QueryContext,
        records: &[InvocationRecord],
        original_input: &Arc<Fields>,
        frontier: u64,
    ) -> Result<Frames, EngineError> {
        let frames = match_frontier(
            sync.when(),
            records,
            sync.var_count(),
            original_input,
            frontier,
        );
        if frames.is_empty() {
            return Ok(frames);
        }

        let matched = frames.len();
        let frames = sync
            .extend(ctx.clone(), frames)
            .await
            .map_err(|source| {
                tracing::error!(sync = sync.name(), error = %source, "Where clause failed");
                EngineError::Extend {
                    sync: sync.name().to_string(),
                    source,
                }
            })?;
        if frames.is_empty() {
            tracing::debug!(sync = sync.name(), matched, "All frames vetoed");
            return Ok(frames);
        }

        for frame in &frames {
            if let Some(var) = sync.where_binds().iter().find(|v| !frame.is_bound(**v)) {
                return Err(EngineError::Dispatch {
                    sync: sync.name().to_string(),
                    var: sync.var_name(*var).to_string(),
                });
            }
        }

        tracing::debug!(sync = sync.name(), matched, firing = frames.len(), "Sync fired");
        Ok(frames)
    }

    /// Run a sync's `then` patterns for each selected frame.
    async fn dispatch(
        &self,
        sync: &Synchronization,
        frames: &Frames,
    ) -> Result<Vec<Invocation>, EngineError> {
        let dispatches = frames
            .iter()
            .map(|frame| dispatch_frame(&self.concepts, sync.then(), frame));
        let mut invocations = Vec::new();
        for result in join_all(dispatches).await {
            match result {
                Ok(batch) => invocations.extend(batch),
                Err(DispatchError::Unbound { var }) => {
                    return Err(EngineError::Dispatch {
                        sync: sync.name().to_string(),
                        var: sync.var_name(var).to_string(),
                    });
                }
                Err(DispatchError::Concept(source)) => {
                    tracing::error!(sync = sync.name(), error = %source, "Dispatch failed");
                    return Err(EngineError::Concept {
                        sync: sync.name().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(invocations)
    }
}
