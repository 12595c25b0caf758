//! Frames: candidate variable bindings flowing through one sync evaluation.
//!
//! A [`Frame`] is one consistent assignment of a sync's variables. Frames are
//! only ever created by the matcher, so a `where` clause can keep, drop, or
//! extend them but never fabricate bindings or rebind a variable to a new
//! value.

use std::sync::Arc;

use futures::future::try_join_all;
use concord_core::{ConceptError, ConceptRegistry, Fields, Value};

use crate::error::{ExtendError, FrameError};
use crate::pattern::{Term, Var};

static NULL: Value = Value::Null;

/// One binding candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    bindings: Vec<Option<Value>>,
    provenance: Vec<u64>,
    original_input: Arc<Fields>,
}

impl Frame {
    pub(crate) fn empty(var_count: usize, original_input: Arc<Fields>) -> Self {
        Self {
            bindings: vec![None; var_count],
            provenance: Vec::new(),
            original_input,
        }
    }

    /// The value bound to `var`, if any.
    pub fn get(&self, var: Var) -> Option<&Value> {
        self.bindings.get(var.index()).and_then(Option::as_ref)
    }

    /// The value bound to `var`, or `Null` when unbound.
    pub fn value(&self, var: Var) -> &Value {
        self.get(var).unwrap_or(&NULL)
    }

    /// The bound value as a string slice, when it is one.
    pub fn str(&self, var: Var) -> Option<&str> {
        self.get(var).and_then(Value::as_str)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.get(var).is_some()
    }

    /// Bind `var`. Rebinding to the same value is a no-op; rebinding to a
    /// different value is a conflict.
    pub fn bind(&mut self, var: Var, value: Value) -> Result<(), FrameError> {
        let slot = self
            .bindings
            .get_mut(var.index())
            .ok_or(FrameError::UnknownVariable { var })?;
        if let Some(existing) = slot.as_ref() {
            return if *existing == value {
                Ok(())
            } else {
                Err(FrameError::Conflict { var })
            };
        }
        *slot = Some(value);
        Ok(())
    }

    /// Consume and return the frame with `var` bound.
    pub fn with(mut self, var: Var, value: Value) -> Result<Frame, FrameError> {
        self.bind(var, value)?;
        Ok(self)
    }

    /// A copy of this frame with `var` bound.
    pub fn extended(&self, var: Var, value: Value) -> Result<Frame, FrameError> {
        self.clone().with(var, value)
    }

    /// Sequence numbers of the records matched by each `when` pattern.
    pub fn provenance(&self) -> &[u64] {
        &self.provenance
    }

    /// The full input map of the request that seeded this resolution.
    pub fn original_input(&self) -> &Fields {
        &self.original_input
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.iter().filter(|b| b.is_some()).count()
    }

    pub(crate) fn record_match(&mut self, seq: u64) {
        self.provenance.push(seq);
    }

    fn resolve_args(&self, args: &[(&str, Term)]) -> Result<Fields, ExtendError> {
        let mut input = Fields::new();
        for (key, term) in args {
            let value = match term {
                Term::Var(var) => self.get(*var).ok_or(ExtendError::Unbound { var: *var })?,
                Term::Lit(value) => value,
            };
            input.insert((*key).to_string(), value.clone());
        }
        Ok(input)
    }
}

/// Handle `where` clauses use to read concept state.
#[derive(Clone)]
pub struct QueryContext {
    concepts: Arc<ConceptRegistry>,
}

impl QueryContext {
    pub fn new(concepts: Arc<ConceptRegistry>) -> Self {
        Self { concepts }
    }

    pub async fn query(&self, concept: &str, query: &str, input: &Fields) -> Result<Value, ConceptError> {
        self.concepts.query(concept, query, input).await
    }

    pub fn concepts(&self) -> &ConceptRegistry {
        &self.concepts
    }
}

/// How a query result is turned into a binding.
#[derive(Clone, Copy)]
enum Bind<'a> {
    /// Bind the whole value; `Null` drops the frame.
    Value,
    /// Bind the whole value; `Null` is bound too.
    OrNull,
    /// Bind one field of an object result; absent drops the frame.
    Field(&'a str),
    /// Bind the result as is. Arrays do not widen.
    Raw,
}

/// An ordered set of candidate frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frames {
    frames: Vec<Frame>,
}

impl Frames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Keep frames satisfying `keep`.
    pub fn filter(mut self, keep: impl FnMut(&Frame) -> bool) -> Self {
        self.frames.retain(keep);
        self
    }

    pub fn retain(&mut self, keep: impl FnMut(&Frame) -> bool) {
        self.frames.retain(keep);
    }

    /// Bind `var` in every frame to a value computed from the frame.
    pub fn map_bind(self, var: Var, f: impl Fn(&Frame) -> Value) -> Result<Self, FrameError> {
        self.frames
            .into_iter()
            .map(|frame| {
                let value = f(&frame);
                frame.with(var, value)
            })
            .collect()
    }

    /// Order-independent equality on bindings.
    pub fn equivalent(&self, other: &Frames) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut used = vec![false; other.len()];
        self.frames.iter().all(|frame| {
            let found = other
                .frames
                .iter()
                .enumerate()
                .position(|(i, candidate)| !used[i] && candidate.bindings == frame.bindings);
            match found {
                Some(i) => {
                    used[i] = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Run `concept.query` once per frame and bind the result to `out`.
    ///
    /// `Null` drops the frame. An array widens it into one frame per element.
    /// A frame whose `out` is already bound to a different value is dropped.
    pub async fn query(
        self,
        ctx: &QueryContext,
        concept: &str,
        query: &str,
        args: &[(&str, Term)],
        out: Var,
    ) -> Result<Frames, ExtendError> {
        self.query_with(ctx, concept, query, args, out, Bind::Value).await
    }

    /// As [`query`](Self::query), but binds `result[field]`. Frames whose
    /// result lacks the field are dropped.
    pub async fn query_field(
        self,
        ctx: &QueryContext,
        concept: &str,
        query: &str,
        args: &[(&str, Term)],
        field: &str,
        out: Var,
    ) -> Result<Frames, ExtendError> {
        self.query_with(ctx, concept, query, args, out, Bind::Field(field)).await
    }

    /// As [`query`](Self::query), but a `Null` result is bound instead of
    /// dropping the frame. Sentinel syncs filter on the bound `Null`.
    pub async fn query_or_null(
        self,
        ctx: &QueryContext,
        concept: &str,
        query: &str,
        args: &[(&str, Term)],
        out: Var,
    ) -> Result<Frames, ExtendError> {
        self.query_with(ctx, concept, query, args, out, Bind::OrNull).await
    }

    /// Bind the query result to `out` unchanged, arrays and `Null`
    /// included. List responses use this so an empty list still responds.
    pub async fn query_value(
        self,
        ctx: &QueryContext,
        concept: &str,
        query: &str,
        args: &[(&str, Term)],
        out: Var,
    ) -> Result<Frames, ExtendError> {
        self.query_with(ctx, concept, query, args, out, Bind::Raw).await
    }

    async fn query_with(
        self,
        ctx: &QueryContext,
        concept: &str,
        query: &str,
        args: &[(&str, Term)],
        out: Var,
        bind: Bind<'_>,
    ) -> Result<Frames, ExtendError> {
        let lookups = self.frames.into_iter().map(|frame| async move {
            let input = frame.resolve_args(args)?;
            let result = ctx.query(concept, query, &input).await?;
            Ok::<_, ExtendError>(expand(frame, result, out, bind))
        });
        let expanded = try_join_all(lookups).await?;
        Ok(expanded.into_iter().flatten().collect())
    }
}

fn expand(frame: Frame, result: Value, out: Var, bind: Bind<'_>) -> Vec<Frame> {
    let project = |value: Value| -> Option<Value> {
        match bind {
            Bind::Value => (!value.is_null()).then_some(value),
            Bind::OrNull | Bind::Raw => Some(value),
            Bind::Field(field) => match value {
                Value::Object(mut map) => map.remove(field),
                _ => None,
            },
        }
    };

    let candidates = match (result, bind) {
        (raw, Bind::Raw) => vec![raw],
        (Value::Array(items), _) => items.into_iter().filter_map(project).collect(),
        (other, _) => project(other).into_iter().collect::<Vec<_>>(),
    };

    candidates
        .into_iter()
        .filter_map(|value| frame.extended(out, value).ok())
        .collect()
}

impl FromIterator<Frame> for Frames {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Frames {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Frames {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
