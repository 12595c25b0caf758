//! The `then` dispatcher.

use concord_core::{ConceptRegistry, Fields};

use crate::error::DispatchError;
use crate::frame::Frame;
use crate::pattern::{Pattern, Term};

/// A completed concept call, ready to append to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub concept: String,
    pub action: String,
    pub input: Fields,
    pub output: Fields,
}

/// Substitute a frame's bindings into a pattern's input template.
pub fn instantiate(pattern: &Pattern, frame: &Frame) -> Result<Fields, DispatchError> {
    let mut input = Fields::new();
    for (key, term) in pattern.input_terms() {
        let value = match term {
            Term::Var(var) => frame.get(*var).ok_or(DispatchError::Unbound { var: *var })?,
            Term::Lit(value) => value,
        };
        input.insert(key.clone(), value.clone());
    }
    Ok(input)
}

/// Invoke every `then` pattern for one frame, in declared order.
///
/// Actions record their outcome fields; queries record `{ "result": value }`.
pub async fn dispatch_frame(
    concepts: &ConceptRegistry,
    then: &[Pattern],
    frame: &Frame,
) -> Result<Vec<Invocation>, DispatchError> {
    let mut invocations = Vec::with_capacity(then.len());
    for pattern in then {
        let input = instantiate(pattern, frame)?;
        let output = concepts
            .invoke(pattern.concept(), pattern.action(), &input)
            .await?;
        tracing::debug!(
            concept = pattern.concept(),
            action = pattern.action(),
            error = output.contains_key("error"),
            "Dispatched"
        );
        invocations.push(Invocation {
            concept: pattern.concept().to_string(),
            action: pattern.action().to_string(),
            input,
            output,
        });
    }
    Ok(invocations)
}
