//! Patterns, terms, and sync-scoped variables.
//!
//! A [`Pattern`] names a concept operation and carries input and output
//! templates. Each template entry maps a field name to a [`Term`]: either a
//! literal the field must equal, or a [`Var`] that binds on first sight and
//! constrains on every later sight.

use std::fmt;

use concord_core::{InvocationRecord, Value};

use crate::frame::Frame;

/// A variable symbol scoped to one sync.
///
/// Allocated by `SyncBuilder::var`. The owner tag identifies the builder that
/// created it, so a variable smuggled into another sync is caught at build
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    pub(crate) owner: u32,
    pub(crate) index: u16,
}

impl Var {
    /// Slot of this variable in a frame.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.index)
    }
}

/// One template entry: a variable or a literal constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(Var),
    Lit(Value),
}

impl Term {
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Term::Var(v) => Some(*v),
            Term::Lit(_) => None,
        }
    }

    /// Resolve against a frame. `None` means an unbound variable.
    pub fn resolve<'a>(&'a self, frame: &'a Frame) -> Option<&'a Value> {
        match self {
            Term::Var(v) => frame.get(*v),
            Term::Lit(value) => Some(value),
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Lit(Value::String(s.to_string()))
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Lit(Value::String(s))
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Lit(Value::Bool(b))
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Lit(Value::from(n))
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Lit(v)
    }
}

/// A partially specified invocation shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    concept: String,
    action: String,
    input: Vec<(String, Term)>,
    output: Vec<(String, Term)>,
    absent: Vec<String>,
}

impl Pattern {
    pub fn new(concept: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            action: action.into(),
            input: Vec::new(),
            output: Vec::new(),
            absent: Vec::new(),
        }
    }

    /// Add an input template entry.
    pub fn input(mut self, key: impl Into<String>, term: impl Into<Term>) -> Self {
        self.input.push((key.into(), term.into()));
        self
    }

    /// Add an output template entry.
    pub fn output(mut self, key: impl Into<String>, term: impl Into<Term>) -> Self {
        self.output.push((key.into(), term.into()));
        self
    }

    /// Require the record's output to lack `key`.
    ///
    /// Actions that succeed with `{}` are told apart from their `{error}`
    /// refusals this way.
    pub fn without(mut self, key: impl Into<String>) -> Self {
        self.absent.push(key.into());
        self
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn input_terms(&self) -> &[(String, Term)] {
        &self.input
    }

    pub fn output_terms(&self) -> &[(String, Term)] {
        &self.output
    }

    pub fn absent_keys(&self) -> &[String] {
        &self.absent
    }

    /// Every variable mentioned by either template, in template order.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.input
            .iter()
            .chain(&self.output)
            .filter_map(|(_, term)| term.as_var())
    }

    /// Unify this pattern with a record under the bindings of `frame`.
    ///
    /// Returns the frame extended with any newly bound variables and with
    /// the record's sequence number appended to its provenance, or `None`
    /// if the record does not fit. Every template key must be present in
    /// the record; keys the template does not name are ignored.
    pub(crate) fn unify(&self, record: &InvocationRecord, frame: &Frame) -> Option<Frame> {
        if !record.is(&self.concept, &self.action)
            || self.absent.iter().any(|key| record.output.contains_key(key))
        {
            return None;
        }

        let mut next = frame.clone();
        let sides = [(&self.input, &record.input), (&self.output, &record.output)];
        for (template, fields) in sides {
            for (key, term) in template {
                let actual = fields.get(key)?;
                match term {
                    Term::Lit(expected) => {
                        if expected != actual {
                            return None;
                        }
                    }
                    Term::Var(var) => match next.get(*var) {
                        Some(bound) if bound != actual => return None,
                        Some(_) => {}
                        None => next.bind(*var, actual.clone()).ok()?,
                    },
                }
            }
        }
        next.record_match(record.seq);
        Some(next)
    }

    /// Render for listings, e.g. `Profile.updateName { user: ?user } => { profile: ?profile }`.
    pub fn describe(&self, names: &[String]) -> String {
        let render = |template: &[(String, Term)]| {
            let entries: Vec<String> = template
                .iter()
                .map(|(key, term)| match term {
                    Term::Var(v) => {
                        let name = names.get(v.index()).map(String::as_str).unwrap_or("_");
                        format!("{key}: ?{name}")
                    }
                    Term::Lit(value) => format!("{key}: {value}"),
                })
                .collect();
            if entries.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", entries.join(", "))
            }
        };

        let mut out = format!("{}.{} {}", self.concept, self.action, render(&self.input));
        if !self.output.is_empty() || !self.absent.is_empty() {
            out.push_str(" => ");
            out.push_str(&render(&self.output));
        }
        for key in &self.absent {
            out.push_str(&format!(" !{key}"));
        }
        out
    }
}
