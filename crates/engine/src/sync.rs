//! Synchronizations and their builder.
//!
//! A [`Synchronization`] is a declarative `when / where / then` rule:
//!
//! - `when`: an ordered list of patterns joined against the invocation log
//! - `where`: an optional async extender that may drop frames or bind more
//!   variables through concept queries
//! - `then`: patterns instantiated per surviving frame and dispatched
//!
//! Rules are plain data once built. All load-time checks (every `then`
//! variable is bound, no variable crosses syncs) run in
//! [`SyncBuilder::build`].

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{ExtendError, SyncError};
use crate::frame::{Frames, QueryContext};
use crate::pattern::{Pattern, Var};

/// Boxed future returned by an extender.
pub type ExtendFuture = Pin<Box<dyn Future<Output = Result<Frames, ExtendError>> + Send>>;

/// The `where` clause of a sync.
pub type Extender = Arc<dyn Fn(QueryContext, Frames) -> ExtendFuture + Send + Sync>;

static NEXT_BUILDER: AtomicU32 = AtomicU32::new(1);

/// A built, validated rule.
#[derive(Clone)]
pub struct Synchronization {
    name: String,
    var_names: Vec<String>,
    when: Vec<Pattern>,
    extender: Option<Extender>,
    where_binds: Vec<Var>,
    then: Vec<Pattern>,
}

impl Synchronization {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn when(&self) -> &[Pattern] {
        &self.when
    }

    pub fn then(&self) -> &[Pattern] {
        &self.then
    }

    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn var_name(&self, var: Var) -> &str {
        self.var_names
            .get(var.index())
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn has_where(&self) -> bool {
        self.extender.is_some()
    }

    /// Variables the `where` clause promises to bind.
    pub fn where_binds(&self) -> &[Var] {
        &self.where_binds
    }

    /// Run the `where` clause, or pass frames through when there is none.
    pub async fn extend(&self, ctx: QueryContext, frames: Frames) -> Result<Frames, ExtendError> {
        match &self.extender {
            Some(extender) => extender(ctx, frames).await,
            None => Ok(frames),
        }
    }
}

impl fmt::Debug for Synchronization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronization")
            .field("name", &self.name)
            .field("vars", &self.var_names)
            .field("when", &self.when)
            .field("where", &self.extender.is_some())
            .field("then", &self.then)
            .finish()
    }
}

/// Declares one synchronization.
///
/// ```ignore
/// let mut sync = SyncBuilder::new("CreateNoteResponse");
/// let [request, note] = sync.vars(["request", "note"]);
/// sync.when(Pattern::new("Requesting", "request").input("path", "/Notes/createNote").output("request", request))
///     .when(Pattern::new("Notes", "createNote").output("note", note))
///     .then(Pattern::new("Requesting", "respond").input("request", request).input("note", note));
/// let sync = sync.build()?;
/// ```
pub struct SyncBuilder {
    id: u32,
    name: String,
    var_names: Vec<String>,
    when: Vec<Pattern>,
    extender: Option<Extender>,
    where_binds: Vec<Var>,
    then: Vec<Pattern>,
    duplicate_where: bool,
    too_many_vars: bool,
}

impl SyncBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_BUILDER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            var_names: Vec::new(),
            when: Vec::new(),
            extender: None,
            where_binds: Vec::new(),
            then: Vec::new(),
            duplicate_where: false,
            too_many_vars: false,
        }
    }

    /// Allocate a variable scoped to this sync.
    ///
    /// A sync holds at most 65,536 variables; past that `build` fails.
    pub fn var(&mut self, name: &str) -> Var {
        let index = u16::try_from(self.var_names.len()).unwrap_or_else(|_| {
            self.too_many_vars = true;
            u16::MAX
        });
        let var = Var {
            owner: self.id,
            index,
        };
        self.var_names.push(name.to_string());
        var
    }

    /// Allocate several variables at once.
    pub fn vars<const N: usize>(&mut self, names: [&str; N]) -> [Var; N] {
        names.map(|name| self.var(name))
    }

    pub fn when(&mut self, pattern: Pattern) -> &mut Self {
        self.when.push(pattern);
        self
    }

    /// Set the `where` clause. `binds` lists the variables it guarantees to
    /// bind on every frame it returns.
    pub fn where_<F, Fut>(&mut self, binds: &[Var], f: F) -> &mut Self
    where
        F: Fn(QueryContext, Frames) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Frames, ExtendError>> + Send + 'static,
    {
        if self.extender.is_some() {
            self.duplicate_where = true;
        }
        let extender: Extender =
            Arc::new(move |ctx: QueryContext, frames: Frames| -> ExtendFuture { Box::pin(f(ctx, frames)) });
        self.extender = Some(extender);
        self.where_binds = binds.to_vec();
        self
    }

    pub fn then(&mut self, pattern: Pattern) -> &mut Self {
        self.then.push(pattern);
        self
    }

    /// Validate and produce the rule.
    pub fn build(self) -> Result<Synchronization, SyncError> {
        let sync = self.name.clone();
        if self.when.is_empty() {
            return Err(SyncError::NoWhen { sync });
        }
        if self.then.is_empty() {
            return Err(SyncError::NoThen { sync });
        }
        if self.duplicate_where {
            return Err(SyncError::DuplicateWhere { sync });
        }
        if self.too_many_vars {
            return Err(SyncError::TooManyVariables {
                sync,
                limit: usize::from(u16::MAX) + 1,
            });
        }

        let all_vars = self
            .when
            .iter()
            .chain(&self.then)
            .flat_map(Pattern::vars)
            .chain(self.where_binds.iter().copied());
        for var in all_vars {
            if var.owner != self.id || var.index() >= self.var_names.len() {
                return Err(SyncError::ForeignVariable { sync, var });
            }
        }

        for pattern in &self.then {
            if !pattern.output_terms().is_empty() || !pattern.absent_keys().is_empty() {
                return Err(SyncError::ThenOutput {
                    sync,
                    concept: pattern.concept().to_string(),
                    action: pattern.action().to_string(),
                });
            }
        }

        let bound: BTreeSet<Var> = self
            .when
            .iter()
            .flat_map(Pattern::vars)
            .chain(self.where_binds.iter().copied())
            .collect();
        for pattern in &self.then {
            if let Some(var) = pattern.vars().find(|v| !bound.contains(v)) {
                return Err(SyncError::UnboundVariable {
                    sync,
                    var: self.var_names[var.index()].clone(),
                });
            }
        }

        Ok(Synchronization {
            name: self.name,
            var_names: self.var_names,
            when: self.when,
            extender: self.extender,
            where_binds: self.where_binds,
            then: self.then,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, request: Var) -> Pattern {
        Pattern::new("Requesting", "request")
            .input("path", path)
            .output("request", request)
    }

    #[test]
    fn builds_a_simple_sync() {
        let mut b = SyncBuilder::new("Create");
        let [req, name] = b.vars(["request", "name"]);
        b.when(request("/X/create", req).input("name", name))
            .then(Pattern::new("X", "create").input("name", name));
        let sync = b.build().unwrap();
        assert_eq!(sync.name(), "Create");
        assert_eq!(sync.var_count(), 2);
        assert_eq!(sync.var_name(name), "name");
        assert!(!sync.has_where());
    }

    #[test]
    fn rejects_unbound_then_variable() {
        let mut b = SyncBuilder::new("Leaky");
        let [req, user] = b.vars(["request", "user"]);
        b.when(request("/X/create", req))
            .then(Pattern::new("X", "create").input("owner", user));
        assert_eq!(
            b.build().unwrap_err(),
            SyncError::UnboundVariable {
                sync: "Leaky".into(),
                var: "user".into()
            }
        );
    }

    #[test]
    fn rejects_more_variables_than_slots() {
        let mut b = SyncBuilder::new("Huge");
        let req = b.var("request");
        let vars: Vec<Var> = (0..=usize::from(u16::MAX)).map(|i| b.var(&format!("v{i}"))).collect();
        let last = *vars.last().unwrap();
        b.when(request("/X/create", req))
            .then(Pattern::new("X", "create").input("value", last));
        assert_eq!(
            b.build().unwrap_err(),
            SyncError::TooManyVariables {
                sync: "Huge".into(),
                limit: 65536
            }
        );
    }

    #[test]
    fn where_binds_satisfy_then() {
        let mut b = SyncBuilder::new("Guarded");
        let [req, session, user] = b.vars(["request", "session", "user"]);
        b.when(request("/X/create", req).input("session", session))
            .where_(&[user], move |ctx, frames| async move {
                frames
                    .query(&ctx, "Sessioning", "_getUser", &[("session", session.into())], user)
                    .await
            })
            .then(Pattern::new("X", "create").input("owner", user));
        let sync = b.build().unwrap();
        assert!(sync.has_where());
        assert_eq!(sync.where_binds(), &[user]);
    }

    #[test]
    fn rejects_foreign_variable() {
        let mut other = SyncBuilder::new("Other");
        let stolen = other.var("stolen");

        let mut b = SyncBuilder::new("Thief");
        let req = b.var("request");
        b.when(request("/X/create", req).input("name", stolen))
            .then(Pattern::new("X", "create").input("name", stolen));
        assert!(matches!(
            b.build(),
            Err(SyncError::ForeignVariable { .. })
        ));
    }

    #[test]
    fn rejects_missing_clauses() {
        let mut b = SyncBuilder::new("NoThen");
        let req = b.var("request");
        b.when(request("/X/create", req));
        assert!(matches!(b.build(), Err(SyncError::NoThen { .. })));

        let mut b = SyncBuilder::new("NoWhen");
        b.then(Pattern::new("X", "create"));
        assert!(matches!(b.build(), Err(SyncError::NoWhen { .. })));
    }

    #[test]
    fn rejects_output_template_on_then() {
        let mut b = SyncBuilder::new("Outputs");
        let req = b.var("request");
        b.when(request("/X/create", req))
            .then(Pattern::new("X", "create").output("id", req));
        assert!(matches!(b.build(), Err(SyncError::ThenOutput { .. })));
    }

    #[test]
    fn rejects_second_where() {
        let mut b = SyncBuilder::new("Twice");
        let req = b.var("request");
        b.when(request("/X/create", req))
            .where_(&[], |_ctx, frames| async move { Ok::<_, ExtendError>(frames) })
            .where_(&[], |_ctx, frames| async move { Ok::<_, ExtendError>(frames) })
            .then(Pattern::new("X", "create"));
        assert!(matches!(b.build(), Err(SyncError::DuplicateWhere { .. })));
    }
}
