//! Front-end tracing infrastructure.
//!
//! A trait-based tracing system for the grammar engine and the scope builder. When using
//! [`NoopTracer`], every hook is an empty default method and compiles away.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (production default) |
//! | [`StderrTracer`] | Human-readable log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem inspection |
//!
//! ```ignore
//! let mut tracer = RecordingTracer::new();
//! let output = pyfront::compile_with_tracer(source, &ParseOptions::default(), &mut tracer);
//! assert!(tracer.events().iter().any(|e| matches!(e, TraceEvent::InvalidPass)));
//! ```

use crate::{
    diagnostic::Diagnostic,
    parse::Rule,
    scope::{BindingKind, ScopeKind},
};

/// Trace event emitted during parsing or scope analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A memoized rule result was reused.
    MemoHit { rule: Rule, pos: usize },
    /// A rule result was stored in the memo table.
    MemoStore { rule: Rule, pos: usize, success: bool },
    /// The first pass failed; the engine restarted with the error-reporting rules enabled.
    InvalidPass,
    /// A diagnostic was reported.
    Diagnostic(Diagnostic),
    /// A scope was opened during collection.
    ScopeEnter { kind: ScopeKind, name: String, depth: usize },
    /// The scope at `depth` was closed.
    ScopeExit { depth: usize },
    /// A name received its final classification.
    NameResolved {
        scope: String,
        name: String,
        binding: BindingKind,
    },
}

/// Trait for front-end tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires zero lines
/// of code. Implementations only override the hooks they care about.
pub trait ParseTracer: std::fmt::Debug {
    /// Called when a memoized rule result at token index `pos` is reused.
    #[inline(always)]
    fn on_memo_hit(&mut self, _rule: Rule, _pos: usize) {}

    /// Called when a rule result at token index `pos` is memoized.
    #[inline(always)]
    fn on_memo_store(&mut self, _rule: Rule, _pos: usize, _success: bool) {}

    /// Called when the first pass failed without a diagnostic and the second,
    /// error-reporting pass begins.
    #[inline(always)]
    fn on_invalid_pass(&mut self) {}

    /// Called for every diagnostic reported by the grammar engine or the scope builder.
    #[inline(always)]
    fn on_diagnostic(&mut self, _diagnostic: &Diagnostic) {}

    /// Called when the scope builder opens a scope.
    ///
    /// # Arguments
    /// * `kind` - Kind of the new scope
    /// * `name` - Scope name (`<module>`, function or class name, `<lambda>`, ...)
    /// * `depth` - Nesting depth after the push (module is 1)
    #[inline(always)]
    fn on_scope_enter(&mut self, _kind: ScopeKind, _name: &str, _depth: usize) {}

    /// Called when the scope builder closes a scope.
    #[inline(always)]
    fn on_scope_exit(&mut self, _depth: usize) {}

    /// Called once per (scope, name) pair when resolution commits a binding.
    #[inline(always)]
    fn on_name_resolved(&mut self, _scope: &str, _name: &str, _binding: BindingKind) {}
}

// ============================================================================
// NoopTracer: production default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl ParseTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable log
// ============================================================================

/// Tracer that prints a human-readable log to stderr.
///
/// Output format:
/// ```text
///   ~~~ INVALID PASS
///   !!! SyntaxError: invalid syntax (line 1, column 5)
///   >>> SCOPE function f        depth=2
///   ... f: x -> Local
///   <<< SCOPE                   depth=1
/// ```
///
/// Memo traffic is only printed when `verbose` is set; it is by far the noisiest hook.
#[derive(Debug, Default)]
pub struct StderrTracer {
    verbose: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Creates a tracer that also logs every memo hit and store.
    #[must_use]
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl ParseTracer for StderrTracer {
    fn on_memo_hit(&mut self, rule: Rule, pos: usize) {
        if self.verbose {
            eprintln!("  memo hit   {rule:<20?} @{pos}");
        }
    }

    fn on_memo_store(&mut self, rule: Rule, pos: usize, success: bool) {
        if self.verbose {
            let outcome = if success { "ok" } else { "fail" };
            eprintln!("  memo store {rule:<20?} @{pos} {outcome}");
        }
    }

    fn on_invalid_pass(&mut self) {
        eprintln!("  ~~~ INVALID PASS");
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        eprintln!("  !!! {diagnostic}");
    }

    fn on_scope_enter(&mut self, kind: ScopeKind, name: &str, depth: usize) {
        let kind: &'static str = kind.into();
        eprintln!("  >>> SCOPE {kind} {name:<12} depth={depth}");
    }

    fn on_scope_exit(&mut self, depth: usize) {
        eprintln!("  <<< SCOPE                   depth={depth}");
    }

    fn on_name_resolved(&mut self, scope: &str, name: &str, binding: BindingKind) {
        eprintln!("  ... {scope}: {name} -> {binding:?}");
    }
}

// ============================================================================
// RecordingTracer: full event log
// ============================================================================

/// Tracer that records every event into a vector.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    /// All recorded events in chronological order.
    events: Vec<TraceEvent>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|l| self.events.len() < l) {
            self.events.push(event);
        }
    }
}

impl ParseTracer for RecordingTracer {
    fn on_memo_hit(&mut self, rule: Rule, pos: usize) {
        self.record(TraceEvent::MemoHit { rule, pos });
    }

    fn on_memo_store(&mut self, rule: Rule, pos: usize, success: bool) {
        self.record(TraceEvent::MemoStore { rule, pos, success });
    }

    fn on_invalid_pass(&mut self) {
        self.record(TraceEvent::InvalidPass);
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.record(TraceEvent::Diagnostic(diagnostic.clone()));
    }

    fn on_scope_enter(&mut self, kind: ScopeKind, name: &str, depth: usize) {
        self.record(TraceEvent::ScopeEnter {
            kind,
            name: name.to_owned(),
            depth,
        });
    }

    fn on_scope_exit(&mut self, depth: usize) {
        self.record(TraceEvent::ScopeExit { depth });
    }

    fn on_name_resolved(&mut self, scope: &str, name: &str, binding: BindingKind) {
        self.record(TraceEvent::NameResolved {
            scope: scope.to_owned(),
            name: name.to_owned(),
            binding,
        });
    }
}
