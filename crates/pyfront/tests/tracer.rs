use ahash::AHashSet;
use pyfront::{
    BindingKind, ParseOptions, RecordingTracer, Rule, ScopeKind, TraceEvent, compile_with_tracer, parse_with_tracer,
};

fn parse_events(source: &str) -> Vec<TraceEvent> {
    let mut tracer = RecordingTracer::new();
    let _ = parse_with_tracer(source, &ParseOptions::default(), &mut tracer);
    tracer.into_events()
}

#[test]
fn valid_parse_runs_one_pass() {
    let events = parse_events("x = f(a)[0]\n");
    assert!(!events.contains(&TraceEvent::InvalidPass));
    assert!(events.iter().any(|e| matches!(e, TraceEvent::MemoStore { success: true, .. })));
    assert!(!events.iter().any(|e| matches!(e, TraceEvent::Diagnostic(_))));
}

/// A memo hit always reuses a result stored earlier in the same pass.
#[test]
fn memo_hits_follow_stores() {
    let events = parse_events("if a:\n    b = [c for c in d] + e(f, *g)\nelse:\n    h b\n");
    let mut stored: AHashSet<(Rule, usize)> = AHashSet::new();
    for event in &events {
        match event {
            TraceEvent::InvalidPass => stored.clear(),
            TraceEvent::MemoStore { rule, pos, .. } => {
                stored.insert((*rule, *pos));
            }
            TraceEvent::MemoHit { rule, pos } => {
                assert!(stored.contains(&(*rule, *pos)), "hit without store: {rule:?} @{pos}");
            }
            _ => {}
        }
    }
}

#[test]
fn failed_parse_reruns_with_error_rules() {
    let events = parse_events("a b\n");
    let restart = events
        .iter()
        .position(|e| *e == TraceEvent::InvalidPass)
        .expect("second pass");
    let diagnostic = events
        .iter()
        .position(|e| matches!(e, TraceEvent::Diagnostic(d) if d.message == "invalid syntax"))
        .expect("diagnostic event");
    assert!(restart < diagnostic);
    assert_eq!(events.iter().filter(|e| **e == TraceEvent::InvalidPass).count(), 1);
}

#[test]
fn scope_events() {
    let mut tracer = RecordingTracer::new();
    let output = compile_with_tracer("def f():\n    x = 1\n", &ParseOptions::default(), &mut tracer);
    assert!(output.is_ok());
    let scope_events: Vec<_> = tracer
        .into_events()
        .into_iter()
        .filter(|e| !matches!(e, TraceEvent::MemoHit { .. } | TraceEvent::MemoStore { .. }))
        .collect();

    assert_eq!(
        &scope_events[..4],
        [
            TraceEvent::ScopeEnter {
                kind: ScopeKind::Module,
                name: "<module>".to_owned(),
                depth: 1,
            },
            TraceEvent::ScopeEnter {
                kind: ScopeKind::Function,
                name: "f".to_owned(),
                depth: 2,
            },
            TraceEvent::ScopeExit { depth: 1 },
            TraceEvent::ScopeExit { depth: 0 },
        ]
    );
    assert!(scope_events.contains(&TraceEvent::NameResolved {
        scope: "f".to_owned(),
        name: "x".to_owned(),
        binding: BindingKind::Local,
    }));
    assert!(scope_events.contains(&TraceEvent::NameResolved {
        scope: "<module>".to_owned(),
        name: "f".to_owned(),
        binding: BindingKind::Local,
    }));
}

#[test]
fn scope_diagnostics_are_traced() {
    let mut tracer = RecordingTracer::new();
    let _ = compile_with_tracer("return\n", &ParseOptions::default(), &mut tracer);
    assert!(
        tracer
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Diagnostic(d) if d.message == "'return' outside function"))
    );
}

#[test]
fn recording_limit_caps_events() {
    let mut tracer = RecordingTracer::with_limit(3);
    let _ = parse_with_tracer("x = [1, 2, 3]\n", &ParseOptions::default(), &mut tracer);
    assert_eq!(tracer.events().len(), 3);
}
