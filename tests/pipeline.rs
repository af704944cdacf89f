//! End-to-end pipeline scenarios: resolve → layout → commit.

use arbor::{
    ContentItem, Diagnostics, DiagnosticKind, FlexOracle, HeuristicMeasure, InMemoryDocument,
    LayoutBridge, NodeContent, NodeIdentity, ResolveContext, Resolver, Session, SessionOpts,
    UpdateOutcome, Viewport,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn demo_document() -> InMemoryDocument {
    let button = serde_json::from_value(json!({
        "id": "button",
        "properties": ["state"],
        "variants": [
            {
                "selectors": {"state": "idle"},
                "view": {"id": "b-root",
                         "style": {"size": {"width": 40.0, "height": 20.0}},
                         "kind": {"frame": {"children": [
                            {"id": "b-label", "kind": {"text": {"text": "Go", "size_px": 12.0}}}
                         ]}}}
            },
            {
                "selectors": {"state": "pressed"},
                "view": {"id": "b-root",
                         "style": {"size": {"width": 60.0, "height": 20.0}, "opacity": 0.8},
                         "kind": {"frame": {"children": [
                            {"id": "b-label", "kind": {"text": {"text": "Going", "size_px": 12.0}}}
                         ]}}}
            }
        ]
    }))
    .unwrap();

    let root = serde_json::from_value(json!({
        "id": "#root",
        "style": {"size": {"width": 200.0, "height": 100.0}},
        "kind": {"frame": {"children": [
            {"id": "#btn", "kind": {"instance": {"component": "button"}}},
            {"id": "#list", "kind": {"list": {}}}
        ]}}
    }))
    .unwrap();

    InMemoryDocument::new("demo-doc")
        .with_component_set(button)
        .with_view(root)
}

fn row_item(label: &str) -> arbor::ViewDef {
    serde_json::from_value(json!({
        "id": "#row",
        "style": {"size": {"width": 30.0, "height": 10.0}},
        "kind": {"frame": {}}
    }))
    .map(|mut v: arbor::ViewDef| {
        v.name = label.to_owned();
        v
    })
    .unwrap()
}

#[test]
fn resolving_twice_yields_identical_trees() {
    let doc = demo_document();
    let resolver = Resolver::default();
    let ctx = ResolveContext::new().with_variant("state", "pressed");

    let a = resolver.resolve(&doc, "#root", &ctx);
    let b = resolver.resolve(&doc, "#root", &ctx);
    assert!(a.tree.same_structure_and_style(&b.tree));
}

#[test]
fn layout_is_idempotent_across_repeat_calls() {
    let doc = demo_document();
    let resolution = Resolver::default().resolve(&doc, "#root", &ResolveContext::new());
    let mut tree = resolution.tree;

    let mut bridge = LayoutBridge::new();
    let mut oracle = FlexOracle::new();
    let mut diags = Diagnostics::new();
    let viewport = Viewport::default();

    bridge
        .compute_layout(&mut tree, viewport, &mut oracle, &mut HeuristicMeasure, &mut diags)
        .unwrap();
    let first: Vec<_> = tree.nodes().iter().map(|n| n.layout).collect();

    bridge
        .compute_layout(&mut tree, viewport, &mut oracle, &mut HeuristicMeasure, &mut diags)
        .unwrap();
    let second: Vec<_> = tree.nodes().iter().map(|n| n.layout).collect();

    assert_eq!(first, second);
    assert!(diags.is_empty());
}

#[test]
fn list_generator_feeds_keyed_children() {
    let doc = demo_document();
    let ctx = ResolveContext::new().with_content(
        "#list",
        Box::new(|i| {
            ["alpha", "beta"]
                .get(i)
                .map(|k| ContentItem::keyed(*k, row_item(k)))
        }),
    );

    let resolution = Resolver::default().resolve(&doc, "#root", &ctx);
    let list = resolution
        .tree
        .lookup(&NodeIdentity::root("#list"))
        .unwrap();
    assert_eq!(resolution.tree.node(list).children.len(), 2);
}

#[test]
fn session_walkthrough_variant_switch() {
    init_tracing();
    let mut session = Session::new(demo_document(), "#root", SessionOpts::default());

    assert_eq!(
        session.update(&ResolveContext::new()).unwrap(),
        UpdateOutcome::Cut
    );
    assert_eq!(
        session.update(&ResolveContext::new()).unwrap(),
        UpdateOutcome::Unchanged
    );

    let outcome = session
        .update(&ResolveContext::new().with_variant("state", "pressed"))
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Animating);

    // Mid-flight the session serves the merged tree.
    session.tick(16.0).unwrap();
    let mid = session.tree().unwrap();
    let btn = mid.lookup(&NodeIdentity::root("#btn")).unwrap();
    let w = mid.node(btn).presented.rect.w;
    assert!(w > 40.0 && w < 60.0, "mid-flight width, got {w}");

    // Run to completion: the pressed tree is the steady state.
    for _ in 0..60 {
        if session.tick(16.0).unwrap().completed {
            break;
        }
    }
    let steady = session.tree().unwrap();
    let btn = steady.lookup(&NodeIdentity::root("#btn")).unwrap();
    assert_eq!(steady.node(btn).presented.rect.w, 60.0);
    assert_eq!(steady.node(btn).presented.opacity, 0.8);

    // The label's text changed with the variant.
    let label = NodeIdentity::root("#btn").into_instance("#btn", "b-label");
    let label = steady.lookup(&label).unwrap();
    match &steady.node(label).content {
        NodeContent::Text { text, .. } => assert_eq!(text, "Going"),
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn recoverable_failures_are_batched_not_thrown() {
    init_tracing();
    let doc = InMemoryDocument::new("demo-doc").with_view(
        serde_json::from_value(json!({
            "id": "#root",
            "style": {"size": {"width": 100.0, "height": 50.0}},
            "kind": {"frame": {"children": [
                {"id": "#broken", "kind": {"instance": {"component": "nope"}}}
            ]}}
        }))
        .unwrap(),
    );

    let mut session = Session::new(doc, "#root", SessionOpts::default());
    session.update(&ResolveContext::new()).unwrap();

    // The pass still produced a renderable tree with a placeholder.
    let tree = session.tree().unwrap();
    assert!(tree.lookup(&NodeIdentity::root("#broken")).is_some());

    let diags = session.drain_diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::MissingNode);
    assert!(session.drain_diagnostics().is_empty());
}
