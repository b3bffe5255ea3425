//! Tests for TaxonomyEngine enrichment and refinement

use serde_json::{json, Value};

use jobstruct::application::services::{LeafOutcome, RefineOutcome, TaxonomyEngine, TaxonomyRules};
use jobstruct::application::ApplicationError;
use jobstruct::domain::SkillsTree;
use jobstruct::infrastructure::traits::{CompletionError, PromptName};
use jobstruct::util::testing::{init_test_setup, ScriptedCompletion};

fn engine(record: Value) -> TaxonomyEngine {
    init_test_setup();
    TaxonomyEngine::new(Some(record), TaxonomyRules::default()).unwrap()
}

/// Children of the first node named `name`, with their `terminal` flags.
fn children_of(tree: &SkillsTree, name: &str) -> Vec<(String, bool)> {
    let (_, node) = tree
        .iter()
        .find(|(_, n)| n.name == name)
        .unwrap_or_else(|| panic!("no node named {name}"));
    node.children
        .iter()
        .map(|&c| {
            let child = tree.get(c).unwrap();
            (child.name.clone(), child.is_terminal())
        })
        .collect()
}

fn expansion(leaf: &str, children: Value) -> String {
    format!(
        "<tree>{}</tree>",
        json!({"name": "Skills", "children": [{"name": leaf, "children": children}]})
    )
}

#[test]
fn given_known_name_among_new_children_when_enriching_then_all_new_children_terminal() {
    // Arrange
    let mut engine = engine(json!({
        "name": "Skills",
        "children": [{"name": "Programming"}, {"name": "Python"}]
    }));
    let completion = ScriptedCompletion::replying([
        expansion("Programming", json!([{"name": "Python"}, {"name": "Go"}])),
        "I cannot help with that".to_string(),
    ]);

    // Act
    let report = engine.enrich(&completion).unwrap();

    // Assert
    assert_eq!(
        children_of(engine.tree(), "Programming"),
        vec![("Python".to_string(), true), ("Go".to_string(), true)]
    );
    assert_eq!(report.leaves[0].leaf, "Programming");
    assert_eq!(
        report.leaves[0].outcome,
        LeafOutcome::Expanded { added: 2, duplicate: true }
    );
    assert_eq!(report.leaves[1].outcome, LeafOutcome::Unparsable);
}

#[test]
fn given_known_name_deep_in_expansion_when_enriching_then_duplicate() {
    let mut engine = engine(json!({
        "name": "Skills",
        "children": [{"name": "Programming"}, {"name": "Tools", "children": [{"name": "Cargo"}]}]
    }));
    let completion = ScriptedCompletion::replying([
        expansion("Programming", json!([{"name": "Rust", "children": [{"name": "Cargo"}]}])),
        "no".to_string(),
    ]);

    engine.enrich(&completion).unwrap();

    assert_eq!(children_of(engine.tree(), "Programming"), vec![("Rust".to_string(), true)]);
}

#[test]
fn given_new_names_when_enriching_then_children_attached_not_terminal() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion = ScriptedCompletion::replying([format!(
        "Sure, here is the expansion:\n{}\nLet me know if you need more.",
        expansion("Programming", json!([{"name": "Rust", "children": [{"name": "Ownership"}]}]))
    )]);

    let report = engine.enrich(&completion).unwrap();

    assert_eq!(report.added(), 1);
    assert_eq!(children_of(engine.tree(), "Programming"), vec![("Rust".to_string(), false)]);
    // grandchildren come along, without a terminal flag of their own
    assert_eq!(children_of(engine.tree(), "Rust"), vec![("Ownership".to_string(), false)]);
}

#[test]
fn given_placeholder_child_when_enriching_then_not_attached() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion = ScriptedCompletion::replying([expansion(
        "Programming",
        json!([{"name": "Programming Skills"}, {"name": "Rust"}]),
    )]);

    let report = engine.enrich(&completion).unwrap();

    assert_eq!(children_of(engine.tree(), "Programming"), vec![("Rust".to_string(), false)]);
    assert_eq!(report.added(), 1);
}

#[test]
fn given_custom_placeholder_suffix_when_enriching_then_suffix_applied() {
    init_test_setup();
    let rules = TaxonomyRules {
        placeholder_suffix: " Area".into(),
        ..TaxonomyRules::default()
    };
    let mut engine =
        TaxonomyEngine::new(Some(json!({"name": "Skills", "children": [{"name": "Math"}]})), rules).unwrap();
    let completion = ScriptedCompletion::replying([expansion(
        "Math",
        json!([{"name": "Algebra Area"}, {"name": "Statistics Skills"}]),
    )]);

    engine.enrich(&completion).unwrap();

    assert_eq!(
        children_of(engine.tree(), "Math"),
        vec![("Statistics Skills".to_string(), false)]
    );
}

#[test]
fn given_empty_placeholder_suffix_when_enriching_then_no_child_dropped() {
    // Arrange
    init_test_setup();
    let rules = TaxonomyRules {
        placeholder_suffix: String::new(),
        ..TaxonomyRules::default()
    };
    let mut engine =
        TaxonomyEngine::new(Some(json!({"name": "Skills", "children": [{"name": "Math"}]})), rules).unwrap();
    let completion = ScriptedCompletion::replying([expansion("Math", json!([{"name": "Algebra"}]))]);

    // Act
    let report = engine.enrich(&completion).unwrap();

    // Assert
    assert_eq!(children_of(engine.tree(), "Math"), vec![("Algebra".to_string(), false)]);
    assert!(matches!(
        report.leaves[0].outcome,
        LeafOutcome::Expanded { added: 1, duplicate: false }
    ));
}

#[test]
fn given_expansion_with_two_children_when_enriching_then_leaf_unchanged() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let before = engine.to_record();
    let completion = ScriptedCompletion::replying([format!(
        "<tree>{}</tree>",
        json!({"name": "Skills", "children": [
            {"name": "Programming", "children": [{"name": "Rust"}]},
            {"name": "Design"}
        ]})
    )]);

    let report = engine.enrich(&completion).unwrap();

    assert!(matches!(report.leaves[0].outcome, LeafOutcome::Rejected { .. }));
    assert_eq!(engine.to_record(), before);
}

#[test]
fn given_expansion_of_other_leaf_when_enriching_then_leaf_unchanged() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let before = engine.to_record();
    let completion =
        ScriptedCompletion::replying([expansion("Coding", json!([{"name": "Rust"}]))]);

    let report = engine.enrich(&completion).unwrap();

    match &report.leaves[0].outcome {
        LeafOutcome::Rejected { reason } => assert!(reason.contains("Coding"), "{reason}"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(engine.to_record(), before);
}

#[test]
fn given_malformed_expansion_when_enriching_then_rejected_and_next_leaf_processed() {
    let mut engine = engine(json!({
        "name": "Skills",
        "children": [{"name": "Programming"}, {"name": "Design"}]
    }));
    let completion = ScriptedCompletion::replying([
        r#"<tree>{"children": [{"name": "Programming"}]}</tree>"#.to_string(),
        expansion("Design", json!([{"name": "Typography"}])),
    ]);

    let report = engine.enrich(&completion).unwrap();

    assert!(matches!(report.leaves[0].outcome, LeafOutcome::Rejected { .. }));
    assert_eq!(children_of(engine.tree(), "Design"), vec![("Typography".to_string(), false)]);
}

#[test]
fn given_terminal_leaf_when_enriching_then_skipped_without_request() {
    let mut engine = engine(json!({
        "name": "Skills",
        "children": [{"name": "Python", "attributes": {"terminal": true}}]
    }));
    let completion = ScriptedCompletion::default();

    let report = engine.enrich(&completion).unwrap();

    assert_eq!(report.leaves[0].outcome, LeafOutcome::SkippedTerminal);
    assert!(completion.calls().is_empty());
}

#[test]
fn given_transport_failure_when_enriching_then_error_propagates() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion = ScriptedCompletion::new(vec![Err(CompletionError::Api {
        status: 401,
        message: "invalid x-api-key".into(),
    })]);

    let result = engine.enrich(&completion);

    assert!(matches!(
        result,
        Err(ApplicationError::Completion(CompletionError::Api { status: 401, .. }))
    ));
}

#[test]
fn given_children_added_in_pass_when_enriching_then_not_revisited_in_same_pass() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion =
        ScriptedCompletion::replying([expansion("Programming", json!([{"name": "Rust"}]))]);

    engine.enrich(&completion).unwrap();

    assert_eq!(completion.calls().len(), 1);
}

#[test]
fn given_several_passes_when_pass_adds_nothing_then_stops_early() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion = ScriptedCompletion::replying([
        expansion("Programming", json!([{"name": "Rust"}])),
        "nothing to add".to_string(),
    ]);

    let report = engine.enrich_passes(&completion, 5).unwrap();

    let calls = completion.calls();
    assert_eq!(calls.len(), 2);
    let second_query: Value = serde_json::from_str(&calls[1].1).unwrap();
    assert_eq!(second_query, json!({"name": "Programming", "children": {"name": "Rust"}}));
    assert_eq!(report.leaves.len(), 2);
    assert_eq!(report.added(), 1);
}

#[test]
fn given_unparsable_response_when_refining_then_tree_unchanged() {
    // Arrange
    let mut engine = engine(json!({
        "name": "Skills",
        "children": [{"name": "Programming", "attributes": {"terminal": false}}]
    }));
    let grown = ScriptedCompletion::replying([expansion("Programming", json!([{"name": "Rust"}]))]);
    engine.enrich(&grown).unwrap();
    let (rust_before, _) = engine.tree().iter().find(|(_, n)| n.name == "Rust").unwrap();
    let count_before = engine.tree().node_count();
    let before = engine.to_record();
    let completion = ScriptedCompletion::replying(["<tree>this is not a tree</tree>"]);

    // Act
    let outcome = engine.refine(&completion).unwrap();

    // Assert
    assert!(matches!(outcome, RefineOutcome::Unchanged { .. }));
    let rust = engine.tree().get(rust_before).expect("node added before refine survives");
    assert_eq!(rust.name, "Rust");
    assert_eq!(engine.tree().node_count(), count_before);
    assert_eq!(engine.to_record(), before);
}

#[test]
fn given_malformed_tree_when_refining_then_tree_unchanged() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let before = engine.to_record();
    let completion =
        ScriptedCompletion::replying([r#"<tree>{"name": "Skills", "children": 42}</tree>"#]);

    let outcome = engine.refine(&completion).unwrap();

    match outcome {
        RefineOutcome::Unchanged { reason } => assert!(reason.contains("malformed"), "{reason}"),
        other => panic!("expected unchanged, got {other:?}"),
    }
    assert_eq!(engine.to_record(), before);
}

#[test]
fn given_valid_rewrite_when_refining_then_tree_replaced_and_names_refreshed() {
    let mut engine = engine(json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let completion = ScriptedCompletion::replying([format!(
        "<tree>{}</tree>",
        json!({"name": "Skills", "children": [{"name": "Rust"}, {"name": "Go"}]})
    )]);

    let outcome = engine.refine(&completion).unwrap();

    assert_eq!(outcome, RefineOutcome::Replaced { nodes: 3 });
    assert!(engine.known_names().contains("Rust"));
    assert!(!engine.known_names().contains("Programming"));
    let calls = completion.calls();
    assert_eq!(calls[0].0, PromptName::TaxonomyRefine);
    let sent: Value = serde_json::from_str(&calls[0].1).unwrap();
    assert_eq!(sent["children"][0]["name"], "Programming");
}

#[test]
fn given_refresh_disabled_when_refining_then_names_kept() {
    init_test_setup();
    let rules = TaxonomyRules {
        refresh_names_on_refine: false,
        ..TaxonomyRules::default()
    };
    let mut engine =
        TaxonomyEngine::new(Some(json!({"name": "Skills", "children": [{"name": "Programming"}]})), rules)
            .unwrap();
    let completion = ScriptedCompletion::replying([r#"<tree>{"name": "Skills", "children": [{"name": "Rust"}]}</tree>"#]);

    engine.refine(&completion).unwrap();

    assert!(engine.known_names().contains("Programming"));
    assert!(!engine.known_names().contains("Rust"));
    assert_eq!(children_of(engine.tree(), "Skills"), vec![("Rust".to_string(), false)]);
}

#[test]
fn given_transport_failure_when_refining_then_error_propagates() {
    let mut engine = engine(json!({"name": "Skills"}));
    let completion = ScriptedCompletion::new(vec![Err(CompletionError::EmptyContent)]);

    assert!(matches!(
        engine.refine(&completion),
        Err(ApplicationError::Completion(CompletionError::EmptyContent))
    ));
}

#[test]
fn given_malformed_record_when_creating_engine_then_error() {
    let result = TaxonomyEngine::new(Some(json!({"children": []})), TaxonomyRules::default());
    assert!(matches!(result, Err(ApplicationError::Domain(_))));
}
