//! Tests for CLI command dispatch against a wired container

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use jobstruct::cli::args::Commands;
use jobstruct::cli::commands::run;
use jobstruct::config::Settings;
use jobstruct::exitcode;
use jobstruct::infrastructure::di::ServiceContainer;
use jobstruct::infrastructure::traits::{CompletionError, RealFileSystem};
use jobstruct::util::testing::{init_test_setup, ScriptedCompletion};

fn container(completion: ScriptedCompletion) -> ServiceContainer {
    init_test_setup();
    ServiceContainer::with_deps(Settings::default(), Arc::new(RealFileSystem), Arc::new(completion))
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn given_taxonomy_file_when_enriching_then_output_has_new_children() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let input = write_json(&temp, "in.json", &json!({"name": "Skills", "children": [{"name": "Programming"}]}));
    let output = temp.path().join("out.json");
    let completion = ScriptedCompletion::replying([
        r#"<tree>{"name": "Skills", "children": {"name": "Programming", "children": [{"name": "Rust"}]}}</tree>"#,
    ]);
    let command = Commands::Enrich {
        input: Some(input),
        output: output.clone(),
        passes: 1,
    };

    // Act
    run(&command, None, &container(completion)).unwrap();

    // Assert
    let record = read_json(&output);
    assert_eq!(record["children"][0]["children"][0]["name"], "Rust");
    assert_eq!(record["children"][0]["children"][0]["attributes"]["terminal"], false);
}

#[test]
fn given_unusable_refinement_when_refining_then_input_written_back_unchanged() {
    let temp = TempDir::new().unwrap();
    let original = json!({"name": "Skills", "attributes": {}, "children": [
        {"name": "Programming", "attributes": {"terminal": true}, "children": []}
    ]});
    let input = write_json(&temp, "in.json", &original);
    let output = temp.path().join("out.json");
    let command = Commands::Refine {
        input: Some(input),
        output: output.clone(),
    };

    run(&command, None, &container(ScriptedCompletion::replying(["no tree"]))).unwrap();

    assert_eq!(read_json(&output), original);
}

#[test]
fn given_completion_failure_when_enriching_then_unavailable_exit_code() {
    let temp = TempDir::new().unwrap();
    let input = write_json(&temp, "in.json", &json!({"name": "Skills", "children": [{"name": "A"}]}));
    let command = Commands::Enrich {
        input: Some(input),
        output: temp.path().join("out.json"),
        passes: 1,
    };
    let completion = ScriptedCompletion::new(vec![Err(CompletionError::Api {
        status: 400,
        message: "bad request".into(),
    })]);

    let err = run(&command, None, &container(completion)).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::UNAVAILABLE);
    assert!(!temp.path().join("out.json").exists());
}

#[test]
fn given_malformed_taxonomy_when_showing_then_dataerr_exit_code() {
    let temp = TempDir::new().unwrap();
    let input = write_json(&temp, "bad.json", &json!({"children": []}));

    let err = run(&Commands::Show { input: Some(input) }, None, &container(ScriptedCompletion::default()))
        .unwrap_err();

    assert_eq!(err.exit_code(), exitcode::DATAERR);
}

#[test]
fn given_missing_input_when_extracting_then_ioerr_exit_code() {
    let temp = TempDir::new().unwrap();
    let command = Commands::Extract {
        inputs: vec![temp.path().join("absent.txt")],
        output: temp.path().join("out.json"),
        skills: None,
        occupation: false,
    };

    let err = run(&command, None, &container(ScriptedCompletion::default())).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::IOERR);
}

#[test]
fn given_posting_files_when_segmenting_then_one_entry_per_file() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first.txt");
    std::fs::write(&first, "Benefits\nFree lunch every single working day of the week.\n").unwrap();
    let second = temp.path().join("second.txt");
    std::fs::write(&second, "Requirements:\nFive years of professional Rust development experience.\n").unwrap();
    let output = temp.path().join("segments.json");
    let command = Commands::Segment {
        inputs: vec![first, second],
        output: output.clone(),
    };

    run(&command, None, &container(ScriptedCompletion::default())).unwrap();

    let record = read_json(&output);
    assert_eq!(record.as_array().unwrap().len(), 2);
    assert_eq!(record[0]["segments"]["benefits"].as_array().unwrap().len(), 1);
    assert_eq!(record[1]["segments"]["requirements"].as_array().unwrap().len(), 1);
}

#[test]
fn given_posting_file_when_extracting_then_output_lists_source_and_fields() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("posting.txt");
    std::fs::write(&input, "Senior Rust Engineer at Acme").unwrap();
    let output = temp.path().join("postings.json");
    let completion = ScriptedCompletion::replying([r#"{"job_title": "Senior Rust Engineer", "remote": "yes"}"#]);
    let command = Commands::Extract {
        inputs: vec![input.clone()],
        output: output.clone(),
        skills: None,
        occupation: false,
    };

    run(&command, None, &container(completion)).unwrap();

    let record = read_json(&output);
    assert_eq!(record[0]["source"], input.display().to_string());
    assert_eq!(record[0]["job_title"], "Senior Rust Engineer");
    assert_eq!(record[0]["remote"], true);
}

#[test]
fn given_skills_taxonomy_when_extracting_then_taxonomy_sent_by_name_only() {
    // Arrange
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let taxonomy = write_json(&temp, "skills.json", &json!({"name": "Skills", "children": [
        {"name": "Programming", "attributes": {"terminal": true}}
    ]}));
    let input = temp.path().join("posting.txt");
    std::fs::write(&input, "Rust Engineer, must know Rust").unwrap();
    let completion = Arc::new(ScriptedCompletion::replying([
        r#"{"job_title": "Rust Engineer", "required": {"qualifications": ["Rust"]}}"#,
        r#"["Programming"]"#,
    ]));
    let container =
        ServiceContainer::with_deps(Settings::default(), Arc::new(RealFileSystem), completion.clone());
    let command = Commands::Extract {
        inputs: vec![input],
        output: temp.path().join("postings.json"),
        skills: Some(taxonomy),
        occupation: false,
    };

    // Act
    run(&command, None, &container).unwrap();

    // Assert
    let calls = completion.calls();
    assert_eq!(calls.len(), 2);
    let sent: Value = serde_json::from_str(calls[1].2.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({"name": "Skills", "children": [{"name": "Programming", "children": []}]}));
}
