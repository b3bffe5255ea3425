//! Command dispatch
//!
//! Each command loads its inputs through the service container, runs one
//! application service, and writes data to stdout or the `-o` file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::services::{text_blocks, to_pretty_json, ExtractOptions, LeafOutcome, RefineOutcome};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{JobPosting, SegmentedPosting};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::util::path::{expand_path, is_stdio};

/// `--skills default` maps onto the configured (or bundled) taxonomy.
const DEFAULT_TAXONOMY_ARG: &str = "default";

#[derive(Debug, Serialize)]
struct Extracted {
    source: String,
    #[serde(flatten)]
    posting: JobPosting,
}

#[derive(Debug, Serialize)]
struct Segmented {
    source: String,
    segments: SegmentedPosting,
}

/// Load settings, wire services and run the selected command.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let settings = Settings::load(cli.config.as_deref()).map_err(InfraError::from)?;
    let container = ServiceContainer::new(settings);
    run(&cli.command, cli.config.as_deref(), &container)
}

/// Run `command` against an already wired container.
pub fn run(command: &Commands, config_file: Option<&Path>, container: &ServiceContainer) -> CliResult<()> {
    match command {
        Commands::Extract {
            inputs,
            output,
            skills,
            occupation,
        } => _extract(container, inputs, output, skills.as_deref(), *occupation),
        Commands::Segment { inputs, output } => _segment(container, inputs, output),
        Commands::Enrich {
            input,
            output,
            passes,
        } => _enrich(container, input.as_deref(), output, usize::from(*passes)),
        Commands::Refine { input, output } => _refine(container, input.as_deref(), output),
        Commands::Show { input } => _show(container, input.as_deref()),
        Commands::Leaves { input } => _leaves(container, input.as_deref()),
        Commands::Config { command } => _config(container, command, config_file),
        Commands::Completion { .. } => Err(CliError::Usage(
            "completion is generated before settings are loaded".into(),
        )),
    }
}

#[instrument(skip(container))]
fn _extract(
    container: &ServiceContainer,
    inputs: &[PathBuf],
    output: &Path,
    skills: Option<&Path>,
    occupation: bool,
) -> CliResult<()> {
    let skills_taxonomy = match skills {
        Some(path) => {
            let source = (path.as_os_str() != DEFAULT_TAXONOMY_ARG).then(|| expand_path(path));
            let engine = container.taxonomy(source.as_deref())?;
            Some(engine.tree().to_record(engine.tree().root(), false))
        }
        None => None,
    };
    let options = ExtractOptions {
        skills_taxonomy,
        occupation,
    };
    let service = container.extraction()?;

    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let text = read_input(container, input)?;
        let posting = service.extract(&text, &options)?;
        output::success(&format!(
            "{}: {}",
            input.display(),
            posting.job_title.as_deref().unwrap_or("(no title)")
        ));
        results.push(Extracted {
            source: input.display().to_string(),
            posting,
        });
    }
    write_output(container, output, &to_pretty_json(&results)?)
}

#[instrument(skip(container))]
fn _segment(container: &ServiceContainer, inputs: &[PathBuf], output: &Path) -> CliResult<()> {
    let classifier = container.classifier();
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let text = read_input(container, input)?;
        let segments = classifier.segment(text_blocks(&text));
        debug!("segment: {} -> {:?}", input.display(), segments);
        results.push(Segmented {
            source: input.display().to_string(),
            segments,
        });
    }
    write_output(container, output, &to_pretty_json(&results)?)
}

#[instrument(skip(container))]
fn _enrich(container: &ServiceContainer, input: Option<&Path>, output: &Path, passes: usize) -> CliResult<()> {
    let mut engine = container.taxonomy(input.map(expand_path).as_deref())?;
    let completion = container.completion()?;

    let report = engine.enrich_passes(completion.as_ref(), passes)?;
    for leaf in &report.leaves {
        match &leaf.outcome {
            LeafOutcome::Expanded { added, duplicate: true } => {
                output::success_detail(&format!("{}: +{} (duplicate, terminal)", leaf.leaf, added))
            }
            LeafOutcome::Expanded { added, .. } => {
                output::success_detail(&format!("{}: +{}", leaf.leaf, added))
            }
            LeafOutcome::SkippedTerminal => output::skipped(&format!("{}: terminal", leaf.leaf)),
            LeafOutcome::Unparsable => output::failure(&format!("{}: unparsable response", leaf.leaf)),
            LeafOutcome::Rejected { reason } => output::failure(&format!("{}: {}", leaf.leaf, reason)),
        }
    }
    output::action("Enriched", &report);

    write_output(container, output, &to_pretty_json(&engine.to_record())?)
}

#[instrument(skip(container))]
fn _refine(container: &ServiceContainer, input: Option<&Path>, output: &Path) -> CliResult<()> {
    let mut engine = container.taxonomy(input.map(expand_path).as_deref())?;
    let completion = container.completion()?;

    match engine.refine(completion.as_ref())? {
        outcome @ RefineOutcome::Replaced { .. } => output::action("Refined", &outcome),
        outcome @ RefineOutcome::Unchanged { .. } => output::warning(&outcome),
    }

    write_output(container, output, &to_pretty_json(&engine.to_record())?)
}

#[instrument(skip(container))]
fn _show(container: &ServiceContainer, input: Option<&Path>) -> CliResult<()> {
    let engine = container.taxonomy(input.map(expand_path).as_deref())?;
    let tree = engine.tree();
    output::info(&tree.to_termtree(tree.root()));
    Ok(())
}

#[instrument(skip(container))]
fn _leaves(container: &ServiceContainer, input: Option<&Path>) -> CliResult<()> {
    let engine = container.taxonomy(input.map(expand_path).as_deref())?;
    let tree = engine.tree();
    for leaf in tree.leaves(tree.root()) {
        if let Some(node) = tree.get(leaf) {
            output::info(&node.name);
        }
    }
    Ok(())
}

fn _config(container: &ServiceContainer, command: &ConfigCommands, config_file: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let text = container.settings.to_toml()?;
            output::info(&text);
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let path = global_config_path()
                .ok_or_else(|| CliError::Usage("cannot determine config directory".into()))?;
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "config already exists: {} (use --force to overwrite)",
                    path.display()
                )));
            }
            container.documents().write_text(&path, &Settings::template())?;
            output::action("Created", &path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            output::header("Config files (lowest to highest precedence)");
            match global_config_path() {
                Some(path) => output::detail(&format!("global: {}{}", path.display(), presence(&path))),
                None => output::detail(&"global: (no config directory)"),
            }
            if let Some(path) = config_file {
                let path = expand_path(path);
                output::detail(&format!("file:   {}{}", path.display(), presence(&path)));
            }
            output::detail(&"env:    JOBSTRUCT_<SECTION>__<KEY>");
            Ok(())
        }
    }
}

fn presence(path: &Path) -> &'static str {
    if path.exists() {
        ""
    } else {
        " (not found)"
    }
}

fn read_input(container: &ServiceContainer, input: &Path) -> CliResult<String> {
    if is_stdio(input) {
        return io::read_to_string(io::stdin()).map_err(|e| InfraError::io("read stdin", e).into());
    }
    Ok(container.documents().read_text(&expand_path(input))?)
}

fn write_output(container: &ServiceContainer, output: &Path, content: &str) -> CliResult<()> {
    if is_stdio(output) {
        let mut stdout = io::stdout().lock();
        return stdout
            .write_all(content.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| InfraError::io("write stdout", e).into());
    }
    let path = expand_path(output);
    container.documents().write_text(&path, content)?;
    output::action("Wrote", &path.display());
    Ok(())
}
