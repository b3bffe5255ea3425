//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Structure job postings and grow a skills taxonomy with a text-completion service
#[derive(Parser, Debug)]
#[command(name = "jobstruct")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Config file, layered over the global one
    #[arg(long, global = true, env = "JOBSTRUCT_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract structured job postings from text files
    Extract {
        /// Posting text files (`-` for stdin)
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,

        /// Output file (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,

        /// Map qualifications onto this taxonomy (`default` for the configured one)
        #[arg(long, value_name = "TAXONOMY")]
        skills: Option<PathBuf>,

        /// Also classify the occupation
        #[arg(long)]
        occupation: bool,
    },

    /// Split posting text files into segments
    Segment {
        /// Posting text files (`-` for stdin)
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,

        /// Output file (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },

    /// Expand every non-terminal leaf of a taxonomy
    Enrich {
        /// Taxonomy JSON (default: configured or bundled taxonomy)
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,

        /// Output file (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,

        /// Maximum number of passes; stops early when a pass adds nothing
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
        passes: u16,
    },

    /// Have the whole taxonomy reviewed and rewritten
    Refine {
        /// Taxonomy JSON (default: configured or bundled taxonomy)
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,

        /// Output file (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },

    /// Show a taxonomy as a tree
    Show {
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },

    /// List the leaves of a taxonomy
    Leaves {
        #[arg(value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Create the global config file from a template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show config file locations
    Path,
}
