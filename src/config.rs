//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/jobstruct/jobstruct.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `JOBSTRUCT_*` prefix, `__` between section and key

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::segment::{default_rules, SegmentRule};
use crate::util::path::expand_path;

/// Text-completion endpoint and request policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key (never the key itself)
    pub api_key_env: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Whole-tree refinement produces long responses
    pub refine_timeout_secs: u64,
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".into(),
            model: "claude-3-haiku-20240307".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            api_version: "2023-06-01".into(),
            max_tokens: 4096,
            timeout_secs: 120,
            refine_timeout_secs: 600,
            max_retries: 3,
        }
    }
}

/// Taxonomy engine rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaxonomySettings {
    /// Generated node names ending with this are rejected as placeholders
    pub placeholder_suffix: String,
    pub refresh_names_on_refine: bool,
    /// Taxonomy used when no input is given; the bundled one if unset
    pub default_file: Option<PathBuf>,
}

impl Default for TaxonomySettings {
    fn default() -> Self {
        Self {
            placeholder_suffix: " Skills".into(),
            refresh_names_on_refine: true,
            default_file: None,
        }
    }
}

/// Posting segmentation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SegmentSettings {
    pub heading_max_words: usize,
    pub eeo_marker: String,
    /// Ordered: the first rule with a matching keyword wins
    pub rules: Vec<SegmentRule>,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            heading_max_words: 5,
            eeo_marker: "equal opportunity employer".into(),
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCompletionSettings {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub api_version: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub refine_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTaxonomySettings {
    pub placeholder_suffix: Option<String>,
    pub refresh_names_on_refine: Option<bool>,
    pub default_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSegmentSettings {
    pub heading_max_words: Option<usize>,
    pub eeo_marker: Option<String>,
    pub rules: Option<Vec<SegmentRule>>,
}

/// Raw settings for intermediate parsing; `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub completion: RawCompletionSettings,
    pub taxonomy: RawTaxonomySettings,
    pub segments: RawSegmentSettings,
    pub prompts: BTreeMap<String, String>,
}

/// Unified configuration for jobstruct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub taxonomy: TaxonomySettings,
    pub segments: SegmentSettings,
    /// Prompt template overrides keyed by prompt name
    pub prompts: BTreeMap<String, String>,
}

/// Get the XDG config directory for jobstruct.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "jobstruct").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("jobstruct.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl CompletionSettings {
    fn merge(&self, raw: &RawCompletionSettings) -> Self {
        Self {
            base_url: raw.base_url.clone().unwrap_or_else(|| self.base_url.clone()),
            model: raw.model.clone().unwrap_or_else(|| self.model.clone()),
            api_key_env: raw
                .api_key_env
                .clone()
                .unwrap_or_else(|| self.api_key_env.clone()),
            api_version: raw
                .api_version
                .clone()
                .unwrap_or_else(|| self.api_version.clone()),
            max_tokens: raw.max_tokens.unwrap_or(self.max_tokens),
            timeout_secs: raw.timeout_secs.unwrap_or(self.timeout_secs),
            refine_timeout_secs: raw.refine_timeout_secs.unwrap_or(self.refine_timeout_secs),
            max_retries: raw.max_retries.unwrap_or(self.max_retries),
        }
    }
}

impl TaxonomySettings {
    fn merge(&self, raw: &RawTaxonomySettings) -> Self {
        Self {
            placeholder_suffix: raw
                .placeholder_suffix
                .clone()
                .unwrap_or_else(|| self.placeholder_suffix.clone()),
            refresh_names_on_refine: raw
                .refresh_names_on_refine
                .unwrap_or(self.refresh_names_on_refine),
            default_file: raw.default_file.clone().or_else(|| self.default_file.clone()),
        }
    }
}

impl SegmentSettings {
    /// Rules REPLACE: their order is significant, so lists are never unioned.
    fn merge(&self, raw: &RawSegmentSettings) -> Self {
        Self {
            heading_max_words: raw.heading_max_words.unwrap_or(self.heading_max_words),
            eeo_marker: raw
                .eeo_marker
                .clone()
                .unwrap_or_else(|| self.eeo_marker.clone()),
            rules: raw.rules.clone().unwrap_or_else(|| self.rules.clone()),
        }
    }
}

impl Settings {
    /// Merge overlay config onto self (base).
    ///
    /// - Scalars: overlay wins if Some, otherwise keep base
    /// - Segment rules: replaced as a whole
    /// - Prompt overrides: merged per prompt name
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut prompts = self.prompts.clone();
        prompts.extend(overlay.prompts.clone());
        Self {
            completion: self.completion.merge(&overlay.completion),
            taxonomy: self.taxonomy.merge(&overlay.taxonomy),
            segments: self.segments.merge(&overlay.segments),
            prompts,
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `config_file` is the explicit `--config` file; it must exist when given.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), config_file)
    }

    /// Like [`Settings::load`] with an explicit global config location.
    ///
    /// A missing global file is skipped; a missing explicit file is an error.
    pub fn load_from(global: Option<&Path>, config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(path) = config_file {
            let path = expand_path(path);
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            let raw = load_raw_settings(&path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(path) = &self.taxonomy.default_file {
            self.taxonomy.default_file = Some(expand_path(path));
        }
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.segments.heading_max_words == 0 {
            return Err(ApplicationError::Config {
                message: "segments.heading_max_words must be at least 1".into(),
            });
        }
        if self.completion.max_tokens == 0 {
            return Err(ApplicationError::Config {
                message: "completion.max_tokens must be at least 1".into(),
            });
        }
        // every name ends with "", so a blank suffix would drop all generated children
        if self.taxonomy.placeholder_suffix.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "taxonomy.placeholder_suffix must not be blank".into(),
            });
        }
        Ok(())
    }

    /// Apply JOBSTRUCT_* environment variables as explicit overrides.
    ///
    /// Env vars replace values; lists (segment rules) are file-only.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("JOBSTRUCT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        let c = &mut settings.completion;
        if let Ok(val) = config.get_string("completion.base_url") {
            c.base_url = val;
        }
        if let Ok(val) = config.get_string("completion.model") {
            c.model = val;
        }
        if let Ok(val) = config.get_string("completion.api_key_env") {
            c.api_key_env = val;
        }
        if let Ok(val) = config.get_string("completion.api_version") {
            c.api_version = val;
        }
        if let Some(val) = env_number(&config, "completion.max_tokens")? {
            c.max_tokens = val;
        }
        if let Some(val) = env_number(&config, "completion.timeout_secs")? {
            c.timeout_secs = val;
        }
        if let Some(val) = env_number(&config, "completion.refine_timeout_secs")? {
            c.refine_timeout_secs = val;
        }
        if let Some(val) = env_number(&config, "completion.max_retries")? {
            c.max_retries = val;
        }

        let t = &mut settings.taxonomy;
        if let Ok(val) = config.get_string("taxonomy.placeholder_suffix") {
            t.placeholder_suffix = val;
        }
        if let Ok(val) = config.get_bool("taxonomy.refresh_names_on_refine") {
            t.refresh_names_on_refine = val;
        }
        if let Ok(val) = config.get_string("taxonomy.default_file") {
            t.default_file = Some(PathBuf::from(val));
        }

        let s = &mut settings.segments;
        if let Some(val) = env_number(&config, "segments.heading_max_words")? {
            s.heading_max_words = val;
        }
        if let Ok(val) = config.get_string("segments.eeo_marker") {
            s.eeo_marker = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# jobstruct configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/jobstruct/jobstruct.toml
#   File:   --config <FILE>
#   Env:    JOBSTRUCT_<SECTION>__<KEY>, e.g. JOBSTRUCT_COMPLETION__MODEL

[completion]
# base_url = "https://api.anthropic.com/v1"
# model = "claude-3-haiku-20240307"
# Environment variable that holds the API key
# api_key_env = "ANTHROPIC_API_KEY"
# api_version = "2023-06-01"
# max_tokens = 4096
# timeout_secs = 120
# refine_timeout_secs = 600
# max_retries = 3

[taxonomy]
# Generated node names with this suffix are rejected
# placeholder_suffix = " Skills"
# Recompute known names after a successful refinement
# refresh_names_on_refine = true
# Taxonomy used when no input is given (bundled O*NET skills if unset)
# default_file = "~/taxonomies/skills.json"

[segments]
# heading_max_words = 5
# eeo_marker = "equal opportunity employer"
# Ordered; the first rule with a matching keyword wins. Replaces the defaults.
# rules = [
#   { name = "qualifications", keywords = ["qualification", "skill"] },
#   { name = "benefits", keywords = ["benefit", "perk"] },
# ]

[prompts]
# Template overrides by prompt name; {text} and {skills} are placeholders.
# taxonomy_refine = "..."
"#
        .to_string()
    }
}

/// Numeric env override; present but unparsable is a config error.
fn env_number<T: std::str::FromStr>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get_string(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApplicationError::Config {
                message: format!("{key}: not a number: {raw}"),
            }),
        Err(_) => Ok(None),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load_from(None, None).expect("load defaults");
        assert_eq!(settings.taxonomy.placeholder_suffix, " Skills");
        assert!(settings.taxonomy.refresh_names_on_refine);
        assert_eq!(settings.segments.heading_max_words, 5);
        assert_eq!(settings.segments.rules.len(), 6);
    }

    #[test]
    fn given_partial_overlay_when_merging_then_unspecified_fields_inherit() {
        let base = Settings::default();
        let overlay: RawSettings = toml::from_str(
            r#"
            [completion]
            model = "other-model"
            [taxonomy]
            refresh_names_on_refine = false
            "#,
        )
        .unwrap();

        let result = base.merge_with(&overlay);

        assert_eq!(result.completion.model, "other-model");
        assert_eq!(result.completion.max_tokens, 4096);
        assert!(!result.taxonomy.refresh_names_on_refine);
        assert_eq!(result.taxonomy.placeholder_suffix, " Skills");
    }

    #[test]
    fn given_rules_in_overlay_when_merging_then_rules_replaced() {
        let overlay: RawSettings = toml::from_str(
            r#"
            [segments]
            rules = [{ name = "perks", keywords = ["perk"] }]
            "#,
        )
        .unwrap();

        let result = Settings::default().merge_with(&overlay);

        assert_eq!(result.segments.rules, vec![SegmentRule::new("perks", &["perk"])]);
    }

    #[test]
    fn given_prompt_overrides_in_two_layers_when_merging_then_keys_union() {
        let first: RawSettings = toml::from_str("[prompts]\nextract = \"a {text}\"").unwrap();
        let second: RawSettings = toml::from_str("[prompts]\nskills = \"b {text}\"").unwrap();

        let result = Settings::default().merge_with(&first).merge_with(&second);

        assert_eq!(result.prompts.len(), 2);
        assert_eq!(result.prompts["extract"], "a {text}");
    }

    #[test]
    fn given_tilde_in_default_file_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings::default();
        settings.taxonomy.default_file = Some(PathBuf::from("~/skills.json"));

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let path = settings.taxonomy.default_file.unwrap();
        assert!(path.starts_with(&home), "default_file should start with home: {}", path.display());
    }

    #[test]
    fn given_zero_heading_words_when_validating_then_config_error() {
        let mut settings = Settings::default();
        settings.segments.heading_max_words = 0;
        assert!(matches!(settings.validate(), Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_defaults_when_serializing_then_toml_round_trips() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsing_then_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.completion.model.is_none());
    }
}
