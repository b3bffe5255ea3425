//! Taxonomy engine
//!
//! Owns a skills tree and grows it with a text-completion service: `enrich`
//! expands every leaf with one request each, `refine` rewrites the whole tree
//! in a single request. Responses are untrusted: every one is parsed and
//! validated in isolation, and a bad response never corrupts the tree.

use std::collections::HashSet;
use std::fmt;

use generational_arena::Index;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::application::ApplicationResult;
use crate::config::TaxonomySettings;
use crate::domain::codec;
use crate::domain::payload::parse_tree_payload;
use crate::domain::{DomainError, SkillsTree, TERMINAL_ATTRIBUTE};
use crate::infrastructure::traits::{PromptName, TextCompletion};

/// Bundled default taxonomy: one child per O*NET skill.
const DEFAULT_TAXONOMY: &str = include_str!("../../../data/onet_taxonomy.json");

/// Rules the engine applies to generated trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRules {
    /// Generated children whose name ends with this are category placeholders and are dropped
    pub placeholder_suffix: String,
    /// Recompute the known-name set after a successful refinement
    pub refresh_names_on_refine: bool,
}

impl Default for TaxonomyRules {
    fn default() -> Self {
        Self {
            placeholder_suffix: " Skills".into(),
            refresh_names_on_refine: true,
        }
    }
}

impl From<&TaxonomySettings> for TaxonomyRules {
    fn from(settings: &TaxonomySettings) -> Self {
        Self {
            placeholder_suffix: settings.placeholder_suffix.clone(),
            refresh_names_on_refine: settings.refresh_names_on_refine,
        }
    }
}

/// What happened to one leaf during an enrichment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOutcome {
    /// Children were attached; `duplicate` means they were marked terminal.
    Expanded { added: usize, duplicate: bool },
    SkippedTerminal,
    /// The response held no parseable payload.
    Unparsable,
    /// The payload parsed but failed validation.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafReport {
    pub leaf: String,
    pub outcome: LeafOutcome,
}

/// Per-leaf account of one or more enrichment passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub leaves: Vec<LeafReport>,
}

impl EnrichReport {
    /// Total number of children attached.
    pub fn added(&self) -> usize {
        self.leaves
            .iter()
            .map(|r| match r.outcome {
                LeafOutcome::Expanded { added, .. } => added,
                _ => 0,
            })
            .sum()
    }

    pub fn expanded(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::Expanded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::SkippedTerminal))
    }

    /// Leaves whose response was unparsable or rejected.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::Unparsable | LeafOutcome::Rejected { .. }))
    }

    fn count(&self, pred: impl Fn(&LeafOutcome) -> bool) -> usize {
        self.leaves.iter().filter(|r| pred(&r.outcome)).count()
    }

    fn extend(&mut self, other: EnrichReport) {
        self.leaves.extend(other.leaves);
    }
}

impl fmt::Display for EnrichReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} leaves visited: {} expanded ({} nodes added), {} terminal, {} failed",
            self.leaves.len(),
            self.expanded(),
            self.added(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Result of a refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    /// The tree was replaced by one with `nodes` nodes.
    Replaced { nodes: usize },
    /// The response was unusable; the previous tree is kept.
    Unchanged { reason: String },
}

impl fmt::Display for RefineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefineOutcome::Replaced { nodes } => write!(f, "taxonomy replaced ({nodes} nodes)"),
            RefineOutcome::Unchanged { reason } => write!(f, "taxonomy unchanged: {reason}"),
        }
    }
}

/// Skills taxonomy plus the names it held when last (re)built.
pub struct TaxonomyEngine {
    tree: SkillsTree,
    known_names: HashSet<String>,
    rules: TaxonomyRules,
}

impl TaxonomyEngine {
    /// Decodes `record`, or the bundled default taxonomy when `None`.
    pub fn new(record: Option<Value>, rules: TaxonomyRules) -> ApplicationResult<Self> {
        let record = match record {
            Some(record) => record,
            None => serde_json::from_str(DEFAULT_TAXONOMY)
                .map_err(|e| DomainError::malformed("<bundled>", e.to_string()))?,
        };
        let tree = codec::decode(&record)?;
        let known_names = tree.names(tree.root()).into_iter().collect();
        debug!("new: {} nodes, depth {}", tree.node_count(), tree.depth());
        Ok(Self {
            tree,
            known_names,
            rules,
        })
    }

    pub fn tree(&self) -> &SkillsTree {
        &self.tree
    }

    /// Names used for duplicate detection.
    pub fn known_names(&self) -> &HashSet<String> {
        &self.known_names
    }

    pub fn rules(&self) -> &TaxonomyRules {
        &self.rules
    }

    /// The whole tree in persisted form, attributes included.
    pub fn to_record(&self) -> Value {
        codec::encode(&self.tree, true)
    }

    /// Expands every non-terminal leaf once.
    ///
    /// Leaves are snapshotted before the first request, so children added in
    /// this pass are not visited again. Bad responses are reported per leaf;
    /// only completion transport errors abort the pass.
    #[instrument(level = "debug", skip(self, completion))]
    pub fn enrich(&mut self, completion: &dyn TextCompletion) -> ApplicationResult<EnrichReport> {
        let leaves = self.tree.leaves(self.tree.root());
        info!("enrich: {} leaves", leaves.len());

        let mut report = EnrichReport::default();
        for leaf in leaves {
            let name = self
                .tree
                .get(leaf)
                .map(|n| n.name.clone())
                .ok_or_else(|| DomainError::InvariantViolation("leaf vanished during enrichment".into()))?;
            let outcome = self.enrich_leaf(completion, leaf, &name)?;
            match &outcome {
                LeafOutcome::Expanded { added, duplicate } => {
                    debug!("enrich: '{}' +{} (duplicate={})", name, added, duplicate)
                }
                LeafOutcome::SkippedTerminal => info!("enrich: '{}' is terminal, skipped", name),
                LeafOutcome::Unparsable => warn!("enrich: '{}' response unparsable, skipped", name),
                LeafOutcome::Rejected { reason } => warn!("enrich: '{}' rejected: {}", name, reason),
            }
            report.leaves.push(LeafReport { leaf: name, outcome });
        }

        info!("enrich: {}", report);
        Ok(report)
    }

    /// Runs up to `passes` enrichment passes, stopping after one that adds nothing.
    pub fn enrich_passes(
        &mut self,
        completion: &dyn TextCompletion,
        passes: usize,
    ) -> ApplicationResult<EnrichReport> {
        let mut report = EnrichReport::default();
        for pass in 1..=passes {
            let pass_report = self.enrich(completion)?;
            let added = pass_report.added();
            report.extend(pass_report);
            if added == 0 {
                debug!("enrich_passes: pass {} added nothing, stopping", pass);
                break;
            }
        }
        Ok(report)
    }

    fn enrich_leaf(
        &mut self,
        completion: &dyn TextCompletion,
        leaf: Index,
        name: &str,
    ) -> ApplicationResult<LeafOutcome> {
        if self.tree.is_terminal(leaf) {
            return Ok(LeafOutcome::SkippedTerminal);
        }
        let Some(query) = self.leaf_query(leaf, name) else {
            return Ok(LeafOutcome::Rejected {
                reason: "the root has no parent to expand under".into(),
            });
        };

        let response = completion.complete(PromptName::TaxonomyEnrich, &query.to_string(), None)?;

        let Some(payload) = parse_tree_payload(&response) else {
            return Ok(LeafOutcome::Unparsable);
        };
        let expansion = match validate_expansion(&payload, name) {
            Ok(expansion) => expansion,
            Err(e) => {
                return Ok(LeafOutcome::Rejected {
                    reason: e.to_string(),
                })
            }
        };

        Ok(self.attach_expansion(leaf, &expansion)?)
    }

    /// `{"name": parent, "children": {"name": leaf}}`
    fn leaf_query(&self, leaf: Index, name: &str) -> Option<Value> {
        let parent = self.tree.get(leaf)?.parent?;
        let parent_name = &self.tree.get(parent)?.name;
        Some(json!({
            "name": parent_name,
            "children": {"name": name},
        }))
    }

    /// Grafts the expansion's grandchildren below `leaf`, skipping placeholders.
    fn attach_expansion(&mut self, leaf: Index, expansion: &SkillsTree) -> Result<LeafOutcome, DomainError> {
        let expanded = single_child(expansion)
            .ok_or_else(|| DomainError::InvariantViolation("validated expansion lost its child".into()))?;

        // Descendant names of the expanded leaf, not the leaf itself.
        let duplicate = expansion
            .iter_from(expanded)
            .skip(1)
            .any(|(_, node)| self.known_names.contains(&node.name));

        let candidates = expansion
            .get(expanded)
            .map(|n| n.children.clone())
            .unwrap_or_default();

        let mut added = 0;
        for candidate in candidates {
            let Some(node) = expansion.get(candidate) else {
                continue;
            };
            if self.is_placeholder(&node.name) {
                debug!("enrich: dropping placeholder '{}'", node.name);
                continue;
            }
            let attached = self.tree.graft(leaf, expansion, candidate)?;
            self.tree
                .set_attribute(attached, TERMINAL_ATTRIBUTE, Value::Bool(duplicate))?;
            added += 1;
        }

        Ok(LeafOutcome::Expanded { added, duplicate })
    }

    fn is_placeholder(&self, name: &str) -> bool {
        let suffix = &self.rules.placeholder_suffix;
        !suffix.is_empty() && name.ends_with(suffix.as_str())
    }

    /// Replaces the whole tree with the service's rewrite of it.
    ///
    /// All or nothing: on any unusable response the current tree is kept.
    #[instrument(level = "debug", skip(self, completion))]
    pub fn refine(&mut self, completion: &dyn TextCompletion) -> ApplicationResult<RefineOutcome> {
        let record = self.to_record();
        let response = completion.complete(PromptName::TaxonomyRefine, &record.to_string(), None)?;

        let Some(payload) = parse_tree_payload(&response) else {
            warn!("refine: response unparsable, keeping current taxonomy");
            return Ok(RefineOutcome::Unchanged {
                reason: "response held no parseable tree".into(),
            });
        };
        let refined = match codec::decode(&payload) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("refine: {}, keeping current taxonomy", e);
                return Ok(RefineOutcome::Unchanged { reason: e.to_string() });
            }
        };

        self.tree = refined;
        if self.rules.refresh_names_on_refine {
            self.known_names = self.tree.names(self.tree.root()).into_iter().collect();
        }
        let nodes = self.tree.node_count();
        info!("refine: taxonomy replaced ({} nodes)", nodes);
        Ok(RefineOutcome::Replaced { nodes })
    }
}

impl fmt::Display for TaxonomyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)
    }
}

/// Decodes `payload` and checks it expands exactly the leaf `leaf_name`.
fn validate_expansion(payload: &Value, leaf_name: &str) -> Result<SkillsTree, DomainError> {
    let expansion = codec::decode(payload)?;
    let children = expansion
        .get(expansion.root())
        .map(|n| n.children.len())
        .unwrap_or(0);
    if children != 1 {
        return Err(DomainError::PromptValidation {
            leaf: leaf_name.to_string(),
            reason: format!("expected exactly one child, got {children}"),
        });
    }
    let child_name = single_child(&expansion)
        .and_then(|c| expansion.get(c))
        .map(|n| n.name.as_str())
        .unwrap_or_default();
    if child_name != leaf_name {
        return Err(DomainError::PromptValidation {
            leaf: leaf_name.to_string(),
            reason: format!("child is named '{child_name}'"),
        });
    }
    Ok(expansion)
}

fn single_child(tree: &SkillsTree) -> Option<Index> {
    match tree.get(tree.root())?.children.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}
