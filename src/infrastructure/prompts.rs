//! Prompt templates for the text-completion service.
//!
//! Templates use `{text}` for the primary input and `{skills}` for the
//! auxiliary input. Defaults are compiled in; configuration may replace any
//! of them by prompt name.

use std::collections::BTreeMap;

use crate::infrastructure::traits::PromptName;

const TEXT_PLACEHOLDER: &str = "{text}";
const SKILLS_PLACEHOLDER: &str = "{skills}";

pub const EXTRACT_TEMPLATE: &str = r#"Read the job posting inside the <text></text> tags and extract its information into the JSON schema shown in <schema></schema>. Be careful and thorough.
<instructions>
1. Read the posting line by line.
2. Find every sentence describing duties, responsibilities or requirements, including ones that are not labeled as such.
3. Do not summarize, truncate or invent anything.
4. Return JSON exactly in the shape of the schema.
</instructions>
<text>
{text}
</text>
<schema>
{
  "job_title": "the job title",
  "details": ["every duty and responsibility of the job"],
  "required": {
    "education": "lowest required education level",
    "major": ["required majors or fields of study"],
    "experience": "required years of experience as an integer",
    "qualifications": ["required qualifications, abilities, knowledge, skills, certifications, training and licenses"]
  },
  "preferred": {
    "education": "lowest preferred education level",
    "major": ["preferred majors or fields of study"],
    "experience": "preferred years of experience as an integer",
    "qualifications": ["preferred qualifications, abilities, knowledge, skills, certifications, training and licenses"]
  },
  "benefits": ["benefits offered"],
  "salary": ["salary or salary range as numbers"],
  "wage": ["wage or wage range as numbers"],
  "entry_level": "true if the job is entry level",
  "college_degree": "true if the job requires a college degree or equivalent",
  "full_time": "true if the job is full time",
  "remote": "true if the job offers remote work"
}
</schema>"#;

pub const SKILLS_TEMPLATE: &str = r#"Map each qualification in the job requirements inside <text></text> to the relevant skills from the taxonomy inside <skills></skills>. Map every qualification, and only choose skills after careful examination.
<text>
{text}
</text>
<skills>
{skills}
</skills>
Return the mapped skill names as a JSON list. Skip the preamble and the explanation."#;

pub const OCCUPATION_TEMPLATE: &str = r#"Select the most relevant Standard Occupational Classification (SOC) major group code for the job description inside <text></text>. Return two codes only if the description is genuinely ambiguous between them.
<text>
{text}
</text>
Return JSON in the form {"occupation": ["code"]}. Skip the preamble and the explanation."#;

pub const TAXONOMY_ENRICH_TEMPLATE: &str = r#"The skills taxonomy inside <tree></tree> contains a parent node and one leaf node. Expand only the leaf node with related skills, drawing on your knowledge of job postings.
<tree>
{text}
</tree>
<note>
- Return the response in the same JSON format as the tree, wrapped in <tree></tree>.
- Expand the leaf to whatever depth is useful, but add only relevant skills.
</note>
Check that every instruction was followed. Skip the preamble and the explanation."#;

pub const TAXONOMY_REFINE_TEMPLATE: &str = r#"Review the skills taxonomy inside <tree></tree>. Remove skills that are duplicates or too specific, and add important skills that are missing, including new and emerging skills in the labor market.
<tree>
{text}
</tree>
<note>
- Return the response in the same JSON format as the tree, wrapped in <tree></tree>.
</note>
Check that every instruction was followed. Skip the preamble and the explanation."#;

/// Immutable set of prompt templates, keyed by [`PromptName`].
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: BTreeMap<PromptName, String>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let templates = PromptName::ALL
            .into_iter()
            .map(|name| (name, default_template(name).to_string()))
            .collect();
        Self { templates }
    }
}

fn default_template(name: PromptName) -> &'static str {
    match name {
        PromptName::Extract => EXTRACT_TEMPLATE,
        PromptName::Skills => SKILLS_TEMPLATE,
        PromptName::Occupation => OCCUPATION_TEMPLATE,
        PromptName::TaxonomyEnrich => TAXONOMY_ENRICH_TEMPLATE,
        PromptName::TaxonomyRefine => TAXONOMY_REFINE_TEMPLATE,
    }
}

impl PromptCatalog {
    /// Default templates with `overrides` applied.
    ///
    /// Fails on an override whose key is not a known prompt name.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut catalog = Self::default();
        for (name, template) in overrides {
            let prompt: PromptName = name.parse()?;
            catalog.templates.insert(prompt, template.clone());
        }
        Ok(catalog)
    }

    pub fn template(&self, name: PromptName) -> &str {
        self.templates
            .get(&name)
            .map(String::as_str)
            .unwrap_or_else(|| default_template(name))
    }

    /// Fills the template for `name` with `text` and `auxiliary`.
    ///
    /// Placeholders are filled in one pass over the template; substituted
    /// values are never scanned for placeholders themselves.
    pub fn render(&self, name: PromptName, text: &str, auxiliary: Option<&str>) -> String {
        let mut rest = self.template(name);
        let mut rendered = String::with_capacity(rest.len() + text.len());
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix(TEXT_PLACEHOLDER) {
                rendered.push_str(text);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(SKILLS_PLACEHOLDER) {
                rendered.push_str(auxiliary.unwrap_or_default());
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);
        rendered
    }
}
