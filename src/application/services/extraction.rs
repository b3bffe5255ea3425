//! Job-posting extraction service
//!
//! Turns free-text postings into [`JobPosting`] records with the completion
//! service, then optionally maps them to taxonomy skills and occupation codes.

use std::sync::Arc;

use itertools::Itertools;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::application::ApplicationResult;
use crate::domain::payload::parse_structured;
use crate::domain::posting::{cast_list, cast_text};
use crate::domain::JobPosting;
use crate::infrastructure::traits::{PromptName, TextCompletion};

/// Optional follow-up steps after the base extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Taxonomy record to map qualifications onto; no skill mapping when `None`
    pub skills_taxonomy: Option<Value>,
    pub occupation: bool,
}

/// Service for structuring job postings.
pub struct ExtractionService {
    completion: Arc<dyn TextCompletion>,
}

impl ExtractionService {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    /// Extracts one posting. Blank text and unusable responses yield empty
    /// fields, never errors; completion transport failures propagate.
    #[instrument(level = "debug", skip(self, text, options), fields(bytes = text.len()))]
    pub fn extract(&self, text: &str, options: &ExtractOptions) -> ApplicationResult<JobPosting> {
        if text.trim().is_empty() {
            debug!("extract: blank posting, no request");
            return Ok(JobPosting::default());
        }
        let response = self.completion.complete(PromptName::Extract, text, None)?;
        let record = parse_structured(&response).unwrap_or_else(|| {
            warn!("extract: response unparsable, using empty record");
            Value::Object(Map::new())
        });
        let mut posting = JobPosting::from_extraction(&record);

        if !has_content(&posting) {
            debug!("extract: nothing extracted, skipping skills and occupation");
            return Ok(posting);
        }

        let summary = posting.summary_text();
        if let Some(taxonomy) = &options.skills_taxonomy {
            posting.skills = self.skills(&summary, taxonomy)?;
        }
        if options.occupation {
            posting.occupation = self.occupation(&summary)?;
        }
        Ok(posting)
    }

    /// Skill names the service maps `summary` to, sorted and de-duplicated.
    pub fn skills(&self, summary: &str, taxonomy: &Value) -> ApplicationResult<Vec<String>> {
        let response = self
            .completion
            .complete(PromptName::Skills, summary, Some(&taxonomy.to_string()))?;
        let skills = match parse_structured(&response) {
            Some(Value::Object(fields)) => cast_list(fields.get("skills"), cast_text),
            Some(list) => cast_list(Some(&list), cast_text),
            None => {
                warn!("skills: response unparsable");
                Vec::new()
            }
        };
        Ok(skills.into_iter().sorted().dedup().collect())
    }

    /// Occupation codes for `summary`, sorted and de-duplicated.
    pub fn occupation(&self, summary: &str) -> ApplicationResult<Vec<String>> {
        let response = self.completion.complete(PromptName::Occupation, summary, None)?;
        let codes = match parse_structured(&response) {
            Some(Value::Object(fields)) => cast_list(fields.get("occupation"), cast_text),
            Some(other) => {
                warn!("occupation: unexpected response shape: {}", other);
                Vec::new()
            }
            None => {
                warn!("occupation: response unparsable");
                Vec::new()
            }
        };
        Ok(codes.into_iter().sorted().dedup().collect())
    }
}

fn has_content(posting: &JobPosting) -> bool {
    posting.job_title.is_some()
        || !posting.details.is_empty()
        || !posting.required.qualifications.is_empty()
        || !posting.preferred.qualifications.is_empty()
}
