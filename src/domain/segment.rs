//! Heading-driven segmentation of job-posting text.
//!
//! A short block (a heading) selects the current segment by keyword
//! membership; longer blocks are appended line by line to that segment.

use std::collections::HashSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::trace;

/// Catch-all segment for headings that match no rule.
pub const OTHER_SEGMENT: &str = "other";

/// Segment that collects equal-opportunity statements.
pub const EEO_SEGMENT: &str = "eeo";

/// A named segment and the heading keywords that select it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl SegmentRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Keyword table used when no configuration overrides it. Order decides ties.
pub fn default_rules() -> Vec<SegmentRule> {
    vec![
        SegmentRule::new(
            "description",
            &["description", "overview", "glance", "summary", "posting"],
        ),
        SegmentRule::new("benefits", &["perks", "benefits", "offer"]),
        SegmentRule::new(
            "qualifications",
            &["experience", "qualification", "qualifications", "skills"],
        ),
        SegmentRule::new(
            "responsibilities",
            &["responsibilities", "duties", "functions", "function(s)"],
        ),
        SegmentRule::new("requirements", &["requirements", "required", "requirement"]),
        SegmentRule::new(EEO_SEGMENT, &["equal", "opportunity", "employer"]),
    ]
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    keywords: HashSet<String>,
}

/// Maps heading text to a segment name; first matching rule wins.
#[derive(Debug, Clone)]
pub struct SegmentClassifier {
    rules: Vec<CompiledRule>,
    heading_max_words: usize,
    eeo_marker: String,
}

impl SegmentClassifier {
    pub fn new(rules: &[SegmentRule], heading_max_words: usize, eeo_marker: &str) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                name: rule.name.clone(),
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self {
            rules,
            heading_max_words,
            eeo_marker: eeo_marker.to_lowercase(),
        }
    }

    /// Segment names in declared order, followed by `other`.
    pub fn segment_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();
        if !names.contains(&OTHER_SEGMENT) {
            names.push(OTHER_SEGMENT);
        }
        names
    }

    /// Whether `text` is short enough to be treated as a heading.
    pub fn is_heading(&self, text: &str) -> bool {
        text.split_whitespace().count() <= self.heading_max_words
    }

    /// Classifies a heading, ignoring case and trailing colons on each word.
    pub fn classify(&self, heading: &str) -> &str {
        let lowered = heading.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(|word| word.trim_end_matches(':'))
            .collect();
        self.rules
            .iter()
            .find(|rule| tokens.iter().any(|t| rule.keywords.contains(*t)))
            .map(|rule| rule.name.as_str())
            .unwrap_or(OTHER_SEGMENT)
    }

    /// Splits posting blocks into segments.
    ///
    /// Headings switch the current segment (initially `other`); body lines
    /// containing the EEO marker always land in `eeo`.
    pub fn segment<'a, I>(&self, blocks: I) -> SegmentedPosting
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut posting = SegmentedPosting::new(self.segment_names());
        let mut current = OTHER_SEGMENT.to_string();

        for block in blocks {
            let text = block.trim();
            if text.is_empty() {
                continue;
            }
            if self.is_heading(text) {
                current = self.classify(text).to_string();
                trace!("heading '{}' -> {}", text, current);
                continue;
            }
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if line.to_lowercase().contains(&self.eeo_marker) {
                    posting.push(EEO_SEGMENT, line);
                } else {
                    posting.push(&current, line);
                }
            }
        }
        posting
    }
}

impl Default for SegmentClassifier {
    fn default() -> Self {
        Self::new(&default_rules(), 5, "equal opportunity employer")
    }
}

/// Lines of a posting grouped by segment, in declared segment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedPosting {
    segments: Vec<(String, Vec<String>)>,
}

impl SegmentedPosting {
    fn new(names: Vec<&str>) -> Self {
        Self {
            segments: names.into_iter().map(|n| (n.to_string(), Vec::new())).collect(),
        }
    }

    fn push(&mut self, segment: &str, line: &str) {
        match self.segments.iter_mut().find(|(name, _)| name == segment) {
            Some((_, lines)) => lines.push(line.to_string()),
            None => self.segments.push((segment.to_string(), vec![line.to_string()])),
        }
    }

    pub fn get(&self, segment: &str) -> &[String] {
        self.segments
            .iter()
            .find(|(name, _)| name == segment)
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.segments.iter().map(|(n, l)| (n.as_str(), l.as_slice()))
    }
}

impl Serialize for SegmentedPosting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.segments.len()))?;
        for (name, lines) in &self.segments {
            map.serialize_entry(name, lines)?;
        }
        map.end()
    }
}
