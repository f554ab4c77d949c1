//! Stage validators.
//!
//! Pure gating functions over a read-only document snapshot. The
//! driver never consults these; only the approval entry point does.
//! Every failing rule is reported, not just the first, so one
//! approval round trip surfaces everything the author has to fix.

use quillflow_store::{DocName, Stage, DOC_NAMES};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Read-only view of a session's documents: name -> content.
pub type DocSnapshot = BTreeMap<DocName, String>;

/// Validation verdict with all failing rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub ok: bool,
    pub reasons: Vec<String>,
}

impl Validation {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            ok: reasons.is_empty(),
            reasons,
        }
    }
}

/// Required section headings per stage document.
pub fn required_sections(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Brief => &["## Project", "## Goals", "## Constraints"],
        Stage::Requirements => &[
            "## Overview",
            "## Functional Requirements",
            "## Out of Scope",
            "## Acceptance Criteria",
        ],
        Stage::Blueprint => &["## Architecture", "## Components", "## Data Flow"],
        Stage::Workplan => &["## Milestones", "## Tasks"],
        Stage::Handoff => &["## Documents", "## Assets"],
    }
}

fn req_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"REQ-\d+").expect("valid requirement id pattern"))
}

/// Requirement identifiers (`REQ-NNN`) appearing in a document, in
/// order of first appearance, deduplicated.
pub fn extract_req_ids(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in req_id_pattern().find_iter(content) {
        let id = m.as_str().to_string();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Validate one stage against the document snapshot.
pub fn validate_stage(stage: Stage, docs: &DocSnapshot) -> Validation {
    let mut reasons = Vec::new();

    let Some(content) = doc_content(docs, stage.doc(), &mut reasons) else {
        // Without the stage's own document nothing else is checkable.
        return Validation::from_reasons(reasons);
    };

    check_sections(stage, content, &mut reasons);

    match stage {
        Stage::Brief => {}
        Stage::Requirements => {
            if extract_req_ids(content).is_empty() {
                reasons.push(
                    "requirements.md does not define any requirement id (REQ-NNN)".to_string(),
                );
            }
        }
        Stage::Blueprint => {
            check_req_references(docs, content, DocName::Blueprint, &mut reasons);
        }
        Stage::Workplan => {
            if !content.lines().any(|l| l.trim_start().starts_with("- [ ]")) {
                reasons.push("workplan.md contains no open task checkboxes".to_string());
            }
            check_req_references(docs, content, DocName::Workplan, &mut reasons);
        }
        Stage::Handoff => {
            for name in DOC_NAMES.iter().filter(|n| **n != DocName::Handoff) {
                if !content.contains(name.file_name()) {
                    reasons.push(format!(
                        "handoff.md does not list {}",
                        name.file_name()
                    ));
                }
            }
        }
    }

    Validation::from_reasons(reasons)
}

/// Present-and-non-empty check; pushes a reason naming the document.
fn doc_content<'a>(
    docs: &'a DocSnapshot,
    name: DocName,
    reasons: &mut Vec<String>,
) -> Option<&'a String> {
    match docs.get(&name) {
        Some(content) if !content.trim().is_empty() => Some(content),
        _ => {
            reasons.push(format!(
                "required document {} is missing or empty",
                name.file_name()
            ));
            None
        }
    }
}

fn check_sections(stage: Stage, content: &str, reasons: &mut Vec<String>) {
    for heading in required_sections(stage) {
        if !content.contains(heading) {
            reasons.push(format!(
                "{} is missing required section {heading:?}",
                stage.doc().file_name()
            ));
        }
    }
}

/// Coherence rule: the document must reference at least one
/// requirement id defined upstream. Skipped when requirements.md
/// itself defines none (that failure is reported on its own stage).
fn check_req_references(
    docs: &DocSnapshot,
    content: &str,
    doc: DocName,
    reasons: &mut Vec<String>,
) {
    let upstream = docs
        .get(&DocName::Requirements)
        .map(|c| extract_req_ids(c))
        .unwrap_or_default();
    if upstream.is_empty() {
        return;
    }
    if !upstream.iter().any(|id| content.contains(id.as_str())) {
        reasons.push(format!(
            "{} does not reference any requirement id from requirements.md",
            doc.file_name()
        ));
    }
}
