use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A regulatory requirement from the catalogue.
///
/// Requirements are owned by an external catalogue and are immutable for the
/// duration of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    /// Clause label within the standard, e.g. "4.4" or "7.1".
    pub clause: String,
    /// Thematic category, e.g. "risk management planning".
    pub category: String,
    pub title: String,
    /// Full requirement text.
    pub text: String,
    /// What an auditor accepts as satisfying the requirement.
    pub acceptance_criteria: String,
    pub priority: Priority,
    /// Keywords and phrases used for keyword retrieval and relevance scoring.
    pub evaluation_hints: Vec<String>,
    /// Artifact types a compliant document typically provides for this clause.
    pub typical_artifact_types: Vec<ArtifactType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Kind of document excerpt an evidence chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Text,
    Table,
    Figure,
    CrossReference,
}

impl ArtifactType {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactType::Text => "text",
            ArtifactType::Table => "table",
            ArtifactType::Figure => "figure",
            ArtifactType::CrossReference => "cross-reference",
        }
    }
}

/// Document-level context supplied by the external context provider.
///
/// The flags are opaque to the engine; they are forwarded verbatim into the
/// judgement prompt (e.g. "mentions risk management plan: true").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentContext {
    pub document_name: String,
    pub document_type: Option<String>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    pub summary: Option<String>,
}
