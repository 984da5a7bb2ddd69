//! Instruction schemas sent to the extraction service

use dossier_common::profile::SourceType;

/// Which instruction set a request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionRole {
    /// Free-form career document (resume, CV, pasted text)
    Resume,
    /// JSON payload from a network-profile provider
    NetworkProfile,
    /// Project write-up or portfolio
    ProjectDocument,
    /// Merge of several partial profiles into one
    MultiSourceMerge,
}

impl InstructionRole {
    /// Instruction set for extracting a partial profile from `source_type`.
    pub fn for_source(source_type: SourceType) -> Self {
        match source_type {
            SourceType::Linkedin | SourceType::Github | SourceType::PersonalWebsite => {
                InstructionRole::NetworkProfile
            }
            SourceType::ProjectDocument | SourceType::Portfolio => InstructionRole::ProjectDocument,
            SourceType::Resume | SourceType::OtherDocument | SourceType::ManualText => {
                InstructionRole::Resume
            }
        }
    }

    pub fn instructions(&self) -> String {
        let task = match self {
            InstructionRole::Resume => RESUME_TASK,
            InstructionRole::NetworkProfile => NETWORK_TASK,
            InstructionRole::ProjectDocument => PROJECT_TASK,
            InstructionRole::MultiSourceMerge => MERGE_TASK,
        };
        format!("{}\n\n{}\n\n{}", task, PROFILE_SCHEMA, OUTPUT_RULES)
    }
}

const RESUME_TASK: &str = "You extract structured career information from a resume or \
similar document. Use only facts stated in the document.";

const NETWORK_TASK: &str = "You extract structured career information from a JSON export of \
a professional network profile. Map the provider's fields onto the schema below and drop \
anything that does not fit.";

const PROJECT_TASK: &str = "You extract structured career information from a project \
document or portfolio. Focus on projects, the technologies used and the author's role; \
fill other fields only when the document states them.";

const MERGE_TASK: &str = "You merge several partial career profiles of the same person into \
one profile. The input lists the sources most recent first, followed by a rule-based \
baseline merge. Keep every distinct fact, remove duplicates, prefer the most complete \
value and, when values conflict, the most recent source. Keep the `source` tag of every \
record.";

const PROFILE_SCHEMA: &str = r#"Schema:
{
  "schema_version": 1,
  "name": string, "email": string, "phone": string, "location": string,
  "summary": string, "about": string,
  "skills": [string], "technical_skills": [string], "soft_skills": [string],
  "interests": [string], "languages": [string],
  "experience": [{"job_title", "company", "location", "start_date", "end_date",
                  "is_current": bool, "description", "highlights": [string], "source"}],
  "education": [{"degree", "field_of_study", "institution", "location", "start_date",
                 "end_date", "grade", "description", "source"}],
  "certifications": [{"name", "issuer", "issue_date", "expiry_date", "credential_id",
                      "url", "description", "source"}],
  "projects": [{"name", "role", "description", "technologies": [string], "url",
                "start_date", "end_date", "is_current": bool, "source"}],
  "linkedin_url": string, "github_url": string, "website_url": string, "portfolio_url": string
}"#;

const OUTPUT_RULES: &str = "Rules: respond with a single JSON object and nothing else. Dates \
are \"YYYY-MM\" or \"YYYY\", or \"Present\" for an ongoing end date. Omit fields you cannot \
fill instead of inventing values.";
