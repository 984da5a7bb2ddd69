//! Preferred spellings for common skills
//!
//! Tags are deduplicated by normalized key. The table maps a normalized key
//! (including a few well-known aliases) to the spelling the merged profile
//! should carry, so "postgres", "PostgreSQL" and "postgresql" collapse into
//! one "PostgreSQL" entry.

use dossier_common::normalize::normalize_key;
use std::collections::HashMap;

const BUILTIN: &[&str] = &[
    "AWS",
    "Angular",
    "Azure",
    "C#",
    "C++",
    "CI/CD",
    "CSS",
    "Django",
    "Docker",
    "FastAPI",
    "Flask",
    "GCP",
    "Git",
    "GitHub",
    "Go",
    "GraphQL",
    "HTML",
    "Java",
    "JavaScript",
    "Kubernetes",
    "Linux",
    "Machine Learning",
    "MongoDB",
    "MySQL",
    "Node.js",
    "PostgreSQL",
    "Python",
    "PyTorch",
    "React",
    "Redis",
    "REST",
    "Rust",
    "SQL",
    "SQLite",
    "Spring Boot",
    "TensorFlow",
    "Terraform",
    "TypeScript",
    "Vue.js",
];

const ALIASES: &[(&str, &str)] = &[
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("golang", "Go"),
    ("node", "Node.js"),
    ("nodejs", "Node.js"),
    ("node js", "Node.js"),
    ("postgres", "PostgreSQL"),
    ("k8s", "Kubernetes"),
    ("reactjs", "React"),
    ("react.js", "React"),
    ("vue", "Vue.js"),
    ("vuejs", "Vue.js"),
    ("ml", "Machine Learning"),
    ("amazon web services", "AWS"),
    ("google cloud", "GCP"),
];

/// Canonical skill table
#[derive(Debug, Clone)]
pub struct CanonicalSkills {
    by_key: HashMap<String, String>,
}

impl CanonicalSkills {
    /// Built-in table only.
    pub fn builtin() -> Self {
        let mut by_key = HashMap::new();
        for name in BUILTIN {
            by_key.insert(normalize_key(name), name.to_string());
        }
        for (alias, name) in ALIASES {
            by_key.insert(normalize_key(alias), name.to_string());
        }
        Self { by_key }
    }

    /// Built-in table plus extra preferred spellings; extras override.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut table = Self::builtin();
        for name in extra {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                table.by_key.insert(normalize_key(name), name.to_string());
            }
        }
        table
    }

    /// Empty table (plain normalized-key dedup)
    pub fn none() -> Self {
        Self {
            by_key: HashMap::new(),
        }
    }

    /// Preferred spelling for `tag`, if the table knows it.
    pub fn lookup(&self, tag: &str) -> Option<&str> {
        self.by_key.get(&normalize_key(tag)).map(String::as_str)
    }

    /// Dedup key: the canonical spelling's key when known, else the tag's own.
    pub fn key_of(&self, tag: &str) -> String {
        match self.lookup(tag) {
            Some(canonical) => normalize_key(canonical),
            None => normalize_key(tag),
        }
    }
}

impl Default for CanonicalSkills {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = CanonicalSkills::builtin();
        assert_eq!(table.lookup("python"), Some("Python"));
        assert_eq!(table.lookup("  NODE.JS "), Some("Node.js"));
        assert_eq!(table.lookup("communication"), None);
    }

    #[test]
    fn test_aliases_share_key() {
        let table = CanonicalSkills::builtin();
        assert_eq!(table.key_of("postgres"), table.key_of("PostgreSQL"));
        assert_eq!(table.key_of("k8s"), table.key_of("kubernetes"));
        assert_ne!(table.key_of("Java"), table.key_of("JavaScript"));
    }

    #[test]
    fn test_extra_entries_override() {
        let table = CanonicalSkills::with_extra(&["GOLANG", "Elixir"]);
        assert_eq!(table.lookup("golang"), Some("GOLANG"));
        assert_eq!(table.lookup("elixir"), Some("Elixir"));
    }
}
