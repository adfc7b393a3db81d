//! Requirements model (`spec.md` §4.3, §4.3.A).
//!
//! Parses the hierarchical YAML requirements document into a read-only
//! scope tree. Grounded in `extract_reqs_from_yaml` in
//! `original_source/sources/workflow/requirements.py` (recursive: a
//! mapping with an `id` key is a leaf requirement, everything else
//! recurses), combined with `spec.md` §3's more elaborate typed shape: "a
//! title plus either a list of child scopes or a list of requirements
//! (never both)".

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub acceptance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeChildren {
    Scopes(Vec<RequirementScope>),
    Requirements(Vec<Requirement>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementScope {
    pub title: String,
    pub children: ScopeChildren,
}

impl RequirementScope {
    /// Flattens the tree into the full ordered requirement list.
    pub fn flatten(&self) -> Vec<&Requirement> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Requirement>) {
        match &self.children {
            ScopeChildren::Requirements(reqs) => out.extend(reqs.iter()),
            ScopeChildren::Scopes(scopes) => {
                for scope in scopes {
                    scope.collect(out);
                }
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<&Requirement> {
        self.flatten().into_iter().find(|r| r.id == id)
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.flatten().into_iter().map(|r| r.id.clone()).collect()
    }
}

#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error("requirements document not found at {0}")]
    NotFound(String),
    #[error("failed to read requirements document: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse requirements YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Parses the YAML document at `path` into a [`RequirementScope`] tree.
/// The document's top-level mapping becomes the root scope's title-less
/// children (the root itself carries an empty title — only internal nodes
/// and leaves have meaningful titles in the tree the tools expose).
pub fn parse_requirements_doc(path: &Path) -> Result<RequirementScope, RequirementsError> {
    if !path.exists() {
        return Err(RequirementsError::NotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&text)?;
    Ok(RequirementScope {
        title: "root".to_string(),
        children: parse_node(&raw),
    })
}

fn parse_node(value: &serde_yaml::Value) -> ScopeChildren {
    let serde_yaml::Value::Mapping(map) = value else {
        return ScopeChildren::Requirements(Vec::new());
    };

    // A sequence of requirement objects under this scope: every entry is a
    // mapping carrying an `id` key.
    let looks_like_requirements = map.values().all(|v| {
        matches!(v, serde_yaml::Value::Sequence(seq) if seq.iter().all(|e| {
            matches!(e, serde_yaml::Value::Mapping(m) if m.contains_key(serde_yaml::Value::String("id".into())))
        }))
    }) && !map.is_empty();

    if looks_like_requirements {
        let mut reqs = Vec::new();
        for v in map.values() {
            if let serde_yaml::Value::Sequence(seq) = v {
                for entry in seq {
                    if let Ok(req) = serde_yaml::from_value::<Requirement>(entry.clone()) {
                        reqs.push(req);
                    }
                }
            }
        }
        return ScopeChildren::Requirements(reqs);
    }

    let mut scopes = Vec::new();
    for (key, v) in map {
        let title = key.as_str().unwrap_or_default().to_string();
        scopes.push(RequirementScope { title, children: parse_node(v) });
    }
    ScopeChildren::Scopes(scopes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("program-requirements.yml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn flat_requirements_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            &dir,
            "functional:\n  - id: R1\n    title: T1\n    description: D1\n    acceptance: A1\n",
        );
        let tree = parse_requirements_doc(&path).unwrap();
        assert_eq!(tree.all_ids(), vec!["R1".to_string()]);
        assert_eq!(tree.find("R1").unwrap().title, "T1");
        assert!(tree.find("R2").is_none());
    }

    #[test]
    fn nested_scopes_parse_and_flatten() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            &dir,
            "ui:\n  forms:\n    - id: UI1\n      title: T\n      description: D\n      acceptance: A\n\
             backend:\n  - id: BE1\n    title: T2\n    description: D2\n    acceptance: A2\n",
        );
        let tree = parse_requirements_doc(&path).unwrap();
        let mut ids = tree.all_ids();
        ids.sort();
        assert_eq!(ids, vec!["BE1".to_string(), "UI1".to_string()]);
    }

    #[test]
    fn missing_document_errors() {
        let err = parse_requirements_doc(Path::new("/nonexistent/reqs.yml")).unwrap_err();
        assert!(matches!(err, RequirementsError::NotFound(_)));
    }
}
