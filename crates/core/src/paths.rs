//! Resolved directory bundle (`spec.md` §3 "Paths"), grounded in
//! `original_source/sources/LIFT/paths.py`.

use std::path::{Path, PathBuf};

/// Absolute directories computed once at startup from a root, an inputs
/// directory, and the PUT name. The `project` subtree is created by
/// [`crate::iteration::setup_new_project`] and mutated throughout the run;
/// `archive` is append-only.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    pub config: PathBuf,

    pub inputs: PathBuf,
    pub req_doc: PathBuf,
    pub eval_template: PathBuf,
    pub html_template: PathBuf,

    pub archive: PathBuf,
    pub conversation_archive: PathBuf,

    pub project: PathBuf,
    pub put: PathBuf,
    pub tests: PathBuf,
    pub reports: PathBuf,
}

impl Paths {
    pub fn new(root: &Path, inputs: &Path, put_name: &str) -> Self {
        let root = root.to_path_buf();
        let inputs = inputs.to_path_buf();
        let project = root.join("project");

        Self {
            config: root.join("config"),
            req_doc: inputs.join("program-requirements.yml"),
            eval_template: inputs.join("evaluation_template.md"),
            html_template: inputs.join("pytest_html_report.yml"),
            archive: root.join(".archive"),
            conversation_archive: root.join(".archive").join("conversations"),
            put: project.join(put_name),
            tests: project.join("tests"),
            reports: project.join("reports"),
            project,
            root,
            inputs,
        }
    }
}
