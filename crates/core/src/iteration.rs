//! Project setup and the top-level iteration engine (`spec.md` §4.9,
//! §4.9.A). Grounded in `original_source/sources/LIFT/utils.py`
//! (`check_inputs`, `setup_new_project`, `execute_tests`,
//! `rm_report_temps`) and `sources/LIFT/process.py::Process.run`.

use std::sync::Arc;

use thiserror::Error;

use lift_config::Configuration;
use lift_provider::provider_for;

use crate::agent::{AgentError, AgentRuntime};
use crate::agents::{
    debugger_instruction, evaluator_instruction, generator_instruction, load_prompts, DebuggerTermination,
    EvaluatorTermination, GeneratorState, GeneratorTermination,
};
use crate::archive::{archive_agent, archive_reports, archive_suite, archive_tests, copy_dir_recursive, SuiteType};
use crate::agent::AgentResult;
use crate::paths::Paths;
use crate::requirements::{parse_requirements_doc, RequirementScope};
use crate::tools::{ToolContext, ToolRegistry};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("project directory already exists at {0}")]
    ProjectAlreadyExists(String),
    #[error("missing prompt file: {0}")]
    MissingPrompt(String),
    #[error("missing PUT HTML report template at {0}")]
    MissingHtmlTemplate(String),
    #[error("PUT source directory not found or not a directory at {0}")]
    MissingPut(String),
    #[error("requirements document not found at {0}")]
    MissingRequirementsDoc(String),
    #[error("evaluation template not found at {0}")]
    MissingEvalTemplate(String),
    #[error("I/O error during project setup: {0}")]
    Io(#[from] std::io::Error),
}

/// Validates every input artifact LIFT needs before a single file is
/// written, in the exact order the Python reference checks them so the
/// first reported failure always matches.
pub fn check_inputs(paths: &Paths, put_name: &str) -> Result<(), SetupError> {
    if paths.project.exists() {
        return Err(SetupError::ProjectAlreadyExists(paths.project.display().to_string()));
    }
    for name in ["generator.md", "debugger.md", "evaluator.md"] {
        let p = paths.inputs.join(name);
        if !p.exists() {
            return Err(SetupError::MissingPrompt(p.display().to_string()));
        }
    }
    if !paths.html_template.exists() {
        return Err(SetupError::MissingHtmlTemplate(paths.html_template.display().to_string()));
    }
    let put_src = paths.inputs.join(put_name);
    if !put_src.is_dir() {
        return Err(SetupError::MissingPut(put_src.display().to_string()));
    }
    if !paths.req_doc.exists() {
        return Err(SetupError::MissingRequirementsDoc(paths.req_doc.display().to_string()));
    }
    if !paths.eval_template.exists() {
        return Err(SetupError::MissingEvalTemplate(paths.eval_template.display().to_string()));
    }
    Ok(())
}

/// Materializes the project working tree: copies the PUT, fills the
/// coverage/report-directory placeholders in the HTML report template, and
/// creates every archive/test/report subdirectory the rest of the run
/// assumes exists.
pub fn setup_new_project(paths: &Paths, put_name: &str, requirement_ids: &[String]) -> Result<(), SetupError> {
    std::fs::create_dir_all(&paths.project)?;
    copy_dir_recursive(&paths.inputs.join(put_name), &paths.put)?;
    std::fs::copy(&paths.eval_template, paths.project.join("evaluation_template.md"))?;

    std::fs::create_dir_all(&paths.config)?;
    std::fs::create_dir_all(&paths.archive)?;
    std::fs::create_dir_all(&paths.conversation_archive)?;
    std::fs::create_dir_all(&paths.tests)?;
    std::fs::create_dir_all(&paths.reports)?;

    let template = std::fs::read_to_string(&paths.html_template)?;
    let filled = template
        .replace("<<REPORT_DIR>>", &paths.reports.display().to_string())
        .replace("<<REQUIREMENT_IDS>>", &requirement_ids.join(", "));
    std::fs::write(paths.project.join("pytest_html_report.yml"), filled)?;
    Ok(())
}

/// Removes the `*.json` temp files the pytest-html-report plugin leaves in
/// the reports directory after each run, so stale files never leak into
/// the next iteration's archive.
pub fn rm_report_temps(paths: &Paths) -> std::io::Result<()> {
    if !paths.reports.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&paths.reports)?.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Runs the test suite against the PUT via `pytest`, writing a JUnit
/// execution report and a Cobertura coverage report into `paths.reports`.
/// Returns whether the run passed (exit code zero) — no output is
/// streamed back to the caller, matching `spec.md` §6's "there is no
/// agent-facing output" for this subprocess.
pub async fn execute_tests(paths: &Paths, put_name: &str) -> std::io::Result<bool> {
    std::fs::create_dir_all(&paths.reports)?;
    let status = tokio::process::Command::new("pytest")
        .current_dir(&paths.project)
        .arg(paths.tests.display().to_string())
        .arg(format!("--junitxml={}", paths.reports.join("execution-report.xml").display()))
        .arg(format!("--cov={put_name}"))
        .arg(format!("--cov-report=xml:{}", paths.reports.join("coverage-report.xml").display()))
        .status()
        .await?;
    rm_report_temps(paths)?;
    Ok(status.success())
}

#[derive(Debug, Error)]
pub enum IterationError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Requirements(#[from] crate::requirements::RequirementsError),
    #[error(transparent)]
    Archive(#[from] crate::archive::ArchiveError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("failed to load agent system prompts: {0}")]
    PromptLoad(std::io::Error),
    #[error("test runner failed: {0}")]
    TestRunner(#[from] std::io::Error),
}

/// Drives the Generator/Debugger/Evaluator state machine across up to
/// `max_iterations` rounds (`spec.md` §4.9).
pub struct IterationEngine {
    config: Configuration,
    paths: Paths,
    requirements: Arc<RequirementScope>,
    tools: ToolRegistry,
    generator_prompt: String,
    debugger_prompt: String,
    evaluator_prompt: String,
}

impl IterationEngine {
    pub fn new(config: Configuration, paths: Paths) -> Result<Self, IterationError> {
        let requirements = Arc::new(parse_requirements_doc(&paths.req_doc)?);
        let (generator_prompt, debugger_prompt, evaluator_prompt) =
            load_prompts(&paths).map_err(IterationError::PromptLoad)?;
        Ok(Self {
            config,
            paths,
            requirements,
            tools: ToolRegistry::new(),
            generator_prompt,
            debugger_prompt,
            evaluator_prompt,
        })
    }

    fn tool_ctx(&self) -> ToolContext {
        ToolContext { root: self.paths.project.clone(), requirements: self.requirements.clone() }
    }

    pub async fn run(&self) -> Result<(), IterationError> {
        let mut state = GeneratorState::Init;

        for iteration in 0..self.config.max_iterations {
            tracing::info!(iteration, ?state, "generator turn");
            let gen_provider = provider_for(
                self.config.generator.provider,
                self.config.openai_api_key.as_deref(),
                self.config.anthropic_api_key.as_deref(),
            );
            let gen_runtime =
                AgentRuntime::new(gen_provider.as_ref(), self.config.generator.id.clone(), &self.tools, self.tool_ctx());
            let gen_outcome = gen_runtime
                .run(
                    self.generator_prompt.clone(),
                    generator_instruction(state, &self.config.put_name),
                    &GeneratorTermination,
                )
                .await?;
            archive_agent(&self.paths, iteration, "generator", &gen_outcome.history)?;

            if iteration > 0 {
                archive_reports(&self.paths, iteration - 1, true)?;
            }

            let passed = execute_tests(&self.paths, &self.config.put_name).await?;
            tracing::info!(iteration, passed, "test execution complete");

            if !passed {
                let dbg_provider = provider_for(
                    self.config.debugger.provider,
                    self.config.openai_api_key.as_deref(),
                    self.config.anthropic_api_key.as_deref(),
                );
                let dbg_runtime = AgentRuntime::new(
                    dbg_provider.as_ref(),
                    self.config.debugger.id.clone(),
                    &self.tools,
                    self.tool_ctx(),
                );
                let dbg_outcome = dbg_runtime
                    .run(
                        self.debugger_prompt.clone(),
                        debugger_instruction(&self.config.put_name),
                        &DebuggerTermination { paths: &self.paths },
                    )
                    .await?;
                archive_agent(&self.paths, iteration, "debugger", &dbg_outcome.history)?;
                state = GeneratorState::Error;
            } else {
                let eval_provider = provider_for(
                    self.config.evaluator.provider,
                    self.config.openai_api_key.as_deref(),
                    self.config.anthropic_api_key.as_deref(),
                );
                let eval_runtime = AgentRuntime::new(
                    eval_provider.as_ref(),
                    self.config.evaluator.id.clone(),
                    &self.tools,
                    self.tool_ctx(),
                );
                let eval_outcome = eval_runtime
                    .run(
                        self.evaluator_prompt.clone(),
                        evaluator_instruction(&self.config.put_name),
                        &EvaluatorTermination { paths: &self.paths },
                    )
                    .await?;
                archive_agent(&self.paths, iteration, "evaluator", &eval_outcome.history)?;

                match eval_outcome.result {
                    AgentResult::FinalSuite => {
                        archive_suite(&self.paths, SuiteType::Fss, iteration)?;
                        tracing::info!(iteration, "evaluator accepted the suite as final");
                    }
                    AgentResult::ReworkRequested => {}
                    AgentResult::Accepted => unreachable!("evaluator termination never returns Accepted"),
                }
                archive_suite(&self.paths, SuiteType::Lps, iteration)?;
                state = GeneratorState::Refine;
            }

            archive_tests(&self.paths, iteration)?;
        }

        tracing::info!(max_iterations = self.config.max_iterations, "iteration budget exhausted");
        archive_reports(&self.paths, self.config.max_iterations - 1, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold_inputs(dir: &std::path::Path, put_name: &str) -> Paths {
        let inputs = dir.join("inputs");
        std::fs::create_dir_all(inputs.join(put_name)).unwrap();
        std::fs::write(inputs.join(put_name).join("main.py"), "def f(): pass").unwrap();
        for name in ["generator.md", "debugger.md", "evaluator.md"] {
            std::fs::write(inputs.join(name), "you are an agent").unwrap();
        }
        std::fs::write(inputs.join("pytest_html_report.yml"), "report_dir: <<REPORT_DIR>>\nids: <<REQUIREMENT_IDS>>\n").unwrap();
        std::fs::write(inputs.join("program-requirements.yml"), "functional:\n  - id: R1\n    title: T\n    description: D\n    acceptance: A\n").unwrap();
        std::fs::write(inputs.join("evaluation_template.md"), "# eval").unwrap();
        Paths::new(dir, &inputs, put_name)
    }

    #[test]
    fn check_inputs_passes_on_complete_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let paths = scaffold_inputs(dir.path(), "put");
        check_inputs(&paths, "put").unwrap();
    }

    #[test]
    fn check_inputs_rejects_existing_project_first() {
        let dir = tempfile::tempdir().unwrap();
        let paths = scaffold_inputs(dir.path(), "put");
        std::fs::create_dir_all(&paths.project).unwrap();
        let err = check_inputs(&paths, "put").unwrap_err();
        assert!(matches!(err, SetupError::ProjectAlreadyExists(_)));
    }

    #[test]
    fn check_inputs_reports_missing_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = scaffold_inputs(dir.path(), "put");
        std::fs::remove_file(paths.inputs.join("debugger.md")).unwrap();
        let err = check_inputs(&paths, "put").unwrap_err();
        assert!(matches!(err, SetupError::MissingPrompt(_)));
    }

    #[test]
    fn setup_new_project_fills_template_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = scaffold_inputs(dir.path(), "put");
        setup_new_project(&paths, "put", &["R1".to_string(), "R2".to_string()]).unwrap();

        let filled = std::fs::read_to_string(paths.project.join("pytest_html_report.yml")).unwrap();
        assert!(filled.contains("R1, R2"));
        assert!(!filled.contains("<<REPORT_DIR>>"));
        assert!(paths.put.join("main.py").exists());
        assert!(paths.tests.exists());
        assert!(paths.reports.exists());
        assert!(paths.archive.exists());
    }
}
