//! The three agent specializations (`spec.md` §4.7): system prompts loaded
//! from `inputs/{generator,debugger,evaluator}.md`, per-state instruction
//! strings, and termination handlers enforcing each agent's exact
//! acceptance grammar. Grounded in `sources/LIFT/prompts.py::Prompts` and
//! `sources/workflow/agents.py`'s `Generator`/`Debugger`/`Evaluator`
//! `_handle_end_conv_attempt` methods.

use std::path::Path;

use crate::agent::{TerminationHandler, ToolCallOutcome};
use crate::paths::Paths;

/// Which instruction the `Generator` injects next, selected by the
/// iteration engine per `spec.md` §4.7's `INIT · (ERROR | REFINE)*` grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Init,
    Error,
    Refine,
}

pub fn generator_instruction(state: GeneratorState, put_name: &str) -> String {
    match state {
        GeneratorState::Init => format!(
            "Generate an initial test suite for the local project `{put_name}` based on the given requirements!"
        ),
        GeneratorState::Error => format!(
            "Error(s) during the collection or fail(s) occurred during execution of the test suite for the local project `{put_name}`! Please correct the test suite!"
        ),
        GeneratorState::Refine => format!(
            "Refine the existing test suite for the local project `{put_name}` based on the latest evaluation!"
        ),
    }
}

pub fn debugger_instruction(put_name: &str) -> String {
    format!(
        "Error(s) during the collection or fail(s) occurred during execution of the test suite for the local project `{put_name}`! Please analyse them!"
    )
}

pub fn evaluator_instruction(put_name: &str) -> String {
    format!("Evaluate the given test suite for the local project `{put_name}` based on the latest execution reports!")
}

fn load_system_prompt(path: &Path) -> Result<String, std::io::Error> {
    std::fs::read_to_string(path)
}

/// Reads `inputs/generator.md`, `inputs/debugger.md`, `inputs/evaluator.md`.
pub fn load_prompts(paths: &Paths) -> Result<(String, String, String), std::io::Error> {
    Ok((
        load_system_prompt(&paths.inputs.join("generator.md"))?,
        load_system_prompt(&paths.inputs.join("debugger.md"))?,
        load_system_prompt(&paths.inputs.join("evaluator.md"))?,
    ))
}

/// Accepts only the literal token `<DONE>`. Used by both Generator and
/// Debugger (Debugger additionally requires `reports/fixes.md` to exist).
pub struct GeneratorTermination;

impl TerminationHandler for GeneratorTermination {
    fn handle_end_conversation(&self, final_text: &str) -> ToolCallOutcome {
        if final_text == "<DONE>" {
            ToolCallOutcome::EndAccepted
        } else {
            ToolCallOutcome::EndRejected { reason: "Only <DONE> as final_text expected.".to_string() }
        }
    }
}

pub struct DebuggerTermination<'a> {
    pub paths: &'a Paths,
}

impl TerminationHandler for DebuggerTermination<'_> {
    fn handle_end_conversation(&self, final_text: &str) -> ToolCallOutcome {
        if final_text != "<DONE>" {
            return ToolCallOutcome::EndRejected { reason: "Only <DONE> as final_text expected.".to_string() };
        }
        if !self.paths.reports.join("fixes.md").exists() {
            return ToolCallOutcome::EndRejected {
                reason: "Expected output `fixes.md` missing.".to_string(),
            };
        }
        ToolCallOutcome::EndAccepted
    }
}

pub struct EvaluatorTermination<'a> {
    pub paths: &'a Paths,
}

impl TerminationHandler for EvaluatorTermination<'_> {
    fn handle_end_conversation(&self, final_text: &str) -> ToolCallOutcome {
        if final_text != "<REWORK>" && final_text != "<FINAL>" {
            return ToolCallOutcome::EndRejected {
                reason: "Only <REWORK> or <FINAL> as final_text expected.".to_string(),
            };
        }
        if !self.paths.reports.join("evaluation.md").exists() {
            return ToolCallOutcome::EndRejected {
                reason: "Expected output `evaluation.md` missing.".to_string(),
            };
        }
        if final_text == "<FINAL>" {
            ToolCallOutcome::EndFinalSuite
        } else {
            ToolCallOutcome::EndReworkReq
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &Path) -> Paths {
        Paths::new(dir, &dir.join("inputs"), "put")
    }

    #[test]
    fn generator_instructions_embed_put_name() {
        assert!(generator_instruction(GeneratorState::Init, "myapp").contains("myapp"));
        assert!(generator_instruction(GeneratorState::Error, "myapp").contains("correct the test suite"));
        assert!(generator_instruction(GeneratorState::Refine, "myapp").contains("Refine"));
    }

    #[test]
    fn generator_rejects_anything_but_done() {
        let h = GeneratorTermination;
        assert!(matches!(h.handle_end_conversation("<DONE>"), ToolCallOutcome::EndAccepted));
        match h.handle_end_conversation("done") {
            ToolCallOutcome::EndRejected { reason } => assert_eq!(reason, "Only <DONE> as final_text expected."),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn generator_requires_exact_literal_match_no_trimming() {
        let h = GeneratorTermination;
        match h.handle_end_conversation("<DONE>\n") {
            ToolCallOutcome::EndRejected { reason } => assert_eq!(reason, "Only <DONE> as final_text expected."),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn debugger_requires_fixes_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        std::fs::create_dir_all(&p.reports).unwrap();
        let h = DebuggerTermination { paths: &p };

        match h.handle_end_conversation("<DONE>") {
            ToolCallOutcome::EndRejected { reason } => assert_eq!(reason, "Expected output `fixes.md` missing."),
            other => panic!("unexpected: {other:?}"),
        }

        std::fs::write(p.reports.join("fixes.md"), "fixed").unwrap();
        assert!(matches!(h.handle_end_conversation("<DONE>"), ToolCallOutcome::EndAccepted));
    }

    #[test]
    fn evaluator_distinguishes_rework_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        std::fs::create_dir_all(&p.reports).unwrap();
        std::fs::write(p.reports.join("evaluation.md"), "eval").unwrap();
        let h = EvaluatorTermination { paths: &p };

        assert!(matches!(h.handle_end_conversation("<FINAL>"), ToolCallOutcome::EndFinalSuite));
        assert!(matches!(h.handle_end_conversation("<REWORK>"), ToolCallOutcome::EndReworkReq));
        match h.handle_end_conversation("<MAYBE>") {
            ToolCallOutcome::EndRejected { reason } => {
                assert_eq!(reason, "Only <REWORK> or <FINAL> as final_text expected.")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn evaluator_rejects_final_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        std::fs::create_dir_all(&p.reports).unwrap();
        let h = EvaluatorTermination { paths: &p };
        match h.handle_end_conversation("<FINAL>") {
            ToolCallOutcome::EndRejected { reason } => {
                assert_eq!(reason, "Expected output `evaluation.md` missing.")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
