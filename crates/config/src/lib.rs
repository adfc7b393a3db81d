use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Built-in provider definition — deliberately reduced from the teacher's
/// multi-provider catalog (OpenAI, Anthropic, Gemini, Cursor, Copilot, ...)
/// to the two providers LIFT actually validates credentials for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDef {
    pub id: &'static str,
    pub env_var: &'static str,
}

pub const BUILT_IN_PROVIDERS: &[ProviderDef] = &[
    ProviderDef { id: "openai", env_var: "OPENAI_API_KEY" },
    ProviderDef { id: "anthropic", env_var: "ANTHROPIC_API_KEY" },
];

pub fn find_provider_def(id: &str) -> Option<&'static ProviderDef> {
    BUILT_IN_PROVIDERS.iter().find(|p| p.id == id)
}

/// A model identifier resolved to its owning provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub id: String,
    pub provider: &'static str,
}

const OPENAI_MODELS: &[&str] = &[
    "gpt-5", "gpt-5-codex", "gpt-5-mini", "gpt-5-nano", "gpt-5-pro",
    "gpt-5.1", "gpt-5.1-codex", "gpt-5.1-codex-max", "gpt-5.1-codex-mini",
    "gpt-5.2", "gpt-5.2-pro", "o1", "o1-pro", "o3", "o3-mini", "o3-pro", "o4-mini",
];

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-opus-4", "claude-opus-4.1", "claude-sonnet-4", "claude-sonnet-4.5",
    "claude-haiku-4.5", "claude-3-7-sonnet", "claude-3-5-haiku",
];

fn resolve_model(id: &str) -> Option<ModelRef> {
    if OPENAI_MODELS.contains(&id) {
        return Some(ModelRef { id: id.to_string(), provider: "openai" });
    }
    if ANTHROPIC_MODELS.contains(&id) {
        return Some(ModelRef { id: id.to_string(), provider: "anthropic" });
    }
    None
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(".env file not found at {0}")]
    EnvFileMissing(String),
    #[error("{0} not set in .env file")]
    VarMissing(&'static str),
    #[error(
        "either set all agent models individually (LIFT_GEN_MODEL, LIFT_DEBUG_MODEL, \
         LIFT_EVAL_MODEL) or define a fallback model using LIFT_MODEL - not both"
    )]
    ModelVarsConflict,
    #[error(
        "either set all agent models individually (LIFT_GEN_MODEL, LIFT_DEBUG_MODEL, \
         LIFT_EVAL_MODEL) or define a fallback model using LIFT_MODEL in .env file"
    )]
    ModelVarsIncomplete,
    #[error("model `{0}` is not a known model")]
    UnknownModel(String),
    #[error("tried to use an OpenAI model without setting OPENAI_API_KEY in .env file")]
    MissingOpenAiKey,
    #[error("tried to use an Anthropic model without setting ANTHROPIC_API_KEY in .env file")]
    MissingAnthropicKey,
    #[error("LIFT_MAX_ITER must be a positive integer, got `{0}`")]
    InvalidMaxIter(String),
}

/// Process-wide configuration, built once from the `input/.env` file.
///
/// Mirrors `sources/LIFT/config.py::LiftConfig` — validation is eager and
/// fails fast with a specific reason rather than deferring to first use.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub put_name: String,
    pub max_iterations: u32,
    pub generator: ModelRef,
    pub debugger: ModelRef,
    pub evaluator: ModelRef,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl Configuration {
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        if !env_file.exists() {
            return Err(ConfigError::EnvFileMissing(env_file.display().to_string()));
        }
        dotenvy::from_path(env_file).ok();

        let put_name = std::env::var("LIFT_PUT").map_err(|_| ConfigError::VarMissing("LIFT_PUT"))?;
        let max_iter_raw =
            std::env::var("LIFT_MAX_ITER").map_err(|_| ConfigError::VarMissing("LIFT_MAX_ITER"))?;
        let max_iterations: u32 = max_iter_raw
            .parse()
            .ok()
            .filter(|v| *v > 0)
            .ok_or(ConfigError::InvalidMaxIter(max_iter_raw))?;

        let all_model = std::env::var("LIFT_MODEL").ok();
        let gen_model = std::env::var("LIFT_GEN_MODEL").ok();
        let debug_model = std::env::var("LIFT_DEBUG_MODEL").ok();
        let eval_model = std::env::var("LIFT_EVAL_MODEL").ok();

        if all_model.is_some() && gen_model.is_some() && debug_model.is_some() && eval_model.is_some() {
            return Err(ConfigError::ModelVarsConflict);
        }
        if all_model.is_none() && (gen_model.is_none() || debug_model.is_none() || eval_model.is_none()) {
            return Err(ConfigError::ModelVarsIncomplete);
        }

        let pick = |specific: Option<String>| -> Result<ModelRef, ConfigError> {
            let id = specific.or_else(|| all_model.clone()).expect("checked above");
            resolve_model(&id).ok_or(ConfigError::UnknownModel(id))
        };

        let generator = pick(gen_model)?;
        let debugger = pick(debug_model)?;
        let evaluator = pick(eval_model)?;

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();

        let models = [&generator, &debugger, &evaluator];
        if models.iter().any(|m| m.provider == "openai") && openai_api_key.is_none() {
            return Err(ConfigError::MissingOpenAiKey);
        }
        if models.iter().any(|m| m.provider == "anthropic") && anthropic_api_key.is_none() {
            return Err(ConfigError::MissingAnthropicKey);
        }

        let redact = |k: &Option<String>| match k {
            Some(v) if v.len() >= 6 => format!("{}… (hidden)", &v[..6]),
            Some(_) => "(hidden)".to_string(),
            None => "(not set)".to_string(),
        };
        info!(
            "Setup environment:\n    OPENAI_API_KEY:    {}\n    ANTHROPIC_API_KEY: {}\n    \
             MODEL: Generator -> {}, Debugger -> {}, Evaluator -> {}\n    LIFT_PUT: {}\n    \
             LIFT_MAX_ITER: {}",
            redact(&openai_api_key),
            redact(&anthropic_api_key),
            generator.id,
            debugger.id,
            evaluator.id,
            put_name,
            max_iterations,
        );

        Ok(Configuration {
            put_name,
            max_iterations,
            generator,
            debugger,
            evaluator,
            openai_api_key,
            anthropic_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // `dotenvy::from_path` mutates process-wide environment variables, so
    // tests that load a `.env` file must not run concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_env(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(".env");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn clear_vars() {
        for var in [
            "LIFT_PUT", "LIFT_MAX_ITER", "LIFT_MODEL", "LIFT_GEN_MODEL",
            "LIFT_DEBUG_MODEL", "LIFT_EVAL_MODEL", "OPENAI_API_KEY", "ANTHROPIC_API_KEY",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn missing_env_file_fails() {
        let err = Configuration::load(Path::new("/nonexistent/.env")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileMissing(_)));
    }

    #[test]
    fn fallback_model_resolves_all_three_agents() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = write_env(
            &dir,
            "LIFT_PUT=demo\nLIFT_MAX_ITER=3\nLIFT_MODEL=gpt-5\nOPENAI_API_KEY=sk-test123\n",
        );
        let cfg = Configuration::load(&path).unwrap();
        assert_eq!(cfg.generator.provider, "openai");
        assert_eq!(cfg.debugger.id, "gpt-5");
        assert_eq!(cfg.max_iterations, 3);
    }

    #[test]
    fn conflicting_model_vars_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = write_env(
            &dir,
            "LIFT_PUT=demo\nLIFT_MAX_ITER=1\nLIFT_MODEL=gpt-5\n\
             LIFT_GEN_MODEL=gpt-5\nLIFT_DEBUG_MODEL=gpt-5\nLIFT_EVAL_MODEL=gpt-5\n\
             OPENAI_API_KEY=sk-test\n",
        );
        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ModelVarsConflict));
    }

    #[test]
    fn missing_credential_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = write_env(&dir, "LIFT_PUT=demo\nLIFT_MAX_ITER=1\nLIFT_MODEL=gpt-5\n");
        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOpenAiKey));
    }
}
