use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use intake_llm::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    /// Prefer GROQ_API_KEY in the environment over storing the key on disk.
    pub api_key: Option<String>,
    /// Model call budget in seconds; past this the heuristic answers alone.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmSection {
                model: intake_llm::gateway::DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                base_url: intake_llm::gateway::DEFAULT_BASE_URL.to_string(),
                api_key: None,
                timeout_secs: 20,
            },
        }
    }
}

pub fn intake_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".intake"))
}

pub fn ensure_intake_home() -> Result<PathBuf> {
    let dir = intake_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_intake_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

/// File config first, environment on top (env wins for the credential,
/// model, and temperature so one-off runs don't need a config edit).
pub fn resolve_llm_config(cfg: &Config) -> LlmConfig {
    let env = LlmConfig::from_env();
    LlmConfig {
        api_key: env.api_key.or_else(|| cfg.llm.api_key.clone()),
        model: if env.model != intake_llm::gateway::DEFAULT_MODEL {
            env.model
        } else {
            cfg.llm.model.clone()
        },
        temperature: LlmConfig::env_temperature().unwrap_or(cfg.llm.temperature),
        base_url: cfg.llm.base_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test so the env var is never touched from two threads at once.
    #[test]
    fn temperature_resolution_prefers_env() {
        let mut cfg = Config::default();
        cfg.llm.temperature = 0.7;

        unsafe { std::env::remove_var("CLASSIFIER_TEMPERATURE") };
        assert_eq!(resolve_llm_config(&cfg).temperature, 0.7);

        unsafe { std::env::set_var("CLASSIFIER_TEMPERATURE", "0.2") };
        assert_eq!(resolve_llm_config(&cfg).temperature, 0.2);

        unsafe { std::env::set_var("CLASSIFIER_TEMPERATURE", "not a number") };
        assert_eq!(resolve_llm_config(&cfg).temperature, 0.7);

        unsafe { std::env::remove_var("CLASSIFIER_TEMPERATURE") };
    }
}
