use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model_list: Vec<ModelConfig>,
    /// Model used when a request names none. Defaults to the first entry.
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub llm_params: LLMParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMParams {
    pub model: String,
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config file {}", path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.model_list.is_empty() {
            bail!("model_list must contain at least one model");
        }
        if let Some(default_model) = &self.default_model {
            if !self.model_list.iter().any(|m| &m.model_name == default_model) {
                bail!("default_model {} is not in model_list", default_model);
            }
        }
        Ok(())
    }

    /// Looks up a model by name; `None` selects the default model.
    pub fn get_model_config(&self, model: Option<&str>) -> Option<&ModelConfig> {
        match model.or(self.default_model.as_deref()) {
            Some(name) => self.model_list.iter().find(|m| m.model_name == name),
            None => self.model_list.first(),
        }
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.model_list.iter().map(|m| m.model_name.as_str())
    }
}
