use super::Config;
use super::types::app_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let ecolesync_dir = app_dir();
        let config_path = ecolesync_dir.join("config.toml");

        if !ecolesync_dir.exists() {
            fs::create_dir_all(&ecolesync_dir)
                .context("Failed to create .ecolesync directory")?;
            fs::create_dir_all(ecolesync_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: ecolesync_dir.join("workspace"),
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    /// Load an explicit config file. The workspace sits next to it.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = config_path.to_path_buf();
        config.workspace_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("workspace");

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
