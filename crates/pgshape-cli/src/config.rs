use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    #[allow(dead_code)]
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!("failed to read config file {}: {e}", config_path.display())
        })?;

        let mut file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("failed to parse config file {}: {e}", config_path.display())
        })?;

        file.expand_env()?;
        file.validate()?;

        Ok(Self {
            config_path,
            config_dir,
            file,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Overrides: normalized PG type -> Rust path/type.
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: String,
}

fn default_out_dir() -> String {
    "src/schema".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
        }
    }
}

impl ConfigFile {
    fn expand_env(&mut self) -> anyhow::Result<()> {
        self.database.url = expand_env_vars(&self.database.url)?;

        for s in &mut self.database.schemas {
            *s = expand_env_vars(s)?;
        }

        self.output.dir = expand_env_vars(&self.output.dir)?;

        for v in self.types.values_mut() {
            *v = expand_env_vars(v)?;
        }

        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if self.database.url.trim().is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.output.dir.trim().is_empty() {
            anyhow::bail!("output.dir must not be empty");
        }
        Ok(())
    }

    pub fn schemas(&self) -> Vec<String> {
        if self.database.schemas.is_empty() {
            vec!["public".to_string()]
        } else {
            self.database.schemas.clone()
        }
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut key = String::new();
            let mut closed = false;
            while let Some(&ch) = chars.peek() {
                chars.next();
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

/// The config template written by `pgshape gen init`.
pub const INIT_TEMPLATE: &str = r#"version = "1"

[database]
url = "${DATABASE_URL}"
schemas = ["public"]

[output]
dir = "src/schema"

# Per-type overrides, e.g.:
# [types]
# numeric = "rust_decimal::Decimal"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let file: ConfigFile = toml::from_str(
            r#"
version = "1"

[database]
url = "postgres://localhost/app"
"#,
        )
        .unwrap();
        file.validate().unwrap();
        assert_eq!(file.schemas(), vec!["public".to_string()]);
        assert_eq!(file.output.dir, "src/schema");
    }

    #[test]
    fn rejects_unknown_version() {
        let file: ConfigFile = toml::from_str(
            r#"
version = "2"

[database]
url = "postgres://localhost/app"
"#,
        )
        .unwrap();
        assert!(file.validate().is_err());
    }

    #[test]
    fn expands_env_vars() {
        std::env::set_var("PGSHAPE_TEST_URL", "postgres://h/db");
        assert_eq!(
            expand_env_vars("${PGSHAPE_TEST_URL}").unwrap(),
            "postgres://h/db"
        );
        assert!(expand_env_vars("${").is_err());
        assert!(expand_env_vars("${MISSING_PGSHAPE_VAR}").is_err());
    }

    #[test]
    fn init_template_parses() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/app");
        let mut file: ConfigFile = toml::from_str(INIT_TEMPLATE).unwrap();
        file.expand_env().unwrap();
        file.validate().unwrap();
    }
}
