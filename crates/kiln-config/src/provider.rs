//! Configuration providers for different sources.

use crate::{types::ServerConfig, ConfigError, Result};
use std::{
    env,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, info};

/// File-based configuration provider
pub struct FileProvider {
    path: PathBuf,
    format: FileFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

impl FileProvider {
    /// Create a new file provider, picking the format from the extension
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path)?;

        Ok(Self { path, format })
    }

    /// Create with explicit format
    pub fn with_format(path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Read and parse the file
    pub async fn load(&self) -> Result<ServerConfig> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let config = parse(&content, self.format)?;
        info!("Loaded configuration from {:?}", self.path);
        Ok(config)
    }
}

/// Parse configuration text in the given format
pub fn parse(content: &str, format: FileFormat) -> Result<ServerConfig> {
    match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        FileFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}

/// Environment variable configuration provider
///
/// Recognises `<PREFIX>BIND_ADDR`, `<PREFIX>PORT` and `<PREFIX>MAX_FRAME_SIZE`.
pub struct EnvironmentProvider {
    prefix: String,
}

impl EnvironmentProvider {
    /// Create a new environment provider
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Overlay the process environment onto `config`
    pub fn apply(&self, config: &mut ServerConfig) -> Result<()> {
        self.apply_vars(config, env::vars())
    }

    /// Overlay the given variables onto `config`
    pub fn apply_vars<I>(&self, config: &mut ServerConfig, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;

        for (key, value) in vars {
            let Some(name) = key.strip_prefix(&self.prefix) else {
                continue;
            };

            match name {
                "BIND_ADDR" => config.bind_addr = value.clone(),
                "PORT" => config.port = parse_env_value(&key, &value)?,
                "MAX_FRAME_SIZE" => config.max_frame_size = parse_env_value(&key, &value)?,
                _ => continue,
            }
            debug!("Loaded env var: {} = {}", key, value);
            applied += 1;
        }

        info!("Loaded {} environment variables with prefix '{}'", applied, self.prefix);
        Ok(())
    }
}

impl Default for EnvironmentProvider {
    fn default() -> Self {
        Self::new("KILN_")
    }
}

/// Detect file format from extension
fn detect_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        Some("toml") => Ok(FileFormat::Toml),
        _ => Err(ConfigError::Parse(format!("Unknown file format for {:?}", path))),
    }
}

fn parse_env_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{}={:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOML_CONFIG: &str = r#"
bind_addr = "127.0.0.1"
port = 19092

[[topics]]
name = "orders"
id = "00000000-0000-4000-8000-000000000091"
partitions = 3
"#;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("kiln.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(detect_format(Path::new("kiln.yml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("kiln.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("kiln.json")).unwrap(), FileFormat::Json);
        assert!(matches!(detect_format(Path::new("kiln.ini")), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_all_formats() {
        let toml = parse(TOML_CONFIG, FileFormat::Toml).unwrap();
        assert_eq!(toml.port, 19092);
        assert_eq!(toml.topics[0].partitions, 3);
        // Unset fields keep their defaults
        assert_eq!(toml.max_frame_size, crate::types::DEFAULT_MAX_FRAME_SIZE);

        let yaml = parse(
            "port: 19092\ntopics:\n  - name: orders\n    id: 00000000-0000-4000-8000-000000000091\n",
            FileFormat::Yaml,
        )
        .unwrap();
        assert_eq!(yaml.topics[0].name, "orders");
        assert_eq!(yaml.bind_addr, "0.0.0.0");

        let json = parse(r#"{"max_frame_size": 4096}"#, FileFormat::Json).unwrap();
        assert_eq!(json.max_frame_size, 4096);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse("port = \"nope\"", FileFormat::Toml), Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn test_file_provider_load() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML_CONFIG.as_bytes()).unwrap();

        let provider = FileProvider::new(file.path()).unwrap();
        let config = provider.load().await.unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.topics.len(), 1);
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        drop(file);

        let provider = FileProvider::new(&path).unwrap();
        assert!(matches!(provider.load().await, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_environment_overlay() {
        let mut config = ServerConfig::default();
        let vars = vec![
            ("KILN_PORT".to_string(), "29092".to_string()),
            ("KILN_BIND_ADDR".to_string(), "10.0.0.1".to_string()),
            ("KILN_UNKNOWN".to_string(), "ignored".to_string()),
            ("OTHER_PORT".to_string(), "1".to_string()),
        ];

        EnvironmentProvider::default().apply_vars(&mut config, vars).unwrap();
        assert_eq!(config.port, 29092);
        assert_eq!(config.bind_addr, "10.0.0.1");
    }

    #[test]
    fn test_environment_bad_number() {
        let mut config = ServerConfig::default();
        let vars = vec![("KILN_MAX_FRAME_SIZE".to_string(), "lots".to_string())];
        assert!(matches!(
            EnvironmentProvider::default().apply_vars(&mut config, vars),
            Err(ConfigError::Parse(_))
        ));
    }
}
