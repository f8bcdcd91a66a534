// ABOUTME: Main application orchestration for the loopscope CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so stdout carries only the timeline
        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting loopscope v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                script,
                speed,
                interactive,
                trace,
            } => commands::run_timeline(script, speed, interactive, trace, &self.config).await,

            Commands::Validate { script, strict } => {
                commands::validate_script(script, strict).await
            }

            Commands::Script {
                format,
                output,
                source,
            } => commands::export_script(format, output, source).await,
        }
    }

    /// Create application from an optional configuration file path
    pub fn from_config_path(path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(path)?;
        Ok(Self::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert_eq!(app.config().speed, 1.0);
        assert_eq!(app.config().logging.format, "pretty");
    }

    #[test]
    fn test_app_from_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("loopscope.yaml");

        let config_content = r#"
speed: 0.5
logging:
  level: debug
  format: compact
"#;
        fs::write(&config_path, config_content).unwrap();

        let app = App::from_config_path(Some(config_path)).unwrap();
        assert_eq!(app.config().speed, 0.5);
        assert_eq!(app.config().logging.level, "debug");
        assert_eq!(app.config().logging.format, "compact");
    }
}
