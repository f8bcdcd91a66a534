// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for loopscope

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loopscope")]
#[command(about = "Step through an animated timeline of the JavaScript event loop")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a timeline script in the terminal
    Run {
        #[arg(short, long, help = "Path to script YAML file (defaults to the built-in program)")]
        script: Option<PathBuf>,

        #[arg(long, help = "Playback speed multiplier (0.1 to 2.0)")]
        speed: Option<f64>,

        #[arg(short, long, help = "Read p/r/s <x>/q commands from stdin while playing")]
        interactive: bool,

        #[arg(long, help = "Write the recorded event trace as JSON")]
        trace: Option<PathBuf>,
    },

    /// Validate a script file without playing it
    Validate {
        #[arg(help = "Path to script YAML file")]
        script: PathBuf,

        #[arg(long, help = "Treat warnings as errors")]
        strict: bool,
    },

    /// Export the built-in script
    Script {
        #[arg(short, long, value_enum, default_value_t = ScriptFormat::Yaml)]
        format: ScriptFormat,

        #[arg(short, long, help = "Output file (defaults to stdout)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Print the numbered source text instead of the steps")]
        source: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptFormat {
    Yaml,
    Json,
}

/// A command typed while an interactive run is playing
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    TogglePause,
    Reset,
    Run,
    Speed(f64),
    Quit,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl PlaybackCommand {
    /// Parse one line of interactive input
    pub fn parse_line(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();

        match command {
            "p" | "pause" => Ok(Self::TogglePause),
            "r" | "reset" => Ok(Self::Reset),
            "g" | "go" | "run" => Ok(Self::Run),
            "q" | "quit" => Ok(Self::Quit),
            "s" | "speed" => {
                let value = parts
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing speed value. Expected 's <x>'"))?;
                let speed = value
                    .parse::<f64>()
                    .map_err(|e| anyhow::anyhow!("Invalid speed '{}': {}", value, e))?;
                Ok(Self::Speed(speed))
            }
            other => Err(anyhow::anyhow!(
                "Unknown command '{}'. Expected p, r, g, s <x>, or q",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playback_commands() {
        assert_eq!(
            PlaybackCommand::parse_line("p").unwrap(),
            PlaybackCommand::TogglePause
        );
        assert_eq!(
            PlaybackCommand::parse_line(" reset ").unwrap(),
            PlaybackCommand::Reset
        );
        assert_eq!(
            PlaybackCommand::parse_line("s 1.5").unwrap(),
            PlaybackCommand::Speed(1.5)
        );
        assert_eq!(
            PlaybackCommand::parse_line("q").unwrap(),
            PlaybackCommand::Quit
        );
    }

    #[test]
    fn test_parse_playback_commands_invalid() {
        assert!(PlaybackCommand::parse_line("s").is_err());
        assert!(PlaybackCommand::parse_line("s fast").is_err());
        assert!(PlaybackCommand::parse_line("jump").is_err());
        assert!(PlaybackCommand::parse_line("").is_err());
    }

    #[test]
    fn test_run_arguments() {
        let args = Args::parse_from(["loopscope", "run", "--speed", "2", "--interactive"]);
        match args.command {
            Commands::Run {
                script,
                speed,
                interactive,
                trace,
            } => {
                assert!(script.is_none());
                assert_eq!(speed, Some(2.0));
                assert!(interactive);
                assert!(trace.is_none());
            }
            _ => panic!("expected run command"),
        }
    }
}
