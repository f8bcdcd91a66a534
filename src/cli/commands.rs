// ABOUTME: Command implementations for the loopscope CLI
// ABOUTME: Handles execution of run, validate, and script commands

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::args::{PlaybackCommand, ScriptFormat};
use super::config::Config;
use crate::engine::{RunController, RunSession, RunState};
use crate::script::{example, Script, ScriptValidator, ValidationReport};
use crate::surface::{Recorder, Surfaces, TerminalSurface};

/// Play a script in the terminal
pub async fn run_timeline(
    script_path: Option<PathBuf>,
    speed: Option<f64>,
    interactive: bool,
    trace: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let script = load_script(script_path).await?;

    let report = ScriptValidator::new().validate(&script);
    if !report.is_valid {
        print_report(&script.name, &report);
        return Err(anyhow::anyhow!(
            "Script '{}' failed validation with {} error(s)",
            script.name,
            report.errors.len()
        ));
    }
    for warning in &report.warnings {
        warn!("{}", warning);
    }

    let mut engine_config = config.engine_config();
    if let Some(speed) = speed {
        engine_config = engine_config.with_speed(speed);
    }

    let terminal = Surfaces::uniform(Arc::new(TerminalSurface::new(&script.source)));
    let recorder = trace.as_ref().map(|_| Arc::new(Recorder::new()));
    let surfaces = match &recorder {
        Some(recorder) => terminal.fan_out(Surfaces::uniform(Arc::clone(recorder))),
        None => terminal,
    };

    println!("Playing '{}' ({} steps)", script.name, script.steps.len());
    let controller = RunController::new(script, engine_config, surfaces);
    controller.run();

    if interactive {
        println!("Commands: p pause/resume, r reset, g run, s <x> speed, q quit");
        drive_interactive(&controller).await?;
    } else {
        controller.wait_until_finished().await;
    }

    let session = controller.session();
    print_summary(&session);

    if let (Some(path), Some(recorder)) = (trace, recorder) {
        write_trace(&path, &session, &recorder).await?;
        info!("Trace written to: {}", path.display());
    }

    match session.last_error {
        Some(message) => Err(anyhow::anyhow!("Run failed: {}", message)),
        None => Ok(()),
    }
}

/// Forward stdin commands to the controller until quit or end of input
async fn drive_interactive(controller: &RunController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut states = controller.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // No more input can resume a paused run
                    if controller.is_paused() {
                        controller.toggle_pause();
                    }
                    controller.wait_until_finished().await;
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match PlaybackCommand::parse_line(&line) {
                    Ok(PlaybackCommand::Quit) => {
                        if controller.state().is_active() {
                            controller.reset();
                        }
                        return Ok(());
                    }
                    Ok(command) => apply_command(controller, command),
                    Err(e) => println!("{}", e),
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = *states.borrow_and_update();
                if state.is_finished() {
                    println!("Run {}. Type g to play again or q to quit.", state);
                }
            }
        }
    }
}

fn apply_command(controller: &RunController, command: PlaybackCommand) {
    match command {
        PlaybackCommand::TogglePause => {
            if controller.state().is_active() {
                let paused = controller.toggle_pause();
                println!("{}", if paused { "Paused" } else { "Resumed" });
            } else {
                println!("Nothing is playing");
            }
        }
        PlaybackCommand::Reset => {
            controller.reset();
            println!("Reset");
        }
        PlaybackCommand::Run => {
            if !controller.run() {
                println!("Already playing");
            }
        }
        PlaybackCommand::Speed(speed) => {
            let applied = controller.set_speed(speed);
            println!("Speed {}x", applied);
        }
        PlaybackCommand::Quit => {}
    }
}

/// Validate a script file
pub async fn validate_script(script_path: PathBuf, strict: bool) -> Result<()> {
    info!("Validating script: {}", script_path.display());

    let script = Script::from_file(&script_path)
        .await
        .map_err(|e| anyhow::anyhow!("Script validation failed: {}", e))?;

    let report = ScriptValidator::new()
        .with_strict_mode(strict)
        .validate(&script);
    print_report(&script.name, &report);

    if !report.is_valid {
        return Err(anyhow::anyhow!("Script '{}' is invalid", script.name));
    }

    println!("✓ Script '{}' is valid", script.name);
    println!("  Tasks: {}", script.tasks.len());
    println!("  Steps: {}", script.steps.len());

    info!("Script validation completed successfully");
    Ok(())
}

/// Export the built-in script or its source text
pub async fn export_script(
    format: ScriptFormat,
    output: Option<PathBuf>,
    source: bool,
) -> Result<()> {
    let script = example();

    let content = if source {
        numbered_source(&script)
    } else {
        match format {
            ScriptFormat::Yaml => script.to_yaml()?,
            ScriptFormat::Json => script.to_json()?,
        }
    };

    match output {
        Some(path) => {
            if path.exists() {
                return Err(anyhow::anyhow!(
                    "Output file already exists: {}",
                    path.display()
                ));
            }
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to write '{}': {}", path.display(), e))?;
            info!("Script written to: {}", path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}

async fn load_script(path: Option<PathBuf>) -> Result<Script> {
    match path {
        Some(path) => {
            let script = Script::from_file(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load script: {}", e))?;
            info!("Loaded script: {}", script.name);
            Ok(script)
        }
        None => Ok(example()),
    }
}

fn numbered_source(script: &Script) -> String {
    script
        .source_lines()
        .iter()
        .enumerate()
        .map(|(index, line)| format!("{:>3} | {}\n", index + 1, line))
        .collect()
}

fn print_report(name: &str, report: &ValidationReport) {
    for error in &report.errors {
        println!("✗ {}: {}", name, error);
    }
    for warning in &report.warnings {
        println!("! {}: {}", name, warning);
    }
}

fn print_summary(session: &RunSession) {
    match session.state {
        RunState::Completed if session.last_error.is_none() => {
            println!("Run completed. Console output: {}", session.output.join(", "));
        }
        state => println!("Run ended {} after {} steps", state, session.steps_executed),
    }
}

async fn write_trace(path: &PathBuf, session: &RunSession, recorder: &Recorder) -> Result<()> {
    let trace = serde_json::json!({
        "session": session,
        "events": recorder.events(),
    });
    let content = serde_json::to_string_pretty(&trace)
        .map_err(|e| anyhow::anyhow!("Failed to serialize trace to JSON: {}", e))?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write trace file '{}': {}", path.display(), e))?;
    Ok(())
}
