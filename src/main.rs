// ABOUTME: Entry point for the loopscope binary
// ABOUTME: Loads configuration, parses arguments, and hands off to the CLI app

use anyhow::Result;
use loopscope::cli::App;

#[tokio::main]
async fn main() -> Result<()> {
    let args = loopscope::cli::Args::parse_args();
    let mut app = App::from_config_path(args.config.clone())?;

    app.run(args).await?;

    Ok(())
}
