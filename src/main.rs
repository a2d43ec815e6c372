use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tumorscan::{
    Shell, ShellConfig,
    dialogs::NativeDialogs,
    gui::{AppState, TumorscanApp},
    shell::is_backend_startup_failure,
};

#[derive(Parser)]
#[command(name = "tumorscan")]
#[command(about = "Detect brain tumors in MRI/CT images with a local detection backend")]
struct Cli {
    /// Open the developer panel on launch and log at debug level
    #[arg(long)]
    dev: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.dev { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = ShellConfig::from_env()?;
    config.dev_mode = args.dev;

    let runtime = tokio::runtime::Runtime::new()?;
    let shell = match runtime.block_on(Shell::init(&config, NativeDialogs)) {
        Ok(shell) => Arc::new(shell),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "startup failed");
            let title = if is_backend_startup_failure(&err) {
                "Detection backend failed to start"
            } else {
                "Brain Tumor Detector failed to start"
            };
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title(title)
                .set_description(format!("{err:#}"))
                .show();
            return Err(err);
        }
    };

    let state = AppState::new(shell.clone(), runtime.handle().clone(), config.dev_mode);
    let result = TumorscanApp::run(state);

    // window closed: tear the backend down before exiting
    if let Err(err) = runtime.block_on(shell.shutdown()) {
        tracing::warn!(error = %err, "shutdown incomplete");
    }
    result.map_err(|err| anyhow::anyhow!("GUI failed: {err}"))?;
    Ok(())
}
