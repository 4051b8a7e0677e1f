//! recform CLI entry point

use std::process::ExitCode;

use clap::Parser;

use recform::cli::{
    app::{init_logging, load_merged_config},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
    run_devices, run_formats, run_send, run_session, EXIT_ERROR,
};
use recform::infrastructure::{CpalBackend, ScriptedBackend, XdgConfigStore};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cli_config = cli.to_config();
    let simulate = cli.simulate;

    match cli.command {
        Some(Commands::Config { action }) => {
            let presenter = Presenter::new();
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Devices) if simulate => run_devices(ScriptedBackend::simulated()).await,
        Some(Commands::Devices) => run_devices(CpalBackend::new()).await,
        Some(Commands::Formats) => {
            let config = load_merged_config(cli_config).await;
            if simulate {
                run_formats(&ScriptedBackend::simulated(), &config)
            } else {
                run_formats(&CpalBackend::new(), &config)
            }
        }
        Some(Commands::Send {
            path,
            file_field,
            marker_field,
        }) => {
            let config = load_merged_config(cli_config).await;
            run_send(&config, &path, file_field.as_deref(), marker_field.as_deref()).await
        }
        None => {
            let config = load_merged_config(cli_config).await;
            if simulate {
                run_session(ScriptedBackend::simulated(), config).await
            } else {
                run_session(CpalBackend::new(), config).await
            }
        }
    }
}
