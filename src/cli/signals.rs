//! Signal handling for the interactive session

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::application::Command;

/// Forward SIGINT and SIGTERM to the controller as `Shutdown`.
///
/// Shutdown discards an in-progress recording and releases every device
/// before the controller returns.
pub fn forward_signals(commands: mpsc::Sender<Command>) -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("{} Received {} (shutdown)", "↓".cyan(), name);
        let _ = commands.send(Command::Shutdown).await;
    });

    Ok(())
}
