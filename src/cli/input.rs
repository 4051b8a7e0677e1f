//! Interactive command input
//!
//! Lines from stdin become controller [`Command`]s. Reading happens on a
//! plain thread because a blocking stdin read cannot be cancelled and would
//! otherwise hold up runtime shutdown.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::application::Command;
use crate::domain::capture::SourceChange;
use crate::domain::session::SessionState;

/// What one input line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(Command),
    /// Cancel, pending a yes/no answer
    ConfirmCancel,
    Help,
    Unknown(String),
    Empty,
}

pub const HELP: &str = "\
Commands:
  start                 begin recording
  stop                  finish and keep the recording
  cancel                discard the recording
  again | reset         record again after finishing
  retry                 clear an error
  submit                send the form
  mic on|off            include the microphone
  system on|off         include system audio
  device <id>|default   pick a microphone
  quit                  exit";

/// Parse one line
pub fn parse_line(line: &str) -> InputAction {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return InputAction::Empty;
    };
    let argument = words.next();

    let command = match command.to_lowercase().as_str() {
        "start" | "record" => Command::Start,
        "stop" => Command::Stop,
        "cancel" => return InputAction::ConfirmCancel,
        "again" | "reset" => Command::Reset,
        "retry" => Command::Retry,
        "submit" | "send" => Command::Submit,
        "quit" | "exit" | "q" => Command::Shutdown,
        "help" | "?" => return InputAction::Help,
        "mic" | "system" => match argument.and_then(parse_switch) {
            Some(on) if command.eq_ignore_ascii_case("mic") => {
                Command::SelectSource(SourceChange::Microphone(on))
            }
            Some(on) => Command::SelectSource(SourceChange::SystemAudio(on)),
            None => return InputAction::Unknown(line.trim().to_string()),
        },
        "device" => match argument {
            Some("default") => Command::SelectSource(SourceChange::Device(None)),
            Some(id) => Command::SelectSource(SourceChange::Device(Some(id.to_string()))),
            None => return InputAction::Unknown(line.trim().to_string()),
        },
        _ => return InputAction::Unknown(line.trim().to_string()),
    };
    InputAction::Send(command)
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Read commands from stdin until EOF or until the controller goes away.
/// EOF is treated as `quit`. `state` decides whether `cancel` needs a
/// confirmation.
pub fn spawn_stdin_reader(
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("recform-input".into())
        .spawn(move || read_commands(io::stdin().lock(), commands, state))
}

fn read_commands<R: BufRead>(
    reader: R,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
) {
    let mut lines = reader.lines();

    while let Some(Ok(line)) = lines.next() {
        let command = match parse_line(&line) {
            InputAction::Send(command) => command,
            InputAction::ConfirmCancel => {
                let current = *state.borrow();
                match current {
                    SessionState::Recording => {
                        eprint!("Discard the current recording? [y/N] ");
                        let confirmed =
                            matches!(lines.next(), Some(Ok(answer)) if is_yes(&answer));
                        Command::Cancel { confirmed }
                    }
                    // Nothing is recorded yet.
                    SessionState::AcquiringPermissions => Command::Cancel { confirmed: true },
                    _ => {
                        eprintln!("Nothing to cancel.");
                        continue;
                    }
                }
            }
            InputAction::Help => {
                eprintln!("{}", HELP);
                continue;
            }
            InputAction::Unknown(input) => {
                eprintln!("Unknown command: {} (type `help`)", input);
                continue;
            }
            InputAction::Empty => continue,
        };

        let quit = command == Command::Shutdown;
        if commands.blocking_send(command).is_err() || quit {
            return;
        }
    }

    debug!("Input closed");
    let _ = commands.blocking_send(Command::Shutdown);
}
