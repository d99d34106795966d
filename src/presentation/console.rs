//! Console Boundary
//!
//! Line-delimited JSON front end for the coordinator: one command per input
//! line, one reply or event per output line.

use crate::domain::models::{BoundaryEvent, Command, CommandReply};
use crate::infrastructure::bluetooth::service::{CoordinatorError, CoordinatorHandle};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ConsoleCommand {
    Start,
    Stop,
    IsRunning,
    ProcessAddress { mac: String },
    ClearScanning,
    Quit,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum ConsoleReply {
    Ok,
    Running { value: bool },
    Accepted,
    Error { code: String, message: String },
}

impl ConsoleReply {
    fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<CommandReply> for ConsoleReply {
    fn from(reply: CommandReply) -> Self {
        match reply {
            CommandReply::Done => Self::Ok,
            CommandReply::Running(value) => Self::Running { value },
            CommandReply::Accepted => Self::Accepted,
        }
    }
}

impl From<CoordinatorError> for ConsoleReply {
    fn from(err: CoordinatorError) -> Self {
        let code = match err {
            CoordinatorError::SessionActive => "SESSION_ACTIVE",
            CoordinatorError::InvalidAddress(_) => "INVALID_ADDRESS",
            CoordinatorError::Stopped => "SERVICE_NOT_RUNNING",
        };
        Self::error(code, err.to_string())
    }
}

/// Parse one input line. `Ok(None)` means the line asks to quit.
pub fn parse_line(line: &str) -> Result<Option<Command>, ConsoleReply> {
    let command: ConsoleCommand = serde_json::from_str(line)
        .map_err(|e| ConsoleReply::error("BAD_REQUEST", e.to_string()))?;

    Ok(match command {
        ConsoleCommand::Start => Some(Command::Start),
        ConsoleCommand::Stop => Some(Command::Stop),
        ConsoleCommand::IsRunning => Some(Command::IsRunning),
        ConsoleCommand::ProcessAddress { mac } => Some(Command::ProcessAddress(mac)),
        ConsoleCommand::ClearScanning => Some(Command::ClearScanning),
        ConsoleCommand::Quit => None,
    })
}

fn to_line<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json + "\n"),
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            None
        }
    }
}

/// Serve commands from `input` until EOF or `quit`, then tear the coordinator
/// down. Returns the output writer once everything has been flushed.
pub async fn run_console<I, O>(handle: CoordinatorHandle, input: I, output: O) -> Result<O>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = line_rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(output)
    });

    let mut events = handle.subscribe()?;
    let event_lines = line_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = to_line::<BoundaryEvent>(&event) {
                let _ = event_lines.send(line);
            }
        }
    });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Console input: {}", line);

        let reply = match parse_line(line) {
            Ok(Some(command)) => match handle.execute(command).await {
                Ok(reply) => ConsoleReply::from(reply),
                Err(e) => ConsoleReply::from(e),
            },
            Ok(None) => {
                info!("Quit requested");
                break;
            }
            Err(reply) => {
                warn!("Rejected console input: {}", line);
                reply
            }
        };
        if let Some(line) = to_line(&reply) {
            let _ = line_tx.send(line);
        }
    }

    handle.unsubscribe();
    handle.teardown().await;
    let _ = forwarder.await;
    drop(line_tx);

    Ok(writer.await??)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::BEACON_PASSWORD;
    use crate::infrastructure::bluetooth::service::{self, CoordinatorConfig};
    use crate::infrastructure::bluetooth::simulated::SimulatedRadio;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_line(r#"{"command":"start"}"#),
            Ok(Some(Command::Start))
        );
        assert_eq!(
            parse_line(r#"{"command":"process_address","mac":"AA:BB"}"#),
            Ok(Some(Command::ProcessAddress("AA:BB".to_string())))
        );
        assert_eq!(parse_line(r#"{"command":"quit"}"#), Ok(None));
    }

    #[test]
    fn bad_input_yields_bad_request() {
        match parse_line("not json") {
            Err(ConsoleReply::Error { code, .. }) => assert_eq!(code, "BAD_REQUEST"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn reply_json_shape() {
        let line = to_line(&ConsoleReply::Running { value: true }).unwrap();
        assert_eq!(line, "{\"reply\":\"running\",\"value\":true}\n");

        let line = to_line(&ConsoleReply::from(CoordinatorError::SessionActive)).unwrap();
        assert!(line.contains("\"code\":\"SESSION_ACTIVE\""));
    }

    #[tokio::test]
    async fn console_round_trip() {
        let radio = Arc::new(SimulatedRadio::new(
            Vec::new(),
            Duration::from_secs(60),
            BEACON_PASSWORD,
        ));
        let handle = service::spawn(radio, CoordinatorConfig::default());

        let input: &[u8] = b"{\"command\":\"is_running\"}\n\
            garbage\n\
            {\"command\":\"process_address\",\"mac\":\"  \"}\n\
            {\"command\":\"quit\"}\n\
            {\"command\":\"stop\"}\n";
        let output = run_console(handle.clone(), input, Vec::new()).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("{\"reply\":\"running\",\"value\":true}"));
        assert!(output.contains("\"code\":\"BAD_REQUEST\""));
        assert!(output.contains("\"code\":\"INVALID_ADDRESS\""));
        assert!(!output.contains("{\"reply\":\"ok\"}"));

        assert_eq!(handle.start().await, Err(CoordinatorError::Stopped));
    }
}
