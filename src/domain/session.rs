//! Connection Session
//!
//! The pairing-and-configure attempt for one peripheral, expressed as a pure
//! transition function. The coordinator feeds it events and carries out the
//! effects it returns; the session itself never touches the radio.

use crate::domain::models::PeripheralRecord;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Statuses the radio reports while connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    ReadingInfo,
    DeviceValidating,
    PasswordValidating,
    Synchronizing,
    ReadingConfiguration,
    Completed,
    ConnectFailed,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    PasswordValidating,
    Configuring,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Status(ConnectionStatus),
    Error(String),
    /// The trigger configuration request has been handed to the radio
    ConfigurationIssued,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    SupplyPassword,
    ConfigureTrigger,
    Disconnect,
    Finish { success: bool },
}

/// Compute the next state and the effects to run for `event` in `state`.
pub fn transition(state: SessionState, event: &SessionEvent) -> (SessionState, Vec<SessionEffect>) {
    use SessionEffect::*;
    use SessionState::*;

    if state.is_terminal() {
        return (state, Vec::new());
    }

    match (state, event) {
        (_, SessionEvent::Error(_)) => (Failed, vec![Finish { success: false }]),
        (_, SessionEvent::TimedOut) => (Failed, vec![Disconnect, Finish { success: false }]),

        (Configuring, SessionEvent::ConfigurationIssued) => {
            (Completed, vec![Disconnect, Finish { success: true }])
        }
        (_, SessionEvent::ConfigurationIssued) => (state, Vec::new()),

        (Configuring, SessionEvent::Status(_)) => (state, Vec::new()),
        (_, SessionEvent::Status(status)) => match status {
            ConnectionStatus::Connecting => (state, Vec::new()),
            ConnectionStatus::PasswordValidating => (PasswordValidating, vec![SupplyPassword]),
            ConnectionStatus::Completed => (Configuring, vec![ConfigureTrigger]),
            ConnectionStatus::ConnectFailed | ConnectionStatus::Disconnected => {
                (Failed, vec![Finish { success: false }])
            }
            // progress only
            _ => (state, Vec::new()),
        },
    }
}

#[derive(Debug)]
pub struct ConnectionSession {
    id: SessionId,
    target: PeripheralRecord,
    state: SessionState,
    started_at: Instant,
}

impl ConnectionSession {
    pub fn start(id: SessionId, target: PeripheralRecord) -> Self {
        Self {
            id,
            target,
            state: SessionState::Connecting,
            started_at: Instant::now(),
        }
    }

    pub fn handle(&mut self, event: &SessionEvent) -> Vec<SessionEffect> {
        let (next, effects) = transition(self.state, event);
        self.state = next;
        effects
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> &PeripheralRecord {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ConnectionSession {
        ConnectionSession::start(
            SessionId(1),
            PeripheralRecord {
                address: "AA:BB".to_string(),
                name: None,
                advertised_url: None,
            },
        )
    }

    fn report(s: &mut ConnectionSession, status: ConnectionStatus) -> Vec<SessionEffect> {
        s.handle(&SessionEvent::Status(status))
    }

    #[test]
    fn happy_path_runs_password_then_configure_then_disconnect() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Connecting);

        assert!(report(&mut s, ConnectionStatus::Connecting).is_empty());
        assert_eq!(
            report(&mut s, ConnectionStatus::PasswordValidating),
            vec![SessionEffect::SupplyPassword]
        );
        assert_eq!(s.state(), SessionState::PasswordValidating);

        assert_eq!(
            report(&mut s, ConnectionStatus::Completed),
            vec![SessionEffect::ConfigureTrigger]
        );
        assert_eq!(s.state(), SessionState::Configuring);

        assert_eq!(
            s.handle(&SessionEvent::ConfigurationIssued),
            vec![
                SessionEffect::Disconnect,
                SessionEffect::Finish { success: true }
            ]
        );
        assert_eq!(s.state(), SessionState::Completed);
    }

    #[test]
    fn progress_statuses_do_not_move_state() {
        let mut s = session();
        for status in [
            ConnectionStatus::Connected,
            ConnectionStatus::ReadingInfo,
            ConnectionStatus::DeviceValidating,
            ConnectionStatus::Synchronizing,
            ConnectionStatus::ReadingConfiguration,
        ] {
            assert!(report(&mut s, status).is_empty());
            assert_eq!(s.state(), SessionState::Connecting);
        }
    }

    #[test]
    fn error_fails_from_any_live_state() {
        for start in [
            SessionState::Connecting,
            SessionState::PasswordValidating,
            SessionState::Configuring,
        ] {
            let (next, effects) = transition(start, &SessionEvent::Error("link lost".into()));
            assert_eq!(next, SessionState::Failed);
            assert_eq!(effects, vec![SessionEffect::Finish { success: false }]);
        }
    }

    #[test]
    fn connect_failed_status_fails_session() {
        let (next, effects) = transition(
            SessionState::PasswordValidating,
            &SessionEvent::Status(ConnectionStatus::Disconnected),
        );
        assert_eq!(next, SessionState::Failed);
        assert_eq!(effects, vec![SessionEffect::Finish { success: false }]);
    }

    #[test]
    fn timeout_disconnects_before_failing() {
        let (next, effects) = transition(SessionState::Connecting, &SessionEvent::TimedOut);
        assert_eq!(next, SessionState::Failed);
        assert_eq!(
            effects,
            vec![
                SessionEffect::Disconnect,
                SessionEffect::Finish { success: false }
            ]
        );
    }

    #[test]
    fn terminal_states_ignore_everything() {
        for terminal in [SessionState::Completed, SessionState::Failed] {
            for event in [
                SessionEvent::Status(ConnectionStatus::Completed),
                SessionEvent::Error("late".into()),
                SessionEvent::TimedOut,
                SessionEvent::ConfigurationIssued,
            ] {
                assert_eq!(transition(terminal, &event), (terminal, Vec::new()));
            }
        }
    }
}
