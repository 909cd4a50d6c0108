//! Pure connection state machine.
//!
//! The WebSocket driver feeds discrete events in and executes the
//! returned actions; the machine itself never touches a clock or a
//! socket, which keeps the liveness and reconnect rules unit-testable.

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// A connection attempt is in flight.
    Connecting,
    /// The transport is established.
    Open,
    /// No transport; a reconnect is pending unless shutting down.
    Closed,
}

/// Discrete event driving the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEvent {
    /// The transport finished connecting.
    Opened,
    /// Any inbound signal arrived (application frame or protocol ping).
    FrameReceived,
    /// The transport closed or errored.
    TransportClosed,
    /// The liveness deadline expired with no inbound signal.
    DeadlineExpired,
    /// The reconnect backoff elapsed.
    ReconnectDue,
    /// External termination; bypass reconnect.
    ShutdownRequested,
}

/// Action the driver must execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnAction {
    /// Re-arm the liveness deadline (`heartbeat_interval + grace` ahead).
    ResetDeadline,
    /// Fire all registered ready-callbacks.
    FireReady,
    /// Arm the fixed-backoff reconnect timer.
    ScheduleReconnect,
    /// Force-close the underlying transport.
    CloseTransport,
    /// Stop driving; no further reconnects.
    Exit,
}

/// Connection state machine.
///
/// Reconnect is unconditional and indefinite; only a shutdown request
/// stops the cycle. A liveness deadline exists only while `Open`.
#[derive(Debug)]
pub struct ConnMachine {
    state: ConnState,
    shutting_down: bool,
}

impl ConnMachine {
    /// Start in `Connecting`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnState::Connecting,
            shutting_down: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnState {
        self.state
    }

    /// Whether a shutdown was requested.
    #[must_use]
    pub const fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Apply one event; returns the actions to execute, in order.
    pub fn on_event(&mut self, event: ConnEvent) -> Vec<ConnAction> {
        if self.shutting_down {
            return Vec::new();
        }

        match (self.state, event) {
            (_, ConnEvent::ShutdownRequested) => {
                self.shutting_down = true;
                self.state = ConnState::Closed;
                vec![ConnAction::CloseTransport, ConnAction::Exit]
            }
            (ConnState::Connecting, ConnEvent::Opened) => {
                self.state = ConnState::Open;
                vec![ConnAction::FireReady, ConnAction::ResetDeadline]
            }
            (ConnState::Connecting, ConnEvent::TransportClosed) => {
                self.state = ConnState::Closed;
                vec![ConnAction::ScheduleReconnect]
            }
            (ConnState::Open, ConnEvent::FrameReceived) => vec![ConnAction::ResetDeadline],
            (ConnState::Open, ConnEvent::DeadlineExpired) => {
                self.state = ConnState::Closed;
                vec![ConnAction::CloseTransport, ConnAction::ScheduleReconnect]
            }
            (ConnState::Open, ConnEvent::TransportClosed) => {
                self.state = ConnState::Closed;
                vec![ConnAction::ScheduleReconnect]
            }
            (ConnState::Closed, ConnEvent::ReconnectDue) => {
                self.state = ConnState::Connecting;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

impl Default for ConnMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_fires_ready_and_arms_deadline() {
        let mut machine = ConnMachine::new();
        let actions = machine.on_event(ConnEvent::Opened);
        assert_eq!(actions, vec![ConnAction::FireReady, ConnAction::ResetDeadline]);
        assert_eq!(machine.state(), ConnState::Open);
    }

    #[test]
    fn every_inbound_signal_resets_deadline() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::Opened);
        for _ in 0..3 {
            assert_eq!(
                machine.on_event(ConnEvent::FrameReceived),
                vec![ConnAction::ResetDeadline]
            );
        }
        assert_eq!(machine.state(), ConnState::Open);
    }

    #[test]
    fn deadline_expiry_closes_and_schedules_exactly_one_reconnect() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::Opened);
        let actions = machine.on_event(ConnEvent::DeadlineExpired);
        assert_eq!(
            actions,
            vec![ConnAction::CloseTransport, ConnAction::ScheduleReconnect]
        );
        assert_eq!(machine.state(), ConnState::Closed);

        // A late transport-close after expiry must not double-schedule.
        assert!(machine.on_event(ConnEvent::TransportClosed).is_empty());
    }

    #[test]
    fn remote_close_schedules_reconnect() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::Opened);
        assert_eq!(
            machine.on_event(ConnEvent::TransportClosed),
            vec![ConnAction::ScheduleReconnect]
        );
    }

    #[test]
    fn failed_connect_attempt_schedules_reconnect() {
        let mut machine = ConnMachine::new();
        assert_eq!(
            machine.on_event(ConnEvent::TransportClosed),
            vec![ConnAction::ScheduleReconnect]
        );
    }

    #[test]
    fn ready_refires_on_every_reconnection() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::Opened);
        machine.on_event(ConnEvent::TransportClosed);
        machine.on_event(ConnEvent::ReconnectDue);
        let actions = machine.on_event(ConnEvent::Opened);
        assert!(actions.contains(&ConnAction::FireReady));
    }

    #[test]
    fn shutdown_closes_once_and_bypasses_reconnect() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::Opened);
        let actions = machine.on_event(ConnEvent::ShutdownRequested);
        assert_eq!(actions, vec![ConnAction::CloseTransport, ConnAction::Exit]);

        // Nothing re-arms after shutdown.
        assert!(machine.on_event(ConnEvent::TransportClosed).is_empty());
        assert!(machine.on_event(ConnEvent::ReconnectDue).is_empty());
        assert!(machine.on_event(ConnEvent::Opened).is_empty());
    }

    #[test]
    fn reconnect_due_re_enters_connecting() {
        let mut machine = ConnMachine::new();
        machine.on_event(ConnEvent::TransportClosed);
        machine.on_event(ConnEvent::ReconnectDue);
        assert_eq!(machine.state(), ConnState::Connecting);
    }
}
