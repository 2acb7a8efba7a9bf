use std::time::{Duration, Instant};

use crate::domain::ports::ProcessExit;
use crate::domain::value_objects::SessionState;

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub timestamp: Instant,
    pub reason: Option<String>,
}

/// Domain entity tracking one external process session from spawn to exit
#[derive(Debug)]
pub struct SessionLifecycle {
    current_state: SessionState,
    state_history: Vec<StateTransition>,
    started_at: Option<Instant>,
    exit: Option<ProcessExit>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Idle,
            state_history: Vec::new(),
            started_at: None,
            exit: None,
        }
    }

    pub fn current_state(&self) -> &SessionState {
        &self.current_state
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|start| start.elapsed())
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        self.exit
    }

    pub fn transition_count(&self) -> usize {
        self.state_history.len()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn transition_to_starting(&mut self) {
        self.record_transition(SessionState::Starting, None);
    }

    pub fn transition_to_connected(&mut self) {
        self.record_transition(SessionState::Connected, None);

        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn transition_to_retrying(&mut self, attempt: u32, reason: Option<String>) {
        self.record_transition(SessionState::Retrying { attempt }, reason);
    }

    pub fn transition_to_streaming(&mut self) {
        if self.current_state.is_streaming() {
            return;
        }
        self.record_transition(SessionState::Streaming, None);
    }

    /// Terminal; later calls are ignored so the first exit status wins
    pub fn transition_to_stopped(&mut self, exit: Option<ProcessExit>, reason: Option<String>) {
        if self.current_state.is_terminal() {
            return;
        }
        self.exit = exit;
        self.record_transition(SessionState::Stopped, reason);
    }

    pub fn transition_to_failed(&mut self, reason: Option<String>) {
        if self.current_state.is_terminal() {
            return;
        }
        self.record_transition(SessionState::Failed, reason);
    }

    fn record_transition(&mut self, new_state: SessionState, reason: Option<String>) {
        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            timestamp: Instant::now(),
            reason,
        };

        self.state_history.push(transition);
        self.current_state = new_state;
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
