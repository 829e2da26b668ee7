//! Call-session state machine.
//!
//! A call moves Ringing -> Active on accept, or Ringing -> Ended on reject,
//! ring timeout, or a party disconnecting. Active calls end when either party
//! disconnects. The hub owns the table and drives the timeout.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Ringing,
    Active,
    Ended,
}

#[derive(Debug)]
pub struct CallSession {
    pub call_id: String,
    pub caller_id: String,
    pub callee_id: String,
    pub caller_name: String,
    pub payload: Value,
    pub state: CallState,
    pub started_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(caller_id: &str, callee_id: &str, caller_name: &str, payload: Value) -> Self {
        let now = Utc::now();
        CallSession {
            // Locally distinct, not globally unique; matches the client's id scheme.
            call_id: format!("{}-{}-{}", now.timestamp_millis(), caller_id, callee_id),
            caller_id: caller_id.to_string(),
            callee_id: callee_id.to_string(),
            caller_name: caller_name.to_string(),
            payload,
            state: CallState::Ringing,
            started_at: now,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.caller_id == user_id || self.callee_id == user_id
    }

    /// The other party's id, if `user_id` is a participant.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        if self.caller_id == user_id {
            Some(&self.callee_id)
        } else if self.callee_id == user_id {
            Some(&self.caller_id)
        } else {
            None
        }
    }

    /// Ringing -> Active. Any other starting state is an error.
    pub fn accept(&mut self) -> Result<(), CallState> {
        match self.state {
            CallState::Ringing => {
                self.state = CallState::Active;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Ringing -> Ended. Rejecting a non-ringing call is an error.
    pub fn reject(&mut self) -> Result<(), CallState> {
        match self.state {
            CallState::Ringing => {
                self.state = CallState::Ended;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Ring timeout: only ends a call that is still ringing.
    pub fn timeout(&mut self) -> bool {
        if self.state == CallState::Ringing {
            self.state = CallState::Ended;
            true
        } else {
            false
        }
    }

    /// Unconditional end (party disconnected).
    pub fn end(&mut self) {
        self.state = CallState::Ended;
    }
}

/// All calls the hub currently knows about, keyed by call id.
#[derive(Default)]
pub struct CallTable {
    calls: HashMap<String, CallSession>,
}

impl CallTable {
    pub fn insert(&mut self, call: CallSession) -> &CallSession {
        let id = call.call_id.clone();
        self.calls.insert(id.clone(), call);
        &self.calls[&id]
    }

    pub fn get_mut(&mut self, call_id: &str) -> Option<&mut CallSession> {
        self.calls.get_mut(call_id)
    }

    pub fn remove(&mut self, call_id: &str) -> Option<CallSession> {
        self.calls.remove(call_id)
    }

    /// A user may only be in one non-ended call at a time.
    pub fn find_for_user(&self, user_id: &str) -> Option<&CallSession> {
        self.calls
            .values()
            .find(|c| c.state != CallState::Ended && c.involves(user_id))
    }

    /// Ends every non-ended call the user participates in and returns
    /// (call_id, peer_id) pairs so the hub can notify the peers.
    pub fn end_for_user(&mut self, user_id: &str) -> Vec<(String, String)> {
        let mut ended = Vec::new();
        for call in self.calls.values_mut() {
            if call.state != CallState::Ended && call.involves(user_id) {
                call.end();
                if let Some(peer) = call.peer_of(user_id) {
                    ended.push((call.call_id.clone(), peer.to_string()));
                }
            }
        }
        self.calls.retain(|_, c| c.state != CallState::Ended);
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn new_call() -> CallSession {
        CallSession::new("caller", "callee", "Ana", Value::Null)
    }

    #[test]
    fn call_id_embeds_both_participants() {
        let call = new_call();
        assert!(call.call_id.contains("caller"));
        assert!(call.call_id.contains("callee"));
    }

    #[test]
    fn accept_moves_ringing_to_active_without_peer_ack() {
        let mut call = new_call();
        assert_eq!(call.state, CallState::Ringing);
        call.accept().unwrap();
        assert_eq!(call.state, CallState::Active);
    }

    #[test]
    fn accept_fails_once_ended() {
        let mut call = new_call();
        call.reject().unwrap();
        assert_eq!(call.accept(), Err(CallState::Ended));
    }

    #[test]
    fn timeout_only_ends_a_ringing_call() {
        let mut call = new_call();
        call.accept().unwrap();
        assert!(!call.timeout());
        assert_eq!(call.state, CallState::Active);

        let mut call = new_call();
        assert!(call.timeout());
        assert_eq!(call.state, CallState::Ended);
    }

    #[test]
    fn end_for_user_ends_calls_and_reports_peers() {
        let mut table = CallTable::default();
        table.insert(new_call());
        let ended = table.end_for_user("callee");
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].1, "caller");
        assert!(table.find_for_user("caller").is_none());
    }

    #[test]
    fn caller_counts_as_busy_while_ringing_or_active() {
        // Placing a second call must be refused for the caller as well as
        // the callee, in both non-ended states.
        let mut table = CallTable::default();
        let id = table.insert(new_call()).call_id.clone();
        assert!(table.find_for_user("caller").is_some());

        table.get_mut(&id).unwrap().accept().unwrap();
        assert!(table.find_for_user("caller").is_some());
        assert!(table.find_for_user("callee").is_some());
    }

    #[test]
    fn find_for_user_ignores_ended_calls() {
        let mut table = CallTable::default();
        let id = table.insert(new_call()).call_id.clone();
        table.get_mut(&id).unwrap().reject().unwrap();
        assert!(table.find_for_user("caller").is_none());
    }
}
