use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::driver::Snapshot;
use crate::suspension::QuarterCarParams;

/// Server -> client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        client_id: Uuid,
        params: QuarterCarParams,
        timestep: f64,
    },
    Snapshot(Snapshot),
    Pong,
}

/// Client -> server messages. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Reset,
}

/// Commands queued by client tasks and applied by the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
}

pub struct SharedSimState {
    pub tick: u64,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub pending: Vec<Command>,
}

impl SharedSimState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            clients: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        id
    }

    pub fn remove_client(&mut self, id: &Uuid) {
        self.clients.remove(id);
    }

    pub fn queue(&mut self, cmd: Command) {
        self.pending.push(cmd);
    }

    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    /// Serialize one snapshot and send it to every client. Clients whose
    /// channel has closed are dropped.
    pub fn broadcast_snapshot(&mut self, snapshot: Snapshot) -> Result<(), serde_json::Error> {
        self.tick = snapshot.tick;
        let json = serde_json::to_string(&ServerMessage::Snapshot(snapshot))?;

        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
        Ok(())
    }
}

impl Default for SharedSimState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::driver::Driver;
    use tokio::sync::mpsc;

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"reset"}"#).unwrap(),
            ClientMessage::Reset
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"input","throttle":1}"#).is_err());
    }

    #[test]
    fn test_broadcast_reaches_clients_and_prunes_closed() {
        let mut state = SharedSimState::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        state.register_client(tx_a);
        state.register_client(tx_b);
        drop(rx_b);

        let snapshot = Driver::new(&SimConfig::default()).unwrap().snapshot();
        state.broadcast_snapshot(snapshot).unwrap();

        let msg: serde_json::Value = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "snapshot");
        assert_eq!(msg["tick"], 0);
        assert_eq!(state.clients.len(), 1);
    }

    #[test]
    fn test_pending_commands_drain_once() {
        let mut state = SharedSimState::new();
        state.queue(Command::Reset);
        assert_eq!(state.drain_commands(), vec![Command::Reset]);
        assert!(state.drain_commands().is_empty());
    }

    #[test]
    fn test_welcome_shape() {
        let msg = ServerMessage::Welcome {
            client_id: Uuid::nil(),
            params: QuarterCarParams::default(),
            timestep: 0.01,
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "welcome");
        assert_eq!(v["params"]["body_mass"], 400.0);
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }
}
