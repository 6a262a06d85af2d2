//! Scripted controller for exercising indexing and reconciliation without a
//! socket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::controller::{ChannelError, Controller, ControllerTransport, OutboundFrame};

/// Serialized-table reply for one occupied slot.
pub(crate) fn detail_reply(display_name: &str, id: &str, max_count: u32, count: u32) -> String {
    format!(
        "{{\n  count = {count},\n  displayName = \"{display_name}\",\n  maxCount = {max_count},\n  name = \"{id}\",\n}}"
    )
}

pub(crate) fn redstone_reply(count: u32) -> String {
    detail_reply("Redstone Dust", "minecraft:redstone", 64, count)
}

#[derive(Debug, Default)]
struct FakeState {
    /// Attached peripherals and the raw reply for each slot (`None` = `nil`).
    peripherals: HashMap<String, Vec<Option<String>>>,
    /// Raw size replies that replace the real slot count.
    size_replies: HashMap<String, String>,
    log: Vec<String>,
    in_flight: usize,
    overlapped: bool,
    /// Commands answered before the connection drops.
    lose_connection_after: Option<usize>,
}

/// A controller whose world is a table of peripherals.
#[derive(Debug, Default)]
pub(crate) struct FakeController {
    state: Mutex<FakeState>,
}

impl FakeController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, id: &str, slots: Vec<Option<String>>) {
        self.state
            .lock()
            .unwrap()
            .peripherals
            .insert(id.to_string(), slots);
    }

    pub(crate) fn attach_empty(&self, id: &str, size: usize) {
        self.attach(id, vec![None; size]);
    }

    pub(crate) fn detach(&self, id: &str) {
        self.state.lock().unwrap().peripherals.remove(id);
    }

    pub(crate) fn set_slot(&self, id: &str, slot: usize, reply: Option<String>) {
        let mut state = self.state.lock().unwrap();
        let slots = state.peripherals.get_mut(id).expect("peripheral attached");
        slots[slot] = reply;
    }

    /// Answer size queries for `id` with `reply` whatever its real size.
    pub(crate) fn set_size_reply(&self, id: &str, reply: &str) {
        self.state
            .lock()
            .unwrap()
            .size_replies
            .insert(id.to_string(), reply.to_string());
    }

    pub(crate) fn lose_connection_after(&self, commands: usize) {
        self.state.lock().unwrap().lose_connection_after = Some(commands);
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub(crate) fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// True if two commands were ever evaluated concurrently.
    pub(crate) fn overlapped(&self) -> bool {
        self.state.lock().unwrap().overlapped
    }

    fn answer(&self, expression: &str) -> Result<String, ChannelError> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = state.lose_connection_after {
            if state.log.len() >= limit {
                return Err(ChannelError::ConnectionLost);
            }
        }
        state.log.push(expression.to_string());

        let id = first_quoted(expression);
        let reply = if expression.starts_with("return peripheral.isPresent(") {
            state.peripherals.contains_key(&id).to_string()
        } else if expression.ends_with("\"size\")") {
            if let Some(reply) = state.size_replies.get(&id) {
                return Ok(reply.clone());
            }
            match state.peripherals.get(&id) {
                Some(slots) => slots.len().to_string(),
                None => "nil".to_string(),
            }
        } else if expression.contains("\"getItemDetail\"") {
            let slot: usize = expression
                .rsplit(", ")
                .next()
                .and_then(|s| s.trim_end_matches(')').parse().ok())
                .expect("slot argument");
            state
                .peripherals
                .get(&id)
                .and_then(|slots| slots.get(slot - 1).cloned().flatten())
                .unwrap_or_else(|| "nil".to_string())
        } else {
            panic!("unexpected expression {expression}");
        };
        Ok(reply)
    }
}

fn first_quoted(expression: &str) -> String {
    let start = expression.find('"').expect("quoted id") + 1;
    let end = start + expression[start..].find('"').expect("closing quote");
    expression[start..end].to_string()
}

#[async_trait]
impl Controller for FakeController {
    async fn execute(&self, expression: String) -> Result<String, ChannelError> {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            if state.in_flight > 1 {
                state.overlapped = true;
            }
        }
        tokio::task::yield_now().await;
        let reply = self.answer(&expression);
        self.state.lock().unwrap().in_flight -= 1;
        reply
    }
}

/// Put `controller` behind a transport, the way the socket task would.
///
/// The returned task yields any close frames the core sent.
pub(crate) fn serve(
    controller: Arc<FakeController>,
) -> (ControllerTransport, tokio::task::JoinHandle<Vec<OutboundFrame>>) {
    let (to_core, inbound) = mpsc::channel(16);
    let (outbound, mut from_core) = mpsc::channel(16);
    let task = tokio::spawn(async move {
        let mut closes = Vec::new();
        while let Some(frame) = from_core.recv().await {
            match frame {
                OutboundFrame::Text(expression) => match controller.execute(expression).await {
                    Ok(reply) => {
                        if to_core.send(reply).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                close @ OutboundFrame::Close { .. } => {
                    closes.push(close);
                    break;
                }
            }
        }
        closes
    });
    (ControllerTransport { inbound, outbound }, task)
}
