//! Fakes for exercising the queue without a network.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use super::item::ActionPayload;
use super::remote::{CheckInRemote, RemoteError};

/// Scripted response for one remote call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    Fail(RemoteError),
    /// The server applies the effect but the response is lost.
    ApplyThenFail(RemoteError),
}

/// A server double that honours idempotency keys.
///
/// Replies are consumed in call order; once the script is exhausted every
/// call succeeds.
#[derive(Default)]
pub struct ScriptedRemote {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
    effects: Mutex<HashSet<String>>,
    applications: Mutex<usize>,
}

impl ScriptedRemote {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Idempotency keys of every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct logical operations applied server-side.
    pub fn effect_count(&self) -> usize {
        self.effects.lock().unwrap().len()
    }

    /// Times any request was applied, before deduplication.
    pub fn raw_applications(&self) -> usize {
        *self.applications.lock().unwrap()
    }

    fn apply(&self, key: &str) {
        *self.applications.lock().unwrap() += 1;
        self.effects.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl CheckInRemote for ScriptedRemote {
    async fn perform_action(
        &self,
        _payload: &ActionPayload,
        idempotency_key: &str,
    ) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(idempotency_key.to_string());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => {
                self.apply(idempotency_key);
                Ok(())
            },
            Reply::Fail(err) => Err(err),
            Reply::ApplyThenFail(err) => {
                self.apply(idempotency_key);
                Err(err)
            },
        }
    }
}

/// A remote whose calls block until released, for overlapping-flush tests.
pub struct GatedRemote {
    gate: Semaphore,
    entered: Notify,
    calls: Mutex<Vec<String>>,
}

impl GatedRemote {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Wait until a call is blocked inside the remote.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` blocked or future calls complete successfully.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckInRemote for GatedRemote {
    async fn perform_action(
        &self,
        _payload: &ActionPayload,
        idempotency_key: &str,
    ) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(idempotency_key.to_string());
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| RemoteError::network("gate closed"))?;
        permit.forget();
        Ok(())
    }
}
