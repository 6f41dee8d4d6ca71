//! Scriptable in-process stand-in for the function backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use ecolesync::auth::{Credential, CredentialFuture, CredentialProvider};
use ecolesync::command::{Idempotency, QueuePolicy, QueueableCommand};
use ecolesync::error::{CredentialError, Rejection, RpcError};
use ecolesync::processor::ReplayPolicy;
use ecolesync::rpc::{RpcClient, RpcFuture};
use serde_json::{Value, json};

pub const KEY_FIELD: &str = "idempotencyKey";

/// One call as the stub saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub name: String,
    pub payload: Value,
    pub token: String,
}

/// A backend that applies each keyed write at most once.
///
/// While `down`, every call fails in transport. Scripted answers, when
/// queued, take precedence over the default behavior.
pub struct StubBackend {
    down: AtomicBool,
    scripted: Mutex<VecDeque<Result<Value, RpcError>>>,
    /// Apply the effect, then report a transport failure (lost response).
    lose_next_response: AtomicBool,
    applied: Mutex<Vec<(String, Value)>>,
    keys: Mutex<HashMap<String, Value>>,
    seen: Mutex<Vec<Seen>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubBackend {
    pub fn up() -> Self {
        Self {
            down: AtomicBool::new(false),
            scripted: Mutex::new(VecDeque::new()),
            lose_next_response: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
            keys: Mutex::new(HashMap::new()),
            seen: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn down() -> Self {
        let stub = Self::up();
        stub.set_down(true);
        stub
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn script(&self, answer: Result<Value, RpcError>) {
        self.scripted.lock().unwrap().push_back(answer);
    }

    pub fn lose_next_response(&self) {
        self.lose_next_response.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Effects the backend actually applied, in order.
    pub fn applied(&self) -> Vec<(String, Value)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, name: &str, payload: &Value) -> Result<Value, RpcError> {
        if let Some(answer) = self.scripted.lock().unwrap().pop_front() {
            return answer;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(RpcError::transport("connection refused"));
        }

        let key = payload
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .map(|key| format!("{name}/{key}"));
        if let Some(key) = &key
            && let Some(previous) = self.keys.lock().unwrap().get(key)
        {
            return Ok(previous.clone());
        }

        let result = json!({"ok": true, "seq": self.applied.lock().unwrap().len() + 1});
        self.applied
            .lock()
            .unwrap()
            .push((name.to_string(), payload.clone()));
        if let Some(key) = key {
            self.keys.lock().unwrap().insert(key, result.clone());
        }

        if self.lose_next_response.swap(false, Ordering::SeqCst) {
            return Err(RpcError::transport("response lost"));
        }
        Ok(result)
    }
}

impl RpcClient for StubBackend {
    fn call<'a>(
        &'a self,
        name: &'a str,
        payload: &'a Value,
        credential: &'a Credential,
    ) -> RpcFuture<'a> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(Seen {
                name: name.to_string(),
                payload: payload.clone(),
                token: credential.token().to_string(),
            });

            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let answer = self.answer(name, payload);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            answer
        })
    }
}

/// Hands out `token-1`, `token-2`, ... so tests can tell fetches apart.
pub struct CountingCredentials {
    fetched: AtomicUsize,
    signed_out: AtomicBool,
}

impl CountingCredentials {
    pub fn new() -> Self {
        Self {
            fetched: AtomicUsize::new(0),
            signed_out: AtomicBool::new(false),
        }
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    pub fn sign_out(&self) {
        self.signed_out.store(true, Ordering::SeqCst);
    }
}

impl CredentialProvider for CountingCredentials {
    fn fresh(&self) -> CredentialFuture<'_> {
        Box::pin(async move {
            if self.signed_out.load(Ordering::SeqCst) {
                return Err(CredentialError::Unavailable("signed out".into()));
            }
            let n = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential::bearer(format!("token-{n}")))
        })
    }
}

pub fn school_policy() -> QueuePolicy {
    QueuePolicy::new([
        QueueableCommand {
            name: "createPaiement".into(),
            idempotency: Idempotency::Key(KEY_FIELD.into()),
        },
        QueueableCommand {
            name: "toggleUserStatus".into(),
            idempotency: Idempotency::Natural,
        },
    ])
}

pub fn fast_replay(transport_retries: u32) -> ReplayPolicy {
    ReplayPolicy {
        transport_retries,
        base_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}

pub fn already_exists() -> RpcError {
    RpcError::Rejected(Rejection::new("ALREADY_EXISTS", "payment already recorded"))
}
