use std::collections::HashMap;
use std::sync::Mutex;

use parity_web::CancelToken;

/// Cancel handles of the sessions running inside one execution unit.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for `session_id`, replacing any previous one.
    pub fn register(&self, session_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.lock().insert(session_id.to_string(), token.clone());
        token
    }

    pub fn get(&self, session_id: &str) -> Option<CancelToken> {
        self.lock().get(session_id).cloned()
    }

    pub fn remove(&self, session_id: &str) -> Option<CancelToken> {
        self.lock().remove(session_id)
    }

    /// Fires and forgets the session's token. Returns whether it was known.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.remove(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<CancelToken> = self.lock().drain().map(|(_, token)| token).collect();
        for token in &drained {
            token.cancel();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancelToken>> {
        // A poisoned map is still structurally valid.
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
