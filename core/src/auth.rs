/// Auth seam — the core only reads the current viewer, never credentials
///
/// The authentication provider is an external collaborator. Components take
/// the viewer as an explicit dependency through this trait instead of reading
/// a process-global "current user", which keeps tests able to run with fake
/// viewers.
use std::sync::Mutex;

use crate::types::Participant;

pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<Participant>;
}

/// In-memory provider backed by an explicit sign-in/sign-out lifecycle.
/// Production embeddings adapt their real auth SDK behind [`AuthProvider`];
/// tests use this directly.
pub struct StaticAuth {
    user: Mutex<Option<Participant>>,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self {
            user: Mutex::new(None),
        }
    }

    pub fn signed_in(user: Participant) -> Self {
        Self {
            user: Mutex::new(Some(user)),
        }
    }

    pub fn sign_in(&self, user: Participant) {
        *self.user.lock().expect("auth lock poisoned") = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.lock().expect("auth lock poisoned") = None;
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<Participant> {
        self.user.lock().expect("auth lock poisoned").clone()
    }
}
