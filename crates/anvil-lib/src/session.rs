//! Player sessions. The updater only needs the offline variant; the
//! Microsoft variant carries externally obtained credentials and exists so
//! callers can hold either behind one type.

use md5::{Digest, Md5};
use uuid::Uuid;

/// Operations every session kind supports.
pub trait Account {
    fn username(&self) -> &str;
    fn uuid(&self) -> String;
    fn access_token(&self) -> String;
    fn user_type(&self) -> &'static str;

    /// Launch-command credential string.
    fn session_token(&self) -> String {
        format!("token:{}:{}", self.access_token(), self.uuid())
    }
}

pub enum Session {
    Offline(OfflineSession),
    Microsoft(MicrosoftSession),
}

impl Session {
    pub fn offline(username: impl Into<String>) -> Self {
        Session::Offline(OfflineSession::new(username))
    }
}

impl Account for Session {
    fn username(&self) -> &str {
        match self {
            Session::Offline(s) => s.username(),
            Session::Microsoft(s) => s.username(),
        }
    }

    fn uuid(&self) -> String {
        match self {
            Session::Offline(s) => s.uuid(),
            Session::Microsoft(s) => s.uuid(),
        }
    }

    fn access_token(&self) -> String {
        match self {
            Session::Offline(s) => s.access_token(),
            Session::Microsoft(s) => s.access_token(),
        }
    }

    fn user_type(&self) -> &'static str {
        match self {
            Session::Offline(s) => s.user_type(),
            Session::Microsoft(s) => s.user_type(),
        }
    }
}

/// Session derived purely from the username; no network I/O, and the same
/// name always produces the same identity.
pub struct OfflineSession {
    username: String,
}

impl OfflineSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl Account for OfflineSession {
    fn username(&self) -> &str {
        &self.username
    }

    fn uuid(&self) -> String {
        uuid_from_name(&self.username).to_string()
    }

    fn access_token(&self) -> String {
        uuid_from_name(&format!("{}_access", self.username)).to_string()
    }

    fn user_type(&self) -> &'static str {
        "offline"
    }
}

/// Credentials from a completed Microsoft login; authentication itself is
/// handled elsewhere.
pub struct MicrosoftSession {
    pub username: String,
    pub profile_id: String,
    pub token: String,
}

impl Account for MicrosoftSession {
    fn username(&self) -> &str {
        &self.username
    }

    fn uuid(&self) -> String {
        self.profile_id.clone()
    }

    fn access_token(&self) -> String {
        self.token.clone()
    }

    fn user_type(&self) -> &'static str {
        "microsoft"
    }
}

/// The 16 MD5 bytes of the name, reinterpreted directly as a 128-bit UUID
/// (first 8 bytes high, last 8 low, big-endian). Not a standards-compliant
/// name UUID, and not meant to be: it only has to be stable.
fn uuid_from_name(name: &str) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    let digest: [u8; 16] = hasher.finalize().into();
    Uuid::from_bytes(digest)
}
