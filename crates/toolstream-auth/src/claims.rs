//! Token claims and subject-pattern authorization.

use serde::{Deserialize, Serialize};

/// Actions a token can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Publish,
    Subscribe,
    Fetch,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Publish => "publish",
            Action::Subscribe => "subscribe",
            Action::Fetch => "fetch",
        }
    }
}

/// Claims carried by a broker bearer token.
///
/// Created per authenticated request and attached to the request
/// extensions; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub client_id: String,
    /// Subject patterns this client may touch; empty means any.
    #[serde(default)]
    pub allowed_subjects: Vec<String>,
    /// Granted actions, subset of {publish, subscribe, fetch}.
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iss: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

impl Claims {
    /// Whether these claims permit `action` on `subject`.
    pub fn allows(&self, action: Action, subject: &str) -> bool {
        if !self.permissions.iter().any(|p| p == action.as_str()) {
            return false;
        }
        if self.allowed_subjects.is_empty() {
            return true;
        }
        self.allowed_subjects
            .iter()
            .any(|pattern| subject_matches(pattern, subject))
    }
}

/// Match a subject against a pattern where `*` is a single-segment wildcard.
///
/// Segments are dot-separated; `*` on its own matches everything. A
/// wildcard covers exactly one segment, so `images.*` matches `images.png`
/// but not `images.raw.cr2`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let mut pattern_segments = pattern.split('.');
    let mut subject_segments = subject.split('.');

    loop {
        match (pattern_segments.next(), subject_segments.next()) {
            (None, None) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            _ => return false,
        }
    }
}
