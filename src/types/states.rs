use serde::Deserialize;

/// The server-side lifecycle state of a job, as reported by `stats-job`.
///
/// The client never caches this: every command re-queries the server.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Ready,
    Delayed,
    Reserved,
    Buried,
}
