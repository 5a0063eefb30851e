use bytes::Bytes;

/// A job as returned by `reserve` or a `peek` command.
///
/// This is a snapshot: commands like `delete` or `release` act on the ID on
/// the server and never change a `Job` already returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    id: u64,
    body: Bytes,
}

impl Job {
    pub(crate) fn new(id: u64, body: Bytes) -> Self {
        Self { id, body }
    }

    /// The server-assigned job ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The job body exactly as it was put, including any CR or LF bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
