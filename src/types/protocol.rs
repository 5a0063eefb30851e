use std::fmt;
use std::time::Duration;

use super::serialisable::BeanstalkSerialisable;
use crate::error::{Error, Result, ServerError};

/// Longest tube name the server accepts, in bytes.
pub const MAX_TUBE_NAME_LEN: usize = 200;

/// A command sent by the client to the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BeanstalkCommand<'a> {
    /// Places a job onto the currently `use`d queue.
    ///
    /// On the wire: `put <pri> <delay> <ttr> <n_bytes>`, then the data and a
    /// CRLF.
    Put {
        pri: u32,
        delay: u32,
        ttr: u32,
        data: &'a [u8],
    },
    /// As `put`, but on servers supporting it, asks the server not to create
    /// a duplicate of an existing job with the same body.
    ///
    /// On the wire: `put-unique <pri> <delay> <ttr> <n_bytes>`, then the data
    /// and a CRLF.
    PutUnique {
        pri: u32,
        delay: u32,
        ttr: u32,
        data: &'a [u8],
    },
    /// Awaits a job from all the `watch`ed queues, blocking until one appears.
    ///
    /// On the wire: `reserve`
    Reserve,
    /// As `reserve`, but after `timeout` seconds pass, a `TIMED_OUT` response
    /// is sent instead.
    ///
    /// On the wire: `reserve-with-timeout <seconds>`
    ReserveWithTimeout { timeout: u32 },
    /// Reserves a job with a given ID if it exists and is not already reserved.
    ///
    /// On the wire: `reserve-job <id>`
    ReserveJob { id: u64 },
    /// Returns a job reserved by this client to the ready (or delayed) queue.
    ///
    /// On the wire: `release <id> <pri> <delay>`
    Release { id: u64, pri: u32, delay: u32 },
    /// On the wire: `delete <id>`
    Delete { id: u64 },
    /// On the wire: `bury <id> <pri>`
    Bury { id: u64, pri: u32 },
    /// Refreshes the Time To Run (TTR) of a job reserved by this client.
    ///
    /// On the wire: `touch <id>`
    Touch { id: u64 },
    /// On the wire: `watch <tube>`
    Watch { tube: &'a str },
    /// On the wire: `ignore <tube>`
    Ignore { tube: &'a str },
    /// On the wire: `use <tube>`
    Use { tube: &'a str },
    /// On the wire: `peek <id>`
    Peek { id: u64 },
    /// On the wire: `peek-ready`
    PeekReady,
    /// On the wire: `peek-delayed`
    PeekDelayed,
    /// On the wire: `peek-buried`
    PeekBuried,
    /// Promotes up to `bound` jobs on the currently-used tube to ready. Buried
    /// jobs are kicked if any exist, otherwise delayed jobs are.
    ///
    /// On the wire: `kick <bound>`
    Kick { bound: u64 },
    /// On the wire: `kick-job <id>`
    KickJob { id: u64 },
    /// On the wire: `stats-job <id>`
    StatsJob { id: u64 },
    /// On the wire: `stats-tube <tube>`
    StatsTube { tube: &'a str },
    /// On the wire: `stats`
    StatsServer,
    /// On the wire: `list-tubes`
    ListTubes,
    /// On the wire: `list-tube-used`
    ListTubeUsed,
    /// On the wire: `list-tubes-watched`
    ListTubesWatched,
    /// On the wire: `pause-tube <tube> <delay>`
    PauseTube { tube: &'a str, delay: u32 },
    /// On the wire: `quit`
    Quit,
}

impl BeanstalkSerialisable for BeanstalkCommand<'_> {
    fn serialise_beanstalk(&self) -> Vec<u8> {
        use BeanstalkCommand::*;

        fn with_data(line: String, data: &[u8]) -> Vec<u8> {
            let mut buf = Vec::with_capacity(line.len() + data.len() + 2);
            buf.extend_from_slice(line.as_bytes());
            buf.extend_from_slice(data);
            buf.extend_from_slice(b"\r\n");
            buf
        }

        match self {
            Put {
                pri,
                delay,
                ttr,
                data,
            } => with_data(
                format!("put {pri} {delay} {ttr} {}\r\n", data.len()),
                data,
            ),
            PutUnique {
                pri,
                delay,
                ttr,
                data,
            } => with_data(
                format!("put-unique {pri} {delay} {ttr} {}\r\n", data.len()),
                data,
            ),
            Reserve => b"reserve\r\n".to_vec(),
            ReserveWithTimeout { timeout } => {
                format!("reserve-with-timeout {timeout}\r\n").into()
            },
            ReserveJob { id } => format!("reserve-job {id}\r\n").into(),
            Release { id, pri, delay } => {
                format!("release {id} {pri} {delay}\r\n").into()
            },
            Delete { id } => format!("delete {id}\r\n").into(),
            Bury { id, pri } => format!("bury {id} {pri}\r\n").into(),
            Touch { id } => format!("touch {id}\r\n").into(),
            Watch { tube } => format!("watch {tube}\r\n").into(),
            Ignore { tube } => format!("ignore {tube}\r\n").into(),
            Use { tube } => format!("use {tube}\r\n").into(),
            Peek { id } => format!("peek {id}\r\n").into(),
            PeekReady => b"peek-ready\r\n".to_vec(),
            PeekDelayed => b"peek-delayed\r\n".to_vec(),
            PeekBuried => b"peek-buried\r\n".to_vec(),
            Kick { bound } => format!("kick {bound}\r\n").into(),
            KickJob { id } => format!("kick-job {id}\r\n").into(),
            StatsJob { id } => format!("stats-job {id}\r\n").into(),
            StatsTube { tube } => format!("stats-tube {tube}\r\n").into(),
            StatsServer => b"stats\r\n".to_vec(),
            ListTubes => b"list-tubes\r\n".to_vec(),
            ListTubeUsed => b"list-tube-used\r\n".to_vec(),
            ListTubesWatched => b"list-tubes-watched\r\n".to_vec(),
            PauseTube { tube, delay } => {
                format!("pause-tube {tube} {delay}\r\n").into()
            },
            Quit => b"quit\r\n".to_vec(),
        }
    }
}

/// Converts a duration to whole seconds for the wire, truncating any fraction
/// and saturating at `u32::MAX`.
pub(crate) fn wire_secs(d: Duration) -> u32 {
    u32::try_from(d.as_secs()).unwrap_or(u32::MAX)
}

/// Rejects tube names the server would refuse, before anything is sent.
pub(crate) fn check_tube_name(tube: &str) -> Result<()> {
    fn char_is_name_safe(c: u8, is_first: bool) -> bool {
        match c {
            b'a'..=b'z' => true,
            b'A'..=b'Z' => true,
            b'0'..=b'9' => true,
            b'+' | b'/' | b';' | b'.' | b'$' | b'_' | b'(' | b')' => true,
            b'-' => !is_first, // - is only name safe outside first position
            _ => false,
        }
    }

    if tube.len() > MAX_TUBE_NAME_LEN {
        return Err(Error::TubeNameTooLong { len: tube.len() });
    }

    if tube.is_empty()
        || !tube
            .bytes()
            .enumerate()
            .all(|(i, c)| char_is_name_safe(c, i == 0))
    {
        return Err(Error::InvalidTubeName(tube.to_owned()));
    }

    Ok(())
}

/// A response status line sent by the server, minus any data that follows it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BeanstalkResponse {
    /// Any of the bare error statuses, e.g. `NOT_FOUND` or `TIMED_OUT`.
    Failure(ServerError),
    /// In response to a `put`, indicates a job was created with the given ID.
    ///
    /// On the wire: `INSERTED <id>`.
    Inserted { id: u64 },
    /// In response to a `put`, indicates the job was created but immediately
    /// buried due to memory pressure.
    ///
    /// On the wire: `BURIED <id>`.
    BuriedId { id: u64 },
    /// In response to a `use` or `list-tube-used`.
    ///
    /// On the wire: `USING <tube>`.
    Using { tube: String },
    /// In response to the `reserve` family. `n_bytes` of data and a CRLF
    /// follow.
    ///
    /// On the wire: `RESERVED <id> <n_bytes>`.
    Reserved { id: u64, n_bytes: u64 },
    /// In response to the `peek` family. `n_bytes` of data and a CRLF follow.
    ///
    /// On the wire: `FOUND <id> <n_bytes>`.
    Found { id: u64, n_bytes: u64 },
    /// In response to the `stats` and `list-tubes` families. `n_bytes` of YAML
    /// and a CRLF follow.
    ///
    /// On the wire: `OK <n_bytes>`.
    OkBytes { n_bytes: u64 },
    /// On the wire: `DELETED`.
    Deleted,
    /// On the wire: `RELEASED`.
    Released,
    /// In response to a `bury`, indicates success. In response to a
    /// `release`, indicates the job was buried due to memory pressure.
    ///
    /// On the wire: `BURIED`.
    Buried,
    /// On the wire: `TOUCHED`.
    Touched,
    /// In response to a `watch` or `ignore`, the number of tubes watched.
    ///
    /// On the wire: `WATCHING <count>`.
    Watching { count: u32 },
    /// On the wire: `NOT_IGNORED`.
    NotIgnored,
    /// In response to a `kick`, the number of jobs actually kicked.
    ///
    /// On the wire: `KICKED <count>`.
    KickedCount { count: u64 },
    /// In response to a `kick-job`, indicates success.
    ///
    /// On the wire: `KICKED`.
    Kicked,
    /// On the wire: `PAUSED`.
    Paused,
}

impl BeanstalkResponse {
    /// Converts a response that isn't the expected success for a command into
    /// the matching error.
    ///
    /// `BURIED <id>` and `NOT_IGNORED` only mean something as replies to `put`
    /// and `ignore`, which handle them before getting here; like any other
    /// out-of-place reply they become [`Error::Unrecognised`].
    pub fn into_error(self) -> Error {
        match self {
            Self::Failure(err) => Error::Server(err),
            Self::Buried => Error::Server(ServerError::Buried),
            other => Error::Unrecognised(other.to_string()),
        }
    }
}

// Renders the status line as it appeared on the wire, without the CRLF.
impl fmt::Display for BeanstalkResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BeanstalkResponse::*;

        match self {
            Failure(err) => f.write_str(err.status()),
            Inserted { id } => write!(f, "INSERTED {id}"),
            BuriedId { id } => write!(f, "BURIED {id}"),
            Using { tube } => write!(f, "USING {tube}"),
            Reserved { id, n_bytes } => write!(f, "RESERVED {id} {n_bytes}"),
            Found { id, n_bytes } => write!(f, "FOUND {id} {n_bytes}"),
            OkBytes { n_bytes } => write!(f, "OK {n_bytes}"),
            Deleted => f.write_str("DELETED"),
            Released => f.write_str("RELEASED"),
            Buried => f.write_str("BURIED"),
            Touched => f.write_str("TOUCHED"),
            Watching { count } => write!(f, "WATCHING {count}"),
            NotIgnored => f.write_str("NOT_IGNORED"),
            KickedCount { count } => write!(f, "KICKED {count}"),
            Kicked => f.write_str("KICKED"),
            Paused => f.write_str("PAUSED"),
        }
    }
}
