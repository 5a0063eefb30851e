//! Implements a parser for beanstalkd response status lines.
use crate::error::{Error, Result, ServerError};
use crate::types::protocol::BeanstalkResponse;
use crate::util::bytes_to_human_str;

/// A known status whose fields didn't match its expected shape.
struct Malformed;

/// Provides a custom, minimal, zero-copy parser of byte slices.
struct ParseState<'a> {
    from: &'a [u8],
}

impl<'a> ParseState<'a> {
    /// Asserts there's no more input to take, returning `result` if so.
    fn expect_done_and<R>(&self, result: R) -> Result<R, Malformed> {
        if self.from.is_empty() {
            Ok(result)
        } else {
            Err(Malformed)
        }
    }

    /// Consumes from the input, expecting a token of non-zero length.
    fn expect_next_token(&mut self) -> Result<&'a [u8], Malformed> {
        match self.next_token() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(Malformed),
        }
    }

    /// Consumes from the input, expecting a space then a decimal number no
    /// larger than `max`.
    fn expect_next_number(&mut self, max: u64) -> Result<u64, Malformed> {
        self.expect_space()?;

        let token = self.expect_next_token()?;

        let mut r = 0u64;
        for v in token {
            match v {
                b'0'..=b'9' => {
                    r = r
                        .checked_mul(10)
                        .ok_or(Malformed)?
                        .checked_add((*v - b'0') as u64)
                        .ok_or(Malformed)?
                },
                _ => return Err(Malformed),
            };
        }

        if r > max {
            return Err(Malformed);
        }

        Ok(r)
    }

    /// Consumes from the input, expecting a space then a u32.
    fn expect_next_u32(&mut self) -> Result<u32, Malformed> {
        self.expect_next_number(u32::MAX as u64).map(|r| r as u32)
    }

    /// Consumes from the input, expecting a space then a u64.
    fn expect_next_u64(&mut self) -> Result<u64, Malformed> {
        self.expect_next_number(u64::MAX)
    }

    /// Consumes from the input, expecting a space then a tube name.
    fn expect_next_name(&mut self) -> Result<String, Malformed> {
        self.expect_space()?;

        let token = self.expect_next_token()?;

        String::from_utf8(token.to_vec()).map_err(|_| Malformed)
    }

    /// Consumes a space.
    fn expect_space(&mut self) -> Result<(), Malformed> {
        match self.from.first() {
            Some(b' ') => {
                self.from = &self.from[1..];
                Ok(())
            },
            _ => Err(Malformed),
        }
    }

    /// Consumes from this ParseState until reaching a space byte or the end of
    /// the input. It returns None at the end of the input. On consecutive space
    /// bytes, it returns a zero-length slice.
    fn next_token(&mut self) -> Option<&'a [u8]> {
        let from = self.from;

        if from.is_empty() {
            return None;
        }

        let idx = from.iter().position(|c| *c == b' ').unwrap_or(from.len());

        self.from = &from[idx..];

        Some(&from[..idx])
    }
}

impl<'a> From<&'a [u8]> for ParseState<'a> {
    fn from(from: &'a [u8]) -> Self {
        ParseState { from }
    }
}

/// Parses one status line, without its trailing CRLF.
///
/// The leading token picks the expected shape, and only then are any scalar
/// fields scanned for, so statuses sharing a prefix (`BURIED` and
/// `BURIED <id>`, `KICKED` and `KICKED <count>`) never get confused.
///
/// An unknown leading token is [`Error::Unrecognised`]; a known one with
/// missing, extra, or unparseable fields is [`Error::Malformed`].
pub fn parse_response(line: &[u8]) -> Result<BeanstalkResponse> {
    let mut ps: ParseState = line.into();

    match parse_status(&mut ps) {
        Ok(Some(resp)) => Ok(resp),
        Ok(None) => Err(Error::Unrecognised(bytes_to_human_str(line))),
        Err(Malformed) => Err(Error::Malformed(bytes_to_human_str(line))),
    }
}

/// Dispatches on the leading token. Returns None for unknown tokens.
fn parse_status(
    ps: &mut ParseState,
) -> Result<Option<BeanstalkResponse>, Malformed> {
    use BeanstalkResponse::*;

    let token = match ps.next_token() {
        Some(token) => token,
        None => return Ok(None),
    };

    let resp = match token {
        // <status>
        b"DELETED" => Deleted,
        b"RELEASED" => Released,
        b"TOUCHED" => Touched,
        b"NOT_IGNORED" => NotIgnored,
        b"PAUSED" => Paused,

        // <status> [<scalar>]
        b"BURIED" if ps.from.is_empty() => Buried,
        b"BURIED" => BuriedId {
            id: ps.expect_next_u64()?,
        },
        b"KICKED" if ps.from.is_empty() => Kicked,
        b"KICKED" => KickedCount {
            count: ps.expect_next_u64()?,
        },

        // <status> <scalar>
        b"INSERTED" => Inserted {
            id: ps.expect_next_u64()?,
        },
        b"WATCHING" => Watching {
            count: ps.expect_next_u32()?,
        },
        b"USING" => Using {
            tube: ps.expect_next_name()?,
        },
        b"OK" => OkBytes {
            n_bytes: ps.expect_next_u64()?,
        },

        // <status> <id> <n_bytes>
        b"RESERVED" => Reserved {
            id: ps.expect_next_u64()?,
            n_bytes: ps.expect_next_u64()?,
        },
        b"FOUND" => Found {
            id: ps.expect_next_u64()?,
            n_bytes: ps.expect_next_u64()?,
        },

        other => match ServerError::from_status(other) {
            Some(err) => Failure(err),
            None => return Ok(None),
        },
    };

    ps.expect_done_and(Some(resp))
}
