//! The text-framed UDP wire protocol (§5): tokenizing a request datagram,
//! running it against a [`FileSystem`], and formatting the reply.
//!
//! Tokens are split on runs of ASCII whitespace, operating on raw bytes
//! rather than `&str` throughout — a `write` payload is not necessarily
//! valid UTF-8, and the protocol never requires it to be. The final
//! argument of a multi-argument command consumes everything left in the
//! datagram verbatim, including embedded whitespace.

use log::{debug, warn};

use crate::fs::FileSystem;

/// A parsed request, still borrowing from the original datagram.
#[derive(Debug)]
pub enum Request<'a> {
    /// `lookup pinum name`
    Lookup { pinum: i32, name: &'a [u8] },
    /// `stat inum`
    Stat { inum: i32 },
    /// `write inum block data`
    Write { inum: i32, block: i32, data: &'a [u8] },
    /// `read inum block`
    Read { inum: i32, block: i32 },
    /// `creat pinum file_type name`
    Creat { pinum: i32, file_type: i32, name: &'a [u8] },
    /// `unlink pinum name`
    Unlink { pinum: i32, name: &'a [u8] },
}

/// Split off the leading run of non-whitespace bytes as a token, and
/// return it along with everything after the whitespace run that follows
/// it. Leading whitespace in `buf` is treated as producing an empty
/// leading token, matching a naive whitespace split rather than trimming.
fn split_token(buf: &[u8]) -> (&[u8], &[u8]) {
    let token_end = buf.iter().position(|b| b.is_ascii_whitespace()).unwrap_or(buf.len());
    let (token, rest) = buf.split_at(token_end);
    let rest = &rest[rest.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(rest.len())..];
    (token, rest)
}

fn parse_i32(token: &[u8]) -> Option<i32> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Parse a raw datagram payload into a [`Request`]. Returns `None` for
/// anything that doesn't match one of the six known command shapes —
/// an unknown verb, a missing numeric argument, or a non-numeric token
/// where an integer is required.
pub fn parse_request(datagram: &[u8]) -> Option<Request<'_>> {
    let (cmd, rest) = split_token(datagram);
    match cmd {
        b"lookup" => {
            let (pinum_tok, name) = split_token(rest);
            Some(Request::Lookup { pinum: parse_i32(pinum_tok)?, name })
        }
        b"stat" => {
            let (inum_tok, _) = split_token(rest);
            Some(Request::Stat { inum: parse_i32(inum_tok)? })
        }
        b"write" => {
            let (inum_tok, rest) = split_token(rest);
            let (block_tok, data) = split_token(rest);
            Some(Request::Write {
                inum: parse_i32(inum_tok)?,
                block: parse_i32(block_tok)?,
                data,
            })
        }
        b"read" => {
            let (inum_tok, rest) = split_token(rest);
            let (block_tok, _) = split_token(rest);
            Some(Request::Read {
                inum: parse_i32(inum_tok)?,
                block: parse_i32(block_tok)?,
            })
        }
        b"creat" => {
            let (pinum_tok, rest) = split_token(rest);
            let (type_tok, name) = split_token(rest);
            Some(Request::Creat {
                pinum: parse_i32(pinum_tok)?,
                file_type: parse_i32(type_tok)?,
                name,
            })
        }
        b"unlink" => {
            let (pinum_tok, name) = split_token(rest);
            Some(Request::Unlink { pinum: parse_i32(pinum_tok)?, name })
        }
        _ => None,
    }
}

/// Run `req` against `fs` and format the reply datagram. A storage fault
/// (an `Err` from the underlying image) is logged and folded into the
/// same `-1` reply a semantic refusal would produce — the wire protocol
/// has no way to distinguish the two (§7).
pub fn dispatch(fs: &mut FileSystem, req: Request<'_>) -> Vec<u8> {
    match req {
        Request::Lookup { pinum, name } => {
            debug!("lookup pinum={} name={:?}", pinum, String::from_utf8_lossy(name));
            match fs.lookup(pinum, name) {
                Ok(inum) => format!("{}", inum).into_bytes(),
                Err(e) => {
                    warn!("lookup storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
        Request::Stat { inum } => {
            debug!("stat inum={}", inum);
            match fs.stat(inum) {
                Ok(Some(st)) => format!("0 {} {} {}", st.file_type, st.size, st.num_blocks).into_bytes(),
                Ok(None) => b"-1".to_vec(),
                Err(e) => {
                    warn!("stat storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
        Request::Write { inum, block, data } => {
            debug!("write inum={} block={} len={}", inum, block, data.len());
            match fs.write(inum, block, data) {
                Ok(true) => b"0".to_vec(),
                Ok(false) => b"-1".to_vec(),
                Err(e) => {
                    warn!("write storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
        Request::Read { inum, block } => {
            debug!("read inum={} block={}", inum, block);
            match fs.read(inum, block) {
                Ok(Some(bytes)) => {
                    let mut reply = Vec::with_capacity(2 + bytes.len());
                    reply.extend_from_slice(b"0 ");
                    reply.extend_from_slice(&bytes);
                    reply
                }
                Ok(None) => b"-1".to_vec(),
                Err(e) => {
                    warn!("read storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
        Request::Creat { pinum, file_type, name } => {
            debug!(
                "creat pinum={} type={} name={:?}",
                pinum,
                file_type,
                String::from_utf8_lossy(name)
            );
            match fs.creat(pinum, file_type, name) {
                Ok(true) => b"0".to_vec(),
                Ok(false) => b"-1".to_vec(),
                Err(e) => {
                    warn!("creat storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
        Request::Unlink { pinum, name } => {
            debug!("unlink pinum={} name={:?}", pinum, String::from_utf8_lossy(name));
            match fs.unlink(pinum, name) {
                Ok(true) => b"0".to_vec(),
                Ok(false) => b"-1".to_vec(),
                Err(e) => {
                    warn!("unlink storage error: {}", e);
                    b"-1".to_vec()
                }
            }
        }
    }
}

/// Parse and dispatch a raw datagram in one step. A datagram that fails
/// to parse gets a bare `-1` reply and is logged at `warn` level, same as
/// a semantic refusal from the file system.
pub fn handle_datagram(fs: &mut FileSystem, datagram: &[u8]) -> Vec<u8> {
    match parse_request(datagram) {
        Some(req) => dispatch(fs, req),
        None => {
            warn!("malformed datagram ({} bytes)", datagram.len());
            b"-1".to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_token_splits_on_whitespace_runs() {
        let (a, rest) = split_token(b"lookup   0 hello");
        assert_eq!(a, b"lookup");
        let (b, rest) = split_token(rest);
        assert_eq!(b, b"0");
        assert_eq!(rest, b"hello");
    }

    #[test]
    fn final_argument_keeps_embedded_whitespace() {
        let (cmd, rest) = split_token(b"creat 0 1 a name with spaces");
        assert_eq!(cmd, b"creat");
        let (pinum, rest) = split_token(rest);
        assert_eq!(pinum, b"0");
        let (ty, name) = split_token(rest);
        assert_eq!(ty, b"1");
        assert_eq!(name, b"a name with spaces");
    }

    #[test]
    fn unknown_verb_fails_to_parse() {
        assert!(parse_request(b"frobnicate 0 x").is_none());
    }

    #[test]
    fn non_numeric_argument_fails_to_parse() {
        assert!(parse_request(b"stat abc").is_none());
    }
}
