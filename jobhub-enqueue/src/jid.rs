//! Job identifiers.

use thiserror::Error;

/// Number of random bytes behind a job identifier.
pub const JID_BYTES: usize = 12;

/// Length of the hex-encoded identifier.
pub const JID_LEN: usize = JID_BYTES * 2;

/// The operating system could not supply random bytes.
#[derive(Debug, Error)]
#[error("random source unavailable: {0}")]
pub struct JidError(getrandom::Error);

/// Generate a 24 character lowercase hex identifier from 12 bytes of OS randomness.
pub fn generate_jid() -> Result<String, JidError> {
    let mut buf = [0u8; JID_BYTES];
    getrandom::fill(&mut buf).map_err(JidError)?;
    Ok(hex::encode(buf))
}

/// Whether `jid` has the shape produced by [`generate_jid`].
pub fn is_generated_jid(jid: &str) -> bool {
    jid.len() == JID_LEN && jid.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
