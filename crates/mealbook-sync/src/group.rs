//! Group codes and invite URLs
//!
//! Pure helpers for the human-shareable side of groups: code generation,
//! invite-URL build/parse, and join-input normalization. Remote group
//! creation and join semantics live on the coordinator.

use rand::Rng;
use tracing::warn;
use url::Url;

/// Query parameter carrying the group code in invite URLs
pub const INVITE_PARAM: &str = "invite";

/// Code alphabet: lowercase, no ambiguous characters (0/o, 1/l/i)
const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const CODE_LEN: usize = 8;

/// Generate a new random, human-typable group code, e.g. `group-k3vm8xqa`
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("group-{suffix}")
}

/// Build a shareable invite URL embedding the group code.
/// Returns the empty string when no code is set or the base does not parse.
pub fn derive_invite_url(base: &str, code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    match Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(INVITE_PARAM, code);
            url.to_string()
        }
        Err(e) => {
            warn!("Invalid invite base URL {base}: {e}");
            String::new()
        }
    }
}

/// Extract an invite code from a location URL.
///
/// Returns the code and the same URL with the invite parameter stripped,
/// so the host can replace the visible location and a reload does not
/// re-trigger the join.
pub fn consume_invite(location: &str) -> Option<(String, String)> {
    let url = Url::parse(location).ok()?;
    let code = url
        .query_pairs()
        .find(|(k, _)| k == INVITE_PARAM)
        .map(|(_, v)| v.into_owned())?;
    if code.trim().is_empty() {
        return None;
    }

    let mut stripped = url.clone();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != INVITE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    stripped.set_query(None);
    if !remaining.is_empty() {
        let mut pairs = stripped.query_pairs_mut();
        for (k, v) in &remaining {
            pairs.append_pair(k, v);
        }
    }

    Some((code.trim().to_string(), stripped.to_string()))
}

/// Normalize join input: accepts a bare code or a full invite URL,
/// trims whitespace, rejects blank input
pub fn normalize_join_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        return consume_invite(trimmed).map(|(code, _)| code);
    }
    Some(trimmed.to_string())
}
