//! Value encoding and chunking.
//!
//! A logical cookie `name` is written either as one physical cookie `name`, or, when the
//! encoded value exceeds the chunk limit, as `name.0 … name.<n-1>`. The value of `name.0`
//! starts with `"<n>:"` so a reader knows how many chunks to collect. Encoded values never
//! contain `:`, which keeps the marker unambiguous.

use crate::cookie::{CookieEntry, CookieOptions};

/// Maximum encoded value size per physical cookie, leaving room for the name and
/// attributes under the ~4096 byte per-cookie browser limit.
pub const MAX_CHUNK_SIZE: usize = 3180;

const MIN_CHUNK_SIZE: usize = 16;

/// Serialize `value` under `name` using [`MAX_CHUNK_SIZE`].
pub fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> Vec<CookieEntry> {
    serialize_cookie_with_limit(name, value, options, MAX_CHUNK_SIZE)
}

/// Serialize `value` under `name`, splitting into chunks of at most `limit` encoded bytes.
///
/// An empty value yields a single removal entry.
pub fn serialize_cookie_with_limit(
    name: &str,
    value: &str,
    options: &CookieOptions,
    limit: usize,
) -> Vec<CookieEntry> {
    let limit = limit.max(MIN_CHUNK_SIZE);
    let encoded = urlencoding::encode(value).into_owned();

    if encoded.len() <= limit {
        return vec![CookieEntry {
            name: name.to_string(),
            value: encoded,
            options: options.clone(),
        }];
    }

    let total = chunk_count(encoded.len(), limit);
    let marker = format!("{total}:");

    let mut entries = Vec::with_capacity(total);
    // Encoded text is ASCII, so byte offsets are always char boundaries.
    let mut rest = encoded.as_str();
    for index in 0..total {
        let room = if index == 0 { limit - marker.len() } else { limit };
        let (head, tail) = rest.split_at(room.min(rest.len()));
        let value = if index == 0 {
            format!("{marker}{head}")
        } else {
            head.to_string()
        };
        entries.push(CookieEntry {
            name: chunk_name(name, index),
            value,
            options: options.clone(),
        });
        rest = tail;
    }

    entries
}

/// Number of chunks needed once the `"<n>:"` marker is accounted for in chunk 0.
fn chunk_count(encoded_len: usize, limit: usize) -> usize {
    let mut total = encoded_len.div_ceil(limit);
    loop {
        let marker_len = total.to_string().len() + 1;
        let needed = (encoded_len + marker_len).div_ceil(limit);
        if needed == total {
            return total;
        }
        total = needed;
    }
}

/// Physical name of chunk `index` of `name`.
pub fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}.{index}")
}

/// True if `candidate` is `name` itself or one of its chunks (`name.<digits>`).
pub fn is_logical_match(candidate: &str, name: &str) -> bool {
    if candidate == name {
        return true;
    }
    candidate
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
}

/// Reassemble and decode the logical cookie `name`, reading physical cookies via `lookup`.
///
/// Returns `None` if the cookie is absent, a chunk is missing, or the value fails to decode.
pub fn join_chunks<F>(name: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        return decode(name, &raw);
    }

    let first = lookup(&chunk_name(name, 0))?;
    let Some((total, head)) = first
        .split_once(':')
        .and_then(|(n, head)| n.parse::<usize>().ok().map(|n| (n, head)))
    else {
        tracing::debug!(cookie = name, "chunk 0 is missing its count marker");
        return None;
    };

    let mut joined = head.to_string();
    for index in 1..total {
        let Some(part) = lookup(&chunk_name(name, index)) else {
            tracing::debug!(cookie = name, index, total, "incomplete chunked cookie");
            return None;
        };
        joined.push_str(&part);
    }

    decode(name, &joined)
}

fn decode(name: &str, raw: &str) -> Option<String> {
    match urlencoding::decode(raw) {
        Ok(v) => Some(v.into_owned()),
        Err(e) => {
            tracing::debug!(cookie = name, error = %e, "cookie value is not valid percent-encoded UTF-8");
            None
        }
    }
}
