// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Expansion of the compact list syntaxes used throughout the configuration file.
//!
//! Index lists look like `0-3,7,10-20/2`. Node specs look like `oss[1-4]` and expand into one
//! host name per index, so `oss[1-4] mds1` is shorthand for `oss1 oss2 oss3 oss4 mds1`.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed token '{token}': {reason}")]
pub struct ParseError {
    pub token: String,
    pub reason: String,
}

impl ParseError {
    fn new(token: &str, reason: &str) -> Self {
        ParseError {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn parse_index(token: &str, part: &str) -> Result<u32, ParseError> {
    part.trim()
        .parse::<u32>()
        .map_err(|e| ParseError::new(token, &format!("'{}' is not an index: {e}", part.trim())))
}

/// Parse human-readable index lists such as `0-1,3,5-6` or `0-32/2` into a set of indices.
///
/// Every spec is a comma separated list of `N`, `N-M` (inclusive) or `N-M/S` (every `S`th
/// index from `N` up to `M`). The result is the union over all specs.
pub fn parse_index_list<S: AsRef<str>>(specs: &[S]) -> Result<BTreeSet<u32>, ParseError> {
    let mut indexes = BTreeSet::new();

    for spec in specs {
        for token in spec.as_ref().split(',') {
            let parts: Vec<&str> = token.split('-').collect();
            match parts.as_slice() {
                [single] => {
                    indexes.insert(parse_index(token, single)?);
                }
                [start, rest] => {
                    let (end, step) = match rest.split('/').collect::<Vec<_>>().as_slice() {
                        [end] => (*end, 1),
                        [end, step] => (*end, parse_index(token, step)?),
                        _ => return Err(ParseError::new(token, "more than one '/' in range")),
                    };
                    if step == 0 {
                        return Err(ParseError::new(token, "range step must be positive"));
                    }
                    let start = parse_index(token, start)?;
                    let end = parse_index(token, end)?;
                    indexes.extend((start..=end).step_by(step as usize));
                }
                _ => return Err(ParseError::new(token, "more than one '-' in range")),
            }
        }
    }

    Ok(indexes)
}

/// Expand node specs into an ordered list of names.
///
/// A spec that does not end in `]` is taken literally. `prefix[indices]` produces
/// `prefix<index>` for every index of the bracketed index list, in ascending order. Empty
/// brackets produce nothing.
pub fn parse_node_spec<S: AsRef<str>>(specs: &[S]) -> Result<Vec<String>, ParseError> {
    let mut nodes = Vec::new();

    for spec in specs {
        let spec = spec.as_ref();
        let Some(body) = spec.strip_suffix(']') else {
            nodes.push(spec.to_string());
            continue;
        };
        let mut split = body.split('[');
        let (Some(prefix), Some(indices), None) = (split.next(), split.next(), split.next()) else {
            return Err(ParseError::new(spec, "expected exactly one '[' before the closing ']'"));
        };
        if indices.trim().is_empty() {
            continue;
        }
        for index in parse_index_list(&[indices])? {
            nodes.push(format!("{prefix}{index}"));
        }
    }

    Ok(nodes)
}

/// Split `value` on `separator`, trimming every element and dropping empty ones.
pub fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Split `value` in front of every match of `delimiter`.
///
/// The first capture group of `delimiter` marks the text that is dropped; whatever else the
/// pattern matches is kept at the start of the following element. This gives the effect of a
/// look-ahead: `(,)\s*for\b` splits on the commas that introduce a new `for` clause only.
pub fn split_list_regex(value: &str, delimiter: &Regex) -> Vec<String> {
    let mut elements = Vec::new();
    let mut start = 0;

    for captures in delimiter.captures_iter(value) {
        let Some(dropped) = captures.get(1).or_else(|| captures.get(0)) else {
            continue;
        };
        elements.push(&value[start..dropped.start()]);
        start = dropped.end();
    }
    elements.push(&value[start..]);

    elements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

lazy_static! {
    static ref SIZE: Regex = Regex::new(r"^(?P<value>\d+)\s*(?P<order>[bBkKmMgGtTpPeE])?").unwrap();
}

/// Normalize sizes with binary suffixes like `10K` (kibi) or `128g` (gibi) to a byte count.
pub fn cast_to_bytes(value: &str) -> Result<u64, ParseError> {
    let captures = SIZE
        .captures(value.trim())
        .ok_or_else(|| ParseError::new(value, "cannot be cast to bytes"))?;

    let shift = match captures
        .name("order")
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("b") => 0,
        Some("k") => 10,
        Some("m") => 20,
        Some("g") => 30,
        Some("t") => 40,
        Some("p") => 50,
        Some(_) => 60,
    };

    let number = captures["value"]
        .parse::<u64>()
        .map_err(|e| ParseError::new(value, &e.to_string()))?;
    number
        .checked_mul(1u64 << shift)
        .ok_or_else(|| ParseError::new(value, "size does not fit in 64 bits"))
}
