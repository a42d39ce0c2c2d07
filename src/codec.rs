//! Tag codec: the boundary between on-disk tag headers and the index.
//!
//! The index treats encoded tags as opaque strings. It only compares them for
//! equality and prefixes, so everything about the text format lives here.

use crate::error::CodecError;
use crate::types::TagMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Encode and decode tag sets.
pub trait TagCodec: Send + Sync {
    /// Decode a stored tag blob.
    fn decode(&self, blob: &str) -> Result<TagMap, CodecError>;

    /// Encode a tag set into the blob stored on the node.
    fn encode(&self, tags: &TagMap) -> String;

    /// Encode one (key, value) pair into the string stored in the inverted index.
    fn encode_single(&self, key: &str, value: Option<&str>) -> String;

    /// Read the tags carried by a file on disk. Files without a tag header
    /// yield an empty map.
    fn read_file(&self, path: &Path) -> Result<TagMap, CodecError>;
}

const MAGIC: &[u8] = b"polytaxis00";
const UNSIZED: &str = "u";
const TERMINATOR: &str = "<<<<";

/// Codec for polytaxis headers.
///
/// A tagged file starts with `polytaxis00<size>\n`. With size `u` the tag
/// lines run until a `<<<<` line; otherwise `size` bytes of tag text follow,
/// padded with whitespace or NULs. Each line is `key` or `key=value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolytaxisCodec;

fn escape_into(out: &mut String, text: &str, escape_equals: bool) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '=' if escape_equals => out.push_str("\\="),
            other => out.push(other),
        }
    }
}

fn parse_line(line: &str, number: usize) -> Result<(String, Option<String>), CodecError> {
    let mut key = String::new();
    let mut value: Option<String> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '=' && value.is_none() {
            value = Some(String::new());
            continue;
        }
        let target = match value.as_mut() {
            Some(value) => value,
            None => &mut key,
        };
        match c {
            '\\' => match chars.next() {
                Some('\\') => target.push('\\'),
                Some('n') => target.push('\n'),
                Some('=') => target.push('='),
                Some(other) => {
                    return Err(CodecError::Malformed {
                        line: number,
                        reason: format!("unknown escape \\{}", other),
                    })
                }
                None => {
                    return Err(CodecError::Malformed {
                        line: number,
                        reason: "dangling escape".to_string(),
                    })
                }
            },
            other => target.push(other),
        }
    }
    if key.is_empty() {
        return Err(CodecError::Malformed {
            line: number,
            reason: "empty tag key".to_string(),
        });
    }
    Ok((key, value))
}

impl TagCodec for PolytaxisCodec {
    fn decode(&self, blob: &str) -> Result<TagMap, CodecError> {
        let mut tags = TagMap::new();
        for (index, line) in blob.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = parse_line(line, index + 1)?;
            tags.entry(key).or_default().insert(value);
        }
        Ok(tags)
    }

    fn encode(&self, tags: &TagMap) -> String {
        let mut out = String::new();
        for (key, values) in tags {
            for value in values {
                out.push_str(&self.encode_single(key, value.as_deref()));
                out.push('\n');
            }
        }
        out
    }

    fn encode_single(&self, key: &str, value: Option<&str>) -> String {
        let mut out = String::with_capacity(key.len() + value.map_or(0, |v| v.len() + 1));
        escape_into(&mut out, key, true);
        if let Some(value) = value {
            out.push('=');
            escape_into(&mut out, value, false);
        }
        out
    }

    fn read_file(&self, path: &Path) -> Result<TagMap, CodecError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = Vec::with_capacity(MAGIC.len());
        (&mut reader)
            .take(MAGIC.len() as u64)
            .read_to_end(&mut magic)?;
        if magic != MAGIC {
            return Ok(TagMap::new());
        }

        let mut size = String::new();
        reader.read_line(&mut size)?;
        let size = size.trim_end_matches(['\r', '\n']);

        let text = if size == UNSIZED {
            let mut text = String::new();
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(CodecError::Malformed {
                        line: 0,
                        reason: "missing header terminator".to_string(),
                    });
                }
                if line.trim_end_matches(['\r', '\n']) == TERMINATOR {
                    break text;
                }
                text.push_str(&line);
            }
        } else {
            let size: u64 = size.parse().map_err(|_| CodecError::Malformed {
                line: 0,
                reason: format!("invalid header size {:?}", size),
            })?;
            let mut raw = Vec::new();
            (&mut reader).take(size).read_to_end(&mut raw)?;
            let text = String::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
            text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        };

        self.decode(&text)
    }
}
