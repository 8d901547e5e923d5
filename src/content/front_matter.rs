//! Leading `---` fenced YAML metadata.
//!
//! ```text
//! ---
//! title: Morning ride
//! date: 2024-05-01
//! time: 07:30
//! tags: [gravel, Early Starts]
//! ---
//! body ...
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;

const FENCE: &str = "---";

/// Metadata recognized in front matter. Unknown keys are ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrontMatter {
    title: Option<Value>,
    date: Option<Value>,
    time: Option<Value>,
    tags: Option<Value>,
}

/// Split `source` into its front-matter block (without fences) and body.
///
/// Only a block opening on the first line counts; later `---` lines are
/// horizontal rules and stay in the body.
pub fn split(source: &str) -> (Option<&str>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = strip_fence_line(source) else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(block), body);
        }
        offset += line.len();
    }

    (None, source)
}

fn strip_fence_line(source: &str) -> Option<&str> {
    let (first, rest) = source.split_once('\n')?;
    (first.trim_end() == FENCE).then_some(rest)
}

/// Parse the front matter of `source`, returning it with the remaining body.
pub fn parse(source: &str) -> Result<(FrontMatter, &str)> {
    let (block, body) = split(source);
    let Some(block) = block else {
        return Ok((FrontMatter::default(), body));
    };

    let block = block.replace('\t', "  ");
    if block.trim().is_empty() {
        return Ok((FrontMatter::default(), body));
    }

    let raw: RawFrontMatter =
        serde_yaml::from_str(&block).context("invalid front matter")?;

    let tags = match raw.tags {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar).collect(),
        Some(other) => scalar(&other)
            .map(|s| s.split(',').map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    };

    Ok((
        FrontMatter {
            title: raw.title.as_ref().and_then(scalar),
            date: raw.date.as_ref().and_then(scalar),
            time: raw.time.as_ref().and_then(scalar),
            tags,
        },
        body,
    ))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
