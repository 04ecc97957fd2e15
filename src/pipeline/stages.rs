// src/pipeline/stages.rs

//! Built-in stages.
//!
//! Real transform libraries (style compilers, bundlers, prefixers) are
//! external collaborators plugged in through [`FnStage`]; the stages here
//! are the ones the orchestrator itself ships:
//!
//! - `replace`: substitutes the configured marker token with the value
//!   resolved from the environment (sentinel `"0"` when unset).
//! - `minify`: whitespace-collapsing stand-in for a real minifier, gated
//!   on the `--min` flag.
//! - `concat=<file>`: joins the file set into a single artifact.
//!
//! [`FnStage`]: crate::pipeline::FnStage

use std::path::PathBuf;

use crate::context::BuildContext;
use crate::pipeline::asset::Asset;
use crate::pipeline::stage::Stage;

/// Resolve a stage name from configuration into a stage instance.
pub fn from_name(name: &str) -> Option<Box<dyn Stage>> {
    match name {
        "replace" => Some(Box::new(ReplaceStage)),
        "minify" => Some(Box::new(MinifyStage)),
        other => other
            .strip_prefix("concat=")
            .filter(|file| !file.is_empty())
            .map(|file| Box::new(ConcatStage::new(file)) as Box<dyn Stage>),
    }
}

/// Substitutes the marker token in textual output with the context's
/// replace value.
///
/// Each occurrence is a single exact literal match; the scan is one pass
/// left to right and never rescans its own output, so a replacement value
/// containing the token does not recurse.
pub struct ReplaceStage;

impl Stage for ReplaceStage {
    fn name(&self) -> &str {
        "replace"
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &BuildContext) -> anyhow::Result<Vec<Asset>> {
        if ctx.replace_token.is_empty() {
            return Ok(assets);
        }
        Ok(assets
            .into_iter()
            .map(|asset| Asset {
                contents: replace_literal(
                    &asset.contents,
                    ctx.replace_token.as_bytes(),
                    ctx.replace_value.as_bytes(),
                ),
                ..asset
            })
            .collect())
    }
}

/// Single-pass literal substitution over bytes.
fn replace_literal(input: &[u8], token: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i..].starts_with(token) {
            out.extend_from_slice(value);
            i += token.len();
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

/// Whitespace-collapsing minifier stand-in, gated on the `--min` flag.
pub struct MinifyStage;

impl Stage for MinifyStage {
    fn name(&self) -> &str {
        "minify"
    }

    fn enabled(&self, ctx: &BuildContext) -> bool {
        ctx.minify
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &BuildContext) -> anyhow::Result<Vec<Asset>> {
        Ok(assets
            .into_iter()
            .map(|asset| Asset {
                contents: squeeze_whitespace(&asset.contents),
                ..asset
            })
            .collect())
    }
}

/// Collapse runs of ASCII whitespace into a single space and trim.
fn squeeze_whitespace(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut in_ws = true; // leading whitespace is dropped
    for &b in input {
        if b.is_ascii_whitespace() {
            if !in_ws {
                out.push(b' ');
                in_ws = true;
            }
        } else {
            out.push(b);
            in_ws = false;
        }
    }
    while out.last() == Some(&b' ') {
        out.pop();
    }
    out
}

/// Joins every asset in the set into one artifact, in set order.
pub struct ConcatStage {
    out_name: PathBuf,
}

impl ConcatStage {
    pub fn new(out_name: impl Into<PathBuf>) -> Self {
        Self {
            out_name: out_name.into(),
        }
    }
}

impl Stage for ConcatStage {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &BuildContext) -> anyhow::Result<Vec<Asset>> {
        let mut contents = Vec::new();
        for asset in &assets {
            contents.extend_from_slice(&asset.contents);
            if !asset.contents.ends_with(b"\n") {
                contents.push(b'\n');
            }
        }
        Ok(vec![Asset::new(self.out_name.clone(), contents)])
    }
}
