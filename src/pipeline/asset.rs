// src/pipeline/asset.rs

use std::path::PathBuf;

/// One file flowing through a pipeline: destination-relative path plus
/// contents. Stages consume and produce `Vec<Asset>`, which is what makes
/// them chain uniformly regardless of what they do to the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(rel_path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            rel_path: rel_path.into(),
            contents: contents.into(),
        }
    }

    /// Contents as UTF-8 text, for textual stages.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}
