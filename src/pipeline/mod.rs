// src/pipeline/mod.rs

//! Pipeline stage composition.
//!
//! A [`Pipeline`] maps one source glob through an ordered chain of
//! [`Stage`]s into a destination directory. The orchestrator knows nothing
//! about what a stage does to the bytes; any conforming [`Stage`]
//! implementation chains uniformly.

pub mod asset;
pub mod stage;
pub mod stages;

pub use asset::Asset;
pub use stage::{FnStage, Stage};
pub use stages::{ConcatStage, MinifyStage, ReplaceStage};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::errors::StageError;

/// An ordered, conditionally-gated chain of transform stages from a source
/// glob to a destination directory.
///
/// Stage order is fixed at construction and never reordered. Each
/// [`apply`](Self::apply) enumerates the source set fresh, so a pipeline is
/// reusable across incremental rebuilds.
pub struct Pipeline {
    name: String,
    root: PathBuf,
    source_glob: String,
    source_set: GlobSet,
    stages: Vec<Box<dyn Stage>>,
    dest_dir: PathBuf,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("source_glob", &self.source_glob)
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("dest_dir", &self.dest_dir)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Compose a pipeline. The source glob is compiled here; an invalid
    /// pattern is a construction error, not a run error.
    pub fn compose(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        source_glob: impl Into<String>,
        stages: Vec<Box<dyn Stage>>,
        dest_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let source_glob = source_glob.into();

        let mut builder = GlobSetBuilder::new();
        builder.add(
            Glob::new(&source_glob)
                .with_context(|| format!("invalid source glob for pipeline '{name}'"))?,
        );
        let source_set = builder.build()?;

        Ok(Self {
            name,
            root: root.into(),
            source_glob,
            source_set,
            stages,
            dest_dir: dest_dir.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the pipeline once: enumerate sources, thread them through each
    /// enabled stage in declared order, write the results under `dest_dir`.
    ///
    /// Each stage's gating predicate is evaluated exactly once per call, so
    /// all files of one run are treated consistently.
    pub fn apply(&self, ctx: &BuildContext) -> Result<(), StageError> {
        let assets = self
            .load_sources()
            .map_err(|e| StageError::new(&self.name, "source", e))?;
        info!(
            pipeline = %self.name,
            files = assets.len(),
            "pipeline run started"
        );

        let mut assets = assets;
        for stage in &self.stages {
            if !stage.enabled(ctx) {
                debug!(pipeline = %self.name, stage = %stage.name(), "stage gated off");
                continue;
            }
            assets = stage
                .apply(assets, ctx)
                .map_err(|e| StageError::new(&self.name, stage.name(), e))?;
            debug!(pipeline = %self.name, stage = %stage.name(), "stage applied");
        }

        self.write_dest(&assets)
            .map_err(|e| StageError::new(&self.name, "dest", e))?;
        info!(pipeline = %self.name, files = assets.len(), "pipeline run finished");
        Ok(())
    }

    /// Enumerate and read the files matching the source glob, relative to
    /// the pipeline root. Sorted for deterministic stage input.
    fn load_sources(&self) -> anyhow::Result<Vec<Asset>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        collect_matching(&self.root, &self.root, &self.source_set, &mut paths)?;
        paths.sort();

        if paths.is_empty() {
            warn!(
                pipeline = %self.name,
                glob = %self.source_glob,
                "no files match source glob; pipeline run is a no-op"
            );
        }

        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            let abs = self.root.join(&path);
            let contents =
                fs::read(&abs).with_context(|| format!("reading source file {abs:?}"))?;
            let rel_path = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| path.clone());
            assets.push(Asset { rel_path, contents });
        }
        Ok(assets)
    }

    fn write_dest(&self, assets: &[Asset]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dest_dir)
            .with_context(|| format!("creating destination directory {:?}", self.dest_dir))?;
        for asset in assets {
            let out = self.dest_dir.join(&asset.rel_path);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {parent:?}"))?;
            }
            fs::write(&out, &asset.contents)
                .with_context(|| format!("writing artifact {out:?}"))?;
        }
        Ok(())
    }
}

/// Walk `dir` recursively, collecting paths (relative to `root`, forward
/// slashes) that match `set`.
fn collect_matching(
    root: &Path,
    dir: &Path,
    set: &GlobSet,
    out: &mut Vec<PathBuf>,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {dir:?}"))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_matching(root, &path, set, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if set.is_match(&rel_str) {
                out.push(rel.to_path_buf());
            }
        }
    }
    Ok(())
}
