// src/config/validate.rs

use anyhow::{Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::pipeline::stages;

/// Run semantic validation against a loaded configuration.
///
/// Checks, all fatal before anything runs:
/// - there is at least one pipeline
/// - debounce intervals (default and overrides) are strictly positive
/// - the replace token is non-empty
/// - every stage name resolves to a known stage
/// - all `after` references point at existing pipelines, none at itself
/// - the pipeline dependency graph has no cycles
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_pipelines(cfg)?;
    validate_global_config(cfg)?;
    validate_stages(cfg)?;
    validate_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_pipelines(cfg: &ConfigFile) -> Result<()> {
    if cfg.pipeline.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [pipeline.<name>] section"
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(anyhow!("[config].debounce_ms must be > 0 (got 0)"));
    }
    if cfg.config.replace_token.is_empty() {
        return Err(anyhow!("[config].replace_token must not be empty"));
    }
    for (name, pipeline) in cfg.pipeline.iter() {
        if pipeline.debounce_ms == Some(0) {
            return Err(anyhow!(
                "pipeline '{name}' has debounce_ms = 0; debounce intervals must be > 0"
            ));
        }
    }
    Ok(())
}

fn validate_stages(cfg: &ConfigFile) -> Result<()> {
    for (name, pipeline) in cfg.pipeline.iter() {
        for stage in pipeline.stages.iter() {
            if stages::from_name(stage).is_none() {
                return Err(anyhow!(
                    "pipeline '{name}' references unknown stage '{stage}'"
                ));
            }
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, pipeline) in cfg.pipeline.iter() {
        for dep in pipeline.after.iter() {
            if !cfg.pipeline.contains_key(dep) {
                return Err(anyhow!(
                    "pipeline '{name}' has unknown dependency '{dep}' in `after`"
                ));
            }
            if dep == name {
                return Err(anyhow!("pipeline '{name}' cannot depend on itself"));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: dep -> pipeline, so a toposort failure names a node
    // on a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.pipeline.keys() {
        graph.add_node(name.as_str());
    }
    for (name, pipeline) in cfg.pipeline.iter() {
        for dep in pipeline.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(anyhow!(
            "cycle detected in pipeline dependencies involving '{}'",
            cycle.node_id()
        )),
    }
}
