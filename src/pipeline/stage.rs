// src/pipeline/stage.rs

use crate::context::BuildContext;
use crate::pipeline::asset::Asset;

/// A single transform within a pipeline.
///
/// Stages are opaque to the orchestrator: style compilation, bundling,
/// prefixing and minification all look the same from here. A stage consumes
/// the file set and produces a new one, which is what lets arbitrary
/// transforms chain in declared order.
///
/// `enabled` is the gating predicate. [`Pipeline::apply`] evaluates it
/// exactly once per run, never per file, so one run either sends every file
/// through the stage or none of them.
///
/// [`Pipeline::apply`]: crate::pipeline::Pipeline::apply
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn enabled(&self, ctx: &BuildContext) -> bool {
        let _ = ctx;
        true
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &BuildContext) -> anyhow::Result<Vec<Asset>>;
}

type GateFn = Box<dyn Fn(&BuildContext) -> bool + Send + Sync>;
type ApplyFn = Box<dyn Fn(Vec<Asset>, &BuildContext) -> anyhow::Result<Vec<Asset>> + Send + Sync>;

/// Adapter turning a closure into a [`Stage`], optionally with a gate.
///
/// This is how external transform libraries plug in without the
/// orchestrator depending on their internals.
pub struct FnStage {
    name: String,
    gate: Option<GateFn>,
    apply: ApplyFn,
}

impl FnStage {
    pub fn new(
        name: impl Into<String>,
        apply: impl Fn(Vec<Asset>, &BuildContext) -> anyhow::Result<Vec<Asset>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            gate: None,
            apply: Box::new(apply),
        }
    }

    /// Gate this stage on a predicate over the build context, evaluated
    /// once per pipeline run.
    pub fn only_if(
        mut self,
        gate: impl Fn(&BuildContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }
}

impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self, ctx: &BuildContext) -> bool {
        self.gate.as_ref().map(|g| g(ctx)).unwrap_or(true)
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &BuildContext) -> anyhow::Result<Vec<Asset>> {
        (self.apply)(assets, ctx)
    }
}
