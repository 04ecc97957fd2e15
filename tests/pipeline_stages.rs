use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use assetpipe::context::BuildContext;
use assetpipe::mode::ErrorModeController;
use assetpipe::pipeline::{Asset, FnStage, MinifyStage, Pipeline, ReplaceStage, Stage};

fn ctx() -> BuildContext {
    BuildContext::new(Arc::new(ErrorModeController::new()))
}

#[test]
fn replace_substitutes_configured_value() {
    let ctx = ctx().with_replace("DEPLOY_KEY", Some("abc123"));
    let assets = vec![Asset::new("app.js", "build:DEPLOY_KEY")];

    let out = ReplaceStage.apply(assets, &ctx).unwrap();
    assert_eq!(out[0].text(), "build:abc123");
}

#[test]
fn replace_falls_back_to_sentinel_when_unset() {
    let ctx = ctx().with_replace("DEPLOY_KEY", None::<&str>);
    let assets = vec![Asset::new("app.js", "build:DEPLOY_KEY")];

    let out = ReplaceStage.apply(assets, &ctx).unwrap();
    assert_eq!(out[0].text(), "build:0");
}

#[test]
fn replace_treats_empty_env_value_as_unset() {
    // SAFETY: the key is unique to this test and read nowhere else.
    unsafe {
        std::env::set_var("ASSETPIPE_TEST_EMPTY_KEY", "");
    }
    let ctx = ctx().with_replace_from_env("DEPLOY_KEY", "ASSETPIPE_TEST_EMPTY_KEY");
    assert_eq!(ctx.replace_value, "0", "empty value falls back to the sentinel");

    let assets = vec![Asset::new("app.js", "build:DEPLOY_KEY")];
    let out = ReplaceStage.apply(assets, &ctx).unwrap();
    assert_eq!(out[0].text(), "build:0");
}

#[test]
fn replace_never_rescans_its_own_output() {
    // The replacement value contains the token; a rescanning implementation
    // would loop or double-substitute.
    let ctx = ctx().with_replace("KEY", Some("KEY+KEY"));
    let assets = vec![Asset::new("a.txt", "x KEY y KEY z")];

    let out = ReplaceStage.apply(assets, &ctx).unwrap();
    assert_eq!(out[0].text(), "x KEY+KEY y KEY+KEY z");
}

#[test]
fn minify_is_gated_on_the_flag() {
    assert!(!MinifyStage.enabled(&ctx().with_minify(false)));
    assert!(MinifyStage.enabled(&ctx().with_minify(true)));
}

#[test]
fn gating_predicate_is_evaluated_once_per_apply() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(&src)?;
    for name in ["a.css", "b.css", "c.css"] {
        fs::write(src.join(name), "body {}")?;
    }

    let gate_calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let gate_calls = Arc::clone(&gate_calls);
        FnStage::new("counted", |assets, _ctx| Ok(assets))
            .only_if(move |_ctx| {
                gate_calls.fetch_add(1, Ordering::SeqCst);
                true
            })
    };

    let pipeline = Pipeline::compose(
        "css",
        dir.path(),
        "src/*.css",
        vec![Box::new(counted)],
        dir.path().join("out"),
    )?;
    pipeline.apply(&ctx()).unwrap();

    assert_eq!(
        gate_calls.load(Ordering::SeqCst),
        1,
        "gate runs once per apply, not per file"
    );
    Ok(())
}

#[test]
fn pipeline_threads_stages_in_declared_order_and_writes_dest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(&src)?;
    fs::write(src.join("app.js"), "token")?;

    let first = FnStage::new("first", |assets: Vec<Asset>, _ctx| {
        Ok(assets
            .into_iter()
            .map(|a| Asset::new(a.rel_path, [a.contents, b"-first".to_vec()].concat()))
            .collect())
    });
    let second = FnStage::new("second", |assets: Vec<Asset>, _ctx| {
        Ok(assets
            .into_iter()
            .map(|a| Asset::new(a.rel_path, [a.contents, b"-second".to_vec()].concat()))
            .collect())
    });

    let pipeline = Pipeline::compose(
        "js",
        dir.path(),
        "src/*.js",
        vec![Box::new(first), Box::new(second)],
        dir.path().join("out"),
    )?;
    pipeline.apply(&ctx()).unwrap();

    let written = fs::read_to_string(dir.path().join("out/app.js"))?;
    assert_eq!(written, "token-first-second");
    Ok(())
}

#[test]
fn minify_gating_matches_applying_minify_to_unminified_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(&src)?;
    fs::write(src.join("app.css"), "body {\n  color: red;\n}\n")?;

    let compose = |dest: &str| {
        Pipeline::compose(
            "css",
            dir.path(),
            "src/*.css",
            vec![Box::new(ReplaceStage) as Box<dyn Stage>, Box::new(MinifyStage)],
            dir.path().join(dest),
        )
    };

    let plain_ctx = ctx().with_replace("DEPLOY_KEY", Some("v1"));
    compose("plain")?.apply(&plain_ctx).unwrap();
    let plain = fs::read(dir.path().join("plain/app.css"))?;

    let min_ctx = plain_ctx.clone().with_minify(true);
    compose("min")?.apply(&min_ctx).unwrap();
    let minified = fs::read(dir.path().join("min/app.css"))?;

    // Flag unset: the minify stage contributed nothing.
    assert_eq!(plain, b"body {\n  color: red;\n}\n");
    // Flag set: output equals minifying the un-minified result directly.
    let expected = MinifyStage
        .apply(vec![Asset::new("app.css", plain)], &min_ctx)
        .unwrap();
    assert_eq!(minified, expected[0].contents);
    Ok(())
}

#[test]
fn stage_error_names_pipeline_and_stage() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(&src)?;
    fs::write(src.join("a.css"), "x")?;

    let broken = FnStage::new("broken", |_assets, _ctx| Err(anyhow!("transform exploded")));
    let pipeline = Pipeline::compose(
        "css",
        dir.path(),
        "src/*.css",
        vec![Box::new(broken)],
        dir.path().join("out"),
    )?;

    let err = pipeline.apply(&ctx()).unwrap_err();
    assert_eq!(err.pipeline, "css");
    assert_eq!(err.stage, "broken");
    Ok(())
}

#[test]
fn enumeration_restarts_on_every_apply() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir_all(&src)?;
    fs::write(src.join("a.css"), "one")?;

    let pipeline = Pipeline::compose(
        "css",
        dir.path(),
        "src/*.css",
        vec![],
        dir.path().join("out"),
    )?;

    pipeline.apply(&ctx()).unwrap();
    assert!(!dir.path().join("out/b.css").exists());

    // A file added between runs is picked up by the next enumeration.
    fs::write(src.join("b.css"), "two")?;
    pipeline.apply(&ctx()).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("out/b.css"))?, "two");
    Ok(())
}
