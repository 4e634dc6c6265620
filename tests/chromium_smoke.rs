//! Live tests against a real Chrome/Chromium.
//!
//! These are marked `#[ignore]` because they require:
//! - `WAYFINDER_CHROME_BIN` pointing to a Chrome/Chromium binary.
//! - network access to `https://example.com`.
//! - for the full run, `MODEL_API_KEY` (or `GEMINI_API_KEY` / `OPENAI_API_KEY`).

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::info;
use serde_json::{Map, Value as JsonValue};
use wayfinder_rs::config::Verbosity;
use wayfinder_rs::dom_scripts::ai_id;
use wayfinder_rs::loader::PageLoader;
use wayfinder_rs::logging::WayfinderLogger;
use wayfinder_rs::runtime::ChromiumoxideLauncher;
use wayfinder_rs::{NavigationOutcome, Wayfinder, WayfinderConfig};

fn chrome_bin() -> Result<PathBuf> {
    let value = env::var("WAYFINDER_CHROME_BIN")
        .context("WAYFINDER_CHROME_BIN must point at a Chrome/Chromium executable")?;
    let path = PathBuf::from(value);
    if !path.exists() {
        return Err(anyhow!("chrome executable not found at {}", path.display()));
    }
    Ok(path)
}

/// Headless configuration with a throwaway profile directory so parallel
/// Chrome processes do not fight over the singleton lock.
fn local_config(profile: &tempfile::TempDir) -> Result<WayfinderConfig> {
    let mut launch = Map::new();
    launch.insert(
        "chromeExecutable".into(),
        JsonValue::String(chrome_bin()?.to_string_lossy().into_owned()),
    );
    launch.insert(
        "userDataDir".into(),
        JsonValue::String(profile.path().to_string_lossy().into_owned()),
    );

    let mut config = WayfinderConfig::from_env()?;
    config.headless = true;
    config.verbose = Verbosity::Medium;
    config.settle_delay_ms = 500;
    config.browser_launch_options = launch;
    Ok(config)
}

#[tokio::test]
#[ignore]
#[serial_test::serial]
async fn loads_and_tags_example_domain() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let profile = tempfile::Builder::new().prefix("wayfinder-smoke").tempdir()?;
    let config = local_config(&profile)?;
    let logger = Arc::new(WayfinderLogger::from_config(&config));
    let loader = PageLoader::from_config(ChromiumoxideLauncher::new(), &config, logger)?;

    let snapshot = loader.load("https://example.com").await?;
    info!(
        "loaded {} with {} tagged elements",
        snapshot.current_url,
        snapshot.elements.len()
    );

    assert_eq!(snapshot.title, "Example Domain");
    assert!(snapshot.html.contains("data-ai-id=\"ai-id-0\""));
    assert!(!snapshot.elements.is_empty());
    let ids: Vec<&str> = snapshot.elements.iter().map(|e| e.id.as_str()).collect();
    let expected: Vec<String> = (0..ids.len()).map(ai_id).collect();
    assert_eq!(ids, expected, "ids must be contiguous and in document order");
    let link = snapshot
        .elements
        .iter()
        .find(|element| element.tag == "a")
        .ok_or_else(|| anyhow!("expected a tagged anchor on example.com"))?;
    assert!(
        link.href
            .as_deref()
            .is_some_and(|href| href.starts_with("https://")),
        "anchor href should be absolute: {link:?}"
    );
    Ok(())
}

#[tokio::test]
#[ignore]
#[serial_test::serial]
async fn unreachable_host_exhausts_the_retry_budget() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let profile = tempfile::Builder::new().prefix("wayfinder-smoke").tempdir()?;
    let mut config = local_config(&profile)?;
    config.max_load_attempts = 2;
    config.retry_backoff_ms = 100;
    let logger = Arc::new(WayfinderLogger::from_config(&config));
    let loader = PageLoader::from_config(ChromiumoxideLauncher::new(), &config, logger)?;

    let err = loader
        .load("https://wayfinder.invalid/")
        .await
        .err()
        .ok_or_else(|| anyhow!("an .invalid host must not load"))?;
    assert_eq!(err.attempts, 2);
    Ok(())
}

#[tokio::test]
#[ignore]
#[serial_test::serial]
async fn full_run_reaches_a_terminal_state() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let profile = tempfile::Builder::new().prefix("wayfinder-run").tempdir()?;
    let mut config = local_config(&profile)?;
    config.require_model_api_key()?;
    config.max_steps = 3;

    let wayfinder = Wayfinder::from_config(config)?;
    let outcome = wayfinder
        .run(
            "Find out what the example domain is for",
            "https://example.com",
        )
        .await;

    info!("outcome: {}", serde_json::to_string_pretty(&outcome)?);
    match &outcome {
        NavigationOutcome::Done { data, .. } => assert!(!data.is_null()),
        NavigationOutcome::Failed { reason, .. } => assert!(!reason.is_empty()),
    }
    assert!(!outcome.steps().is_empty());
    assert!(outcome.steps().len() <= 3);
    Ok(())
}
