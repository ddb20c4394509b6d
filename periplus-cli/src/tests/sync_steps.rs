//! Behaviour-driven step definitions driving the sync CLI scenarios.

use super::helpers::{StubSyncBackend, seed_cache, two_source_api, utf8_tempdir};
use super::*;
use crate::sync::{SyncSummary, run_sync_with};
use camino::Utf8PathBuf;
use periplus_data::test_support::{StubApi, http_error};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Debug)]
struct SyncWorld {
    _tmp: TempDir,
    cache_path: Utf8PathBuf,
    backend: RefCell<StubSyncBackend>,
    cli_args: RefCell<Vec<String>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl SyncWorld {
    fn new() -> Self {
        let (tmp, root) = utf8_tempdir();
        Self {
            _tmp: tmp,
            cache_path: root.join("sites.sqlite3"),
            backend: RefCell::new(StubSyncBackend::new(StubApi::new())),
            cli_args: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn push_args<const N: usize>(&self, args: [&str; N]) {
        self.cli_args
            .borrow_mut()
            .extend(args.into_iter().map(str::to_owned));
    }

    fn use_cache(&self) {
        self.push_args([format!("--{ARG_CACHE_DB}").as_str(), self.cache_path.as_str()]);
    }

    fn build_command_line(&self) -> Vec<String> {
        let mut argv = vec!["periplus".to_owned(), "sync".to_owned()];
        argv.extend(self.cli_args.borrow().iter().cloned());
        argv
    }

    fn summary(&self) -> SyncSummary {
        let borrowed = self.result.borrow();
        let result = borrowed.as_ref().expect("result recorded");
        if let Err(err) = result {
            panic!("expected success, found {err:?}");
        }
        let stdout = String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8");
        serde_json::from_str(&stdout).expect("output should be a JSON sync summary")
    }
}

#[fixture]
fn world() -> SyncWorld {
    SyncWorld::new()
}

// --- Given steps ---

#[given("a dataset API serving two default-enabled sources")]
fn api_with_two_sources(#[from(world)] world: &SyncWorld) {
    world.backend.replace(StubSyncBackend::new(two_source_api()));
}

#[given("a dataset API whose pleiades source fails")]
fn api_with_failing_source(#[from(world)] world: &SyncWorld) {
    let api = two_source_api().with_sites_error("pleiades", http_error(500));
    world.backend.replace(StubSyncBackend::new(api));
}

#[given("a fresh cache database path")]
fn fresh_cache_path(#[from(world)] world: &SyncWorld) {
    world.use_cache();
}

#[given("a cache database seeded with {count} sites")]
fn seeded_cache(#[from(world)] world: &SyncWorld, count: usize) {
    seed_cache(&world.cache_path, "dare", count);
    world.use_cache();
}

#[given("the offline flag is set")]
fn offline_flag(#[from(world)] world: &SyncWorld) {
    world.push_args(["--offline"]);
}

#[given("the sources flag selects pleiades")]
fn sources_flag(#[from(world)] world: &SyncWorld) {
    world.push_args([format!("--{ARG_SOURCES}").as_str(), "pleiades"]);
}

// --- When steps ---

#[when("I run the sync command")]
fn run_sync_command(#[from(world)] world: &SyncWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Sync(args) => {
            let backend = world.backend.borrow();
            let mut buffer = world.stdout.borrow_mut();
            run_sync_with(args, &*backend, &mut *buffer)
        }
    });
    world.result.replace(Some(outcome));
}

// --- Then steps ---

#[then("the command succeeds with {count} sites from the remote API")]
fn succeeds_remote(#[from(world)] world: &SyncWorld, count: usize) {
    let summary = world.summary();
    assert_eq!(summary.origin, "remote");
    assert_eq!(summary.data_source.as_deref(), Some("stub"));
    assert_eq!(summary.total_sites, count);
}

#[then("the command succeeds with {count} sites read offline")]
fn succeeds_offline(#[from(world)] world: &SyncWorld, count: usize) {
    let summary = world.summary();
    assert_eq!(summary.origin, "offline");
    assert_eq!(summary.total_sites, count);
    assert!(summary.cached_sources.is_empty());
    assert!(summary.cache_bytes.is_some_and(|bytes| bytes > 0));
}

#[then("the summary lists {count} cached sources")]
fn lists_cached_sources(#[from(world)] world: &SyncWorld, count: usize) {
    let summary = world.summary();
    assert_eq!(summary.cached_sources.len(), count);
    assert!(summary.failed_sources.is_empty());
    assert!(world.cache_path.is_file());
}

#[then("the dataset API was not called")]
fn api_not_called(#[from(world)] world: &SyncWorld) {
    assert_eq!(world.backend.borrow().api.total_calls(), 0);
}

#[then("the summary reports pleiades as failed")]
fn reports_failure(#[from(world)] world: &SyncWorld) {
    let summary = world.summary();
    assert_eq!(summary.failed_sources, vec!["pleiades".to_owned()]);
    assert!(!summary.cached_sources.contains(&"pleiades".to_owned()));
}

#[then("the command fails because the cache path is missing")]
fn fails_missing_cache(#[from(world)] world: &SyncWorld) {
    let borrowed = world.result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_CACHE_DB),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

macro_rules! register_sync_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/sync_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: SyncWorld) {
            let _ = world;
        }
    };
}

register_sync_scenario!(sync_fills_cache, "syncing from the API fills the cache");
register_sync_scenario!(sync_offline, "syncing offline reads the cache");
register_sync_scenario!(sync_reports_failures, "a failing extra source is reported");
register_sync_scenario!(
    sync_offline_requires_cache,
    "offline sync without a cache path is rejected"
);
