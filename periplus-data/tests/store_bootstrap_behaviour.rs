//! Behavioural coverage for [`DataStore`] bootstrap and merging.
#![cfg(feature = "store-sqlite")]

use camino::Utf8PathBuf;
use periplus_core::{Site, Source};
use periplus_data::test_support::{StubApi, block_on_for_tests};
use periplus_data::{
    DataOrigin, DataStore, DatasetApi, MemorySiteCache, NetworkStatus, SiteCache,
    SqliteSiteCache, StoreConfig, StoreError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::sync::Arc;
use tempfile::TempDir;

const DEFAULT: &str = "ancient_locations";

/// Store under test plus the stub behind it.
struct World {
    api: Arc<StubApi>,
    store: DataStore,
    // Keeps the SQLite file alive for the scenario.
    _dir: Option<TempDir>,
}

type WorldCell = RefCell<Option<World>>;
type OutcomeCell = RefCell<Option<Result<DataOrigin, StoreError>>>;

#[fixture]
fn world() -> WorldCell {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> OutcomeCell {
    RefCell::new(None)
}

fn build(
    api: StubApi,
    cache: Option<Arc<dyn SiteCache>>,
    network: NetworkStatus,
    dir: Option<TempDir>,
) -> World {
    let api = Arc::new(api);
    let store = DataStore::new(
        Arc::clone(&api) as Arc<dyn DatasetApi>,
        cache,
        network,
        StoreConfig::default().with_default_source(DEFAULT),
    );
    World {
        api,
        store,
        _dir: dir,
    }
}

fn cached_sites(source_id: &str, count: usize) -> Vec<Site> {
    (0..count)
        .map(|i| Site::new(format!("{source_id}-{i}"), format!("Cached {i}"), source_id))
        .collect()
}

fn with_store<T>(world: &WorldCell, f: impl FnOnce(&World) -> T) -> T {
    let guard = world.borrow();
    let world = guard.as_ref().expect("world must be initialised");
    f(world)
}

// --- Given steps ---

#[given("an online dataset API with two sources and three default sites")]
fn online_api(#[from(world)] world: &WorldCell) {
    let sources = [
        Source::new(DEFAULT, "Ancient locations").enabled_by_default(true),
        Source::new("pleiades", "Pleiades").with_priority(1),
    ];
    let sites = [
        Site::new("1", "Ur", DEFAULT).with_coordinates(Some(30.96), Some(46.10)),
        Site::new("2", "Uruk", DEFAULT).with_coordinates(Some(31.32), Some(45.64)),
        Site::new("3", "Eridu", "pleiades"),
    ];
    let api = StubApi::new()
        .with_sources(&sources)
        .with_sites(DEFAULT, &sites);
    *world.borrow_mut() = Some(build(api, None, NetworkStatus::online(), None));
}

#[given("an offline device with 5 cached sites")]
fn offline_with_memory_cache(#[from(world)] world: &WorldCell) {
    let cache = MemorySiteCache::new()
        .with_source(&Source::new("dare", "DARE"), cached_sites("dare", 5));
    *world.borrow_mut() = Some(build(
        StubApi::new(),
        Some(Arc::new(cache)),
        NetworkStatus::offline(),
        None,
    ));
}

#[given("an offline device with a SQLite cache of 4 sites")]
fn offline_with_sqlite_cache(#[from(world)] world: &WorldCell) {
    let dir = TempDir::new().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("cache.sqlite3"))
        .expect("temporary path must be UTF-8");
    let cache = SqliteSiteCache::initialise(&path).expect("initialise cache");
    block_on_for_tests(cache.store_source(
        &Source::new("pleiades", "Pleiades"),
        &cached_sites("pleiades", 4),
    ))
    .expect("seed cache");
    *world.borrow_mut() = Some(build(
        StubApi::new(),
        Some(Arc::new(cache)),
        NetworkStatus::offline(),
        Some(dir),
    ));
}

// --- When steps ---

#[when("the store is initialised")]
fn initialise(#[from(world)] world: &WorldCell, #[from(outcome)] outcome: &OutcomeCell) {
    let result = with_store(world, |w| block_on_for_tests(w.store.initialize()));
    *outcome.borrow_mut() = Some(result);
}

#[when("the same batch of 2 sites arrives twice for source pleiades")]
fn batch_twice(#[from(world)] world: &WorldCell) {
    with_store(world, |w| {
        let batch = cached_sites("pleiades", 2);
        w.store.add_source_sites("pleiades", batch.clone());
        w.store.add_source_sites("pleiades", batch);
    });
}

// --- Then steps ---

#[then("the store holds {count} sites")]
fn holds_sites(
    #[from(world)] world: &WorldCell,
    #[from(outcome)] outcome: &OutcomeCell,
    count: usize,
) {
    let borrowed = outcome.borrow();
    assert!(
        matches!(&*borrowed, Some(Ok(_))),
        "bootstrap should succeed, got {borrowed:?}"
    );
    with_store(world, |w| {
        assert_eq!(w.store.sites().len(), count);
        assert_eq!(w.store.stats().total_sites, count);
    });
}

#[then("the store holds {count} sources")]
fn holds_sources(#[from(world)] world: &WorldCell, count: usize) {
    with_store(world, |w| assert_eq!(w.store.sources().len(), count));
}

#[then("the store is not offline")]
fn online(#[from(world)] world: &WorldCell) {
    with_store(world, |w| {
        assert!(!w.store.is_offline());
        assert!(matches!(w.store.data_source(), DataOrigin::Remote(_)));
    });
}

#[then("the store is offline")]
fn offline(#[from(world)] world: &WorldCell) {
    with_store(world, |w| {
        assert!(w.store.is_offline());
        assert_eq!(w.store.data_source(), DataOrigin::Offline);
    });
}

#[then("no network calls were made")]
fn no_network(#[from(world)] world: &WorldCell) {
    with_store(world, |w| assert_eq!(w.api.total_calls(), 0));
}

#[then("source pleiades holds {count} sites")]
fn pleiades_holds(#[from(world)] world: &WorldCell, count: usize) {
    with_store(world, |w| {
        assert_eq!(w.store.sites_by_source(&["pleiades"]).len(), count);
        assert_eq!(w.store.stats().by_source.get("pleiades"), Some(&count));
    });
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/store_bootstrap.feature", name = $title)]
        fn $fn_name(world: WorldCell, outcome: OutcomeCell) {
            let _ = (world, outcome);
        }
    };
}

register_scenario!(
    online_bootstrap,
    "bootstrapping online registers sources and partitions sites"
);
register_scenario!(
    offline_bootstrap,
    "bootstrapping offline reads the cache without touching the network"
);
register_scenario!(
    offline_sqlite_bootstrap,
    "bootstrapping offline from a SQLite cache"
);
register_scenario!(
    reload_replaces_sites,
    "reloading a source replaces its sites"
);
