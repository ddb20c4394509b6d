//! Behavioural coverage for region membership filtering.

use geo::{Coord, Geometry, LineString, Polygon};
use periplus_core::{ContainmentTest, EmpirePolygon, RayCasting, membership};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::{Cell, RefCell};

/// Ray casting that records how often it runs.
#[derive(Debug, Default)]
struct CountingRayCasting {
    calls: Cell<usize>,
}

impl ContainmentTest for CountingRayCasting {
    fn contains(&self, point: Coord<f64>, geometry: &Geometry<f64>) -> bool {
        self.calls.set(self.calls.get() + 1);
        RayCasting.contains(point, geometry)
    }
}

#[fixture]
fn regions() -> RefCell<Vec<EmpirePolygon>> {
    RefCell::new(Vec::new())
}

#[fixture]
fn exact_test() -> CountingRayCasting {
    CountingRayCasting::default()
}

#[fixture]
fn outcome() -> RefCell<Option<bool>> {
    RefCell::new(None)
}

fn ring(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(points.to_vec())
}

fn probe(
    point: Coord<f64>,
    regions: &RefCell<Vec<EmpirePolygon>>,
    exact_test: &CountingRayCasting,
    outcome: &RefCell<Option<bool>>,
) {
    let borrowed = regions.borrow();
    *outcome.borrow_mut() = Some(membership::is_within_regions_with(
        point,
        &borrowed,
        exact_test,
    ));
}

// --- Given steps ---

#[given("an empire with a courtyard hole")]
fn empire_with_hole(#[from(regions)] regions: &RefCell<Vec<EmpirePolygon>>) {
    let outer = ring(&[(10.0, 30.0), (40.0, 30.0), (40.0, 50.0), (10.0, 50.0)]);
    let hole = ring(&[(20.0, 38.0), (30.0, 38.0), (30.0, 44.0), (20.0, 44.0)]);
    *regions.borrow_mut() = vec![EmpirePolygon::new(
        "Courtyard",
        -100,
        vec![Geometry::Polygon(Polygon::new(outer, vec![hole]))],
    )];
}

// --- When steps ---

#[when("I test a point inside the hole")]
fn point_in_hole(
    #[from(regions)] regions: &RefCell<Vec<EmpirePolygon>>,
    #[from(exact_test)] exact_test: &CountingRayCasting,
    #[from(outcome)] outcome: &RefCell<Option<bool>>,
) {
    probe(Coord { x: 25.0, y: 40.0 }, regions, exact_test, outcome);
}

#[when("I test a point between the border and the hole")]
fn point_in_ring(
    #[from(regions)] regions: &RefCell<Vec<EmpirePolygon>>,
    #[from(exact_test)] exact_test: &CountingRayCasting,
    #[from(outcome)] outcome: &RefCell<Option<bool>>,
) {
    probe(Coord { x: 15.0, y: 32.0 }, regions, exact_test, outcome);
}

#[when("I test a point far outside the empire")]
fn point_far_away(
    #[from(regions)] regions: &RefCell<Vec<EmpirePolygon>>,
    #[from(exact_test)] exact_test: &CountingRayCasting,
    #[from(outcome)] outcome: &RefCell<Option<bool>>,
) {
    probe(Coord { x: -120.0, y: -45.0 }, regions, exact_test, outcome);
}

// --- Then steps ---

#[then("the point is a member")]
fn is_member(#[from(outcome)] outcome: &RefCell<Option<bool>>) {
    assert_eq!(*outcome.borrow(), Some(true));
}

#[then("the point is not a member")]
fn is_not_member(#[from(outcome)] outcome: &RefCell<Option<bool>>) {
    assert_eq!(*outcome.borrow(), Some(false));
}

#[then("the exact test was never invoked")]
fn exact_test_skipped(#[from(exact_test)] exact_test: &CountingRayCasting) {
    assert_eq!(exact_test.calls.get(), 0);
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/region_membership.feature", name = $title)]
        fn $fn_name(
            regions: RefCell<Vec<EmpirePolygon>>,
            exact_test: CountingRayCasting,
            outcome: RefCell<Option<bool>>,
        ) {
            let _ = (regions, exact_test, outcome);
        }
    };
}

register_scenario!(
    hole_excludes_site,
    "a site inside the outer ring but inside a hole is excluded"
);
register_scenario!(
    ring_includes_site,
    "a site inside the outer ring and outside all holes is included"
);
register_scenario!(
    bbox_rejects_before_exact_test,
    "a site outside the bounding box never reaches the exact test"
);
