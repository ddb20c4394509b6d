//! Region membership queries for overlay filters.
//!
//! A query point is first checked against each region's bounding box; only
//! regions whose box contains the point run the exact ray-casting test. The
//! scan stops at the first exact hit.

use std::collections::BTreeMap;

use geo::{Coord, Geometry};

use crate::{EmpirePolygon, Site, geometry::point_in_geometry};

/// Exact point-in-geometry predicate used after the bounding-box filter.
pub trait ContainmentTest {
    /// Return `true` when `point` lies inside `geometry`.
    fn contains(&self, point: Coord<f64>, geometry: &Geometry<f64>) -> bool;
}

/// Even-odd ray casting from [`crate::geometry`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RayCasting;

impl ContainmentTest for RayCasting {
    fn contains(&self, point: Coord<f64>, geometry: &Geometry<f64>) -> bool {
        point_in_geometry(point, geometry)
    }
}

/// Whether `point` lies inside any of `regions`.
///
/// # Examples
/// ```
/// use geo::{Coord, Geometry, LineString, Polygon};
/// use periplus_core::{EmpirePolygon, membership::is_within_regions};
///
/// let region = EmpirePolygon::new(
///     "Achaemenid",
///     -500,
///     vec![Geometry::Polygon(Polygon::new(
///         LineString::from(vec![(25.0, 25.0), (70.0, 25.0), (70.0, 42.0), (25.0, 42.0)]),
///         vec![],
///     ))],
/// );
/// assert!(is_within_regions(Coord { x: 52.9, y: 29.9 }, &[region.clone()]));
/// assert!(!is_within_regions(Coord { x: 12.5, y: 41.9 }, &[region]));
/// ```
pub fn is_within_regions(point: Coord<f64>, regions: &[EmpirePolygon]) -> bool {
    is_within_regions_with(point, regions, &RayCasting)
}

/// [`is_within_regions`] with an explicit exact test.
pub fn is_within_regions_with<T>(point: Coord<f64>, regions: &[EmpirePolygon], test: &T) -> bool
where
    T: ContainmentTest + ?Sized,
{
    regions
        .iter()
        .filter(|region| region.bbox_contains(point))
        .any(|region| {
            region
                .features()
                .iter()
                .any(|feature| test.contains(point, feature))
        })
}

/// Whether a site lies inside any region. Coordinate-unknown sites never do.
pub fn site_within_regions(site: &Site, regions: &[EmpirePolygon]) -> bool {
    site.location
        .is_some_and(|location| is_within_regions(location, regions))
}

/// Keep the sites located inside any of `regions`.
pub fn filter_sites<'a, I>(sites: I, regions: &[EmpirePolygon]) -> Vec<&'a Site>
where
    I: IntoIterator<Item = &'a Site>,
{
    sites
        .into_iter()
        .filter(|site| site_within_regions(site, regions))
        .collect()
}

/// Pick one time slice per requested region name.
///
/// For each name the slice with the greatest year not after `year` wins.
/// Names without such a slice are skipped. The result follows the order of
/// `names`.
pub fn select_time_slices<'a>(
    regions: &'a [EmpirePolygon],
    names: &[&str],
    year: i32,
) -> Vec<&'a EmpirePolygon> {
    let mut latest: BTreeMap<&str, &'a EmpirePolygon> = BTreeMap::new();
    for region in regions.iter().filter(|region| region.year() <= year) {
        let entry = latest.entry(region.name()).or_insert(region);
        if region.year() > entry.year() {
            *entry = region;
        }
    }
    names
        .iter()
        .filter_map(|name| latest.get(name).copied())
        .collect()
}
