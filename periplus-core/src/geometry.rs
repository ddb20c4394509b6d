//! Geometry kernel for a unit globe.
//!
//! Pure functions with no state. Every function is total: NaN or infinite
//! inputs propagate as NaN coordinates or a `false` membership answer, so a
//! single malformed record cannot abort a bulk filter pass.
//!
//! Axis convention: `Y` points to the north pole, the prime meridian crosses
//! the equator on `+X`, longitude 90° East on `-Z` and the antimeridian on
//! `-X`. This matches the common three.js globe layout where an
//! equirectangular texture's left edge sits at longitude -180°.

use geo::{Coord, CoordsIter, Geometry, LineString, Polygon, Rect};
use glam::DVec3;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Intersect an infinite ray with a sphere.
///
/// Returns the hit points nearest first. Intersections behind the origin are
/// discarded and a tangent double root is reported once. The direction need
/// not be normalised.
///
/// # Examples
/// ```
/// use glam::DVec3;
/// use periplus_core::geometry::ray_sphere_intersect;
///
/// let hits = ray_sphere_intersect(DVec3::new(0.0, 0.0, 3.0), DVec3::NEG_Z, DVec3::ZERO, 1.0);
/// assert_eq!(hits.len(), 2);
/// assert!((hits[0].z - 1.0).abs() < 1e-12);
/// ```
pub fn ray_sphere_intersect(
    origin: DVec3,
    direction: DVec3,
    center: DVec3,
    radius: f64,
) -> Vec<DVec3> {
    let oc = origin - center;
    let a = direction.dot(direction);
    let b = 2.0 * oc.dot(direction);
    let c = oc.dot(oc) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    // Negated comparison so NaN also yields no hit.
    if !(discriminant >= 0.0) || a == 0.0 {
        return Vec::new();
    }

    let root = discriminant.sqrt();
    let near = (-b - root) / (2.0 * a);
    let far = (-b + root) / (2.0 * a);

    let mut distances = Vec::with_capacity(2);
    if near >= 0.0 {
        distances.push(near);
    }
    if far >= 0.0 && far != near {
        distances.push(far);
    }
    distances
        .into_iter()
        .map(|t| origin + direction * t)
        .collect()
}

/// Wrap a longitude in degrees into `(-180, 180]`.
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Convert latitude/longitude in degrees to a point on a sphere of `radius`.
pub fn geographic_to_cartesian(lat: f64, lon: f64, radius: f64) -> DVec3 {
    let phi = (90.0 - lat).to_radians();
    let theta = (lon + 180.0).to_radians();
    DVec3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// Convert a point to `(latitude, longitude)` in degrees.
///
/// The point's length is irrelevant, so this inverts
/// [`geographic_to_cartesian`] for any radius. The origin maps to NaN.
pub fn cartesian_to_geographic(point: DVec3) -> (f64, f64) {
    let horizontal = point.x.hypot(point.z);
    if horizontal == 0.0 && point.y == 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let lat = point.y.atan2(horizontal).to_degrees();
    let theta = point.z.atan2(-point.x).to_degrees();
    (lat, wrap_longitude(theta - 180.0))
}

/// Great-circle distance between two coordinates in kilometres.
///
/// # Examples
/// ```
/// use periplus_core::geometry::haversine_distance;
///
/// let quarter = haversine_distance(0.0, 0.0, 0.0, 90.0);
/// assert!((quarter - 10_007.5).abs() < 1.0);
/// ```
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Even-odd ray casting against one ring of `[lon, lat]` vertices.
///
/// The ring does not need to repeat its first vertex. Points exactly on an
/// edge have unspecified membership.
pub fn point_in_ring(point: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    let Some(last) = ring.last() else {
        return false;
    };
    let mut inside = false;
    let mut previous = *last;
    for &current in ring {
        let crosses = (current.y > point.y) != (previous.y > point.y);
        if crosses {
            let edge_x = (previous.x - current.x) * (point.y - current.y)
                / (previous.y - current.y)
                + current.x;
            if point.x < edge_x {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

fn point_in_linestring(point: Coord<f64>, ring: &LineString<f64>) -> bool {
    point_in_ring(point, &ring.0)
}

fn point_in_polygon(point: Coord<f64>, polygon: &Polygon<f64>) -> bool {
    point_in_linestring(point, polygon.exterior())
        && !polygon
            .interiors()
            .iter()
            .any(|hole| point_in_linestring(point, hole))
}

/// Test a point against a polygon or multi-polygon, honouring holes.
///
/// Other geometry kinds do not describe regions and never contain points.
pub fn point_in_geometry(point: Coord<f64>, geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => point_in_polygon(point, polygon),
        Geometry::MultiPolygon(parts) => parts
            .iter()
            .any(|polygon| point_in_polygon(point, polygon)),
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .any(|member| point_in_geometry(point, member)),
        _ => false,
    }
}

/// Minimal axis-aligned box over every vertex of every feature.
///
/// Returns `None` when the features contain no finite vertex.
pub fn compute_bounding_box(features: &[Geometry<f64>]) -> Option<Rect<f64>> {
    let mut bounds: Option<(Coord<f64>, Coord<f64>)> = None;
    for coord in features.iter().flat_map(|feature| feature.coords_iter()) {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            continue;
        }
        bounds = Some(match bounds {
            None => (coord, coord),
            Some((min, max)) => (
                Coord {
                    x: min.x.min(coord.x),
                    y: min.y.min(coord.y),
                },
                Coord {
                    x: max.x.max(coord.x),
                    y: max.y.max(coord.y),
                },
            ),
        });
    }
    bounds.map(|(min, max)| Rect::new(min, max))
}
