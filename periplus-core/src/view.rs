//! Synchronisation between the 3D globe camera and the 2D map camera.
//!
//! Both renderers exchange a normalised [`GlobeView`]. The globe side works
//! with an [`OrbitCamera`] around a unit sphere at the origin, the map side
//! with a [`ProjectedCamera`] carrying a zoom level. The conversions are
//! linear approximations; the two back-ends use different projections and a
//! round trip is only visually continuous, not exact.

use geo::Coord;
use glam::DVec3;

use crate::geometry::{cartesian_to_geographic, geographic_to_cartesian, ray_sphere_intersect};

const GLOBE_RADIUS: f64 = 1.0;

/// Normalised view descriptor shared by both renderers.
///
/// `distance` is `0.0` at the closest zoom and `1.0` at the farthest.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobeView {
    pub lat: f64,
    pub lon: f64,
    pub distance: f64,
}

/// Geographic extent in degrees.
///
/// Values are raw minima and maxima, so `lon_min <= lon_max` always holds
/// and bounds are never inverted. An extent crossing the antimeridian is
/// not unwrapped: it shows up as a [`GeoBounds::lon_span`] above 180°, and
/// consumers detect the seam by that span rather than by `lon_min > lon_max`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoBounds {
    fn around(coord: Coord<f64>) -> Self {
        Self {
            lat_min: coord.y,
            lat_max: coord.y,
            lon_min: coord.x,
            lon_max: coord.x,
        }
    }

    fn extend(self, coord: Coord<f64>) -> Self {
        Self {
            lat_min: self.lat_min.min(coord.y),
            lat_max: self.lat_max.max(coord.y),
            lon_min: self.lon_min.min(coord.x),
            lon_max: self.lon_max.max(coord.x),
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }
}

/// Outcome of [`ViewSync::visible_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibleRegion {
    /// The camera's centre ray misses the globe.
    OffGlobe,
    /// The globe is smaller than the frustum; no crop is needed.
    WholeGlobe { center: Coord<f64> },
    /// The corners of the view land on the globe.
    Bounded {
        center: Coord<f64>,
        bounds: GeoBounds,
    },
}

/// Perspective camera orbiting the unit globe.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrbitCamera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f64,
    /// Viewport width divided by height.
    pub aspect: f64,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 3.0),
            target: DVec3::ZERO,
            up: DVec3::Y,
            fov_y_degrees: 45.0,
            aspect: 1.0,
        }
    }
}

impl OrbitCamera {
    /// Camera at `position` looking at the globe centre.
    pub fn looking_at_origin(position: DVec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Unit vector from the camera towards its target.
    pub fn forward(&self) -> DVec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Direction of the ray through a point in normalised device coordinates.
    ///
    /// `(0, 0)` is the view centre and `(±1, ±1)` the corners.
    pub fn ray_direction(&self, ndc_x: f64, ndc_y: f64) -> DVec3 {
        let forward = self.forward();
        let mut right = forward.cross(self.up).normalize_or_zero();
        if right == DVec3::ZERO {
            // Looking along the up vector; pick any perpendicular basis.
            right = forward.any_orthonormal_vector();
        }
        let up = right.cross(forward);
        let half_height = (self.fov_y_degrees.to_radians() / 2.0).tan();
        let half_width = half_height * self.aspect;
        forward + right * (ndc_x * half_width) + up * (ndc_y * half_height)
    }

    fn globe_hit(&self, direction: DVec3) -> Option<DVec3> {
        ray_sphere_intersect(self.position, direction, DVec3::ZERO, GLOBE_RADIUS)
            .into_iter()
            .next()
    }
}

/// Map-side camera: a geographic centre and a zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectedCamera {
    pub lat: f64,
    pub lon: f64,
    pub zoom: f64,
}

/// Reference constants used by [`ViewSync`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewSyncConfig {
    /// Camera-to-origin distance mapped to `GlobeView::distance == 0`.
    pub min_distance: f64,
    /// Camera-to-origin distance mapped to `GlobeView::distance == 1`.
    pub max_distance: f64,
    /// Map zoom at the farthest view.
    pub min_zoom: f64,
    /// Map zoom at the closest view.
    pub max_zoom: f64,
    /// Extent in degrees treated as a full-globe view.
    pub reference_span: f64,
    /// NDC offset of the corner rays; below one to avoid tangent misses.
    pub corner_inset: f64,
}

impl Default for ViewSyncConfig {
    fn default() -> Self {
        Self {
            min_distance: 1.15,
            max_distance: 5.0,
            min_zoom: 1.0,
            max_zoom: 12.0,
            reference_span: 120.0,
            corner_inset: 0.9,
        }
    }
}

impl ViewSyncConfig {
    /// Override the reference camera distances.
    #[must_use]
    pub fn with_distances(mut self, min_distance: f64, max_distance: f64) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    /// Override the reference zoom bounds.
    #[must_use]
    pub fn with_zoom_bounds(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }
}

/// Stateless converter between camera representations.
///
/// # Examples
/// ```
/// use periplus_core::{GlobeView, OrbitCamera, ViewSync};
///
/// let sync = ViewSync::default();
/// let view = GlobeView { lat: 41.9, lon: 12.5, distance: 0.25 };
/// let camera = sync.from_globe_view(view, &OrbitCamera::default());
/// let back = sync.to_globe_view(&camera);
/// assert!((back.lat - view.lat).abs() < 1e-9);
/// assert!((back.distance - view.distance).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewSync {
    config: ViewSyncConfig,
}

impl ViewSync {
    pub fn new(config: ViewSyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ViewSyncConfig {
        &self.config
    }

    /// Derive the geographic extent visible from `camera`.
    ///
    /// Rays are cast through the view centre and four corners pulled in to
    /// `corner_inset`. Fewer than two corner hits means the globe fits
    /// inside the frustum.
    pub fn visible_bounds(&self, camera: &OrbitCamera) -> VisibleRegion {
        let Some(center_hit) = camera.globe_hit(camera.ray_direction(0.0, 0.0)) else {
            return VisibleRegion::OffGlobe;
        };
        let center = to_coord(center_hit);

        let inset = self.config.corner_inset;
        let corners = [(-inset, -inset), (inset, -inset), (inset, inset), (-inset, inset)];
        let hits: Vec<Coord<f64>> = corners
            .iter()
            .filter_map(|&(x, y)| camera.globe_hit(camera.ray_direction(x, y)))
            .map(to_coord)
            .collect();

        match hits.split_first() {
            Some((first, rest)) if !rest.is_empty() => VisibleRegion::Bounded {
                center,
                bounds: rest
                    .iter()
                    .fold(GeoBounds::around(*first), |bounds, &hit| bounds.extend(hit)),
            },
            _ => VisibleRegion::WholeGlobe { center },
        }
    }

    /// Map an extent to a camera distance between `min_distance` and
    /// `max_distance`, using the larger of the two spans.
    pub fn extent_to_camera_distance(
        &self,
        bounds: &GeoBounds,
        min_distance: f64,
        max_distance: f64,
    ) -> f64 {
        let span = bounds.lat_span().max(bounds.lon_span());
        let t = (span / self.config.reference_span).clamp(0.0, 1.0);
        min_distance + t * (max_distance - min_distance)
    }

    /// Describe a globe camera as a [`GlobeView`].
    ///
    /// The centre is where the forward ray meets the globe, or the point
    /// beneath the camera if the forward ray misses.
    pub fn to_globe_view(&self, camera: &OrbitCamera) -> GlobeView {
        let anchor = camera
            .globe_hit(camera.forward())
            .unwrap_or(camera.position);
        let (lat, lon) = cartesian_to_geographic(anchor);
        GlobeView {
            lat,
            lon,
            distance: self.normalise_distance(camera.position.length()),
        }
    }

    /// Place a globe camera for `view`, keeping the lens of `template`.
    ///
    /// The camera sits above the view centre and looks at the origin.
    pub fn from_globe_view(&self, view: GlobeView, template: &OrbitCamera) -> OrbitCamera {
        let ViewSyncConfig {
            min_distance,
            max_distance,
            ..
        } = self.config;
        let radius = min_distance + view.distance.clamp(0.0, 1.0) * (max_distance - min_distance);
        OrbitCamera {
            position: geographic_to_cartesian(view.lat, view.lon, radius),
            target: DVec3::ZERO,
            ..*template
        }
    }

    /// Convert a [`GlobeView`] into a map camera.
    pub fn globe_view_to_projected_camera(&self, view: GlobeView) -> ProjectedCamera {
        let ViewSyncConfig {
            min_zoom, max_zoom, ..
        } = self.config;
        ProjectedCamera {
            lat: view.lat,
            lon: view.lon,
            zoom: max_zoom - view.distance.clamp(0.0, 1.0) * (max_zoom - min_zoom),
        }
    }

    /// Convert a map camera into a [`GlobeView`].
    pub fn projected_camera_to_globe_view(&self, lat: f64, lon: f64, zoom: f64) -> GlobeView {
        let ViewSyncConfig {
            min_zoom, max_zoom, ..
        } = self.config;
        GlobeView {
            lat,
            lon,
            distance: ((max_zoom - zoom) / (max_zoom - min_zoom)).clamp(0.0, 1.0),
        }
    }

    fn normalise_distance(&self, distance: f64) -> f64 {
        let ViewSyncConfig {
            min_distance,
            max_distance,
            ..
        } = self.config;
        ((distance - min_distance) / (max_distance - min_distance)).clamp(0.0, 1.0)
    }
}

fn to_coord(point: DVec3) -> Coord<f64> {
    let (lat, lon) = cartesian_to_geographic(point);
    Coord { x: lon, y: lat }
}
