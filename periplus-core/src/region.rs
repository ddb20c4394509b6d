use geo::{Coord, Geometry, Rect};

use crate::geometry::compute_bounding_box;

/// A named, time-sliced historical region.
///
/// The bounding box is derived from the features on construction and is
/// always the minimal axis-aligned box over every ring vertex. Regions
/// without vertices have no box and never contain anything.
///
/// # Examples
/// ```
/// use geo::{Geometry, LineString, Polygon};
/// use periplus_core::EmpirePolygon;
///
/// let square = Polygon::new(
///     LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
///     vec![],
/// );
/// let region = EmpirePolygon::new("Rome", 117, vec![Geometry::Polygon(square)]);
/// let bbox = region.bounding_box().expect("region has vertices");
/// assert_eq!(bbox.max().x, 10.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawEmpirePolygon"))]
pub struct EmpirePolygon {
    name: String,
    year: i32,
    bbox: Option<Rect<f64>>,
    features: Vec<Geometry<f64>>,
}

/// Decoded form of [`EmpirePolygon`]; any serialised `bbox` is ignored and
/// recomputed from the features.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawEmpirePolygon {
    name: String,
    year: i32,
    features: Vec<Geometry<f64>>,
}

#[cfg(feature = "serde")]
impl From<RawEmpirePolygon> for EmpirePolygon {
    fn from(raw: RawEmpirePolygon) -> Self {
        Self::new(raw.name, raw.year, raw.features)
    }
}

impl EmpirePolygon {
    /// Construct a region and precompute its bounding box.
    pub fn new(name: impl Into<String>, year: i32, features: Vec<Geometry<f64>>) -> Self {
        let bbox = compute_bounding_box(&features);
        Self {
            name: name.into(),
            year,
            bbox,
            features,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn features(&self) -> &[Geometry<f64>] {
        &self.features
    }

    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.bbox
    }

    /// Cheap rejection test; boundary points count as inside.
    pub fn bbox_contains(&self, point: Coord<f64>) -> bool {
        self.bbox.is_some_and(|bbox| {
            let (min, max) = (bbox.min(), bbox.max());
            min.x <= point.x && point.x <= max.x && min.y <= point.y && point.y <= max.y
        })
    }
}
