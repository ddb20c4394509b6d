use std::collections::BTreeMap;

use geo::Coord;

/// An archaeological site record.
///
/// Coordinates are WGS84-like degrees with `x = longitude` and
/// `y = latitude`. A site whose coordinates were missing, non-finite or out
/// of range has `location == None`; it is never placed at `(0, 0)`, which is
/// a real point in the Gulf of Guinea.
///
/// # Examples
/// ```
/// use periplus_core::Site;
///
/// let site = Site::new("s1", "Knossos", "pleiades")
///     .with_coordinates(Some(35.298), Some(25.163));
/// assert!(site.location.is_some());
///
/// let unknown = Site::new("s2", "Lost city", "pleiades").with_coordinates(None, Some(10.0));
/// assert!(unknown.location.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    pub id: String,
    pub name: String,
    pub location: Option<Coord<f64>>,
    pub source_id: String,
    pub site_type: Option<String>,
    /// First year of occupation; negative values are BCE.
    pub period_start: Option<i32>,
    pub description: Option<String>,
    /// Free-form place description, e.g. a region or modern town.
    pub place: Option<String>,
    pub source_url: Option<String>,
    /// Thumbnail or image reference.
    pub image: Option<String>,
    pub country: Option<String>,
    pub alt_names: Vec<String>,
}

impl Site {
    /// Construct a coordinate-unknown site with no optional attributes.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    /// Attach coordinates, validating them with [`Site::coordinate`].
    #[must_use]
    pub fn with_coordinates(mut self, lat: Option<f64>, lon: Option<f64>) -> Self {
        self.location = Self::coordinate(lat, lon);
        self
    }

    /// Build a location from optional latitude and longitude.
    ///
    /// Returns `None` when either value is absent, non-finite or outside
    /// `[-90, 90]` / `[-180, 180]`.
    ///
    /// # Examples
    /// ```
    /// use periplus_core::Site;
    ///
    /// assert!(Site::coordinate(Some(0.0), Some(0.0)).is_some());
    /// assert!(Site::coordinate(Some(f64::NAN), Some(0.0)).is_none());
    /// assert!(Site::coordinate(Some(91.0), Some(0.0)).is_none());
    /// ```
    pub fn coordinate(lat: Option<f64>, lon: Option<f64>) -> Option<Coord<f64>> {
        let (lat, lon) = (lat?, lon?);
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Coord { x: lon, y: lat })
    }

    /// Latitude in degrees, if known.
    pub fn lat(&self) -> Option<f64> {
        self.location.map(|c| c.y)
    }

    /// Longitude in degrees, if known.
    pub fn lon(&self) -> Option<f64> {
        self.location.map(|c| c.x)
    }
}

/// Aggregate counts over the sites held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteStats {
    pub total_sites: usize,
    pub by_source: BTreeMap<String, usize>,
}

impl SiteStats {
    /// Recompute statistics from a partition map.
    ///
    /// Empty partitions are still reported with a zero count.
    pub fn from_partitions<'a, I>(partitions: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<Site>)>,
    {
        let by_source: BTreeMap<String, usize> = partitions
            .into_iter()
            .map(|(id, sites)| (id.clone(), sites.len()))
            .collect();
        Self {
            total_sites: by_source.values().sum(),
            by_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Some(1.0))]
    #[case(Some(1.0), None)]
    #[case(Some(f64::NAN), Some(1.0))]
    #[case(Some(1.0), Some(f64::INFINITY))]
    #[case(Some(-90.5), Some(1.0))]
    #[case(Some(1.0), Some(180.5))]
    fn invalid_coordinates_are_unknown(#[case] lat: Option<f64>, #[case] lon: Option<f64>) {
        let site = Site::new("a", "A", "src").with_coordinates(lat, lon);
        assert_eq!(site.location, None);
    }

    #[rstest]
    fn zero_zero_is_a_real_location() {
        let site = Site::new("a", "A", "src").with_coordinates(Some(0.0), Some(0.0));
        assert_eq!(site.location, Some(Coord { x: 0.0, y: 0.0 }));
        assert_eq!(site.lat(), Some(0.0));
        assert_eq!(site.lon(), Some(0.0));
    }

    #[rstest]
    fn stats_sum_partitions() {
        let partitions = BTreeMap::from([
            (
                String::from("a"),
                vec![Site::new("1", "x", "a"), Site::new("2", "y", "a")],
            ),
            (String::from("b"), Vec::new()),
        ]);
        let stats = SiteStats::from_partitions(&partitions);
        assert_eq!(stats.total_sites, 2);
        assert_eq!(stats.by_source.get("b"), Some(&0));
    }
}
