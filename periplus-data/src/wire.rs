//! Wire format of the remote dataset API.
//!
//! Sites travel as compact records with one- or two-letter keys to save
//! bandwidth. They are expanded into [`Site`] values before anything else
//! sees them. Optional fields that are absent or empty become `None`.

use geo::Coord;
use periplus_core::{Site, Source};
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Site identifier as sent by the API: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactId {
    Text(String),
    Number(i64),
}

impl CompactId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Compact site record.
///
/// Key mapping: `i` id, `n` name, `la` latitude, `lo` longitude, `s` source
/// id, `t` type, `p` period start, `d` description, `l` location, `u`
/// source URL, `im` image, `c` country, `an` alternative names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactSite {
    pub i: CompactId,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub la: Option<f64>,
    #[serde(default)]
    pub lo: Option<f64>,
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub p: Option<i32>,
    #[serde(default)]
    pub d: Option<String>,
    #[serde(default)]
    pub l: Option<String>,
    #[serde(default)]
    pub u: Option<String>,
    #[serde(default)]
    pub im: Option<String>,
    #[serde(default)]
    pub c: Option<String>,
    #[serde(default)]
    pub an: Option<Vec<String>>,
}

impl CompactSite {
    /// Expand into a [`Site`], attributing it to `fallback_source` when the
    /// record carries no source id.
    pub fn expand(self, fallback_source: &str) -> Site {
        let location = Site::coordinate(self.la, self.lo);
        Site {
            id: self.i.into_string(),
            name: self.n.unwrap_or_default(),
            location,
            source_id: non_empty(self.s).unwrap_or_else(|| fallback_source.to_owned()),
            site_type: non_empty(self.t),
            period_start: self.p,
            description: non_empty(self.d),
            place: non_empty(self.l),
            source_url: non_empty(self.u),
            image: non_empty(self.im),
            country: non_empty(self.c),
            alt_names: self
                .an
                .unwrap_or_default()
                .into_iter()
                .filter(|name| !name.trim().is_empty())
                .collect(),
        }
    }

    /// Compact a [`Site`] back into its wire representation.
    pub fn from_site(site: &Site) -> Self {
        Self {
            i: CompactId::Text(site.id.clone()),
            n: Some(site.name.clone()),
            la: site.location.map(|c: Coord<f64>| c.y),
            lo: site.location.map(|c: Coord<f64>| c.x),
            s: Some(site.source_id.clone()),
            t: site.site_type.clone(),
            p: site.period_start,
            d: site.description.clone(),
            l: site.place.clone(),
            u: site.source_url.clone(),
            im: site.image.clone(),
            c: site.country.clone(),
            an: (!site.alt_names.is_empty()).then(|| site.alt_names.clone()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Body of `GET /api/sites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitesPage {
    pub sites: Vec<CompactSite>,
    #[serde(default)]
    pub count: Option<usize>,
    /// Backend label, e.g. `"postgres"` or `"static"`.
    #[serde(default)]
    pub data_source: Option<String>,
}

/// One entry of `GET /api/sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub url: Option<String>,
}

const fn default_enabled() -> bool {
    true
}

impl From<SourceRecord> for Source {
    fn from(record: SourceRecord) -> Self {
        Self {
            name: record.name.unwrap_or_else(|| record.id.clone()),
            id: record.id,
            color: record.color.unwrap_or_default(),
            category: record.category.unwrap_or_default(),
            count: record.count,
            is_primary: record.is_primary,
            enabled: record.enabled,
            enabled_by_default: record.enabled_by_default,
            priority: record.priority,
            url: non_empty(record.url),
        }
    }
}

impl From<&Source> for SourceRecord {
    fn from(source: &Source) -> Self {
        Self {
            id: source.id.clone(),
            name: Some(source.name.clone()),
            color: Some(source.color.clone()),
            category: Some(source.category.clone()),
            count: source.count,
            is_primary: source.is_primary,
            enabled: source.enabled,
            enabled_by_default: source.enabled_by_default,
            priority: source.priority,
            url: source.url.clone(),
        }
    }
}

/// Decoded sites response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSites {
    pub sites: Vec<Site>,
    pub data_source: Option<String>,
}

/// Decode a source listing, ordered by priority then id.
pub fn parse_source_listing(body: &str) -> Result<Vec<Source>, WireError> {
    let records: Vec<SourceRecord> =
        serde_json::from_str(body).map_err(|err| WireError::new("source listing", &err))?;
    let mut sources: Vec<Source> = records.into_iter().map(Source::from).collect();
    sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    Ok(sources)
}

/// Decode a sites page requested for `source_id` and expand its records.
pub fn parse_sites(body: &str, source_id: &str) -> Result<ParsedSites, WireError> {
    let page: SitesPage =
        serde_json::from_str(body).map_err(|err| WireError::new("sites", &err))?;
    Ok(ParsedSites {
        sites: expand_all(page.sites, source_id),
        data_source: non_empty(page.data_source),
    })
}

/// Expand a batch of compact records.
pub fn expand_all(records: Vec<CompactSite>, fallback_source: &str) -> Vec<Site> {
    records
        .into_iter()
        .map(|record| record.expand(fallback_source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn expands_every_short_key() {
        let body = r#"{
            "sites": [{
                "i": "k-1", "n": "Knossos", "la": 35.298, "lo": 25.163, "s": "pleiades",
                "t": "palace", "p": -1900, "d": "Bronze Age complex", "l": "Heraklion",
                "u": "https://example.org/k", "im": "k.jpg", "c": "Greece",
                "an": ["Cnossus", ""]
            }],
            "count": 1,
            "dataSource": "postgres"
        }"#;
        let parsed = parse_sites(body, "ignored").expect("valid page");
        assert_eq!(parsed.data_source.as_deref(), Some("postgres"));
        let site = &parsed.sites[0];
        assert_eq!(site.id, "k-1");
        assert_eq!(site.name, "Knossos");
        assert_eq!(site.lat(), Some(35.298));
        assert_eq!(site.lon(), Some(25.163));
        assert_eq!(site.source_id, "pleiades");
        assert_eq!(site.site_type.as_deref(), Some("palace"));
        assert_eq!(site.period_start, Some(-1900));
        assert_eq!(site.description.as_deref(), Some("Bronze Age complex"));
        assert_eq!(site.place.as_deref(), Some("Heraklion"));
        assert_eq!(site.source_url.as_deref(), Some("https://example.org/k"));
        assert_eq!(site.image.as_deref(), Some("k.jpg"));
        assert_eq!(site.country.as_deref(), Some("Greece"));
        assert_eq!(site.alt_names, vec![String::from("Cnossus")]);
    }

    #[rstest]
    fn absent_and_empty_optionals_become_none() {
        let body = r#"{"sites": [{"i": 42, "n": "Unnamed mound", "t": "", "la": null}]}"#;
        let parsed = parse_sites(body, "dare").expect("valid page");
        let site = &parsed.sites[0];
        assert_eq!(site.id, "42");
        assert_eq!(site.source_id, "dare");
        assert_eq!(site.site_type, None);
        assert_eq!(site.country, None);
        assert_eq!(site.location, None);
        assert!(site.alt_names.is_empty());
        assert_eq!(parsed.data_source, None);
    }

    #[rstest]
    fn malformed_sites_report_wire_error() {
        let err = parse_sites("{\"sites\": 3}", "a").expect_err("should fail");
        assert_eq!(err.what, "sites");
    }

    #[rstest]
    fn listing_is_sorted_and_defaults_applied() {
        let body = r#"[
            {"id": "b", "name": "Beta", "priority": 2},
            {"id": "a", "priority": 1, "enabledByDefault": true, "isPrimary": true, "count": 10}
        ]"#;
        let sources = parse_source_listing(body).expect("valid listing");
        assert_eq!(sources[0].id, "a");
        assert_eq!(sources[0].name, "a");
        assert!(sources[0].enabled_by_default && sources[0].is_primary);
        assert_eq!(sources[0].count, 10);
        assert!(sources[1].enabled);
        assert!(!sources[1].enabled_by_default);
    }

    #[rstest]
    fn compacting_keeps_unknown_coordinates_unknown() {
        let site = Site::new("x", "Nowhere", "s");
        let compact = CompactSite::from_site(&site);
        assert_eq!(compact.la, None);
        assert_eq!(compact.expand("s"), site);
    }
}
