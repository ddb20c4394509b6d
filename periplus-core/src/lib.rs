//! Core domain types for the Periplus site atlas.
//!
//! The crate is free of I/O. It defines the site and source records shared
//! by the data layer and the renderers, the geometry kernel used to reason
//! about a unit globe, the camera synchronisation between the 3D globe and
//! the projected map, and the region membership queries used by overlay
//! filters.

#![forbid(unsafe_code)]

pub mod geometry;
pub mod membership;
mod region;
mod site;
mod source;
mod status;
pub mod view;

pub use membership::{ContainmentTest, RayCasting};
pub use region::EmpirePolygon;
pub use site::{Site, SiteStats};
pub use source::Source;
pub use status::{LoadState, SourceStatus};
pub use view::{
    GeoBounds, GlobeView, OrbitCamera, ProjectedCamera, ViewSync, ViewSyncConfig, VisibleRegion,
};
