/// A named partition of sites supplied by one data provider.
///
/// Sources are registered once per session from the remote listing or the
/// offline cache. Only [`Source::count`] changes afterwards, when the
/// partition is reloaded.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    pub id: String,
    pub name: String,
    /// Display colour, usually a CSS hex string.
    pub color: String,
    pub category: String,
    /// Number of records the source holds.
    pub count: usize,
    pub is_primary: bool,
    pub enabled: bool,
    pub enabled_by_default: bool,
    /// Lower values sort first.
    pub priority: i32,
    pub url: Option<String>,
}

impl Source {
    /// Construct an enabled source with the given identifier and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            ..Self::default()
        }
    }

    /// Mark the source as shown on first paint.
    #[must_use]
    pub fn enabled_by_default(mut self, flag: bool) -> Self {
        self.enabled_by_default = flag;
        self
    }

    /// Mark the source as selectable.
    #[must_use]
    pub fn enabled(mut self, flag: bool) -> Self {
        self.enabled = flag;
        self
    }

    /// Set the ordering priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
