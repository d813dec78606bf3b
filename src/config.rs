//! Configuration for track accumulation and queries.
//!
//! Field names follow the recognized option names (`resolution`, `pointsToKeep`, `maxAge`,
//! `maxRadius`, `fetchInitialTrack`) so a host can pass its stored plugin options straight
//! through [`TracksConfig::from_json`].
use serde::de::Error;
use std::time::Duration;

/// Track engine configuration.
///
/// # Example
///
/// ```rust
/// use trackstore::TracksConfig;
/// use std::time::Duration;
///
/// let json = r#"{ "resolution": 10000, "pointsToKeep": 120, "maxAge": 300 }"#;
/// let config = TracksConfig::from_json(json).unwrap();
/// assert_eq!(config.resolution(), Duration::from_secs(10));
/// assert_eq!(config.points_to_keep, 120);
/// assert_eq!(config.max_radius, 50_000.0);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracksConfig {
    /// Minimum time between accepted samples, in milliseconds
    #[serde(default = "TracksConfig::default_resolution_ms")]
    pub resolution: u64,

    /// Live samples retained per track
    #[serde(default = "TracksConfig::default_points_to_keep")]
    pub points_to_keep: usize,

    /// Seconds without input before a track is evicted
    #[serde(default = "TracksConfig::default_max_age_secs")]
    pub max_age: u64,

    /// Radius in meters applied when a query names none. 0 disables radius filtering.
    #[serde(default = "TracksConfig::default_max_radius")]
    pub max_radius: f64,

    /// Request a historical track once per newly seen context
    #[serde(default)]
    pub fetch_initial_track: bool,

    /// Context prefixes that are tracked; anything else is ignored
    #[serde(default = "TracksConfig::default_namespaces")]
    pub namespaces: Vec<String>,
}

impl TracksConfig {
    const fn default_resolution_ms() -> u64 {
        60_000
    }

    const fn default_points_to_keep() -> usize {
        60
    }

    const fn default_max_age_secs() -> u64 {
        600
    }

    const fn default_max_radius() -> f64 {
        50_000.0
    }

    fn default_namespaces() -> Vec<String> {
        vec!["vessels".to_string(), "aircraft".to_string()]
    }

    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_points_to_keep(mut self, points: usize) -> Self {
        assert!(points > 0, "Points to keep must be greater than zero");

        if points > 100_000 {
            log::warn!(
                "pointsToKeep of {} is very large; every tracked context may retain this many points",
                points
            );
        }

        self.points_to_keep = points;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age.as_secs();
        self
    }

    pub fn with_max_radius(mut self, meters: f64) -> Self {
        self.max_radius = meters;
        self
    }

    pub fn with_fetch_initial_track(mut self, enabled: bool) -> Self {
        self.fetch_initial_track = enabled;
        self
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Sample throttle window.
    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.resolution)
    }

    /// Idle time after which a track is pruned.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    /// Period of the prune timer, half the max age and never below one second.
    pub fn prune_interval(&self) -> Duration {
        (self.max_age() / 2).max(Duration::from_secs(1))
    }

    /// The default query radius, `None` when disabled.
    pub fn default_radius(&self) -> Option<f64> {
        (self.max_radius.is_finite() && self.max_radius > 0.0).then_some(self.max_radius)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.points_to_keep == 0 {
            return Err("pointsToKeep must be greater than zero".to_string());
        }

        if self.max_age == 0 {
            return Err("maxAge must be greater than zero".to_string());
        }

        if !self.max_radius.is_finite() || self.max_radius < 0.0 {
            return Err(format!(
                "maxRadius must be a non-negative number, got: {}",
                self.max_radius
            ));
        }

        if self.namespaces.iter().any(|ns| ns.is_empty() || ns.contains('.')) {
            return Err("namespaces must be non-empty and must not contain '.'".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: TracksConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: TracksConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            resolution: Self::default_resolution_ms(),
            points_to_keep: Self::default_points_to_keep(),
            max_age: Self::default_max_age_secs(),
            max_radius: Self::default_max_radius(),
            fetch_initial_track: false,
            namespaces: Self::default_namespaces(),
        }
    }
}
