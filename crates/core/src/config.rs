//! Viewer configuration.
//!
//! Settings can be loaded from a TOML file, from environment variables, or
//! built programmatically. Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tileview_render::RenderQuality;
use viewer_core::{FitPolicy, LayoutOptions, ScrollAxis, ZoomLevels};

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading or writing a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid TOML or has wrongly typed keys
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment variable holds a value of the wrong type
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv { name: String, value: String },

    /// A value is outside its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tile cache and rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Maximum number of cached tiles (active plus passive)
    pub cache_limit: usize,
    /// Maximum number of cached thumbnails
    pub thumbnail_limit: usize,
    /// Edge length of one tile in pixels
    pub part_size: f32,
    /// Thumbnail size relative to the unzoomed page
    pub thumbnail_ratio: f32,
    /// Off-screen distance still requested, in density-independent pixels
    pub preload_margin: f32,
    /// Pixels per density-independent pixel
    pub density: f32,
    pub min_zoom: f32,
    pub mid_zoom: f32,
    pub max_zoom: f32,
    /// Gap between pages in pixels
    pub spacing: f32,
    pub auto_spacing: bool,
    pub fit_policy: FitPolicy,
    pub fit_each_page: bool,
    pub scroll_axis: ScrollAxis,
    /// Render with an alpha channel
    pub best_quality: bool,
    pub annotations: bool,
    pub night_mode: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_limit: 150,
            thumbnail_limit: 10,
            part_size: 384.0,
            thumbnail_ratio: 0.6,
            preload_margin: 30.0,
            density: 1.0,
            min_zoom: 1.0,
            mid_zoom: 1.75,
            max_zoom: 3.0,
            spacing: 0.0,
            auto_spacing: false,
            fit_policy: FitPolicy::Width,
            fit_each_page: false,
            scroll_axis: ScrollAxis::Vertical,
            best_quality: false,
            annotations: false,
            night_mode: false,
        }
    }
}

impl ViewerConfig {
    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `TILEVIEW_CACHE_LIMIT`, `TILEVIEW_THUMBNAIL_LIMIT`
    /// - `TILEVIEW_PART_SIZE`, `TILEVIEW_THUMBNAIL_RATIO`
    /// - `TILEVIEW_PRELOAD_MARGIN`, `TILEVIEW_DENSITY`
    /// - `TILEVIEW_MIN_ZOOM`, `TILEVIEW_MID_ZOOM`, `TILEVIEW_MAX_ZOOM`
    /// - `TILEVIEW_SPACING`, `TILEVIEW_AUTO_SPACING`
    /// - `TILEVIEW_FIT_POLICY` (`width`, `height`, `both`), `TILEVIEW_FIT_EACH_PAGE`
    /// - `TILEVIEW_SCROLL_AXIS` (`vertical`, `horizontal`)
    /// - `TILEVIEW_BEST_QUALITY`, `TILEVIEW_ANNOTATIONS`, `TILEVIEW_NIGHT_MODE`
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies any `TILEVIEW_*` environment variables to this configuration.
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable value.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        env_number("TILEVIEW_CACHE_LIMIT", &mut self.cache_limit)?;
        env_number("TILEVIEW_THUMBNAIL_LIMIT", &mut self.thumbnail_limit)?;
        env_number("TILEVIEW_PART_SIZE", &mut self.part_size)?;
        env_number("TILEVIEW_THUMBNAIL_RATIO", &mut self.thumbnail_ratio)?;
        env_number("TILEVIEW_PRELOAD_MARGIN", &mut self.preload_margin)?;
        env_number("TILEVIEW_DENSITY", &mut self.density)?;
        env_number("TILEVIEW_MIN_ZOOM", &mut self.min_zoom)?;
        env_number("TILEVIEW_MID_ZOOM", &mut self.mid_zoom)?;
        env_number("TILEVIEW_MAX_ZOOM", &mut self.max_zoom)?;
        env_number("TILEVIEW_SPACING", &mut self.spacing)?;
        env_flag("TILEVIEW_AUTO_SPACING", &mut self.auto_spacing)?;
        env_flag("TILEVIEW_FIT_EACH_PAGE", &mut self.fit_each_page)?;
        env_flag("TILEVIEW_BEST_QUALITY", &mut self.best_quality)?;
        env_flag("TILEVIEW_ANNOTATIONS", &mut self.annotations)?;
        env_flag("TILEVIEW_NIGHT_MODE", &mut self.night_mode)?;

        if let Some(value) = env_value("TILEVIEW_FIT_POLICY") {
            self.fit_policy = match value.to_ascii_lowercase().as_str() {
                "width" => FitPolicy::Width,
                "height" => FitPolicy::Height,
                "both" => FitPolicy::Both,
                _ => return Err(invalid_env("TILEVIEW_FIT_POLICY", value)),
            };
        }
        if let Some(value) = env_value("TILEVIEW_SCROLL_AXIS") {
            self.scroll_axis = match value.to_ascii_lowercase().as_str() {
                "vertical" => ScrollAxis::Vertical,
                "horizontal" => ScrollAxis::Horizontal,
                _ => return Err(invalid_env("TILEVIEW_SCROLL_AXIS", value)),
            };
        }
        Ok(self)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (every key optional):
    /// ```toml
    /// cache_limit = 150
    /// part_size = 384.0
    /// fit_policy = "both"
    /// scroll_axis = "horizontal"
    /// night_mode = true
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML for this structure.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Converts configuration to TOML format.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| Err(ConfigError::Invalid(message.to_owned()));

        if self.cache_limit < 1 {
            return fail("cache_limit must be at least 1");
        }
        if self.thumbnail_limit < 1 {
            return fail("thumbnail_limit must be at least 1");
        }
        if !(self.part_size > 0.0) {
            return fail("part_size must be positive");
        }
        if !(self.thumbnail_ratio > 0.0 && self.thumbnail_ratio <= 1.0) {
            return fail("thumbnail_ratio must be in (0, 1]");
        }
        if !(self.preload_margin >= 0.0) {
            return fail("preload_margin must not be negative");
        }
        if !(self.density > 0.0) {
            return fail("density must be positive");
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.mid_zoom && self.mid_zoom <= self.max_zoom) {
            return fail("zoom levels must satisfy 0 < min_zoom <= mid_zoom <= max_zoom");
        }
        if !(self.spacing >= 0.0) {
            return fail("spacing must not be negative");
        }
        Ok(())
    }

    /// Preload margin in pixels.
    pub fn preload_px(&self) -> f32 {
        self.preload_margin * self.density
    }

    pub fn zoom_levels(&self) -> ZoomLevels {
        ZoomLevels::new(self.min_zoom, self.mid_zoom, self.max_zoom)
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            fit_policy: self.fit_policy,
            fit_each_page: self.fit_each_page,
            auto_spacing: self.auto_spacing,
            spacing: self.spacing,
            axis: self.scroll_axis,
        }
    }

    pub fn quality(&self) -> RenderQuality {
        RenderQuality { best_quality: self.best_quality, annotations: self.annotations }
    }

    /// Sets the tile cache bound.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Sets the thumbnail bound.
    pub fn with_thumbnail_limit(mut self, limit: usize) -> Self {
        self.thumbnail_limit = limit;
        self
    }

    /// Sets the tile edge length in pixels.
    pub fn with_part_size(mut self, part_size: f32) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_thumbnail_ratio(mut self, ratio: f32) -> Self {
        self.thumbnail_ratio = ratio;
        self
    }

    /// Sets the preload margin (dp) and the display density.
    pub fn with_preload(mut self, margin: f32, density: f32) -> Self {
        self.preload_margin = margin;
        self.density = density;
        self
    }

    pub fn with_zoom_levels(mut self, min: f32, mid: f32, max: f32) -> Self {
        self.min_zoom = min;
        self.mid_zoom = mid;
        self.max_zoom = max;
        self
    }

    /// Sets fixed spacing, or auto spacing with `spacing` between slots.
    pub fn with_spacing(mut self, spacing: f32, auto_spacing: bool) -> Self {
        self.spacing = spacing;
        self.auto_spacing = auto_spacing;
        self
    }

    pub fn with_fit_policy(mut self, policy: FitPolicy, fit_each_page: bool) -> Self {
        self.fit_policy = policy;
        self.fit_each_page = fit_each_page;
        self
    }

    pub fn with_scroll_axis(mut self, axis: ScrollAxis) -> Self {
        self.scroll_axis = axis;
        self
    }

    pub fn with_quality(mut self, best_quality: bool, annotations: bool) -> Self {
        self.best_quality = best_quality;
        self.annotations = annotations;
        self
    }

    pub fn with_night_mode(mut self, enabled: bool) -> Self {
        self.night_mode = enabled;
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|value| value.trim().to_owned())
}

fn invalid_env(name: &str, value: String) -> ConfigError {
    ConfigError::InvalidEnv { name: name.to_owned(), value }
}

fn env_number<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Some(value) = env_value(name) {
        *target = value.parse().map_err(|_| invalid_env(name, value))?;
    }
    Ok(())
}

fn env_flag(name: &str, target: &mut bool) -> Result<(), ConfigError> {
    if let Some(value) = env_value(name) {
        *target = match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => return Err(invalid_env(name, value)),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_VARS: &[&str] = &[
        "TILEVIEW_CACHE_LIMIT",
        "TILEVIEW_THUMBNAIL_LIMIT",
        "TILEVIEW_PART_SIZE",
        "TILEVIEW_THUMBNAIL_RATIO",
        "TILEVIEW_PRELOAD_MARGIN",
        "TILEVIEW_DENSITY",
        "TILEVIEW_MIN_ZOOM",
        "TILEVIEW_MID_ZOOM",
        "TILEVIEW_MAX_ZOOM",
        "TILEVIEW_SPACING",
        "TILEVIEW_AUTO_SPACING",
        "TILEVIEW_FIT_POLICY",
        "TILEVIEW_FIT_EACH_PAGE",
        "TILEVIEW_SCROLL_AXIS",
        "TILEVIEW_BEST_QUALITY",
        "TILEVIEW_ANNOTATIONS",
        "TILEVIEW_NIGHT_MODE",
    ];

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in var_names {
                env::remove_var(name);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.cache_limit, 150);
        assert_eq!(config.thumbnail_limit, 10);
        assert_eq!(config.part_size, 384.0);
        assert_eq!(config.thumbnail_ratio, 0.6);
        assert_eq!(config.preload_margin, 30.0);
        assert_eq!(config.zoom_levels(), ZoomLevels::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ViewerConfig::default()
            .with_cache_limit(40)
            .with_thumbnail_limit(4)
            .with_part_size(256.0)
            .with_preload(20.0, 2.0)
            .with_spacing(8.0, true)
            .with_fit_policy(FitPolicy::Both, true)
            .with_scroll_axis(ScrollAxis::Horizontal)
            .with_quality(true, true)
            .with_night_mode(true);

        assert_eq!(config.cache_limit, 40);
        assert_eq!(config.thumbnail_limit, 4);
        assert_eq!(config.preload_px(), 40.0);
        assert_eq!(config.quality(), RenderQuality { best_quality: true, annotations: true });
        let options = config.layout_options();
        assert_eq!(options.fit_policy, FitPolicy::Both);
        assert!(options.fit_each_page && options.auto_spacing);
        assert_eq!(options.axis, ScrollAxis::Horizontal);
        assert!(config.night_mode);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            ViewerConfig::default().with_cache_limit(0),
            ViewerConfig::default().with_thumbnail_limit(0),
            ViewerConfig::default().with_part_size(0.0),
            ViewerConfig::default().with_thumbnail_ratio(1.5),
            ViewerConfig::default().with_preload(-1.0, 1.0),
            ViewerConfig::default().with_preload(30.0, 0.0),
            ViewerConfig::default().with_zoom_levels(2.0, 1.0, 3.0),
            ViewerConfig::default().with_spacing(-4.0, false),
            ViewerConfig::default().with_part_size(f32::NAN),
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ALL_VARS);

        env::set_var("TILEVIEW_CACHE_LIMIT", "64");
        env::set_var("TILEVIEW_PART_SIZE", "256");
        env::set_var("TILEVIEW_DENSITY", "2.5");
        env::set_var("TILEVIEW_AUTO_SPACING", "true");
        env::set_var("TILEVIEW_FIT_POLICY", "Both");
        env::set_var("TILEVIEW_SCROLL_AXIS", "horizontal");
        env::set_var("TILEVIEW_NIGHT_MODE", "1");

        let config = ViewerConfig::from_env().unwrap();
        assert_eq!(config.cache_limit, 64);
        assert_eq!(config.part_size, 256.0);
        assert_eq!(config.preload_px(), 75.0);
        assert!(config.auto_spacing);
        assert_eq!(config.fit_policy, FitPolicy::Both);
        assert_eq!(config.scroll_axis, ScrollAxis::Horizontal);
        assert!(config.night_mode);
        assert_eq!(config.thumbnail_limit, 10);
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ALL_VARS);

        env::set_var("TILEVIEW_CACHE_LIMIT", "lots");
        let err = ViewerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == "TILEVIEW_CACHE_LIMIT"));

        env::remove_var("TILEVIEW_CACHE_LIMIT");
        env::set_var("TILEVIEW_FIT_POLICY", "stretch");
        assert!(ViewerConfig::from_env().is_err());

        env::remove_var("TILEVIEW_FIT_POLICY");
        env::set_var("TILEVIEW_ANNOTATIONS", "maybe");
        assert!(ViewerConfig::from_env().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # Tileview configuration
            cache_limit = 80
            fit_policy = "height"
            night_mode = true
        "#;

        let config = ViewerConfig::from_toml(toml).unwrap();
        assert_eq!(config.cache_limit, 80);
        assert_eq!(config.fit_policy, FitPolicy::Height);
        assert!(config.night_mode);
        assert_eq!(config.part_size, 384.0);
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let result = ViewerConfig::from_toml("cache_limit = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ViewerConfig::default().with_cache_limit(33).with_scroll_axis(ScrollAxis::Horizontal);
        let toml = config.to_toml().unwrap();
        assert_eq!(ViewerConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tileview.toml");

        let config = ViewerConfig::default().with_part_size(512.0).with_night_mode(true);
        config.save_to_file(&path).unwrap();

        assert_eq!(ViewerConfig::from_file(&path).unwrap(), config);
        assert!(matches!(ViewerConfig::from_file(dir.path().join("missing.toml")), Err(ConfigError::Io(_))));
    }
}
