use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::grid::{
    ControllerConfig, DEFAULT_BOX_SIZE, DEFAULT_BRACKET_EDGE, DEFAULT_CLASS_CAPACITY,
    DEFAULT_DRAG_THRESHOLD, DEFAULT_FAST_ZOOM_MAX_SCALE, DEFAULT_GAP, DEFAULT_HOVER_TOLERANCE,
    DEFAULT_MAX_CLASSES, DEFAULT_THUMBNAIL_SIZE, DEFAULT_VISIBLE_BUFFER, DEFAULT_WARMUP_BUFFER,
    DEFAULT_WORKERS, DEFAULT_ZOOM_LEVELS, GridOptions, Palette, ResolutionClass, SchedulerConfig,
    ThumbnailCache, ZoomLadder,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "thumbgrid";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxSize {
    pub width: u32,
    pub height: u32,
}

impl Default for BoxSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_BOX_SIZE.0,
            height: DEFAULT_BOX_SIZE.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub version: u32,
    /// Initial resolution class, the thumbnail height in pixels
    pub thumbnail_size: u32,
    pub zoom_levels: Vec<u32>,
    pub worker_count: usize,
    /// Rasters kept per resolution class
    pub class_capacity: usize,
    pub max_cached_classes: usize,
    pub fast_zoom_max_scale: f32,
    pub visible_buffer: usize,
    pub warmup_buffer: usize,
    pub warmup_delay_ms: u64,
    pub warmup_throttle_ms: u64,
    pub item_gap: i32,
    pub drag_threshold_px: i32,
    pub bracket_edge_px: i32,
    pub hover_tolerance_px: i32,
    pub continuous: bool,
    pub box_size: BoxSize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            zoom_levels: DEFAULT_ZOOM_LEVELS.to_vec(),
            worker_count: DEFAULT_WORKERS,
            class_capacity: DEFAULT_CLASS_CAPACITY,
            max_cached_classes: DEFAULT_MAX_CLASSES,
            fast_zoom_max_scale: DEFAULT_FAST_ZOOM_MAX_SCALE,
            visible_buffer: DEFAULT_VISIBLE_BUFFER,
            warmup_buffer: DEFAULT_WARMUP_BUFFER,
            warmup_delay_ms: 500,
            warmup_throttle_ms: 10,
            item_gap: DEFAULT_GAP,
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD,
            bracket_edge_px: DEFAULT_BRACKET_EDGE,
            hover_tolerance_px: DEFAULT_HOVER_TOLERANCE,
            continuous: false,
            box_size: BoxSize::default(),
        }
    }
}

impl GridConfig {
    /// `<config dir>/thumbgrid/config.yaml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {path:?} not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {path:?}");
        if config.version < CURRENT_VERSION {
            config.migrate();
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_yaml()?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, content).map_err(io_err)?;
        debug!("Saved config to {path:?}");
        Ok(())
    }

    pub fn migrate(&mut self) {
        info!(
            "Migrating config from v{} to v{}",
            self.version, CURRENT_VERSION
        );

        // Future migrations go here:
        // if self.version < 2 {
        //     migrate_v1_to_v2(self);
        // }

        self.version = CURRENT_VERSION;
    }

    #[must_use]
    pub fn zoom_ladder(&self) -> ZoomLadder {
        ZoomLadder::new(&self.zoom_levels)
    }

    /// A cache sized by this config
    #[must_use]
    pub fn cache(&self) -> ThumbnailCache {
        ThumbnailCache::new(self.class_capacity, self.max_cached_classes)
            .with_fast_zoom_max_scale(self.fast_zoom_max_scale)
    }

    #[must_use]
    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            zoom: self.zoom_ladder(),
            initial_class: ResolutionClass(self.thumbnail_size.max(1)),
            box_size: (self.box_size.width.max(1), self.box_size.height.max(1)),
            gap: self.item_gap.max(0),
            visible_buffer: self.visible_buffer,
            continuous: self.continuous,
            controller: ControllerConfig {
                drag_threshold: self.drag_threshold_px.max(0),
                bracket_edge: self.bracket_edge_px.max(0),
                hover_tolerance: self.hover_tolerance_px.max(0),
            },
            scheduler: SchedulerConfig {
                workers: self.worker_count.max(1),
                warmup_buffer: self.warmup_buffer,
                warmup_delay: Duration::from_millis(self.warmup_delay_ms),
                warmup_throttle: Duration::from_millis(self.warmup_throttle_ms),
            },
            palette: Palette::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = GridConfig::from_yaml("worker_count: 2\ncontinuous: true\n").unwrap();
        assert_eq!(config.worker_count, 2);
        assert!(config.continuous);
        assert_eq!(config.class_capacity, DEFAULT_CLASS_CAPACITY);
        assert_eq!(config.zoom_levels, DEFAULT_ZOOM_LEVELS.to_vec());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(GridConfig::from_yaml("  \n").unwrap(), GridConfig::default());
    }

    #[test]
    fn old_version_is_migrated() {
        let mut config = GridConfig::from_yaml("version: 0\n").unwrap();
        config.migrate();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn options_clamp_nonsense() {
        let config = GridConfig {
            worker_count: 0,
            item_gap: -4,
            thumbnail_size: 0,
            ..GridConfig::default()
        };
        let options = config.grid_options();
        assert_eq!(options.scheduler.workers, 1);
        assert_eq!(options.gap, 0);
        assert_eq!(options.initial_class, ResolutionClass(1));
    }
}
