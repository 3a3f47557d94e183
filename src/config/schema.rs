//! Configuration schema types for `pixelaria.toml`
//!
//! Defines the structure and validation rules for a sprite sheet project.

use crate::atlas::SheetExportSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Directory holding one subdirectory of PNG frames per animation
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Output directory for sheets and descriptors
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("animations")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Per-animation playback overrides, matched by animation name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationOverride {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frameskip: Option<bool>,
}

/// Partial export settings; set fields replace the project defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_padding_on_json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_padding: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_padding: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reuse_identical_frames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_power_of_two: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_minimum_dimensions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_precision_area_matching: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_unordered_frames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_uniform_grid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favor_ratio_over_area: Option<bool>,
}

impl SettingsOverride {
    /// Apply the set fields on top of `base`.
    pub fn apply(&self, base: &SheetExportSettings) -> SheetExportSettings {
        SheetExportSettings {
            export_json: self.export_json.unwrap_or(base.export_json),
            use_padding_on_json: self.use_padding_on_json.unwrap_or(base.use_padding_on_json),
            x_padding: self.x_padding.unwrap_or(base.x_padding),
            y_padding: self.y_padding.unwrap_or(base.y_padding),
            reuse_identical_frames: self.reuse_identical_frames.unwrap_or(base.reuse_identical_frames),
            force_power_of_two: self.force_power_of_two.unwrap_or(base.force_power_of_two),
            force_minimum_dimensions: self.force_minimum_dimensions.unwrap_or(base.force_minimum_dimensions),
            high_precision_area_matching: self
                .high_precision_area_matching
                .unwrap_or(base.high_precision_area_matching),
            allow_unordered_frames: self.allow_unordered_frames.unwrap_or(base.allow_unordered_frames),
            use_uniform_grid: self.use_uniform_grid.unwrap_or(base.use_uniform_grid),
            favor_ratio_over_area: self.favor_ratio_over_area.unwrap_or(base.favor_ratio_over_area),
        }
    }
}

/// One exported sprite sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Sheet name; also the output file stem
    pub name: String,
    /// Names of the animations packed into this sheet, in order
    pub animations: Vec<String>,
    #[serde(default)]
    pub settings: SettingsOverride,
}

/// Batch export settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Number of sheets exported concurrently (defaults to the CPU count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

/// Complete pixelaria.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelariaConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Export settings shared by every sheet
    #[serde(default)]
    pub defaults: SheetExportSettings,
    /// Animation overrides
    #[serde(default, rename = "animation")]
    pub animations: Vec<AnimationOverride>,
    /// Sheet definitions; when empty every animation goes into one sheet
    #[serde(default, rename = "sheet")]
    pub sheets: Vec<SheetConfig>,
    #[serde(default)]
    pub build: BuildConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "sheet[0].animations")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pixelaria.toml: '{}' {}", self.field, self.message)
    }
}

impl PixelariaConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() });
        };

        if self.project.name.is_empty() {
            push("project.name".to_string(), "must be a non-empty string");
        }

        for (i, animation) in self.animations.iter().enumerate() {
            if animation.name.is_empty() {
                push(format!("animation[{}].name", i), "must be a non-empty string");
            }
            if animation.fps == Some(0) {
                push(format!("animation[{}].fps", i), "must be a positive integer");
            }
        }

        let mut sheet_names = HashSet::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            if sheet.name.is_empty() {
                push(format!("sheet[{}].name", i), "must be a non-empty string");
            } else if !sheet_names.insert(sheet.name.as_str()) {
                push(format!("sheet[{}].name", i), "must be unique");
            }
            if sheet.animations.is_empty() {
                push(format!("sheet[{}].animations", i), "must name at least one animation");
            }
        }

        if self.build.jobs == Some(0) {
            push("build.jobs".to_string(), "must be a positive integer");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Override entry for an animation, if any
    pub fn animation_override(&self, name: &str) -> Option<&AnimationOverride> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Effective export settings for a sheet
    pub fn sheet_settings(&self, sheet: &SheetConfig) -> SheetExportSettings {
        sheet.settings.apply(&self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let toml = r#"
[project]
name = "test-project"
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.name, "test-project");
        assert_eq!(config.project.src, PathBuf::from("animations"));
        assert_eq!(config.project.out, PathBuf::from("build"));
        assert_eq!(config.defaults, SheetExportSettings::default());
        assert!(config.sheets.is_empty());
        assert!(config.build.jobs.is_none());
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[project]
name = "hero"
src = "art"
out = "dist"

[defaults]
x_padding = 2
y_padding = 2
force_power_of_two = true

[[animation]]
name = "walk"
fps = 12
frameskip = false

[[sheet]]
name = "characters"
animations = ["walk", "idle"]

[sheet.settings]
force_power_of_two = false
reuse_identical_frames = false

[[sheet]]
name = "effects"
animations = ["spark"]

[build]
jobs = 3
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.project.src, PathBuf::from("art"));
        assert_eq!(config.defaults.x_padding, 2);
        assert!(config.defaults.force_power_of_two);
        assert!(config.defaults.export_json);

        let walk = config.animation_override("walk").unwrap();
        assert_eq!(walk.fps, Some(12));
        assert_eq!(walk.frameskip, Some(false));
        assert!(config.animation_override("idle").is_none());

        assert_eq!(config.sheets.len(), 2);
        let characters = config.sheet_settings(&config.sheets[0]);
        assert!(!characters.force_power_of_two);
        assert!(!characters.reuse_identical_frames);
        assert_eq!(characters.x_padding, 2);

        let effects = config.sheet_settings(&config.sheets[1]);
        assert!(effects.force_power_of_two);
        assert!(effects.reuse_identical_frames);

        assert_eq!(config.build.jobs, Some(3));
        assert!(config.is_valid());
    }

    #[test]
    fn test_unknown_sheet_setting_rejected() {
        let toml = r#"
[project]
name = "test"

[[sheet]]
name = "a"
animations = ["x"]

[sheet.settings]
no_such_setting = true
"#;
        assert!(toml::from_str::<PixelariaConfig>(toml).is_err());
    }

    #[test]
    fn test_validation_empty_name() {
        let toml = r#"
[project]
name = ""
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.name"));
    }

    #[test]
    fn test_validation_zero_fps() {
        let toml = r#"
[project]
name = "test"

[[animation]]
name = "walk"
fps = 0
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "animation[0].fps"));
    }

    #[test]
    fn test_validation_sheets() {
        let toml = r#"
[project]
name = "test"

[[sheet]]
name = "a"
animations = []

[[sheet]]
name = "a"
animations = ["walk"]
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "sheet[0].animations"));
        assert!(errors.iter().any(|e| e.field == "sheet[1].name" && e.message == "must be unique"));
    }

    #[test]
    fn test_validation_zero_jobs() {
        let toml = r#"
[project]
name = "test"

[build]
jobs = 0
"#;
        let config: PixelariaConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "pixelaria.toml: 'build.jobs' must be a positive integer");
    }

    #[test]
    fn test_settings_override_apply() {
        let base = SheetExportSettings { x_padding: 4, ..Default::default() };
        let over = SettingsOverride { y_padding: Some(6), use_uniform_grid: Some(true), ..Default::default() };

        let merged = over.apply(&base);
        assert_eq!(merged.x_padding, 4);
        assert_eq!(merged.y_padding, 6);
        assert!(merged.use_uniform_grid);
        assert_eq!(SettingsOverride::default().apply(&base), base);
    }
}
