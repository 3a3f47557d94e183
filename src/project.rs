//! Project loading: animation directories on disk into a [`Bundle`].
//!
//! Every subdirectory of the project's source directory is one animation.
//! Its `*.png` files, sorted by file name, are the frames.

use crate::bundle::{AnimationSheet, Bundle, BundleError};
use crate::config::{resolve_path, PixelariaConfig};
use crate::models::{Animation, Frame};
use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error while turning a source tree into a bundle.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("source directory not found: {0}")]
    SourceDirMissing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid frame pattern '{pattern}': {source}")]
    Pattern { pattern: String, source: glob::PatternError },
    #[error("failed to list frames: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("failed to read frame {path}: {source}")]
    Image { path: PathBuf, source: image::ImageError },
    #[error("frame {path} of '{animation}' is {actual:?}, expected {expected:?}")]
    FrameSizeMismatch { animation: String, path: PathBuf, expected: (u32, u32), actual: (u32, u32) },
    #[error("sheet '{sheet}' references unknown animation '{animation}'")]
    UnknownAnimation { sheet: String, animation: String },
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// List the PNG frames of an animation directory, sorted by file name.
pub fn discover_frames(dir: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    let pattern = format!("{}/*.png", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob(&pattern).map_err(|source| ProjectError::Pattern { pattern: pattern.clone(), source })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read one animation directory, taking ids from `bundle`.
///
/// Returns `None` for a directory without frames. The animation is not added
/// to the bundle.
pub fn load_animation_dir(bundle: &mut Bundle, name: &str, dir: &Path) -> Result<Option<Animation>, ProjectError> {
    let files = discover_frames(dir)?;
    if files.is_empty() {
        return Ok(None);
    }

    let mut images = Vec::with_capacity(files.len());
    for path in &files {
        let image =
            image::open(path).map_err(|source| ProjectError::Image { path: path.clone(), source })?.to_rgba8();
        images.push(image);
    }

    let expected = images[0].dimensions();
    for (path, image) in files.iter().zip(&images) {
        if image.dimensions() != expected {
            return Err(ProjectError::FrameSizeMismatch {
                animation: name.to_string(),
                path: path.clone(),
                expected,
                actual: image.dimensions(),
            });
        }
    }

    let id = bundle.next_animation_id();
    let mut animation = Animation::new(id, name, expected.0, expected.1);
    for image in images {
        let frame_id = bundle.next_frame_id();
        animation.push_frame(Frame::new(frame_id, image));
    }

    debug!(animation = name, frames = animation.frame_count(), "loaded animation");
    Ok(Some(animation))
}

/// Build the bundle described by `config`, with paths relative to `root`.
#[tracing::instrument(skip_all, fields(project = %config.project.name))]
pub fn load_bundle(config: &PixelariaConfig, root: &Path) -> Result<Bundle, ProjectError> {
    let src_dir = resolve_path(root, &config.project.src);
    if !src_dir.is_dir() {
        return Err(ProjectError::SourceDirMissing(src_dir));
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(&src_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut bundle = Bundle::new(config.project.name.clone());
    for dir in dirs {
        let name = match dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        let Some(mut animation) = load_animation_dir(&mut bundle, &name, &dir)? else {
            warn!(animation = %name, "skipping directory without frames");
            continue;
        };

        if let Some(over) = config.animation_override(&name) {
            if let Some(fps) = over.fps {
                animation.fps = fps;
            }
            if let Some(frameskip) = over.frameskip {
                animation.frameskip = frameskip;
            }
        }
        bundle.add_animation(animation)?;
    }

    for over in &config.animations {
        if bundle.animation_by_name(&over.name).is_none() {
            warn!(animation = %over.name, "override for an animation that does not exist");
        }
    }

    if config.sheets.is_empty() {
        let mut sheet = AnimationSheet::new(0, config.project.name.clone()).with_settings(config.defaults.clone());
        for animation in bundle.animations() {
            sheet.add_animation(animation.id);
        }
        bundle.add_sheet(sheet);
    } else {
        for (index, sheet_config) in config.sheets.iter().enumerate() {
            let mut sheet = AnimationSheet::new(index as i32, sheet_config.name.clone())
                .with_settings(config.sheet_settings(sheet_config));
            for name in &sheet_config.animations {
                let animation = bundle.animation_by_name(name).ok_or_else(|| ProjectError::UnknownAnimation {
                    sheet: sheet_config.name.clone(),
                    animation: name.clone(),
                })?;
                sheet.add_animation(animation.id);
            }
            bundle.add_sheet(sheet);
        }
    }

    info!(animations = bundle.animations().len(), sheets = bundle.sheets().len(), "loaded project");
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32, value: u8) {
        std::fs::create_dir_all(dir).unwrap();
        RgbaImage::from_pixel(w, h, Rgba([value, 0, 0, 255])).save(dir.join(name)).unwrap();
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("animations");
        write_frame(&src.join("walk"), "02.png", 4, 4, 2);
        write_frame(&src.join("walk"), "01.png", 4, 4, 1);
        write_frame(&src.join("walk"), "10.png", 4, 4, 10);
        write_frame(&src.join("idle"), "a.png", 2, 3, 5);
        std::fs::create_dir_all(src.join("empty")).unwrap();
        temp
    }

    #[test]
    fn test_discover_frames_sorted_by_name() {
        let temp = project();
        let files = discover_frames(&temp.path().join("animations/walk")).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["01.png", "02.png", "10.png"]);
    }

    #[test]
    fn test_load_bundle_default_sheet() {
        let temp = project();
        let config = parse_config("[project]\nname = \"hero\"\n").unwrap();

        let bundle = load_bundle(&config, temp.path()).unwrap();

        let names: Vec<&str> = bundle.animations().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["idle", "walk"]);

        let walk = bundle.animation_by_name("walk").unwrap();
        assert_eq!(walk.frame_count(), 3);
        assert_eq!((walk.width, walk.height), (4, 4));
        let reds: Vec<u8> = walk.frames().iter().map(|f| f.composed().get_pixel(0, 0)[0]).collect();
        assert_eq!(reds, vec![1, 2, 10]);

        assert_eq!(bundle.sheets().len(), 1);
        assert_eq!(bundle.sheets()[0].name, "hero");
        assert_eq!(bundle.sheets()[0].animation_ids.len(), 2);
    }

    #[test]
    fn test_load_bundle_with_sheets_and_overrides() {
        let temp = project();
        let config = parse_config(
            r#"
[project]
name = "hero"

[[animation]]
name = "walk"
fps = 8
frameskip = false

[[sheet]]
name = "walking"
animations = ["walk"]

[sheet.settings]
x_padding = 2
"#,
        )
        .unwrap();

        let bundle = load_bundle(&config, temp.path()).unwrap();
        let walk = bundle.animation_by_name("walk").unwrap();
        assert_eq!(walk.fps, 8);
        assert!(!walk.frameskip);

        let sheet = &bundle.sheets()[0];
        assert_eq!(sheet.name, "walking");
        assert_eq!(sheet.animation_ids, vec![walk.id]);
        assert_eq!(sheet.settings.x_padding, 2);
    }

    #[test]
    fn test_unknown_sheet_animation() {
        let temp = project();
        let config =
            parse_config("[project]\nname = \"hero\"\n[[sheet]]\nname = \"s\"\nanimations = [\"run\"]\n").unwrap();

        let err = load_bundle(&config, temp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::UnknownAnimation { ref animation, .. } if animation == "run"));
    }

    #[test]
    fn test_frame_size_mismatch() {
        let temp = project();
        write_frame(&temp.path().join("animations/walk"), "03.png", 5, 4, 3);
        let config = parse_config("[project]\nname = \"hero\"\n").unwrap();

        let err = load_bundle(&config, temp.path()).unwrap_err();
        match err {
            ProjectError::FrameSizeMismatch { animation, expected, actual, .. } => {
                assert_eq!(animation, "walk");
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (5, 4));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let config = parse_config("[project]\nname = \"hero\"\n").unwrap();
        assert!(matches!(load_bundle(&config, temp.path()), Err(ProjectError::SourceDirMissing(_))));
    }
}
