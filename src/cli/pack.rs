//! Pack command: ad-hoc sheet from animation directories

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::atlas::SheetExportSettings;
use crate::build::export_sheet;
use crate::bundle::{AnimationSheet, Bundle};
use crate::project::load_animation_dir;

/// Run the pack command
pub fn run_pack(dirs: &[PathBuf], output: &Path, settings: &SheetExportSettings) -> ExitCode {
    for dir in dirs {
        if !dir.is_dir() {
            eprintln!("Error: not a directory: {}", dir.display());
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    }

    // `hero.png` and `hero` name the same output
    let base = if output.extension().is_some_and(|e| e.eq_ignore_ascii_case("png")) {
        output.with_extension("")
    } else {
        output.to_path_buf()
    };
    let sheet_name =
        base.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "sheet".to_string());

    let mut bundle = Bundle::new(sheet_name.clone());
    let mut sheet = AnimationSheet::new(0, sheet_name).with_settings(settings.clone());

    for dir in dirs {
        let name = animation_name(dir);
        match load_animation_dir(&mut bundle, &name, dir) {
            Ok(Some(animation)) => {
                sheet.add_animation(animation.id);
                if let Err(e) = bundle.add_animation(animation) {
                    eprintln!("Error: {}", e);
                    return ExitCode::from(EXIT_ERROR);
                }
            }
            Ok(None) => eprintln!("Warning: no PNG frames in {}", dir.display()),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    match export_sheet(&bundle, &sheet, &base, &mut |_| {}) {
        Ok(result) => {
            println!(
                "Packed {} frames ({} reused) into {}x{}",
                result.frame_count, result.reused_frames, result.dimensions.0, result.dimensions.1
            );
            for path in &result.outputs {
                println!("  {}", path.display());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Animation name for a directory argument such as `art/walk/`.
fn animation_name(dir: &Path) -> String {
    dir.components()
        .next_back()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_else(|| "animation".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_name() {
        assert_eq!(animation_name(Path::new("art/walk")), "walk");
        assert_eq!(animation_name(Path::new("art/walk/")), "walk");
        assert_eq!(animation_name(Path::new("idle")), "idle");
    }
}
