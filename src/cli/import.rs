//! Import command: slice an exported sheet back into frame files

use std::path::Path;
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::export::load_sheet;

/// Run the import command
pub fn run_import(input: &Path, output: &Path) -> ExitCode {
    if !input.is_file() {
        eprintln!("Error: descriptor not found: {}", input.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let animations = match load_sheet(input) {
        Ok(animations) => animations,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut written = 0;
    for animation in &animations {
        let dir = output.join(&animation.name);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Error: failed to create {}: {}", dir.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }

        for (index, frame) in animation.frames.iter().enumerate() {
            let path = dir.join(format!("{:03}.png", index));
            if let Err(e) = frame.save(&path) {
                eprintln!("Error: failed to write {}: {}", path.display(), e);
                return ExitCode::from(EXIT_ERROR);
            }
            written += 1;
        }
        println!(
            "{}: {} frames, {}x{} @ {} fps",
            animation.name,
            animation.frames.len(),
            animation.width,
            animation.height,
            animation.fps
        );
    }

    println!("Wrote {} frames to {}", written, output.display());
    ExitCode::from(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_import_refuses_to_leave_output_dir() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])).save(input.join("sheet.png")).unwrap();
        let json = r#"{
            "sprite_image": "sheet.png",
            "animations": [{
                "name": "../escape", "width": 2, "height": 2, "fps": 8, "frameskip": true,
                "frames": [{ "sheet": {"x":0,"y":0,"width":2,"height":2},
                             "frame": {"x":0,"y":0,"width":2,"height":2} }]
            }]
        }"#;
        std::fs::write(input.join("sheet.json"), json).unwrap();

        let output = temp.path().join("out");
        let _ = run_import(&input.join("sheet.json"), &output);

        assert!(!temp.path().join("escape").exists());
        assert!(!output.exists());
    }
}
