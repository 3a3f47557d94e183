//! Export command: every sheet of a pixelaria.toml project

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, ConsoleProgress, JsonProgress, ParallelExport, ProgressReporter};
use crate::bundle::AnimationSheet;
use crate::config::{default_config, find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::project::load_bundle;

/// Run the export command
pub fn run_export(
    config_path: Option<&Path>,
    out: Option<&Path>,
    src: Option<&Path>,
    jobs: Option<usize>,
    sheet_filter: &[String],
    json_progress: bool,
    verbose: bool,
) -> ExitCode {
    let config_path = config_path.map(|p| p.to_path_buf()).or_else(find_config);

    let (config, project_root) = match config_path {
        Some(config_path) => {
            if verbose {
                eprintln!("Using config: {}", config_path.display());
            }
            let cfg = match load_config(Some(&config_path)) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Error loading config: {}", e);
                    return ExitCode::from(EXIT_ERROR);
                }
            };
            let root = config_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            (cfg, root)
        }
        None => {
            if verbose {
                eprintln!("No pixelaria.toml found, using defaults");
            }
            (default_config(), std::env::current_dir().unwrap_or_default())
        }
    };

    let mut config = config;
    let overrides =
        CliOverrides { out: out.map(|p| p.to_path_buf()), src: src.map(|p| p.to_path_buf()), jobs };
    merge_cli_overrides(&mut config, &overrides);

    let bundle = match load_bundle(&config, &project_root) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let sheets: Vec<AnimationSheet> = if sheet_filter.is_empty() {
        bundle.sheets().to_vec()
    } else {
        let unknown: Vec<&String> =
            sheet_filter.iter().filter(|name| !bundle.sheets().iter().any(|s| &s.name == *name)).collect();
        if !unknown.is_empty() {
            for name in unknown {
                eprintln!("Error: no sheet named '{}'", name);
            }
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        bundle.sheets().iter().filter(|s| sheet_filter.contains(&s.name)).cloned().collect()
    };

    let reporter: Arc<dyn ProgressReporter> = if json_progress {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(ConsoleProgress::new().with_verbose(verbose))
    };

    let context = BuildContext::new(config, project_root).with_verbose(verbose);
    let export = ParallelExport::new(context).with_reporter(reporter);

    match export.run_sheets(&bundle, &sheets) {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                if verbose {
                    for path in result.all_outputs() {
                        println!("  {}", path.display());
                    }
                }
                ExitCode::from(EXIT_SUCCESS)
            } else {
                eprintln!("{}", result.summary());
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => {
            eprintln!("Export error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
