//! `kiln build` command implementation.

use kiln_core::bundler::{BuildError, BuildOutcome, BuildStats};
use kiln_core::version::STATS_SCHEMA_VERSION;
use kiln_core::{BuildConfig, Bundler, Mode};
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    /// Explicit config file (defaults to `kiln.config.json` in `cwd`).
    pub config: Option<PathBuf>,
    pub mode: Option<Mode>,
    /// Output directory override.
    pub out: Option<PathBuf>,
    /// Force `output.clean`.
    pub clean: bool,
}

/// Successful build, for JSON output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildResultJson {
    ok: bool,
    #[serde(flatten)]
    stats: BuildStats,
    written: Vec<String>,
    modules: usize,
    duration_ms: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildErrorJson {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
}

/// Failed build, for JSON output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildErrorResult {
    schema_version: u32,
    ok: bool,
    error: BuildErrorJson,
}

/// Run the build command.
pub fn run(action: BuildAction, json: bool) -> Result<()> {
    let config = match configure(&action) {
        Ok(config) => config,
        Err(e) => fail(
            BuildErrorJson {
                code: e.code().to_string(),
                message: e.to_string(),
                path: None,
                stage: None,
            },
            json,
        ),
    };

    let bundler = match Bundler::new(config) {
        Ok(bundler) => bundler,
        Err(e) => fail(
            BuildErrorJson {
                code: e.code().to_string(),
                message: e.to_string(),
                path: None,
                stage: None,
            },
            json,
        ),
    };

    match bundler.build() {
        Ok(outcome) => {
            if json {
                print_json(&BuildResultJson {
                    ok: true,
                    stats: BuildStats::collect(bundler.config(), &outcome.graph, &outcome.compilation),
                    written: outcome.emitted.written.clone(),
                    modules: outcome.graph.len(),
                    duration_ms: outcome.duration.as_millis() as u64,
                });
            } else {
                print_human_output(bundler.config(), &outcome);
            }
            Ok(())
        }
        Err(e) => fail(error_json(&e), json),
    }
}

fn configure(action: &BuildAction) -> Result<BuildConfig, kiln_core::Error> {
    let mut config = BuildConfig::load(&action.cwd, action.config.as_deref(), action.mode)?;
    if let Some(out) = &action.out {
        let dir = if out.is_absolute() {
            out.clone()
        } else {
            config.root.join(out)
        };
        config = config.with_output_dir(dir);
    }
    if action.clean {
        config.output.clean = true;
    }
    Ok(config)
}

fn error_json(err: &BuildError) -> BuildErrorJson {
    BuildErrorJson {
        code: err.code().to_string(),
        message: err.to_string(),
        path: err.path().map(|p| p.display().to_string()),
        stage: err.stage().map(str::to_string),
    }
}

fn fail(error: BuildErrorJson, json: bool) -> ! {
    if json {
        print_json(&BuildErrorResult {
            schema_version: STATS_SCHEMA_VERSION,
            ok: false,
            error,
        });
    } else {
        eprintln!("error: {}: {}", error.code, error.message);
        match (&error.path, &error.stage) {
            (Some(path), Some(stage)) => eprintln!("  at {path} [{stage}]"),
            (Some(path), None) => eprintln!("  at {path}"),
            _ => {}
        }
    }
    std::process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("error: failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}

fn print_human_output(config: &BuildConfig, outcome: &BuildOutcome) {
    let out = config
        .output
        .dir
        .strip_prefix(&config.root)
        .unwrap_or(&config.output.dir);

    println!("  kiln build ({})", config.mode);
    println!();
    for chunk in &outcome.compilation.chunks {
        println!(
            "  {}/{:<40} {:>8}  {} [{}]",
            out.display(),
            chunk.file,
            format_size(chunk.size),
            chunk.name,
            chunk.kind.as_str()
        );
        if let Some(style) = &chunk.style_file {
            println!("  {}/{}", out.display(), style);
        }
    }
    println!();
    println!(
        "  {} modules, {} files in {}ms",
        outcome.graph.len(),
        outcome.emitted.written.len(),
        outcome.duration.as_millis()
    );
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}
