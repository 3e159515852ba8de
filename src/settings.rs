use anyhow::Result;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;

/// Minimum direction-vector length (in geometry units) to be considered non-degenerate.
pub const VEC_LENGTH_THRESHOLD: f32 = 1e-4;
/// Minimum horizontal magnitude of an aiming direction before the yaw stage is skipped.
pub const HORIZONTAL_EPSILON: f32 = 1e-4;
/// Steering-angle thresholds (degrees) reported per height summary.
pub const STEERING_THRESHOLDS: [f32; 3] = [15.0, 20.0, 25.0];
/// Draw attempts allowed per requested link before the generator gives up.
pub const LINK_ATTEMPT_FACTOR: usize = 50;

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub wavelength: f32,
    pub beam_waist: f32,
    pub steering_tolerance: f32,
    /// Target structural heights for the sweep. Empty means single-height mode.
    #[serde(default)]
    pub heights: Vec<f32>,
    pub link_count: usize,
    #[serde(default = "default_unique_links")]
    pub unique_links: bool,
    pub seed: Option<u64>,
    /// Restrict interference candidates to shapes in this sub-group per transceiver.
    #[serde(default)]
    pub aperture_filter: Option<String>,
    #[serde(default = "default_category_mask")]
    pub category_mask: u32,
    #[serde(default)]
    pub early_exit: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    pub scene_name: String,
    #[serde(default = "default_directory")]
    pub directory: String,
}

fn default_unique_links() -> bool {
    true
}

fn default_category_mask() -> u32 {
    u32::MAX
}

fn default_top_k() -> usize {
    10
}

fn default_directory() -> String {
    ".".to_string()
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root();
    let default_config_file = root.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    validate_config(&config);

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root();

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        println!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        println!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("beamlink"))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let mut config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    // Parse command-line arguments and override values
    let args = CliArgs::parse();

    if let Some(wavelength) = args.w {
        config.wavelength = wavelength;
    }
    if let Some(waist) = args.waist {
        config.beam_waist = waist;
    }
    if let Some(tol) = args.tol {
        config.steering_tolerance = tol;
    }
    if let Some(heights) = args.heights {
        config.heights = heights;
    }
    if let Some(links) = args.links {
        config.link_count = links;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(scene) = args.scene {
        config.scene_name = scene;
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if args.early_exit {
        config.early_exit = true;
    }

    validate_config(&config);

    println!("{}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the BEAMLINK_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
/// If none of these methods work, the function will panic.
fn retrieve_project_root() -> std::path::PathBuf {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        std::path::PathBuf::from(manifest_dir)
    } else if let Ok(path) = env::var("BEAMLINK_ROOT_DIR") {
        // Allow explicit configuration via environment variable
        std::path::PathBuf::from(path)
    } else {
        // Fallback: walk upward from the executable directory until a
        // directory containing a "config" subdirectory is found
        let exe_path = env::current_exe().expect("Failed to get current executable path");
        let mut current_dir = exe_path
            .parent()
            .expect("Failed to get executable directory")
            .to_path_buf();
        let mut found = false;

        while !found && current_dir.parent().is_some() {
            if current_dir.join("config").is_dir() {
                found = true;
            } else {
                current_dir = current_dir.parent().unwrap().to_path_buf();
            }
        }

        if found {
            current_dir
        } else {
            panic!("Could not find project root directory");
        }
    }
}

fn validate_config(config: &Settings) {
    assert!(config.wavelength > 0.0, "Wavelength must be greater than 0");
    assert!(config.beam_waist > 0.0, "Beam waist must be greater than 0");
    assert!(
        config.steering_tolerance >= 0.0,
        "Steering tolerance must not be negative"
    );
    assert!(
        config.heights.iter().all(|h| h.is_finite()),
        "Target heights must be finite"
    );
}

#[derive(Parser, Debug)]
#[command(version, about = "beamlink - reflected line-of-sight link evaluation")]
pub struct CliArgs {
    /// Wavelength in units of the geometry.
    #[arg(short, long)]
    w: Option<f32>,

    /// Beam waist radius at the aperture, in units of the geometry.
    #[arg(long)]
    waist: Option<f32>,

    /// Steering tolerance in degrees for the specular classification.
    #[arg(long)]
    tol: Option<f32>,

    /// Target structural heights to sweep, separated by spaces.
    /// Omit to evaluate only the current assembly height.
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    heights: Option<Vec<f32>>,

    /// Number of links to sample for the interference run.
    #[arg(short, long)]
    links: Option<usize>,

    /// Random seed for link sampling.
    #[arg(short, long)]
    seed: Option<u64>,

    /// File path to the scene layout describing transceivers and the
    /// reflecting assembly.
    #[arg(long)]
    scene: Option<String>,

    /// Output directory for reports.
    #[arg(long)]
    dir: Option<String>,

    /// Stop each segment check at the first confirmed interferer.
    #[arg(long)]
    early_exit: bool,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Wavelength: {:.6}
  - Beam Waist: {:.6}
  - Steering Tolerance: {:.2} deg
  - Heights: {:?}
  - Link Count: {}
  - Unique Links: {}
  - Seed: {:?}
  - Scene: {}
  ",
            self.wavelength,
            self.beam_waist,
            self.steering_tolerance,
            self.heights,
            self.link_count,
            self.unique_links,
            self.seed,
            self.scene_name,
        )
    }
}
