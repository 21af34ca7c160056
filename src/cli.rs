//! # CLI Module
//!
//! Command-line interface for eclipse-clouds:
//! - Argument parsing with clap
//! - Environment variable support with the ECLIPSE_CLOUDS_ prefix
//! - Subcommands for the map pipeline, downloads, inspection and config files
//! - Log level selection

use crate::archive::{DEFAULT_ARCHIVE_URL, DEFAULT_TIMEOUT_SECS};
use crate::input::ConfigFormat;
use crate::time::{
    ECLIPSE_TARGET, MODEL_RUN_FORMAT, ModelRun, closest_model_run, parse_model_run, parse_target,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// GFS cloud cover forecast maps for the 2024 total solar eclipse
#[derive(Parser, Debug)]
#[command(name = "eclipse-clouds")]
#[command(about = "Map the GFS total cloud cover forecast along the eclipse path")]
#[command(version)]
#[command(long_about = "
eclipse-clouds downloads the GFS 0.25 degree forecast that verifies at the time
of the 2024-04-08 total solar eclipse and draws its total cloud cover over a
configured region.

The most recent GFS run (00, 06, 12 or 18 UTC) is used unless --model-run is
given. Downloads are cached by run and forecast hour, so repeated calls for the
same run reuse the file.

EXAMPLES:
  # Map the 'conus' profile from config.json with the latest run
  eclipse-clouds map conus

  # Map a specific run
  eclipse-clouds map texas --model-run 20240401T0000

  # Only download the GRIB file
  eclipse-clouds fetch --model-run 20240401T1200 --cache-dir cache

  # Inspect a downloaded file
  eclipse-clouds info 2024040112168.grib --format json

  # Start a configuration
  eclipse-clouds template --format yaml -o config.yaml
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Profile configuration file (JSON or YAML)
    #[arg(
        short,
        long,
        global = true,
        env = "ECLIPSE_CLOUDS_CONFIG",
        default_value = "config.json"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the cloud cover map of a profile
    #[command(long_about = "
Resolve the model run and forecast hour, download the GRIB file if it is not
cached, crop it to the profile's bounding box and write {name}-f{hour}.jpg to
the output directory.

EXAMPLES:
  eclipse-clouds map conus
  eclipse-clouds map dallas --model-run 20240405T1800 --output-dir maps
")]
    Map {
        /// Profile key in the configuration file
        profile: String,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Directory the map is written to
        #[arg(long, env = "ECLIPSE_CLOUDS_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Map width in pixels
        #[arg(long, default_value_t = 1600, value_parser = clap::value_parser!(u32).range(16..=8000))]
        width: u32,
    },

    /// Download the GRIB file for a run without rendering
    Fetch {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Show the submessages of a GRIB2 file
    #[command(long_about = "
List the submessages of a downloaded GRIB2 file with their discipline,
parameter, product template and surface. The total cloud cover field the map
is drawn from is marked.

EXAMPLES:
  eclipse-clouds info 2024040100168.grib
  eclipse-clouds info 2024040100168.grib --cloud-cover-only --format yaml
")]
    Info {
        /// GRIB2 file path
        file: String,

        /// List only the total cloud cover field
        #[arg(long)]
        cloud_cover_only: bool,

        /// Output format for file information
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate (default: --config)
        config_file: Option<PathBuf>,

        /// Show every profile after validation
        #[arg(long)]
        detailed: bool,
    },

    /// Generate a sample configuration
    Template {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Which run to use and which instant to forecast
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Model run as YYYYMMDDThhmm (UTC, hour 00/06/12/18); default: latest run
    #[arg(long, env = "ECLIPSE_CLOUDS_MODEL_RUN", value_parser = parse_model_run_arg)]
    pub model_run: Option<ModelRun>,

    /// Forecasted instant (RFC 3339)
    #[arg(long, env = "ECLIPSE_CLOUDS_TARGET", default_value = ECLIPSE_TARGET, value_parser = parse_target_arg)]
    pub target: DateTime<Utc>,
}

impl RunArgs {
    /// The requested run, or the latest run at `now`
    pub fn resolve_run(&self, now: DateTime<Utc>) -> ModelRun {
        self.model_run.unwrap_or_else(|| closest_model_run(now))
    }
}

/// Where and how GRIB files are downloaded
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Directory holding downloaded GRIB files
    #[arg(long, env = "ECLIPSE_CLOUDS_CACHE_DIR", default_value = ".")]
    pub cache_dir: PathBuf,

    /// Base URL of the GFS production archive
    #[arg(long, env = "ECLIPSE_CLOUDS_ARCHIVE_URL", default_value = DEFAULT_ARCHIVE_URL)]
    pub archive_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "ECLIPSE_CLOUDS_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Hide the download progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl FetchArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// CSV format
    Csv,
}

impl Cli {
    /// Log level selected by the verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Error
        } else {
            LevelFilter::Info
        }
    }
}

fn parse_model_run_arg(s: &str) -> Result<ModelRun, String> {
    parse_model_run(s).map_err(|e| format!("{} (expected {})", e, MODEL_RUN_FORMAT))
}

fn parse_target_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_target(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;
    use std::sync::Mutex;

    // Global mutex to ensure environment variable tests run sequentially
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_parse_model_run_arg() {
        let run = parse_model_run_arg("20240401T1200").unwrap();
        assert_eq!(run.instant(), Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap());

        let err = parse_model_run_arg("20240401T1300").unwrap_err();
        assert!(err.contains("%Y%m%dT%H%M"));
        assert!(parse_model_run_arg("2024-04-01").is_err());
    }

    #[test]
    fn test_parse_target_arg() {
        let target = parse_target_arg(ECLIPSE_TARGET).unwrap();
        assert_eq!(target, Utc.with_ymd_and_hms(2024, 4, 8, 18, 0, 0).unwrap());
        assert!(parse_target_arg("next monday").is_err());
    }

    #[test]
    fn test_resolve_run() {
        let now = Utc.with_ymd_and_hms(2024, 4, 3, 14, 27, 5).unwrap();
        let latest = RunArgs {
            model_run: None,
            target: parse_target_arg(ECLIPSE_TARGET).unwrap(),
        };
        assert_eq!(
            latest.resolve_run(now).instant(),
            Utc.with_ymd_and_hms(2024, 4, 3, 12, 0, 0).unwrap()
        );

        let fixed = RunArgs {
            model_run: Some(parse_model_run_arg("20240401T0000").unwrap()),
            ..latest
        };
        assert_eq!(fixed.resolve_run(now), fixed.model_run.unwrap());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::parse_from(["eclipse-clouds", "-v", "template"]);
        assert_eq!(cli.log_level(), LevelFilter::Debug);
        let cli = Cli::parse_from(["eclipse-clouds", "--quiet", "template"]);
        assert_eq!(cli.log_level(), LevelFilter::Error);
        let cli = Cli::parse_from(["eclipse-clouds", "template"]);
        assert_eq!(cli.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_fetch_defaults() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from(["eclipse-clouds", "fetch"]);
        if let Commands::Fetch { run, fetch } = cli.command {
            assert!(run.model_run.is_none());
            assert_eq!(fetch.cache_dir, PathBuf::from("."));
            assert_eq!(fetch.archive_url, DEFAULT_ARCHIVE_URL);
            assert_eq!(fetch.timeout(), Duration::from_secs(600));
            assert!(!fetch.no_progress);
        } else {
            panic!("Expected Fetch command");
        }
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_TEST_MUTEX.lock().unwrap();

        unsafe {
            env::set_var("ECLIPSE_CLOUDS_CACHE_DIR", "/tmp/gfs-cache");
            env::set_var("ECLIPSE_CLOUDS_TIMEOUT", "30");
            env::set_var("ECLIPSE_CLOUDS_MODEL_RUN", "20240405T1800");
        }

        let cli = Cli::try_parse_from(["eclipse-clouds", "fetch"]);

        unsafe {
            env::remove_var("ECLIPSE_CLOUDS_CACHE_DIR");
            env::remove_var("ECLIPSE_CLOUDS_TIMEOUT");
            env::remove_var("ECLIPSE_CLOUDS_MODEL_RUN");
        }

        let cli = cli.unwrap();
        if let Commands::Fetch { run, fetch } = cli.command {
            assert_eq!(fetch.cache_dir, PathBuf::from("/tmp/gfs-cache"));
            assert_eq!(fetch.timeout, 30);
            assert_eq!(
                run.model_run.map(|r| r.instant()),
                Some(Utc.with_ymd_and_hms(2024, 4, 5, 18, 0, 0).unwrap())
            );
        } else {
            panic!("Expected Fetch command");
        }
    }

    #[test]
    fn test_help_example_file_matches_cache_name() {
        use crate::archive::cache_file_name;
        use crate::time::lead_hours_for_target;
        use clap::CommandFactory;

        let run = parse_model_run_arg("20240401T1200").unwrap();
        let target = parse_target_arg(ECLIPSE_TARGET).unwrap();
        let name = cache_file_name(run, lead_hours_for_target(run, target).unwrap());
        assert_eq!(name, "2024040112168.grib");

        let help = Cli::command()
            .get_long_about()
            .map(|about| about.to_string())
            .unwrap_or_default();
        assert!(help.contains(&format!("eclipse-clouds info {}", name)));
    }
}
