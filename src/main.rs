use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use eclipse_clouds::archive::{GridFetcher, HttpArchive};
use eclipse_clouds::cli::{Cli, Commands, FetchArgs, OutputFormat};
use eclipse_clouds::error::ForecastError;
use eclipse_clouds::info::{
    get_grib_info, print_file_info_csv, print_file_info_human, print_file_info_json,
    print_file_info_yaml,
};
use eclipse_clouds::input::ConfigFile;
use eclipse_clouds::log::{profile_echo, show_farewell_with_timing, show_greeting};
use eclipse_clouds::render::RenderOptions;
use eclipse_clouds::{fetch_forecast, run_forecast_map};
use log::{debug, error};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<ForecastError>()
                .map(ForecastError::kind)
                .unwrap_or("Error");
            error!("{}: {:#}", kind, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Map {
            profile,
            run,
            fetch,
            output_dir,
            width,
        } => {
            show_greeting(&cli.config);
            let config = ConfigFile::from_file(&cli.config)?;
            let profile = config.profile(&profile)?;
            profile_echo(profile);

            let model_run = run.resolve_run(Utc::now());
            let fetcher = build_fetcher(&fetch, quiet)?;
            let options = RenderOptions {
                width,
                ..RenderOptions::default()
            };
            let map = run_forecast_map(
                &fetcher,
                profile,
                model_run,
                run.target,
                &output_dir,
                &options,
            )
            .await?;
            println!("{}", map.display());
            show_farewell_with_timing(start_time.elapsed());
        }
        Commands::Fetch { run, fetch } => {
            let model_run = run.resolve_run(Utc::now());
            let fetcher = build_fetcher(&fetch, quiet)?;
            let (_, path) = fetch_forecast(&fetcher, model_run, run.target).await?;
            println!("{}", path.display());
        }
        Commands::Info {
            file,
            cloud_cover_only,
            format,
        } => {
            let info = get_grib_info(&file, cloud_cover_only).await?;
            match format {
                OutputFormat::Human => print_file_info_human(&info),
                OutputFormat::Json => print_file_info_json(&info)?,
                OutputFormat::Yaml => print_file_info_yaml(&info)?,
                OutputFormat::Csv => print_file_info_csv(&info)?,
            }
        }
        Commands::Validate {
            config_file,
            detailed,
        } => {
            let path = config_file.unwrap_or(cli.config);
            let config = ConfigFile::from_file(&path)
                .with_context(|| format!("Validation failed for {}", path.display()))?;
            println!(
                "{} is valid ({} profiles)",
                path.display(),
                config.profiles.len()
            );
            if detailed {
                for (key, profile) in &config.profiles {
                    let (west, east, south, north) = profile.bounds.edges();
                    println!(
                        "  {}: '{}' lon {}..{} lat {}..{}, {} markers, {} boundary layers{}",
                        key,
                        profile.name,
                        west,
                        east,
                        south,
                        north,
                        profile.markers.len(),
                        profile.boundaries.len(),
                        if profile.show_counties { ", counties" } else { "" }
                    );
                }
            }
        }
        Commands::Template { output, format } => {
            let content = ConfigFile::sample().to_format(format)?;
            write_output(output.as_deref(), content.as_bytes())?;
        }
        Commands::Completions { shell, output } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            let mut buffer = Vec::new();
            generate(shell, &mut command, name, &mut buffer);
            write_output(output.as_deref(), &buffer)?;
        }
    }
    Ok(())
}

fn build_fetcher(fetch: &FetchArgs, quiet: bool) -> Result<GridFetcher<HttpArchive>> {
    debug!(
        "Archive {} with a {}s timeout, caching in {}",
        fetch.archive_url,
        fetch.timeout,
        fetch.cache_dir.display()
    );
    let client = HttpArchive::new(fetch.timeout())?.with_progress(!(quiet || fetch.no_progress));
    Ok(GridFetcher::new(client, &fetch.cache_dir, &fetch.archive_url))
}

fn write_output(path: Option<&Path>, content: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(content)?;
            eprintln!("Wrote {}", path.display());
        }
        None => io::stdout().write_all(content)?,
    }
    Ok(())
}
