use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use reelmix_core::config::{ConfigManager, ConfigSection};
use reelmix_core::logging::{init_tracing, LogLevel};
use reelmix_core::models::VolumePreset;
use reelmix_core::Assembler;

mod request;

use request::RequestFile;

const DEFAULT_CONFIG: &str = "reelmix.toml";

#[derive(Parser, Debug)]
#[command(name = "reelmix", version, about = "Assemble narrated slideshow videos")]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble one video from a JSON request file.
    Assemble(AssembleArgs),
    /// Write a settings file with every default filled in, or reset one
    /// section of an existing file.
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    /// Job request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Settings file (created with defaults if missing).
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Volume preset for requests without their own gains.
    #[arg(long)]
    preset: Option<VolumePreset>,

    /// Override the output folder.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Leave the job workspace on disk for inspection.
    #[arg(long, default_value_t = false)]
    keep_workspace: bool,
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    /// Where to write the settings file.
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Only restore this section's defaults; the rest of the file is kept.
    #[arg(long, value_name = "SECTION")]
    reset: Option<ConfigSection>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_verbosity(cli.verbose));

    let result = match cli.cmd {
        Command::Assemble(args) => cmd_assemble(args),
        Command::InitConfig(args) => cmd_init_config(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_assemble(args: AssembleArgs) -> anyhow::Result<()> {
    let mut manager = ConfigManager::new(&args.config);
    manager
        .load_or_create()
        .with_context(|| format!("load settings '{}'", args.config.display()))?;
    {
        let paths = &mut manager.settings_mut().paths;
        if let Some(dir) = &args.output_dir {
            paths.output_folder = dir.to_string_lossy().into_owned();
        }
        paths.keep_workspace |= args.keep_workspace;
    }
    manager
        .ensure_dirs_exist()
        .context("create output, temp and log folders")?;
    let settings = manager.into_settings();

    let default_volume = match args.preset {
        Some(preset) => preset.config(),
        None => settings.volume,
    };

    let base_dir = args.request.parent().unwrap_or_else(|| Path::new("."));
    let request = RequestFile::from_path(&args.request)?.into_request(base_dir, default_volume)?;
    tracing::info!(
        request = %args.request.display(),
        images = request.visuals.len(),
        optional_tracks = request.optional_track_count(),
        "assembling"
    );

    let outcome = Assembler::new(settings)
        .assemble(request)
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.category(), e))?;

    for dropped in &outcome.degradations.dropped {
        tracing::warn!(track = %dropped.track, reason = %dropped.reason, "{}", dropped.detail);
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    eprintln!("wrote {}", outcome.artifact.path.display());
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    let mut manager = ConfigManager::new(&args.config);
    match args.reset {
        Some(section) => {
            manager
                .update_section(section)
                .with_context(|| format!("reset [{}] in '{}'", section.table_name(), args.config.display()))?;
            eprintln!("reset [{}] in {}", section.table_name(), args.config.display());
        }
        None => {
            manager
                .save()
                .with_context(|| format!("write settings '{}'", args.config.display()))?;
            eprintln!("wrote {}", args.config.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assemble_flags_parse() {
        let cli = Cli::parse_from([
            "reelmix",
            "assemble",
            "--request",
            "job.json",
            "--preset",
            "cinematic",
            "--output-dir",
            "out",
            "--keep-workspace",
            "-vv",
        ]);

        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Command::Assemble(args) => {
                assert_eq!(args.request, PathBuf::from("job.json"));
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
                assert_eq!(args.preset, Some(VolumePreset::Cinematic));
                assert_eq!(args.output_dir, Some(PathBuf::from("out")));
                assert!(args.keep_workspace);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let result = Cli::try_parse_from(["reelmix", "assemble", "--request", "j.json", "--preset", "loud"]);
        assert!(result.is_err());
    }

    #[test]
    fn init_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        cmd_init_config(InitConfigArgs {
            config: path.clone(),
            reset: None,
        })
        .unwrap();

        let mut manager = ConfigManager::new(&path);
        manager.load().unwrap();
        assert_eq!(manager.settings().encode.terminal_hold_secs, 1.0);
    }

    #[test]
    fn reset_restores_one_section_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut manager = ConfigManager::new(&path);
        manager.settings_mut().encode.fps = 24;
        manager.settings_mut().paths.output_folder = "renders".to_string();
        manager.save().unwrap();

        let cli = Cli::parse_from([
            "reelmix",
            "init-config",
            "--config",
            path.to_str().unwrap(),
            "--reset",
            "encode",
        ]);
        match cli.cmd {
            Command::InitConfig(args) => {
                assert_eq!(args.reset, Some(ConfigSection::Encode));
                cmd_init_config(args).unwrap();
            }
            other => panic!("unexpected command {:?}", other),
        }

        let mut reloaded = ConfigManager::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().encode.fps, 30);
        assert_eq!(reloaded.settings().paths.output_folder, "renders");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = Cli::try_parse_from(["reelmix", "init-config", "--reset", "video"]);
        assert!(result.is_err());
    }
}
