use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sra_manifest_curator::api::{CuratorApi, CuratorHttpApi};
use sra_manifest_curator::config::{ConfigLoader, ResolvedConfig};
use sra_manifest_curator::controller::Controller;
use sra_manifest_curator::domain::{Database, Run, RunAccession, StagedStudy, StudyAccession};
use sra_manifest_curator::error::CuratorError;
use sra_manifest_curator::output::{JsonOutput, OutputMode};
use sra_manifest_curator::tui::Tui;

#[derive(Parser)]
#[command(name = "sra-curator")]
#[command(about = "Search NCBI SRA/GEO, stage runs, and curate import manifests for HOX")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search studies in SRA or GEO DataSets")]
    Search(SearchArgs),
    #[command(about = "Show full metadata for one study")]
    Study(StudyArgs),
    #[command(about = "List runs for a study")]
    Runs(RunsArgs),
    #[command(about = "Resolve download URLs for a run or study")]
    Files(FilesArgs),
    #[command(about = "Manage import manifests")]
    Manifests(ManifestsArgs),
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    #[arg(long, value_enum)]
    database: Option<Database>,

    #[arg(long)]
    organism: Option<String>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    year: Option<String>,
}

#[derive(Args)]
struct StudyArgs {
    accession: String,
}

#[derive(Args)]
struct RunsArgs {
    accession: String,
}

#[derive(Args)]
struct FilesArgs {
    accession: String,
}

#[derive(Args)]
struct ManifestsArgs {
    #[command(subcommand)]
    command: ManifestsCommand,
}

#[derive(Subcommand)]
enum ManifestsCommand {
    #[command(about = "List manifests known to the backend")]
    List {
        #[arg(long)]
        name: Option<String>,
    },
    #[command(about = "Create a manifest from staged studies")]
    Create(CreateArgs),
    #[command(about = "Approve a pending manifest")]
    Approve { name: String },
    #[command(about = "Start the HOX import for an approved manifest")]
    Import(ImportArgs),
    #[command(about = "Show import progress")]
    Status {
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    description: String,

    /// Repeatable. `SRP000001` stages every run of the study;
    /// `SRP000001:SRR001,SRR002` stages only the named runs.
    #[arg(long = "study", required = true)]
    studies: Vec<String>,

    #[arg(long)]
    tags: Option<String>,
}

#[derive(Args)]
struct ImportArgs {
    name: String,

    #[arg(long)]
    set_name: Option<String>,

    #[arg(long)]
    profile: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(curator) = report.downcast_ref::<CuratorError>() {
            return ExitCode::from(map_exit_code(curator));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CuratorError) -> u8 {
    match error {
        CuratorError::InvalidStudyAccession(_)
        | CuratorError::InvalidRunAccession(_)
        | CuratorError::InvalidDatabase(_)
        | CuratorError::Validation(_)
        | CuratorError::ConfigRead(_)
        | CuratorError::ConfigParse(_) => 2,
        CuratorError::ApiHttp(_) | CuratorError::ApiStatus { .. } | CuratorError::ApiDecode(_) => 3,
        CuratorError::Terminal(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut resolved = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    if let Some(base_url) = cli.base_url {
        resolved.base_url = base_url.trim_end_matches('/').to_string();
    }
    let api = CuratorHttpApi::new(&resolved.base_url).into_diagnostic()?;

    match cli.command {
        Some(command) => run_command(command, api, &resolved),
        None => match output_mode {
            OutputMode::Interactive => run_tui(api, resolved),
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `sra-curator --help`)",
            )),
        },
    }
}

fn run_tui(api: CuratorHttpApi, resolved: ResolvedConfig) -> miette::Result<()> {
    let mut controller = Controller::new(
        api,
        resolved.organism.clone(),
        resolved.limit,
        resolved.profile.clone(),
    );
    controller.state_mut().database = resolved.database;
    let mut tui = Tui::new(controller, resolved.year);
    tui.run()
}

fn run_command(
    command: Commands,
    api: CuratorHttpApi,
    resolved: &ResolvedConfig,
) -> miette::Result<()> {
    match command {
        Commands::Search(args) => {
            let database = args.database.unwrap_or(resolved.database);
            let organism = args.organism.as_deref().unwrap_or(&resolved.organism);
            let limit = args.limit.unwrap_or(resolved.limit).min(100);
            let year = args.year.as_deref().or(resolved.year.as_deref());
            let result = api
                .search(&args.query, database, organism, limit, year)
                .into_diagnostic()?;
            JsonOutput::print_search(&result).into_diagnostic()
        }
        Commands::Study(args) => {
            let accession: StudyAccession = args.accession.parse().into_diagnostic()?;
            let result = api.study_info(accession.as_str()).into_diagnostic()?;
            JsonOutput::print_value(&result).into_diagnostic()
        }
        Commands::Runs(args) => {
            let accession: StudyAccession = args.accession.parse().into_diagnostic()?;
            let result = api.list_runs(accession.as_str()).into_diagnostic()?;
            JsonOutput::print_runs(&result).into_diagnostic()
        }
        Commands::Files(args) => {
            // Runs and studies are both accepted here; the backend resolves
            // either to concrete file URLs.
            let accession = args.accession.trim().to_uppercase();
            if accession.parse::<RunAccession>().is_err() {
                accession
                    .parse::<StudyAccession>()
                    .into_diagnostic()?;
            }
            let result = api.file_urls(&accession).into_diagnostic()?;
            JsonOutput::print_value(&result).into_diagnostic()
        }
        Commands::Manifests(args) => run_manifests(args.command, api, resolved),
    }
}

fn run_manifests(
    command: ManifestsCommand,
    api: CuratorHttpApi,
    resolved: &ResolvedConfig,
) -> miette::Result<()> {
    match command {
        ManifestsCommand::List { name } => {
            let result = api.list_manifests(name.as_deref()).into_diagnostic()?;
            JsonOutput::print_manifests(&result).into_diagnostic()
        }
        ManifestsCommand::Create(args) => {
            if args.name.trim().is_empty() {
                return Err(CuratorError::Validation("Manifest name is required.".to_string()))
                    .into_diagnostic();
            }
            if args.description.trim().is_empty() {
                return Err(CuratorError::Validation("Description is required.".to_string()))
                    .into_diagnostic();
            }
            let staged = stage_from_args(&api, &args.studies)?;
            let result = api
                .create_manifest(
                    args.name.trim(),
                    args.description.trim(),
                    &staged,
                    args.tags.as_deref(),
                )
                .into_diagnostic()?;
            JsonOutput::print_create(&result).into_diagnostic()
        }
        ManifestsCommand::Approve { name } => {
            let result = api.approve_manifest(&name).into_diagnostic()?;
            JsonOutput::print_approve(&result).into_diagnostic()
        }
        ManifestsCommand::Import(args) => {
            let profile = args.profile.as_deref().or(resolved.profile.as_deref());
            let result = api
                .import_to_hox(&args.name, args.set_name.as_deref(), profile)
                .into_diagnostic()?;
            JsonOutput::print_import(&result).into_diagnostic()
        }
        ManifestsCommand::Status { profile } => {
            let profile = profile.as_deref().or(resolved.profile.as_deref());
            let result = api.import_status(profile).into_diagnostic()?;
            JsonOutput::print_value(&result).into_diagnostic()
        }
    }
}

/// Turn `--study` specifiers into staged studies. A bare study accession
/// pulls the full run list from the backend; `ACC:SRR1,SRR2` keeps only the
/// named runs.
fn stage_from_args(api: &CuratorHttpApi, specs: &[String]) -> miette::Result<Vec<StagedStudy>> {
    let mut staged = Vec::with_capacity(specs.len());
    for spec in specs {
        let (study_part, runs_part) = match spec.split_once(':') {
            Some((study, runs)) => (study, Some(runs)),
            None => (spec.as_str(), None),
        };
        let accession: StudyAccession = study_part.parse().into_diagnostic()?;

        let runs = match runs_part {
            Some(runs) => {
                let mut selected = Vec::new();
                for run in runs.split(',').filter(|r| !r.trim().is_empty()) {
                    let run: RunAccession = run.parse().into_diagnostic()?;
                    selected.push(Run::from_accession(run.as_str()));
                }
                if selected.is_empty() {
                    return Err(CuratorError::Validation(format!(
                        "no runs named for {accession}"
                    )))
                    .into_diagnostic();
                }
                selected
            }
            None => {
                let response = api.list_runs(accession.as_str()).into_diagnostic()?;
                if response.runs.is_empty() {
                    let reason = response
                        .error
                        .unwrap_or_else(|| "no runs from API".to_string());
                    return Err(CuratorError::Validation(format!(
                        "no runs available for {accession}: {reason}"
                    )))
                    .into_diagnostic();
                }
                response.runs
            }
        };

        staged.push(StagedStudy {
            accession: accession.as_str().to_string(),
            title: String::new(),
            runs,
        });
    }
    Ok(staged)
}
