//! DagWeaver CLI Entry Point
//!
//! Provides command-line interface for building layered workflows.
//!
//! # Usage
//!
//! ```bash
//! # Build the workflow description for a plan (writes sweep.dag.yaml)
//! dagweaver build sweep.yaml
//!
//! # Write the description somewhere else (JSON by extension)
//! dagweaver build sweep.yaml --output out/sweep.json
//!
//! # Stage every layer's files next to the description
//! dagweaver build sweep.yaml --stage dag/
//!
//! # Fail if any warning was raised
//! dagweaver build sweep.yaml --strict
//!
//! # Generate the queue file of one layer
//! dagweaver queue sweep.yaml train
//!
//! # Scaffold a new job directory
//! dagweaver new train --args lr,seed
//!
//! # Remove DAGMan run artifacts
//! dagweaver clean
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{error, info, warn};

use dagweaver::dag::DescriptionBackend;
use dagweaver::plan::{build_chain, generate_queue, load_plan, plan_base_dir, BuildOptions};
use dagweaver::workspace::{clean_directory, JobScaffold};
use dagweaver::{APP_NAME, VERSION};

/// Default build plan used when none is specified.
const DEFAULT_PLAN: &str = "dag.yaml";

/// Extension of the default description file, `<name>.dag.yaml`.
const DESCRIPTION_SUFFIX: &str = ".dag.yaml";

/// Subcommand selected on the command line.
#[derive(Debug, PartialEq)]
enum Command {
    /// Build the workflow description
    Build,
    /// Write one layer's queue file
    Queue { layer: String },
    /// Scaffold a job directory
    New { job: String },
    /// Remove DAGMan artifacts
    Clean { dir: PathBuf },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    command: Command,
    plan_path: String,
    output: Option<PathBuf>,
    stage_dir: Option<PathBuf>,
    job_args: Option<String>,
    image: Option<String>,
    job_parent: Option<PathBuf>,
    strict: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: Command::Build,
            plan_path: DEFAULT_PLAN.to_string(),
            output: None,
            stage_dir: None,
            job_args: None,
            image: None,
            job_parent: None,
            strict: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Layered Cluster Workflow Builder");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: dagweaver build [OPTIONS] <PLAN_FILE>");
    println!("       dagweaver queue [OPTIONS] <PLAN_FILE> <LAYER>");
    println!("       dagweaver new [OPTIONS] <JOB>");
    println!("       dagweaver clean [DIR]");
    println!();
    println!("Commands:");
    println!("  build               Build the workflow description for a plan");
    println!("  queue               Write the queue file of one layer");
    println!("  new                 Scaffold a job directory (.sub, .sh, .py, .txt)");
    println!("  clean               Remove DAGMan artifacts (.dag, .dagman.out, .lock, .rescue)");
    println!();
    println!("Arguments:");
    println!("  <PLAN_FILE>         Path to build plan YAML file (default: {})", DEFAULT_PLAN);
    println!("  <LAYER>             Layer name (queue command only)");
    println!("  <JOB>               Job name (new command only)");
    println!("  [DIR]               Directory to clean (default: .)");
    println!();
    println!("Options:");
    println!("  --output FILE       Output path (default: <name>{} next to the plan)", DESCRIPTION_SUFFIX);
    println!("  --stage DIR         Copy every layer's files and write the description to DIR");
    println!("  --strict            Fail if any warning was raised");
    println!("  --args LIST         Job arguments, comma or space separated (new)");
    println!("  --image IMAGE       Docker image user/image:tag (new)");
    println!("  --dir DIR           Parent directory of the new job (default: .)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  dagweaver build sweep.yaml");
    println!("  dagweaver build sweep.yaml --stage dag --strict");
    println!("  dagweaver queue sweep.yaml train --output train/train.csv");
    println!("  dagweaver new train --args lr,seed");
}

/// Reads the value of an option that takes one.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional = Vec::new();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--strict" => {
                config.strict = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--output" | "-o" => {
                config.output = Some(PathBuf::from(option_value(args, &mut i, "--output")?));
            }
            "--stage" => {
                config.stage_dir = Some(PathBuf::from(option_value(args, &mut i, "--stage")?));
            }
            "--args" => {
                config.job_args = Some(option_value(args, &mut i, "--args")?.to_string());
            }
            "--image" => {
                config.image = Some(option_value(args, &mut i, "--image")?.to_string());
            }
            "--dir" => {
                config.job_parent = Some(PathBuf::from(option_value(args, &mut i, "--dir")?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = positional.next();
    match command.as_deref() {
        None | Some("build") => {
            if let Some(plan) = positional.next() {
                config.plan_path = plan;
            }
        }
        Some("queue") => {
            let plan = positional
                .next()
                .ok_or_else(|| "queue requires a plan file".to_string())?;
            let layer = positional
                .next()
                .ok_or_else(|| "queue requires a layer name".to_string())?;
            config.plan_path = plan;
            config.command = Command::Queue { layer };
        }
        Some("new") => {
            let job = positional
                .next()
                .ok_or_else(|| "new requires a job name".to_string())?;
            config.command = Command::New { job };
        }
        Some("clean") => {
            let dir = positional.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            config.command = Command::Clean { dir };
        }
        Some(other) => return Err(format!("Unknown command: {}", other)),
    }

    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    Ok(config)
}

/// Default description path: `<name>.dag.yaml` in the stage directory or
/// next to the plan.
fn default_output(config: &Config, base_dir: &Path, name: &str) -> PathBuf {
    let dir = config.stage_dir.as_deref().unwrap_or(base_dir);
    dir.join(format!("{}{}", name, DESCRIPTION_SUFFIX))
}

/// Refuses an output path that would overwrite the plan itself.
fn ensure_not_plan(output: &Path, plan_path: &Path) -> Result<(), String> {
    let same = match (fs::canonicalize(output), fs::canonicalize(plan_path)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(format!(
            "Output '{}' is the plan file itself; choose another --output",
            output.display()
        ));
    }
    Ok(())
}

/// Builds the plan and saves its workflow description.
fn run_build(config: &Config, options: &BuildOptions) -> Result<(), Box<dyn std::error::Error>> {
    let plan = load_plan(&config.plan_path).map_err(|e| {
        error!("Failed to load plan: {}", e);
        format!("Could not load plan from '{}': {}", config.plan_path, e)
    })?;

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output(config, &options.base_dir, &plan.name));
    ensure_not_plan(&output, Path::new(&config.plan_path))?;

    let chain = build_chain(&plan, options)?;

    let warnings = chain.warnings().len();
    if warnings > 0 {
        warn!("{} warning(s) raised while building '{}'", warnings, plan.name);
        if config.strict {
            return Err(format!("{} warning(s) raised in strict mode", warnings).into());
        }
    }

    let description = chain.finalize(&DescriptionBackend::new(&plan.name))?;
    description.save(&output)?;

    info!(
        "Workflow '{}': {} layers, {} jobs",
        description.name,
        description.layers.len(),
        description.total_jobs
    );
    Ok(())
}

/// Scaffolds a new job directory.
fn run_new(config: &Config, job: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut scaffold = JobScaffold::new(job)?;
    if let Some(image) = &config.image {
        scaffold = scaffold.with_image(image.as_str())?;
    }
    if let Some(args) = &config.job_args {
        scaffold = scaffold.with_arguments_text(args)?;
    }

    let parent = config.job_parent.clone().unwrap_or_else(|| PathBuf::from("."));
    let job_dir = scaffold.generate(&parent)?;
    info!(
        "Created files: {job}.sub, {job}.sh, {job}.py, {job}.txt in {}",
        job_dir.display(),
        job = job
    );
    info!("Make sure to check and modify the files as needed.");
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let mut options = BuildOptions::new(plan_base_dir(&config.plan_path));
    if let Some(dir) = &config.stage_dir {
        info!("Staging layers in: {}", dir.display());
        options = options.with_stage_dir(dir);
    }

    match &config.command {
        Command::Build => run_build(&config, &options)?,
        Command::Queue { layer } => {
            let plan = load_plan(&config.plan_path)?;
            let path = generate_queue(&plan, layer, config.output.as_deref(), &options)?;
            info!("Queue file for '{}' written to: {}", layer, path.display());
        }
        Command::New { job } => run_new(&config, job)?,
        Command::Clean { dir } => {
            let removed = clean_directory(dir)?;
            info!("Removed {} DAG artifact(s)", removed.len());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("dagweaver")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_build_defaults() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert_eq!(config.command, Command::Build);
        assert_eq!(config.plan_path, DEFAULT_PLAN);
        assert!(!config.strict);
    }

    #[test]
    fn test_parse_build_with_options() {
        let config =
            parse_arguments(&args(&["build", "sweep.yaml", "--output", "out.json", "--strict"]))
                .unwrap();
        assert_eq!(config.plan_path, "sweep.yaml");
        assert_eq!(config.output, Some(PathBuf::from("out.json")));
        assert!(config.strict);
    }

    #[test]
    fn test_parse_queue_command() {
        let config = parse_arguments(&args(&["queue", "sweep.yaml", "train"])).unwrap();
        assert_eq!(
            config.command,
            Command::Queue {
                layer: "train".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["queue", "sweep.yaml"])).is_err());
        assert!(parse_arguments(&args(&["deploy"])).is_err());
        assert!(parse_arguments(&args(&["build", "a.yaml", "b.yaml"])).is_err());
        assert!(parse_arguments(&args(&["--output"])).is_err());
        assert!(parse_arguments(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_parse_new_and_clean() {
        let config =
            parse_arguments(&args(&["new", "train", "--args", "lr,seed", "--dir", "jobs"])).unwrap();
        assert_eq!(
            config.command,
            Command::New {
                job: "train".to_string()
            }
        );
        assert_eq!(config.job_args.as_deref(), Some("lr,seed"));
        assert_eq!(config.job_parent, Some(PathBuf::from("jobs")));

        let config = parse_arguments(&args(&["clean"])).unwrap();
        assert_eq!(
            config.command,
            Command::Clean {
                dir: PathBuf::from(".")
            }
        );
        assert!(parse_arguments(&args(&["new"])).is_err());
    }

    #[test]
    fn test_default_output_prefers_stage_dir() {
        let mut config = Config::default();
        let base = Path::new("plans");
        assert_eq!(
            default_output(&config, base, "sweep"),
            PathBuf::from("plans/sweep.dag.yaml")
        );

        config.stage_dir = Some(PathBuf::from("dag"));
        assert_eq!(
            default_output(&config, base, "sweep"),
            PathBuf::from("dag/sweep.dag.yaml")
        );
    }

    #[test]
    fn test_default_output_never_overwrites_plan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let plan_path = temp_dir.path().join("sweep.yaml");
        fs::write(&plan_path, "name: sweep\nlayers: []\n").unwrap();

        let config = Config::default();
        let output = default_output(&config, temp_dir.path(), "sweep");
        assert_ne!(output, plan_path);
        assert!(ensure_not_plan(&output, &plan_path).is_ok());

        assert!(ensure_not_plan(&plan_path, &plan_path).is_err());
        let dotted = temp_dir.path().join(".").join("sweep.yaml");
        assert!(ensure_not_plan(&dotted, &plan_path).is_err());
    }
}
