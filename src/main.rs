use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use gridmeta::axis::{self, format_number};
use gridmeta::projection::{self, FamilyLookup};
use gridmeta::{
    AcceptDefaults, AttributeValue, AxisRole, ConversionConfig, DatasetAccessor, GridMetaError,
    TerminalPrompt, ZarrDataset,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Global attributes that describe a map projection.
const PROJECTION_ATTRIBUTES: [&str; 10] = [
    "projection",
    "MAP_PROJ",
    "MAP_PROJ_CHAR",
    projection::TRUELAT1,
    projection::TRUELAT2,
    projection::CEN_LAT,
    projection::CEN_LON,
    projection::STAND_LON,
    projection::POLE_LAT,
    projection::POLE_LON,
];

#[derive(Subcommand)]
enum Command {
    /// Infer metadata for a store and write it to the store's root attributes
    Convert(ConvertArgs),

    /// Show detected axes, levels, times and projection attributes without asking anything
    Inspect {
        /// Path to the Zarr store root directory
        store: PathBuf,
    },
}

#[derive(ClapArgs)]
struct ConvertArgs {
    /// Path to the Zarr store root directory
    store: PathBuf,

    /// Answers file (JSON) replacing interactive prompts
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Accept every default instead of prompting
    #[arg(short = 'y', long)]
    yes: bool,

    /// Ask about descriptive fields even when the dataset already sets them
    #[arg(long)]
    review: bool,

    /// Write an answers file that reproduces this conversion
    #[arg(long, value_name = "FILE")]
    save_answers: Option<PathBuf>,

    /// Write the metadata JSON to FILE instead of the store
    #[arg(short, long, value_name = "FILE", conflicts_with = "dry_run")]
    output: Option<PathBuf>,

    /// Print the metadata JSON to stdout and leave the store untouched
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
#[command(name = "gridmeta")]
#[command(version)]
#[command(about = "Infer and validate visualization metadata for gridded Zarr datasets")]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to FILE instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Prompts block on a worker thread; Ctrl-C ends the run from here.
    let outcome: anyhow::Result<()> = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => Err(GridMetaError::Interrupted.into()),
        result = run() => result,
    };

    if let Err(e) = outcome {
        let interrupted = e
            .chain()
            .any(|cause| cause.downcast_ref::<GridMetaError>().is_some_and(GridMetaError::is_interrupted));
        if interrupted {
            eprintln!("{}", GridMetaError::Interrupted.to_string().yellow());
            process::exit(130);
        }

        eprintln!("{} {}", "Error:".red().bold(), e);

        // Print the error chain for better context
        for cause in e.chain().skip(1) {
            eprintln!("  Caused by: {}", cause);
        }

        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }
    init_logging(args.verbose, args.log.as_deref())?;

    match args.command {
        Command::Convert(convert_args) => convert_store(convert_args).await,
        Command::Inspect { store } => inspect_store(&store).await,
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn convert_store(args: ConvertArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ConversionConfig::from_path(path)?,
        None => ConversionConfig::default(),
    };
    if args.review {
        config.review = true;
    }

    let dataset = ZarrDataset::open(&args.store).await?;

    let yes = args.yes;
    let (dataset, result) = tokio::task::spawn_blocking(move || {
        let result = if yes {
            gridmeta::convert(&dataset, &mut AcceptDefaults, &config)
        } else {
            gridmeta::convert(&dataset, &mut TerminalPrompt::stdio(), &config)
        };
        (dataset, result)
    })
    .await
    .context("Conversion task failed")?;
    let result = result.with_context(|| format!("Failed to convert '{}'", args.store.display()))?;

    if let Some(path) = &args.save_answers {
        let answers = ConversionConfig::from_dataset(&result, &dataset.data_variable_names());
        std::fs::write(path, answers.to_json_pretty()?)
            .with_context(|| format!("Failed to write answers file '{}'", path.display()))?;
        eprintln!("{} {}", "Saved answers to".green(), path.display());
    }

    let attributes = result.to_attributes()?;
    let json = serde_json::to_string_pretty(&serde_json::Value::Object(attributes.clone()))?;

    if args.dry_run {
        println!("{}", json);
    } else if let Some(path) = &args.output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metadata to '{}'", path.display()))?;
        eprintln!("{} {}", "Wrote metadata to".green(), path.display());
    } else {
        dataset.store().write_root_attributes(&attributes).await?;
        eprintln!(
            "{} {}",
            "Wrote metadata to".green(),
            dataset.store().path().join(".zattrs").display()
        );
    }

    Ok(())
}

async fn inspect_store(path: &Path) -> anyhow::Result<()> {
    let dataset = ZarrDataset::open(path).await?;

    println!("{} {} {{", "store".blue(), path.display().to_string().bold());

    println!("{}", "axes:".green());
    for role in [AxisRole::Longitude, AxisRole::Latitude] {
        match axis::resolve_axes(&dataset, role) {
            Ok(axes) if axes.is_empty() => {
                println!("    {} {}", role.as_str().cyan(), "// none found".dimmed());
            }
            Ok(axes) => {
                for descriptor in axes.values() {
                    println!(
                        "    {} = {} ; {}",
                        role.as_str().cyan(),
                        descriptor.name,
                        format!(
                            "// {} .. {} ({} points)",
                            format_number(descriptor.start),
                            format_number(descriptor.end),
                            descriptor.count
                        )
                        .dimmed()
                    );
                }
            }
            Err(e) => println!("    {} {}", role.as_str().cyan(), e.to_string().yellow()),
        }
    }

    print_labels("levels:", axis::resolve_levels(&dataset));
    print_labels("times:", axis::resolve_times(&dataset));

    println!("{}", "projection:".green());
    let family = match projection::identify_family(dataset.global_attributes()) {
        FamilyLookup::Resolved(family) => family.name().to_string(),
        FamilyLookup::Unrecognized(name) => format!("unsupported ({})", name),
        FamilyLookup::Absent => "not declared".to_string(),
    };
    println!("    family = {} ;", family.bold());
    for key in PROJECTION_ATTRIBUTES {
        if let Some(value) = dataset.global_attributes().get(key) {
            println!("    :{} = {} ;", key.yellow(), format_attribute(value));
        }
    }

    println!("{}", "data variables:".green());
    for name in dataset.data_variable_names() {
        let dims = dataset.dimensions(&name)?.join(", ");
        println!("    {}({}) ;", name.cyan(), dims);
    }

    println!("}}");
    Ok(())
}

fn print_labels(
    header: &str,
    labels: gridmeta::Result<std::collections::BTreeMap<String, Vec<String>>>,
) {
    println!("{}", header.green());
    match labels {
        Ok(labels) => {
            for (name, values) in labels {
                println!("    {} = {} ;", name.cyan(), values.join(", "));
            }
        }
        Err(e) => println!("    {}", e.to_string().yellow()),
    }
}

fn format_attribute(value: &AttributeValue) -> String {
    match value {
        AttributeValue::String(s) => format!("\"{}\"", s),
        AttributeValue::Number(n) => format_number(*n),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
