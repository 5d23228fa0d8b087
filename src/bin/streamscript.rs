use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use streamscript::{
    ConfigLoader, EngineConfig, ObjectSchema, PipelineTree, Runner, TransformRegistry, Value,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over one or more datapoint files
    Run {
        /// Path to the pipeline tree JSON file
        #[arg(long, short)]
        script: PathBuf,
        /// Input datapoint files (JSON array or JSON lines), merged by timestamp
        #[arg(long, short, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Output file, or STDOUT
        #[arg(long, short, default_value = "STDOUT")]
        output: String,
    },
    /// List the registered transforms as JSON
    Transforms {},
    /// Validate a JSON payload against a schema
    Validate {
        /// Path to the schema JSON file
        #[arg(long)]
        schema: PathBuf,
        /// Path to the payload JSON file
        #[arg(long)]
        data: PathBuf,
        /// Fill in schema defaults and print the completed payload
        #[arg(long, conflicts_with = "update")]
        defaults: bool,
        /// Treat the payload as a partial update
        #[arg(long)]
        update: bool,
    },
}

fn init_logging(config: &EngineConfig) {
    env_logger::Builder::new()
        .filter_level(config.logging.level.to_level_filter())
        .parse_default_env()
        .init();
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

fn handle_run(
    registry: &TransformRegistry,
    config: EngineConfig,
    script: PathBuf,
    inputs: Vec<PathBuf>,
    output: String,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading pipeline from: {}", script.display());
    let tree: PipelineTree = serde_json::from_value(read_json(&script)?)?;
    let runner = Runner::new(registry, config);

    if output == "STDOUT" {
        let stdout = io::stdout();
        runner.run_files(&tree, &inputs, stdout.lock())?;
    } else {
        let file = fs::File::create(&output)
            .map_err(|e| format!("Failed to create {}: {}", output, e))?;
        runner.run_files(&tree, &inputs, io::BufWriter::new(file))?;
        info!("Wrote output to {}", output);
    }
    Ok(())
}

fn handle_transforms(registry: &TransformRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let transforms: Vec<_> = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .collect();
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &transforms)?;
    writeln!(stdout)?;
    Ok(())
}

fn handle_validate(
    schema: PathBuf,
    data: PathBuf,
    defaults: bool,
    update: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = ObjectSchema::new(read_json(&schema)?)?;
    let mut payload = Value::from(read_json(&data)?);

    if update {
        schema.validate_update(&payload)?;
    } else if defaults {
        schema.validate_with_defaults(&mut payload)?;
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &payload)?;
        writeln!(stdout)?;
    } else {
        schema.validate(&payload)?;
    }
    info!("{} is valid", data.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::default().load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    init_logging(&config);

    let result = TransformRegistry::with_builtins()
        .map_err(Box::<dyn std::error::Error>::from)
        .and_then(|registry| match cli.command {
            Commands::Run {
                script,
                input,
                output,
            } => handle_run(&registry, config, script, input, output),
            Commands::Transforms {} => handle_transforms(&registry),
            Commands::Validate {
                schema,
                data,
                defaults,
                update,
            } => handle_validate(schema, data, defaults, update),
        });

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
