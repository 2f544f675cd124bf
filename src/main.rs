use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use clap::{Parser as ClapParser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use dreamberd_compiler::config::Config;
use dreamberd_compiler::error::CompilerError;
use dreamberd_compiler::lexer::{collect_errors, Lexer};
use dreamberd_compiler::segmenter::split_units;
use dreamberd_compiler::{output, transpile, CompileOptions};

#[derive(ClapParser)]
#[command(author, version, about = "DreamBerd to TypeScript compiler")]
struct Cli {
    /// Log every classified statement
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a DreamBerd file into one TypeScript file per unit
    Build {
        /// Source file
        input: PathBuf,
        /// Output directory (defaults to the configured out_dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Template containing the `// USER CODE HERE //` marker
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// Fail on statements that match no known shape
        #[arg(long)]
        strict: bool,
    },
    /// Print the tokens of every unit
    Tokens {
        /// Source file
        input: PathBuf,
    },
    /// Manage dbc configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the configuration of the current environment
    Show,
    /// Write a configuration file with defaults
    Init,
    /// Print where the configuration file lives
    Path,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DBC_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn read_source(path: &Path) -> Result<String, CompilerError> {
    if !path.is_file() {
        return Err(CompilerError::FileNotFound(format!(
            "Source file not found: {}",
            path.display()
        )));
    }
    Ok(fs::read_to_string(path)?)
}

fn build(
    input: &Path,
    out_dir: Option<PathBuf>,
    template: Option<PathBuf>,
    strict: bool,
    config: &Config,
) -> Result<(), CompilerError> {
    let source = read_source(input)?;
    let options = CompileOptions {
        currency: config.currency(),
        strict: strict || config.strict,
    };

    let units = transpile(&source, input, &options)?;
    let template = output::load_template(template.as_deref().or(config.template.as_deref()))?;
    let out_dir = out_dir.unwrap_or_else(|| config.out_dir.clone());

    let written = output::write_units(&units, &out_dir, &template)?;
    let unclassified: usize = units.iter().map(|unit| unit.unclassified).sum();
    info!(files = written.len(), unclassified, out_dir = %out_dir.display(), "build finished");

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn tokens(input: &Path, config: &Config) -> Result<(), CompilerError> {
    let source = read_source(input)?;
    let mut diagnostics = Vec::new();

    for unit in split_units(&source) {
        println!("== {} ==", unit.name.as_deref().unwrap_or("<unnamed>"));
        let mut lexer = Lexer::new(&unit.body, input)
            .starting_at(unit.first_line)
            .with_currency(config.currency());
        let tokens = lexer.tokenize();
        for token in &tokens {
            println!("{token}");
        }
        diagnostics.extend(collect_errors(&tokens, lexer.file_name()));
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(CompilerError::Lexing(diagnostics))
    }
}

fn config_command(command: ConfigCommands) -> Result<(), CompilerError> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("currency: {}", config.currency());
        }
        ConfigCommands::Init => {
            let config_path = Config::get_config_path();
            if config_path.exists() {
                println!("Config file already exists at: {}", config_path.display());
                println!("Remove it to reinitialize.");
            } else {
                Config::default().save()?;
                println!("Initialized new config file at: {}", config_path.display());
            }
        }
        ConfigCommands::Path => println!("{}", Config::get_config_path().display()),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), CompilerError> {
    match cli.command {
        Commands::Build {
            input,
            out_dir,
            template,
            strict,
        } => build(&input, out_dir, template, strict, &Config::load()?),
        Commands::Tokens { input } => tokens(&input, &Config::load()?),
        Commands::Config { command } => config_command(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error.to_string().trim_end());
            ExitCode::FAILURE
        }
    }
}
