use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anstream::eprintln;
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use clio::{Input, Output};
use itertools::Itertools;
use schemars::schema_for;
use serde::de::DeserializeOwned;
use serde::Serialize;

use gridql::catalog::TypeCatalog;
use gridql::exec::sqlite::introspect;
use gridql::hints::suggestions_for;
use gridql::sql::{Dialect, Options};
use gridql::{ErrorMessages, QueryDefinition, Schema};

use crate::logger::StderrLogger;

/// Entrypoint called by [`crate::main`]
pub fn main() -> color_eyre::eyre::Result<()> {
    let mut cli = Cli::parse();

    static LOGGER: StderrLogger = StderrLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(cli.verbose.log_level_filter());

    color_eyre::install()?;
    cli.color.write_global();

    if let Err(error) = cli.command.run() {
        eprintln!("{error}");
        if backtrace_enabled() {
            eprintln!("{:#}", error.backtrace());
        }
        exit(1)
    }

    Ok(())
}

fn backtrace_enabled() -> bool {
    match env::var("RUST_LIB_BACKTRACE") {
        Ok(s) => s != "0",
        Err(_) => match env::var("RUST_BACKTRACE") {
            Ok(s) => s != "0",
            Err(_) => false,
        },
    }
}

#[derive(Parser, Debug)]
#[command(name = "gridql", about, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    color: colorchoice_clap::Color,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a query definition and compile it to SQL
    Compile {
        #[command(flatten)]
        io_args: IoArgs,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Emit unformatted, dense SQL
        #[arg(long = "no-format", action = clap::ArgAction::SetFalse)]
        format: bool,

        /// Dialect to compile to
        #[arg(short, long, default_value = "generic", env = "GRIDQL_DIALECT")]
        dialect: Dialect,
    },

    /// Compile a query definition and run it against a SQLite database
    ///
    /// Prints the records, column metadata and the definition as JSON.
    Run {
        #[command(flatten)]
        io_args: IoArgs,

        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// List filters applicable to columns of a type
    Suggest {
        /// Type name, or one of its aliases
        type_name: String,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// List known types with their aliases
    Types {
        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Print the tables of a SQLite database as a schema file
    Introspect {
        #[command(flatten)]
        database: DatabaseArgs,

        #[arg(value_enum, long, default_value = "json")]
        format: Format,

        #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
        output: Output,
    },

    /// Print the JSON schema of query definitions
    JsonSchema {
        #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
        output: Output,
    },
}

#[derive(clap::Args, Debug)]
struct IoArgs {
    /// Query definition, as JSON or YAML
    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    input: Input,

    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    output: Output,
}

#[derive(clap::Args, Debug)]
struct SchemaArgs {
    /// Schema file, as JSON or YAML
    #[arg(long, env = "GRIDQL_SCHEMA", value_hint(ValueHint::FilePath))]
    schema: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct DatabaseArgs {
    /// Path of the SQLite database
    #[arg(long, env = "GRIDQL_DATABASE", value_hint(ValueHint::FilePath))]
    database: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Json,
    Yaml,
}

impl Command {
    fn run(&mut self) -> Result<()> {
        match self {
            Command::Compile {
                io_args,
                schema,
                format,
                dialect,
            } => {
                let definition: QueryDefinition = io_args.read_document()?;
                let schema = schema.load()?;
                let options = Options::default()
                    .with_format(*format)
                    .with_dialect(*dialect);

                let sql = gridql::compile(&definition, &schema, &options)?;
                io_args.output.write_all(sql.as_bytes())?;
                io_args.output.write_all(b"\n")?;
            }
            Command::Run { io_args, database } => {
                let definition: QueryDefinition = io_args.read_document()?;
                let mut conn = database.open()?;
                let schema = introspect(&conn)?;
                let catalog = schema.catalog();
                let options = Options::default().with_dialect(Dialect::SQLite);

                let response =
                    gridql::query::run(&definition, &schema, &catalog, &options, &mut conn)
                        .map_err(into_messages)?;
                write_document(&mut io_args.output, &response, Format::Json)?;
            }
            Command::Suggest { type_name, schema } => {
                let catalog = schema.catalog()?;
                if !catalog.contains(type_name) {
                    log::warn!("unknown type `{type_name}`, no filters apply");
                }
                let suggestions = suggestions_for(&catalog, type_name);
                write_document(&mut std::io::stdout(), &suggestions, Format::Json)?;
            }
            Command::Types { schema } => {
                let catalog = schema.catalog()?;
                let mut stdout = std::io::stdout();
                for info in catalog.types().sorted_by(|a, b| a.name.cmp(&b.name)) {
                    if info.aliases.is_empty() {
                        writeln!(stdout, "{}", info.name)?;
                    } else {
                        writeln!(stdout, "{} ({})", info.name, info.aliases.join(", "))?;
                    }
                }
            }
            Command::Introspect {
                database,
                format,
                output,
            } => {
                let conn = database.open()?;
                let schema = introspect(&conn)?;
                write_document(output, &schema, *format)?;
            }
            Command::JsonSchema { output } => {
                let schema = schema_for!(QueryDefinition);
                write_document(output, &schema, Format::Json)?;
            }
        }
        Ok(())
    }
}

impl IoArgs {
    fn read_document<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mut text = String::new();
        self.input.read_to_string(&mut text)?;
        parse_document(&text).context("cannot read the query definition")
    }
}

impl SchemaArgs {
    fn load(&self) -> Result<Schema> {
        let Some(path) = &self.schema else {
            anyhow::bail!("no schema given; pass --schema or set GRIDQL_SCHEMA");
        };
        read_schema(path)
    }

    /// Builtin catalog, extended with the types of the schema if one is
    /// given.
    fn catalog(&self) -> Result<TypeCatalog> {
        Ok(match &self.schema {
            Some(path) => read_schema(path)?.catalog(),
            None => TypeCatalog::builtin(),
        })
    }
}

impl DatabaseArgs {
    fn open(&self) -> Result<rusqlite::Connection> {
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY;
        rusqlite::Connection::open_with_flags(&self.database, flags)
            .with_context(|| format!("cannot open {}", self.database.display()))
    }
}

fn read_schema(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path)?;
    parse_document(&text).with_context(|| format!("cannot read {}", path.display()))
}

/// JSON when the document starts like JSON, YAML otherwise.
fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T> {
    if text.trim_start().starts_with(|c: char| c == '{' || c == '[') {
        Ok(serde_json::from_str(text)?)
    } else {
        Ok(serde_yaml::from_str(text)?)
    }
}

fn write_document<W: Write, T: Serialize>(out: &mut W, value: &T, format: Format) -> Result<()> {
    let text = match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    };
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Validation errors are shown like compile errors; database errors as is.
fn into_messages(error: anyhow::Error) -> anyhow::Error {
    match error.downcast::<gridql::Error>() {
        Ok(error) => ErrorMessages::from(error).into(),
        Err(error) => error,
    }
}
