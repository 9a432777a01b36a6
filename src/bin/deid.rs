//! deid: the de-identification rule compiler CLI
//!
//! # Usage
//!
//! ```bash
//! # Print the SQL for one table
//! deid compile synpuf.person --rules rules.json --table-config person.json --schema schemas/
//!
//! # Show what each rule contributed
//! deid explain synpuf.person --rules rules.json --table-config person.json --columns person_id,ssn
//!
//! # Compile several tables and hand them to the executor
//! deid submit person observation --configs tables/ --schema schemas/ --dialect bigquery
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::*;
use deid::defaults::apply_defaults;
use deid::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deid")]
#[command(version)]
#[command(about = "De-identification rule compiler", long_about = None)]
#[command(after_help = "EXAMPLES:
    deid compile synpuf.person --rules rules.json --table-config person.json --schema schemas/
    deid explain synpuf.observation --table-config observation.json --columns person_id,value_as_string
    deid submit person visit_occurrence --configs tables/ --schema schemas/ --defaults
    deid dialects")]
struct Cli {
    /// Configuration file (defaults to ./deid.toml, then the user config dir)
    #[arg(short, long, global = true, env = "DEID_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Rule file (JSON array of rule-type objects)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Directory of `<table>.json` schema files
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Column list, overrides the schema
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Target dialect (sqlite, bigquery, postgresql)
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Add the default suppression and date-shift rules
    #[arg(long)]
    defaults: bool,

    /// Fail when any citation is skipped
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one table and print its SQL
    Compile {
        /// Table identity, `dataset.table` or a bare name
        table: String,
        /// Table configuration (JSON)
        #[arg(long)]
        table_config: Option<PathBuf>,
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Show projections, filters and skipped citations per field
    Explain {
        table: String,
        #[arg(long)]
        table_config: Option<PathBuf>,
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Compile tables and submit them to the executor
    Submit {
        /// Tables to compile
        #[arg(required = true)]
        tables: Vec<String>,
        /// Directory of `<table>.json` table configurations
        #[arg(long)]
        configs: Option<PathBuf>,
        /// Where the SQL files go
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// WRITE_TRUNCATE, WRITE_APPEND or WRITE_EMPTY
        #[arg(long)]
        write_disposition: Option<WriteDisposition>,
        #[command(flatten)]
        inputs: Inputs,
    },
    /// List the supported dialects
    Dialects,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("deid=debug")
    } else {
        EnvFilter::try_from_env("DEID_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Compile {
            table,
            table_config,
            inputs,
        } => {
            let session = Session::open(config, &inputs)?;
            let prepared = session.prepare(&table, read_table_config(table_config.as_deref())?)?;
            let query = session.compile(&prepared)?;
            println!("{}", query);
        }
        Commands::Explain {
            table,
            table_config,
            inputs,
        } => {
            let session = Session::open(config, &inputs)?;
            let prepared = session.prepare(&table, read_table_config(table_config.as_deref())?)?;
            explain(&session, &prepared)?;
        }
        Commands::Submit {
            tables,
            configs,
            output_dir,
            write_disposition,
            inputs,
        } => {
            let session = Session::open(config, &inputs)?;
            let output_dir = output_dir.unwrap_or_else(|| session.settings.submit.output_dir.clone());
            let disposition = write_disposition.unwrap_or(session.settings.submit.write_disposition);
            submit(&session, &tables, configs.as_deref(), output_dir, disposition).await?;
        }
        Commands::Dialects => show_dialects(),
    }
    Ok(())
}

fn read_table_config(path: Option<&Path>) -> anyhow::Result<TableConfig> {
    let Some(path) = path else {
        return Ok(TableConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    TableConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Settings, dialect and rules shared by every table of one invocation.
struct Session<'a> {
    settings: DeidConfig,
    dialect: Dialect,
    cache: RuleCache,
    inputs: &'a Inputs,
}

/// A table ready to compile.
struct PreparedTable {
    input: TableRef,
    columns: Vec<String>,
    config: TableConfig,
}

impl<'a> Session<'a> {
    fn open(config: Option<&Path>, inputs: &'a Inputs) -> anyhow::Result<Self> {
        let settings = DeidConfig::load(config)?;
        let dialect = inputs.dialect.unwrap_or(settings.dialect);

        let cache = match inputs.rules.as_ref().or(settings.rules.path.as_ref()) {
            Some(path) => RuleCache::from_path(path)
                .with_context(|| format!("loading rules from {}", path.display()))?,
            None => RuleCache::new(),
        }
        .with_dialect_defaults(dialect.profile());

        Ok(Self {
            settings,
            dialect,
            cache,
            inputs,
        })
    }

    fn prepare(&self, table: &str, config: TableConfig) -> anyhow::Result<PreparedTable> {
        let input = self.settings.input_table(table);

        let columns = if !self.inputs.columns.is_empty() {
            self.inputs.columns.clone()
        } else if let Some(dir) = &self.inputs.schema {
            JsonSchemaProvider::new(dir).columns(&input)?
        } else {
            bail!("no columns for {}: pass --schema or --columns", input);
        };

        let config = if self.inputs.defaults || self.settings.rules.apply_defaults {
            apply_defaults(config, &input, &columns)
        } else {
            config
        };

        Ok(PreparedTable { input, columns, config })
    }

    fn compilation(&self, table: &PreparedTable) -> anyhow::Result<Compilation> {
        let compilation = Compiler::new(&self.cache, self.dialect)
            .with_shift_source(self.settings.shift_source(&table.input))
            .compile(&table.config);

        if self.inputs.strict && !compilation.is_complete() {
            let labels: Vec<&str> = compilation.skipped.iter().map(|s| s.label.as_str()).collect();
            bail!("{} citation(s) skipped for {}: {}", labels.len(), table.input, labels.join(", "));
        }
        for skipped in &compilation.skipped {
            eprintln!(
                "{} {} ({}): {}",
                "skipped".yellow(),
                skipped.label.yellow(),
                skipped.rule_type,
                skipped.reason.dimmed()
            );
        }
        Ok(compilation)
    }

    fn compile(&self, table: &PreparedTable) -> anyhow::Result<CompiledQuery> {
        let compilation = self.compilation(table)?;
        Ok(assemble(&table.input, &table.columns, &compilation)?)
    }
}

fn explain(session: &Session<'_>, table: &PreparedTable) -> anyhow::Result<()> {
    let compilation = session.compilation(table)?;

    println!("{}", "deid compilation".cyan().bold());
    println!();
    println!("  {} {}", "Table:".dimmed(), table.input.to_string().white());
    println!("  {} {}", "Dialect:".dimmed(), session.dialect.to_string().cyan());
    let kind = if compilation.is_meta() { "meta (UNION ALL)" } else { "relational" };
    println!("  {} {}", "Kind:".dimmed(), kind.white());

    println!();
    println!("{}", "Fields:".green().bold());
    for column in &table.columns {
        let projections: Vec<&FieldProjection> =
            compilation.projections.iter().filter(|p| &p.name == column).collect();
        if projections.is_empty() {
            println!("  {} {}", column.white(), "(pass-through)".dimmed());
            continue;
        }
        println!("  {}", column.white().bold());
        for projection in projections {
            let category = projection
                .on_value
                .as_deref()
                .map(|on| format!(" when {}", on))
                .unwrap_or_default();
            println!(
                "    [{}] {}{}",
                projection.rule_type.to_string().cyan(),
                projection.label.yellow(),
                category.dimmed()
            );
            println!("      {}", projection.sql);
        }
    }

    if !compilation.filters.is_empty() {
        println!();
        println!("{}", "Row filters:".green().bold());
        for filter in &compilation.filters {
            println!("  {} {}", filter.label.yellow(), filter.predicate);
        }
    }

    if !compilation.skipped.is_empty() {
        println!();
        println!("{}", "Skipped:".red().bold());
        for skipped in &compilation.skipped {
            println!("  [{}] {} {}", skipped.rule_type, skipped.label.yellow(), skipped.reason.dimmed());
        }
    }

    println!();
    println!("{}", "Generated SQL:".green().bold());
    let query = assemble(&table.input, &table.columns, &compilation)?;
    for branch in query.branches() {
        println!("  {}", branch.white());
    }
    Ok(())
}

async fn submit(
    session: &Session<'_>,
    tables: &[String],
    configs: Option<&Path>,
    output_dir: PathBuf,
    disposition: WriteDisposition,
) -> anyhow::Result<()> {
    let executor = SqlFileExecutor::new(output_dir);
    let mut jobs = Vec::with_capacity(tables.len());

    for table in tables {
        let table_config = match configs {
            Some(dir) => {
                let path = dir.join(format!("{}.json", TableRef::parse(table).table));
                read_table_config(path.is_file().then_some(path.as_path()))?
            }
            None => TableConfig::default(),
        };
        let prepared = session.prepare(table, table_config)?;
        let query = session.compile(&prepared)?;

        let destination = Destination::new(session.settings.output_table(&prepared.input), disposition);
        let job = executor.submit(&query.to_sql(), &destination).await?;
        println!("{} {} -> {} ({})", "submitted".cyan(), prepared.input, destination.table, job.id.dimmed());
        jobs.push(job);
    }

    wait_on_jobs(&executor, &jobs, &Backoff::from(&session.settings.wait)).await?;
    println!(
        "{} {} table(s) written to {}",
        "✓".green(),
        jobs.len(),
        executor.output_dir().display().to_string().cyan()
    );
    Ok(())
}

fn show_dialects() {
    println!("{}", "Supported dialects".cyan().bold());
    println!();
    println!(
        "{:12} {:10} {:10} {}",
        "Name".white().bold(),
        "If".white().bold(),
        "Cast to".white().bold(),
        "Functions".white().bold()
    );
    println!("{}", "─".repeat(60).dimmed());

    for dialect in Dialect::ALL {
        let profile = dialect.profile();
        let functions: Vec<&str> = profile.functions.iter().map(|(name, _)| *name).collect();
        let functions = if functions.is_empty() {
            "(none)".to_string()
        } else {
            functions.join(", ")
        };
        println!(
            "{:12} {:10} {:10} {}",
            profile.name.cyan().bold(),
            profile.conditional.open_if.yellow(),
            profile.string_type.white(),
            functions.dimmed()
        );
    }
}
