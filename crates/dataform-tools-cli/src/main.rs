use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use dataform_tools_core::{CompiledGraph, Config, Direction, Report, Severity};
use dataform_tools_graph::{document_diagnostics, DataformCompiler, DependencyGraph, NodeId};
use dataform_tools_sqlx::{apply_edits, BlockRange, MatchMode, Position, ReferenceExtractor, RenameEngine, SqlxBlocks};

mod remote;

use remote::RemoteCommand;

/// Dataform tools - SQLX references, config lint, dependency graph and the Dataform API
#[derive(Parser)]
#[command(name = "dataform-tools")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dataform project root
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Path to config file (default: <project>/dataform-tools.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ${ref(...)} calls of a file
    Symbols {
        file: PathBuf,

        /// Also show the config / js / operations / SQL block layout
        #[arg(long)]
        blocks: bool,
    },

    /// Rename the word at a position throughout a file
    Rename {
        file: PathBuf,

        /// Line of the cursor (1-based)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,

        /// Column of the cursor (1-based, UTF-16 units)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        character: u32,

        /// Replacement text
        #[arg(long)]
        new_name: String,

        /// Only replace occurrences delimited by non-word characters
        #[arg(long)]
        whole_word: bool,

        /// Write the result back instead of printing the edits
        #[arg(long)]
        write: bool,
    },

    /// Lint config blocks and references of SQLX files
    Lint {
        /// Files or directories (default: <project>/definitions)
        paths: Vec<PathBuf>,

        /// Output file for report.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compiled graph used to check references
        #[arg(long)]
        compiled: Option<PathBuf>,
    },

    /// Show the dependency tree of the project
    Graph {
        /// Precomputed `dataform compile --json` output
        #[arg(long)]
        compiled: Option<PathBuf>,

        /// upstream (dependencies) or downstream (dependents)
        #[arg(short, long, default_value = "upstream")]
        direction: Direction,

        /// Restrict the tree to this node (database.schema.name)
        #[arg(short, long)]
        root: Option<String>,

        /// Print the panel payload as JSON
        #[arg(long)]
        json: bool,

        /// Print the run order (dependencies first) instead of the tree
        #[arg(long, conflicts_with_all = ["root", "json"])]
        order: bool,
    },

    /// Run `dataform compile` and summarize the result
    Compile {
        /// Also write the compiled JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Managed Dataform API (Google Cloud)
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Symbols { file, blocks } => symbols_command(&file, blocks),
        Commands::Rename {
            file,
            line,
            character,
            new_name,
            whole_word,
            write,
        } => rename_command(
            &config,
            &file,
            Position::new(line - 1, character - 1),
            &new_name,
            whole_word,
            write,
        ),
        Commands::Lint {
            paths,
            output,
            compiled,
        } => lint_command(&config, &cli.project, &paths, output.as_deref(), compiled, cli.verbose),
        Commands::Graph {
            compiled,
            direction,
            root,
            json,
            order,
        } => {
            let view = if order {
                GraphView::Order
            } else {
                GraphView::Tree { root, json }
            };
            graph_command(&config, &cli.project, compiled, direction, view).await
        }
        Commands::Compile { output } => compile_command(&config, &cli.project, output.as_deref()).await,
        Commands::Remote { command } => remote::run(&config, command, cli.verbose).await,
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::discover(&cli.project)?,
    };

    if cli.verbose {
        match &config.gcp.project_id {
            Some(project) => eprintln!("{} {}", "GCP project:".cyan(), project),
            None => eprintln!("{}", "No GCP project configured".yellow()),
        }
    }
    Ok(config)
}

/// Symbols command - list reference calls
fn symbols_command(file: &Path, blocks: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let references = ReferenceExtractor::extract(&text);
    tracing::debug!(file = %file.display(), references = references.len(), "extracted references");

    if blocks {
        print_blocks(&SqlxBlocks::scan(&text));
    }

    println!("{} {}", "References in".bold(), file.display().to_string().green());
    if references.is_empty() {
        println!("  {}", "none".dimmed());
        return Ok(());
    }

    for reference in &references {
        println!(
            "  {:>4}:{:<3} {}",
            reference.span.start.line + 1,
            reference.span.start.character + 1,
            reference.text.cyan()
        );
    }
    println!("{} reference(s)", references.len());
    Ok(())
}

fn block_lines(blocks: &SqlxBlocks) -> Vec<(&'static str, BlockRange)> {
    let mut lines = Vec::new();
    lines.extend(blocks.config.map(|r| ("config", r)));
    lines.extend(blocks.js.map(|r| ("js", r)));
    lines.extend(blocks.pre_operations.iter().map(|r| ("pre_operations", *r)));
    lines.extend(blocks.post_operations.iter().map(|r| ("post_operations", *r)));
    lines.extend(blocks.sql.map(|r| ("sql", r)));
    lines.sort_by_key(|(_, r)| r.start_line);
    lines
}

fn print_blocks(blocks: &SqlxBlocks) {
    println!("{}", "Blocks".bold());
    for (name, range) in block_lines(blocks) {
        println!("  {:<16} {}-{}", name.cyan(), range.start_line, range.end_line);
    }
    println!();
}

/// Rename command - replace every occurrence of the word at the cursor
fn rename_command(
    config: &Config,
    file: &Path,
    position: Position,
    new_name: &str,
    whole_word: bool,
    write: bool,
) -> Result<()> {
    if new_name.is_empty() {
        anyhow::bail!("New name must not be empty");
    }

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let engine = RenameEngine::new(MatchMode::from_whole_word(whole_word || config.rename.whole_word));

    let word = engine
        .word_at(&text, position)
        .ok_or_else(|| anyhow::anyhow!("No symbol at cursor to rename"))?;
    tracing::debug!(word = %word.text, ?position, "renaming");
    let edits = engine
        .rename(&text, position, new_name)
        .ok_or_else(|| anyhow::anyhow!("No symbol at cursor to rename"))?;

    if write {
        std::fs::write(file, apply_edits(&text, &edits))?;
        println!(
            "{} {} occurrence(s) of '{}' to '{}' in {}",
            "Renamed".green(),
            edits.len(),
            word.text,
            new_name,
            file.display()
        );
        return Ok(());
    }

    for edit in &edits {
        println!(
            "  {}:{}-{}  {} -> {}",
            edit.span.start.line + 1,
            edit.span.start.character + 1,
            edit.span.end.character + 1,
            word.text.red(),
            edit.new_text.green()
        );
    }
    println!("{} edit(s); run with --write to apply", edits.len());
    Ok(())
}

/// SQLX files under the given paths, sorted
fn collect_sqlx_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| e.file_name() != "node_modules")
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "sqlx"))
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

fn relative_file(project: &Path, file: &Path) -> String {
    file.strip_prefix(project)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Lint command - config block lint plus reference checks
fn lint_command(
    config: &Config,
    project: &Path,
    paths: &[PathBuf],
    output: Option<&Path>,
    compiled: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let roots = if paths.is_empty() {
        vec![project.join("definitions")]
    } else {
        paths.to_vec()
    };
    let files = collect_sqlx_files(&roots);
    tracing::info!(files = files.len(), "linting SQLX files");

    let graph = match compiled.or_else(|| config.compiled_json_path()) {
        Some(path) => {
            if verbose {
                eprintln!("{} {}", "Loading compiled graph from:".cyan(), path.display());
            }
            Some(
                CompiledGraph::from_file(&path)
                    .with_context(|| format!("Failed to load compiled graph {}", path.display()))?,
            )
        }
        None => None,
    };

    let mut all_diagnostics = Vec::new();
    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let relative = relative_file(project, file);
        let diagnostics = document_diagnostics(&relative, &text, config, graph.as_ref());

        if verbose {
            if diagnostics.is_empty() {
                eprintln!("  {} {}", "✓".green(), relative);
            } else {
                eprintln!("  {} {} ({})", "✗".red(), relative, diagnostics.len());
            }
        }
        all_diagnostics.extend(diagnostics);
    }

    let report = Report::from_diagnostics(all_diagnostics, files.len());

    if let Some(output) = output {
        report.save_to_file(output)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), output.display());
        }
    }

    print_report_summary(&report);

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

/// What `graph` prints
enum GraphView {
    Tree { root: Option<String>, json: bool },
    Order,
}

/// Nodes in run order, failing on a dependency cycle
fn run_order(dag: &DependencyGraph) -> Result<Vec<NodeId>> {
    dag.topological_sort()
        .ok_or_else(|| anyhow::anyhow!("The compiled graph has a dependency cycle"))
}

/// Graph command - dependency tree or run order of the compiled project
async fn graph_command(
    config: &Config,
    project: &Path,
    compiled: Option<PathBuf>,
    direction: Direction,
    view: GraphView,
) -> Result<()> {
    let compiler = DataformCompiler::new(config.compile.dataform_cli.clone());
    let graph = compiler
        .load_or_compile(project, compiled.or_else(|| config.compiled_json_path()))
        .await?;
    let dag = DependencyGraph::from_compiled(&graph);
    tracing::info!(nodes = dag.all_nodes().len(), "loaded dependency graph");

    let (root, json) = match view {
        GraphView::Order => {
            let order = run_order(&dag)?;
            println!("{}", "Run order".bold());
            for (i, id) in order.iter().enumerate() {
                let missing = dag.node(id).map_or(false, |n| n.missing);
                let name = if missing { id.red() } else { id.normal() };
                println!("  {:>3}. {}", i + 1, name);
            }
            return Ok(());
        }
        GraphView::Tree { root, json } => (root, json),
    };

    let tree = match root.as_deref() {
        Some(root) => dag
            .subtree(root, direction)
            .ok_or_else(|| anyhow::anyhow!("Node '{}' not found in the compiled graph", root))?,
        None => dag.metadata(direction),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let legend = DependencyGraph::legend();
    let (title, arrow) = match direction {
        Direction::Upstream => ("Dependency Tree (upstream)", "<-"),
        Direction::Downstream => ("Dependency Tree (downstream)", "->"),
    };

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if let Some(root) = &tree.tree_root {
        println!("{} {}", "Root:".bold(), root.green());
        println!();
    }

    for node in &tree.dataform_tree_metadata {
        let label = legend
            .get(node.schema_idx as usize)
            .map(|l| l.schema.as_str())
            .unwrap_or_default();
        let name = if dag.node(&node.name).map_or(false, |n| n.missing) {
            node.name.red()
        } else {
            node.name.normal()
        };
        println!("  {} {}", name, format!("[{}]", label).dimmed());
        for dep in node.deps.iter().flatten() {
            println!("      {} {}", arrow, dep);
        }
    }

    let missing = dag.missing_nodes().count();
    println!();
    println!("Nodes: {}", tree.dataform_tree_metadata.len());
    if missing > 0 {
        println!(
            "{}",
            format!("⚠ {} dependency target(s) are not defined in the project", missing).yellow()
        );
    }
    println!("{}", "=".repeat(60).bright_blue());
    Ok(())
}

/// Compile command - run the Dataform CLI and summarize
async fn compile_command(config: &Config, project: &Path, output: Option<&Path>) -> Result<()> {
    let compiler = DataformCompiler::new(config.compile.dataform_cli.clone());
    let graph = compiler.compile(project).await?;
    tracing::info!(actions = graph.actions().count(), "compiled project");

    if let Some(output) = output {
        std::fs::write(output, serde_json::to_string_pretty(&graph)?)?;
    }

    let errors = &graph.graph_errors.compilation_errors;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Compilation Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    if let Some(version) = &graph.dataform_core_version {
        println!("Dataform core: {}", version);
    }
    println!("  Tables:       {}", graph.tables.len());
    println!("  Assertions:   {}", graph.assertions.len());
    println!("  Operations:   {}", graph.operations.len());
    println!("  Declarations: {}", graph.declarations.len());
    println!();

    if errors.is_empty() {
        println!("{}", "✓ Compiled without errors".green().bold());
    } else {
        println!("{} {}", "Compilation errors:".bold(), errors.len().to_string().red());
        for error in errors {
            println!(
                "  [{}] {}: {}",
                "ERROR".red().bold(),
                error.file_name.as_deref().unwrap_or("<unknown>"),
                error.message
            );
        }
    }
    println!();
    println!("{}", "=".repeat(60).bright_blue());

    if !errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "SQLX Lint Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Files checked: {}", report.summary.files_checked);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                print!("    at {}", loc.file);
                if let Some(line) = loc.line {
                    print!(":{}", line);
                    if let Some(column) = loc.column {
                        print!(":{}", column);
                    }
                }
                println!();
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
