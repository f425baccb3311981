//! CLI command implementations.

use crate::QueryArgs;
use calltrail_graph::{store, CallGraph, LoadMode, QueryEngine, SymbolMatch, END, START};
use calltrail_indexer::{Indexer, IndexerConfig, CONFIG_DIR};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const SUGGESTION_LIMIT: usize = 5;

fn index_path(index: Option<&Path>) -> PathBuf {
    index
        .map(Path::to_path_buf)
        .unwrap_or_else(|| IndexerConfig::index_path_for(Path::new(".")))
}

fn load_graph(index: Option<&Path>, mode: LoadMode) -> Result<CallGraph> {
    let path = index_path(index);
    if !path.exists() {
        return Err(format!(
            "no index at {} (run {} first)",
            path.display(),
            "calltrail index".cyan()
        )
        .into());
    }
    Ok(store::load(&path, mode)?)
}

fn paths_mode(show_path: bool) -> LoadMode {
    if show_path {
        LoadMode::WithPaths
    } else {
        LoadMode::SymbolsOnly
    }
}

/// Initialize Calltrail in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = IndexerConfig::path_for(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    IndexerConfig::default().save(path)?;

    println!("{} Initialized Calltrail in {}", "✓".green(), path.display());
    println!("  Run {} to index your codebase", "calltrail index".cyan());

    Ok(())
}

/// Index a directory and save the graph.
pub fn index(path: &Path, index: Option<&Path>, threads: Option<usize>) -> Result<()> {
    println!("{}", "Indexing codebase...".cyan());

    let mut config = IndexerConfig::load(path)?;
    if let Some(threads) = threads {
        config.threads = threads;
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(80));
    bar.set_message("Scanning files...");

    let progress = |file: &str, done: usize, total: usize| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
        bar.set_message(file.to_string());
    };
    let result = Indexer::new(path, config).with_progress(&progress).run()?;

    bar.finish_and_clear();

    let out = index
        .map(Path::to_path_buf)
        .unwrap_or_else(|| IndexerConfig::index_path_for(path));
    store::save(&result.graph, &out)?;

    // Print results
    println!(
        "{} Indexed {} files ({} symbols, {} call edges) in {}ms",
        "✓".green(),
        result.files_indexed.to_string().cyan(),
        result.graph.num_symbols().to_string().cyan(),
        result.graph.call_edge_count().to_string().cyan(),
        result.duration_ms
    );
    println!("  Saved to {}", out.display());

    // Show any errors
    if !result.errors.is_empty() {
        println!("\n{} files with parse errors:", "⚠".yellow());
        for (file, error) in result.errors.iter().take(5) {
            println!("  {} - {}", file.red(), error);
        }
        if result.errors.len() > 5 {
            println!("  ... and {} more", result.errors.len() - 5);
        }
    }

    Ok(())
}

/// Show index statistics.
pub fn status(index: Option<&Path>) -> Result<()> {
    let path = index_path(index);
    if index.is_none() && !Path::new(CONFIG_DIR).exists() {
        println!("{} Calltrail not initialized in this directory", "✗".red());
        println!("  Run {} to initialize", "calltrail init".cyan());
        return Ok(());
    }

    let graph = load_graph(index, LoadMode::SymbolsOnly)?;

    println!("{}", "Calltrail Status".cyan().bold());
    println!();
    println!("  {} {}", "Index:".dimmed(), path.display());
    println!("  {} {}", "Symbols:".dimmed(), graph.num_symbols());
    println!("  {} {}", "Functions:".dimmed(), graph.num_functions());
    println!("  {} {}", "Variables:".dimmed(), graph.num_variables());
    println!("  {} C, C++, Python", "Languages:".dimmed());

    Ok(())
}

fn print_symbols(
    engine: &QueryEngine<'_>,
    matches: &mut Vec<SymbolMatch<'_>>,
    show_path: bool,
    nosort: bool,
) {
    if !nosort {
        matches.sort_by(|a, b| a.name.cmp(b.name));
    }
    for m in matches.iter() {
        let kind = m.kind.to_string();
        if show_path {
            let file = engine.file_of(m.name).unwrap_or("-");
            println!(
                "  {:<8} {} {}",
                kind.yellow(),
                m.name.cyan(),
                format!("({})", file).dimmed()
            );
        } else {
            println!("  {:<8} {}", kind.yellow(), m.name.cyan());
        }
    }
}

/// Search the index by substring.
pub fn search(
    index: Option<&Path>,
    patterns: &[String],
    show_path: bool,
    nosort: bool,
) -> Result<()> {
    let graph = load_graph(index, paths_mode(show_path))?;
    let engine = QueryEngine::new(&graph);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let mut matches = engine.find_symbols(&patterns);

    if matches.is_empty() {
        println!("No matches found for \"{}\"", patterns.join(" "));
        return Ok(());
    }

    println!("Found {} matches:\n", matches.len());
    print_symbols(&engine, &mut matches, show_path, nosort);

    Ok(())
}

/// List every symbol in the index.
pub fn list(index: Option<&Path>, nosort: bool) -> Result<()> {
    let graph = load_graph(index, LoadMode::SymbolsOnly)?;
    let engine = QueryEngine::new(&graph);

    let mut all = engine.find_symbols(&[]);
    println!("{} symbols:\n", all.len());
    print_symbols(&engine, &mut all, false, nosort);

    Ok(())
}

/// Prints "did you mean" hints and returns the error for an unknown symbol.
fn unknown_symbol(engine: &QueryEngine<'_>, name: &str) -> Box<dyn std::error::Error> {
    let hints = engine.suggestions(name, SUGGESTION_LIMIT);
    if !hints.is_empty() {
        println!("{}", "Did you mean one of these?".yellow());
        for hint in hints {
            println!("  {}", hint.cyan());
        }
    }
    format!("symbol not found: {}", name).into()
}

/// Turns a chain element into a symbol name.
///
/// `START` and `END` pass through. With `pattern`, the element is a
/// substring and the first match in name order is used.
fn resolve_symbol(engine: &QueryEngine<'_>, name: &str, pattern: bool) -> Result<String> {
    if name == START || name == END {
        return Ok(name.to_string());
    }
    if !pattern {
        if engine.has_symbol(name) {
            return Ok(name.to_string());
        }
        return Err(unknown_symbol(engine, name));
    }

    let mut names: Vec<&str> = engine
        .find_symbols(&[name])
        .into_iter()
        .map(|m| m.name)
        .collect();
    names.sort_unstable();
    let Some(first) = names.first() else {
        return Err(unknown_symbol(engine, name));
    };
    if names.len() > 1 {
        println!("{} matches for \"{}\":", names.len(), name);
        for candidate in names.iter().take(SUGGESTION_LIMIT) {
            println!("  {}", candidate.dimmed());
        }
    }
    println!("Using: {}", first.cyan());
    Ok(first.to_string())
}

/// Endpoints of one query run and the chain parts printed around each path.
#[derive(Debug, PartialEq)]
struct QueryPlan {
    from: String,
    to: String,
    prefix: Vec<String>,
    suffix: Vec<String>,
}

/// Splits `--start a b --end c d` into a search from `b` to `c` with `a`
/// printed before and `d` after every path.
fn plan_query(start: &[String], end: &[String], backtrace: bool) -> Result<QueryPlan> {
    let Some((to, suffix)) = end.split_first() else {
        return Err("--end needs at least one symbol".into());
    };

    let (from, prefix) = if backtrace {
        (START.to_string(), Vec::new())
    } else {
        match start.split_last() {
            Some((from, prefix)) => (from.clone(), prefix.to_vec()),
            None => return Err("--start is required unless --backtrace is given".into()),
        }
    };

    if from == START && to == END {
        return Err("cannot query from START to END; name at least one symbol".into());
    }

    Ok(QueryPlan {
        from,
        to: to.clone(),
        prefix,
        suffix: suffix.to_vec(),
    })
}

fn format_path(engine: &QueryEngine<'_>, names: &[&str], show_path: bool) -> String {
    names
        .iter()
        .map(|name| match engine.file_of(name).filter(|_| show_path) {
            Some(file) => format!("{} {}", name, format!("[{}]", file).dimmed()),
            None => name.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Enumerate call paths.
pub fn query(index: Option<&Path>, args: &QueryArgs) -> Result<()> {
    let graph = load_graph(index, LoadMode::Full)?;
    let engine = QueryEngine::new(&graph);

    let resolve_all = |chain: &[String]| -> Result<Vec<String>> {
        chain
            .iter()
            .map(|name| resolve_symbol(&engine, name, args.pattern))
            .collect()
    };
    let start = resolve_all(&args.start)?;
    let end = resolve_all(&args.end)?;

    let backtrace = args.backtrace || start.first().is_some_and(|s| s == START);
    let plan = plan_query(&start, &end, backtrace)?;

    let mut found = 0;
    let count = engine.find_paths(&plan.from, &plan.to, |path| {
        let full: Vec<&str> = plan
            .prefix
            .iter()
            .map(String::as_str)
            .chain(path.iter().copied())
            .chain(plan.suffix.iter().map(String::as_str))
            .collect();
        println!("{}", format_path(&engine, &full, args.show_path));
        found += 1;
        args.limit == 0 || found < args.limit
    });

    if count == 0 {
        println!(
            "{} No paths from {} to {}",
            "✗".red(),
            plan.from.cyan(),
            plan.to.cyan()
        );
    } else {
        println!("\n{} {} paths", "✓".green(), count);
    }

    Ok(())
}

/// Enumerate data-flow paths.
pub fn flow(index: Option<&Path>, source: &str, variable: &str, limit: usize) -> Result<()> {
    let graph = load_graph(index, LoadMode::Full)?;
    let engine = QueryEngine::new(&graph);

    for name in [source, variable] {
        if !engine.has_symbol(name) {
            return Err(unknown_symbol(&engine, name));
        }
    }

    let mut found = 0;
    let count = engine.data_flow_paths(source, variable, |path| {
        println!("{}", path.join(" -> "));
        found += 1;
        limit == 0 || found < limit
    });

    if count == 0 {
        println!(
            "{} No data flow from {} to {}",
            "✗".red(),
            source.cyan(),
            variable.cyan()
        );
    }

    Ok(())
}

/// Print a symbol's type.
pub fn symbol_type(index: Option<&Path>, symbol: &str) -> Result<()> {
    let graph = load_graph(index, LoadMode::SymbolsOnly)?;
    let engine = QueryEngine::new(&graph);

    match engine.symbol_type(symbol) {
        Some(kind) => {
            println!("{}", kind);
            Ok(())
        }
        None => Err(unknown_symbol(&engine, symbol)),
    }
}

fn print_assignments(engine: &QueryEngine<'_>, vars: &[SymbolMatch<'_>]) {
    for var in vars {
        let sources = engine.data_sources(var.name);
        println!("  {} <- {}", var.name.cyan(), sources.join(", "));
    }
}

/// Show where matching variables get their values.
pub fn sources(index: Option<&Path>, patterns: &[String]) -> Result<()> {
    let graph = load_graph(index, LoadMode::Full)?;
    let engine = QueryEngine::new(&graph);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let vars = engine.variables_in(&patterns);
    if vars.is_empty() {
        println!("No variables match \"{}\"", patterns.join(" "));
        return Ok(());
    }
    print_assignments(&engine, &vars);

    Ok(())
}

/// Show which variables matching symbols flow into.
pub fn sinks(index: Option<&Path>, patterns: &[String]) -> Result<()> {
    let graph = load_graph(index, LoadMode::Full)?;
    let engine = QueryEngine::new(&graph);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let mut any = false;
    for m in engine.find_symbols(&patterns) {
        let sinks = engine.data_sinks(m.name);
        if sinks.is_empty() {
            continue;
        }
        any = true;
        println!("  {} -> {}", m.name.cyan(), sinks.join(", "));
    }
    if !any {
        println!("No data flows out of symbols matching \"{}\"", patterns.join(" "));
    }

    Ok(())
}

/// List variables.
pub fn vars(index: Option<&Path>, patterns: &[String], show_path: bool) -> Result<()> {
    let graph = load_graph(index, paths_mode(show_path))?;
    let engine = QueryEngine::new(&graph);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let mut vars = engine.variables_in(&patterns);
    println!("{} variables:\n", vars.len());
    print_symbols(&engine, &mut vars, show_path, false);

    Ok(())
}

/// Show assignments to a member variable.
pub fn member(index: Option<&Path>, patterns: &[String]) -> Result<()> {
    let graph = load_graph(index, LoadMode::Full)?;
    let engine = QueryEngine::new(&graph);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let members = engine.find_members(&patterns);
    println!("Assignments ({}):", members.len());
    print_assignments(&engine, &members);

    Ok(())
}
