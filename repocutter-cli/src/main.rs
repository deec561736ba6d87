//! repocutter: stream surgery on Subversion dumpfiles
//!
//! Reads a dumpfile on stdin (or `--infile`), applies one transformation
//! command, writes the transformed dump to stdout. Report commands print
//! their report instead. Any error croaks a one-line diagnostic to
//! stderr and exits 1.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use repocutter_core::commands::{
    Closure, FileCopy, LogReport, Obscure, PathList, PathPattern, PathRename, Pop, PropClean,
    PropDel, PropRename, PropSet, Push, Reduce, Renumber, Replace, See, Select, SetCopyfrom,
    SetLog, SetPath, SkipCopy, Strip, Swap, SwapSvn, Sift, Testify,
};
use repocutter_core::{DumpEngine, DumpError, SelectionRange, Surgeon};

#[derive(Parser, Debug)]
#[command(name = "repocutter")]
#[command(version = "0.1.0")]
#[command(about = "Stream surgery on Subversion dumpfiles")]
struct Cli {
    /// Selection of revisions or revision.node endpoints, e.g. 2:5,9:HEAD
    #[arg(short = 'r', long = "range", global = true)]
    range: Option<String>,

    /// Treat PATTERN arguments as literal strings
    #[arg(short = 'f', long = "fixed", global = true)]
    fixed: bool,

    /// Base number for renumber and testify
    #[arg(short = 'b', long = "base", global = true, default_value_t = 0)]
    base: u64,

    /// Log-message file for setlog, in `svn log` display format
    #[arg(short = 'l', long = "logentries", global = true)]
    logentries: Option<PathBuf>,

    /// Property name for propclean
    #[arg(short = 'p', long = "property", global = true)]
    property: Option<String>,

    /// Leading segment for push
    #[arg(short = 's', long = "segment", global = true)]
    segment: Option<String>,

    /// Read the dump from FILE instead of stdin
    #[arg(short = 'i', long = "infile", global = true)]
    infile: Option<PathBuf>,

    /// Suppress the progress indicator
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    /// Debug verbosity
    #[arg(short = 'd', long = "debug", global = true, default_value_t = 0)]
    debug: u32,

    /// Tag for error diagnostics, to tell piped instances apart
    #[arg(short = 't', long = "tag", global = true)]
    tag: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep only the selected revisions and nodes
    Select,

    /// Drop the selected revisions and nodes
    Deselect,

    /// Print the closure of a path set under copying
    Closure { paths: Vec<String> },

    /// Drop nodes matching any PATTERN
    Expunge {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Keep only nodes matching some PATTERN
    Sift {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Remove the leading segment from every path
    Pop,

    /// Prepend a segment (from --segment) to every path
    Push,

    /// Apply FROM TO regex replacement pairs to paths
    Pathrename {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Delete properties by name
    Propdel {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Set NAME=VALUE properties
    Propset {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Rename properties given as OLD->NEW
    Proprename {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Remove a property from paths ending in any SUFFIX
    Propclean { suffixes: Vec<String> },

    /// Replace log messages from the --logentries file
    Setlog,

    /// Renumber revisions contiguously from --base
    Renumber,

    /// One-line-per-node summary of the stream
    See,

    /// Print log messages in `svn log` format
    Log,

    /// Drop plain file modifications
    Reduce,

    /// Regex-replace on content blobs, argument as /RE/REP/
    Replace { pattern: String },

    /// Replace file contents with a cookie (symlinks excepted)
    Strip { patterns: Vec<String> },

    /// Obscure path segments and author names
    Obscure,

    /// Canonicalize dates, authors and UUID for test fixtures
    Testify,

    /// Print every distinct node path
    Pathlist,

    /// Materialize pure file copies; pass `basename` to match by name
    Filecopy { mode: Option<String> },

    /// Splice two selected copies into one
    Skipcopy,

    /// Set Node-path on selected nodes
    Setpath { path: String },

    /// Set Node-copyfrom-path on selected nodes
    Setcopyfrom { path: String },

    /// Swap the first two segments of every path
    Swap,

    /// Convert project-first layout to standard trunk/branches/tags
    Swapsvn,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            process::exit(code);
        }
    };

    let level = match cli.debug {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        let tag = cli
            .tag
            .as_deref()
            .map(|t| format!("({t})"))
            .unwrap_or_default();
        eprintln!("repocutter{tag}: croaking, {err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let selection = match &cli.range {
        Some(text) => SelectionRange::parse(text)?,
        None => SelectionRange::all(),
    };

    let report_only = matches!(
        cli.command,
        Command::See | Command::Log | Command::Closure { .. } | Command::Pathlist
    );

    let mut surgeon: Box<dyn Surgeon> = match &cli.command {
        Command::Select => Box::new(Select::new(selection)),
        Command::Deselect => Box::new(Select::inverted(selection)),
        Command::Closure { paths } => Box::new(Closure::new(paths.clone())),
        Command::Expunge { patterns } => Box::new(Sift::expunge(
            PathPattern::compile_all(patterns, cli.fixed)?,
            selection,
        )),
        Command::Sift { patterns } => Box::new(Sift::sift(
            PathPattern::compile_all(patterns, cli.fixed)?,
            selection,
        )),
        Command::Pop => {
            reject_range(cli, "pop")?;
            Box::new(Pop)
        }
        Command::Push => {
            reject_range(cli, "push")?;
            let segment = cli.segment.as_deref().ok_or_else(|| {
                DumpError::argument("push needs a segment, use --segment")
            })?;
            Box::new(Push::new(segment))
        }
        Command::Pathrename { pairs } => {
            if pairs.len() % 2 != 0 {
                return Err(
                    DumpError::argument("pathrename wants FROM TO pairs, got an odd count").into(),
                );
            }
            let compiled = pairs
                .chunks(2)
                .map(|pair| {
                    Ok((
                        PathPattern::compile(&pair[0], cli.fixed)?,
                        pair[1].clone(),
                    ))
                })
                .collect::<Result<Vec<_>, DumpError>>()?;
            Box::new(PathRename::new(compiled, selection))
        }
        Command::Propdel { names } => Box::new(PropDel::new(names.clone(), selection)),
        Command::Propset { pairs } => Box::new(PropSet::new(pairs, selection)?),
        Command::Proprename { pairs } => Box::new(PropRename::new(pairs, selection)?),
        Command::Propclean { suffixes } => Box::new(PropClean::new(
            cli.property.clone(),
            suffixes.clone(),
            selection,
        )),
        Command::Setlog => {
            let path = cli.logentries.as_deref().ok_or_else(|| {
                DumpError::argument("setlog needs a log file, use --logentries")
            })?;
            Box::new(SetLog::from_file(path, selection)?)
        }
        Command::Renumber => Box::new(Renumber::new(cli.base)),
        Command::See => Box::new(See::new(selection)),
        Command::Log => Box::new(LogReport::new(selection)),
        Command::Reduce => Box::new(Reduce::new(selection)),
        Command::Replace { pattern } => Box::new(Replace::new(pattern, selection)?),
        Command::Strip { patterns } => Box::new(Strip::new(
            PathPattern::compile_all(patterns, cli.fixed)?,
            selection,
        )),
        Command::Obscure => Box::new(Obscure::new(selection)),
        Command::Testify => Box::new(Testify::new(cli.base)),
        Command::Pathlist => Box::new(PathList::new(selection)),
        Command::Filecopy { mode } => {
            let by_basename = match mode.as_deref() {
                None => false,
                Some("basename") => true,
                Some(other) => {
                    return Err(DumpError::argument(format!(
                        "filecopy takes no argument or `basename`, got {other:?}"
                    ))
                    .into())
                }
            };
            Box::new(FileCopy::new(selection, by_basename))
        }
        Command::Skipcopy => Box::new(SkipCopy::new(selection)),
        Command::Setpath { path } => Box::new(SetPath::new(path.clone(), selection)),
        Command::Setcopyfrom { path } => Box::new(SetCopyfrom::new(path.clone(), selection)),
        Command::Swap => Box::new(Swap::new(selection)),
        Command::Swapsvn => Box::new(SwapSvn::new(selection)),
    };

    let reader: Box<dyn BufRead> = match &cli.infile {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let out = io::stdout().lock();

    let mut engine = DumpEngine::new(reader, out)
        .debug(cli.debug)
        .progress(!cli.quiet);
    if report_only {
        engine = engine.report_only();
    }
    engine.run(surgeon.as_mut())?;
    Ok(())
}

fn reject_range(cli: &Cli, command: &str) -> Result<()> {
    if cli.range.is_some() {
        return Err(DumpError::argument(format!(
            "{command} cannot be range-restricted, it would desynchronize copy references"
        ))
        .into());
    }
    Ok(())
}
