//! # AsciiDoc Change Marker (adoc-markdiff)
//!
//! A CLI tool that marks the changed sections of an AsciiDoc source with an
//! `[options="changed"]` attribute line, driven by an RCS-format diff.
//!
//! ## Overview
//!
//! `adoc-markdiff` reads the diff produced by `diff -Bbn SOURCE OLD`, works
//! out which lines of SOURCE were added or removed relative to OLD, then
//! streams SOURCE section by section. Every section containing at least one
//! changed line is prefixed with the marker line. The document itself is
//! never altered: the output is the input bytes plus inserted marker lines,
//! whatever the encoding of the source.
//!
//! ## Key Components
//!
//! - **Diff Interpreter**: Collects the `a<N> <M>` and `d<N> <M>` anchor lines
//!   of the RCS diff into add/delete maps and a merged changed-line index.
//!   Everything else in the diff is ignored.
//! - **Section Marker**: Segments the document into sections using blank lines
//!   and AsciiDoc decoration lines (`----`, `====`, `....`, `////`, title
//!   underlines), flagging and emitting each section as it closes.
//!
//! ## Algorithm Flow
//!
//! ```text
//! Diff text → Anchor Parsing → Changed-line Index
//!                                     ↓
//! Source → Line Reader → Section Segmentation → Flag → Marker + Section → stdout
//!                                                                  Summary → stderr
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Error or invalid arguments (help output also exits 1) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use crossterm::style::{StyledContent, Stylize};
use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Process exit statuses. Usage errors and `--help` share the failure status
/// with runtime errors; existing wrapper scripts test for it.
mod exit_codes {
    /// Document written to stdout
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments, help output, or any I/O failure
    pub const FAILURE: i32 = 1;
}

/// Command-line misuse detected after clap has parsed the arguments
#[derive(Debug, PartialEq, Eq)]
enum UsageError {
    /// Fewer than two positional paths
    MissingInputs,
    /// Marker text is empty or only whitespace
    EmptyMarker,
    /// Marker text spans several lines
    MultilineMarker,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInputs => {
                write!(f, "Illegal number of arguments: expected SOURCE_FILE and DIFF_FILE")
            }
            Self::EmptyMarker => write!(f, "marker must not be empty"),
            Self::MultilineMarker => write!(f, "marker must be a single line"),
        }
    }
}

impl std::error::Error for UsageError {}

// ─────────────────────────────────────────────────────────────────────────────
// Line Ranges
// ─────────────────────────────────────────────────────────────────────────────

/// A span of source lines (1-indexed, inclusive on both ends)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRange {
    start: usize,
    end: usize,
}

impl LineRange {
    fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Sort `ranges` and coalesce any that overlap or touch
fn merge_ranges(mut ranges: Vec<LineRange>) -> Vec<LineRange> {
    ranges.sort_unstable_by_key(|r| r.start);

    let mut merged: Vec<LineRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }

    merged
}

/// Membership test over sorted, disjoint ranges (see [`merge_ranges`])
fn line_in_ranges(line_num: usize, ranges: &[LineRange]) -> bool {
    let idx = ranges.partition_point(|r| r.end < line_num);
    ranges.get(idx).is_some_and(|r| r.start <= line_num)
}

/// Render ranges as `3-5, 9, 12-20`, or `none`
fn format_line_ranges(ranges: &[LineRange]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }

    let parts: Vec<String> = ranges
        .iter()
        .map(|r| match r.len() {
            1 => r.start.to_string(),
            _ => format!("{}-{}", r.start, r.end),
        })
        .collect();
    parts.join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Diff Interpretation
// ─────────────────────────────────────────────────────────────────────────────

/// RCS anchor commands: `a<N> <M>` (M lines added after line N) and
/// `d<N> <M>` (M lines deleted starting at line N).
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ad])([0-9]+)\s+([0-9]+)\s*$").expect("Invalid diff anchor regex")
});

/// Changed-line information extracted from an RCS diff.
///
/// The raw anchor maps are kept as parsed (`anchor line -> span length`); the
/// changed-line index merges them into sorted inclusive ranges so lookups are
/// a binary search instead of a scan over every delete anchor.
#[derive(Debug, Default)]
struct DiffRanges {
    /// `a<N> <M>` anchors: line N of the source is flagged, M is informational
    adds: HashMap<usize, usize>,
    /// `d<N> <M>` anchors: lines `N..N+M` of the source are flagged
    dels: HashMap<usize, usize>,
    /// Merged index of every flagged line
    changed: Vec<LineRange>,
}

impl DiffRanges {
    fn new(adds: HashMap<usize, usize>, dels: HashMap<usize, usize>) -> Self {
        let add_spans = adds.keys().map(|&line| LineRange {
            start: line,
            end: line,
        });
        let del_spans = dels
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&start, &count)| LineRange {
                start,
                end: start.saturating_add(count - 1),
            });
        let changed = merge_ranges(add_spans.chain(del_spans).collect());

        Self {
            adds,
            dels,
            changed,
        }
    }

    /// True if `line_number` is an add anchor or inside a delete span
    fn is_line_changed(&self, line_number: usize) -> bool {
        line_in_ranges(line_number, &self.changed)
    }

    fn changed_line_count(&self) -> usize {
        self.changed.iter().map(LineRange::len).sum()
    }
}

/// Parse RCS diff text into add/delete anchor maps.
///
/// Only anchor lines are recognized. Content lines following an `a` command,
/// other ed-script commands, and anchors whose numbers overflow are skipped
/// without error. A repeated anchor overwrites the earlier one.
fn parse_diff(text: &str) -> DiffRanges {
    let mut adds = HashMap::new();
    let mut dels = HashMap::new();

    for caps in ANCHOR_RE.captures_iter(text) {
        let (Ok(anchor), Ok(count)) = (caps[2].parse::<usize>(), caps[3].parse::<usize>()) else {
            continue;
        };

        let map = if &caps[1] == "a" { &mut adds } else { &mut dels };
        map.insert(anchor, count);
    }

    DiffRanges::new(adds, dels)
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Attribute line inserted before every changed section
const DEFAULT_MARKER: &str = r#"[options="changed"]"#;

/// A decoration line must be within this many characters of the line above it
/// to count as that line's title underline.
const UNDERLINE_LENGTH_TOLERANCE: usize = 3;

/// Section titles, block delimiters and separators: two dashes, or three or
/// more of a single delimiter character, with optional trailing whitespace.
/// Byte-oriented, so `\s` is the ASCII whitespace set.
static DECORATION_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"(?-u)^(?:--|-{3,}|\+{3,}|\.{3,}|\*{3,}|_{3,}|={3,}|/{3,})\s*$")
        .expect("Invalid decoration regex")
});

/// Space, `\t`, `\n`, `\v`, `\f`, `\r`
fn is_space(byte: &u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

fn trim_space(line: &[u8]) -> &[u8] {
    let Some(start) = line.iter().position(|b| !is_space(b)) else {
        return &[];
    };
    let end = line.iter().rposition(|b| !is_space(b)).map_or(start, |i| i + 1);
    &line[start..end]
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(is_space)
}

fn is_decoration(line: &[u8]) -> bool {
    DECORATION_RE.is_match(line)
}

/// Line length in characters when the line is UTF-8, in bytes otherwise
fn char_len(line: &[u8]) -> usize {
    std::str::from_utf8(line).map_or(line.len(), |text| text.chars().count())
}

/// Check if `decoration` underlines the title text in `previous`.
///
/// Lengths include line terminators. Attribute lines (`[...]`) and block
/// titles (`.Title`) never take an underline.
fn is_title_underline(previous: &[u8], decoration: &[u8]) -> bool {
    let diff = char_len(previous).abs_diff(char_len(decoration));
    diff < UNDERLINE_LENGTH_TOLERANCE
        && !matches!(previous.first().copied(), Some(b'[' | b'.'))
}

/// Anything but blank lines and `//` comments
fn has_content(line: &[u8]) -> bool {
    let trimmed = trim_space(line);
    !trimmed.is_empty() && !trimmed.starts_with(b"//")
}

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Statistics collected while marking a document
#[derive(Debug, Default)]
struct Stats {
    /// Number of source lines read
    total_lines: usize,
    /// Number of sections emitted
    sections_found: usize,
    /// Sections containing at least one changed line
    sections_changed: usize,
    /// Sections that received a marker line
    sections_marked: usize,
    /// Changed sections left unmarked (only blank lines and comments)
    sections_skipped: usize,
    /// Line spans of the marked sections
    marked: Vec<LineRange>,
    /// `a` anchors parsed from the diff
    add_anchors: usize,
    /// `d` anchors parsed from the diff
    delete_anchors: usize,
    /// Distinct source lines flagged by the diff
    changed_lines: usize,
    /// Processing elapsed time
    elapsed: Duration,
}

impl Stats {
    fn lines_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_lines as f64 / secs
        } else {
            self.total_lines as f64
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Section Marking
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming section segmenter.
///
/// Lines are buffered until a section boundary is seen, then the buffered
/// section is written out, preceded by the marker line when it is changed.
/// Lines are raw bytes and are written back exactly as read.
/// Boundaries are decided from local context only:
///
/// - a non-blank line after a blank line starts a new section;
/// - a decoration line directly under a title of similar length underlines it,
///   and the next non-blank line starts a new section;
/// - any other decoration line opens a delimited block (or an overlined
///   title) and suppresses boundaries until the identical line closes it.
///
/// ```text
/// Title            ← section 1
/// -----            ← underline: next non-blank line ends section 1
/// Body text        ← section 2
///
/// ----             ← delimiter opens a block (blank lines inside don't split)
/// code
/// ----             ← closes the block
/// ```
struct SectionMarker<'a> {
    ranges: &'a DiffRanges,
    marker: &'a str,
    /// Lines of the open section, terminators included
    buffer: Vec<Vec<u8>>,
    /// Line number of the first buffered line
    section_start: usize,
    changed: bool,
    /// Open delimiter awaiting its identical closing line
    wrapper: Option<Vec<u8>>,
    /// The next non-blank line ends the section
    end_pending: bool,
    line_number: usize,
    stats: Stats,
}

impl<'a> SectionMarker<'a> {
    fn new(ranges: &'a DiffRanges, marker: &'a str) -> Self {
        Self {
            ranges,
            marker,
            buffer: Vec::new(),
            section_start: 1,
            changed: false,
            wrapper: None,
            end_pending: false,
            line_number: 0,
            stats: Stats::default(),
        }
    }

    /// Feed the next line (terminator included), flushing the open section
    /// to `out` if this line starts a new one.
    fn push_line<W: Write>(&mut self, line: Vec<u8>, out: &mut W) -> io::Result<()> {
        self.line_number += 1;
        let mut end_of_section = false;

        if let Some(wrapper) = &self.wrapper {
            if *wrapper == line {
                self.end_pending = true;
                self.wrapper = None;
            }
        } else {
            let blank = is_blank(&line);

            if !blank && self.buffer.last().is_some_and(|prev| is_blank(prev)) {
                end_of_section = true;
            }

            if self.end_pending && !blank {
                end_of_section = true;
                self.end_pending = false;
            }

            // Judged against the section as it stood before this line
            if is_decoration(&line) {
                match self.buffer.last() {
                    Some(prev) if is_title_underline(prev, &line) => self.end_pending = true,
                    _ => self.wrapper = Some(line.clone()),
                }
            }
        }

        if end_of_section {
            self.flush_section(out)?;
        }

        if self.buffer.is_empty() {
            self.section_start = self.line_number;
        }
        self.changed |= self.ranges.is_line_changed(self.line_number);
        self.buffer.push(line);

        Ok(())
    }

    /// Write the open section and reset per-section state.
    /// The open wrapper, if any, survives.
    fn flush_section<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.stats.sections_found += 1;

            if self.changed {
                self.stats.sections_changed += 1;

                if self.buffer.iter().any(|line| has_content(line)) {
                    writeln!(out, "{}", self.marker)?;
                    self.stats.sections_marked += 1;
                    self.stats.marked.push(LineRange {
                        start: self.section_start,
                        end: self.section_start + self.buffer.len() - 1,
                    });
                } else {
                    self.stats.sections_skipped += 1;
                }
            }

            for line in self.buffer.drain(..) {
                out.write_all(&line)?;
            }
        }

        self.changed = false;
        self.end_pending = false;
        Ok(())
    }

    /// Flush the final section and return the collected statistics
    fn finish<W: Write>(mut self, out: &mut W) -> io::Result<Stats> {
        self.flush_section(out)?;
        self.stats.total_lines = self.line_number;
        Ok(self.stats)
    }
}

/// Stream `reader` through a [`SectionMarker`] into `out`.
fn mark_document<R: BufRead, W: Write>(
    mut reader: R,
    out: &mut W,
    ranges: &DiffRanges,
    marker: &str,
    source: &Path,
) -> Result<Stats> {
    let start_time = Instant::now();
    let mut sections = SectionMarker::new(ranges, marker);

    loop {
        let mut line = Vec::new();
        let read = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("Failed to read source file: {}", source.display()))?;
        if read == 0 {
            break;
        }

        sections
            .push_line(line, out)
            .context("Failed to write output")?;
    }

    let mut stats = sections.finish(out).context("Failed to write output")?;
    stats.add_anchors = ranges.adds.len();
    stats.delete_anchors = ranges.dels.len();
    stats.changed_lines = ranges.changed_line_count();
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColorMode {
    /// Color when stderr is a terminal
    Auto,
    /// Always emit colors
    Always,
    /// Never emit colors
    Never,
}

const LONG_ABOUT: &str = "\
Finds changed sections in an AsciiDoc source file according to an RCS-format
DIFF_FILE and marks them with the [options=\"changed\"] attribute.

The diff can be produced with:

    diff -Bbn SOURCE_FILE SOURCE_FILE_OLD > DIFF_FILE

SOURCE_FILE must be the first (left) file of the diff. The result is written
to standard output. If DIFF_FILE is \"-\", the diff is read from standard input.";

/// Marks changed sections of an AsciiDoc source according to an RCS diff
#[derive(Parser, Debug)]
#[command(
    name = "adoc-markdiff",
    version,
    about,
    long_about = LONG_ABOUT,
    after_help = "EXIT CODES:\n  0  Success\n  1  Error or invalid arguments (also after --help)\n"
)]
struct Args {
    /// AsciiDoc source file (left-hand file of the diff)
    #[arg(value_name = "SOURCE_FILE")]
    source: Option<PathBuf>,

    /// RCS diff file ("-" reads the diff from stdin)
    #[arg(value_name = "DIFF_FILE")]
    diff_file: Option<PathBuf>,

    /// Path to config file (default: search for .markdiffrc)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Ignore config files
    #[arg(long = "no-config", conflicts_with = "config_file")]
    no_config: bool,

    /// Attribute line inserted before each changed section
    #[arg(short = 'm', long, value_name = "TEXT", default_value = DEFAULT_MARKER)]
    marker: String,

    /// Print a processing summary to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Color for the verbose summary: auto, always, or never
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,
}

/// The two positional inputs, or a usage error when either is missing
fn input_paths(args: &Args) -> Result<(&Path, &Path), UsageError> {
    match (&args.source, &args.diff_file) {
        (Some(source), Some(diff)) => Ok((source.as_path(), diff.as_path())),
        _ => Err(UsageError::MissingInputs),
    }
}

fn validate_marker(marker: &str) -> Result<(), UsageError> {
    if marker.trim().is_empty() {
        Err(UsageError::EmptyMarker)
    } else if marker.contains(['\n', '\r']) {
        Err(UsageError::MultilineMarker)
    } else {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File Support
// ─────────────────────────────────────────────────────────────────────────────

/// Config file names tried in each directory, in order
const CONFIG_FILENAMES: &[&str] = &[".markdiffrc", ".markdiffrc.toml", "markdiffrc.toml"];

/// Keys accepted in a .markdiffrc file; anything else is ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    marker: Option<String>,
    verbose: Option<bool>,
    color: Option<ColorMode>,
}

/// Effective settings after merging the config file under the CLI
#[derive(Debug)]
struct Settings {
    marker: String,
    verbose: bool,
    color: ColorMode,
}

impl Settings {
    fn from_args(args: &Args) -> Self {
        Self {
            marker: args.marker.clone(),
            verbose: args.verbose,
            color: args.color,
        }
    }

    /// CLI values, with file values filling in wherever the CLI kept its default
    fn resolve(args: &Args) -> Result<Self> {
        let mut settings = Self::from_args(args);

        if let Some(path) = config_path(args)? {
            settings.apply(load_config_file(&path)?, args);
        }

        Ok(settings)
    }

    fn apply(&mut self, file: FileConfig, args: &Args) {
        if let Some(marker) = file.marker.filter(|_| args.marker == DEFAULT_MARKER) {
            self.marker = marker;
        }
        if let Some(verbose) = file.verbose.filter(|_| !args.verbose) {
            self.verbose = verbose;
        }
        if let Some(color) = file.color.filter(|_| args.color == ColorMode::Auto) {
            self.color = color;
        }
    }
}

/// Walk from `start_dir` to the filesystem root, then try the home directory
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let home = dirs::home_dir();

    start_dir
        .ancestors()
        .chain(home.as_deref())
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// The config file to load, if any
fn config_path(args: &Args) -> Result<Option<PathBuf>> {
    if args.no_config {
        return Ok(None);
    }

    match &args.config_file {
        Some(path) if path.is_file() => Ok(Some(path.clone())),
        Some(path) => anyhow::bail!("Config file not found: {}", path.display()),
        None => {
            // Start next to the source document, or in the working directory
            let start_dir = match args.source.as_deref().and_then(Path::parent) {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => std::env::current_dir().unwrap_or_default(),
            };
            Ok(find_config_file(&start_dir))
        }
    }
}

fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Verbose Reporting
// ─────────────────────────────────────────────────────────────────────────────

/// Styles for the stderr summary; plain text when color is off
struct Palette {
    enabled: bool,
}

impl Palette {
    fn for_stderr(mode: ColorMode) -> Self {
        let enabled = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none()
                    && (std::env::var_os("FORCE_COLOR").is_some() || io::stderr().is_terminal())
            }
        };
        Self { enabled }
    }

    fn paint(&self, text: &str, style: impl FnOnce(&str) -> StyledContent<&str>) -> String {
        if self.enabled {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint(text, |t| t.bold().cyan())
    }

    fn label(&self, text: &str) -> String {
        self.paint(text, |t| t.bold().blue())
    }

    fn muted(&self, text: &str) -> String {
        self.paint(text, |t| t.dim())
    }
}

fn write_header<W: Write>(
    out: &mut W,
    palette: &Palette,
    source: &Path,
    diff_label: &str,
) -> io::Result<()> {
    let title = format!("Marking {} against {}", source.display(), diff_label);
    writeln!(out, "{}", palette.heading(&title))
}

fn write_summary<W: Write>(out: &mut W, palette: &Palette, stats: &Stats) -> io::Result<()> {
    writeln!(
        out,
        "  {} {} found, {} changed, {} marked, {} comment-only",
        palette.label("Sections:"),
        stats.sections_found,
        stats.sections_changed,
        stats.sections_marked,
        stats.sections_skipped
    )?;
    writeln!(
        out,
        "  {} {} add, {} delete ({} line(s) flagged)",
        palette.label("Anchors:"),
        stats.add_anchors,
        stats.delete_anchors,
        stats.changed_lines
    )?;
    writeln!(
        out,
        "  {} {}",
        palette.label("Marked:"),
        format_line_ranges(&stats.marked)
    )?;

    let timing = format!(
        "{:.2}ms, {} lines ({:.0} lines/sec)",
        stats.elapsed.as_secs_f64() * 1000.0,
        stats.total_lines,
        stats.lines_per_second()
    );
    writeln!(out, "  {} {}", palette.label("Time:"), palette.muted(&timing))
}

// ─────────────────────────────────────────────────────────────────────────────
// Input
// ─────────────────────────────────────────────────────────────────────────────

fn is_stdin_path(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_source(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open source file: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Read the diff from a file, or from stdin when the path is `-`.
///
/// Decoding is lossy: only the ASCII anchor lines matter, and the content
/// lines of the old file may be in any encoding.
fn read_diff(path: &Path) -> Result<String> {
    let bytes = if is_stdin_path(path) {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read diff from stdin")?;
        buf
    } else {
        fs::read(path).with_context(|| format!("Failed to read diff file: {}", path.display()))?
    };

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn diff_label(path: &Path) -> String {
    if is_stdin_path(path) {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == ErrorKind::DisplayVersion {
                let _ = err.print();
                std::process::exit(exit_codes::SUCCESS);
            }
            // Help and usage errors both go to stderr with status 1
            eprint!("{}", err.render());
            std::process::exit(exit_codes::FAILURE);
        }
    };

    if let Err(err) = run(&args) {
        eprintln!("Error: {:#}", err);
        if err.is::<UsageError>() {
            eprintln!();
            eprintln!("{}", Args::command().render_usage());
        }
        std::process::exit(exit_codes::FAILURE);
    }
}

fn run(args: &Args) -> Result<()> {
    let (source, diff_path) = input_paths(args)?;
    let settings = Settings::resolve(args)?;
    validate_marker(&settings.marker)?;

    let ranges = parse_diff(&read_diff(diff_path)?);
    let reader = open_source(source)?;

    let palette = Palette::for_stderr(settings.color);
    if settings.verbose {
        write_header(&mut io::stderr().lock(), &palette, source, &diff_label(diff_path))
            .context("Failed to write summary")?;
    }

    let mut out = BufWriter::new(io::stdout().lock());
    let stats = mark_document(reader, &mut out, &ranges, &settings.marker, source)?;
    out.flush().context("Failed to write output")?;

    if settings.verbose {
        write_summary(&mut io::stderr().lock(), &palette, &stats)
            .context("Failed to write summary")?;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
