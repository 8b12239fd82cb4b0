//! Alignment search collaborator.
//!
//! The engine talks to the search tool through [`AlignmentSearch`]; the
//! production adapter, [`BlastnCommand`], drives the BLAST+ `blastn`
//! executable and parses its tabular output into a hit table.

use std::ffi::OsString;
use std::fs::File;
use std::io::{
    Read,
    Seek,
    SeekFrom,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use std::process::{
    Command,
    ExitStatus,
    Stdio,
};
use std::sync::Mutex;
use std::time::Duration;

use hashbrown::HashMap;
use itertools::Itertools;
use log::{
    debug,
    error,
    info,
    warn,
};
use polars::prelude::DataFrame;
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::{
    BlastConfig,
    ToolkitConfig,
};
use crate::error::{
    HomologyError,
    Result,
};
use crate::hits::{
    alignment_midline,
    empty_hit_frame,
    hits_to_frame,
    strand_from_span,
    HomologyHit,
};
use crate::task::CancelToken;

/// Word size used by the homology pipelines.
pub const DEFAULT_WORD_SIZE: usize = 11;

/// `blastn -outfmt` format string understood by [`parse_tabular`].
pub const TABULAR_FORMAT: &str = "6 qseqid qlen sseqid stitle slen evalue bitscore pident \
                                  positive gaps length qstart qend sstart send qseq sseq";

const FATAL_STDERR_MARKERS: [&str; 3] = ["error:", "fatal:", "command not found"];

/// One alignment search against a target assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_fasta:     String,
    pub target_assembly: String,
    pub evalue:          f64,
    pub word_size:       usize,
    pub max_target_seqs: usize,
}

impl SearchRequest {
    pub fn new(
        query_fasta: String,
        target_assembly: &str,
    ) -> Self {
        Self {
            query_fasta,
            target_assembly: target_assembly.to_string(),
            evalue: 10.0,
            word_size: DEFAULT_WORD_SIZE,
            max_target_seqs: 500,
        }
    }

    crate::with_field_fn!(evalue, f64);

    crate::with_field_fn!(word_size, usize);

    crate::with_field_fn!(max_target_seqs, usize);
}

/// Runs a query FASTA against a target database.
///
/// Returns `Ok(None)` when `cancel` was observed, a zero-row table when
/// nothing aligned and [`HomologyError::ToolFailure`] on a fatal tool error.
/// Warnings from the tool must not fail the call.
pub trait AlignmentSearch: Send + Sync {
    fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<Option<DataFrame>>;
}

/// [`AlignmentSearch`] over the BLAST+ command-line tools.
pub struct BlastnCommand {
    config:        BlastConfig,
    databases:     HashMap<String, PathBuf>,
    poll_interval: Duration,
    db_lock:       Mutex<()>,
}

impl BlastnCommand {
    pub fn new(config: BlastConfig) -> Self {
        Self {
            config,
            databases: HashMap::new(),
            poll_interval: Duration::from_millis(100),
            db_lock: Mutex::new(()),
        }
    }

    /// Uses the executables and per-assembly `blast_db` paths of `config`.
    pub fn from_config(config: &ToolkitConfig) -> Self {
        let mut command = Self::new(config.blast.clone());
        for (assembly, source) in config.genome_sources.iter() {
            if let Some(db) = source.blast_db() {
                command
                    .databases
                    .insert(assembly.clone(), db.to_path_buf());
            }
        }
        command
    }

    pub fn with_database<P: AsRef<Path>>(
        mut self,
        assembly: &str,
        db: P,
    ) -> Self {
        self.databases
            .insert(assembly.to_string(), db.as_ref().to_path_buf());
        self
    }

    pub fn with_poll_interval(
        mut self,
        poll_interval: Duration,
    ) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn database(
        &self,
        assembly: &str,
    ) -> Result<&Path> {
        self.databases
            .get(assembly)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                HomologyError::Config(format!("no blast_db configured for '{}'", assembly))
            })
    }

    /// Builds the nucleotide index next to `db` unless it already exists.
    fn ensure_database(
        &self,
        db: &Path,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let _guard = self
            .db_lock
            .lock()
            .map_err(|_| HomologyError::ToolFailure("BLAST database lock poisoned".into()))?;
        let index = sidecar(db, ".nhr");
        if index.exists() {
            return Ok(true);
        }
        info!("Building BLAST database for {}", db.display());

        let title = db
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cottonkit".to_string());
        let mut command = Command::new(&self.config.makeblastdb);
        command
            .arg("-in")
            .arg(db)
            .args(["-dbtype", "nucl", "-parse_seqids", "-out"])
            .arg(db)
            .arg("-title")
            .arg(title);
        let Some(output) = run_to_completion(command, cancel, self.poll_interval)?
        else {
            return Ok(false);
        };

        if !output.status.success() {
            if index.exists() {
                warn!(
                    "makeblastdb exited with {} but the index was created: {}",
                    output.status,
                    output.stderr.trim()
                );
            }
            else {
                error!("makeblastdb failed: {}", output.stderr.trim());
                return Err(HomologyError::ToolFailure(format!(
                    "makeblastdb failed for {}: {}",
                    db.display(),
                    output.stderr.trim()
                )));
            }
        }
        Ok(true)
    }
}

impl AlignmentSearch for BlastnCommand {
    fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<Option<DataFrame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if request.query_fasta.trim().is_empty() {
            return Ok(Some(empty_hit_frame()?));
        }
        let db = self.database(&request.target_assembly)?;
        if !self.ensure_database(db, cancel)? {
            return Ok(None);
        }

        let mut query = tempfile::Builder::new()
            .prefix("cottonkit_query_")
            .suffix(".fa")
            .tempfile()?;
        query.write_all(request.query_fasta.as_bytes())?;
        query.flush()?;
        let out = tempfile::Builder::new()
            .prefix("cottonkit_blast_")
            .suffix(".tsv")
            .tempfile()?;

        let mut command = Command::new(&self.config.blastn);
        command
            .arg("-query")
            .arg(query.path())
            .arg("-db")
            .arg(db)
            .arg("-out")
            .arg(out.path())
            .args(["-outfmt", TABULAR_FORMAT])
            .arg("-evalue")
            .arg(request.evalue.to_string())
            .arg("-word_size")
            .arg(request.word_size.to_string())
            .arg("-max_target_seqs")
            .arg(request.max_target_seqs.to_string())
            .arg("-num_threads")
            .arg(self.config.num_threads.max(1).to_string());
        debug!("Running {:?}", command);

        let Some(output) = run_to_completion(command, cancel, self.poll_interval)?
        else {
            debug!("blastn killed after cancellation");
            return Ok(None);
        };

        match classify_stderr(&output.stderr) {
            StderrKind::Fatal => {
                error!("blastn reported a fatal error: {}", output.stderr.trim());
                return Err(HomologyError::ToolFailure(output.stderr.trim().to_string()));
            },
            StderrKind::Warning => {
                warn!("blastn: {}", output.stderr.trim());
            },
            StderrKind::Empty => {},
        }
        if !output.status.success() {
            return Err(HomologyError::ToolFailure(format!(
                "blastn exited with {}",
                output.status
            )));
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let hits = parse_tabular(File::open(out.path())?)?;
        debug!("blastn returned {} hits", hits.len());
        Ok(Some(hits_to_frame(hits)?))
    }
}

/// Exit status and collected stderr of a finished child process.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Spawns `command`, polling `cancel` every `poll_interval` while it runs.
///
/// A cancelled child is killed and `Ok(None)` is returned. Stderr goes to an
/// anonymous temporary file so a chatty tool cannot block on a full pipe.
pub fn run_to_completion(
    mut command: Command,
    cancel: &CancelToken,
    poll_interval: Duration,
) -> Result<Option<ToolOutput>> {
    let mut stderr_file = tempfile::tempfile()?;
    let program = command.get_program().to_os_string();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .map_err(|e| spawn_failure(&program, e))?;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill {:?}: {}", program, e);
            }
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(poll_interval);
    };

    let mut stderr = String::new();
    stderr_file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    stderr_file.read_to_end(&mut bytes)?;
    stderr.push_str(&String::from_utf8_lossy(&bytes));
    Ok(Some(ToolOutput { status, stderr }))
}

fn spawn_failure(
    program: &OsString,
    e: std::io::Error,
) -> HomologyError {
    if e.kind() == std::io::ErrorKind::NotFound {
        HomologyError::ToolFailure(format!(
            "{}: command not found, is BLAST+ installed and on PATH?",
            program.to_string_lossy()
        ))
    }
    else {
        HomologyError::Io(e)
    }
}

fn sidecar(
    db: &Path,
    extension: &str,
) -> PathBuf {
    let mut path = db.as_os_str().to_os_string();
    path.push(extension);
    PathBuf::from(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrKind {
    Empty,
    Warning,
    Fatal,
}

pub fn classify_stderr(stderr: &str) -> StderrKind {
    let lower = stderr.trim().to_ascii_lowercase();
    if lower.is_empty() {
        StderrKind::Empty
    }
    else if FATAL_STDERR_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        StderrKind::Fatal
    }
    else {
        StderrKind::Warning
    }
}

/// Row of [`TABULAR_FORMAT`] output.
#[derive(Debug, Deserialize)]
struct TabularRow {
    qseqid:   String,
    qlen:     u64,
    sseqid:   String,
    stitle:   String,
    slen:     u64,
    evalue:   f64,
    bitscore: f64,
    pident:   f64,
    positive: u64,
    gaps:     u64,
    length:   u64,
    qstart:   u64,
    qend:     u64,
    sstart:   u64,
    send:     u64,
    qseq:     String,
    sseq:     String,
}

impl From<TabularRow> for HomologyHit {
    fn from(row: TabularRow) -> Self {
        let positives = if row.length > 0 {
            row.positive as f64 / row.length as f64 * 100.0
        }
        else {
            0.0
        };
        HomologyHit {
            alignment_midline: alignment_midline(&row.qseq, &row.sseq),
            query_id: row.qseqid,
            query_length: row.qlen,
            hit_id: row.sseqid,
            hit_description: row.stitle,
            hit_length: row.slen,
            evalue: row.evalue,
            bit_score: row.bitscore,
            identity: row.pident,
            positives,
            gaps: row.gaps,
            alignment_length: row.length,
            query_strand: strand_from_span(row.qstart, row.qend),
            hit_strand: strand_from_span(row.sstart, row.send),
            query_start: row.qstart,
            query_end: row.qend,
            hit_start: row.sstart,
            hit_end: row.send,
            query_sequence: row.qseq,
            hit_sequence: row.sseq,
        }
    }
}

/// Parses `blastn -outfmt` [`TABULAR_FORMAT`] output. `#` lines are skipped.
pub fn parse_tabular<R: Read>(reader: R) -> Result<Vec<HomologyHit>> {
    csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .quoting(false)
        .from_reader(reader)
        .deserialize::<TabularRow>()
        .map_ok(HomologyHit::from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| HomologyError::ToolFailure(format!("unreadable blastn output: {}", e)))
}
