use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{ExpectimaxConfig, ExternalConfig, SolverParams};
use crate::engine::{Board, Move};
use crate::error::{BoardError, SolverError};
use crate::protocol;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Bridge to a native solver process.
///
/// Each decision spawns the solver, writes the board to its stdin and reads
/// one direction token back. A missing binary, a crash, a timeout or an
/// unreadable answer all come back as `None` so the caller can fall back to
/// an in-process strategy.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    binary: PathBuf,
    params: SolverParams,
    timeout: Duration,
    last_depth: Option<u32>,
}

impl ExternalSolver {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        let defaults = ExternalConfig::default();
        Self { binary: binary.into(), params: defaults.params, timeout: defaults.timeout(), last_depth: None }
    }

    pub fn with_config(cfg: &ExternalConfig) -> Self {
        Self { binary: cfg.binary.clone(), params: cfg.params, timeout: cfg.timeout(), last_depth: None }
    }

    pub fn with_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    /// Hard limit after which the solver is killed. A limit too large to add
    /// to the current instant means no limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path { &self.binary }

    pub fn params(&self) -> &SolverParams { &self.params }

    pub fn is_available(&self) -> bool { self.binary.is_file() }

    /// Depth the solver was asked to reach on the last board.
    pub fn last_depth(&self) -> Option<u32> { self.last_depth }

    /// Ask the solver for a move; any process failure is logged and reported
    /// as `Ok(None)`. Only a board at the merge limit is an error.
    pub fn choose_move(&mut self, board: Board) -> Result<Option<Move>, BoardError> {
        let board = board.check_merge_limit()?;
        self.last_depth = Some(ExpectimaxConfig::from(&self.params).search_depth(board));
        Ok(match self.run(board) {
            Ok(choice) => choice,
            Err(SolverError::Missing(path)) => {
                debug!("no native solver at {}", path.display());
                None
            }
            Err(e) => {
                warn!("native solver failed: {e}");
                None
            }
        })
    }

    /// One solver round trip with errors preserved.
    pub fn run(&self, board: Board) -> Result<Option<Move>, SolverError> {
        let board = board.check_merge_limit()?;
        if !self.binary.is_file() {
            return Err(SolverError::Missing(self.binary.clone()));
        }
        let program = self.binary.canonicalize()?;
        let mut cmd = Command::new(&program);
        cmd.args(protocol::solver_args(&self.params))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = program.parent() {
            cmd.current_dir(dir);
        }

        let deadline = Instant::now().checked_add(self.timeout);
        let mut child = cmd.spawn()?;
        let output = match collect_output(&mut child, board, deadline, self.timeout) {
            Ok(output) => output,
            Err(e) => {
                kill(&mut child);
                return Err(e);
            }
        };
        let status = wait_until(&mut child, deadline, self.timeout)?;
        if !status.success() {
            return Err(SolverError::Exit(status));
        }
        Ok(protocol::parse_reply(&String::from_utf8(output)?)?)
    }
}

/// Feed the board on stdin and gather stdout until EOF or `deadline`.
fn collect_output(
    child: &mut Child,
    board: Board,
    deadline: Option<Instant>,
    timeout: Duration,
) -> Result<Vec<u8>, SolverError> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "solver stdout not captured"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
    });

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(protocol::encode_board(board).as_bytes()) {
            // a solver may answer and exit without reading its input
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }
        // dropping stdin closes the pipe so the solver sees EOF
    }

    let read = match deadline {
        Some(deadline) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .map_err(|_| SolverError::Timeout(timeout))?,
        None => rx
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "solver stdout reader stopped"))?,
    };
    Ok(read?)
}

fn wait_until(child: &mut Child, deadline: Option<Instant>, timeout: Duration) -> Result<ExitStatus, SolverError> {
    let Some(deadline) = deadline else {
        return Ok(child.wait()?);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill(child);
            return Err(SolverError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
