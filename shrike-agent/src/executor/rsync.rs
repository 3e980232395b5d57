//! rsync invocation and output parsing.
//!
//! Command shape: `rsync -avrR --files-from=<manifest> / <destination>/`.

use crate::models::SyncResult;
use crate::utils::errors::{Result, SyncError};
use chrono::Utc;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Lines of rsync's verbose output that never name a transferred item.
const SUMMARY_PREFIXES: [&str; 4] = ["sending", "sent ", "total ", "building "];

/// Build the rsync argument vector.
///
/// `-r` must stay next to `--files-from`: a files-from list turns off the
/// recursion `-a` implies, and directories would arrive as empty shells.
pub fn build_arguments(manifest_path: &str, destination: &str) -> Vec<String> {
    vec![
        "-avrR".to_string(),
        format!("--files-from={manifest_path}"),
        "/".to_string(),
        format!("{}/", destination.trim_end_matches('/')),
    ]
}

/// Counts extracted from rsync's verbose listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounts {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

/// Count transferred files and directories; directories end with `/`.
pub fn parse_transfer_counts(stdout: &str) -> TransferCounts {
    let mut counts = TransferCounts::default();

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "." || trimmed == "./" {
            continue;
        }
        if trimmed.starts_with("sent ") {
            if let Some(bytes) = parse_sent_bytes(trimmed) {
                counts.bytes = bytes;
            }
            continue;
        }
        if SUMMARY_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            continue;
        }

        if trimmed.ends_with('/') {
            counts.dirs += 1;
        } else {
            counts.files += 1;
        }
    }

    counts
}

/// `sent 1,234 bytes  received 56 bytes ...` -> 1234
fn parse_sent_bytes(line: &str) -> Option<u64> {
    let mut words = line.split_whitespace();
    if words.next()? != "sent" {
        return None;
    }
    let number: String = words.next()?.chars().filter(|c| *c != ',').collect();
    number.parse().ok()
}

/// Runs the sync tool with a prepared argument vector. Blocking.
pub trait SyncRunner: Send + Sync {
    fn run(&self, args: &[String]) -> Result<SyncResult>;
}

/// Production runner: spawns the rsync binary and waits for it.
#[derive(Debug, Clone)]
pub struct RsyncRunner {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl RsyncRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the tool if it has not exited after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                warn!(
                    "{} exceeded {}s, terminating",
                    self.program.display(),
                    limit.as_secs()
                );
                terminate(child)?;
                return Err(SyncError::SubprocessTimeout {
                    secs: limit.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for RsyncRunner {
    fn default() -> Self {
        Self::new("rsync")
    }
}

impl SyncRunner for RsyncRunner {
    fn run(&self, args: &[String]) -> Result<SyncResult> {
        info!("Running {} {}", self.program.display(), args.join(" "));

        // Own process group so a timeout can take down rsync's helper processes too
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = self.wait(&mut child)?;

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        let exit_code = status.code().unwrap_or(-1);

        debug!("rsync exited with {}: {} bytes stdout, {} bytes stderr", exit_code, stdout.len(), stderr.len());

        if !status.success() {
            return Err(SyncError::SubprocessFailure { exit_code, stderr });
        }

        let counts = parse_transfer_counts(&stdout);
        Ok(SyncResult {
            files_transferred: counts.files,
            dirs_transferred: counts.dirs,
            bytes_transferred: counts.bytes,
            stdout,
            stderr,
            exit_code,
            synced_at: Utc::now(),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                warn!("Failed to read rsync output: {}", e);
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// SIGTERM the process group, then SIGKILL after a grace period.
fn terminate(child: &mut Child) -> Result<()> {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        debug!("SIGTERM to process group {} failed: {}", pgid, e);
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }

    let _ = killpg(pgid, Signal::SIGKILL);
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Writing and exec'ing scripts from parallel tests can hit ETXTBSY
    static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

    fn write_script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-rsync");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn run_script(body: &str, args: &[String], timeout: Option<Duration>) -> Result<SyncResult> {
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, body);
        RsyncRunner::new(script).with_timeout(timeout).run(args)
    }

    #[test]
    fn test_build_arguments_shape() {
        let args = build_arguments("/tmp/filelist.txt", "/mnt/backup");
        assert_eq!(args, vec!["-avrR", "--files-from=/tmp/filelist.txt", "/", "/mnt/backup/"]);
    }

    #[test]
    fn test_recursive_flag_always_paired_with_files_from() {
        for dest in ["/dest", "/dest/", "/mnt/My Backup", "/mnt/我的云端硬盘/ShrikeBackup"] {
            let args = build_arguments("/tmp/my list.txt", dest);
            let flags = &args[0];
            assert!(flags.starts_with('-') && flags.contains('r') && flags.contains('R'));
            assert!(args.iter().any(|a| a == "--files-from=/tmp/my list.txt"));
            assert_eq!(args[2], "/");
        }
    }

    #[test]
    fn test_destination_single_trailing_separator() {
        assert_eq!(build_arguments("/m", "/dest")[3], "/dest/");
        assert_eq!(build_arguments("/m", "/dest/")[3], "/dest/");
        assert_eq!(
            build_arguments("/m", "/mnt/我的云端硬盘/ShrikeBackup")[3],
            "/mnt/我的云端硬盘/ShrikeBackup/"
        );
    }

    #[test]
    fn test_parse_mixed_listing() {
        let out = "sending incremental file list\na.txt\nb/\nsent 120 bytes\ntotal size is 500\n";
        let counts = parse_transfer_counts(out);
        assert_eq!((counts.files, counts.dirs), (1, 1));
        assert_eq!(counts.bytes, 120);
    }

    #[test]
    fn test_parse_typical_output() {
        let out = "\
building file list ... done
sending incremental file list
./
.
Users/me/.zshrc
dir1/
dir1/file1.txt
dir2/sub/
Users/me/日本語/ファイル.txt

\t
sent 1,234 bytes  received 56 bytes  2580.00 bytes/sec
total size is 1000  speedup is 0.78
";
        assert_eq!(
            parse_transfer_counts(out),
            TransferCounts {
                files: 3,
                dirs: 2,
                bytes: 1234
            }
        );
    }

    #[test]
    fn test_parse_empty_and_summary_only() {
        assert_eq!(parse_transfer_counts(""), TransferCounts::default());
        let out = "sending incremental file list\n\nsent 100 bytes  received 20 bytes  240.00 bytes/sec\ntotal size is 0  speedup is 0.00\n";
        let counts = parse_transfer_counts(out);
        assert_eq!((counts.files, counts.dirs, counts.bytes), (0, 0, 100));
    }

    #[test]
    fn test_run_success_parses_output() {
        let args = build_arguments("/tmp/m.txt", "/tmp/dest");
        let result = run_script(
            r#"echo "sending incremental file list"
echo "home/me/a.txt"
echo "home/me/docs/"
echo "sent 42 bytes  received 10 bytes  104.00 bytes/sec"
echo "warning" >&2"#,
            &args,
            None,
        )
        .unwrap();

        assert!(result.is_success());
        assert_eq!(result.files_transferred, 1);
        assert_eq!(result.dirs_transferred, 1);
        assert_eq!(result.bytes_transferred, 42);
        assert_eq!(result.stderr.trim(), "warning");
    }

    #[test]
    fn test_run_receives_arguments_in_order() {
        let args = build_arguments("/tmp/m.txt", "/tmp/dest");
        let result = run_script(r#"for a in "$@"; do echo "arg:$a"; done"#, &args, None).unwrap();
        let echoed: Vec<&str> = result.stdout.lines().collect();
        assert_eq!(
            echoed,
            vec!["arg:-avrR", "arg:--files-from=/tmp/m.txt", "arg:/", "arg:/tmp/dest/"]
        );
    }

    #[test]
    fn test_run_nonzero_exit_is_failure() {
        let err = run_script(r#"echo "some files vanished" >&2; exit 23"#, &[], None).unwrap_err();
        match err {
            SyncError::SubprocessFailure { exit_code, stderr } => {
                assert_eq!(exit_code, 23);
                assert!(stderr.contains("vanished"));
            }
            other => panic!("expected SubprocessFailure, got {other}"),
        }
    }

    #[test]
    fn test_run_timeout_kills_tool() {
        let started = Instant::now();
        let err = run_script("sleep 30", &[], Some(Duration::from_millis(300))).unwrap_err();
        assert!(matches!(err, SyncError::SubprocessTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let runner = RsyncRunner::new(Path::new("/nonexistent/rsync-binary"));
        assert!(matches!(runner.run(&[]), Err(SyncError::Io(_))));
    }
}
