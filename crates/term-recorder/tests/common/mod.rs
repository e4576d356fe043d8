#![allow(dead_code)]

use assert_cmd::Command;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

pub const BIN: &str = env!("CARGO_BIN_EXE_term-recorder");

pub fn recorder_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("term-recorder"));
    cmd.env_remove("TERM_RECORDER_DIR")
        .env_remove("TERM_RECORDER_SHELL")
        .env_remove("TERM_RECORDER_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Session files for `id` inside `dir`.
pub struct SessionFiles {
    pub lock: PathBuf,
    pub owner: PathBuf,
    pub log: PathBuf,
}

impl SessionFiles {
    pub fn new(dir: &Path, id: &str) -> Self {
        Self {
            lock: dir.join(format!("terminal_{id}.lock")),
            owner: dir.join(format!("terminal_{id}.pid")),
            log: dir.join(format!("terminal_{id}.log")),
        }
    }

    pub fn log_text(&self) -> String {
        String::from_utf8_lossy(&std::fs::read(&self.log).unwrap_or_default()).to_string()
    }
}

/// Starts a recorder in the background running `/bin/sh -c script`.
pub fn spawn_recorder(dir: &Path, id: &str, script: &str) -> Child {
    std::process::Command::new(BIN)
        .args(["--shell", "/bin/sh", id])
        .arg(dir)
        .args(["--", "-c", script])
        .env_remove("TERM_RECORDER_LOG")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn term-recorder")
}

/// Blocks until the recorder reports that recording started.
///
/// The message is printed after signal handlers are installed, so signals
/// sent afterwards reach the recorder's own handling.
pub fn wait_until_recording(child: &mut Child) {
    let stderr = child.stderr.take().expect("stderr must be piped");
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).expect("Failed to read stderr");
        assert!(n > 0, "recorder exited before recording started");
        if line.contains("Recording session to") {
            break;
        }
    }
    // Keep draining so the recorder never blocks on a full pipe.
    std::thread::spawn(move || {
        let mut sink = String::new();
        while reader.read_line(&mut sink).map(|n| n > 0).unwrap_or(false) {
            sink.clear();
        }
    });
}

pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().expect("Failed to poll recorder") {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("recorder did not exit within {:?}", timeout);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

pub fn send_signal(child: &Child, signal: libc::c_int) {
    let result = unsafe { libc::kill(child.id() as libc::pid_t, signal) };
    assert_eq!(result, 0, "failed to signal recorder");
}
