// src/scrape/process.rs
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use super::{ScrapeInvoker, ScrapeRun};
use crate::config::consts::{SCRAPE_DRAIN_GRACE_MS, SCRAPE_POLL_MS};
use crate::config::{GeoArgs, Launcher, ScrapeOptions};
use crate::error::ScrapeError;

/// Runs the scraper as a child process.
pub struct ProcessInvoker {
    opts: ScrapeOptions,
    cancel: Option<Arc<AtomicBool>>,
}

enum Waited {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

impl ProcessInvoker {
    pub fn new(opts: ScrapeOptions) -> Self {
        Self { opts, cancel: None }
    }

    /// Kill the child as soon as `flag` flips to true.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.opts
    }

    /// Scraper arguments: queries in, JSON results out, extended reviews, fixed geo.
    pub fn scraper_args(&self, output: &Path, geo: &GeoArgs) -> Vec<String> {
        let mut args = vec![
            s!("-input"),
            self.opts.queries.to_string_lossy().into_owned(),
            s!("-results"),
            output.to_string_lossy().into_owned(),
            s!("-json"),
            s!("-extra-reviews"),
            s!("-geo"),
            geo.center(),
            s!("-zoom"),
            geo.zoom.to_string(),
            s!("-depth"),
            self.opts.depth.to_string(),
            s!("-exit-on-inactivity"),
            self.opts.exit_on_inactivity.clone(),
        ];
        args.extend(self.opts.extra_args.iter().cloned());
        args
    }

    fn command(&self, output: &Path, geo: &GeoArgs) -> (String, Command) {
        let args = self.scraper_args(output, geo);
        match &self.opts.launcher {
            Launcher::Direct => {
                let program = self.opts.executable.to_string_lossy().into_owned();
                let mut cmd = Command::new(&self.opts.executable);
                cmd.args(&args);
                (program, cmd)
            }
            Launcher::CompatShell { program, args: shell_args } => {
                let mut cmd = Command::new(program);
                cmd.args(shell_args).arg(&self.opts.executable).args(&args);
                (program.clone(), cmd)
            }
        }
    }

    fn wait(&self, child: &mut Child) -> std::io::Result<Waited> {
        if self.opts.timeout.is_none() && self.cancel.is_none() {
            return child.wait().map(Waited::Exited);
        }

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Waited::Exited(status));
            }
            if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
                kill(child);
                return Ok(Waited::Cancelled);
            }
            if let Some(limit) = self.opts.timeout {
                if started.elapsed() >= limit {
                    kill(child);
                    return Ok(Waited::TimedOut(limit));
                }
            }
            thread::sleep(Duration::from_millis(SCRAPE_POLL_MS));
        }
    }
}

impl ScrapeInvoker for ProcessInvoker {
    fn invoke(&self, output: &Path, geo: &GeoArgs) -> Result<ScrapeRun, ScrapeError> {
        let (program, mut cmd) = self.command(output, geo);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        // Own process group, so a timeout takes the browser workers down too.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        logf!("Scrape: Launch program={program} output={} geo={} zoom={}",
            output.display(), geo.center(), geo.zoom);

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|source| ScrapeError::Spawn { program: program.clone(), source })?;

        // Drain both pipes off-thread so a chatty child never blocks on a full pipe.
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        if let Some(pipe) = child.stdout.take() {
            drain(pipe, Arc::clone(&stdout), done_tx.clone(), true);
        }
        if let Some(pipe) = child.stderr.take() {
            drain(pipe, Arc::clone(&stderr), done_tx.clone(), false);
        }
        drop(done_tx);

        let waited = self.wait(&mut child);

        // Anything still holding our pipes after the exit gets a short grace period.
        let grace = Instant::now() + Duration::from_millis(SCRAPE_DRAIN_GRACE_MS);
        loop {
            match done_rx.recv_timeout(grace.saturating_duration_since(Instant::now())) {
                Ok(()) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    logw!("Scrape: Output pipes still open after exit, not waiting further");
                    break;
                }
            }
        }
        let stdout = collected(&stdout);
        let stderr = collected(&stderr);
        let elapsed = started.elapsed();

        match waited? {
            Waited::Exited(status) if status.success() => {
                logf!("Scrape: Done in {:.1}s", elapsed.as_secs_f64());
                Ok(ScrapeRun { stdout, stderr, elapsed })
            }
            Waited::Exited(status) => {
                loge!("Scrape: Failed status={status}");
                Err(ScrapeError::Process { code: status.code(), stderr })
            }
            Waited::TimedOut(after) => {
                loge!("Scrape: Timed out after {after:?}");
                Err(ScrapeError::Timeout { after, stderr })
            }
            Waited::Cancelled => {
                logw!("Scrape: Cancelled");
                Err(ScrapeError::Cancelled { stderr })
            }
        }
    }
}

/// Read `pipe` to EOF into `sink`, byte for byte. Stdout lines are also logged.
fn drain<R>(pipe: R, sink: Arc<Mutex<Vec<u8>>>, done: mpsc::Sender<()>, log_lines: bool)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if log_lines {
                        logd!("Scrape: stdout {}", String::from_utf8_lossy(&line).trim_end());
                    }
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(&line);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    logd!("Scrape: Pipe read failed: {e}");
                    break;
                }
            }
        }
        let _ = done.send(());
    });
}

fn collected(buf: &Mutex<Vec<u8>>) -> String {
    match buf.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
    }
}

fn kill(child: &mut Child) {
    // Negative pid: the whole group started with `process_group(0)`.
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn opts() -> ScrapeOptions {
        ScrapeOptions {
            executable: PathBuf::from("gmaps"),
            queries: PathBuf::from("q.txt"),
            launcher: Launcher::Direct,
            ..ScrapeOptions::default()
        }
    }

    #[test]
    fn args_select_output_json_reviews_and_geo() {
        let inv = ProcessInvoker::new(opts());
        let geo = GeoArgs { lat: -33.5, lon: 151.25, zoom: 11 };
        let args = inv.scraper_args(Path::new("out.jsonl"), &geo);

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-results") + 1], "out.jsonl");
        assert_eq!(args[pos("-input") + 1], "q.txt");
        assert_eq!(args[pos("-geo") + 1], "-33.5,151.25");
        assert_eq!(args[pos("-zoom") + 1], "11");
        assert!(args.contains(&s!("-json")));
        assert!(args.contains(&s!("-extra-reviews")));
    }

    #[test]
    fn compat_shell_prefixes_program() {
        let mut o = opts();
        o.launcher = Launcher::CompatShell { program: s!("wsl"), args: vec![s!("-e")] };
        let inv = ProcessInvoker::new(o);
        let (program, cmd) = inv.command(Path::new("out.jsonl"), &GeoArgs::default());

        assert_eq!(program, "wsl");
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..2], &["-e", "gmaps"]);
        assert!(args.contains(&s!("-results")));
    }

    #[test]
    fn missing_executable_is_spawn_error() {
        let mut o = opts();
        o.executable = PathBuf::from("/definitely/not/here/gmaps");
        let inv = ProcessInvoker::new(o);
        let err = inv.invoke(Path::new("out.jsonl"), &GeoArgs::default()).unwrap_err();
        assert!(matches!(err, ScrapeError::Spawn { .. }));
    }
}
