//! Headless Chrome/Edge `--print-to-pdf` path.

use crate::error::ExternalError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

pub const DEFAULT_BROWSER_ENV: &str = "CHROME_PATH";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const SCRATCH_PREFIX: &str = "vyaudit-pdf-";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn default_candidates() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(windows) {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
        ]
    };
    paths.iter().map(PathBuf::from).collect()
}

/// Lookup order: explicit path, environment override, candidate list. Only
/// paths that exist as files are accepted.
#[derive(Debug, Clone)]
pub struct BrowserLocator {
    pub explicit: Option<PathBuf>,
    pub env_var: Option<String>,
    pub candidates: Vec<PathBuf>,
}

impl Default for BrowserLocator {
    fn default() -> Self {
        Self {
            explicit: None,
            env_var: Some(DEFAULT_BROWSER_ENV.to_string()),
            candidates: default_candidates(),
        }
    }
}

impl BrowserLocator {
    pub fn resolve(&self) -> Option<PathBuf> {
        self.resolve_with(|name| std::env::var_os(name))
    }

    pub(crate) fn resolve_with(&self, env: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
        if let Some(path) = self.explicit.as_ref().filter(|p| p.is_file()) {
            return Some(path.clone());
        }
        let from_env = self
            .env_var
            .as_deref()
            .and_then(|name| env(name))
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .filter(|p| p.is_file());
        if from_env.is_some() {
            return from_env;
        }
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }
}

fn is_url_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/' | b':')
}

/// `file://` URL for an absolute path, percent-encoding everything outside
/// the unreserved set.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut out = String::from("file://");
    if !raw.starts_with('/') {
        out.push('/');
    }
    for byte in raw.bytes() {
        if is_url_safe(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn print_args(pdf_path: &Path, url: &str) -> Vec<OsString> {
    let mut print_to = OsString::from("--print-to-pdf=");
    print_to.push(pdf_path.as_os_str());
    vec![
        "--headless=new".into(),
        "--disable-gpu".into(),
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--print-to-pdf-no-header".into(),
        print_to,
        url.into(),
    ]
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ExternalError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExternalError::Spawn(err));
            }
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExternalError::Timeout(timeout.as_millis()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Writes `html` into a fresh scratch directory, prints it with `binary` and
/// returns the produced bytes. The scratch directory is removed when this
/// returns, whatever the outcome.
pub(crate) fn render_with_browser(
    binary: &Path,
    html: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ExternalError> {
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(ExternalError::Workspace)?;
    let html_path = scratch.path().join("report.html");
    let pdf_path = scratch.path().join("report.pdf");
    fs::write(&html_path, html).map_err(ExternalError::Workspace)?;

    let mut child = Command::new(binary)
        .args(print_args(&pdf_path, &file_url(&html_path)))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(ExternalError::Spawn)?;

    let status = wait_with_deadline(&mut child, timeout)?;
    if !status.success() {
        return Err(ExternalError::Failed(status.code()));
    }
    let bytes = fs::read(&pdf_path).map_err(ExternalError::Read)?;
    if bytes.is_empty() {
        return Err(ExternalError::InvalidOutput("empty output".to_string()));
    }
    Ok(bytes)
}
