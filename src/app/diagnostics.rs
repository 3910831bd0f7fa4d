//! Health report for `run-diagnostics`.

use std::fmt;
use std::fs;
use std::path::Path;

/// Result of one diagnostic check: a value on success, the error text otherwise.
pub type Check<T> = Result<T, String>;

/// Everything `run-diagnostics` looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsReport {
    /// A bearer token is configured
    pub token_configured: bool,
    /// Number of verified websites
    pub websites: Check<usize>,
    /// Number of readable stored schedules
    pub schedules: Check<usize>,
    /// Number of live triggers
    pub triggers: Check<usize>,
    /// Number of stored configurations without a trigger
    pub orphans: Check<usize>,
    /// Output directory and whether it accepts writes
    pub output_dir: String,
    /// Error from the write test, if it failed
    pub output_dir_error: Option<String>,
}

impl DiagnosticsReport {
    /// True when every check passed.
    pub fn is_healthy(&self) -> bool {
        self.token_configured
            && self.websites.is_ok()
            && self.schedules.is_ok()
            && self.triggers.is_ok()
            && self.orphans.as_ref().is_ok_and(|n| *n == 0)
            && self.output_dir_error.is_none()
    }
}

fn line<T: fmt::Display>(f: &mut fmt::Formatter<'_>, label: &str, check: &Check<T>) -> fmt::Result {
    match check {
        Ok(value) => writeln!(f, "  {label}: {value}"),
        Err(e) => writeln!(f, "  {label}: FAILED ({e})"),
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics:")?;
        writeln!(
            f,
            "  Access token: {}",
            if self.token_configured { "configured" } else { "missing" }
        )?;
        line(f, "Verified websites", &self.websites)?;
        line(f, "Stored schedules", &self.schedules)?;
        line(f, "Live triggers", &self.triggers)?;
        line(f, "Orphaned configurations", &self.orphans)?;
        match &self.output_dir_error {
            None => writeln!(f, "  Output directory: {} (writable)", self.output_dir)?,
            Some(e) => writeln!(f, "  Output directory: {} (not writable: {e})", self.output_dir)?,
        }
        write!(
            f,
            "Overall: {}",
            if self.is_healthy() { "OK" } else { "attention needed" }
        )
    }
}

/// Writes and removes a scratch file in `dir`.
pub(crate) fn check_writable(dir: &Path) -> Option<String> {
    let probe = dir.join(".search_backup_write_test");
    match fs::write(&probe, b"ok").and_then(|_| fs::remove_file(&probe)) {
        Ok(()) => None,
        Err(e) => Some(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> DiagnosticsReport {
        DiagnosticsReport {
            token_configured: true,
            websites: Ok(2),
            schedules: Ok(1),
            triggers: Ok(1),
            orphans: Ok(0),
            output_dir: "/tmp/backups".into(),
            output_dir_error: None,
        }
    }

    #[test]
    fn test_healthy_report() {
        let report = healthy();
        assert!(report.is_healthy());
        let text = report.to_string();
        assert!(text.contains("Access token: configured"));
        assert!(text.contains("Verified websites: 2"));
        assert!(text.ends_with("Overall: OK"));
    }

    #[test]
    fn test_failed_checks_are_reported() {
        let report = DiagnosticsReport {
            token_configured: false,
            websites: Err("Authentication failed".into()),
            orphans: Ok(3),
            ..healthy()
        };
        assert!(!report.is_healthy());
        let text = report.to_string();
        assert!(text.contains("Access token: missing"));
        assert!(text.contains("Verified websites: FAILED (Authentication failed)"));
        assert!(text.contains("Orphaned configurations: 3"));
        assert!(text.ends_with("attention needed"));
    }

    #[test]
    fn test_check_writable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_writable(dir.path()).is_none());
        assert!(check_writable(&dir.path().join("missing")).is_some());
    }
}
