//! Program identity
//!
//! A supervised program is identified by its whitespace-normalized command line.

use std::fmt;

use crate::config::ProgramEntry;
use crate::error::{Result, WatchdogError};

/// Collapse runs of whitespace to single spaces and trim both ends.
pub fn normalize<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .flat_map(|token| token.as_ref().split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A canonical command line the supervisor keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramSpec {
    command: String,
}

impl ProgramSpec {
    /// Returns `None` when the command is empty after normalization.
    pub fn new(command: &str) -> Option<Self> {
        let command = normalize(&[command]);
        if command.is_empty() {
            None
        } else {
            Some(Self { command })
        }
    }

    /// Build a spec from a configured entry. Pre-split token lists are rejected.
    pub fn from_entry(entry: &ProgramEntry) -> Result<Self> {
        match entry {
            ProgramEntry::Command(command) => Self::new(command)
                .ok_or_else(|| WatchdogError::Config("empty program command".to_string())),
            ProgramEntry::Tokens(tokens) => Err(WatchdogError::Config(format!(
                "program {:?} is a list; write it as a single command string",
                tokens
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.command
    }

    /// Program followed by its arguments.
    pub fn tokens(&self) -> Vec<&str> {
        self.command.split(' ').collect()
    }

    /// True if a process command line is this program.
    pub fn matches<S: AsRef<str>>(&self, cmdline: &[S]) -> bool {
        normalize(cmdline) == self.command
    }
}

impl fmt::Display for ProgramSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize(&["  a   b "]), "a b");
        assert_eq!(normalize(&["a b"]), "a b");
        assert_eq!(normalize(&["a\tb\n c"]), "a b c");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["  python   job.py  --flag ", "x", "", "  "] {
            let once = normalize(&[raw]);
            assert_eq!(normalize(&[once.as_str()]), once);
        }
    }

    #[test]
    fn test_normalize_tokens_joined() {
        assert_eq!(normalize(&["python", "job.py", "--flag"]), "python job.py --flag");
        assert_eq!(normalize(&["python", "", "job.py"]), "python job.py");
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(ProgramSpec::new("").is_none());
        assert!(ProgramSpec::new("   \t ").is_none());
    }

    #[test]
    fn test_spec_identity() {
        let a = ProgramSpec::new("  myjob   --flag").unwrap();
        let b = ProgramSpec::new("myjob --flag").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "myjob --flag");
        assert_eq!(a.tokens(), vec!["myjob", "--flag"]);
        assert_eq!(a.to_string(), "myjob --flag");
    }

    #[test]
    fn test_matches_process_cmdline() {
        let spec = ProgramSpec::new("python /opt/while.py").unwrap();
        assert!(spec.matches(&["python", "/opt/while.py"]));
        assert!(!spec.matches(&["python", "/opt/while.py", "-x"]));
        assert!(!spec.matches(&["python3", "/opt/while.py"]));
    }

    #[test]
    fn test_from_entry() {
        let ok = ProgramSpec::from_entry(&ProgramEntry::Command("sleep  5".to_string())).unwrap();
        assert_eq!(ok.as_str(), "sleep 5");

        let tokens = ProgramEntry::Tokens(vec!["sleep".to_string(), "5".to_string()]);
        assert!(matches!(ProgramSpec::from_entry(&tokens), Err(WatchdogError::Config(_))));

        let empty = ProgramEntry::Command("  ".to_string());
        assert!(matches!(ProgramSpec::from_entry(&empty), Err(WatchdogError::Config(_))));
    }
}
