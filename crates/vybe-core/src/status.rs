use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity reported by a single validator check.
///
/// Ordering is meaningful: `Ok < Degraded < Fatal`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Degraded,
    Fatal,
}

/// Tri-state readiness verdict. Ordering is meaningful: `Ready < Partial < Failed`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadyStatus {
    Ready,
    Partial,
    Failed,
}

impl ReadyStatus {
    /// Process exit code for the validator CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Ready => 0,
            Self::Partial => 1,
            Self::Failed => 2,
        }
    }

    /// Overall status for a set of check severities: the maximum wins.
    pub fn dominant<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .map(Self::from)
            .max()
            .unwrap_or(Self::Ready)
    }
}

impl From<Severity> for ReadyStatus {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Ok => Self::Ready,
            Severity::Degraded => Self::Partial,
            Severity::Fatal => Self::Failed,
        }
    }
}

impl fmt::Display for ReadyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ReadyStatus::Ready.exit_code(), 0);
        assert_eq!(ReadyStatus::Partial.exit_code(), 1);
        assert_eq!(ReadyStatus::Failed.exit_code(), 2);
    }

    #[test]
    fn single_fatal_dominates() {
        let sev = [Severity::Ok, Severity::Ok, Severity::Fatal, Severity::Ok];
        assert_eq!(ReadyStatus::dominant(sev), ReadyStatus::Failed);
    }

    #[test]
    fn fatal_beats_degraded() {
        let sev = [Severity::Degraded, Severity::Fatal, Severity::Degraded];
        assert_eq!(ReadyStatus::dominant(sev), ReadyStatus::Failed);
        assert_eq!(
            ReadyStatus::dominant([Severity::Ok, Severity::Degraded]),
            ReadyStatus::Partial
        );
    }

    #[test]
    fn empty_is_ready() {
        assert_eq!(ReadyStatus::dominant([]), ReadyStatus::Ready);
    }
}
