use std::path::PathBuf;

/// Result of looking up one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub tool: String,
    pub present: bool,
    pub path: Option<PathBuf>,
}

/// Capability check for external commands.
pub trait CommandProbe {
    fn probe(&self, tool: &str) -> ProbeReport;
}

/// Looks commands up on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathProbe;

impl CommandProbe for PathProbe {
    fn probe(&self, tool: &str) -> ProbeReport {
        let path = which::which(tool).ok();
        ProbeReport {
            tool: tool.to_string(),
            present: path.is_some(),
            path,
        }
    }
}

/// Fixed answers, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct StaticProbe {
    present: Vec<String>,
}

impl StaticProbe {
    pub fn with(tools: &[&str]) -> Self {
        Self {
            present: tools.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl CommandProbe for StaticProbe {
    fn probe(&self, tool: &str) -> ProbeReport {
        let present = self.present.iter().any(|t| t == tool);
        ProbeReport {
            tool: tool.to_string(),
            present,
            path: present.then(|| PathBuf::from("/usr/bin").join(tool)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_probe_answers() {
        let probe = StaticProbe::with(&["jq"]);
        assert!(probe.probe("jq").present);
        let git = probe.probe("git");
        assert!(!git.present);
        assert!(git.path.is_none());
    }

    #[test]
    fn path_probe_misses_nonsense() {
        let report = PathProbe.probe("vybe-definitely-not-a-real-command-xyz");
        assert!(!report.present);
        assert_eq!(report.tool, "vybe-definitely-not-a-real-command-xyz");
    }
}
