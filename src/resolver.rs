//! Resolves command-line patterns to live process ids.

use crate::core::{Pid, ProcessLister};
use tracing::{trace, warn};

/// Finds the process whose invoked command line contains a pattern.
pub struct ProcessResolver {
    lister: Box<dyn ProcessLister>,
    excluded_pid: Option<Pid>,
}

impl ProcessResolver {
    pub fn new(lister: Box<dyn ProcessLister>) -> Self {
        Self {
            lister,
            excluded_pid: None,
        }
    }

    /// Never resolve to `pid`. Used to keep the sampler from matching its own
    /// command line.
    pub fn excluding(mut self, pid: Pid) -> Self {
        self.excluded_pid = Some(pid);
        self
    }

    /// Returns the pid of a live process whose command line contains
    /// `pattern` as a plain substring, or `None` if nothing matches.
    ///
    /// When several processes match, the highest pid wins. Processes whose
    /// command line cannot be read are skipped.
    pub fn resolve(&self, pattern: &str) -> Option<Pid> {
        let pids = match self.lister.pids() {
            Ok(pids) => pids,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate processes");
                return None;
            }
        };

        let matches: Vec<Pid> = pids
            .into_iter()
            .filter(|&pid| Some(pid) != self.excluded_pid)
            .filter(|&pid| {
                self.lister
                    .cmdline(pid)
                    .map_or(false, |cmdline| cmdline.contains(pattern))
            })
            .collect();

        let best = matches.iter().copied().max()?;
        if matches.len() > 1 {
            trace!(pattern, count = matches.len(), pid = best, "Multiple processes match; picking the highest pid");
        }
        Some(best)
    }
}
