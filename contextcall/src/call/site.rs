//! Best-effort creation-site capture.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Source location where a call was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Source file path.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl CallSite {
    /// Creates a new call site.
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Captures the site for a call being constructed on this thread.
    ///
    /// Asks the probe installed on the current thread first, then falls back
    /// to `caller`. Never fails; returns `None` when nothing is known.
    pub(crate) fn capture(caller: &Location<'_>) -> Option<Self> {
        let probed = SITE_PROBE.with(|slot| slot.borrow().as_ref().map(|probe| probe.probe()));
        match probed {
            Some(site) => site,
            None => Some(Self::from(caller)),
        }
    }
}

impl From<&Location<'_>> for CallSite {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Host-provided frame introspection.
///
/// Hosts embedding a scripting engine install a probe on the logic thread
/// so calls created from script code report the script location rather
/// than the Rust binding that constructed them.
#[cfg_attr(test, mockall::automock)]
pub trait SiteProbe: Send + Sync {
    /// Returns the location of the code currently executing, if known.
    fn probe(&self) -> Option<CallSite>;
}

thread_local! {
    static SITE_PROBE: RefCell<Option<Arc<dyn SiteProbe>>> = const { RefCell::new(None) };
}

/// Installs a site probe for calls created on the current thread.
///
/// Returns the previously installed probe.
pub fn install_site_probe(probe: Arc<dyn SiteProbe>) -> Option<Arc<dyn SiteProbe>> {
    SITE_PROBE.with(|slot| slot.borrow_mut().replace(probe))
}

/// Removes the site probe installed on the current thread.
pub fn clear_site_probe() -> Option<Arc<dyn SiteProbe>> {
    SITE_PROBE.with(|slot| slot.borrow_mut().take())
}
