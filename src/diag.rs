//! Warning channel.
//!
//! Non-fatal conditions (field overflow clamps, skipped members,
//! checksum mismatches) are reported here rather than raised as errors,
//! so one bad member never aborts a run. Messages are forwarded through
//! the `log` facade prefixed with the program invocation name; any
//! warning makes the final exit status non-zero even when processing
//! otherwise completes.

use std::fmt;

/// Diagnostic sink for one archive operation.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    program: String,
    warnings: u32,
}

impl Diagnostics {
    /// New sink prefixing messages with the given invocation name.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            warnings: 0,
        }
    }

    /// Emit a warning. Sets the non-zero exit status.
    pub fn warn(&mut self, msg: impl fmt::Display) {
        self.warnings += 1;
        log::warn!("{}: {}", self.program, msg);
    }

    /// Emit a debug echo. Does not affect the exit status.
    pub fn debug(&self, msg: impl fmt::Display) {
        log::debug!("{}: {}", self.program, msg);
    }

    /// Number of warnings emitted so far.
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Final process exit status: 0 if clean, 1 once anything warned.
    pub fn exit_status(&self) -> i32 {
        i32::from(self.warnings > 0)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new("pax")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_sets_exit_status() {
        let mut diag = Diagnostics::new("pax");
        assert_eq!(diag.exit_status(), 0);
        diag.warn("uid overflow for ./f");
        assert_eq!(diag.warnings(), 1);
        assert_eq!(diag.exit_status(), 1);
    }

    #[test]
    fn test_debug_does_not_warn() {
        let diag = Diagnostics::new("pax");
        diag.debug("writing mode 100644");
        assert_eq!(diag.exit_status(), 0);
    }
}
