//! User-facing output.
//!
//! Progress lines go to stdout, warnings to stderr. Warnings are counted so a
//! run can report them and `--strict` can fail on them.

use std::cell::Cell;

use log::debug;

#[cfg_attr(test, mockall::automock)]
pub trait Console {
    fn write_line(&self, message: &str);
    fn write_warning(&self, message: &str);
}

#[derive(Default)]
pub struct TerminalConsole {
    warnings: Cell<usize>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }
}

impl Console for TerminalConsole {
    fn write_line(&self, message: &str) {
        println!("{}", message);
    }

    fn write_warning(&self, message: &str) {
        self.warnings.set(self.warnings.get() + 1);
        debug!("warning #{}: {}", self.warnings.get(), message);
        eprintln!("warning: {}", message);
    }
}
