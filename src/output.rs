/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// tests can capture what a command prints.
pub trait UserOutput {
    /// Informational message (e.g., "Validating authstack.yaml...")
    fn status(&self, message: &str);

    /// Success message (e.g., "Manifest is valid")
    fn success(&self, message: &str);

    /// Warning message (e.g., an advisory about a public route)
    fn warning(&self, message: &str);

    /// Error message
    fn error(&self, message: &str);

    /// A blank line separator.
    fn blank(&self);
}

/// Standard CLI output: results to stdout, diagnostics to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn blank(&self) {
        println!();
    }
}

/// Records output lines for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingOutput {
    pub lines: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl RecordingOutput {
    pub fn text(&self) -> String {
        self.lines.borrow().join("\n")
    }
}

#[cfg(test)]
impl UserOutput for RecordingOutput {
    fn status(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.lines.borrow_mut().push(format!("warning: {}", message));
    }

    fn error(&self, message: &str) {
        self.lines.borrow_mut().push(format!("error: {}", message));
    }

    fn blank(&self) {
        self.lines.borrow_mut().push(String::new());
    }
}
