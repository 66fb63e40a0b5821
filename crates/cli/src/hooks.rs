// Hooks used by the CLI: echo child output as it arrives

use std::convert::Infallible;
use std::io::Write;

use procwarden_core::port::hooks::{log_exit_code, record_error_output, record_output};
use procwarden_core::port::ProcessHooks;

/// Records every line and, unless quiet, mirrors it to our own stdout/stderr
#[derive(Debug, Clone, Copy)]
pub struct EchoHooks {
    echo: bool,
}

impl EchoHooks {
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }
}

impl ProcessHooks for EchoHooks {
    type Error = Infallible;

    fn handle_output(&self, line: String, lines: &mut Vec<String>) -> Result<(), Infallible> {
        if self.echo {
            // A closed stdout must not take the child down with it
            let _ = writeln!(std::io::stdout().lock(), "{line}");
        }
        record_output(line, lines);
        Ok(())
    }

    fn handle_error_output(
        &self,
        line: String,
        lines: &mut Vec<String>,
    ) -> Result<(), Infallible> {
        if self.echo {
            let _ = writeln!(std::io::stderr().lock(), "{line}");
        }
        record_error_output(line, lines);
        Ok(())
    }

    fn handle_exit_code(&self, code: i32) -> Result<(), Infallible> {
        log_exit_code(code);
        Ok(())
    }
}
