// Machine-readable run report (--json)

use serde::Serialize;

/// Summary of one supervised run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub command: Vec<String>,
    pub pid: Option<u32>,
    /// Exit code of the child; None if the run failed
    pub exit_code: Option<i32>,
    /// "timeout", "interrupted", "error" or None on a normal exit
    pub failure: Option<&'static str>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}
