//! Structured PowerShell invocation.
//!
//! Scripts are fixed strings. Every caller-supplied value is handed to the
//! script through an environment variable so that nothing user-controlled is
//! ever spliced into script text.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, trace};

use crate::error::GatewayError;

/// Default PowerShell executable.
pub const DEFAULT_POWERSHELL: &str = "powershell";

/// Runs fixed PowerShell scripts with parameters passed in the environment.
#[derive(Debug, Clone)]
pub struct PowerShell {
    program: String,
}

impl Default for PowerShell {
    fn default() -> Self {
        Self::new(DEFAULT_POWERSHELL)
    }
}

impl PowerShell {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `script`, setting each `(name, Some(value))` in the child environment
    /// and removing each `(name, None)`. Returns trimmed stdout.
    pub fn run(&self, script: &str, params: &[(&str, Option<String>)]) -> Result<String, GatewayError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
        for (name, value) in params {
            match value {
                Some(v) => cmd.env(name, v),
                None => cmd.env_remove(name),
            };
        }

        let start = Instant::now();
        let output = cmd
            .output()
            .map_err(|e| GatewayError::Unavailable(format!("failed to spawn {}: {}", self.program, e)))?;
        debug!(
            "{} finished in {:.1}ms with {}",
            self.program,
            start.elapsed().as_secs_f64() * 1000.0,
            output.status
        );

        if !output.status.success() {
            return Err(GatewayError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        trace!("{} stdout: {}", self.program, stdout);
        Ok(stdout)
    }

    /// Checks that the executable can be started at all.
    pub fn probe(&self) -> Result<String, GatewayError> {
        self.run("$PSVersionTable.PSVersion.ToString()", &[])
    }
}

/// `ConvertTo-Json` emits a bare object for one result and an array for many.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(row) => vec![row],
            OneOrMany::Many(rows) => rows,
        }
    }
}

/// Parses `ConvertTo-Json` output into a list, treating empty output as no rows.
pub fn parse_json_rows<T: DeserializeOwned>(output: &str) -> Result<Vec<T>, GatewayError> {
    let output = output.trim();
    if output.is_empty() || output == "null" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str::<OneOrMany<T>>(output)?.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
    }

    #[test]
    fn test_parse_single_object() {
        let rows: Vec<Row> = parse_json_rows(r#"{"Name":"Auto_zoom"}"#).unwrap();
        assert_eq!(rows, vec![Row { name: "Auto_zoom".into() }]);
    }

    #[test]
    fn test_parse_array() {
        let rows: Vec<Row> = parse_json_rows(r#"[{"Name":"a"},{"Name":"b"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_empty_output() {
        let rows: Vec<Row> = parse_json_rows("  \r\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let res: Result<Vec<Row>, _> = parse_json_rows("Get-NetQosPolicy : Access denied");
        assert!(matches!(res, Err(GatewayError::MalformedPayload(_))));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let ps = PowerShell::new("vpn-qos-no-such-shell-xyz");
        assert!(matches!(ps.run("exit 0", &[]), Err(GatewayError::Unavailable(_))));
    }
}
