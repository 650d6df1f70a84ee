// src/exec/tool.rs

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::errors::TransformError;

/// An external tool invocation described by a command template.
///
/// Placeholders in braces (`{input}`, `{size}`, `{args}`) are substituted
/// before the command runs through the platform shell. `{input}` is always
/// the source path, shell-quoted. The tool's stdout becomes the output bytes.
///
/// ```text
/// pngquant --speed 5 --quality 70-80 - < {input}
/// convert {input} -resize {size}x{size} png:-
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    template: String,
}

impl ToolCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// First word of the template, used to name the tool in errors.
    pub fn program(&self) -> &str {
        self.template.split_whitespace().next().unwrap_or("")
    }

    /// Substitute placeholders. Unknown placeholders are left untouched.
    pub fn render(&self, input: &Path, vars: &[(&str, &str)]) -> String {
        let mut cmd = self
            .template
            .replace("{input}", &shell_quote(&input.to_string_lossy()));
        for (key, value) in vars {
            cmd = cmd.replace(&format!("{{{key}}}"), value);
        }
        cmd
    }

    /// Run the tool on `input` and capture its stdout.
    ///
    /// A non-zero exit becomes [`TransformError::CodecFailure`] carrying the
    /// tool's stderr.
    pub fn run(&self, input: &Path, vars: &[(&str, &str)]) -> Result<Vec<u8>, TransformError> {
        let rendered = self.render(input, vars);
        debug!(tool = %self.program(), cmd = %rendered, "running external tool");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&rendered);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&rendered);
            c
        };

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.failure(input, format!("failed to spawn: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let reason = if stderr.is_empty() {
                format!("exited with status {code}")
            } else {
                format!("exited with status {code}: {stderr}")
            };
            return Err(self.failure(input, reason));
        }

        Ok(output.stdout)
    }

    fn failure(&self, input: &Path, reason: String) -> TransformError {
        TransformError::CodecFailure {
            path: input.to_path_buf(),
            tool: self.program().to_string(),
            reason,
        }
    }
}

/// Single-quote a string for `sh`.
fn shell_quote(s: &str) -> String {
    if cfg!(windows) {
        return format!("\"{s}\"");
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_input_and_vars() {
        let tool = ToolCommand::new("convert {input} -resize {size}x{size} png:-");
        let cmd = tool.render(Path::new("src/img/favicon.png"), &[("size", "32")]);
        assert_eq!(cmd, "convert 'src/img/favicon.png' -resize 32x32 png:-");
        assert_eq!(tool.program(), "convert");
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout() {
        let tool = ToolCommand::new("cat {input}");
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in.txt");
        std::fs::write(&file, b"hello").unwrap();
        assert_eq!(tool.run(&file, &[]).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_codec_failure() {
        let tool = ToolCommand::new("echo broken >&2; exit 3");
        let err = tool.run(Path::new("a.png"), &[]).unwrap_err();
        match err {
            TransformError::CodecFailure { tool, reason, .. } => {
                assert_eq!(tool, "echo");
                assert!(reason.contains("3"));
                assert!(reason.contains("broken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
