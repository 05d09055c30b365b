use std::path::Path;

/// Program and arguments for one shell invocation.
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

/// Run `command` through the platform shell (`$SHELL -c`, or PowerShell).
#[must_use]
pub fn shell_command(command: &str) -> CommandSpec {
    if cfg!(target_os = "windows") {
        CommandSpec {
            program: "powershell".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                command.to_string(),
            ],
        }
    } else {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string());
        CommandSpec {
            program: shell,
            args: vec!["-c".to_string(), command.to_string()],
        }
    }
}

#[must_use]
pub fn build_command(spec: &CommandSpec, working_dir: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(working_dir)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_command_wraps_the_command() {
        let spec = shell_command("echo hello");
        assert!(!spec.program.is_empty());
        assert_eq!(spec.args.last().map(String::as_str), Some("echo hello"));
    }
}
