//! Shell selection for the current platform.

use std::path::Path;

/// Returns the shell program and its command flag.
///
/// Unix: the user's `$SHELL` when it points at a real file, `/bin/sh`
/// otherwise, with `-c`. Windows: `cmd` with `/C`.
#[must_use]
pub fn shell_command() -> (String, &'static str) {
    if cfg!(windows) {
        ("cmd".to_string(), "/C")
    } else {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| Path::new(s).is_file())
            .unwrap_or_else(|| "/bin/sh".to_string());
        (shell, "-c")
    }
}
