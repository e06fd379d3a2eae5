use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::input::is_stdin;
use crate::path_guard::ensure_output_not_same;

/// Write generated text to `output`, or stdout when no path is given.
///
/// Files always end with a newline. The output may not be the input file.
pub fn emit(text: &str, output: Option<&Path>, input: &Path) -> Result<()> {
    let Some(output) = output else {
        print!("{}", with_trailing_newline(text));
        return Ok(());
    };

    if !is_stdin(input) {
        ensure_output_not_same(output, &[input])?;
    }
    fs::write(output, with_trailing_newline(text))
        .with_context(|| format!("failed to write {}", output.display()))
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn with_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}
