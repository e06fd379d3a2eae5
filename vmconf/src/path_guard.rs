use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Refuse an output path that resolves to one of the inputs.
pub fn ensure_output_not_same(output: &Path, inputs: &[&Path]) -> Result<()> {
    let out_norm = resolve(output)
        .with_context(|| format!("failed to resolve output path {}", output.display()))?;

    for input in inputs {
        let in_norm = resolve(input)
            .with_context(|| format!("failed to resolve input path {}", input.display()))?;
        if out_norm == in_norm {
            bail!(
                "refusing to overwrite input file: output {} is the same file as {}",
                output.display(),
                input.display()
            );
        }
    }
    Ok(())
}

fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("canonicalize {}", path.display()));
    }

    // Not on disk yet: canonicalize the parent if it exists, then fold `.`/`..`.
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().context("current_dir")?.join(path)
    };
    let lexical = lexical_normalize(&absolute);
    match (lexical.parent(), lexical.file_name()) {
        (Some(parent), Some(name)) if parent.exists() => Ok(parent
            .canonicalize()
            .with_context(|| format!("canonicalize {}", parent.display()))?
            .join(name)),
        _ => Ok(lexical),
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{ensure_output_not_same, lexical_normalize};

    #[test]
    fn folds_dot_segments() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d.conf")),
            Path::new("/a/c/d.conf")
        );
    }

    #[test]
    fn rejects_same_file_through_dot_dot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).expect("mkdir");
        let input = dir.path().join("101.conf");
        fs::write(&input, "vmid: 101\n").expect("write input");

        let sneaky = sub.join("..").join("101.conf");
        assert!(ensure_output_not_same(&sneaky, &[&input]).is_err());
        assert!(ensure_output_not_same(&dir.path().join("101.xml"), &[&input]).is_ok());
    }
}
