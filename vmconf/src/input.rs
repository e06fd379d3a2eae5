use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use vmconf::catalog::load_defaults;
use vmconf::{decode, detect_format, ConfigFormat, ConfigModel, SectionCatalog};

use crate::cli::InputFormat;

/// Path that means "read standard input".
pub const STDIN_PATH: &str = "-";

pub fn is_stdin(path: &Path) -> bool {
    path == Path::new(STDIN_PATH)
}

pub fn read_input(path: &Path) -> Result<String> {
    if is_stdin(path) {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read standard input")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read and decode an input file. Flat and markup decoding never fail; an
/// input that yields no fields only produces a warning.
pub fn load_model(path: &Path, from: InputFormat) -> Result<ConfigModel> {
    let text = read_input(path)?;
    let named = (!is_stdin(path)).then_some(path);

    let from = match from {
        InputFormat::Auto if has_json_extension(path) => InputFormat::Json,
        other => other,
    };
    let model = match from {
        InputFormat::Json => ConfigModel::from_json_str(&text)
            .with_context(|| format!("failed to parse JSON field values in {}", path.display()))?,
        InputFormat::Flat => decode(ConfigFormat::Flat, &text),
        InputFormat::Markup => decode(ConfigFormat::Markup, &text),
        InputFormat::Auto => {
            let format = detect_format(named, &text);
            debug!(%format, path = %path.display(), "detected input format");
            decode(format, &text)
        }
    };

    if model.is_empty() {
        eprintln!("warning: no fields decoded from {}", path.display());
    }
    Ok(model)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Fill in defaults underneath `model` when requested.
pub fn apply_defaults(
    model: ConfigModel,
    enabled: bool,
    defaults_file: Option<&Path>,
    catalog: &SectionCatalog,
) -> ConfigModel {
    if !enabled {
        return model;
    }
    let defaults = match defaults_file {
        Some(path) => load_defaults(path, catalog),
        None => catalog.defaults(),
    };
    model.with_defaults(&defaults)
}
