//! Deployment script generation.
//!
//! Each target format has a fixed shell skeleton. Generation binds literal
//! values from the model (with defaults for absent fields) and embeds the
//! encoded configuration in a quoted heredoc. Conditional behaviour such as
//! skipping disk creation lives in the shell code, not here.

pub mod template;

use askama::Template;
use chrono::{Local, NaiveDateTime};

use crate::catalog::SectionCatalog;
use crate::detect::ConfigFormat;
use crate::error::ConvertError;
use crate::flat::{encode_flat_at, TIMESTAMP_FORMAT};
use crate::markup::{encode_markup, DEFAULT_MEMORY, DEFAULT_MEMORY_UNIT, DEFAULT_NAME};
use crate::model::ConfigModel;

pub use template::{LibvirtDeployScript, PveDeployScript, ScriptValues};

const HEREDOC_MARKER: &str = "VMCONF_EOF";
const DEFAULT_VMID: &str = "100";
const DEFAULT_CORES: &str = "2";
const DEFAULT_SOCKETS: &str = "1";
const DEFAULT_ONBOOT: &str = "0";
/// Disk fields consulted for the allocation step, first non-empty wins.
const DISK_SOURCE_KEYS: [&str; 2] = ["scsi0", "virtio0"];

/// Generate a deployment script for `target` using the builtin catalog and
/// the current local time.
pub fn generate_script(model: &ConfigModel, target: ConfigFormat) -> Result<String, ConvertError> {
    generate_script_with(
        model,
        target,
        SectionCatalog::builtin(),
        Local::now().naive_local(),
    )
}

/// Deterministic form of [`generate_script`].
///
/// The flat target embeds exactly what [`encode_flat_at`] returns for the same
/// arguments. The markup target fails only where [`encode_markup`] does.
pub fn generate_script_with(
    model: &ConfigModel,
    target: ConfigFormat,
    catalog: &SectionCatalog,
    generated_at: NaiveDateTime,
) -> Result<String, ConvertError> {
    let config = match target {
        ConfigFormat::Flat => encode_flat_at(model, catalog, generated_at),
        ConfigFormat::Markup => encode_markup(model)?,
    };

    let name = value_or(model, "name", DEFAULT_NAME);
    let vmid = value_or(model, "vmid", DEFAULT_VMID);
    let vm = ScriptValues {
        generated_at: generated_at.format(TIMESTAMP_FORMAT).to_string(),
        header_vmid: comment_safe(&vmid),
        header_name: comment_safe(&name),
        vmid: double_quoted(&vmid),
        name: double_quoted(&name),
        vm_name: double_quoted(&name.replace(' ', "_")),
        memory: double_quoted(&value_or(model, "memory", DEFAULT_MEMORY)),
        memory_unit: double_quoted(&value_or(model, "memory_unit", DEFAULT_MEMORY_UNIT)),
        cores: double_quoted(&value_or(model, "cores", DEFAULT_CORES)),
        sockets: double_quoted(&value_or(model, "sockets", DEFAULT_SOCKETS)),
        onboot: double_quoted(&value_or(model, "onboot", DEFAULT_ONBOOT)),
        disk_config: double_quoted(&disk_source(model)),
        heredoc_marker: heredoc_marker(&config),
        config,
    };

    let script = match target {
        ConfigFormat::Flat => PveDeployScript { vm: &vm }.render()?,
        ConfigFormat::Markup => LibvirtDeployScript { vm: &vm }.render()?,
    };
    Ok(script)
}

fn value_or(model: &ConfigModel, key: &str, default: &str) -> String {
    model
        .truthy_value(key)
        .map(|value| value.into_owned())
        .unwrap_or_else(|| default.to_string())
}

fn disk_source(model: &ConfigModel) -> String {
    DISK_SOURCE_KEYS
        .iter()
        .find_map(|key| model.truthy_value(key))
        .map(|value| value.into_owned())
        .unwrap_or_default()
}

/// Escape a value for use inside shell double quotes.
pub fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Keep a value on a single comment line.
fn comment_safe(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// A heredoc delimiter that no line of `body` can terminate early.
fn heredoc_marker(body: &str) -> String {
    let mut marker = HEREDOC_MARKER.to_string();
    let mut suffix = 0;
    while body.lines().any(|line| line.trim_end_matches('\r') == marker) {
        suffix += 1;
        marker = format!("{HEREDOC_MARKER}_{suffix}");
    }
    marker
}
