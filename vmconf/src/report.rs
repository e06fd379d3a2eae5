use colored::Colorize;
use serde::Serialize;

use crate::catalog::SectionCatalog;
use crate::field_map::{disk_fields, net_fields};
use crate::model::{ConfigModel, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub fields: usize,
    pub disks: usize,
    pub interfaces: usize,
    /// Fields the catalog does not know about.
    pub unknown: usize,
}

pub fn summarize(model: &ConfigModel, catalog: &SectionCatalog) -> ModelSummary {
    ModelSummary {
        fields: model.len(),
        disks: disk_fields(model).len(),
        interfaces: net_fields(model).len(),
        unknown: model.keys().filter(|key| !catalog.contains(key)).count(),
    }
}

pub fn render_summary(summary: ModelSummary) -> String {
    format!(
        "model_summary fields={} disks={} interfaces={} unknown={}",
        summary.fields, summary.disks, summary.interfaces, summary.unknown
    )
}

/// Render a model grouped by catalog section, unknown fields last.
pub fn render_model(model: &ConfigModel, catalog: &SectionCatalog) -> String {
    let mut out = Vec::new();

    for section in &catalog.sections {
        let present: Vec<(&str, &FieldValue)> = section
            .fields
            .iter()
            .filter_map(|field| model.get(&field.key).map(|v| (field.key.as_str(), v)))
            .collect();
        if present.is_empty() {
            continue;
        }
        out.push(format!("[{}] {}", section.id, section.name).cyan().to_string());
        for (key, value) in present {
            append_value(&mut out, 1, key, value);
        }
    }

    let unknown: Vec<(&str, &FieldValue)> = model
        .iter()
        .filter(|(key, _)| !catalog.contains(key))
        .collect();
    if !unknown.is_empty() {
        out.push("[other]".yellow().to_string());
        for (key, value) in unknown {
            append_value(&mut out, 1, key, value);
        }
    }

    if out.is_empty() {
        out.push("- none".to_string());
    }
    out.join("\n")
}

fn append_value(out: &mut Vec<String>, depth: usize, key: &str, value: &FieldValue) {
    let indent = "  ".repeat(depth);
    match value {
        FieldValue::Text(text) if text.is_empty() => {
            out.push(format!("{indent}{key} = {}", "(empty)".dimmed()));
        }
        FieldValue::Text(text) => out.push(format!("{indent}{key} = {text}")),
        FieldValue::Nested(map) => {
            out.push(format!("{indent}{key}:"));
            for (child_key, child) in map {
                append_value(out, depth + 1, child_key, child);
            }
        }
    }
}

/// Render the catalog the way an editor would lay it out.
pub fn render_catalog(catalog: &SectionCatalog) -> String {
    let mut out = Vec::new();
    for section in &catalog.sections {
        out.push(format!("[{}] {}", section.id, section.name).cyan().to_string());
        for field in &section.fields {
            let mut line = format!(
                "  {} ({}) {}",
                field.key,
                field.kind.as_str(),
                field.label
            );
            if !field.default.is_empty() {
                line.push_str(&format!(" default={}", field.default));
            }
            match (field.min, field.max) {
                (Some(min), Some(max)) => line.push_str(&format!(" range={min}..{max}")),
                (Some(min), None) => line.push_str(&format!(" min={min}")),
                (None, Some(max)) => line.push_str(&format!(" max={max}")),
                (None, None) => {}
            }
            if let Some(step) = field.step {
                line.push_str(&format!(" step={step}"));
            }
            if !field.options.is_empty() {
                line.push_str(&format!(" options={}", field.options.join("|")));
            }
            out.push(line);
        }
    }
    out.join("\n")
}
