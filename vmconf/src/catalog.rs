//! The section catalog: an ordered registry of known flat-format fields.
//!
//! The catalog drives two things only: default values and the grouping/order
//! of generated flat files. Markup parsing never consults it.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::flat::decode_flat;
use crate::model::ConfigModel;

/// Input widget kind for a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Text,
    Select,
    Checkbox,
    Textarea,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Text => "text",
            FieldKind::Select => "select",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Textarea => "textarea",
        }
    }
}

/// One known field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// A named, ordered group of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldDescriptor>,
}

/// Ordered sections of field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCatalog {
    #[serde(default, rename = "section")]
    pub sections: Vec<Section>,
}

/// Errors returned when loading catalog files.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse catalog file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl SectionCatalog {
    /// The embedded catalog, parsed once per process.
    pub fn builtin() -> &'static SectionCatalog {
        static BUILTIN: OnceLock<SectionCatalog> = OnceLock::new();
        BUILTIN.get_or_init(embedded_catalog)
    }

    /// Every field in section order, then declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.sections.iter().flat_map(|section| section.fields.iter())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields().map(|field| field.key.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields().find(|field| field.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Catalog defaults as a model, in catalog order. Empty defaults are kept.
    pub fn defaults(&self) -> ConfigModel {
        self.fields()
            .map(|field| (field.key.clone(), field.default.clone()))
            .collect()
    }
}

/// Load a catalog from a TOML file.
pub fn load_catalog(path: &Path) -> Result<SectionCatalog, CatalogLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_catalog(&raw, path.display().to_string())
}

/// Load a catalog override, falling back to the builtin catalog on any error.
pub fn resolve_catalog(path: Option<&Path>) -> (SectionCatalog, String) {
    let Some(path) = path else {
        return (SectionCatalog::builtin().clone(), "embedded".to_string());
    };

    match load_catalog(path) {
        Ok(catalog) => (catalog, format!("file:{}", path.display())),
        Err(err) => {
            warn!(%err, "using embedded catalog");
            (SectionCatalog::builtin().clone(), "embedded".to_string())
        }
    }
}

/// Load the default model from a flat-format defaults file.
///
/// A missing or unreadable file yields `catalog.defaults()`.
pub fn load_defaults(path: &Path, catalog: &SectionCatalog) -> ConfigModel {
    match fs::read_to_string(path) {
        Ok(raw) => decode_flat(&raw),
        Err(err) => {
            warn!(path = %path.display(), %err, "defaults file unavailable; using catalog defaults");
            catalog.defaults()
        }
    }
}

fn parse_catalog(raw: &str, path: String) -> Result<SectionCatalog, CatalogLoadError> {
    toml::from_str(raw).map_err(|source| CatalogLoadError::Parse { path, source })
}

fn embedded_catalog() -> SectionCatalog {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/catalog/sections.toml"
    ));
    match parse_catalog(embedded, "embedded catalog".to_string()) {
        Ok(catalog) if !catalog.sections.is_empty() => catalog,
        Ok(_) => fallback_catalog(),
        Err(err) => {
            warn!(%err, "embedded catalog is invalid; using compiled-in fallback");
            fallback_catalog()
        }
    }
}

type FallbackSection = (&'static str, &'static str, &'static [(&'static str, FieldKind, &'static str)]);

const FALLBACK: &[FallbackSection] = &[
    (
        "basic",
        "Basic",
        &[
            ("vmid", FieldKind::Number, "100"),
            ("name", FieldKind::Text, "vm-default"),
            ("memory", FieldKind::Number, "2048"),
            ("balloon", FieldKind::Number, "0"),
            ("cores", FieldKind::Number, "2"),
            ("sockets", FieldKind::Number, "1"),
            ("cpu", FieldKind::Select, "host"),
            ("numa", FieldKind::Checkbox, "0"),
            ("ostype", FieldKind::Select, "l26"),
            ("onboot", FieldKind::Checkbox, "1"),
            ("startup", FieldKind::Text, "order=1"),
            ("agent", FieldKind::Checkbox, "1"),
        ],
    ),
    (
        "boot",
        "Boot",
        &[
            ("boot", FieldKind::Text, "order=scsi0;ide2;net0"),
            ("bios", FieldKind::Select, "ovmf"),
            ("machine", FieldKind::Select, "q35"),
            ("acpi", FieldKind::Checkbox, "1"),
            ("kvm", FieldKind::Checkbox, "1"),
        ],
    ),
    (
        "disks",
        "Disks",
        &[
            ("scsi0", FieldKind::Text, "local-lvm:vm-100-disk-0,size=32G"),
            ("scsi1", FieldKind::Text, ""),
            ("virtio0", FieldKind::Text, ""),
            ("ide0", FieldKind::Text, ""),
            ("ide2", FieldKind::Text, "none,media=cdrom"),
            ("scsihw", FieldKind::Select, "virtio-scsi-pci"),
            ("discard", FieldKind::Checkbox, "on"),
            ("cache", FieldKind::Select, "writeback"),
        ],
    ),
    (
        "network",
        "Network",
        &[
            ("net0", FieldKind::Text, "virtio=62:7C:6B:3A:32:1D,bridge=vmbr0,firewall=1"),
            ("net1", FieldKind::Text, ""),
            ("net2", FieldKind::Text, ""),
            ("net3", FieldKind::Text, ""),
            ("bridge", FieldKind::Text, "vmbr0"),
            ("firewall", FieldKind::Checkbox, "1"),
            ("mtu", FieldKind::Number, "1500"),
        ],
    ),
    (
        "display",
        "Display",
        &[
            ("vga", FieldKind::Select, "std"),
            ("serial0", FieldKind::Text, "socket"),
            ("usb0", FieldKind::Text, "host"),
            ("keyboard", FieldKind::Select, "en-us"),
        ],
    ),
    (
        "advanced",
        "Advanced",
        &[
            ("smbios1", FieldKind::Text, "uuid=4c4c4544-004b-1010-8032-b3c04f4e3132"),
            ("vmgenid", FieldKind::Text, "4c4c4544-004b-1010-8032-b3c04f4e3132"),
            ("hugepages", FieldKind::Select, ""),
            ("hotplug", FieldKind::Checkbox, "1"),
            ("protection", FieldKind::Checkbox, "0"),
            ("tags", FieldKind::Text, ""),
            ("description", FieldKind::Textarea, ""),
        ],
    ),
];

fn fallback_catalog() -> SectionCatalog {
    let sections = FALLBACK
        .iter()
        .map(|(id, name, fields)| Section {
            id: id.to_string(),
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(key, kind, default)| FieldDescriptor {
                    key: key.to_string(),
                    kind: *kind,
                    label: key.to_string(),
                    default: default.to_string(),
                    min: None,
                    max: None,
                    step: None,
                    options: Vec::new(),
                    placeholder: None,
                })
                .collect(),
        })
        .collect();
    SectionCatalog { sections }
}
