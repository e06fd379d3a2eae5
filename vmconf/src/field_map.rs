//! Naming rules shared by the flat and markup codecs.
//!
//! Flat disk keys are `<bus><index>` (`scsi0`, `virtio1`, `ide2`) with values
//! shaped `storage:volume[,opt=value]*`; network keys are `net<index>` with
//! values shaped `model=MAC[,opt=value]*`. Markup disks carry the bus in the
//! target device name (`sda`, `vda`, `hda`).

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::error::FormatError;
use crate::model::{ConfigModel, FieldValue};

/// Fallback identifier when the model carries no `smbios1` uuid.
pub const DEFAULT_UUID: &str = "4c4c4544-004b-1010-8032-b3c04f4e3132";
/// Fallback MAC when a network value has no `model=MAC` pair.
pub const DEFAULT_MAC: &str = "52:54:00:12:34:56";
/// Fallback bridge when a network value names none.
pub const DEFAULT_BRIDGE: &str = "virbr0";
pub const DEFAULT_CORES: u32 = 2;
pub const DEFAULT_SOCKETS: u32 = 1;

/// Disk controller family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskBus {
    Scsi,
    Virtio,
    Ide,
}

impl DiskBus {
    pub const ALL: [DiskBus; 3] = [DiskBus::Scsi, DiskBus::Virtio, DiskBus::Ide];

    /// Flat key prefix, which is also the markup `bus` attribute.
    pub fn prefix(self) -> &'static str {
        match self {
            DiskBus::Scsi => "scsi",
            DiskBus::Virtio => "virtio",
            DiskBus::Ide => "ide",
        }
    }

    /// Markup target device prefix.
    pub fn dev_prefix(self) -> &'static str {
        match self {
            DiskBus::Scsi => "sd",
            DiskBus::Virtio => "vd",
            DiskBus::Ide => "hd",
        }
    }
}

/// Split a disk-shaped key into bus and index. `scsihw` and `virtio0a` are not disks.
pub fn parse_disk_key(key: &str) -> Option<(DiskBus, u32)> {
    DiskBus::ALL.into_iter().find_map(|bus| {
        key.strip_prefix(bus.prefix())
            .and_then(parse_index)
            .map(|index| (bus, index))
    })
}

/// Index of a `net<N>` key.
pub fn parse_net_key(key: &str) -> Option<u32> {
    key.strip_prefix("net").and_then(parse_index)
}

pub fn net_key(index: u32) -> String {
    format!("net{index}")
}

fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Bus implied by a markup target device name.
pub fn bus_for_target_dev(dev: &str) -> Option<DiskBus> {
    DiskBus::ALL
        .into_iter()
        .find(|bus| dev.starts_with(bus.dev_prefix()))
}

/// Target device name for the disk at `position`: `sda`..`sdz`, `sdaa`, ...
pub fn target_dev(bus: DiskBus, position: usize) -> String {
    let mut suffix = Vec::new();
    let mut n = position;
    loop {
        suffix.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    suffix.reverse();
    format!(
        "{}{}",
        bus.dev_prefix(),
        String::from_utf8_lossy(&suffix)
    )
}

/// A disk value string taken apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskEntry {
    /// Storage identifier before the first `:` of the source, if any.
    pub storage: Option<String>,
    /// Volume id or path: the source after the storage prefix.
    pub volume: String,
    pub size: Option<String>,
    pub cache: Option<String>,
    pub discard: Option<String>,
    pub format: Option<String>,
    pub media: Option<String>,
    /// Remaining `opt=value` pairs (or bare flags with an empty value), in order.
    pub options: Vec<(String, String)>,
}

impl DiskEntry {
    pub fn parse(value: &str) -> DiskEntry {
        let mut parts = value.split(',');
        let source = parts.next().unwrap_or_default().trim();
        let (storage, volume) = match source.split_once(':') {
            Some((storage, volume)) => (Some(storage.to_string()), volume.to_string()),
            None => (None, source.to_string()),
        };

        let mut entry = DiskEntry {
            storage,
            volume,
            ..DiskEntry::default()
        };
        for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
            let (key, val) = part.split_once('=').unwrap_or((part, ""));
            let slot = match key {
                "size" => &mut entry.size,
                "cache" => &mut entry.cache,
                "discard" => &mut entry.discard,
                "format" => &mut entry.format,
                "media" => &mut entry.media,
                _ => {
                    entry.options.push((key.to_string(), val.to_string()));
                    continue;
                }
            };
            *slot = Some(val.to_string());
        }
        entry
    }

    /// The source component exactly as written: `storage:volume` or a path.
    pub fn source(&self) -> String {
        match &self.storage {
            Some(storage) => format!("{storage}:{}", self.volume),
            None => self.volume.clone(),
        }
    }

    pub fn is_cdrom(&self) -> bool {
        self.media.as_deref() == Some("cdrom")
    }

    /// Render back to a flat value string.
    pub fn render(&self) -> String {
        let mut parts = vec![self.source()];
        let named = [
            ("format", &self.format),
            ("cache", &self.cache),
            ("discard", &self.discard),
            ("media", &self.media),
            ("size", &self.size),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                parts.push(format!("{key}={value}"));
            }
        }
        parts.extend(self.options.iter().map(|(k, v)| render_option(k, v)));
        parts.join(",")
    }

    /// Rebuild an entry from the map [`materialize`] produces.
    pub fn from_nested(map: &IndexMap<String, FieldValue>) -> DiskEntry {
        let mut entry = DiskEntry::default();
        for (key, value) in map {
            let value = value.to_flat().into_owned();
            let slot = match key.as_str() {
                "volume" => {
                    entry.volume = value;
                    continue;
                }
                "storage" => &mut entry.storage,
                "size" => &mut entry.size,
                "cache" => &mut entry.cache,
                "discard" => &mut entry.discard,
                "format" => &mut entry.format,
                "media" => &mut entry.media,
                _ => {
                    entry.options.push((key.clone(), value));
                    continue;
                }
            };
            *slot = Some(value);
        }
        entry
    }

    fn to_nested(&self) -> FieldValue {
        let mut map = IndexMap::new();
        if let Some(storage) = &self.storage {
            map.insert("storage".to_string(), FieldValue::from(storage.as_str()));
        }
        map.insert("volume".to_string(), FieldValue::from(self.volume.as_str()));
        let named = [
            ("size", &self.size),
            ("cache", &self.cache),
            ("discard", &self.discard),
            ("format", &self.format),
            ("media", &self.media),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                map.insert(key.to_string(), FieldValue::from(value.as_str()));
            }
        }
        for (key, value) in &self.options {
            map.insert(key.clone(), FieldValue::from(value.as_str()));
        }
        FieldValue::Nested(map)
    }
}

/// A network value string taken apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetEntry {
    /// NIC model (`virtio`, `e1000`, ...). Free text.
    pub model: String,
    pub mac: Option<String>,
    pub bridge: Option<String>,
    pub firewall: bool,
    pub options: Vec<(String, String)>,
}

impl NetEntry {
    pub fn parse(value: &str) -> NetEntry {
        let mut parts = value.split(',');
        let head = parts.next().unwrap_or_default().trim();
        let (model, mac) = match head.split_once('=') {
            Some((model, mac)) => (model.to_string(), Some(mac.to_string())),
            None => (head.to_string(), None),
        };

        let mut entry = NetEntry {
            model,
            mac,
            ..NetEntry::default()
        };
        for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some(("bridge", bridge)) => entry.bridge = Some(bridge.to_string()),
                Some(("firewall", flag)) => entry.firewall = flag == "1",
                Some((key, val)) => entry.options.push((key.to_string(), val.to_string())),
                None => entry.options.push((part.to_string(), String::new())),
            }
        }
        entry
    }

    pub fn render(&self) -> String {
        let mut parts = vec![match &self.mac {
            Some(mac) => format!("{}={mac}", self.model),
            None => self.model.clone(),
        }];
        if let Some(bridge) = &self.bridge {
            parts.push(format!("bridge={bridge}"));
        }
        if self.firewall {
            parts.push("firewall=1".to_string());
        }
        parts.extend(self.options.iter().map(|(k, v)| render_option(k, v)));
        parts.join(",")
    }

    /// Rebuild an entry from the map [`materialize`] produces.
    pub fn from_nested(map: &IndexMap<String, FieldValue>) -> NetEntry {
        let mut entry = NetEntry::default();
        for (key, value) in map {
            let value = value.to_flat().into_owned();
            match key.as_str() {
                "model" => entry.model = value,
                "mac" => entry.mac = Some(value),
                "bridge" => entry.bridge = Some(value),
                "firewall" => entry.firewall = value == "1",
                _ => entry.options.push((key.clone(), value)),
            }
        }
        entry
    }

    fn to_nested(&self) -> FieldValue {
        let mut map = IndexMap::new();
        map.insert("model".to_string(), FieldValue::from(self.model.as_str()));
        if let Some(mac) = &self.mac {
            map.insert("mac".to_string(), FieldValue::from(mac.as_str()));
        }
        if let Some(bridge) = &self.bridge {
            map.insert("bridge".to_string(), FieldValue::from(bridge.as_str()));
        }
        map.insert(
            "firewall".to_string(),
            FieldValue::from(if self.firewall { "1" } else { "0" }),
        );
        for (key, value) in &self.options {
            map.insert(key.clone(), FieldValue::from(value.as_str()));
        }
        FieldValue::Nested(map)
    }
}

fn render_option(key: &str, value: &str) -> String {
    if value.is_empty() {
        key.to_string()
    } else {
        format!("{key}={value}")
    }
}

/// Flat value string for the field `key`.
///
/// A nested disk map carrying `volume`, or a nested network map carrying
/// `model`, is rebuilt into its entry first so it renders the way the value
/// string it was expanded from does. Other nested maps become `k=v` pairs.
pub fn render_field<'a>(key: &str, value: &'a FieldValue) -> Cow<'a, str> {
    match value {
        FieldValue::Nested(map) if map.contains_key("volume") && parse_disk_key(key).is_some() => {
            Cow::Owned(DiskEntry::from_nested(map).render())
        }
        FieldValue::Nested(map) if map.contains_key("model") && parse_net_key(key).is_some() => {
            Cow::Owned(NetEntry::from_nested(map).render())
        }
        other => other.to_flat(),
    }
}

/// Disk-shaped keys with truthy values, in model order.
pub fn disk_fields(model: &ConfigModel) -> Vec<(DiskBus, &str, String)> {
    model
        .iter()
        .filter_map(|(key, value)| {
            let (bus, _) = parse_disk_key(key)?;
            value
                .is_truthy()
                .then(|| (bus, key, render_field(key, value).into_owned()))
        })
        .collect()
}

/// `net<N>` keys with truthy values, in model order.
pub fn net_fields(model: &ConfigModel) -> Vec<(&str, String)> {
    model
        .iter()
        .filter(|(key, value)| parse_net_key(key).is_some() && value.is_truthy())
        .map(|(key, value)| (key, render_field(key, value).into_owned()))
        .collect()
}

/// Virtual CPU count: cores × sockets.
///
/// Absent or empty fields use the defaults (2 cores, 1 socket); anything else
/// that is not a whole number is an error rather than a silent default.
pub fn vcpu_count(model: &ConfigModel) -> Result<u32, FormatError> {
    let cores = numeric_field(model, "cores", DEFAULT_CORES)?;
    let sockets = numeric_field(model, "sockets", DEFAULT_SOCKETS)?;
    Ok(cores.saturating_mul(sockets))
}

fn numeric_field(model: &ConfigModel, key: &str, default: u32) -> Result<u32, FormatError> {
    let Some(raw) = model.flat_value(key) else {
        return Ok(default);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse().map_err(|_| FormatError {
        field: key.to_string(),
        value: raw.to_string(),
    })
}

/// The `uuid=` component of `smbios1`, if any.
pub fn smbios_uuid(model: &ConfigModel) -> Option<String> {
    let smbios = model.flat_value("smbios1")?;
    smbios
        .split(',')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| *key == "uuid")
        .map(|(_, uuid)| uuid.to_string())
        .filter(|uuid| !uuid.is_empty())
}

/// Copy of `model` with disk and network values expanded into nested maps.
pub fn materialize(model: &ConfigModel) -> ConfigModel {
    model
        .iter()
        .map(|(key, value)| {
            let expanded = match value {
                FieldValue::Text(text) if parse_disk_key(key).is_some() => {
                    DiskEntry::parse(text).to_nested()
                }
                FieldValue::Text(text) if parse_net_key(key).is_some() => {
                    NetEntry::parse(text).to_nested()
                }
                other => other.clone(),
            };
            (key.to_string(), expanded)
        })
        .collect()
}
