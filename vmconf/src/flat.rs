//! Flat `key: value` codec for Proxmox VE guest configuration files.

use std::borrow::Cow;

use chrono::{Local, NaiveDateTime};

use crate::catalog::SectionCatalog;
use crate::model::ConfigModel;

/// Timestamp layout used in generated headers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode flat configuration text. Never fails.
///
/// Blank lines and `#` comments are skipped. A line is split on its first
/// `:`; failing that, on its first `=` (so `boot=order=scsi0` keeps
/// `order=scsi0` as the value). Lines with neither are ignored.
pub fn decode_flat(text: &str) -> ConfigModel {
    let mut model = ConfigModel::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let split = line.split_once(':').or_else(|| line.split_once('='));
        if let Some((key, value)) = split {
            model.insert(key.trim(), value.trim());
        }
    }

    model
}

/// Encode a model as flat text, stamped with the current local time.
pub fn encode_flat(model: &ConfigModel, catalog: &SectionCatalog) -> String {
    encode_flat_at(model, catalog, Local::now().naive_local())
}

/// Encode a model as flat text with an explicit generation time.
///
/// Output is a comment header, then each catalog section's truthy fields in
/// catalog order followed by a blank line (sections with no output get no
/// blank line), then any non-catalog keys in model order. Line breaks inside
/// a value are folded to single spaces so every field stays on one line.
pub fn encode_flat_at(
    model: &ConfigModel,
    catalog: &SectionCatalog,
    generated_at: NaiveDateTime,
) -> String {
    let mut lines = vec![
        "# Proxmox VE guest configuration".to_string(),
        format!("# Generated: {}", generated_at.format(TIMESTAMP_FORMAT)),
        format!("# VM ID: {}", single_line(model.text_or("vmid", "100"))),
        String::new(),
    ];

    for section in &catalog.sections {
        let before = lines.len();
        for field in &section.fields {
            if let Some(value) = model.truthy_value(&field.key) {
                lines.push(format!("{}: {}", field.key, single_line(&value)));
            }
        }
        if lines.len() > before {
            lines.push(String::new());
        }
    }

    for (key, _) in model.iter().filter(|(key, _)| !catalog.contains(key)) {
        if let Some(value) = model.truthy_value(key) {
            lines.push(format!("{key}: {}", single_line(&value)));
        }
    }

    lines.join("\n")
}

fn single_line(value: &str) -> Cow<'_, str> {
    if !value.contains(['\r', '\n']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::{decode_flat, encode_flat_at};
    use crate::catalog::SectionCatalog;
    use crate::model::ConfigModel;

    fn fixed_time() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn colon_takes_priority_over_equals() {
        let model = decode_flat("boot: order=scsi0;ide2;net0\nstartup=order=1,up=30\n");
        assert_eq!(model.text("boot"), Some("order=scsi0;ide2;net0"));
        assert_eq!(model.text("startup"), Some("order=1,up=30"));
    }

    #[test]
    fn skips_comments_blanks_and_unkeyed_lines() {
        let model = decode_flat("# header\n\n   # indented comment\njust words\n  name :  web01  \n");
        assert_eq!(model.len(), 1);
        assert_eq!(model.text("name"), Some("web01"));
    }

    #[test]
    fn value_keeps_later_colons() {
        let model = decode_flat("scsi0: local-lvm:vm-100-disk-0,size=32G");
        assert_eq!(model.text("scsi0"), Some("local-lvm:vm-100-disk-0,size=32G"));
    }

    #[test]
    fn decode_is_total_over_odd_input() {
        for input in ["", "\u{0}\u{1}\u{fffd}", "===", ":::", "a=b=c:d", "\r\n\r\n", "#:x"] {
            let _ = decode_flat(input);
        }
        assert_eq!(decode_flat("a=b=c:d").text("a=b=c"), Some("d"));
        assert_eq!(decode_flat("===").text(""), Some("=="));
    }

    #[test]
    fn later_duplicate_keys_win() {
        let model = decode_flat("memory: 1024\nmemory: 4096");
        assert_eq!(model.text("memory"), Some("4096"));
    }

    #[test]
    fn empty_model_has_only_header() {
        let out = encode_flat_at(&ConfigModel::new(), SectionCatalog::builtin(), fixed_time());
        assert_eq!(
            out,
            "# Proxmox VE guest configuration\n# Generated: 2024-05-01 08:30:00\n# VM ID: 100\n"
        );
    }

    #[test]
    fn groups_by_section_and_appends_unknown_keys() {
        let model: ConfigModel = [
            ("custom", "yes"),
            ("net0", "virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr1"),
            ("cores", "4"),
            ("tags", ""),
            ("vmid", "105"),
            ("balloon", "0"),
        ]
        .into_iter()
        .collect();

        let out = encode_flat_at(&model, SectionCatalog::builtin(), fixed_time());
        assert_eq!(
            out,
            "# Proxmox VE guest configuration\n\
# Generated: 2024-05-01 08:30:00\n\
# VM ID: 105\n\
\n\
vmid: 105\n\
balloon: 0\n\
cores: 4\n\
\n\
net0: virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr1\n\
\n\
custom: yes"
        );
    }

    #[test]
    fn encode_then_decode_preserves_truthy_fields() {
        let original = decode_flat(
            "name: web01\nboot=order=scsi0\nscsi0: local-lvm:vm-1-disk-0,size=8G\nx-extra: 1\nempty:\n",
        );
        let again = decode_flat(&encode_flat_at(
            &original,
            SectionCatalog::builtin(),
            fixed_time(),
        ));

        for (key, value) in original.iter().filter(|(_, v)| v.is_truthy()) {
            assert_eq!(again.get(key), Some(value), "field {key}");
        }
        assert!(!again.contains_key("empty"));
    }

    #[test]
    fn multi_line_values_stay_on_one_line() {
        let model: ConfigModel = [
            ("description", "web tier\r\nowner: ops\n\n"),
            ("name", "web01"),
        ]
        .into_iter()
        .collect();

        let out = encode_flat_at(&model, SectionCatalog::builtin(), fixed_time());
        assert!(out.contains("\ndescription: web tier owner: ops\n"), "{out}");

        let again = decode_flat(&out);
        assert_eq!(again.len(), 2);
        assert_eq!(again.text("description"), Some("web tier owner: ops"));
        assert!(!again.contains_key("owner"));
    }
}
