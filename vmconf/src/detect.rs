use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::catalog::SectionCatalog;
use crate::error::ConvertError;
use crate::flat::{decode_flat, encode_flat};
use crate::markup::{decode_markup, encode_markup};
use crate::model::ConfigModel;

/// File name offered for generated deployment scripts.
pub const SCRIPT_FILE_NAME: &str = "vm-deploy.sh";

/// Configuration representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    /// Proxmox VE `key: value` text.
    Flat,
    /// libvirt domain XML.
    Markup,
}

impl ConfigFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFormat::Flat => "flat",
            ConfigFormat::Markup => "markup",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Flat => "conf",
            ConfigFormat::Markup => "xml",
        }
    }
}

impl Display for ConfigFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "pve" | "proxmox" | "conf" => Ok(ConfigFormat::Flat),
            "markup" | "libvirt" | "xml" => Ok(ConfigFormat::Markup),
            _ => Err(ConvertError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Guess the format of an input from its file extension, then its content.
///
/// Content starting with `<` (after leading whitespace and a UTF-8 BOM) is
/// markup; everything else is flat.
pub fn detect_format(path: Option<&Path>, content: &str) -> ConfigFormat {
    let by_extension = path
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
            "conf" => Some(ConfigFormat::Flat),
            "xml" => Some(ConfigFormat::Markup),
            _ => None,
        });
    if let Some(format) = by_extension {
        return format;
    }

    let body = content.trim_start_matches('\u{feff}').trim_start();
    if body.starts_with('<') {
        ConfigFormat::Markup
    } else {
        ConfigFormat::Flat
    }
}

/// Decode `text` with the codec for `format`. Never fails.
pub fn decode(format: ConfigFormat, text: &str) -> ConfigModel {
    match format {
        ConfigFormat::Flat => decode_flat(text),
        ConfigFormat::Markup => decode_markup(text),
    }
}

/// Encode `model` with the codec for `format`.
pub fn encode(
    format: ConfigFormat,
    model: &ConfigModel,
    catalog: &SectionCatalog,
) -> Result<String, ConvertError> {
    match format {
        ConfigFormat::Flat => Ok(encode_flat(model, catalog)),
        ConfigFormat::Markup => encode_markup(model),
    }
}

/// Download name for a generated configuration file.
pub fn suggested_file_name(format: ConfigFormat, model: &ConfigModel) -> String {
    match format {
        ConfigFormat::Flat => format!("vm-{}.{}", model.text_or("vmid", "100"), format.extension()),
        ConfigFormat::Markup => format!("{}.{}", model.text_or("name", "vm"), format.extension()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{decode, detect_format, encode, suggested_file_name, ConfigFormat};
    use crate::catalog::SectionCatalog;
    use crate::error::ConvertError;
    use crate::model::ConfigModel;

    #[test]
    fn parses_format_aliases() {
        assert_eq!("pve".parse::<ConfigFormat>().ok(), Some(ConfigFormat::Flat));
        assert_eq!("LIBVIRT".parse::<ConfigFormat>().ok(), Some(ConfigFormat::Markup));
        assert_eq!("xml".parse::<ConfigFormat>().ok(), Some(ConfigFormat::Markup));
    }

    #[test]
    fn rejects_unknown_format() {
        match "vmx".parse::<ConfigFormat>() {
            Err(ConvertError::UnsupportedFormat(name)) => assert_eq!(name, "vmx"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn extension_wins_over_content() {
        assert_eq!(
            detect_format(Some(Path::new("guest.conf")), "<domain/>"),
            ConfigFormat::Flat
        );
        assert_eq!(
            detect_format(Some(Path::new("guest.XML")), "name: x"),
            ConfigFormat::Markup
        );
    }

    #[test]
    fn sniffs_content_without_known_extension() {
        assert_eq!(
            detect_format(Some(Path::new("upload.bin")), "\u{feff}\n  <?xml version=\"1.0\"?><domain/>"),
            ConfigFormat::Markup
        );
        assert_eq!(detect_format(None, "vmid: 100"), ConfigFormat::Flat);
        assert_eq!(detect_format(None, ""), ConfigFormat::Flat);
    }

    #[test]
    fn suggests_download_names() {
        let model: ConfigModel = [("vmid", "205"), ("name", "db01")].into_iter().collect();
        assert_eq!(suggested_file_name(ConfigFormat::Flat, &model), "vm-205.conf");
        assert_eq!(suggested_file_name(ConfigFormat::Markup, &model), "db01.xml");
        assert_eq!(
            suggested_file_name(ConfigFormat::Markup, &ConfigModel::new()),
            "vm.xml"
        );
    }

    #[test]
    fn dispatches_to_codecs() {
        let flat = decode(ConfigFormat::Flat, "name: web01\ncores: 2");
        assert_eq!(flat.text("name"), Some("web01"));

        let markup = decode(ConfigFormat::Markup, "<domain><name>db01</name></domain>");
        assert_eq!(markup.text("name"), Some("db01"));

        let xml = encode(ConfigFormat::Markup, &flat, SectionCatalog::builtin()).expect("markup");
        assert!(xml.starts_with("<?xml"));
        let conf = encode(ConfigFormat::Flat, &markup, SectionCatalog::builtin()).expect("flat");
        assert!(conf.contains("name: db01"));
    }
}
