use thiserror::Error;

/// A numeric field held something that is not an integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` must be a whole number, got {value:?}")]
pub struct FormatError {
    pub field: String,
    pub value: String,
}

/// Errors surfaced by encoding, format selection and script generation.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// An arithmetic field could not be parsed.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// A format name that is neither flat nor markup.
    #[error("unsupported format `{0}`; expected one of: flat, pve, conf, markup, libvirt, xml")]
    UnsupportedFormat(String),
    /// Markup serialization failed.
    #[error("failed to render markup: {0}")]
    Write(#[from] vmconf_xml::WriteError),
    /// A deployment script skeleton failed to render.
    #[error("failed to render deployment script: {0}")]
    Template(#[from] askama::Error),
}
