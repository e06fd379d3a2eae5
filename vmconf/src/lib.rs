//! Virtual machine configuration conversion between Proxmox VE and libvirt.
//!
//! Proxmox VE stores guests as flat `key: value` files; libvirt describes them
//! as `<domain>` XML documents. This library decodes either form into a shared
//! [`ConfigModel`], encodes a model back out in either form, and wraps an
//! encoded configuration in a deployment shell script for the target host.
//!
//! # Architecture
//!
//! ## Model
//!
//! - [`model`] — Insertion-ordered field map shared by both codecs
//! - [`catalog`] — Known flat-format fields: defaults and output grouping
//!
//! ## Codecs
//!
//! - [`flat`] — Proxmox VE `key: value` text
//! - [`markup`] — libvirt domain XML (built on `vmconf-xml`)
//! - [`field_map`] — Disk/network key and value conventions both codecs share
//! - [`detect`] — Format names, detection and codec dispatch
//!
//! ## Output
//!
//! - [`script`] — Deployment script generation from fixed skeletons
//! - [`report`] — Terminal rendering of models and the catalog
//!
//! # Examples
//!
//! ```ignore
//! use vmconf::{decode_flat, encode_markup, generate_script, ConfigFormat};
//!
//! let model = decode_flat(&std::fs::read_to_string("101.conf")?);
//! let xml = encode_markup(&model)?;
//! let script = generate_script(&model, ConfigFormat::Markup)?;
//! ```
//!
//! Decoding never fails. Encoding to markup fails only when `cores` or
//! `sockets` is not a whole number.

pub mod catalog;
pub mod detect;
pub mod error;
pub mod field_map;
pub mod flat;
pub mod markup;
pub mod model;
pub mod report;
pub mod script;

pub use catalog::SectionCatalog;
pub use detect::{decode, detect_format, encode, ConfigFormat};
pub use error::{ConvertError, FormatError};
pub use flat::{decode_flat, encode_flat};
pub use markup::{decode_markup, encode_markup};
pub use model::{ConfigModel, FieldValue};
pub use script::{generate_script, generate_script_with};
