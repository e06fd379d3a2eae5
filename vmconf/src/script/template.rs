//! Shell skeletons for the deployment scripts, rendered with askama.
//!
//! Skeletons are rendered without escaping: every field is escaped for the
//! shell position it lands in before it gets here.

use askama::Template;

/// Literal values bound into a deployment skeleton.
#[derive(Debug, Clone)]
pub struct ScriptValues {
    pub generated_at: String,
    /// Comment-safe values for the header block.
    pub header_vmid: String,
    pub header_name: String,
    /// Double-quote escaped values.
    pub vmid: String,
    pub name: String,
    pub vm_name: String,
    pub memory: String,
    pub memory_unit: String,
    pub cores: String,
    pub sockets: String,
    pub onboot: String,
    pub disk_config: String,
    pub heredoc_marker: String,
    /// Encoded configuration, embedded verbatim in the heredoc.
    pub config: String,
}

/// Proxmox VE deployment script.
#[derive(Template)]
#[template(path = "pve-deploy.sh", escape = "none")]
pub struct PveDeployScript<'a> {
    pub vm: &'a ScriptValues,
}

/// libvirt deployment script.
#[derive(Template)]
#[template(path = "libvirt-deploy.sh", escape = "none")]
pub struct LibvirtDeployScript<'a> {
    pub vm: &'a ScriptValues,
}
