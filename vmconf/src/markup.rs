//! libvirt domain XML codec.
//!
//! Decoding pulls a fixed set of facts out of a `<domain>` document and never
//! fails: any parse error is logged and yields an empty model. Encoding builds
//! a fixed-shape domain from the model and is not the inverse of decoding.

use std::collections::HashMap;

use tracing::{debug, warn};
use vmconf_xml::{parse_str, write_document, XmlNode};

use crate::error::ConvertError;
use crate::field_map::{
    bus_for_target_dev, disk_fields, net_fields, net_key, smbios_uuid, target_dev, vcpu_count,
    DiskBus, DiskEntry, NetEntry, DEFAULT_BRIDGE, DEFAULT_MAC, DEFAULT_UUID,
};
use crate::model::ConfigModel;

pub const DOMAIN_TYPE: &str = "kvm";
pub const DEFAULT_NAME: &str = "vm-default";
pub const DEFAULT_MEMORY: &str = "2048";
pub const DEFAULT_MEMORY_UNIT: &str = "MiB";
pub const ARCH: &str = "x86_64";
pub const MACHINE: &str = "pc-q35-5.1";
pub const EMULATOR: &str = "/usr/bin/qemu-system-x86_64";
const GENERIC_DISK_PREFIX: &str = "disk";

/// Decode a libvirt domain document. Never fails.
pub fn decode_markup(text: &str) -> ConfigModel {
    let root = match parse_str(text) {
        Ok(root) => root,
        Err(err) => {
            warn!(%err, "could not parse domain XML; no fields extracted");
            return ConfigModel::new();
        }
    };
    if root.tag != "domain" {
        warn!(root = %root.tag, "root element is not <domain>; no fields extracted");
        return ConfigModel::new();
    }

    let mut model = ConfigModel::new();
    decode_basics(&root, &mut model);
    decode_os(&root, &mut model);
    decode_features(&root, &mut model);
    if let Some(devices) = root.get_child("devices") {
        decode_disks(devices, &mut model);
        decode_interfaces(devices, &mut model);
        decode_display(devices, &mut model);
    }
    model
}

fn decode_basics(root: &XmlNode, model: &mut ConfigModel) {
    if let Some(name) = root.get_child("name") {
        model.insert("name", name.text.as_deref().unwrap_or_default());
    }
    decode_memory(root, "memory", "memory", model);
    decode_memory(root, "currentMemory", "current_memory", model);
    if let Some(vcpu) = root.get_child("vcpu") {
        model.insert("vcpu", vcpu.text.as_deref().unwrap_or("2"));
    }
    if let Some(cpu) = root.get_child("cpu") {
        if let Some(mode) = cpu.attr("mode") {
            model.insert("cpu_mode", mode);
        }
        if let Some(check) = cpu.attr("check") {
            model.insert("cpu_check", check);
        }
    }
}

fn decode_memory(root: &XmlNode, tag: &str, key: &str, model: &mut ConfigModel) {
    let Some(memory) = root.get_child(tag) else {
        return;
    };
    model.insert(key, memory.text.as_deref().unwrap_or(DEFAULT_MEMORY));
    model.insert(
        format!("{key}_unit"),
        memory.attr("unit").unwrap_or(DEFAULT_MEMORY_UNIT),
    );
}

fn decode_os(root: &XmlNode, model: &mut ConfigModel) {
    let Some(os) = root.get_child("os") else {
        return;
    };
    if let Some(os_type) = os.get_child("type") {
        if let Some(text) = os_type.text.as_deref() {
            model.insert("ostype", text);
        }
        if let Some(arch) = os_type.attr("arch") {
            model.insert("arch", arch);
        }
        if let Some(machine) = os_type.attr("machine") {
            model.insert("machine", machine);
        }
    }

    let order: Vec<&str> = os
        .get_children("boot")
        .into_iter()
        .filter_map(|boot| boot.attr("dev"))
        .collect();
    if !order.is_empty() {
        model.insert("boot", format!("order={}", order.join(";")));
    }
}

fn decode_features(root: &XmlNode, model: &mut ConfigModel) {
    let features = root.get_child("features");
    for flag in ["acpi", "apic"] {
        let present = features.is_some_and(|f| f.get_child(flag).is_some());
        model.insert(flag, if present { "1" } else { "0" });
    }
}

fn decode_disks(devices: &XmlNode, model: &mut ConfigModel) {
    let mut counters: HashMap<&'static str, u32> = HashMap::new();

    for disk in devices.get_children("disk") {
        if disk.attr("device") != Some("disk") {
            debug!(device = ?disk.attr("device"), "skipping non-disk device");
            continue;
        }

        let source = disk
            .child_attr("source", "file")
            .or_else(|| disk.child_attr("source", "dev"))
            .unwrap_or_default();
        let entry = DiskEntry {
            volume: source.to_string(),
            format: non_empty(disk.child_attr("driver", "type")),
            cache: non_empty(disk.child_attr("driver", "cache")),
            ..DiskEntry::default()
        };

        let dev = disk.child_attr("target", "dev").unwrap_or_default();
        let prefix = bus_for_target_dev(dev)
            .map(|bus| bus.prefix())
            .unwrap_or(GENERIC_DISK_PREFIX);
        let index = counters.entry(prefix).or_insert(0);
        model.insert(format!("{prefix}{index}"), entry.render());
        *index += 1;
    }
}

fn decode_interfaces(devices: &XmlNode, model: &mut ConfigModel) {
    for (index, iface) in devices.get_children("interface").into_iter().enumerate() {
        let bridge = match iface.attr("type") {
            Some("bridge") => iface.child_attr("source", "bridge"),
            Some("network") => iface.child_attr("source", "network"),
            _ => None,
        };
        let entry = NetEntry {
            model: iface.child_attr("model", "type").unwrap_or_default().to_string(),
            mac: Some(iface.child_attr("mac", "address").unwrap_or_default().to_string()),
            bridge: Some(bridge.unwrap_or_default().to_string()),
            firewall: iface.get_child("filterref").is_some(),
            options: Vec::new(),
        };
        model.insert(net_key(index as u32), entry.render());
    }
}

fn decode_display(devices: &XmlNode, model: &mut ConfigModel) {
    let video_model = devices
        .get_child("video")
        .and_then(|video| video.child_attr("model", "type"));
    let graphics = devices.child_attr("graphics", "type");
    if let Some(vga) = video_model.or(graphics) {
        model.insert("vga", vga);
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Encode a model as a pretty-printed libvirt domain document.
///
/// Fails only when `cores` or `sockets` is present but not a whole number.
pub fn encode_markup(model: &ConfigModel) -> Result<String, ConvertError> {
    let root = build_domain(model)?;
    Ok(write_document(&root)?)
}

/// Build the domain tree that [`encode_markup`] serializes.
pub fn build_domain(model: &ConfigModel) -> Result<XmlNode, ConvertError> {
    let vcpus = vcpu_count(model)?;
    let name = model
        .truthy_value("name")
        .map(|n| n.into_owned())
        .unwrap_or_else(|| DEFAULT_NAME.to_string());
    let uuid = smbios_uuid(model).unwrap_or_else(|| DEFAULT_UUID.to_string());
    let memory = model
        .truthy_value("memory")
        .map(|m| m.into_owned())
        .unwrap_or_else(|| DEFAULT_MEMORY.to_string());
    let unit = model
        .truthy_value("memory_unit")
        .map(|u| u.into_owned())
        .unwrap_or_else(|| DEFAULT_MEMORY_UNIT.to_string());

    let mut features = XmlNode::new("features");
    for flag in ["acpi", "apic"] {
        if model.text(flag) != Some("0") {
            features.push(XmlNode::new(flag));
        }
    }

    let mut devices = XmlNode::new("devices").with_child(XmlNode::new("emulator").with_text(EMULATOR));
    for (position, (bus, key, value)) in disk_fields(model).into_iter().enumerate() {
        debug!(key, position, "encoding disk");
        devices.push(disk_element(bus, position, &DiskEntry::parse(&value)));
    }
    for (key, value) in net_fields(model) {
        debug!(key, "encoding interface");
        devices.push(interface_element(&NetEntry::parse(&value)));
    }
    for device in standard_devices() {
        devices.push(device);
    }

    Ok(XmlNode::new("domain")
        .with_attr("type", DOMAIN_TYPE)
        .with_child(XmlNode::new("name").with_text(name))
        .with_child(XmlNode::new("uuid").with_text(uuid))
        .with_child(
            XmlNode::new("memory")
                .with_attr("unit", unit.as_str())
                .with_text(memory.as_str()),
        )
        .with_child(
            XmlNode::new("currentMemory")
                .with_attr("unit", unit)
                .with_text(memory),
        )
        .with_child(
            XmlNode::new("vcpu")
                .with_attr("placement", "static")
                .with_text(vcpus.to_string()),
        )
        .with_child(
            XmlNode::new("os")
                .with_child(
                    XmlNode::new("type")
                        .with_attr("arch", ARCH)
                        .with_attr("machine", MACHINE)
                        .with_text("hvm"),
                )
                .with_child(XmlNode::new("boot").with_attr("dev", "hd")),
        )
        .with_child(features)
        .with_child(
            XmlNode::new("cpu")
                .with_attr("mode", "host-passthrough")
                .with_attr("check", "none"),
        )
        .with_child(devices))
}

fn disk_element(bus: DiskBus, position: usize, entry: &DiskEntry) -> XmlNode {
    let cdrom = entry.is_cdrom();
    let default_format = if cdrom { "raw" } else { "qcow2" };

    let mut driver = XmlNode::new("driver")
        .with_attr("name", "qemu")
        .with_attr("type", entry.format.as_deref().unwrap_or(default_format));
    if let Some(cache) = &entry.cache {
        driver = driver.with_attr("cache", cache.as_str());
    }

    let mut disk = XmlNode::new("disk")
        .with_attr("type", "file")
        .with_attr("device", if cdrom { "cdrom" } else { "disk" })
        .with_child(driver);
    let source = entry.source();
    if !(cdrom && (source.is_empty() || source == "none")) {
        disk.push(XmlNode::new("source").with_attr("file", source));
    }
    disk.push(
        XmlNode::new("target")
            .with_attr("dev", target_dev(bus, position))
            .with_attr("bus", bus.prefix()),
    );
    if cdrom {
        disk.push(XmlNode::new("readonly"));
    }
    disk
}

fn interface_element(entry: &NetEntry) -> XmlNode {
    let model = if entry.model.is_empty() {
        "virtio"
    } else {
        entry.model.as_str()
    };
    let mut iface = XmlNode::new("interface")
        .with_attr("type", "bridge")
        .with_child(
            XmlNode::new("mac").with_attr("address", entry.mac.as_deref().unwrap_or(DEFAULT_MAC)),
        )
        .with_child(
            XmlNode::new("source")
                .with_attr("bridge", entry.bridge.as_deref().unwrap_or(DEFAULT_BRIDGE)),
        )
        .with_child(XmlNode::new("model").with_attr("type", model));
    if entry.firewall {
        iface.push(XmlNode::new("filterref").with_attr("filter", "clean-traffic"));
    }
    iface
}

/// Peripherals every generated domain carries regardless of the model.
fn standard_devices() -> Vec<XmlNode> {
    vec![
        XmlNode::new("serial").with_attr("type", "pty").with_child(
            XmlNode::new("target")
                .with_attr("type", "isa-serial")
                .with_attr("port", "0"),
        ),
        XmlNode::new("console").with_attr("type", "pty").with_child(
            XmlNode::new("target")
                .with_attr("type", "serial")
                .with_attr("port", "0"),
        ),
        XmlNode::new("video").with_child(
            XmlNode::new("model")
                .with_attr("type", "qxl")
                .with_attr("ram", "65536")
                .with_attr("vram", "65536")
                .with_attr("vgamem", "16384")
                .with_attr("heads", "1")
                .with_attr("primary", "yes"),
        ),
        XmlNode::new("input")
            .with_attr("type", "tablet")
            .with_attr("bus", "usb"),
        XmlNode::new("input")
            .with_attr("type", "mouse")
            .with_attr("bus", "ps2"),
        XmlNode::new("input")
            .with_attr("type", "keyboard")
            .with_attr("bus", "ps2"),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vmconf_xml::parse_str;

    use super::{decode_markup, encode_markup};
    use crate::catalog::SectionCatalog;
    use crate::error::ConvertError;
    use crate::field_map::materialize;
    use crate::flat::{decode_flat, encode_flat};
    use crate::model::ConfigModel;

    fn encode_tree(model: &ConfigModel) -> vmconf_xml::XmlNode {
        let text = encode_markup(model).expect("encode");
        parse_str(&text).expect("generated markup parses")
    }

    #[test]
    fn vcpu_is_cores_times_sockets() {
        let model: ConfigModel = [("cores", "4"), ("sockets", "2")].into_iter().collect();
        assert_eq!(encode_tree(&model).get_text(&["vcpu"]), Some("8"));
    }

    #[test]
    fn non_numeric_cores_is_an_error() {
        let model: ConfigModel = [("cores", "abc")].into_iter().collect();
        match encode_markup(&model) {
            Err(ConvertError::Format(err)) => assert_eq!(err.field, "cores"),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn flat_disk_and_network_map_to_devices() {
        let model = decode_flat(
            "scsi0: local-lvm:vm-100-disk-0,size=32G\nnet0: virtio=62:7C:6B:3A:32:1D,bridge=vmbr0,firewall=1\n",
        );
        let root = encode_tree(&model);
        let devices = root.get_child("devices").expect("devices");

        let disk = devices.get_child("disk").expect("disk");
        assert_eq!(disk.child_attr("source", "file"), Some("local-lvm:vm-100-disk-0"));
        assert_eq!(disk.child_attr("target", "dev"), Some("sda"));
        assert_eq!(disk.child_attr("target", "bus"), Some("scsi"));
        assert_eq!(disk.child_attr("driver", "type"), Some("qcow2"));

        let iface = devices.get_child("interface").expect("interface");
        assert_eq!(iface.child_attr("mac", "address"), Some("62:7C:6B:3A:32:1D"));
        assert_eq!(iface.child_attr("source", "bridge"), Some("vmbr0"));
        assert_eq!(iface.child_attr("model", "type"), Some("virtio"));
        assert_eq!(iface.child_attr("filterref", "filter"), Some("clean-traffic"));
    }

    #[test]
    fn empty_model_uses_fixed_shape_and_defaults() {
        let root = encode_tree(&ConfigModel::new());
        let order: Vec<&str> = root.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(
            order,
            vec!["name", "uuid", "memory", "currentMemory", "vcpu", "os", "features", "cpu", "devices"]
        );
        assert_eq!(root.attr("type"), Some("kvm"));
        assert_eq!(root.get_text(&["name"]), Some("vm-default"));
        assert_eq!(root.get_text(&["uuid"]), Some("4c4c4544-004b-1010-8032-b3c04f4e3132"));
        assert_eq!(root.get_text(&["memory"]), Some("2048"));
        assert_eq!(root.child_attr("memory", "unit"), Some("MiB"));
        assert_eq!(root.get_text(&["vcpu"]), Some("2"));
        assert!(root.get_child("features").and_then(|f| f.get_child("acpi")).is_some());

        let devices = root.get_child("devices").expect("devices");
        let tags: Vec<&str> = devices.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec!["emulator", "serial", "console", "video", "input", "input", "input"]
        );
    }

    #[test]
    fn features_and_identity_follow_model() {
        let model: ConfigModel = [
            ("name", "web01"),
            ("acpi", "0"),
            ("smbios1", "uuid=11111111-2222-3333-4444-555555555555"),
            ("memory", "4096"),
        ]
        .into_iter()
        .collect();
        let root = encode_tree(&model);
        let features = root.get_child("features").expect("features");
        assert!(features.get_child("acpi").is_none());
        assert!(features.get_child("apic").is_some());
        assert_eq!(root.get_text(&["uuid"]), Some("11111111-2222-3333-4444-555555555555"));
        assert_eq!(root.get_text(&["currentMemory"]), Some("4096"));
    }

    #[test]
    fn disks_letters_follow_position_and_skip_non_disk_keys() {
        let model: ConfigModel = [
            ("scsihw", "virtio-scsi-pci"),
            ("virtio0", "/images/a.raw,format=raw"),
            ("scsi1", "local:vm-1-disk-1"),
            ("ide2", "none,media=cdrom"),
        ]
        .into_iter()
        .collect();
        let root = encode_tree(&model);
        let disks = root.get_child("devices").expect("devices").get_children("disk");
        assert_eq!(disks.len(), 3);

        assert_eq!(disks[0].child_attr("target", "dev"), Some("vda"));
        assert_eq!(disks[0].child_attr("driver", "type"), Some("raw"));
        assert_eq!(disks[1].child_attr("target", "dev"), Some("sdb"));
        assert_eq!(disks[2].attr("device"), Some("cdrom"));
        assert_eq!(disks[2].child_attr("target", "dev"), Some("hdc"));
        assert!(disks[2].get_child("source").is_none());
    }

    #[test]
    fn network_without_mac_uses_defaults() {
        let model: ConfigModel = [("net0", "e1000"), ("net1", "")].into_iter().collect();
        let root = encode_tree(&model);
        let ifaces = root
            .get_child("devices")
            .expect("devices")
            .get_children("interface");
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].child_attr("mac", "address"), Some("52:54:00:12:34:56"));
        assert_eq!(ifaces[0].child_attr("source", "bridge"), Some("virbr0"));
        assert_eq!(ifaces[0].child_attr("model", "type"), Some("e1000"));
        assert!(ifaces[0].get_child("filterref").is_none());
    }

    #[test]
    fn special_characters_are_escaped() {
        let model: ConfigModel = [("name", "a<b&c")].into_iter().collect();
        let text = encode_markup(&model).expect("encode");
        assert!(text.contains("<name>a&lt;b&amp;c</name>"), "{text}");
        assert_eq!(decode_markup(&text).text("name"), Some("a<b&c"));
    }

    #[test]
    fn decode_classifies_disks_by_target_dev() {
        let model = decode_markup(
            r#"<domain type="kvm"><devices>
<disk type="file" device="disk"><driver name="qemu" type="qcow2"/><source file="/a.qcow2"/><target dev="vda" bus="virtio"/></disk>
<disk type="file" device="disk"><driver name="qemu" type="raw" cache="none"/><source file="/b.img"/><target dev="sda" bus="scsi"/></disk>
</devices></domain>"#,
        );
        assert_eq!(model.text("virtio0"), Some("/a.qcow2,format=qcow2"));
        assert_eq!(model.text("scsi0"), Some("/b.img,format=raw,cache=none"));
    }

    #[test]
    fn decode_unknown_target_uses_generic_key() {
        let model = decode_markup(
            r#"<domain><devices>
<disk device="disk"><source file="/x.img"/><target dev="xvda"/></disk>
<disk device="disk"><source file="/y.img"/><target dev="xvdb"/></disk>
</devices></domain>"#,
        );
        assert_eq!(model.text("disk0"), Some("/x.img"));
        assert_eq!(model.text("disk1"), Some("/y.img"));
    }

    #[test]
    fn decode_reads_identity_cpu_os_and_features() {
        let model = decode_markup(
            r#"<domain type="kvm">
  <name>db01</name>
  <memory unit="KiB">4194304</memory>
  <currentMemory>1024</currentMemory>
  <vcpu placement="static">4</vcpu>
  <cpu mode="host-model" check="partial"/>
  <os><type arch="x86_64" machine="q35">hvm</type><boot dev="hd"/><boot dev="network"/></os>
  <features><acpi/></features>
</domain>"#,
        );
        assert_eq!(model.text("name"), Some("db01"));
        assert_eq!(model.text("memory"), Some("4194304"));
        assert_eq!(model.text("memory_unit"), Some("KiB"));
        assert_eq!(model.text("current_memory"), Some("1024"));
        assert_eq!(model.text("current_memory_unit"), Some("MiB"));
        assert_eq!(model.text("vcpu"), Some("4"));
        assert_eq!(model.text("cpu_mode"), Some("host-model"));
        assert_eq!(model.text("cpu_check"), Some("partial"));
        assert_eq!(model.text("ostype"), Some("hvm"));
        assert_eq!(model.text("arch"), Some("x86_64"));
        assert_eq!(model.text("machine"), Some("q35"));
        assert_eq!(model.text("boot"), Some("order=hd;network"));
        assert_eq!(model.text("acpi"), Some("1"));
        assert_eq!(model.text("apic"), Some("0"));
    }

    #[test]
    fn decode_interfaces_by_encounter_order() {
        let model = decode_markup(
            r#"<domain><devices>
<interface type="network"><mac address="52:54:00:00:00:01"/><source network="default"/><model type="virtio"/></interface>
<interface type="bridge"><mac address="52:54:00:00:00:02"/><source bridge="br0"/><model type="e1000"/><filterref filter="clean-traffic"/></interface>
<interface type="direct"><mac address="52:54:00:00:00:03"/><source dev="eth0"/></interface>
</devices></domain>"#,
        );
        assert_eq!(model.text("net0"), Some("virtio=52:54:00:00:00:01,bridge=default"));
        assert_eq!(
            model.text("net1"),
            Some("e1000=52:54:00:00:00:02,bridge=br0,firewall=1")
        );
        assert_eq!(model.text("net2"), Some("=52:54:00:00:00:03,bridge="));
    }

    #[test]
    fn decode_vga_prefers_video_model() {
        let both = decode_markup(
            r#"<domain><devices><graphics type="vnc"/><video><model type="virtio"/></video></devices></domain>"#,
        );
        assert_eq!(both.text("vga"), Some("virtio"));
        let graphics_only =
            decode_markup(r#"<domain><devices><graphics type="spice"/></devices></domain>"#);
        assert_eq!(graphics_only.text("vga"), Some("spice"));
    }

    #[test]
    fn invalid_markup_yields_empty_model() {
        for input in ["", "not xml at all", "<domain><name>x</domain>", "<domain", "\u{0}\u{1}", "<other/>"] {
            assert!(decode_markup(input).is_empty(), "input {input:?}");
        }
    }

    #[test]
    fn wrapped_element_text_survives_flat_conversion() {
        let model = decode_markup(
            "<domain>\n  <name>\n    web01\n  </name>\n  <memory unit=\"MiB\">\n    4096\n  </memory>\n  <vcpu placement=\"static\">\n    4\n  </vcpu>\n  <os>\n    <type arch=\"x86_64\">\n      hvm\n    </type>\n  </os>\n</domain>",
        );
        assert_eq!(model.text("name"), Some("web01"));
        assert_eq!(model.text("memory"), Some("4096"));
        assert_eq!(model.text("vcpu"), Some("4"));
        assert_eq!(model.text("ostype"), Some("hvm"));

        let again = decode_flat(&encode_flat(&model, SectionCatalog::builtin()));
        assert_eq!(again.text("name"), Some("web01"));
        assert_eq!(again.text("vcpu"), Some("4"));
    }

    #[test]
    fn expanded_devices_encode_like_their_source() {
        let model = decode_flat(
            "scsi0: local-lvm:vm-100-disk-0,size=32G\nide2: none,media=cdrom\nnet0: virtio=62:7C:6B:3A:32:1D,bridge=vmbr0,firewall=1\n",
        );
        let expanded = materialize(&model);
        assert_eq!(
            encode_markup(&expanded).expect("expanded"),
            encode_markup(&model).expect("flat")
        );

        let root = encode_tree(&expanded);
        let devices = root.get_child("devices").expect("devices");
        let disk = devices.get_child("disk").expect("disk");
        assert_eq!(disk.child_attr("source", "file"), Some("local-lvm:vm-100-disk-0"));
        let iface = devices.get_child("interface").expect("interface");
        assert_eq!(iface.child_attr("mac", "address"), Some("62:7C:6B:3A:32:1D"));
        assert_eq!(iface.child_attr("model", "type"), Some("virtio"));
    }
}
