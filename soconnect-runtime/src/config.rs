//! The line-oriented `key = value` configuration format (spec §6), parsed by
//! hand to match the teacher workspace's minimal-dependency preference (no
//! `serde`/`toml`/`config` crate exists anywhere in the teacher's workspace).

use std::fs;
use std::path::Path;

use soconnect_dpdk::PortView;
use soconnect_pkt::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashField {
    Ip,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Sctp,
}

impl HashField {
    fn parse(token: &str) -> Result<Self> {
        Ok(match token {
            "ip" => HashField::Ip,
            "ipv4" => HashField::Ipv4,
            "ipv6" => HashField::Ipv6,
            "tcp" => HashField::Tcp,
            "udp" => HashField::Udp,
            "sctp" => HashField::Sctp,
            other => return Err(Error::invalid_value(format!("unknown rss_hash_field token '{other}'"))),
        })
    }
}

/// Every recognized framework key from spec §6, already validated and typed.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub port_mac: Vec<[u8; 6]>,
    pub nb_rx_rings_per_port: u16,
    pub nb_tx_rings_per_port: u16,
    pub rx_queue_len: u16,
    pub tx_queue_len: u16,
    pub enable_promiscuous: bool,
    pub enable_rss: bool,
    pub enable_offload: bool,
    pub rss_symmetric_mode: bool,
    pub rss_hash_field: Vec<HashField>,
    pub used_core_ids: Vec<u32>,
    pub nb_memory_channels_per_socket: u32,
    pub control_core_id: u32,
    pub enable_test_duration_limit: bool,
    pub test_duration_secs: u64,
    /// Published port descriptors (spec.md §3's "selected port descriptors"),
    /// filled in by `Runtime::run` once `init_ports` has resolved every
    /// configured MAC to a physical port. Empty until then.
    pub ports: Vec<PortView>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port_mac: Vec::new(),
            nb_rx_rings_per_port: 1,
            nb_tx_rings_per_port: 1,
            rx_queue_len: 1024,
            tx_queue_len: 1024,
            enable_promiscuous: true,
            enable_rss: true,
            enable_offload: true,
            rss_symmetric_mode: true,
            rss_hash_field: vec![HashField::Ip],
            used_core_ids: Vec::new(),
            nb_memory_channels_per_socket: 4,
            control_core_id: 0,
            enable_test_duration_limit: false,
            test_duration_secs: 0,
            ports: Vec::new(),
        }
    }
}

/// Driver descriptor rings are bounded at this size regardless of what the
/// config file requests (spec §6: "bounded by 8192").
const MAX_QUEUE_LEN: u16 = 8192;

impl RuntimeConfig {
    /// Load and parse a config file, applying every recognized framework
    /// key. Unrecognized keys are handed to `on_app_kv` (the module-supplied
    /// `parse_app_kv_pair`), matching spec §6's `init_app` contract.
    pub fn from_file<P, F>(path: P, mut on_app_kv: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnMut(&str, &str) -> Result<()>,
    {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::not_exist(format!("cannot read config file: {e}")))?;

        let mut cfg = Self::default();
        for raw_line in text.lines() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before,
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::invalid_value(format!("malformed config line: '{raw_line}'")))?;
            let key = key.trim();
            let value = value.trim();

            cfg.apply(key, value, &mut on_app_kv)?;
        }

        Ok(cfg)
    }

    fn apply<F: FnMut(&str, &str) -> Result<()>>(&mut self, key: &str, value: &str, on_app_kv: &mut F) -> Result<()> {
        match key {
            "port_mac" => {
                self.port_mac = value
                    .split(',')
                    .map(|mac| parse_mac(mac.trim()))
                    .collect::<Result<Vec<_>>>()?;
            }
            "nb_rx_rings_per_port" => self.nb_rx_rings_per_port = parse_u16(key, value)?,
            "nb_tx_rings_per_port" => self.nb_tx_rings_per_port = parse_u16(key, value)?,
            "rx_queue_len" => self.rx_queue_len = parse_u16(key, value)?.min(MAX_QUEUE_LEN),
            "tx_queue_len" => self.tx_queue_len = parse_u16(key, value)?.min(MAX_QUEUE_LEN),
            "enable_promiscuous" => self.enable_promiscuous = parse_bool(key, value)?,
            "enable_rss" => self.enable_rss = parse_bool(key, value)?,
            "enable_offload" => self.enable_offload = parse_bool(key, value)?,
            "rss_symmetric_mode" => {
                self.rss_symmetric_mode = match value {
                    "symmetric" => true,
                    "asymmetric" => false,
                    other => {
                        return Err(Error::invalid_value(format!(
                            "rss_symmetric_mode must be 'symmetric' or 'asymmetric', got '{other}'"
                        )))
                    }
                };
            }
            "rss_hash_field" => {
                self.rss_hash_field = value
                    .split(',')
                    .map(|t| HashField::parse(t.trim()))
                    .collect::<Result<Vec<_>>>()?;
            }
            "used_core_ids" => {
                self.used_core_ids = value
                    .split(',')
                    .map(|t| {
                        t.trim()
                            .parse::<u32>()
                            .map_err(|_| Error::invalid_value(format!("invalid core id '{t}'")))
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            "nb_memory_channels_per_socket" => self.nb_memory_channels_per_socket = parse_u32(key, value)?,
            "control_core_id" => self.control_core_id = parse_u32(key, value)?,
            "enable_test_duration_limit" => self.enable_test_duration_limit = parse_bool(key, value)?,
            "test_duration" => self.test_duration_secs = parse_u32(key, value)? as u64,
            _ => on_app_kv(key, value)?,
        }
        Ok(())
    }

    /// Senders are the first half of `used_core_ids`, receivers the second
    /// half, per spec §9's resolved open question.
    pub fn sender_cores(&self) -> &[u32] {
        &self.used_core_ids[..self.used_core_ids.len() / 2]
    }

    pub fn receiver_cores(&self) -> &[u32] {
        &self.used_core_ids[self.used_core_ids.len() / 2..]
    }

    /// Derive the generator-side RSS field mask matching the device-side
    /// mask `port_init::requested_rss_mask` programs into the NIC (spec
    /// §4.1/§4.2): any of {tcp, udp, sctp} in `rss_hash_field` selects the
    /// L3/L4 tuple, otherwise the NIC falls back to its L3-only 2-tuple
    /// hash. A packet generator must pick candidates against the same
    /// tuple or its traffic lands on the wrong queue.
    pub fn rss_field_mask(&self) -> soconnect_pkt::rss::RssFieldMask {
        let l4_selected = self
            .rss_hash_field
            .iter()
            .any(|f| matches!(f, HashField::Tcp | HashField::Udp | HashField::Sctp));
        if l4_selected {
            soconnect_pkt::rss::RssFieldMask::L3L4
        } else {
            soconnect_pkt::rss::RssFieldMask::L3Only
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.used_core_ids.contains(&self.control_core_id) {
            return Err(Error::invalid_value("control_core_id overlaps a worker core"));
        }
        if self.port_mac.is_empty() {
            return Err(Error::invalid_value("port_mac must name at least one port"));
        }
        Ok(())
    }
}

fn parse_mac(s: &str) -> Result<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(':');
    for byte in mac.iter_mut() {
        let token = parts
            .next()
            .ok_or_else(|| Error::invalid_value(format!("malformed MAC address '{s}'")))?;
        *byte = u8::from_str_radix(token, 16)
            .map_err(|_| Error::invalid_value(format!("malformed MAC address '{s}'")))?;
    }
    if parts.next().is_some() {
        return Err(Error::invalid_value(format!("malformed MAC address '{s}'")));
    }
    Ok(mac)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_value(format!("'{key}' must be true/false, got '{value}'"))),
    }
}

fn parse_u16(key: &str, value: &str) -> Result<u16> {
    value.parse().map_err(|_| Error::invalid_value(format!("'{key}' is not a valid integer: '{value}'")))
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| Error::invalid_value(format!("'{key}' is not a valid integer: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("soconnect-cfg-test-{:p}.conf", contents.as_ptr()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_framework_keys_and_comments() {
        let path = write_temp(
            "# comment line\n\
             port_mac = AA:BB:CC:DD:EE:FF, 11:22:33:44:55:66\n\
             nb_rx_rings_per_port = 2\n\
             rx_queue_len = 99999\n\
             enable_rss = true\n\
             rss_symmetric_mode = asymmetric\n\
             rss_hash_field = ip, udp\n\
             used_core_ids = 1,2,3,4\n\
             control_core_id = 0\n\
             app_key = 42\n",
        );

        let mut app_kv = Vec::new();
        let cfg = RuntimeConfig::from_file(&path, |k, v| {
            app_kv.push((k.to_string(), v.to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(cfg.port_mac.len(), 2);
        assert_eq!(cfg.nb_rx_rings_per_port, 2);
        assert_eq!(cfg.rx_queue_len, MAX_QUEUE_LEN);
        assert!(cfg.enable_rss);
        assert!(!cfg.rss_symmetric_mode);
        assert_eq!(cfg.rss_hash_field, vec![HashField::Ip, HashField::Udp]);
        assert_eq!(cfg.sender_cores(), &[1, 2]);
        assert_eq!(cfg.receiver_cores(), &[3, 4]);
        assert_eq!(app_kv, vec![("app_key".to_string(), "42".to_string())]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rss_field_mask_follows_hash_field() {
        let mut cfg = RuntimeConfig::default();
        cfg.rss_hash_field = vec![HashField::Ip];
        assert_eq!(cfg.rss_field_mask(), soconnect_pkt::rss::RssFieldMask::L3Only);

        cfg.rss_hash_field = vec![HashField::Ip, HashField::Udp];
        assert_eq!(cfg.rss_field_mask(), soconnect_pkt::rss::RssFieldMask::L3L4);
    }

    #[test]
    fn rejects_control_core_overlap() {
        let mut cfg = RuntimeConfig::default();
        cfg.used_core_ids = vec![0, 1];
        cfg.control_core_id = 1;
        cfg.port_mac = vec![[0; 6]];
        assert!(cfg.validate().is_err());
    }
}
