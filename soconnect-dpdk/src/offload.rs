//! Bit-level device/mbuf offload configuration, ported from the teacher's
//! `dpdk_offload_conf!` macro (`rpkt-dpdk/src/offload.rs`).

pub use soconnect_pkt::rss::{DEFAULT_RSS_KEY_40B, DEFAULT_RSS_KEY_40B_ASYMMETRIC};

macro_rules! dpdk_offload_conf {
    (
        $(#[$conf_attr: meta])*
        pub struct $conf_ident:ident ($val_type:ty) {
            $(
                $(#[$field_attr:meta])*
                $field_name:ident, $enable_field_name:ident, $init_val:literal << $shift_val:literal
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
        $(#[$conf_attr])*
        pub struct $conf_ident(pub(crate) $val_type);

        impl $conf_ident {
            $(
                $(#[$field_attr])*
                #[inline]
                pub fn $field_name(&self) -> bool {
                    (self.0 & (($init_val as $val_type) << $shift_val)) != 0
                }

                $(#[$field_attr])*
                #[inline]
                pub fn $enable_field_name(&mut self) {
                    self.0 = self.0 | (($init_val as $val_type) << $shift_val);
                }
            )+

            pub const ALL_ENABLED: Self = Self(
                $(
                    (($init_val as $val_type) << $shift_val)
                )|+
            );

            pub const ALL_DISABLED: Self = Self(0);
        }
    };
}

// 12 rss types supporting ipv4/v6, as in dpdk/app/test-pmd/config.c's rss_type_table.
dpdk_offload_conf!(
    pub struct RssHashFunc(u64) {
        ipv4,               enable_ipv4,               1 << 2,
        frag_ipv4,          enable_frag_ipv4,          1 << 3,
        nonfrag_ipv4_tcp,   enable_nonfrag_ipv4_tcp,   1 << 4,
        nonfrag_ipv4_udp,   enable_nonfrag_ipv4_udp,   1 << 5,
        nonfrag_ipv4_sctp,  enable_nonfrag_ipv4_sctp,  1 << 6,
        nonfrag_ipv4_other, enable_nonfrag_ipv4_other, 1 << 7,
        ipv6,               enable_ipv6,               1 << 8,
        frag_ipv6,          enable_frag_ipv6,          1 << 9,
        nonfrag_ipv6_tcp,   enable_nonfrag_ipv6_tcp,   1 << 10,
        nonfrag_ipv6_udp,   enable_nonfrag_ipv6_udp,   1 << 11,
        nonfrag_ipv6_sctp,  enable_nonfrag_ipv6_sctp,  1 << 12,
        nonfrag_ipv6_other, enable_nonfrag_ipv6_other, 1 << 13,
    }
);

impl RssHashFunc {
    /// Intersect a caller-requested hash-field mask with what the device
    /// actually reports supporting (spec §4.4: "hash-field mask is passed
    /// verbatim", bounded by driver capability).
    pub fn intersect(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

dpdk_offload_conf!(
    pub struct MbufTxOffload(u64) {
        _do_not_use_1, enable_ip_cksum,  1 << 54,
        _do_not_use_2, enable_udp_cksum, 3 << 52,
        _do_not_use_3, enable_tcp_cksum, 1 << 52,
    }
);

dpdk_offload_conf!(
    pub struct MbufRxOffload(u64) {
        rss_hash,      _do_not_use_1, 1 << 1,
        ip_cksum_bad,  _do_not_use_2, 1 << 4,
        ip_cksum_good, _do_not_use_3, 1 << 7,
        l4_cksum_bad,  _do_not_use_4, 1 << 3,
        l4_cksum_good, _do_not_use_5, 1 << 8,
    }
);

// Port initializer (spec §4.4) only opportunistically enables checksum-receive
// on RX, so the rx bitset stays small; tx carries the full set named there
// (ipv4, udp, tcp, sctp checksum, mt-lockfree, fast-free).
dpdk_offload_conf!(
    pub struct DevRxOffload(u64) {
        ipv4_cksum, enable_ipv4_cksum, 1 << 1,
        udp_cksum,  enable_udp_cksum,  1 << 2,
        tcp_cksum,  enable_tcp_cksum,  1 << 3,
        rss_hash,   enable_rss_hash,   1 << 19,
    }
);

dpdk_offload_conf!(
    pub struct DevTxOffload(u64) {
        ipv4_cksum,   enable_ipv4_cksum,   1 << 1,
        udp_cksum,    enable_udp_cksum,    1 << 2,
        tcp_cksum,    enable_tcp_cksum,    1 << 3,
        sctp_cksum,   enable_sctp_cksum,   1 << 4,
        mt_lockfree,  enable_mt_lockfree,  1 << 14,
        multi_segs,   enable_multi_segs,   1 << 15,
        fast_free,    enable_fast_free,    1 << 17,
    }
);
