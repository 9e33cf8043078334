//! Packet-header prototype, RSS-affine random generator and the assembly
//! routines that stage a `PktHdr` into one or more chained send buffers.
//!
//! The buffer side of assembly (`assemble_into_mbuf`,
//! `generate_burst_fast_v4_udp`, `copy_payload_into_burst`) is written
//! against the `Segment`/`Pool` traits below rather than against a concrete
//! mbuf type, the same way the rest of this crate stays `no_std` and
//! driver-agnostic: `soconnect-dpdk`'s mbuf/mempool wrappers are the real
//! implementation of these traits, modeled on the chain-walking logic in
//! the teacher's `rpkt-dpdk/src/pbuf.rs` (`Pbuf::advance_common`,
//! `advance_slow`, `move_back_slow`).

use alloc::vec::Vec;

use crate::ether::{self, EtherHeader, ETHER_HEADER_LEN};
use crate::ipv4::{self, Ipv4Header, IPV4_HEADER_LEN};
use crate::ipv6::{Ipv6Header, IPV6_HEADER_LEN};
use crate::rss::{self, RssResult};
use crate::sctp::{SctpHeader, SCTP_HEADER_LEN};
use crate::tcp::{TcpHeader, TCP_HEADER_LEN};
use crate::udp::{UdpHeader, UDP_HEADER_LEN};
use crate::vlan::{VlanHeader, VLAN_HEADER_LEN};

/// One writable segment of a (possibly chained) send buffer.
pub trait Segment {
    /// Bytes this segment can hold.
    fn capacity(&self) -> usize;
    /// The portion of the segment that has been written so far.
    fn written(&self) -> usize;
    /// Grow the written region and copy `data` into it at `offset`.
    fn write_at(&mut self, offset: usize, data: &[u8]) -> crate::Result<()>;
}

/// A pool capable of handing out chained segments for one packet.
pub trait Pool {
    type Seg: Segment;

    /// Maximum bytes a single segment can carry (`default_mbuf_data_room`).
    fn segment_room(&self) -> usize;

    /// Allocate one fresh, empty segment.
    fn alloc(&mut self) -> crate::Result<Self::Seg>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L3Variant {
    V4,
    V6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L4Variant {
    Udp,
    Tcp,
    Sctp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L3Addr {
    V4(u32),
    V6(u128),
}

/// A prototype packet header plus an owned payload buffer, ready to be
/// staged into send buffers by `assemble_into_mbuf`.
pub struct PktHdr {
    pub eth_src: [u8; 6],
    pub eth_dst: [u8; 6],
    pub vlan_id: Option<u16>,
    pub l3: L3Variant,
    pub src_addr: L3Addr,
    pub dst_addr: L3Addr,
    pub l4: L4Variant,
    pub src_port: u16,
    pub dst_port: u16,
    pub sctp_tag: u32,
    pub pkt_len: usize,
    pub payload: Vec<u8>,
    pub payload_offset: usize,
}

fn l3_header_len(l3: L3Variant) -> usize {
    match l3 {
        L3Variant::V4 => IPV4_HEADER_LEN,
        L3Variant::V6 => IPV6_HEADER_LEN,
    }
}

fn l4_header_len(l4: L4Variant) -> usize {
    match l4 {
        L4Variant::Udp => UDP_HEADER_LEN,
        L4Variant::Tcp => TCP_HEADER_LEN,
        L4Variant::Sctp => SCTP_HEADER_LEN,
    }
}

impl PktHdr {
    fn l3_header_len(&self) -> usize {
        l3_header_len(self.l3)
    }

    fn l4_header_len(&self) -> usize {
        l4_header_len(self.l4)
    }

    fn vlan_len(&self) -> usize {
        if self.vlan_id.is_some() { VLAN_HEADER_LEN } else { 0 }
    }

    /// Sum of every header layer, excluding payload.
    pub fn header_len(&self) -> usize {
        ETHER_HEADER_LEN + self.vlan_len() + self.l3_header_len() + self.l4_header_len()
    }

    /// `pkt_len` must equal `header_len() + payload.len()` (spec §3's length
    /// additivity invariant). Callers that build a `PktHdr` directly, rather
    /// than through `generate_random`, are responsible for this themselves;
    /// `assemble_into_mbuf`/`generate_burst_fast_v4_udp` check it before
    /// staging anything.
    fn check_pkt_len(&self) -> crate::Result<()> {
        let expected = self.header_len() + self.payload.len();
        if self.pkt_len != expected {
            return Err(crate::Error::invalid_value(alloc::format!(
                "pkt_len {} does not match header_len({}) + payload_len({})",
                self.pkt_len,
                self.header_len(),
                self.payload.len()
            )));
        }
        Ok(())
    }

    fn rss_result(&self, key: &[u8]) -> RssResult {
        match self.src_addr {
            L3Addr::V4(src) => {
                let dst = match self.dst_addr {
                    L3Addr::V4(d) => d,
                    _ => 0,
                };
                rss::rss_ipv4(key, src, dst, self.src_port, self.dst_port)
            }
            L3Addr::V6(src) => {
                let dst = match self.dst_addr {
                    L3Addr::V6(d) => d,
                    _ => 0,
                };
                rss::rss_ipv6(key, src, dst, self.src_port, self.dst_port)
            }
        }
    }

    /// Serialize every header layer (but not the payload) into `out`,
    /// recomputing lengths and, for IPv4, the header checksum.
    fn write_headers(&self, out: &mut Vec<u8>) {
        let l3_len = self.l3_header_len();
        let l4_len = self.l4_header_len();
        let l4_total_len = l4_len + self.payload.len();

        let mut eth = EtherHeader::new_unchecked([0u8; ETHER_HEADER_LEN]);
        eth.set_src_addr(self.eth_src);
        eth.set_dst_addr(self.eth_dst);
        let ethertype = match self.l3 {
            L3Variant::V4 => ether::ETHERTYPE_IPV4,
            L3Variant::V6 => ether::ETHERTYPE_IPV6,
        };
        if self.vlan_id.is_some() {
            eth.set_ethertype(ether::ETHERTYPE_VLAN);
        } else {
            eth.set_ethertype(ethertype);
        }
        out.extend_from_slice(eth.as_bytes());

        if let Some(vlan_id) = self.vlan_id {
            let mut vlan = VlanHeader::new_unchecked([0u8; VLAN_HEADER_LEN]);
            vlan.set_tpid(0x8100);
            vlan.set_vlan_id(vlan_id, 0);
            out.extend_from_slice(vlan.as_bytes());
            out.extend_from_slice(&ethertype.to_be_bytes());
        }

        let l4_proto = match self.l4 {
            L4Variant::Udp => ipv4::PROTO_UDP,
            L4Variant::Tcp => ipv4::PROTO_TCP,
            L4Variant::Sctp => ipv4::PROTO_SCTP,
        };

        match (self.l3, self.src_addr, self.dst_addr) {
            (L3Variant::V4, L3Addr::V4(src), L3Addr::V4(dst)) => {
                let mut ip = Ipv4Header::new_unchecked([0u8; IPV4_HEADER_LEN]);
                ip.set_ihl(ipv4::IPV4_DEFAULT_IHL);
                ip.set_total_len((l3_len + l4_total_len) as u16);
                ip.set_ttl(ipv4::IPV4_DEFAULT_TTL);
                ip.set_protocol(l4_proto);
                ip.set_src_addr(src);
                ip.set_dst_addr(dst);
                ip.compute_and_set_checksum();
                out.extend_from_slice(ip.as_bytes());
            }
            (L3Variant::V6, L3Addr::V6(src), L3Addr::V6(dst)) => {
                let mut ip = Ipv6Header::new_unchecked([0u8; IPV6_HEADER_LEN]);
                ip.set_payload_len(l4_total_len as u16);
                ip.set_next_header(l4_proto);
                ip.set_hop_limit(64);
                ip.set_src_addr(src);
                ip.set_dst_addr(dst);
                out.extend_from_slice(ip.as_bytes());
            }
            _ => unreachable!("src/dst address variant must match l3 variant"),
        }

        match self.l4 {
            L4Variant::Udp => {
                let mut udp = UdpHeader::new_unchecked([0u8; UDP_HEADER_LEN]);
                udp.set_src_port(self.src_port);
                udp.set_dst_port(self.dst_port);
                udp.set_packet_len(l4_total_len as u16);
                if let L3Addr::V4(src) = self.src_addr {
                    if let L3Addr::V4(dst) = self.dst_addr {
                        udp.compute_and_set_checksum_v4(src, dst, &self.payload);
                    }
                }
                out.extend_from_slice(udp.as_bytes());
            }
            L4Variant::Tcp => {
                let mut tcp = TcpHeader::new_unchecked([0u8; TCP_HEADER_LEN]);
                tcp.set_src_port(self.src_port);
                tcp.set_dst_port(self.dst_port);
                tcp.set_data_offset(5);
                out.extend_from_slice(tcp.as_bytes());
            }
            L4Variant::Sctp => {
                let mut sctp = SctpHeader::new_unchecked([0u8; SCTP_HEADER_LEN]);
                sctp.set_src_port(self.src_port);
                sctp.set_dst_port(self.dst_port);
                sctp.set_verification_tag(self.sctp_tag);
                sctp.compute_and_set_checksum(&self.payload);
                out.extend_from_slice(sctp.as_bytes());
            }
        }
    }
}

/// Produce one RSS-affine `PktHdr`. Retries with freshly randomized
/// addresses/ports until the Toeplitz hash lands on `target_queue`, or
/// accepts the first candidate if `rss_affinity` is false. `quit` is
/// polled once per attempt so shutdown cannot be starved by an unlucky
/// target.
#[allow(clippy::too_many_arguments)]
pub fn generate_random<R: RngSource>(
    rng: &mut R,
    rss_key: &[u8],
    target_queue: u16,
    nb_queues: u16,
    l3: L3Variant,
    l4: L4Variant,
    rss_affinity: bool,
    hash_field_mask: rss::RssFieldMask,
    min_len: usize,
    pkt_len: usize,
    payload: Vec<u8>,
    quit: &dyn Fn() -> bool,
) -> crate::Result<PktHdr> {
    if pkt_len < min_len {
        return Err(crate::Error::invalid_value("pkt_len below min_len"));
    }
    let expected_len = ETHER_HEADER_LEN + l3_header_len(l3) + l4_header_len(l4) + payload.len();
    if pkt_len != expected_len {
        return Err(crate::Error::invalid_value(alloc::format!(
            "pkt_len {pkt_len} does not match eth_len + l3_len + l4_len + payload_len ({expected_len})"
        )));
    }

    loop {
        if quit() {
            return Err(crate::Error::not_finished("generation aborted by quit flag"));
        }

        let src_port = rng.next_u16();
        let dst_port = rng.next_u16();
        let (src_addr, dst_addr) = match l3 {
            L3Variant::V4 => (L3Addr::V4(rng.next_u32()), L3Addr::V4(rng.next_u32())),
            L3Variant::V6 => (L3Addr::V6(rng.next_u128()), L3Addr::V6(rng.next_u128())),
        };

        let candidate = PktHdr {
            eth_src: rng.next_mac(),
            eth_dst: rng.next_mac(),
            vlan_id: None,
            l3,
            src_addr,
            dst_addr,
            l4,
            src_port,
            dst_port,
            sctp_tag: rng.next_u32(),
            pkt_len,
            payload: payload.clone(),
            payload_offset: 0,
        };

        if !rss_affinity {
            return Ok(candidate);
        }

        let result = candidate.rss_result(rss_key);
        if rss::rss_queue_id_for_mask(result, hash_field_mask, nb_queues) == target_queue {
            return Ok(candidate);
        }
    }
}

/// Source of randomness for `generate_random`. Kept as a trait so callers
/// can supply a deterministic PRNG in tests without pulling `rand` into
/// this crate's non-dev dependencies.
pub trait RngSource {
    fn next_u16(&mut self) -> u16;
    fn next_u32(&mut self) -> u32;
    fn next_u128(&mut self) -> u128;
    fn next_mac(&mut self) -> [u8; 6];
}

/// Stage `hdr`'s headers, then payload, into one or more chained segments
/// drawn from `pool`. Records the payload's byte offset back into `hdr`.
pub fn assemble_into_mbuf<P: Pool>(pool: &mut P, hdr: &mut PktHdr) -> crate::Result<Vec<P::Seg>> {
    hdr.check_pkt_len()?;

    let mut headers = Vec::with_capacity(hdr.header_len());
    hdr.write_headers(&mut headers);
    let payload_offset = headers.len();

    let mut staged = Vec::new();
    staged.extend_from_slice(&headers);
    staged.extend_from_slice(&hdr.payload);

    let room = pool.segment_room();
    let mut segments = Vec::new();
    let mut offset = 0usize;
    let result = (|| -> crate::Result<()> {
        while offset < staged.len() {
            let chunk_len = core::cmp::min(room, staged.len() - offset);
            let mut seg = pool.alloc()?;
            seg.write_at(0, &staged[offset..offset + chunk_len])?;
            segments.push(seg);
            offset += chunk_len;
        }
        Ok(())
    })();

    if let Err(e) = result {
        segments.clear();
        return Err(e);
    }

    hdr.payload_offset = payload_offset;
    Ok(segments)
}

/// Emit `n` identical copies of a fully prepared IPv4/UDP header into
/// freshly allocated segment chains.
pub fn generate_burst_fast_v4_udp<P: Pool>(
    pool: &mut P,
    hdr: &PktHdr,
    n: usize,
) -> crate::Result<Vec<Vec<P::Seg>>> {
    hdr.check_pkt_len()?;

    let mut headers = Vec::with_capacity(hdr.header_len());
    hdr.write_headers(&mut headers);

    let mut staged = Vec::with_capacity(headers.len() + hdr.payload.len());
    staged.extend_from_slice(&headers);
    staged.extend_from_slice(&hdr.payload);

    let room = pool.segment_room();
    let mut burst = Vec::with_capacity(n);
    for _ in 0..n {
        let mut offset = 0usize;
        let mut segments = Vec::new();
        while offset < staged.len() {
            let chunk_len = core::cmp::min(room, staged.len() - offset);
            let mut seg = pool.alloc()?;
            seg.write_at(0, &staged[offset..offset + chunk_len])?;
            segments.push(seg);
            offset += chunk_len;
        }
        burst.push(segments);
    }
    Ok(burst)
}

/// Overwrite `len` bytes at `payload_offset` in every buffer of `burst`,
/// splitting the write across segment boundaries as needed.
pub fn copy_payload_into_burst<S: Segment>(
    payload: &[u8],
    len: usize,
    payload_offset: usize,
    burst: &mut [Vec<S>],
) -> crate::Result<()> {
    let data = &payload[..len];
    for chain in burst.iter_mut() {
        let mut remaining_offset = payload_offset;
        let mut written = 0usize;
        for seg in chain.iter_mut() {
            let cap = seg.capacity();
            if remaining_offset >= cap {
                remaining_offset -= cap;
                continue;
            }
            let space = cap - remaining_offset;
            let take = core::cmp::min(space, data.len() - written);
            if take == 0 {
                break;
            }
            seg.write_at(remaining_offset, &data[written..written + take])?;
            written += take;
            remaining_offset = 0;
            if written == data.len() {
                break;
            }
        }
        if written != data.len() {
            return Err(crate::Error::internal("payload refresh ran past end of chain"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rss::RssFieldMask;

    struct TestSegment {
        buf: Vec<u8>,
        written: usize,
    }

    impl Segment for TestSegment {
        fn capacity(&self) -> usize {
            self.buf.len()
        }

        fn written(&self) -> usize {
            self.written
        }

        fn write_at(&mut self, offset: usize, data: &[u8]) -> crate::Result<()> {
            if offset + data.len() > self.buf.len() {
                return Err(crate::Error::invalid_value("write past segment capacity"));
            }
            self.buf[offset..offset + data.len()].copy_from_slice(data);
            self.written = self.written.max(offset + data.len());
            Ok(())
        }
    }

    struct TestPool {
        room: usize,
    }

    impl Pool for TestPool {
        type Seg = TestSegment;

        fn segment_room(&self) -> usize {
            self.room
        }

        fn alloc(&mut self) -> crate::Result<Self::Seg> {
            Ok(TestSegment { buf: alloc::vec![0u8; self.room], written: 0 })
        }
    }

    /// A fixed, never-varying source: fine for tests that force termination
    /// via `nb_queues == 1` rather than relying on hash distribution.
    struct FixedRng;

    impl RngSource for FixedRng {
        fn next_u16(&mut self) -> u16 {
            4242
        }
        fn next_u32(&mut self) -> u32 {
            0x0a000001
        }
        fn next_u128(&mut self) -> u128 {
            1
        }
        fn next_mac(&mut self) -> [u8; 6] {
            [0, 1, 2, 3, 4, 5]
        }
    }

    fn sample_hdr(payload: Vec<u8>) -> PktHdr {
        let pkt_len = ETHER_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN + payload.len();
        PktHdr {
            eth_src: [0, 1, 2, 3, 4, 5],
            eth_dst: [6, 7, 8, 9, 10, 11],
            vlan_id: None,
            l3: L3Variant::V4,
            src_addr: L3Addr::V4(0x0a000001),
            dst_addr: L3Addr::V4(0x0a000002),
            l4: L4Variant::Udp,
            src_port: 1234,
            dst_port: 80,
            sctp_tag: 0,
            pkt_len,
            payload,
            payload_offset: 0,
        }
    }

    #[test]
    fn generate_random_rejects_mismatched_pkt_len() {
        let mut rng = FixedRng;
        let err = generate_random(
            &mut rng,
            &rss::DEFAULT_RSS_KEY_40B,
            0,
            1,
            L3Variant::V4,
            L4Variant::Udp,
            false,
            RssFieldMask::L3L4,
            0,
            1000,
            alloc::vec![0u8; 4],
            &|| false,
        );
        assert!(err.is_err());
    }

    #[test]
    fn generate_random_rss_affinity_single_queue_always_matches() {
        // nb_queues == 1 makes every candidate's queue id 0 regardless of
        // hash, so this terminates on the first attempt and exercises the
        // rss_affinity/mask plumbing without depending on hash distribution.
        let mut rng = FixedRng;
        let payload = alloc::vec![1u8, 2, 3, 4];
        let pkt_len = ETHER_HEADER_LEN + IPV4_HEADER_LEN + UDP_HEADER_LEN + payload.len();
        let hdr = generate_random(
            &mut rng,
            &rss::DEFAULT_RSS_KEY_40B,
            0,
            1,
            L3Variant::V4,
            L4Variant::Udp,
            true,
            RssFieldMask::L3Only,
            0,
            pkt_len,
            payload,
            &|| false,
        )
        .unwrap();
        assert_eq!(hdr.pkt_len, pkt_len);
    }

    #[test]
    fn rss_affinity_mask_selects_l3_only_tuple() {
        let hdr_a = sample_hdr(alloc::vec![0u8; 4]);
        let mut hdr_b = sample_hdr(alloc::vec![0u8; 4]);
        hdr_b.src_port = 9999;
        hdr_b.dst_port = 53;

        let result_a = hdr_a.rss_result(&rss::DEFAULT_RSS_KEY_40B);
        let result_b = hdr_b.rss_result(&rss::DEFAULT_RSS_KEY_40B);

        // Same addresses, different ports: an L3-only mask must land them
        // on the same queue (spec §4.1/§4.2).
        assert_eq!(
            rss::rss_queue_id_for_mask(result_a, RssFieldMask::L3Only, 16),
            rss::rss_queue_id_for_mask(result_b, RssFieldMask::L3Only, 16)
        );
    }

    #[test]
    fn assemble_rejects_mismatched_pkt_len() {
        let mut hdr = sample_hdr(alloc::vec![1u8; 4]);
        hdr.pkt_len = 0;
        let mut pool = TestPool { room: 256 };
        assert!(assemble_into_mbuf(&mut pool, &mut hdr).is_err());
    }

    #[test]
    fn assemble_round_trip_and_checksums() {
        let payload = alloc::vec![0xAAu8, 0xBB, 0xCC, 0xDD];
        let mut hdr = sample_hdr(payload.clone());
        let mut pool = TestPool { room: 256 };

        let segments = assemble_into_mbuf(&mut pool, &mut hdr).unwrap();
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        let bytes = &seg.buf[..seg.written];

        assert_eq!(bytes.len(), hdr.header_len() + payload.len());

        let eth = EtherHeader::new_unchecked(&bytes[0..ETHER_HEADER_LEN]);
        assert_eq!(eth.src_addr(), hdr.eth_src);
        assert_eq!(eth.dst_addr(), hdr.eth_dst);

        let ip_start = ETHER_HEADER_LEN;
        let ip = Ipv4Header::new_unchecked(&bytes[ip_start..ip_start + IPV4_HEADER_LEN]);
        assert_eq!(ip.src_addr(), 0x0a000001);
        assert_eq!(ip.dst_addr(), 0x0a000002);
        assert!(ip.verify_checksum());

        let udp_start = ip_start + IPV4_HEADER_LEN;
        let udp = UdpHeader::new_unchecked(&bytes[udp_start..udp_start + UDP_HEADER_LEN]);
        assert_eq!(udp.src_port(), 1234);
        assert_eq!(udp.dst_port(), 80);
        assert!(udp.verify_checksum_v4(0x0a000001, 0x0a000002, &payload));

        assert_eq!(&bytes[udp_start + UDP_HEADER_LEN..], &payload[..]);
    }
}
