//! # Circular Packet Histories
//!
//! Both directions keep the last 16 raw IFP payloads in a fixed arena
//! indexed by `sequence & 15`. The transmit side reads prior slots to
//! build redundancy sets and FEC parity; the receive side stores
//! arrived/reconstructed payloads plus per-slot parity metadata so later
//! datagrams can repair earlier losses.
//!
//! All slot access goes through these accessors — slot arithmetic never
//! leaks into the codec.

/// Number of history slots per direction.
pub const HISTORY_SLOTS: usize = 16;

/// Mask mapping a sequence number onto its slot.
pub const SLOT_MASK: u64 = HISTORY_SLOTS as u64 - 1;

/// Hard ceiling on any payload or parity stored in a slot.
pub const LOCAL_MAX_DATAGRAM: usize = 1400;

/// Maximum FEC parity payloads one datagram may carry.
pub const MAX_FEC_ENTRIES: usize = 5;

/// Maximum FEC span (stride between group members).
pub const MAX_FEC_SPAN: usize = 5;

#[inline]
pub(crate) fn slot_of(seq: u64) -> usize {
    (seq & SLOT_MASK) as usize
}

// ─── Transmit History ───────────────────────────────────────────────────────

/// The last 16 transmitted IFP payloads, overwritten in rotation.
#[derive(Debug, Default)]
pub struct TxHistory {
    slots: [Option<Vec<u8>>; HISTORY_SLOTS],
}

impl TxHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `seq` with a fresh payload.
    pub fn store(&mut self, seq: u64, payload: &[u8]) {
        self.slots[slot_of(seq)] = Some(payload.to_vec());
    }

    /// Payload most recently stored for `seq`'s slot; empty if unset.
    pub fn payload(&self, seq: u64) -> &[u8] {
        self.slots[slot_of(seq)].as_deref().unwrap_or(&[])
    }

    /// Payload by raw slot index; empty if unset.
    pub fn payload_at(&self, slot: usize) -> &[u8] {
        self.slots[slot & SLOT_MASK as usize].as_deref().unwrap_or(&[])
    }
}

// ─── Receive History ────────────────────────────────────────────────────────

/// One receive-side slot: the payload seen or reconstructed at this
/// position, plus the parity set the covering datagram carried.
#[derive(Debug, Default)]
pub struct RxSlot {
    payload: Option<Vec<u8>>,
    parity: Vec<Vec<u8>>,
    fec_span: u8,
    fec_entries: u8,
}

impl RxSlot {
    /// Whether a usable payload occupies this slot. A stored-but-empty
    /// payload counts as missing, matching the wire rule that no real
    /// unit decodes to zero octets.
    pub fn present(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// Whether this slot carries parity data usable for reconstruction.
    pub fn has_parity(&self) -> bool {
        self.parity.first().is_some_and(|p| !p.is_empty())
    }

    pub fn parity(&self, m: usize) -> &[u8] {
        self.parity.get(m).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fec_span(&self) -> usize {
        self.fec_span as usize
    }

    pub fn fec_entries(&self) -> usize {
        self.fec_entries as usize
    }
}

/// The receive arena: 16 slots of payload + parity metadata.
#[derive(Debug, Default)]
pub struct RxHistory {
    slots: [RxSlot; HISTORY_SLOTS],
}

impl RxHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, slot: usize) -> &RxSlot {
        &self.slots[slot & SLOT_MASK as usize]
    }

    /// Mark a slot as a known gap, clearing stale parity metadata so an
    /// old datagram's groups can no longer "repair" into it.
    pub fn mark_missing(&mut self, slot: usize) {
        self.slots[slot & SLOT_MASK as usize] = RxSlot::default();
    }

    /// Store a received or reconstructed payload.
    pub fn set_payload(&mut self, slot: usize, payload: Vec<u8>) {
        debug_assert!(payload.len() <= LOCAL_MAX_DATAGRAM);
        self.slots[slot & SLOT_MASK as usize].payload = Some(payload);
    }

    /// Attach the parity set a datagram carried for this slot.
    pub fn set_parity(&mut self, slot: usize, span: u8, entries: u8, parity: Vec<Vec<u8>>) {
        debug_assert!(parity.len() <= MAX_FEC_ENTRIES);
        let s = &mut self.slots[slot & SLOT_MASK as usize];
        s.fec_span = span;
        s.fec_entries = entries;
        s.parity = parity;
    }
}
