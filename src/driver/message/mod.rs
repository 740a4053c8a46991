//! In-memory representation of a classic TWAI/CAN frame, as handed to and
//! returned by the peripheral driver.
use bitflags::bitflags;
use embedded_can::{Frame, Id, StandardId};

use crate::core::{MAX_DATA_LEN, MAX_DLC};

bitflags! {
    /// Per-frame transmission flags understood by the TWAI driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MessageFlags: u32 {
        /// Remote transmission request (no payload).
        const REMOTE = 1 << 1;
        /// Transmit once, without automatic retransmission.
        const SINGLE_SHOT = 1 << 2;
        /// Frame is also delivered to the local receive queue.
        const SELF_RECEPTION = 1 << 3;
        /// DLC above 8 is kept as-is on the wire.
        const DLC_NON_COMPLIANT = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Classic CAN frame: identifier, data length code, payload and flags.
pub struct TwaiMessage {
    /// Standard (11-bit) or extended (29-bit) identifier.
    pub id: Id,
    /// Transmission flags.
    pub flags: MessageFlags,
    /// Data length code. Constructors keep it within 0..=8; drivers may report
    /// a raw out-of-range code which the backend rejects.
    pub dlc: u8,
    /// Payload buffer; only the first `dlc` bytes are meaningful.
    pub data: [u8; MAX_DATA_LEN],
}

impl TwaiMessage {
    /// Build a data frame. Returns `None` when `data` is longer than 8 bytes.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        let mut buffer = [0u8; MAX_DATA_LEN];
        buffer[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            flags: MessageFlags::empty(),
            dlc: data.len() as u8,
            data: buffer,
        })
    }

    /// Build a remote frame requesting `dlc` bytes.
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }
        Some(Self {
            id: id.into(),
            flags: MessageFlags::REMOTE,
            dlc: dlc as u8,
            data: [0; MAX_DATA_LEN],
        })
    }

    /// Add transmission flags.
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// `true` when the data length code fits a classic frame.
    #[inline]
    pub fn has_valid_dlc(&self) -> bool {
        self.dlc <= MAX_DLC
    }

    /// Meaningful payload bytes, clamped to the buffer size.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        let len = (self.dlc as usize).min(MAX_DATA_LEN);
        &self.data[..len]
    }

    /// Identifier as a raw integer, regardless of its width.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }
}

impl Default for TwaiMessage {
    fn default() -> Self {
        Self {
            id: Id::Standard(StandardId::ZERO),
            flags: MessageFlags::empty(),
            dlc: 0,
            data: [0; MAX_DATA_LEN],
        }
    }
}

impl Frame for TwaiMessage {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        TwaiMessage::new(id, data)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        TwaiMessage::new_remote(id, dlc)
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.flags.contains(MessageFlags::REMOTE)
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.is_remote_frame() {
            &[]
        } else {
            self.payload()
        }
    }
}
