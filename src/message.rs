use core::fmt;

/// Which side of a link this engine instance is. Peers are functionally
/// identical; the role only decides the peer bit forced into locally
/// allocated frame IDs, so that concurrent allocation on both ends of a
/// link cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    Master,
    Slave,
}

/// An opaque, caller-assigned handle stored alongside a listener and
/// returned verbatim to its callback. The engine never interprets it —
/// per the design note, it is typically an index into a registry the host
/// owns (a slab, an array, whatever the application already has).
pub type UserData = usize;

/// A fixed-capacity payload buffer: `N` bytes of storage plus a length, no
/// heap allocation. `N` is `MAX_PAYLOAD_RX` for received messages and
/// `MAX_PAYLOAD_TX` for sent ones.
#[derive(Clone, Copy)]
pub struct Payload<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> Payload<N> {
    /// An empty payload.
    pub const fn empty() -> Self {
        Payload {
            data: [0; N],
            len: 0,
        }
    }

    /// Builds a payload from a byte slice. Returns `None` if `bytes` does
    /// not fit in `N` bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > N {
            return None;
        }
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Payload {
            data,
            len: bytes.len(),
        })
    }

    /// The payload bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn capacity() -> usize {
        N
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.data[self.len] = byte;
        self.len += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for Payload<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> fmt::Debug for Payload<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<const N: usize> PartialEq for Payload<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> Eq for Payload<N> {}

/// A TinyFrame message: either one handed to [`send`](crate::TinyFrame::send)
/// by the caller, or one handed to a listener callback on receipt.
///
/// `Id` and `Type` are the same `WireField` types the owning
/// [`TinyFrame`](crate::TinyFrame) instance is parameterized with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Message<Id, Type, const N: usize> {
    /// The frame ID. Ignored on send unless `is_response` is set.
    pub frame_id: Id,
    /// The message type, used for type-listener dispatch.
    pub msg_type: Type,
    /// The message payload.
    pub payload: Payload<N>,
    /// If true, the send path reuses `frame_id` instead of allocating a new one.
    pub is_response: bool,
    /// Opaque handle, copied in from the triggering listener registration
    /// (or `0` for a message built directly from the wire).
    pub user_data: UserData,
    /// True only for the synthetic message delivered when an ID listener's
    /// timeout expires. `payload` is always empty when this is set.
    pub is_timeout: bool,
}

impl<Id: Default, Type, const N: usize> Message<Id, Type, N> {
    /// Builds a new outbound message with a default (to-be-assigned) ID.
    pub fn new(msg_type: Type, payload: &[u8]) -> Option<Self> {
        Some(Message {
            frame_id: Id::default(),
            msg_type,
            payload: Payload::from_slice(payload)?,
            is_response: false,
            user_data: 0,
            is_timeout: false,
        })
    }
}

impl<Id: Copy, Type: Copy, const N: usize> Message<Id, Type, N> {
    /// Builds a response to this message: same `frame_id`/`msg_type`, fresh
    /// payload, `is_response` set.
    pub fn create_response<const M: usize>(&self, payload: &[u8]) -> Option<Message<Id, Type, M>> {
        Some(Message {
            frame_id: self.frame_id,
            msg_type: self.msg_type,
            payload: Payload::from_slice(payload)?,
            is_response: true,
            user_data: self.user_data,
            is_timeout: false,
        })
    }
}
