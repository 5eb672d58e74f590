use log::{debug, trace};

use crate::checksum::ChecksumKind;
use crate::error::SendError;
use crate::listener::{
    GenericListenerTable, IdListenerTable, ListenerError, Ticks, TypeListenerTable,
};
use crate::message::{Message, Payload, Peer, UserData};
use crate::parser::Parser;
use crate::wire::WireField;

/// What a listener callback returns after handling a message. For type and
/// generic listeners this decides whether the listener stays registered;
/// an ID listener matching a (non-timeout) frame is freed after that one
/// call no matter which variant is returned, so for it this only decides
/// whether dispatch stops or falls through to the next tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerResult {
    /// Keep the listener registered, and let lower-priority listeners also
    /// see this message.
    Next,
    /// Keep the listener registered, and stop dispatching this message to
    /// any other listener.
    Stay,
    /// Equivalent to `Stay`: kept for symmetry with `remove_id_listener`'s
    /// counterpart, `renew_id_listener`, which a callback can call directly
    /// on some other still-registered listener.
    Renew,
    /// Remove the listener after this call, and stop dispatching.
    Close,
}

impl ListenerResult {
    fn consumes(self) -> bool {
        !matches!(self, ListenerResult::Next)
    }
}

/// An ID listener callback: examines the fully-reassembled message and
/// decides the listener's fate. `tf` is the owning engine, so a callback
/// can itself call [`TinyFrame::send`]/[`respond`](TinyFrame::respond) or
/// register further listeners.
pub type IdListenerFn<Id, Len, Type, const RX: usize, const TX: usize, const IDN: usize, const TN: usize, const GN: usize> =
    fn(&mut TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>, &Message<Id, Type, RX>) -> ListenerResult;

/// A type or generic listener callback. Same shape as [`IdListenerFn`]; kept
/// as a distinct alias so the three listener kinds read independently at
/// call sites even though they're presently identical.
pub type TypeListenerFn<Id, Len, Type, const RX: usize, const TX: usize, const IDN: usize, const TN: usize, const GN: usize> =
    fn(&mut TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>, &Message<Id, Type, RX>) -> ListenerResult;

pub type GenericListenerFn<Id, Len, Type, const RX: usize, const TX: usize, const IDN: usize, const TN: usize, const GN: usize> =
    fn(&mut TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>, &Message<Id, Type, RX>) -> ListenerResult;

/// A byte sink: how the engine hands outbound bytes to the transport (a
/// UART driver, a socket, a test harness). Called synchronously and
/// possibly more than once per frame; never boxed, since the engine has no
/// allocator to box it with.
pub type WriteFn<Id, Len, Type, const RX: usize, const TX: usize, const IDN: usize, const TN: usize, const GN: usize> =
    fn(&mut TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>, &[u8]);

/// A compact, embedded-oriented framing engine for point-to-point binary
/// message transport over an arbitrary byte stream.
///
/// `Id`/`Len`/`Type` pick the wire width of the three header fields by
/// choice of Rust integer type (see [`WireField`]); `RX`/`TX` are the
/// fixed payload capacities for receive/transmit; `IDN`/`TN`/`GN` are the
/// fixed listener-table capacities. Every buffer is a stack array: no
/// dynamic allocation anywhere in this struct.
pub struct TinyFrame<
    Id: WireField,
    Len: WireField,
    Type: WireField,
    const RX: usize,
    const TX: usize,
    const IDN: usize,
    const TN: usize,
    const GN: usize,
> {
    peer: Peer,
    cksum_kind: ChecksumKind,
    sof: Option<u8>,
    next_id: Id,
    parser: Parser<Id, Len, Type, RX>,
    id_listeners: IdListenerTable<Id, IdListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>, IDN>,
    type_listeners: TypeListenerTable<Type, TypeListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>, TN>,
    generic_listeners: GenericListenerTable<GenericListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>, GN>,
    write_fn: WriteFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
}

fn discard_write<Id, Len, Type, const RX: usize, const TX: usize, const IDN: usize, const TN: usize, const GN: usize>(
    _tf: &mut TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>,
    _bytes: &[u8],
) where
    Id: WireField,
    Len: WireField,
    Type: WireField,
{
}

impl<
        Id: WireField,
        Len: WireField,
        Type: WireField,
        const RX: usize,
        const TX: usize,
        const IDN: usize,
        const TN: usize,
        const GN: usize,
    > TinyFrame<Id, Len, Type, RX, TX, IDN, TN, GN>
{
    /// Builds a new engine. `sof` is the optional start-of-frame marker
    /// (spec §3's `USE_SOF`); `parser_timeout` is `PARSER_TIMEOUT_TICKS`,
    /// with `0` disabling the watchdog. The byte sink defaults to a no-op
    /// and must be set with [`set_write_fn`](Self::set_write_fn) before
    /// any call to [`send`](Self::send) will have an observable effect.
    ///
    /// Panics if any listener table capacity (`IDN`, `TN`, `GN`) is zero,
    /// since a zero-capacity table can never register anything and is
    /// almost certainly a misconfiguration rather than an intentional
    /// choice.
    pub fn new(peer: Peer, cksum_kind: ChecksumKind, sof: Option<u8>, parser_timeout: Ticks) -> Self {
        assert!(IDN > 0, "MAX_ID_LISTENERS must be nonzero");
        assert!(TN > 0, "MAX_TYPE_LISTENERS must be nonzero");
        assert!(GN > 0, "MAX_GENERIC_LISTENERS must be nonzero");
        TinyFrame {
            peer,
            cksum_kind,
            sof,
            next_id: Id::default(),
            parser: Parser::new(sof, cksum_kind, parser_timeout),
            id_listeners: IdListenerTable::new(),
            type_listeners: TypeListenerTable::new(),
            generic_listeners: GenericListenerTable::new(),
            write_fn: discard_write,
        }
    }

    /// Installs the function called with outbound bytes.
    pub fn set_write_fn(&mut self, write_fn: WriteFn<Id, Len, Type, RX, TX, IDN, TN, GN>) {
        self.write_fn = write_fn;
    }

    /// Discards any in-progress partial frame. Does not touch registered
    /// listeners.
    pub fn reset_parser(&mut self) {
        self.parser.reset();
    }

    /// Sends a message, optionally registering an ID listener for its
    /// reply. `message.frame_id` is ignored unless `message.is_response`
    /// is set, in which case it is sent verbatim instead of allocating a
    /// fresh ID.
    ///
    /// If `listener` is `Some((callback, user_data, timeout))`, an ID
    /// listener for the allocated (or reused) frame ID is registered
    /// before any bytes are written, so a reply arriving synchronously
    /// inside the write callback (a loopback test, for instance) is never
    /// missed.
    pub fn send(
        &mut self,
        mut message: Message<Id, Type, TX>,
        listener: Option<(
            IdListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
            UserData,
            Ticks,
        )>,
    ) -> Result<Id, SendError> {
        if message.payload.len() > TX {
            return Err(SendError::PayloadTooLarge {
                len: message.payload.len(),
                max: TX,
            });
        }

        let frame_id = if message.is_response {
            message.frame_id
        } else {
            let id = self.next_id.with_peer_bit(self.peer);
            self.next_id = self.next_id.wrapping_increment_masked();
            id
        };
        message.frame_id = frame_id;

        if let Some((callback, user_data, timeout)) = listener {
            self.id_listeners
                .add(frame_id, callback, user_data, timeout)
                .map_err(|_| SendError::ListenerTableFull)?;
        }

        self.write_frame(frame_id, message.msg_type, message.payload.as_slice());
        trace!("tinyframe: sent frame id={:?} type={:?}", frame_id, message.msg_type);
        Ok(frame_id)
    }

    /// Convenience wrapper: builds and sends a response to `request`,
    /// reusing its `frame_id`. If `renew` is set, also renews this engine's
    /// own ID listener matching `request.frame_id`, if any, resetting its
    /// timeout to its original value.
    pub fn respond(
        &mut self,
        request: &Message<Id, Type, RX>,
        payload: &[u8],
        renew: bool,
    ) -> Result<Id, SendError> {
        let response = request
            .create_response::<TX>(payload)
            .ok_or(SendError::PayloadTooLarge {
                len: payload.len(),
                max: TX,
            })?;
        if renew {
            let _ = self.id_listeners.renew(request.frame_id);
        }
        self.send(response, None)
    }

    fn write_frame(&mut self, id: Id, msg_type: Type, payload: &[u8]) {
        use crate::checksum::ChecksumAccumulator;

        let mut header_acc = ChecksumAccumulator::new(self.cksum_kind);

        if let Some(sof) = self.sof {
            header_acc.update(sof);
            (self.write_fn)(self, &[sof]);
        }

        let len = Len::from_usize(payload.len()).expect("payload length already validated against TX");

        let mut id_buf = [0u8; 4];
        id.write_be(&mut id_buf[..Id::WIDTH]);
        let mut len_buf = [0u8; 4];
        len.write_be(&mut len_buf[..Len::WIDTH]);
        let mut type_buf = [0u8; 4];
        msg_type.write_be(&mut type_buf[..Type::WIDTH]);

        for &b in &id_buf[..Id::WIDTH] {
            header_acc.update(b);
        }
        for &b in &len_buf[..Len::WIDTH] {
            header_acc.update(b);
        }
        for &b in &type_buf[..Type::WIDTH] {
            header_acc.update(b);
        }

        (self.write_fn)(self, &id_buf[..Id::WIDTH]);
        (self.write_fn)(self, &len_buf[..Len::WIDTH]);
        (self.write_fn)(self, &type_buf[..Type::WIDTH]);

        if self.cksum_kind != ChecksumKind::None {
            let head_cksum = header_acc.finish();
            let bytes = head_cksum.to_be_bytes();
            (self.write_fn)(self, &bytes[4 - self.cksum_kind.width()..]);
        }

        (self.write_fn)(self, payload);

        if self.cksum_kind != ChecksumKind::None {
            let payload_cksum = crate::checksum::checksum(self.cksum_kind, payload);
            let bytes = payload_cksum.to_be_bytes();
            (self.write_fn)(self, &bytes[4 - self.cksum_kind.width()..]);
        }
    }

    /// Feeds a chunk of inbound bytes to the parser, dispatching each
    /// frame as it completes.
    pub fn accept(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if let Some(frame) = self.parser.accept_byte(b) {
                let message = Message {
                    frame_id: frame.frame_id,
                    msg_type: frame.msg_type,
                    payload: frame.payload,
                    is_response: false,
                    user_data: 0,
                    is_timeout: false,
                };
                self.dispatch(message);
            }
        }
    }

    /// Ages listener timeouts and the parser watchdog by one tick. The
    /// host decides the real-time meaning of one tick by how often it
    /// calls this.
    pub fn tick(&mut self) {
        self.parser.tick();

        let expired = self.id_listeners.age_and_collect_expired();
        for (i, is_expired) in expired.iter().enumerate() {
            if !is_expired {
                continue;
            }
            let slot = match self.id_listeners.get(i) {
                Some(s) => s,
                None => continue,
            };
            let message: Message<Id, Type, RX> = Message {
                frame_id: slot.id,
                msg_type: Type::default(),
                payload: Payload::empty(),
                is_response: false,
                user_data: slot.user_data,
                is_timeout: true,
            };
            debug!("tinyframe: id listener {:?} timed out", slot.id);
            let _ = (slot.callback)(self, &message);
            self.id_listeners.free(i);
        }
    }

    /// Dispatches a fully-reassembled message with strict priority: an ID
    /// listener matching `message.frame_id` runs first, then a type
    /// listener matching `message.msg_type`, then every generic listener
    /// in registration order. Dispatch stops at the first callback that
    /// returns anything other than [`ListenerResult::Next`]: each message
    /// is consumed by at most one listener, never broadcast to every
    /// registered callback.
    fn dispatch(&mut self, message: Message<Id, Type, RX>) {
        if let Some(index) = self.id_listeners.find(message.frame_id) {
            if let Some(slot) = self.id_listeners.get(index) {
                let mut message = message;
                message.user_data = slot.user_data;
                let result = (slot.callback)(self, &message);
                // An ID listener is matched by at most one frame ever: the
                // slot is freed here unconditionally, regardless of what
                // the callback returns. Only whether dispatch stops or
                // falls through to the type/generic tiers follows the
                // return value.
                self.id_listeners.free(index);
                if result.consumes() {
                    return;
                }
            }
        }

        if let Some(index) = self.type_listeners.find(message.msg_type) {
            if let Some(slot) = self.type_listeners.get(index) {
                let result = (slot.callback)(self, &message);
                if result.consumes() {
                    return;
                }
            }
        }

        for index in 0..self.generic_listeners.len() {
            if let Some(callback) = self.generic_listeners.get(index) {
                let result = callback(self, &message);
                if result.consumes() {
                    return;
                }
            }
        }
    }

    pub fn add_id_listener(
        &mut self,
        id: Id,
        callback: IdListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
        user_data: UserData,
        timeout: Ticks,
    ) -> Result<(), ListenerError> {
        self.id_listeners.add(id, callback, user_data, timeout)
    }

    pub fn remove_id_listener(&mut self, id: Id) -> Result<(), ListenerError> {
        self.id_listeners.remove(id)
    }

    pub fn renew_id_listener(&mut self, id: Id) -> Result<(), ListenerError> {
        self.id_listeners.renew(id)
    }

    pub fn add_type_listener(
        &mut self,
        msg_type: Type,
        callback: TypeListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
    ) -> Result<(), ListenerError> {
        self.type_listeners.add(msg_type, callback)
    }

    pub fn remove_type_listener(&mut self, msg_type: Type) -> Result<(), ListenerError> {
        self.type_listeners.remove(msg_type)
    }

    pub fn add_generic_listener(
        &mut self,
        callback: GenericListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
    ) -> Result<(), ListenerError> {
        self.generic_listeners.add(callback)
    }

    pub fn remove_generic_listener(
        &mut self,
        callback: GenericListenerFn<Id, Len, Type, RX, TX, IDN, TN, GN>,
    ) -> Result<(), ListenerError> {
        self.generic_listeners.remove(callback)
    }

    pub fn peer(&self) -> Peer {
        self.peer
    }
}
