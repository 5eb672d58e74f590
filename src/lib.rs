//! TinyFrame is a compact framing codec for sending and receiving binary
//! messages over a point-to-point byte stream (a UART, a socket, anything
//! that delivers bytes in order with no built-in message boundaries).
//!
//! TinyFrame is suitable for a wide range of applications, including
//! inter-microcontroller communication, as a protocol for FTDI-based PC
//! applications, or for messaging through UDP packets. Every buffer is a
//! fixed-size stack array sized by const generics, so an instance never
//! allocates.
//!
//! Frames can be protected by a checksum (XOR-8, CRC-16, or CRC-32) and
//! carry a unique ID field that can be used to chain a reply to its
//! request. The top bit of the ID is forced to a different value on each
//! peer, so IDs allocated independently and concurrently on both ends of a
//! link never collide. Peers are functionally equivalent and can send
//! messages to each other — the names "master" and "slave" only decide
//! which peer bit each uses.
//!
//! The engine lets you register listeners (plain function pointers) to
//! wait for (1) a specific frame ID (typically a reply), (2) a particular
//! message type, or (3) any frame at all, checked in that priority order.
//! This lets a caller implement request/response patterns (via ID
//! listeners) alongside broadcast handlers (via type or generic listeners)
//! on the same link.
//!
//! ## Frame Structure
//!
//! All header fields have a configurable size, chosen by which Rust
//! integer type you instantiate [`TinyFrame`] with.
//!
//! For example, you don't need a 4-byte (`u32`) length field if your
//! payloads are always under 256 bytes — a 1-byte field (`u8`) saves 3
//! bytes per frame. This may matter for throughput on a slow link.
//!
//! ```text
//! ,-----+-----+-----+------+------------+- - - -+-------------,
//! | SOF | ID  | LEN | TYPE | HEAD_CKSUM | DATA  | DATA_CKSUM  |
//! | 0-1 | 1-4 | 1-4 | 1-4  | 0-4        | ...   | 0-4         | <- size (bytes)
//! '-----+-----+-----+------+------------+- - - -+-------------'
//!
//! SOF ......... start of frame, usually 0x01 (optional, configurable)
//! ID  ......... the frame ID (MSb is the peer bit)
//! LEN ......... number of data bytes in the frame
//! TYPE ........ message type (used to run type listeners, pick any values you like)
//! HEAD_CKSUM .. header checksum
//!
//! DATA ........ LEN bytes of data (can be empty)
//! DATA_CKSUM .. data checksum, always present when a checksum kind is configured
//! ```
//!
//! # Examples
//!
//! ```
//! use tinyframe::{
//!     ChecksumKind, ListenerResult, Message, Peer, TinyFrame,
//! };
//!
//! type Link = TinyFrame<u8, u8, u8, 32, 32, 4, 4, 4>;
//!
//! fn on_greeting(_tf: &mut Link, msg: &Message<u8, u8, 32>) -> ListenerResult {
//!     println!("message received: {}", String::from_utf8_lossy(msg.payload.as_slice()));
//!     ListenerResult::Stay
//! }
//!
//! fn echo_to_self(tf: &mut Link, bytes: &[u8]) {
//!     // loop the bytes straight back in, as if they arrived over the wire
//!     tf.accept(bytes);
//! }
//!
//! let mut tf: Link = TinyFrame::new(Peer::Master, ChecksumKind::Crc16, Some(0x01), 0);
//! tf.set_write_fn(echo_to_self);
//! tf.add_generic_listener(on_greeting).unwrap();
//!
//! let msg = Message::new(0, b"Hello TinyFrame").unwrap();
//! tf.send(msg, None).unwrap();
//! ```

mod checksum;
mod engine;
mod error;
mod listener;
mod message;
mod parser;
mod wire;

pub use checksum::{checksum, ChecksumAccumulator, ChecksumKind};
pub use engine::{
    GenericListenerFn, IdListenerFn, ListenerResult, TinyFrame, TypeListenerFn, WriteFn,
};
pub use error::{ListenerError, SendError};
pub use listener::Ticks;
pub use message::{Message, Payload, Peer, UserData};
pub use wire::WireField;
