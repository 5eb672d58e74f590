use log::{trace, warn};

use crate::checksum::{ChecksumAccumulator, ChecksumKind};
use crate::listener::Ticks;
use crate::message::Payload;
use crate::wire::WireField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitSof,
    ReadId,
    ReadLen,
    ReadType,
    ReadHeadCksum,
    ReadPayload,
    ReadPayloadCksum,
}

/// A frame the byte-at-a-time parser has fully reassembled and validated.
pub struct ParsedFrame<Id, Type, const MAX_PAYLOAD_RX: usize> {
    pub frame_id: Id,
    pub msg_type: Type,
    pub payload: Payload<MAX_PAYLOAD_RX>,
}

/// The receive-side state machine: reassembles frames from an arbitrary
/// byte stream one byte at a time, with a watchdog that discards a
/// stalled partial frame after `PARSER_TIMEOUT_TICKS` idle ticks.
///
/// At most one parse is ever in flight: this struct *is* that one
/// parse-in-progress, plus its own configuration.
pub struct Parser<Id, Len, Type, const MAX_PAYLOAD_RX: usize> {
    sof: Option<u8>,
    cksum_kind: ChecksumKind,
    timeout_ticks: Ticks,

    state: State,
    idle: bool,
    idle_ticks: Ticks,
    field_progress: usize,

    id: Id,
    len: Len,
    msg_type: Type,
    header_acc: ChecksumAccumulator,
    payload_acc: ChecksumAccumulator,
    recv_cksum: u32,
    payload: Payload<MAX_PAYLOAD_RX>,
}

impl<Id, Len, Type, const MAX_PAYLOAD_RX: usize> Parser<Id, Len, Type, MAX_PAYLOAD_RX>
where
    Id: WireField,
    Len: WireField,
    Type: WireField,
{
    pub fn new(sof: Option<u8>, cksum_kind: ChecksumKind, timeout_ticks: Ticks) -> Self {
        Parser {
            sof,
            cksum_kind,
            timeout_ticks,
            state: State::AwaitSof,
            idle: true,
            idle_ticks: 0,
            field_progress: 0,
            id: Id::default(),
            len: Len::default(),
            msg_type: Type::default(),
            header_acc: ChecksumAccumulator::new(cksum_kind),
            payload_acc: ChecksumAccumulator::new(cksum_kind),
            recv_cksum: 0,
            payload: Payload::empty(),
        }
    }

    /// Returns the parser to its initial state, discarding any in-progress
    /// message and checksums. Does not affect registered listeners.
    pub fn reset(&mut self) {
        self.state = State::AwaitSof;
        self.idle = true;
        self.idle_ticks = 0;
        self.field_progress = 0;
        self.id = Id::default();
        self.len = Len::default();
        self.msg_type = Type::default();
        self.header_acc = ChecksumAccumulator::new(self.cksum_kind);
        self.payload_acc = ChecksumAccumulator::new(self.cksum_kind);
        self.recv_cksum = 0;
        self.payload.clear();
    }

    fn begin_frame(&mut self) {
        self.idle = false;
        self.state = State::ReadId;
        self.field_progress = 0;
        self.id = Id::default();
        self.len = Len::default();
        self.msg_type = Type::default();
        self.header_acc = ChecksumAccumulator::new(self.cksum_kind);
        self.payload_acc = ChecksumAccumulator::new(self.cksum_kind);
        self.recv_cksum = 0;
        self.payload.clear();
    }

    /// Ages the parser watchdog by one tick. Returns `true` if the parser
    /// was reset as a result (a stalled partial frame was discarded).
    pub fn tick(&mut self) -> bool {
        if self.idle || self.timeout_ticks == 0 {
            return false;
        }
        self.idle_ticks += 1;
        if self.idle_ticks >= self.timeout_ticks {
            warn!("tinyframe: parser watchdog fired, resetting mid-frame parse");
            self.reset();
            true
        } else {
            false
        }
    }

    /// Feeds one byte to the parser. Returns `Some(frame)` when this byte
    /// completed a fully-validated frame.
    pub fn accept_byte(&mut self, byte: u8) -> Option<ParsedFrame<Id, Type, MAX_PAYLOAD_RX>> {
        self.idle_ticks = 0;

        if self.idle {
            match self.sof {
                Some(sof_value) => {
                    if byte == sof_value {
                        self.begin_frame();
                        self.header_acc.update(byte);
                    }
                    return None;
                }
                None => self.begin_frame(),
            }
        }

        match self.state {
            State::AwaitSof => None,
            State::ReadId => {
                self.header_acc.update(byte);
                self.id = self.id.push_be_byte(byte);
                self.field_progress += 1;
                if self.field_progress == Id::WIDTH {
                    self.field_progress = 0;
                    self.state = State::ReadLen;
                }
                None
            }
            State::ReadLen => {
                self.header_acc.update(byte);
                self.len = self.len.push_be_byte(byte);
                self.field_progress += 1;
                if self.field_progress == Len::WIDTH {
                    self.field_progress = 0;
                    if self.len.to_usize() > MAX_PAYLOAD_RX {
                        warn!(
                            "tinyframe: inbound length {} exceeds MAX_PAYLOAD_RX {}, resetting",
                            self.len.to_usize(),
                            MAX_PAYLOAD_RX
                        );
                        self.reset();
                        return None;
                    }
                    self.state = State::ReadType;
                }
                None
            }
            State::ReadType => {
                self.header_acc.update(byte);
                self.msg_type = self.msg_type.push_be_byte(byte);
                self.field_progress += 1;
                if self.field_progress == Type::WIDTH {
                    self.field_progress = 0;
                    if self.cksum_kind == ChecksumKind::None {
                        self.enter_payload_or_complete()
                    } else {
                        self.recv_cksum = 0;
                        self.state = State::ReadHeadCksum;
                        None
                    }
                } else {
                    None
                }
            }
            State::ReadHeadCksum => {
                self.recv_cksum = (self.recv_cksum << 8) | byte as u32;
                self.field_progress += 1;
                if self.field_progress == self.cksum_kind.width() {
                    self.field_progress = 0;
                    let expected = self.header_acc.finish();
                    if self.recv_cksum != expected {
                        warn!("tinyframe: header checksum mismatch, resetting");
                        self.reset();
                        return None;
                    }
                    return self.enter_payload_or_complete();
                }
                None
            }
            State::ReadPayload => {
                self.payload_acc.update(byte);
                self.payload.push(byte);
                self.field_progress += 1;
                if self.field_progress == self.len.to_usize() {
                    self.field_progress = 0;
                    if self.cksum_kind == ChecksumKind::None {
                        return self.finish_frame();
                    }
                    self.recv_cksum = 0;
                    self.state = State::ReadPayloadCksum;
                }
                None
            }
            State::ReadPayloadCksum => {
                self.recv_cksum = (self.recv_cksum << 8) | byte as u32;
                self.field_progress += 1;
                if self.field_progress == self.cksum_kind.width() {
                    let expected = self.payload_acc.finish();
                    if self.recv_cksum != expected {
                        warn!("tinyframe: payload checksum mismatch, resetting");
                        self.reset();
                        return None;
                    }
                    return self.finish_frame();
                }
                None
            }
        }
    }

    fn enter_payload_or_complete(&mut self) -> Option<ParsedFrame<Id, Type, MAX_PAYLOAD_RX>> {
        if self.len.to_usize() == 0 {
            if self.cksum_kind == ChecksumKind::None {
                return self.finish_frame();
            }
            self.recv_cksum = 0;
            self.state = State::ReadPayloadCksum;
            None
        } else {
            self.state = State::ReadPayload;
            None
        }
    }

    fn finish_frame(&mut self) -> Option<ParsedFrame<Id, Type, MAX_PAYLOAD_RX>> {
        trace!("tinyframe: frame reassembled, dispatching");
        let frame = ParsedFrame {
            frame_id: self.id,
            msg_type: self.msg_type,
            payload: self.payload,
        };
        self.reset();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;

    fn frame_bytes(sof: u8, id: u8, len: u16, msg_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut head = vec![sof, id];
        head.extend_from_slice(&len.to_be_bytes());
        head.push(msg_type);
        let head_cksum = checksum(ChecksumKind::Crc16, &head);
        let mut out = head;
        out.extend_from_slice(&(head_cksum as u16).to_be_bytes());
        out.extend_from_slice(payload);
        let payload_cksum = checksum(ChecksumKind::Crc16, payload);
        out.extend_from_slice(&(payload_cksum as u16).to_be_bytes());
        out
    }

    #[test]
    fn parses_a_complete_frame_byte_by_byte() {
        let bytes = frame_bytes(0x01, 0x80, 3, 0x33, &[0xAA, 0xBB, 0xCC]);
        let mut p: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        let mut result = None;
        for b in bytes {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        let frame = result.expect("frame should have completed");
        assert_eq!(frame.frame_id, 0x80);
        assert_eq!(frame.msg_type, 0x33);
        assert_eq!(frame.payload.as_slice(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn empty_payload_still_carries_a_payload_checksum() {
        let bytes = frame_bytes(0x01, 0x80, 0, 0x22, &[]);
        // SOF ID LEN(2) TYPE HEADCKSUM(2) [no payload] PAYLOADCKSUM(2)
        assert_eq!(bytes.len(), 1 + 1 + 2 + 1 + 2 + 0 + 2);
        let mut p: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        let mut result = None;
        for b in bytes {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        let frame = result.expect("frame should have completed");
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn corrupted_payload_byte_is_silently_dropped() {
        let mut bytes = frame_bytes(0x01, 0x80, 3, 0x33, &[0xAA, 0xBB, 0xCC]);
        let corrupt_index = 7; // inside the payload
        bytes[corrupt_index] ^= 0x01;
        let mut p: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        let mut result = None;
        for b in bytes {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        assert!(result.is_none());
    }

    #[test]
    fn resets_after_corruption_and_parses_the_next_frame() {
        let mut bad = frame_bytes(0x01, 0x80, 3, 0x33, &[0xAA, 0xBB, 0xCC]);
        bad[7] ^= 0x01;
        let good = frame_bytes(0x01, 0x81, 2, 0x44, &[0x01, 0x02]);

        let mut p: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        for b in bad {
            p.accept_byte(b);
        }
        let mut result = None;
        for b in good {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        let frame = result.expect("should parse cleanly after a corrupt frame");
        assert_eq!(frame.frame_id, 0x81);
        assert_eq!(frame.payload.as_slice(), &[0x01, 0x02]);
    }

    #[test]
    fn oversized_length_field_resets_parser() {
        let bytes = frame_bytes(0x01, 0x80, 1000, 0x33, &[]);
        let mut p: Parser<u8, u16, u8, 16> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        for b in &bytes[..4] {
            assert!(p.accept_byte(*b).is_none());
        }
        // The parser should have reset rather than waiting for 1000 payload bytes.
        let good = frame_bytes(0x01, 0x81, 2, 0x44, &[0x01, 0x02]);
        let mut result = None;
        for b in good {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        assert!(result.is_some());
    }

    #[test]
    fn watchdog_resets_a_stalled_parse() {
        let mut p: Parser<u8, u16, u8, 16> = Parser::new(Some(0x01), ChecksumKind::Crc16, 5);
        p.accept_byte(0x01);
        p.accept_byte(0x80);
        for _ in 0..4 {
            assert!(!p.tick());
        }
        assert!(p.tick());

        let good = frame_bytes(0x01, 0x81, 2, 0x44, &[0x01, 0x02]);
        let mut result = None;
        for b in good {
            if let Some(frame) = p.accept_byte(b) {
                result = Some(frame);
            }
        }
        assert!(result.is_some());
    }

    #[test]
    fn split_delivery_matches_whole_frame_delivery() {
        let bytes = frame_bytes(0x01, 0x81, 3, 0x33, &[0xAA, 0xBB, 0xCC]);

        let mut whole: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        let mut whole_result = None;
        for b in &bytes {
            if let Some(f) = whole.accept_byte(*b) {
                whole_result = Some(f);
            }
        }

        let mut split: Parser<u8, u16, u8, 64> = Parser::new(Some(0x01), ChecksumKind::Crc16, 0);
        let mut split_result = None;
        for chunk in bytes.chunks(1) {
            for b in chunk {
                if let Some(f) = split.accept_byte(*b) {
                    split_result = Some(f);
                }
            }
        }

        let w = whole_result.unwrap();
        let s = split_result.unwrap();
        assert_eq!(w.frame_id, s.frame_id);
        assert_eq!(w.msg_type, s.msg_type);
        assert_eq!(w.payload.as_slice(), s.payload.as_slice());
    }
}
