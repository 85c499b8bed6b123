//! Request kinds and message assembly.
//!
//! The wire format is positional: the leading unit's tag decides how many
//! units make up the message. [`MessageAssembler`] buffers units until the
//! schema for the leading tag is satisfied.

use bytes::BytesMut;

use crate::core::tlv::{tag_name, Tag, Tlv};
use crate::error::{ProtocolError, Result};

/// Signature unit + hash unit.
pub const TRAILER_LEN: usize = 2;

/// Requests the dispatcher knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Hello,
    CreateGame,
    ListLobbies,
    JoinLobby,
    Board,
    Move,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        RequestKind::Hello,
        RequestKind::CreateGame,
        RequestKind::ListLobbies,
        RequestKind::JoinLobby,
        RequestKind::Board,
        RequestKind::Move,
    ];

    /// Request kind for a leading tag byte.
    pub fn from_tag(byte: u8) -> Option<Self> {
        match Tag::from_byte(byte)? {
            Tag::HelloRequest => Some(RequestKind::Hello),
            Tag::GameRequest => Some(RequestKind::CreateGame),
            Tag::LobbyRequest => Some(RequestKind::ListLobbies),
            Tag::JoinLobbyRequest => Some(RequestKind::JoinLobby),
            Tag::BoardRequest => Some(RequestKind::Board),
            Tag::ActionRequest => Some(RequestKind::Move),
            _ => None,
        }
    }

    /// Leading tag of this request.
    pub fn tag(self) -> Tag {
        match self {
            RequestKind::Hello => Tag::HelloRequest,
            RequestKind::CreateGame => Tag::GameRequest,
            RequestKind::ListLobbies => Tag::LobbyRequest,
            RequestKind::JoinLobby => Tag::JoinLobbyRequest,
            RequestKind::Board => Tag::BoardRequest,
            RequestKind::Move => Tag::ActionRequest,
        }
    }

    /// Number of payload units, leading marker included.
    pub fn payload_len(self) -> usize {
        match self {
            RequestKind::Hello => 5,
            RequestKind::CreateGame => 2,
            RequestKind::ListLobbies => 1,
            RequestKind::JoinLobby => 3,
            RequestKind::Board => 2,
            RequestKind::Move => 3,
        }
    }

    /// Total units including the integrity trailer.
    pub fn unit_count(self) -> usize {
        self.payload_len() + TRAILER_LEN
    }
}

/// One complete request: payload units followed by signature and hash.
#[derive(Debug, Clone)]
pub struct Message {
    kind: RequestKind,
    units: Vec<Tlv>,
}

impl Message {
    /// Wrap a full set of units, checking count and leading tag.
    pub fn new(kind: RequestKind, units: Vec<Tlv>) -> Result<Self> {
        if units.len() != kind.unit_count() {
            return Err(ProtocolError::FormatError(format!(
                "{kind:?} expects {} units, got {}",
                kind.unit_count(),
                units.len()
            )));
        }
        let message = Self { kind, units };
        message.expect(0, kind.tag())?;
        Ok(message)
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn units(&self) -> &[Tlv] {
        &self.units
    }

    /// Units before the trailer.
    pub fn payload(&self) -> &[Tlv] {
        &self.units[..self.kind.payload_len()]
    }

    pub fn signature_unit(&self) -> &Tlv {
        &self.units[self.kind.payload_len()]
    }

    pub fn hash_unit(&self) -> &Tlv {
        &self.units[self.kind.payload_len() + 1]
    }

    /// The unit at `position`, which must carry `tag`.
    pub fn expect(&self, position: usize, tag: Tag) -> Result<&Tlv> {
        let unit = self.units.get(position).ok_or_else(|| {
            ProtocolError::FormatError(format!("no unit at position {position}"))
        })?;
        if unit.tag() != tag.as_byte() {
            return Err(ProtocolError::UnexpectedTag {
                position,
                expected: tag.as_byte(),
                found: unit.tag(),
            });
        }
        Ok(unit)
    }

    /// Wire bytes covered by the hash: every unit except the hash itself.
    pub fn signed_bytes(&self) -> BytesMut {
        let covered = &self.units[..self.units.len() - 1];
        let mut buf = BytesMut::with_capacity(covered.iter().map(Tlv::encoded_len).sum());
        for unit in covered {
            unit.write_to(&mut buf);
        }
        buf
    }
}

/// Outcome of feeding one unit to the assembler.
#[derive(Debug)]
pub enum Assembled {
    /// More units are needed.
    Pending,
    /// A full message is ready.
    Complete(Message),
    /// The unit does not start a known request and was dropped.
    Skipped(Tlv),
    /// A request leader arrived inside an unfinished message of this kind.
    /// The partial message was dropped and a new one started.
    Abandoned(RequestKind),
}

/// Groups units into messages using the leading tag's schema.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    pending: Option<(RequestKind, Vec<Tlv>)>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one unit.
    ///
    /// Request leader tags never appear at later positions, so a leader
    /// arriving mid-message means the pending message lost units. The
    /// stream resynchronizes on that leader.
    pub fn push(&mut self, unit: Tlv) -> Result<Assembled> {
        if RequestKind::from_tag(unit.tag()).is_some() {
            if let Some((abandoned, _)) = self.pending.take() {
                return match self.push(unit)? {
                    Assembled::Pending => Ok(Assembled::Abandoned(abandoned)),
                    other => Ok(other),
                };
            }
        }

        let (kind, mut units) = match self.pending.take() {
            Some(pending) => pending,
            None => match RequestKind::from_tag(unit.tag()) {
                Some(kind) => (kind, Vec::with_capacity(kind.unit_count())),
                None => return Ok(Assembled::Skipped(unit)),
            },
        };

        units.push(unit);
        if units.len() < kind.unit_count() {
            self.pending = Some((kind, units));
            return Ok(Assembled::Pending);
        }

        Message::new(kind, units).map(Assembled::Complete)
    }

    /// True when no partial message is buffered.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Drop any partial message, returning its leading tag name.
    pub fn reset(&mut self) -> Option<String> {
        self.pending
            .take()
            .map(|(kind, _)| tag_name(kind.tag().as_byte()))
    }
}
