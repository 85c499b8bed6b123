// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::config::LobbyConfig;
use crate::core::codec::decode_datagram;
use crate::core::tlv::{Tag, Tlv};
use crate::engine::ChessEngine;
use crate::error::ProtocolError;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::envelope;
use crate::protocol::handshake::HelloRequest;
use crate::protocol::message::{Message, MessageAssembler, RequestKind};
use crate::protocol::request::{self, Response};
use crate::registry::{GameRegistry, SessionRegistry};
use crate::transport::MemoryTransport;
use crate::utils::crypto::MoveCipher;
use crate::utils::metrics::Metrics;

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn dispatcher() -> Dispatcher<ChessEngine> {
    Dispatcher::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(GameRegistry::new(ChessEngine)),
        LobbyConfig::default(),
        Arc::new(Metrics::new()),
    )
}

fn message(wire: &Bytes) -> Message {
    let units = decode_datagram(wire).unwrap();
    let kind = RequestKind::from_tag(units[0].tag()).unwrap();
    Message::new(kind, units).unwrap()
}

fn hello_request(first: &str) -> HelloRequest {
    HelloRequest {
        first_name: first.into(),
        last_name: "Tester".into(),
        status: "online".into(),
        level: 1,
    }
}

fn say_hello(d: &Dispatcher<ChessEngine>, peer: &str, first: &str) -> String {
    let wire = request::hello(&hello_request(first)).unwrap();
    let reply = d.handle(peer, &message(&wire)).unwrap();
    match Response::parse(&reply).unwrap() {
        Response::Signature(sig) => sig,
        other => panic!("unexpected: {other:?}"),
    }
}

fn call(d: &Dispatcher<ChessEngine>, peer: &str, wire: Bytes) -> Response {
    let reply = d.handle(peer, &message(&wire)).unwrap();
    Response::parse(&reply).unwrap()
}

#[test]
fn test_hello_issues_signature_and_record() {
    let d = dispatcher();
    let sig = say_hello(&d, "tcp://a", "Alice");
    assert_eq!(sig.len(), 64);

    let record = d.sessions().get("tcp://a").unwrap().unwrap();
    assert_eq!(record.first_name, "Alice");
    assert_eq!(record.signature, sig);
    assert_eq!(d.metrics().snapshot().handshakes, 1);
}

#[test]
fn test_repeated_hello_rotates_signature() {
    let d = dispatcher();
    let first = say_hello(&d, "tcp://a", "Alice");
    let second = say_hello(&d, "tcp://a", "Alice");
    assert_ne!(first, second);

    let wire = request::list_lobbies(&first).unwrap();
    assert!(matches!(
        d.handle("tcp://a", &message(&wire)),
        Err(ProtocolError::IntegrityError(_))
    ));
    assert!(matches!(
        call(&d, "tcp://a", request::list_lobbies(&second).unwrap()),
        Response::Lobbies(_)
    ));
}

#[test]
fn test_unknown_peer_gets_no_response() {
    let d = dispatcher();
    let wire = request::create_game("Mallory", &"0".repeat(64)).unwrap();
    assert!(matches!(
        d.handle("tcp://m", &message(&wire)),
        Err(ProtocolError::IntegrityError(_))
    ));
    assert!(d.games().is_empty());
}

#[test]
fn test_tampered_request_mutates_nothing() {
    let d = dispatcher();
    let sig = say_hello(&d, "tcp://a", "Alice");

    let wire = request::create_game("Alice", &sig).unwrap();
    let mut units = decode_datagram(&wire).unwrap();
    units[1] = Tlv::text(Tag::ByteData, "Alicf").unwrap();
    let tampered = Message::new(RequestKind::CreateGame, units).unwrap();

    assert!(matches!(
        d.handle("tcp://a", &tampered),
        Err(ProtocolError::IntegrityError(_))
    ));
    assert!(d.games().is_empty());
    assert_eq!(d.metrics().snapshot().integrity_failures, 1);
}

#[test]
fn test_create_then_duplicate_is_refused() {
    let d = dispatcher();
    let alice = say_hello(&d, "tcp://a", "Alice");
    let eve = say_hello(&d, "tcp://e", "Eve");

    let id = match call(&d, "tcp://a", request::create_game("Alice", &alice).unwrap()) {
        Response::GameId(id) => id,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(d.sessions().get("tcp://a").unwrap().unwrap().game_id, Some(id));

    assert_eq!(
        call(&d, "tcp://e", request::create_game("Alice", &eve).unwrap()),
        Response::Refused("lobby-exists".into())
    );
    assert_eq!(d.games().session(id).unwrap().creator, "Alice");
}

#[test]
fn test_join_refusals() {
    let d = dispatcher();
    let alice = say_hello(&d, "tcp://a", "Alice");
    let bob = say_hello(&d, "tcp://b", "Bob");
    let carol = say_hello(&d, "tcp://c", "Carol");
    call(&d, "tcp://a", request::create_game("Alice", &alice).unwrap());

    assert_eq!(
        call(&d, "tcp://b", request::join_lobby("Lobby-Nobody", "Bob", &bob).unwrap()),
        Response::Refused("lobby-not-found".into())
    );
    assert_eq!(
        call(&d, "tcp://b", request::join_lobby("Lobby-Alice", "Alice", &bob).unwrap()),
        Response::Refused("player-already-joined".into())
    );
    assert!(matches!(
        call(&d, "tcp://b", request::join_lobby("Lobby-Alice", "Bob", &bob).unwrap()),
        Response::GameId(_)
    ));
    assert_eq!(
        call(&d, "tcp://c", request::join_lobby("Lobby-Alice", "Carol", &carol).unwrap()),
        Response::Refused("lobby-locked".into())
    );
    assert_eq!(
        call(&d, "tcp://b", request::join_lobby("Lobby-Alice", "Bob", &bob).unwrap()),
        Response::Refused("lobby-locked".into())
    );
}

#[test]
fn test_board_and_moves() {
    let d = dispatcher();
    let alice = say_hello(&d, "tcp://a", "Alice");
    let id = match call(&d, "tcp://a", request::create_game("Alice", &alice).unwrap()) {
        Response::GameId(id) => id,
        other => panic!("unexpected: {other:?}"),
    };

    assert_eq!(
        call(&d, "tcp://a", request::board(id, &alice).unwrap()),
        Response::Board(START.into())
    );

    match call(&d, "tcp://a", request::make_move(id, "zz99", &alice).unwrap()) {
        Response::Action(reply) => {
            assert_eq!(reply.status, "illegal-move");
            assert_eq!(reply.position, START);
            assert_eq!(reply.outcome, "ongoing");
        }
        other => panic!("unexpected: {other:?}"),
    }

    match call(&d, "tcp://a", request::make_move(id, "e2e4", &alice).unwrap()) {
        Response::Action(reply) => {
            assert!(reply.accepted());
            assert_eq!(
                reply.position,
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
            );
        }
        other => panic!("unexpected: {other:?}"),
    }

    assert_eq!(
        call(&d, "tcp://a", request::board(Uuid::new_v4(), &alice).unwrap()),
        Response::Refused("session-not-found".into())
    );
}

#[test]
fn test_encrypted_move() {
    let cipher = MoveCipher::from_hex(KEY).unwrap();
    let d = dispatcher().with_move_cipher(MoveCipher::from_hex(KEY).unwrap());
    let alice = say_hello(&d, "tcp://a", "Alice");
    let id = match call(&d, "tcp://a", request::create_game("Alice", &alice).unwrap()) {
        Response::GameId(id) => id,
        other => panic!("unexpected: {other:?}"),
    };

    let wire = request::make_encrypted_move(id, "d2d4", &cipher, &alice).unwrap();
    match call(&d, "tcp://a", wire) {
        Response::Action(reply) => assert!(reply.accepted()),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_encrypted_move_without_key() {
    let cipher = MoveCipher::from_hex(KEY).unwrap();
    let d = dispatcher();
    let alice = say_hello(&d, "tcp://a", "Alice");
    let id = match call(&d, "tcp://a", request::create_game("Alice", &alice).unwrap()) {
        Response::GameId(id) => id,
        other => panic!("unexpected: {other:?}"),
    };

    let wire = request::make_encrypted_move(id, "d2d4", &cipher, &alice).unwrap();
    assert!(matches!(
        d.handle("tcp://a", &message(&wire)),
        Err(ProtocolError::FormatError(_))
    ));
}

#[test]
fn test_encrypted_move_from_unknown_peer_is_not_decrypted() {
    let d = dispatcher().with_move_cipher(MoveCipher::from_hex(KEY).unwrap());
    let payload = [
        Tlv::text(Tag::ActionRequest, "").unwrap(),
        Tlv::new(Tag::UuidPartie, Bytes::copy_from_slice(Uuid::new_v4().as_bytes())).unwrap(),
        Tlv::new(Tag::ByteData, vec![0u8; 40]).unwrap(),
    ];
    let wire = envelope::seal_to_bytes(&payload, &"00".repeat(32)).unwrap();

    assert!(matches!(
        d.handle("tcp://stranger", &message(&wire)),
        Err(ProtocolError::IntegrityError(_))
    ));
    assert_eq!(d.metrics().snapshot().integrity_failures, 1);
}

#[test]
fn test_hello_with_bad_hash_is_dropped() {
    let d = dispatcher();
    let payload = hello_request("Alice").to_payload().unwrap();
    let mut units = envelope::seal(&payload, "").unwrap();
    units[6] = Tlv::text(Tag::ByteData, &"0".repeat(64)).unwrap();
    let message = Message::new(RequestKind::Hello, units).unwrap();

    assert!(matches!(
        d.handle("tcp://a", &message),
        Err(ProtocolError::IntegrityError(_))
    ));
    assert!(d.sessions().is_empty());
}

fn drain(inbox: &mut UnboundedReceiver<Bytes>) -> Vec<Tlv> {
    let mut replies = Vec::new();
    while let Ok(bytes) = inbox.try_recv() {
        replies.extend(decode_datagram(&bytes).unwrap());
    }
    replies
}

#[tokio::test]
async fn test_process_units_skips_stray_and_answers() {
    let d = dispatcher();
    let (transport, mut inbox) = MemoryTransport::new("mem://a");
    let mut assembler = MessageAssembler::new();

    let mut units = vec![Tlv::text(Tag::String, "stray").unwrap()];
    units.extend(decode_datagram(&request::hello(&hello_request("Alice")).unwrap()).unwrap());

    d.process_units(&mut assembler, &transport, units).await.unwrap();

    let replies = drain(&mut inbox);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].tag(), Tag::HelloResponse.as_byte());
    assert!(assembler.is_idle());
    assert_eq!(d.metrics().snapshot().units_skipped, 1);
}

#[tokio::test]
async fn test_process_units_survives_bad_request() {
    let d = dispatcher();
    let (transport, mut inbox) = MemoryTransport::new("mem://a");
    let mut assembler = MessageAssembler::new();

    // No handshake yet: the create is dropped, the hello after it is answered
    let mut units = decode_datagram(&request::create_game("Alice", "nope").unwrap()).unwrap();
    units.extend(decode_datagram(&request::hello(&hello_request("Alice")).unwrap()).unwrap());
    d.process_units(&mut assembler, &transport, units).await.unwrap();

    let replies = drain(&mut inbox);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].tag(), Tag::HelloResponse.as_byte());
}

#[tokio::test]
async fn test_truncated_message_does_not_swallow_next_request() {
    let d = dispatcher();
    let (transport, mut inbox) = MemoryTransport::new("mem://a");
    let mut assembler = MessageAssembler::new();

    // List request missing its hash unit, then a complete hello
    let mut units = vec![
        Tlv::text(Tag::LobbyRequest, "").unwrap(),
        Tlv::text(Tag::ByteData, &"ab".repeat(32)).unwrap(),
    ];
    units.extend(decode_datagram(&request::hello(&hello_request("Alice")).unwrap()).unwrap());
    d.process_units(&mut assembler, &transport, units).await.unwrap();

    let replies = drain(&mut inbox);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].tag(), Tag::HelloResponse.as_byte());
    assert!(assembler.is_idle());
    assert_eq!(d.metrics().snapshot().protocol_errors, 1);
}

#[test]
fn test_large_lobby_list_fits_one_response() {
    let d = dispatcher();
    for i in 0..4000 {
        d.games()
            .create_game("Host", &format!("Lobby-Player-{i:05}"))
            .unwrap();
    }

    // Each name takes 3 + 18 bytes
    let tcp = say_hello(&d, "tcp://a", "Alice");
    match call(&d, "tcp://a", request::list_lobbies(&tcp).unwrap()) {
        Response::Lobbies(names) => assert_eq!(names.len(), 65_535 / 21),
        other => panic!("unexpected: {other:?}"),
    }

    let udp = say_hello(&d, "udp://127.0.0.1:9000", "Bob");
    let reply = d
        .handle("udp://127.0.0.1:9000", &message(&request::list_lobbies(&udp).unwrap()))
        .unwrap();
    assert!(reply.encoded_len() <= 65_507);
    match Response::parse(&reply).unwrap() {
        Response::Lobbies(names) => assert_eq!(names.len(), (65_507 - 3) / 21),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_lobby_list_respects_configured_datagram_size() {
    let d = dispatcher().with_max_datagram_size(1024);
    for i in 0..200 {
        d.games()
            .create_game("Host", &format!("Lobby-Player-{i:05}"))
            .unwrap();
    }

    let sig = say_hello(&d, "udp://127.0.0.1:9000", "Bob");
    let reply = d
        .handle("udp://127.0.0.1:9000", &message(&request::list_lobbies(&sig).unwrap()))
        .unwrap();
    assert!(reply.encoded_len() <= 1024);
    match Response::parse(&reply).unwrap() {
        Response::Lobbies(names) => assert_eq!(names.len(), (1024 - 3) / 21),
        other => panic!("unexpected: {other:?}"),
    }
}
