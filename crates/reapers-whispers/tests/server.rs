//! End-to-end tests: a real server on a free port, real WebSocket clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reapers_whispers::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let session = SessionConfig {
        seed: Some(7),
        turn_duration: Duration::from_secs(60),
        ..SessionConfig::default()
    };
    let server = ReaperServer::builder()
        .bind("127.0.0.1:0")
        .session_config(session)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

/// Connects and reads the welcome; returns the socket and assigned id.
async fn connect(addr: &str) -> (ClientWs, ParticipantId) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match next_event(&mut ws).await {
        ServerEvent::Welcome { participant_id } => (ws, participant_id),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

async fn send_intent(ws: &mut ClientWs, intent: &Intent) {
    let json = serde_json::to_string(intent).expect("encode");
    ws.send(Message::text(json)).await.expect("send intent");
}

async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("event should arrive in time")
        .expect("stream should be open")
        .expect("frame should be valid");
    serde_json::from_slice(&msg.into_data()).expect("decode event")
}

/// Skips events until a snapshot matching `pred` arrives.
async fn snapshot_where(
    ws: &mut ClientWs,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    loop {
        if let ServerEvent::Snapshot(snapshot) = next_event(ws).await {
            if pred(&snapshot) {
                return snapshot;
            }
        }
    }
}

/// Skips events until an error arrives and returns its code.
async fn next_error(ws: &mut ClientWs) -> ErrorCode {
    loop {
        if let ServerEvent::Error { code, .. } = next_event(ws).await {
            return code;
        }
    }
}

fn join(code: &str, id: ParticipantId, name: &str) -> Intent {
    Intent::Join {
        session_code: SessionCode::new(code),
        participant_id: id,
        name: name.into(),
    }
}

/// Two connected participants in session `code`, both past their join
/// snapshots.
async fn two_in_session(addr: &str, code: &str) -> ((ClientWs, ParticipantId), (ClientWs, ParticipantId)) {
    let (mut ws1, p1) = connect(addr).await;
    let (mut ws2, p2) = connect(addr).await;
    send_intent(&mut ws1, &join(code, p1, "ada")).await;
    snapshot_where(&mut ws1, |s| s.roster.len() == 1).await;
    send_intent(&mut ws2, &join(code, p2, "bo")).await;
    snapshot_where(&mut ws1, |s| s.roster.len() == 2).await;
    snapshot_where(&mut ws2, |s| s.roster.len() == 2).await;
    ((ws1, p1), (ws2, p2))
}

// =========================================================================
// Connection
// =========================================================================

#[tokio::test]
async fn test_each_connection_gets_distinct_id() {
    let addr = start_server().await;
    let (_ws1, p1) = connect(&addr).await;
    let (_ws2, p2) = connect(&addr).await;
    assert_ne!(p1, p2);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let addr = start_server().await;
    let (mut ws, _) = connect(&addr).await;

    ws.send(Message::text("{not json".to_string())).await.unwrap();

    assert_eq!(next_error(&mut ws).await, ErrorCode::BadRequest);
}

#[tokio::test]
async fn test_unknown_kind_is_bad_request() {
    let addr = start_server().await;
    let (mut ws, p) = connect(&addr).await;
    let raw = format!(r#"{{"kind":"teleport","sessionCode":"ABC","participantId":{}}}"#, p.0);

    ws.send(Message::text(raw)).await.unwrap();

    assert_eq!(next_error(&mut ws).await, ErrorCode::BadRequest);
}

// =========================================================================
// Intent routing
// =========================================================================

#[tokio::test]
async fn test_join_is_broadcast_to_members() {
    let addr = start_server().await;
    let ((_ws1, p1), (mut ws2, p2)) = two_in_session(&addr, "CRYPT").await;

    let (mut ws3, p3) = connect(&addr).await;
    send_intent(&mut ws3, &join("CRYPT", p3, "cy")).await;

    let seen = snapshot_where(&mut ws2, |s| s.roster.len() == 3).await;
    assert_eq!(seen.host, Some(p1));
    assert_eq!(seen.viewer, p2);
    assert_eq!(seen.status, SessionStatus::Waiting);
}

#[tokio::test]
async fn test_spoofed_participant_id_is_invalid_state() {
    let addr = start_server().await;
    let (mut ws, p) = connect(&addr).await;

    send_intent(&mut ws, &join("CRYPT", ParticipantId(p.0 + 1000), "eve")).await;

    assert_eq!(next_error(&mut ws).await, ErrorCode::InvalidState);
}

#[tokio::test]
async fn test_blank_session_code_is_bad_request() {
    let addr = start_server().await;
    let (mut ws, p) = connect(&addr).await;

    send_intent(&mut ws, &join("  ", p, "ada")).await;

    assert_eq!(next_error(&mut ws).await, ErrorCode::BadRequest);
}

#[tokio::test]
async fn test_action_on_unknown_session_is_not_found() {
    let addr = start_server().await;
    let (mut ws, p) = connect(&addr).await;
    let chat = Intent::Chat {
        session_code: SessionCode::new("NOWHERE"),
        participant_id: p,
        text: "hello?".into(),
    };

    send_intent(&mut ws, &chat).await;

    assert_eq!(next_error(&mut ws).await, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_second_join_while_member_is_invalid_state() {
    let addr = start_server().await;
    let (mut ws, p) = connect(&addr).await;
    send_intent(&mut ws, &join("ONE", p, "ada")).await;
    snapshot_where(&mut ws, |_| true).await;

    send_intent(&mut ws, &join("TWO", p, "ada")).await;

    assert_eq!(next_error(&mut ws).await, ErrorCode::InvalidState);
}

#[tokio::test]
async fn test_chat_reaches_everyone() {
    let addr = start_server().await;
    let ((mut ws1, p1), (mut ws2, _)) = two_in_session(&addr, "CRYPT").await;
    let chat = Intent::Chat {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p1,
        text: "anyone there?".into(),
    };

    send_intent(&mut ws1, &chat).await;

    loop {
        if let ServerEvent::Chat(entry) = next_event(&mut ws2).await {
            assert_eq!(entry.sender, p1);
            assert_eq!(entry.name, "ada");
            assert_eq!(entry.text, "anyone there?");
            break;
        }
    }
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test]
async fn test_start_redacts_positions_per_viewer() {
    let addr = start_server().await;
    let ((mut ws1, p1), (mut ws2, p2)) = two_in_session(&addr, "CRYPT").await;

    let start = Intent::Start {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p1,
    };
    send_intent(&mut ws1, &start).await;

    let active = |s: &SessionSnapshot| s.status == SessionStatus::Active;
    let view1 = snapshot_where(&mut ws1, active).await;
    let view2 = snapshot_where(&mut ws2, active).await;

    // Everyone sees themselves.
    assert!(view1.participant(p1).unwrap().position.is_some());
    assert!(view2.participant(p2).unwrap().position.is_some());

    // Only the adversary sees the other participant.
    let p1_sees_p2 = view1.participant(p2).unwrap().position.is_some();
    let p2_sees_p1 = view2.participant(p1).unwrap().position.is_some();
    assert!(p1_sees_p2 ^ p2_sees_p1, "exactly one side may see the other");

    let adversary_view = if p1_sees_p2 { &view1 } else { &view2 };
    assert_eq!(
        adversary_view.participant(adversary_view.viewer).unwrap().role,
        Some(Role::Adversary)
    );
    assert_eq!(view1.current_turn.map(|t| t.participant_id), Some(p1));
}

#[tokio::test]
async fn test_move_out_of_turn_is_private_error() {
    let addr = start_server().await;
    let ((mut ws1, p1), (mut ws2, p2)) = two_in_session(&addr, "CRYPT").await;
    let start = Intent::Start {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p1,
    };
    send_intent(&mut ws1, &start).await;
    snapshot_where(&mut ws1, |s| s.status == SessionStatus::Active).await;
    snapshot_where(&mut ws2, |s| s.status == SessionStatus::Active).await;

    let step = Intent::Move {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p2,
        target_cell: 0,
    };
    send_intent(&mut ws2, &step).await;

    assert_eq!(next_error(&mut ws2).await, ErrorCode::NotYourTurn);
    let nothing = tokio::time::timeout(Duration::from_millis(100), ws1.next()).await;
    assert!(nothing.is_err(), "a rejected move is not broadcast");
}

#[tokio::test]
async fn test_disconnect_removes_participant() {
    let addr = start_server().await;
    let ((mut ws1, p1), (ws2, p2)) = two_in_session(&addr, "CRYPT").await;

    drop(ws2);

    let after = snapshot_where(&mut ws1, |s| s.roster.len() == 1).await;
    assert!(after.participant(p1).is_some());
    assert!(after.participant(p2).is_none());
}

#[tokio::test]
async fn test_valid_moves_answered_privately() {
    let addr = start_server().await;
    let ((mut ws1, p1), (mut ws2, p2)) = two_in_session(&addr, "CRYPT").await;
    let start = Intent::Start {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p1,
    };
    send_intent(&mut ws1, &start).await;
    let view2 = snapshot_where(&mut ws2, |s| s.status == SessionStatus::Active).await;
    snapshot_where(&mut ws1, |s| s.status == SessionStatus::Active).await;

    let ask = Intent::RequestValidMoves {
        session_code: SessionCode::new("CRYPT"),
        participant_id: p2,
    };
    send_intent(&mut ws2, &ask).await;

    let cells = loop {
        if let ServerEvent::ValidMoves { cells } = next_event(&mut ws2).await {
            break cells;
        }
    };
    let here = view2.participant(p2).unwrap().position.unwrap();
    let grid = Grid::new(view2.board_size).unwrap();
    assert_eq!(cells, grid.neighbors(here).unwrap());
    let nothing = tokio::time::timeout(Duration::from_millis(100), ws1.next()).await;
    assert!(nothing.is_err(), "valid moves are not broadcast");
}
