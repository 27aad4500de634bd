//! Integration tests for session actors and the registry.

use std::time::Duration;

use reaper_protocol::{
    ModerationAction, ParticipantId, PowerUpKind, RemovalReason, ServerEvent, SessionCode,
    SessionStatus,
};
use reaper_session::{Layout, Pickup, SessionConfig, SessionError, SessionRegistry};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn code(s: &str) -> SessionCode {
    SessionCode::new(s)
}

fn registry() -> SessionRegistry {
    SessionRegistry::new(SessionConfig {
        turn_duration: Duration::from_secs(5),
        seed: Some(11),
        ..SessionConfig::default()
    })
}

/// Everything delivered so far, without waiting.
fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn snapshots(events: &[ServerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ServerEvent::Snapshot(_)))
        .count()
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_get_or_create_returns_same_session() {
    let reg = registry();
    let a = reg.get_or_create(&code("ABCDEF")).await;
    let b = reg.get_or_create(&code("ABCDEF")).await;
    assert_eq!(a.instance(), b.instance());
    assert_eq!(reg.len().await, 1);
}

#[tokio::test]
async fn test_concurrent_get_or_create_agrees() {
    let reg = registry();
    let c = code("RACE01");
    let (a, b) = tokio::join!(reg.get_or_create(&c), reg.get_or_create(&c));
    assert_eq!(a.instance(), b.instance());
    assert_eq!(reg.codes().await, vec![c]);
}

#[tokio::test]
async fn test_get_unknown_is_not_found() {
    let reg = registry();
    let err = reg.get(&code("NOPE")).await.err().unwrap();
    assert_eq!(err, SessionError::NotFound(code("NOPE")));
}

#[tokio::test(start_paused = true)]
async fn test_last_leave_evicts_session() {
    let reg = registry();
    let c = code("ABCDEF");
    let handle = reg.get_or_create(&c).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.join(pid(1), "solo", tx).await.unwrap();

    handle.leave(pid(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(reg.is_empty().await);
    assert!(handle.is_closed());
    assert!(matches!(
        reg.get(&c).await.err().unwrap(),
        SessionError::NotFound(_)
    ));
    let (tx, _rx) = mpsc::unbounded_channel();
    assert_eq!(
        handle.join(pid(2), "late", tx).await.unwrap_err(),
        SessionError::Unavailable(c.clone())
    );

    let fresh = reg.get_or_create(&c).await;
    assert_ne!(fresh.instance(), handle.instance());
}

#[tokio::test(start_paused = true)]
async fn test_remove_is_idempotent() {
    let reg = registry();
    let c = code("ABCDEF");
    let handle = reg.get_or_create(&c).await;

    assert!(reg.remove(&c).await);
    assert!(!reg.remove(&c).await);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(handle.is_closed());
    assert!(matches!(
        handle.info().await.unwrap_err(),
        SessionError::Unavailable(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_clear_stops_every_session() {
    let reg = registry();
    let a = reg.get_or_create(&code("AAAAAA")).await;
    let b = reg.get_or_create(&code("BBBBBB")).await;

    reg.clear().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(reg.is_empty().await);
    assert!(a.is_closed());
    assert!(b.is_closed());
}

// =========================================================================
// Session actor
// =========================================================================

#[tokio::test]
async fn test_join_sends_snapshot_to_every_member() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();

    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();

    assert_eq!(snapshots(&drain(&mut rx1)), 2);
    let events = drain(&mut rx2);
    match events.as_slice() {
        [ServerEvent::Snapshot(snapshot)] => {
            assert_eq!(snapshot.viewer, pid(2));
            assert_eq!(snapshot.status, SessionStatus::Waiting);
            assert_eq!(snapshot.host, Some(pid(1)));
            assert_eq!(snapshot.roster.len(), 2);
        }
        other => panic!("unexpected events: {other:?}"),
    }

    let info = handle.info().await.unwrap();
    assert_eq!(info.participant_count, 2);
    assert_eq!(info.max_players, 6);
}

#[tokio::test]
async fn test_rejected_command_publishes_nothing() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    assert_eq!(handle.start(pid(2)).await.unwrap_err(), SessionError::NotHost);

    assert!(drain(&mut rx1).is_empty());
    assert!(drain(&mut rx2).is_empty());
}

#[tokio::test]
async fn test_snapshot_is_none_for_non_members() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx).await.unwrap();

    assert!(handle.is_member(pid(1)).await.unwrap());
    assert!(!handle.is_member(pid(2)).await.unwrap());
    assert!(handle.snapshot(pid(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_kicked_participant_gets_notice_and_no_snapshot() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    handle
        .moderate(pid(1), ModerationAction::Kick, pid(2))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx2),
        vec![ServerEvent::Removed { reason: RemovalReason::Kicked }]
    );
    let host_events = drain(&mut rx1);
    assert_eq!(snapshots(&host_events), 1);
    assert_eq!(host_events.len(), 1);
}

#[tokio::test]
async fn test_chat_reaches_everyone() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    handle.chat(pid(2), "anyone there?").await.unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let events = drain(rx);
        assert!(matches!(
            events.first(),
            Some(ServerEvent::Chat(entry)) if entry.text == "anyone there?"
        ));
        assert_eq!(snapshots(&events), 1);
    }
}

#[tokio::test]
async fn test_reveal_goes_only_to_user() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    handle
        .start_with(
            pid(1),
            Layout {
                adversary: pid(2),
                start_cells: vec![5, 10],
                pickups: vec![Pickup { cell: 4, kind: PowerUpKind::Reveal }],
            },
        )
        .await
        .unwrap();
    handle.move_to(pid(1), 4).await.unwrap();
    handle.move_to(pid(2), 11).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    handle.use_power_up(pid(1), 1).await.unwrap();

    assert_eq!(
        drain(&mut rx1).first(),
        Some(&ServerEvent::Revealed { adversary_cell: Some(11) })
    );
    let adversary_events = drain(&mut rx2);
    assert!(
        adversary_events
            .iter()
            .all(|e| matches!(e, ServerEvent::Snapshot(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_turn_timeout_rotates_and_notifies_holder() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    handle
        .start_with(
            pid(1),
            Layout {
                adversary: pid(1),
                start_cells: vec![5, 10],
                pickups: vec![],
            },
        )
        .await
        .unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    tokio::time::sleep(Duration::from_secs(6)).await;

    let events = drain(&mut rx1);
    assert_eq!(events.first(), Some(&ServerEvent::TurnExpired { generation: 1 }));
    assert!(
        drain(&mut rx2)
            .iter()
            .all(|e| !matches!(e, ServerEvent::TurnExpired { .. }))
    );

    let snapshot = handle.snapshot(pid(1)).await.unwrap().unwrap();
    let turn = snapshot.current_turn.unwrap();
    assert_eq!(turn.participant_id, pid(2));
    assert_eq!(turn.generation, 2);
    assert_eq!(snapshot.participant(pid(1)).unwrap().position, Some(5));

    let info = handle.info().await.unwrap();
    assert_eq!(info.turn_metrics.expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_move_before_deadline_resets_clock() {
    let reg = registry();
    let handle = reg.get_or_create(&code("ABCDEF")).await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    handle.join(pid(1), "ada", tx1).await.unwrap();
    handle.join(pid(2), "bo", tx2).await.unwrap();
    handle
        .start_with(
            pid(1),
            Layout {
                adversary: pid(1),
                start_cells: vec![5, 10],
                pickups: vec![],
            },
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;
    handle.move_to(pid(1), 4).await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert!(
        drain(&mut rx1)
            .iter()
            .all(|e| !matches!(e, ServerEvent::TurnExpired { .. }))
    );
    let turn = handle
        .snapshot(pid(2))
        .await
        .unwrap()
        .unwrap()
        .current_turn
        .unwrap();
    assert_eq!(turn.participant_id, pid(2));
    assert_eq!(turn.generation, 2);
}
