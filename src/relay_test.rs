use super::*;
use crate::event::{ChatMessage, ChatSender, DrawTool, PartialWorkspace, Stroke};
use tokio::time::{Duration, Instant, timeout};

async fn connect(relay: &RelayHandle) -> (Uuid, mpsc::Receiver<ServerEvent>) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(64);
    relay.connect(connection_id, tx).await;
    // Every fresh connection is hydrated first.
    match recv(&mut rx).await {
        ServerEvent::WorkspaceLoad(_) => {}
        other => panic!("expected workspace:load on connect, got {other:?}"),
    }
    (connection_id, rx)
}

async fn join(relay: &RelayHandle, connection_id: Uuid, rx: &mut mpsc::Receiver<ServerEvent>, name: &str, role: Role) {
    relay
        .inbound(connection_id, ClientEvent::UserJoin { name: name.into(), role })
        .await;
    match recv(rx).await {
        ServerEvent::UsersUpdate(users) => {
            assert!(users.iter().any(|u| u.name == name), "joiner must appear in its own users:update");
        }
        other => panic!("expected users:update after join, got {other:?}"),
    }
}

async fn recv(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("relay channel closed unexpectedly")
}

async fn assert_silent(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no further event"
    );
}

fn stroke(points: &[f64]) -> Stroke {
    Stroke { tool: DrawTool::Pen, points: points.to_vec(), color: "#2563eb".into() }
}

fn chat(id: &str, text: &str) -> ChatMessage {
    ChatMessage {
        id: id.into(),
        sender: ChatSender::User,
        text: text.into(),
        timestamp: now_ms(),
        role: Some(Role::Student),
        sender_name: Some("Luke".into()),
    }
}

#[tokio::test]
async fn code_update_is_last_writer_wins() {
    let relay = spawn();
    let (a, mut rx_a) = connect(&relay).await;
    let (b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::CodeUpdate("print(1)".into())).await;
    relay.inbound(b, ClientEvent::CodeUpdate("print(2)".into())).await;
    relay.inbound(a, ClientEvent::CodeUpdate("print(3)".into())).await;

    // Drain the cross-traffic so ordering is settled before the snapshot.
    assert!(matches!(recv(&mut rx_b).await, ServerEvent::CodeUpdate(c) if c == "print(1)"));
    assert!(matches!(recv(&mut rx_a).await, ServerEvent::CodeUpdate(c) if c == "print(2)"));
    assert!(matches!(recv(&mut rx_b).await, ServerEvent::CodeUpdate(c) if c == "print(3)"));

    let snapshot = relay.snapshot().await.expect("relay alive");
    assert_eq!(snapshot.workspace.code, "print(3)");
}

#[tokio::test]
async fn code_update_reaches_peer_verbatim_and_nothing_else() {
    let relay = spawn();
    let (a, mut rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::CodeUpdate("print(1)".into())).await;

    match recv(&mut rx_b).await {
        ServerEvent::CodeUpdate(code) => assert_eq!(code, "print(1)"),
        other => panic!("expected code:update, got {other:?}"),
    }
    assert_silent(&mut rx_b).await;
    // No echo back to the sender.
    assert_silent(&mut rx_a).await;
}

#[tokio::test]
async fn draw_sync_payload_passes_through_untransformed() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    let lines = vec![stroke(&[0.0, 0.0, 10.0, 12.5]), stroke(&[3.0, 4.0])];
    relay.inbound(a, ClientEvent::DrawSync(lines.clone())).await;

    match recv(&mut rx_b).await {
        ServerEvent::DrawSync(received) => assert_eq!(received, lines),
        other => panic!("expected draw:sync, got {other:?}"),
    }

    let snapshot = relay.snapshot().await.expect("relay alive");
    assert_eq!(snapshot.workspace.lines, lines);
}

#[tokio::test]
async fn draw_clear_empties_store_and_peers() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::DrawSync(vec![stroke(&[1.0, 2.0])])).await;
    relay.inbound(a, ClientEvent::DrawClear).await;

    assert!(matches!(recv(&mut rx_b).await, ServerEvent::DrawSync(_)));
    assert!(matches!(recv(&mut rx_b).await, ServerEvent::DrawClear));

    let snapshot = relay.snapshot().await.expect("relay alive");
    assert!(snapshot.workspace.lines.is_empty());
}

#[tokio::test]
async fn chat_messages_append_in_order() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::ChatMessage(chat("m1", "hello"))).await;
    relay.inbound(a, ClientEvent::ChatMessage(chat("m2", "world"))).await;

    assert!(matches!(recv(&mut rx_b).await, ServerEvent::ChatMessage(m) if m.id == "m1"));
    assert!(matches!(recv(&mut rx_b).await, ServerEvent::ChatMessage(m) if m.id == "m2"));

    let snapshot = relay.snapshot().await.expect("relay alive");
    let ids: Vec<&str> = snapshot.workspace.chat.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn workspace_save_merges_and_rehydrates_peers() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::ChatMessage(chat("m1", "kept"))).await;
    assert!(matches!(recv(&mut rx_b).await, ServerEvent::ChatMessage(_)));

    relay
        .inbound(
            a,
            ClientEvent::WorkspaceSave(PartialWorkspace { code: Some("saved = True".into()), lines: None, chat: None }),
        )
        .await;

    match recv(&mut rx_b).await {
        ServerEvent::WorkspaceLoad(ws) => {
            assert_eq!(ws.code, "saved = True");
            assert_eq!(ws.chat.len(), 1, "shallow merge must not drop absent fields");
        }
        other => panic!("expected workspace:load after save, got {other:?}"),
    }
}

#[tokio::test]
async fn new_connection_sees_current_snapshot() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    relay.inbound(a, ClientEvent::CodeUpdate("x = 41".into())).await;
    // Serialize against the relay before connecting the late joiner.
    let _ = relay.snapshot().await;

    let late_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(64);
    relay.connect(late_id, tx).await;
    match recv(&mut rx).await {
        ServerEvent::WorkspaceLoad(ws) => assert_eq!(ws.code, "x = 41"),
        other => panic!("expected workspace:load, got {other:?}"),
    }
}

#[tokio::test]
async fn join_then_disconnect_removes_presence_with_one_update() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (observer, mut rx_obs) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(users) if users.len() == 1));

    join(&relay, observer, &mut rx_obs, "Aleix", Role::Instructor).await;
    assert!(matches!(recv(&mut rx_luke).await, ServerEvent::UsersUpdate(users) if users.len() == 2));

    relay.disconnect(luke).await;

    match recv(&mut rx_obs).await {
        ServerEvent::UsersUpdate(users) => {
            assert!(!users.iter().any(|u| u.name == "Luke"));
            assert_eq!(users.len(), 1);
        }
        other => panic!("expected users:update after disconnect, got {other:?}"),
    }
    assert_silent(&mut rx_obs).await;

    let snapshot = relay.snapshot().await.expect("relay alive");
    assert!(!snapshot.users.iter().any(|u| u.name == "Luke"));
}

#[tokio::test]
async fn join_assigns_role_colors() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (aleix, mut rx_aleix) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    join(&relay, aleix, &mut rx_aleix, "Aleix", Role::Instructor).await;

    let snapshot = relay.snapshot().await.expect("relay alive");
    let by_name = |name: &str| snapshot.users.iter().find(|u| u.name == name).expect("present");
    assert_eq!(by_name("Luke").color, crate::event::STUDENT_COLOR);
    assert_eq!(by_name("Aleix").color, crate::event::INSTRUCTOR_COLOR);
    // Insertion order is the presence order.
    assert_eq!(snapshot.users[0].name, "Luke");
    assert_eq!(snapshot.users[1].name, "Aleix");
}

#[tokio::test(start_paused = true)]
async fn typing_expires_once_after_three_seconds() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (_obs, mut rx_obs) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(_)));

    relay.inbound(luke, ClientEvent::UserTyping(true)).await;
    match recv(&mut rx_obs).await {
        ServerEvent::UserTyping(t) => assert!(t.is_typing),
        other => panic!("expected user:typing, got {other:?}"),
    }

    let started = Instant::now();
    match recv(&mut rx_obs).await {
        ServerEvent::UserTyping(t) => {
            assert!(!t.is_typing, "expected the synthetic stop broadcast");
            assert_eq!(t.name, "Luke");
        }
        other => panic!("expected synthetic typing stop, got {other:?}"),
    }
    let elapsed = started.elapsed();
    assert!(
        elapsed >= TYPING_EXPIRY && elapsed < TYPING_EXPIRY + Duration::from_millis(10),
        "stop must fire at the expiry deadline, fired after {elapsed:?}"
    );

    // Exactly one stop; the sender itself hears nothing.
    assert_silent(&mut rx_obs).await;
    assert_silent(&mut rx_luke).await;
}

#[tokio::test(start_paused = true)]
async fn typing_refresh_restarts_the_expiry_window() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (_obs, mut rx_obs) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(_)));

    relay.inbound(luke, ClientEvent::UserTyping(true)).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UserTyping(t) if t.is_typing));

    // Refresh two seconds in; the first timer's deadline passes harmlessly.
    tokio::time::advance(Duration::from_secs(2)).await;
    relay.inbound(luke, ClientEvent::UserTyping(true)).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UserTyping(t) if t.is_typing));

    let refreshed = Instant::now();
    // The superseded timer must not produce a stop; only the refreshed one.
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UserTyping(t) if !t.is_typing));
    assert!(refreshed.elapsed() >= TYPING_EXPIRY);
    assert_silent(&mut rx_obs).await;
}

#[tokio::test]
async fn explicit_typing_stop_clears_immediately() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (_obs, mut rx_obs) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(_)));

    relay.inbound(luke, ClientEvent::UserTyping(true)).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UserTyping(t) if t.is_typing));

    relay.inbound(luke, ClientEvent::UserTyping(false)).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UserTyping(t) if !t.is_typing));

    let snapshot = relay.snapshot().await.expect("relay alive");
    assert!(snapshot.typing.is_empty());
}

#[tokio::test]
async fn cursor_move_is_enriched_and_survives_disconnect() {
    let relay = spawn();
    let (luke, mut rx_luke) = connect(&relay).await;
    let (_obs, mut rx_obs) = connect(&relay).await;

    join(&relay, luke, &mut rx_luke, "Luke", Role::Student).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(_)));

    relay.inbound(luke, ClientEvent::CursorMove { line: 12, ch: 4 }).await;
    match recv(&mut rx_obs).await {
        ServerEvent::CursorMove(cursor) => {
            assert_eq!(cursor.name, "Luke");
            assert_eq!(cursor.color, crate::event::STUDENT_COLOR);
            assert_eq!((cursor.line, cursor.ch), (12, 4));
        }
        other => panic!("expected cursor:move, got {other:?}"),
    }

    relay.disconnect(luke).await;
    assert!(matches!(recv(&mut rx_obs).await, ServerEvent::UsersUpdate(_)));

    // Cursor entries outlive the connection.
    let snapshot = relay.snapshot().await.expect("relay alive");
    assert!(snapshot.cursors.iter().any(|c| c.name == "Luke"));
    assert!(snapshot.users.is_empty());
}

#[tokio::test]
async fn events_before_join_are_ignored_for_typing_and_cursor() {
    let relay = spawn();
    let (a, _rx_a) = connect(&relay).await;
    let (_b, mut rx_b) = connect(&relay).await;

    relay.inbound(a, ClientEvent::UserTyping(true)).await;
    relay.inbound(a, ClientEvent::CursorMove { line: 1, ch: 1 }).await;
    // Content mutations still relay without a join.
    relay.inbound(a, ClientEvent::CodeUpdate("anon".into())).await;

    assert!(matches!(recv(&mut rx_b).await, ServerEvent::CodeUpdate(c) if c == "anon"));
    assert_silent(&mut rx_b).await;
}
