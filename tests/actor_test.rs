//! Tests for the per-match actor runtime, using the paused tokio clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tictactoe_arena::{
    HumanPresence, JoinError, MatchData, MatchRuntime, OpCode, Outbound, Presence, RejectReason,
    RegistryEvent, Transport, spawn_match,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Default)]
struct RecordingTransport {
    deliveries: Mutex<Vec<(String, Outbound)>>,
}

impl RecordingTransport {
    fn ops(&self) -> Vec<OpCode> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, outbound)| outbound.op)
            .collect()
    }

    fn last_payload(&self, op: OpCode) -> Option<serde_json::Value> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, outbound)| outbound.op == op)
            .and_then(|(_, outbound)| outbound.payload.as_ref())
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, match_id: &str, outbound: Outbound) {
        self.deliveries
            .lock()
            .unwrap()
            .push((match_id.to_owned(), outbound));
    }
}

fn human(id: &str) -> HumanPresence {
    HumanPresence {
        user_id: id.to_owned(),
        username: id.to_owned(),
        session_id: format!("session-{id}"),
    }
}

fn mv(id: &str, position: i64) -> MatchData {
    MatchData {
        op_code: OpCode::Move as i64,
        sender: Presence::Human(human(id)),
        data: format!(r#"{{"position":{position}}}"#).into_bytes(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_actor_plays_a_round_end_to_end() {
    let transport = Arc::new(RecordingTransport::default());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let runtime = MatchRuntime {
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        events: events_tx,
        oracle: None,
    };
    let handle = spawn_match("m1".to_owned(), false, false, runtime);

    handle.join_attempt(human("a")).await.unwrap();
    handle.join(human("a"));
    handle.join_attempt(human("b")).await.unwrap();
    handle.join(human("b"));

    // A few ticks for the join to finalize and the round to start.
    sleep(Duration::from_millis(1000)).await;
    assert!(transport.ops().contains(&OpCode::Start));
    let start = transport.last_payload(OpCode::Start).unwrap();
    assert_eq!(start["marks"]["a"], "x");

    // Both slots taken: the label closed.
    match events_rx.recv().await.unwrap() {
        RegistryEvent::LabelChanged { match_id, label } => {
            assert_eq!(match_id, "m1");
            assert_eq!(label.open, 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    handle.send_data(mv("a", 4));
    sleep(Duration::from_millis(500)).await;
    let update = transport.last_payload(OpCode::Update).unwrap();
    assert_eq!(update["board"][4], "x");
    assert_eq!(update["mark"], "o");
}

#[tokio::test(start_paused = true)]
async fn test_actor_rejects_third_player() {
    let transport = Arc::new(RecordingTransport::default());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let runtime = MatchRuntime {
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        events: events_tx,
        oracle: None,
    };
    let handle = spawn_match("m2".to_owned(), false, false, runtime);

    handle.join_attempt(human("a")).await.unwrap();
    handle.join(human("a"));
    handle.join_attempt(human("b")).await.unwrap();
    handle.join(human("b"));

    assert_eq!(
        handle.join_attempt(human("c")).await,
        Err(JoinError::Rejected(RejectReason::MatchFull))
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_actor_evicts_itself_and_closes_its_inbox() {
    let transport = Arc::new(RecordingTransport::default());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let runtime = MatchRuntime {
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        events: events_tx,
        oracle: None,
    };
    let handle = spawn_match("m3".to_owned(), false, false, runtime);

    // 30 seconds empty at 5 ticks/sec evicts the match.
    sleep(Duration::from_secs(31)).await;
    match events_rx.recv().await.unwrap() {
        RegistryEvent::Closed { match_id } => assert_eq!(match_id, "m3"),
        other => panic!("unexpected event: {other:?}"),
    }

    assert_eq!(
        handle.join_attempt(human("a")).await,
        Err(JoinError::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_ai_match_without_oracle_forfeits_the_ai_turn() {
    let transport = Arc::new(RecordingTransport::default());
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let runtime = MatchRuntime {
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        events: events_tx,
        oracle: None,
    };
    let handle = spawn_match("m4".to_owned(), false, true, runtime);

    handle.join_attempt(human("a")).await.unwrap();
    handle.join(human("a"));
    sleep(Duration::from_millis(1000)).await;
    assert!(transport.ops().contains(&OpCode::Start));

    // The human opens; the oracle-less AI never answers and times out.
    handle.send_data(mv("a", 0));
    sleep(Duration::from_secs(21)).await;
    let done = transport.last_payload(OpCode::Done).unwrap();
    assert_eq!(done["winner"], "x");
    assert_eq!(done["winnerPositions"], serde_json::Value::Null);
}
