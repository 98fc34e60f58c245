use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::*;

fn frame_line(value: serde_json::Value) -> String {
    format!("data: {}\n\n", value)
}

fn setup() -> (Reconciler, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let sender: ArcEventTx = Arc::new(tx);
    (Reconciler::new("turn-1", "conv-1", sender), rx)
}

async fn run_chunks(chunks: Vec<Vec<u8>>) -> (TurnOutcome, Vec<TurnSnapshot>) {
    let (reconciler, rx) = setup();
    let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
    let outcome = reconciler.run(stream, &CancellationToken::new()).await;
    (outcome, collect_snapshots(rx).await)
}

async fn run_lines(lines: Vec<String>) -> (TurnOutcome, Vec<TurnSnapshot>) {
    run_chunks(lines.into_iter().map(String::into_bytes).collect()).await
}

async fn collect_snapshots(mut rx: UnboundedReceiver<Event>) -> Vec<TurnSnapshot> {
    let mut snapshots = vec![];
    while let Some(event) = rx.recv().await {
        match event {
            Event::Turn(snapshot) => snapshots.push(snapshot),
            event => panic!("unexpected event: {:?}", event),
        }
    }
    snapshots
}

#[tokio::test]
async fn test_end_to_end_two_chunks() {
    let (outcome, snapshots) = run_lines(vec![
        "data: {\"event\":\"message\",\"answer\":\"Hi\"}\n\n".to_string(),
        "data: {\"event\":\"message_end\"}\n\n".to_string(),
    ])
    .await;

    assert_eq!(outcome.state, TurnState::Committed);
    assert_eq!(outcome.accumulator.answer_text(), "Hi");
    assert!(outcome.accumulator.ended());
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].state, TurnState::Streaming);
    assert_eq!(snapshots[0].answer_text, "Hi");
    assert_eq!(snapshots[1].state, TurnState::Committed);
    assert_eq!(snapshots[1].turn_id, "turn-1");
    assert_eq!(snapshots[1].conversation_id, "conv-1");
}

#[tokio::test]
async fn test_message_frames_concatenate() {
    let answers = ["The ", "quick ", "brown ", "fox"];
    let lines = answers
        .iter()
        .map(|answer| frame_line(json!({ "event": "message", "answer": answer })))
        .collect();

    let (outcome, snapshots) = run_lines(lines).await;

    assert_eq!(outcome.accumulator.answer_text(), answers.concat());
    assert_eq!(snapshots.len(), answers.len() + 1);
    assert_eq!(snapshots[1].answer_text, "The quick ");
}

#[tokio::test]
async fn test_workflow_finished_replaces_text() {
    let (outcome, _) = run_lines(vec![
        frame_line(json!({ "event": "message", "answer": "partial ans" })),
        frame_line(json!({ "event": "message", "answer": "wer that drifted" })),
        frame_line(json!({
            "event": "workflow_finished",
            "data": { "outputs": { "answer": "The final answer." } },
        })),
        frame_line(json!({ "event": "message_end" })),
    ])
    .await;

    assert_eq!(outcome.accumulator.answer_text(), "The final answer.");
}

#[tokio::test]
async fn test_workflow_finished_unwraps_embedded_answer() {
    let embedded = json!({
        "llm_response": "Final text",
        "rag": [{ "id": "doc-1", "content": "Passage" }],
    })
    .to_string();
    let (outcome, _) = run_lines(vec![
        frame_line(json!({ "event": "message", "answer": "Fin" })),
        frame_line(json!({
            "event": "workflow_finished",
            "data": { "outputs": { "answer": embedded } },
        })),
    ])
    .await;

    assert_eq!(outcome.accumulator.answer_text(), "Final text");
    let context = outcome.accumulator.retrieved_context();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].id, "doc-1");
    assert_eq!(context[0].content, "Passage");
}

#[tokio::test]
async fn test_node_finished_replaces_context() {
    let (outcome, snapshots) = run_lines(vec![frame_line(json!({
        "event": "node_finished",
        "data": { "outputs": { "result": [
            { "metadata": { "segment_id": "a" }, "content": "C1" },
        ] } },
    }))])
    .await;

    let expected = vec![ContextItem {
        id: "a".to_string(),
        content: "C1".to_string(),
        metadata: json!({ "segment_id": "a" })
            .as_object()
            .cloned()
            .unwrap_or_default(),
    }];
    assert_eq!(outcome.accumulator.retrieved_context(), expected.as_slice());
    assert_eq!(snapshots[0].retrieved_context, expected);
}

#[tokio::test]
async fn test_retrieval_frames_replace_not_merge() {
    let (outcome, _) = run_lines(vec![
        frame_line(json!({
            "event": "node_finished",
            "data": { "outputs": { "result": [{ "content": "old-1" }, { "content": "old-2" }] } },
        })),
        frame_line(json!({
            "event": "node_finished",
            "data": { "outputs": { "result": [{ "content": "new" }] } },
        })),
    ])
    .await;

    let context = outcome.accumulator.retrieved_context();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].content, "new");
    assert_eq!(context[0].id, "result-0");
}

#[tokio::test]
async fn test_message_with_embedded_json() {
    let embedded = json!({
        "llm_response": "Grounded reply",
        "rag": [
            { "metadata": { "segment_id": "s1" }, "text": "first" },
            { "title": "second" },
        ],
    })
    .to_string();

    let (outcome, _) = run_lines(vec![
        frame_line(json!({ "event": "message", "answer": embedded })),
        frame_line(json!({ "event": "message", "answer": "{\"other\":true}" })),
    ])
    .await;

    assert_eq!(
        outcome.accumulator.answer_text(),
        "Grounded reply{\"other\":true}"
    );
    let context = outcome.accumulator.retrieved_context();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].id, "s1");
    assert_eq!(context[0].content, "first");
    assert_eq!(context[1].id, "result-1");
    assert_eq!(context[1].content, "second");
}

#[tokio::test]
async fn test_session_id_first_write_wins() {
    let (outcome, snapshots) = run_lines(vec![
        frame_line(json!({ "event": "workflow_started", "conversation_id": "first" })),
        frame_line(json!({ "event": "workflow_started", "conversation_id": "second" })),
        frame_line(json!({ "event": "message", "answer": "ok", "conversation_id": "third" })),
    ])
    .await;

    assert_eq!(outcome.accumulator.session_id(), Some("first"));
    // the second workflow_started changed nothing, so no snapshot for it
    assert_eq!(snapshots.len(), 3);
    assert!(
        snapshots
            .iter()
            .all(|snapshot| snapshot.session_id.as_deref() == Some("first"))
    );
}

#[tokio::test]
async fn test_multibyte_split_one_byte_per_chunk() {
    let body = frame_line(json!({ "event": "message", "answer": "你好, wörld 👋" }));
    let chunks = body.into_bytes().into_iter().map(|b| vec![b]).collect();

    let (outcome, _) = run_chunks(chunks).await;

    assert_eq!(outcome.accumulator.answer_text(), "你好, wörld 👋");
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let (outcome, _) = run_lines(vec![
        "data: {\"event\":\n".to_string(),
        frame_line(json!({ "event": "message", "answer": "still " })),
        "data: not json at all\n".to_string(),
        frame_line(json!({ "event": "message", "answer": "here" })),
    ])
    .await;

    assert_eq!(outcome.state, TurnState::Committed);
    assert_eq!(outcome.accumulator.answer_text(), "still here");
}

#[tokio::test]
async fn test_frame_split_across_chunks() {
    let (outcome, snapshots) = run_lines(vec![
        "data: {\"event\":\"mess".to_string(),
        "age\",\"answer\":\"joined\"}\n".to_string(),
        "\n".to_string(),
    ])
    .await;

    assert_eq!(outcome.accumulator.answer_text(), "joined");
    assert_eq!(snapshots.len(), 2);
}

#[tokio::test]
async fn test_unterminated_last_line_is_flushed() {
    let (outcome, _) = run_lines(vec![
        "data: {\"event\":\"message\",\"answer\":\"tail\"}".to_string(),
    ])
    .await;

    assert_eq!(outcome.accumulator.answer_text(), "tail");
}

#[tokio::test]
async fn test_unknown_events_are_ignored() {
    let (outcome, snapshots) = run_lines(vec![
        frame_line(json!({ "event": "ping" })),
        frame_line(json!({ "event": "node_started", "data": { "outputs": {} } })),
        "event: message\n".to_string(),
        frame_line(json!({ "event": "message", "answer": "" })),
    ])
    .await;

    assert_eq!(outcome.accumulator.answer_text(), "");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state, TurnState::Committed);
}

#[tokio::test]
async fn test_transport_failure_marks_turn_failed() {
    let (reconciler, rx) = setup();
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(frame_line(json!({ "event": "message", "answer": "Hello " })).into_bytes()),
        Ok(frame_line(json!({ "event": "message", "answer": "wor" })).into_bytes()),
        Err(std::io::Error::other("connection reset")),
        Ok(frame_line(json!({ "event": "message", "answer": "ld" })).into_bytes()),
    ];

    let outcome = reconciler
        .run(futures::stream::iter(chunks), &CancellationToken::new())
        .await;
    let snapshots = collect_snapshots(rx).await;

    assert_eq!(outcome.state, TurnState::Failed);
    assert!(outcome.accumulator.answer_text().starts_with("Error:"));
    assert!(outcome.accumulator.answer_text().contains("connection reset"));
    assert!(!outcome.accumulator.answer_text().contains("Hello wor"));

    let terminal = snapshots
        .iter()
        .filter(|snapshot| snapshot.state.is_terminal())
        .count();
    assert_eq!(terminal, 1);
    assert_eq!(snapshots[1].answer_text, "Hello wor");
    assert_eq!(snapshots.last().map(|s| s.state), Some(TurnState::Failed));
}

#[tokio::test]
async fn test_fail_before_streaming() {
    let (reconciler, rx) = setup();
    let outcome = reconciler.fail("HTTP error! status: 502").await;
    let snapshots = collect_snapshots(rx).await;

    assert_eq!(outcome.state, TurnState::Failed);
    assert_eq!(
        outcome.accumulator.answer_text(),
        "Error: HTTP error! status: 502"
    );
    assert_eq!(snapshots.len(), 1);
}

#[tokio::test]
async fn test_cancelled_turn_stops_folding() {
    let (reconciler, rx) = setup();
    let cancel = CancellationToken::new();
    let first = frame_line(json!({ "event": "message", "answer": "before" })).into_bytes();

    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(first)])
        .chain(futures::stream::pending());

    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { reconciler.run(stream, &cancel_clone).await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();
    let outcome = handle.await.expect("reconciler task panicked");
    let snapshots = collect_snapshots(rx).await;

    assert_eq!(outcome.state, TurnState::Cancelled);
    assert_eq!(outcome.accumulator.answer_text(), "before");
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].state, TurnState::Cancelled);
}

#[test]
fn test_unwrap_answer() {
    assert_eq!(unwrap_answer("plain"), ("plain".to_string(), None));
    assert_eq!(unwrap_answer("42"), ("42".to_string(), None));
    assert_eq!(
        unwrap_answer("{\"llm_response\":\"\"}"),
        ("{\"llm_response\":\"\"}".to_string(), None)
    );

    let (text, context) = unwrap_answer("{\"llm_response\":\"hi\",\"rag\":\"not a list\"}");
    assert_eq!(text, "hi");
    assert_eq!(context, None);
}

#[test]
fn test_fold_message_end_is_not_observable() {
    let (mut reconciler, _rx) = setup();
    let frame = StreamFrame::from_json("{\"event\":\"message_end\"}").expect("parse frame");
    assert_eq!(reconciler.fold(&frame), false);
    assert!(reconciler.accumulator().ended());
    assert_eq!(reconciler.state(), TurnState::Idle);
}
