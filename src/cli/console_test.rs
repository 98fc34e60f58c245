use std::sync::Mutex;

use futures::StreamExt;

use super::*;
use crate::api::MockApi;
use crate::models::TurnState;
use crate::storage::ConversationBook;
use crate::storage::memory::Memory;

/// Writer whose content stays readable after the console took it.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        let bytes = self.0.lock().expect("buffer lock").clone();
        String::from_utf8(bytes).expect("Invalid utf-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn console(api: MockApi, out: SharedBuffer) -> ChatConsole<SharedBuffer> {
    let book = Arc::new(ConversationBook::new(Arc::new(Memory::new())));
    ChatConsole::new(ChatService::new(Arc::new(api), book), 4, out)
}

fn never() -> impl Future<Output = std::io::Result<()>> {
    futures::future::pending()
}

async fn after_millis(ms: u64) -> std::io::Result<()> {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    Ok(())
}

fn partial_then_stall() -> crate::api::ByteStream {
    let first = futures::stream::iter(vec![Ok(
        b"data: {\"event\":\"message\",\"answer\":\"partial\"}\n\n".to_vec(),
    )]);
    first.chain(futures::stream::pending()).boxed()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_output_is_complete_before_next_prompt() {
    let mut api = MockApi::new();
    api.expect_chat_stream().times(1).returning(|_, _| {
        let body = [
            r#"data: {"event":"message","answer":"Hello"}"#,
            r#"data: {"event":"node_finished","data":{"outputs":{"result":[{"content":"passage","metadata":{"segment_id":"seg-1"}}]}}}"#,
            r#"data: {"event":"message_end","conversation_id":"s-1"}"#,
            "",
        ]
        .join("\n");
        Ok(futures::stream::iter(vec![Ok(body.into_bytes())]).boxed())
    });

    let out = SharedBuffer::default();
    let mut console = console(api, out.clone());

    let outcome = console
        .send("1", "hi", never())
        .await
        .expect("Failed to send");
    assert_eq!(outcome.state, TurnState::Committed);

    // The next prompt goes to the same terminal right after the turn
    let mut prompt = out.clone();
    prompt.write_all(b"> ").expect("write prompt");

    assert_eq!(
        out.text(),
        "Hello\nSources:\n  [1] seg-1: passage\n> "
    );
}

#[tokio::test]
async fn test_interrupt_cancels_pending_turn() {
    let mut api = MockApi::new();
    api.expect_chat_stream()
        .times(1)
        .returning(|_, _| Ok(partial_then_stall()));

    let out = SharedBuffer::default();
    let mut console = console(api, out.clone());

    let outcome = console
        .send("1", "hi", after_millis(50))
        .await
        .expect("Failed to send");

    assert_eq!(outcome.state, TurnState::Cancelled);
    assert_eq!(outcome.accumulator.answer_text(), "partial");
    assert_eq!(out.text(), "partial\n[cancelled]\n");

    // The partial answer is committed once, as the cancelled turn
    let convo = console
        .service
        .book()
        .get("1")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(convo.len(), 2);
    assert_eq!(convo.messages()[1].text(), "partial");
}

#[tokio::test]
async fn test_interrupt_works_on_every_turn() {
    let mut api = MockApi::new();
    api.expect_chat_stream()
        .times(2)
        .returning(|_, _| Ok(partial_then_stall()));

    let out = SharedBuffer::default();
    let mut console = console(api, out.clone());

    for message in ["one", "two"] {
        let outcome = console
            .send("1", message, after_millis(20))
            .await
            .expect("Failed to send");
        assert_eq!(outcome.state, TurnState::Cancelled);
    }
    assert_eq!(out.text(), "partial\n[cancelled]\npartial\n[cancelled]\n");
}

#[tokio::test]
async fn test_read_or_interrupt() {
    let line = read_or_interrupt(async { Ok::<_, eyre::Report>(Some("hello".to_string())) }, never())
        .await
        .expect("read");
    assert_eq!(line.as_deref(), Some("hello"));

    let stalled = futures::future::pending::<Result<Option<String>>>();
    let line = read_or_interrupt(stalled, after_millis(10))
        .await
        .expect("interrupted read");
    assert_eq!(line, None);

    let stalled = futures::future::pending::<Result<Option<String>>>();
    let failed = async { Err::<(), _>(std::io::Error::other("no signal handler")) };
    assert!(read_or_interrupt(stalled, failed).await.is_err());
}
