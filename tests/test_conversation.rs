//! Conversation controller wired to the GigaChat client and a mock server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::{MockGigaChat, Script};
use gigapost_bot::llm::providers::gigachat::GigaChatClient;
use gigapost_bot::llm::{FAILURE_MARKER, Generator};
use gigapost_bot::subsystems::conversation::{
    ConversationController, IN_PROGRESS, Inbound, Outbound, SUCCESS_HEADER, SessionState,
    SessionStore, TOPIC_PROMPT, TopicPrecedence, welcome_text,
};

const POST: &str = "🍁 Autumn Sale!\n...";

fn controller(mock: &MockGigaChat) -> ConversationController {
    ConversationController::new(
        Arc::new(SessionStore::new()),
        Generator::GigaChat(mock.client()),
        TopicPrecedence::Literal,
    )
}

fn message(chat_id: i64, text: &str) -> Inbound {
    Inbound {
        chat_id,
        sender_name: Some("Ivan".into()),
        text: Some(text.into()),
        bot_username: Some("gigapost_bot".into()),
    }
}

async fn send(c: &ConversationController, msg: Inbound) -> Vec<Outbound> {
    let (tx, mut rx) = mpsc::channel(16);
    c.handle(msg, &tx).await;
    drop(tx);
    let mut out = Vec::new();
    while let Some(o) = rx.recv().await {
        out.push(o);
    }
    out
}

#[tokio::test]
async fn autumn_sale_end_to_end() {
    let mock = MockGigaChat::spawn(Script::ok(POST)).await;
    let c = controller(&mock);

    let prompt = send(&c, message(42, "/post")).await;
    assert_eq!(prompt[0].text, TOPIC_PROMPT);
    assert_eq!(mock.auth_calls(), 0);
    assert_eq!(mock.completion_calls(), 0);

    let replies = send(&c, message(42, "autumn sale")).await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, IN_PROGRESS);
    assert_eq!(replies[1].text, format!("{SUCCESS_HEADER}{POST}"));
    assert!(replies.iter().all(|r| r.chat_id == 42));

    assert_eq!(mock.completion_calls(), 1);
    assert_eq!(c.sessions().state(42), Some(SessionState::Idle));
}

#[tokio::test]
async fn auth_401_reaches_user_and_resets() {
    let mock = MockGigaChat::spawn(Script::ok(POST).auth(401, "{}")).await;
    let c = controller(&mock);

    send(&c, message(7, "/post")).await;
    let replies = send(&c, message(7, "autumn sale")).await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, IN_PROGRESS);
    assert!(replies[1].text.starts_with(FAILURE_MARKER));
    assert!(replies[1].text.contains("401"));
    assert_eq!(mock.auth_calls(), 1);
    assert_eq!(mock.completion_calls(), 0);
    assert_eq!(c.sessions().state(7), Some(SessionState::Idle));
}

#[tokio::test]
async fn completion_failure_resets_state() {
    let mock = MockGigaChat::spawn(Script::ok(POST).completion(500, "{}")).await;
    let c = controller(&mock);

    send(&c, message(7, "/post")).await;
    let replies = send(&c, message(7, "autumn sale")).await;

    assert!(replies[1].text.contains("500"));
    assert_eq!(c.sessions().state(7), Some(SessionState::Idle));
}

#[tokio::test]
async fn one_generation_per_topic() {
    let mock = MockGigaChat::spawn(Script::ok(POST)).await;
    let c = controller(&mock);

    send(&c, message(1, "/post")).await;
    send(&c, message(1, "first")).await;
    send(&c, message(1, "second")).await;

    assert_eq!(mock.completion_calls(), 1);
}

#[tokio::test]
async fn concurrent_topics_from_one_chat_generate_once() {
    let mock = MockGigaChat::spawn(Script::ok(POST)).await;
    let c = Arc::new(controller(&mock));

    send(&c, message(1, "/post")).await;
    let a = tokio::spawn({
        let c = c.clone();
        async move { send(&c, message(1, "first")).await }
    });
    let b = tokio::spawn({
        let c = c.clone();
        async move { send(&c, message(1, "second")).await }
    });
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(mock.completion_calls(), 1);
}

#[tokio::test]
async fn chats_get_their_own_posts() {
    let mock = MockGigaChat::spawn(Script::ok(POST)).await;
    let c = controller(&mock);

    send(&c, message(1, "/post")).await;
    send(&c, message(2, "/post")).await;
    let one = send(&c, message(1, "cats")).await;
    let two = send(&c, message(2, "dogs")).await;

    assert!(one[1].text.starts_with(SUCCESS_HEADER));
    assert!(two[1].text.starts_with(SUCCESS_HEADER));
    assert_eq!(mock.completion_calls(), 2);
    let bodies: Vec<String> = mock.completion_requests().into_iter().map(|r| r.body).collect();
    assert!(bodies[0].contains("cats"));
    assert!(bodies[1].contains("dogs"));
}

/// Accepts connections and never answers, so a generation hangs until the
/// client timeout.
async fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}/api/v2/oauth")
}

#[tokio::test]
async fn stalled_generation_does_not_block_other_chats() {
    let mock = MockGigaChat::spawn(Script::ok(POST)).await;
    let mut cfg = mock.config();
    cfg.auth_url = silent_endpoint().await;
    let c = Arc::new(ConversationController::new(
        Arc::new(SessionStore::new()),
        Generator::GigaChat(GigaChatClient::new(&cfg, common::API_KEY.to_string()).unwrap()),
        TopicPrecedence::Literal,
    ));

    send(&c, message(1, "/post")).await;
    let stalled = tokio::spawn({
        let c = c.clone();
        async move { send(&c, message(1, "autumn sale")).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stalled.is_finished());

    let replies = timeout(Duration::from_secs(1), send(&c, message(2, "/start")))
        .await
        .expect("chat 2 was blocked by chat 1");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].chat_id, 2);
    assert_eq!(replies[0].text, welcome_text("Ivan"));

    stalled.abort();
}
