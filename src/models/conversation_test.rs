use super::*;

#[test]
fn test_new_conversation() {
    let convo = Conversation::new("3");
    assert_eq!(convo.id(), "3");
    assert_eq!(convo.title(), "New conversation 3");
    assert!(convo.is_empty());
    assert_eq!(convo.session_id(), None);
}

#[test]
fn test_derive_title() {
    assert_eq!(derive_title("short"), "short...");
    assert_eq!(
        derive_title("What is retrieval augmented generation?"),
        "What is retrieval au..."
    );
    // Characters, not bytes
    assert_eq!(derive_title("检索增强生成是什么呢检索增强生成是什么呢检索"), "检索增强生成是什么呢检索增强生成是什么呢...");
}

#[test]
fn test_associate_session_only_once() {
    let mut convo = Conversation::new("1");
    convo.append_message(Message::new_user("How do I reset my password please?"));
    convo.append_message(Message::new_bot("Open settings."));

    assert_eq!(convo.associate_session("remote-1"), true);
    assert_eq!(convo.session_id(), Some("remote-1"));
    assert_eq!(convo.title(), "How do I reset my pa...");
    assert_eq!(convo.id(), "1");

    convo.set_retrieved_context(vec![]);
    assert_eq!(convo.associate_session("remote-2"), false);
    assert_eq!(convo.session_id(), Some("remote-1"));
}

#[test]
fn test_associate_session_without_messages_keeps_title() {
    let mut convo = Conversation::new("2");
    assert_eq!(convo.associate_session("remote"), true);
    assert_eq!(convo.title(), "New conversation 2");
}

#[test]
fn test_message_mut() {
    let bot = Message::new_bot("");
    let bot_id = bot.id().to_string();
    let mut convo = Conversation::new("1").with_messages(vec![Message::new_user("hi"), bot]);

    convo
        .message_mut(&bot_id)
        .expect("bot message should exist")
        .set_text("hello");
    assert_eq!(convo.messages()[1].text(), "hello");
    assert!(convo.message_mut("missing").is_none());
}

#[test]
fn test_serde_layout() {
    let convo = Conversation::new("1")
        .with_session_id("remote")
        .with_messages(vec![Message::new_user("hi").with_id("m1")]);
    let value = serde_json::to_value(&convo).expect("failed to serialize");
    assert_eq!(value["sessionId"], "remote");
    assert_eq!(value["messages"][0]["sender"], "user");
    assert_eq!(value["messages"][0]["id"], "m1");
    assert!(value["retrievedContext"].as_array().is_some());

    let back: Conversation = serde_json::from_value(value).expect("failed to deserialize");
    assert_eq!(back, convo);
}
