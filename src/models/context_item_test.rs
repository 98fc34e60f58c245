use serde_json::json;

use super::*;

#[test]
fn test_from_value_prefers_segment_id() {
    let value = json!({
        "id": "doc-1",
        "metadata": { "segment_id": "seg-9", "score": 0.8 },
        "content": "passage",
    });
    let item = ContextItem::from_value(&value, 0);
    assert_eq!(item.id, "seg-9");
    assert_eq!(item.content, "passage");
    assert_eq!(item.metadata.get("score"), Some(&json!(0.8)));
}

#[test]
fn test_from_value_fallbacks() {
    let item = ContextItem::from_value(&json!({ "id": 42, "text": "from text" }), 3);
    assert_eq!(item.id, "42");
    assert_eq!(item.content, "from text");
    assert!(item.metadata.is_empty());

    let item = ContextItem::from_value(&json!({ "content": "", "title": "A title" }), 3);
    assert_eq!(item.id, "result-3");
    assert_eq!(item.content, "A title");

    let item = ContextItem::from_value(&json!("not an object"), 1);
    assert_eq!(item.id, "result-1");
    assert_eq!(item.content, "");
}

#[test]
fn test_from_list_keeps_order_and_duplicates() {
    let values = vec![
        json!({ "metadata": { "segment_id": "a" }, "content": "C1" }),
        json!({ "metadata": { "segment_id": "a" }, "content": "C1" }),
        json!({ "content": "C3" }),
    ];
    let items = ContextItem::from_list(&values);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, "a");
    assert_eq!(items[1].id, "a");
    assert_eq!(items[2].id, "result-2");
}
