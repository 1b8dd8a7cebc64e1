//! Unit tests for Langbase API types.

use super::*;

#[test]
fn test_message_system() {
    let msg = Message::system("You extract arguments");
    assert!(matches!(msg.role, MessageRole::System));
    assert_eq!(msg.content, "You extract arguments");
}

#[test]
fn test_message_user() {
    let msg = Message::user("1. [Section 3] I support this");
    assert!(matches!(msg.role, MessageRole::User));
    assert_eq!(msg.content, "1. [Section 3] I support this");
}

#[test]
fn test_message_role_serializes_lowercase() {
    let json = serde_json::to_value(Message::system("x")).unwrap();
    assert_eq!(json["role"], "system");
}

#[test]
fn test_pipe_request_new_disables_streaming() {
    let req = PipeRequest::new("argument-extraction-v1", vec![Message::user("test")]);
    assert_eq!(req.name, "argument-extraction-v1");
    assert_eq!(req.messages.len(), 1);
    assert!(!req.stream);

    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["stream"], false);
}

#[test]
fn test_pipe_response_deserialize_minimal() {
    let json = r#"{"success": true, "completion": "[]", "threadId": null}"#;
    let resp: PipeResponse = serde_json::from_str(json).unwrap();
    assert!(resp.success);
    assert_eq!(resp.completion, "[]");
    assert!(resp.thread_id.is_none());
    assert!(resp.raw.is_none());
}

#[test]
fn test_pipe_response_deserialize_with_usage() {
    let json = r#"{
        "success": true,
        "completion": "[]",
        "threadId": "t-1",
        "raw": {"model": "gpt-4o-mini", "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}}
    }"#;
    let resp: PipeResponse = serde_json::from_str(json).unwrap();
    let usage = resp.raw.unwrap().usage.unwrap();
    assert_eq!(usage.total_tokens, Some(12));
}

#[test]
fn test_create_pipe_request_new() {
    let req = CreatePipeRequest::new("my-pipe");
    assert_eq!(req.name, "my-pipe");
    assert!(req.description.is_none());
    assert!(req.status.is_none());
    assert!(req.model.is_none());
}

#[test]
fn test_create_pipe_request_builder_skips_unset_fields() {
    let req = CreatePipeRequest::new("argument-extraction-v1")
        .with_description("Argument mining")
        .with_status(PipeStatus::Private)
        .with_model("openai:gpt-4o-mini")
        .with_upsert(true)
        .with_json_output(true)
        .with_temperature(0.2)
        .with_max_tokens(4000)
        .with_messages(vec![Message::system("prompt")]);

    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["status"], "private");
    assert_eq!(json["upsert"], true);
    assert_eq!(json["max_tokens"], 4000);
    assert_eq!(json["messages"].as_array().unwrap().len(), 1);

    let bare = serde_json::to_value(CreatePipeRequest::new("x")).unwrap();
    assert!(bare.get("description").is_none());
    assert!(bare.get("temperature").is_none());
}
