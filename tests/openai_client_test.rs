use mockito::Matcher;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use workflow_agent_rs::{
    ActionType, Agent, AgentConfig, AgentError, AgentStatus, InMemoryToolRegistry, LlmClient,
    LlmQuery, Message, OpenAIClient, ResponseFormat, ToolDescriptor,
};

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn client_for(server: &mockito::Server) -> OpenAIClient {
    OpenAIClient::new("test-key")
        .with_base_url(server.url())
        .with_model("test-model")
        .with_initial_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn test_text_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "What is 2 + 2?"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("4"))
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client
        .complete(LlmQuery::new(vec![Message::user("What is 2 + 2?")]))
        .await
        .unwrap();

    assert_eq!(response.response_message, "4");
    assert!(response.tool_calls.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_planning_query_requests_json_object() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "response_format": {"type": "json_object"}
        })))
        .with_status(200)
        .with_body(completion(r#"[{"action_type": "chat", "action": "Solve", "tool_use": []}]"#))
        .create_async()
        .await;

    let client = client_for(&server);
    let query = LlmQuery::new(vec![Message::system("plan"), Message::user("Solve x + 1 = 2")])
        .with_response_format(ResponseFormat::Json);
    let response = client.complete(query).await.unwrap();

    assert!(response.response_message.starts_with('['));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_tool_step_offers_tools() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"tool_choice": "auto"})))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "arxiv", "arguments": "{\"query\":\"difference of squares\"}"}
                        }]
                    }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let tool = ToolDescriptor::new("demo_author/arxiv", "search", json!({"type": "object"}));
    let query = LlmQuery::new(vec![Message::user("search")])
        .with_tools(Some(vec![tool]))
        .with_action_type(ActionType::ToolUse);
    let response = client.complete(query).await.unwrap();

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "arxiv");
    assert_eq!(
        response.tool_calls[0].arguments,
        json!({"query": "difference of squares"})
    );
    assert!(response.response_message.contains("difference of squares"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body(json!({"error": {"message": "overloaded"}}).to_string())
        .expect(4)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .complete(LlmQuery::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Http(ref message) if message.contains("overloaded")));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(json!({"error": {"message": "slow down"}}).to_string())
        .expect(4)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .complete(LlmQuery::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::RateLimit { retry_after: 1 }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body(json!({"error": {"message": "unknown model"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .complete(LlmQuery::new(vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "HTTP_ERROR");
    assert!(err.to_string().contains("unknown model"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_agent_run_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(completion("x = 2 or x = -2"))
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server);
    let agent = Agent::new("Solve x^2 - 4 = 0", AgentConfig::default(), Arc::new(client))
        .with_tool_registry(Arc::new(InMemoryToolRegistry::with_defaults()));

    let outcome = agent.run().await;

    assert_eq!(outcome.status, AgentStatus::Completed);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.result, "x = 2 or x = -2");
    mock.assert_async().await;
}
