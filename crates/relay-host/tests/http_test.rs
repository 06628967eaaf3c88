use httpmock::prelude::*;
use relay_host::{
  ConnectedAccount, ConnectionDirectory, HostError, HttpConnectionDirectory, HttpToolExecutor,
  ToolExecution, ToolExecutor, ToolInvocation,
};
use serde_json::json;

fn invocation() -> ToolInvocation {
  ToolInvocation {
    arguments: json!({"to": "a@b.com", "body": "hello"}),
    authorized_account_id: Some("acc_1".to_string()),
    caller_id: "user_1".to_string(),
  }
}

#[tokio::test]
async fn test_tool_execution_wire_shape() {
  let server = MockServer::start_async().await;
  let mock = server
    .mock_async(|when, then| {
      when
        .method(POST)
        .path("/tools/GMAIL_SEND/execute")
        .header("x-api-key", "secret")
        .json_body(json!({
          "arguments": {"to": "a@b.com", "body": "hello"},
          "authorizedAccountId": "acc_1",
          "callerId": "user_1"
        }));
      then
        .status(200)
        .json_body(json!({"successful": true, "data": {"messageId": "m1"}}));
    })
    .await;

  let executor = HttpToolExecutor::new(&server.base_url(), Some("secret".to_string())).unwrap();
  let result = executor.execute("GMAIL_SEND", invocation()).await.unwrap();

  assert_eq!(result, ToolExecution::success(json!({"messageId": "m1"})));
  mock.assert_async().await;
}

#[tokio::test]
async fn test_tool_failure_is_reported_not_raised() {
  let server = MockServer::start_async().await;
  server
    .mock_async(|when, then| {
      when.method(POST).path("/tools/GMAIL_SEND/execute");
      then
        .status(200)
        .json_body(json!({"successful": false, "error": "quota exceeded"}));
    })
    .await;

  let executor = HttpToolExecutor::new(&server.base_url(), None).unwrap();
  let result = executor.execute("GMAIL_SEND", invocation()).await.unwrap();

  assert!(!result.successful);
  assert_eq!(result.error.as_deref(), Some("quota exceeded"));
  assert!(result.data.is_none());
}

#[tokio::test]
async fn test_server_error_status() {
  let server = MockServer::start_async().await;
  server
    .mock_async(|when, then| {
      when.method(POST).path("/tools/BROKEN/execute");
      then.status(502).body("bad gateway");
    })
    .await;

  let executor = HttpToolExecutor::new(&server.base_url(), None).unwrap();
  let err = executor.execute("BROKEN", invocation()).await.unwrap_err();

  match err {
    HostError::Status { status, body, .. } => {
      assert_eq!(status, 502);
      assert_eq!(body, "bad gateway");
    }
    other => panic!("expected status error, got {other:?}"),
  }
}

#[tokio::test]
async fn test_connection_listing() {
  let server = MockServer::start_async().await;
  let mock = server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/connections")
        .query_param("caller_id", "user_1");
      then.status(200).json_body(json!([
        {"toolkitSlug": "gmail", "status": "ACTIVE", "accountId": "acc_1"},
        {"toolkitSlug": "slack", "status": "EXPIRED", "accountId": "acc_2"}
      ]));
    })
    .await;

  let directory = HttpConnectionDirectory::new(&server.base_url(), None).unwrap();
  let accounts = directory.list("user_1").await.unwrap();

  assert_eq!(
    accounts,
    vec![
      ConnectedAccount::active("gmail", "acc_1"),
      ConnectedAccount::new("slack", "EXPIRED", "acc_2"),
    ]
  );
  mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_listing_is_a_decode_error() {
  let server = MockServer::start_async().await;
  server
    .mock_async(|when, then| {
      when.method(GET).path("/connections");
      then.status(200).body("not json");
    })
    .await;

  let directory = HttpConnectionDirectory::new(&server.base_url(), None).unwrap();
  let err = directory.list("user_1").await.unwrap_err();

  assert!(matches!(err, HostError::Decode { .. }));
}
