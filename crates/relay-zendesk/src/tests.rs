//! Tests for the Zendesk adapter against a mock HTTP server.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use httpmock::prelude::*;
use serde_json::json;

use super::*;
use relay_core::domain::UserId;

fn test_config(base_url: &str) -> ZendeskConfig {
    ZendeskConfig {
        subdomain: "acme".to_string(),
        email: "ops@acme.test".to_string(),
        api_token: "tok".to_string(),
        group_id: Some(77),
        tags: vec!["from_telegram".to_string(), "auto_created".to_string()],
        requester_email_domain: "yourcompany.fake".to_string(),
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(2),
        max_concurrency: 2,
        retry: RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40)),
        default_retry_after: Duration::from_millis(100),
        max_retry_after: Duration::from_secs(30),
    }
}

fn new_ticket() -> NewTicket {
    NewTicket {
        subject: "[Telegram] Login".to_string(),
        description: "Message: cannot login".to_string(),
        requester_name: "Ann Lee".to_string(),
        requester_external_id: UserId(7),
    }
}

#[test]
fn payload_carries_synthetic_requester_tags_and_group() {
    let client = ZendeskClient::new(test_config("http://localhost")).unwrap();
    let payload = client.ticket_payload(&new_ticket());
    assert_eq!(
        payload,
        json!({
            "ticket": {
                "subject": "[Telegram] Login",
                "comment": { "body": "Message: cannot login" },
                "requester": { "name": "Ann Lee", "email": "telegram-7@yourcompany.fake" },
                "tags": ["from_telegram", "auto_created"],
                "group_id": 77
            }
        })
    );

    let mut cfg = test_config("http://localhost");
    cfg.group_id = None;
    let payload = ZendeskClient::new(cfg).unwrap().ticket_payload(&new_ticket());
    assert!(payload["ticket"].get("group_id").is_none());
}

#[test]
fn retry_after_header_is_parsed_and_capped() {
    let mut headers = HeaderMap::new();
    let default = Duration::from_secs(5);
    let cap = Duration::from_secs(30);
    assert_eq!(retry_after(&headers, default, cap), default);

    headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
    assert_eq!(retry_after(&headers, default, cap), Duration::from_secs(7));

    headers.insert(reqwest::header::RETRY_AFTER, "600".parse().unwrap());
    assert_eq!(retry_after(&headers, default, cap), cap);

    headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
    assert_eq!(retry_after(&headers, default, cap), default);
}

#[tokio::test]
async fn create_ticket_returns_id_and_agent_url() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v2/tickets.json")
                .header_exists("authorization")
                .body_includes("telegram-7@yourcompany.fake");
            then.status(201).json_body(json!({ "ticket": { "id": 321, "status": "new", "requester_id": 9 } }));
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    let created = client.create_ticket(new_ticket()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(created.id, TicketId(321));
    assert_eq!(created.url, "https://acme.zendesk.com/agent/tickets/321");
}

#[tokio::test]
async fn rate_limited_create_waits_then_succeeds() {
    let server = MockServer::start_async().await;
    let limited = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v2/tickets.json");
            then.status(429).header("Retry-After", "1");
        })
        .await;

    let client = Arc::new(ZendeskClient::new(test_config(&server.base_url())).unwrap());
    let started = Instant::now();
    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.create_ticket(new_ticket()).await })
    };

    // Swap in the success response while the client sits out Retry-After.
    while limited.calls_async().await == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    limited.delete_async().await;
    let ok = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v2/tickets.json");
            then.status(201).json_body(json!({ "ticket": { "id": 5, "requester_id": 9 } }));
        })
        .await;

    let created = task.await.unwrap();
    assert_eq!(created.map(|t| t.id), Some(TicketId(5)));
    assert!(started.elapsed() >= Duration::from_secs(1));
    ok.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_ticket_is_not_found_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/404.json");
            then.status(404).json_body(json!({ "error": "RecordNotFound" }));
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    assert_eq!(client.ticket_info(TicketId(404)).await, TicketLookup::NotFound);
    mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v2/tickets.json");
            then.status(422).body("invalid requester");
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    assert!(client.create_ticket(new_ticket()).await.is_none());
    mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn server_errors_are_unavailable_not_vanished() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/8.json");
            then.status(503);
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    assert_eq!(client.ticket_info(TicketId(8)).await, TicketLookup::Unavailable);
}

#[tokio::test]
async fn transport_failures_are_retried_then_reported_absent() {
    // Nothing listens on port 9 (discard) on test hosts.
    let client = ZendeskClient::new(test_config("http://127.0.0.1:9")).unwrap();
    assert!(client.ticket_comments(TicketId(1)).await.is_none());
    assert_eq!(client.ticket_info(TicketId(1)).await, TicketLookup::Unavailable);
}

#[tokio::test]
async fn ticket_info_maps_status_and_requester() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/12.json");
            then.status(200).json_body(json!({
                "ticket": { "id": 12, "status": "solved", "requester_id": 500, "subject": "x" }
            }));
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    let TicketLookup::Found(snapshot) = client.ticket_info(TicketId(12)).await else {
        panic!("expected ticket");
    };
    assert_eq!(snapshot.status, TicketStatus::Solved);
    assert!(snapshot.status.is_terminal());
    assert_eq!(snapshot.requester_id, 500);
}

#[tokio::test]
async fn comments_follow_pagination_in_order() {
    let server = MockServer::start_async().await;
    let next = server.url("/api/v2/tickets/3/comments/page-2.json");
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/3/comments/page-2.json");
            then.status(200).json_body(json!({
                "comments": [{ "id": 3, "author_id": 900, "body": "third" }],
                "next_page": null
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/3/comments.json");
            then.status(200).json_body(json!({
                "comments": [
                    { "id": 1, "author_id": 500, "body": "first" },
                    { "id": 2, "author_id": 900, "body": "second" }
                ],
                "next_page": next
            }));
        })
        .await;

    let client = ZendeskClient::new(test_config(&server.base_url())).unwrap();
    let comments = client.ticket_comments(TicketId(3)).await.unwrap();
    let ids: Vec<u64> = comments.iter().map(|c| c.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(comments[2].body, "third");
}

#[tokio::test]
async fn at_most_two_requests_in_flight() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/tickets/1.json");
            then.status(200)
                .delay(Duration::from_millis(300))
                .json_body(json!({ "ticket": { "id": 1, "status": "open", "requester_id": 2 } }));
        })
        .await;

    let client = Arc::new(ZendeskClient::new(test_config(&server.base_url())).unwrap());
    let started = Instant::now();
    let calls: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.ticket_info(TicketId(1)).await })
        })
        .collect();
    for call in calls {
        assert!(matches!(call.await.unwrap(), TicketLookup::Found(_)));
    }
    // Four 300ms requests through a gate of two take two rounds.
    assert!(started.elapsed() >= Duration::from_millis(600));
}
