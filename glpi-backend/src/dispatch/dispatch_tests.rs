//! Dispatcher behaviour against a stub gateway and a recording prompter.

use serde_json::json;

use super::*;
use crate::glpi::params;
use crate::testing::{AUTH_FAULT, Harness, fault, ok_json};

fn origin() -> ChatOrigin {
    ChatOrigin::new("100", 100).with_message(55, true)
}

#[tokio::test]
async fn test_session_and_id2name_are_injected() {
    let h = Harness::new(vec![ok_json(json!({"id": 1}))]);
    h.login("100", "tok-1", "ivanov").await;

    let mut extra = params([("ticket", "5"), ("session", "forged")]);
    extra.insert("id2name".to_string(), Value::Bool(false));
    let outcome = h.dispatcher.dispatch(GlpiMethod::GetTicket, &origin(), extra).await;

    assert!(outcome.is_success());
    let sent = h.gateway.last_params().unwrap();
    assert_eq!(sent.get("session"), Some(&Value::str("tok-1")));
    assert_eq!(sent.get("id2name"), Some(&Value::Bool(true)));
    assert_eq!(sent.get("ticket"), Some(&Value::str("5")));
}

#[test]
fn test_request_carries_its_method() {
    let request = RemoteCallRequest::new(
        GlpiMethod::ListTickets,
        Some("tok".to_string()),
        params([("start", "5")]),
    );
    let (method, params) = request.into_call();
    assert_eq!(method, GlpiMethod::ListTickets);
    assert_eq!(params.get("session"), Some(&Value::str("tok")));
    assert_eq!(params.get("start"), Some(&Value::str("5")));
}

#[tokio::test]
async fn test_missing_session_still_calls_without_token() {
    let h = Harness::new(vec![fault(AUTH_FAULT, "session invalid")]);
    let outcome = h
        .dispatcher
        .dispatch(GlpiMethod::GetMyInfo, &origin(), params([("session", "forged")]))
        .await;

    assert_eq!(outcome, RemoteCallOutcome::AuthExpired);
    assert_eq!(h.gateway.call_count(), 1);
    assert!(h.gateway.last_params().unwrap().get("session").is_none());
}

#[tokio::test]
async fn test_auth_fault_prompts_exactly_once_for_any_method() {
    for method in [GlpiMethod::GetTicket, GlpiMethod::ListTickets, GlpiMethod::DoLogout] {
        let h = Harness::new(vec![fault(AUTH_FAULT, "not logged in")]);
        h.login("100", "stale", "ivanov").await;

        let outcome = h.dispatcher.dispatch(method, &origin(), Params::new()).await;

        assert_eq!(outcome, RemoteCallOutcome::AuthExpired);
        let prompts = h.prompter.prompts();
        assert_eq!(prompts.len(), 1, "{:?}", method);
        assert_eq!(prompts[0].0, origin());
        assert_eq!(prompts[0].1.as_deref(), Some("ivanov"));
    }
}

#[tokio::test]
async fn test_successful_logout_returns_success_and_prompts() {
    let h = Harness::new(vec![ok_json(json!({"message": "Bye"}))]);
    h.login("100", "tok", "ivanov").await;

    let outcome = h
        .dispatcher
        .dispatch(GlpiMethod::DoLogout, &origin(), Params::new())
        .await;

    assert!(outcome.is_success());
    assert_eq!(h.prompter.prompts().len(), 1);
}

#[tokio::test]
async fn test_other_fault_is_rejected_without_prompt() {
    let h = Harness::new(vec![fault(11, "Bad filename")]);
    h.login("100", "tok", "ivanov").await;

    let outcome = h
        .dispatcher
        .dispatch(GlpiMethod::AddTicketDocument, &origin(), Params::new())
        .await;

    assert_eq!(
        outcome,
        RemoteCallOutcome::Rejected {
            code: 11,
            message: "Bad filename".to_string()
        }
    );
    assert!(h.prompter.prompts().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_not_retried() {
    let h = Harness::new(vec![Err(RpcError::Transport("timed out".to_string()))]);
    h.login("100", "tok", "ivanov").await;

    let outcome = h
        .dispatcher
        .dispatch(GlpiMethod::Status, &origin(), Params::new())
        .await;

    assert_eq!(outcome, RemoteCallOutcome::TransportError("timed out".to_string()));
    assert_eq!(h.gateway.call_count(), 1);
    assert!(h.prompter.prompts().is_empty());
}

#[tokio::test]
async fn test_store_failure_is_transport_error_without_call() {
    let h = Harness::new(vec![ok_json(json!({}))]);
    h.store.close().await;

    let outcome = h
        .dispatcher
        .dispatch(GlpiMethod::Status, &origin(), Params::new())
        .await;

    assert!(matches!(outcome, RemoteCallOutcome::TransportError(_)));
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_token_read_fresh_on_every_call() {
    let h = Harness::new(vec![ok_json(json!({})), ok_json(json!({}))]);
    h.login("100", "first", "ivanov").await;
    h.dispatcher
        .dispatch(GlpiMethod::Status, &origin(), Params::new())
        .await;

    h.store
        .set_field("100", crate::session::fields::SESSION, "second")
        .await
        .unwrap();
    h.dispatcher
        .dispatch(GlpiMethod::Status, &origin(), Params::new())
        .await;

    let calls = h.gateway.calls();
    assert_eq!(calls[0].1.get("session"), Some(&Value::str("first")));
    assert_eq!(calls[1].1.get("session"), Some(&Value::str("second")));
}

#[tokio::test]
async fn test_dispatcher_does_not_touch_store() {
    let h = Harness::new(vec![ok_json(json!({"message": "Bye"}))]);
    h.login("100", "tok", "ivanov").await;

    h.dispatcher.logout(&origin()).await.unwrap();

    assert_eq!(
        h.store.session_token("100").await.unwrap().as_deref(),
        Some("tok")
    );
}

#[tokio::test]
async fn test_typed_call_decodes_payload() {
    let h = Harness::new(vec![ok_json(json!({
        "id": 9,
        "name": "Printer",
        "followups": [{"id": "2", "content": "a"}, {"id": "10", "content": "b"}],
        "documents": {},
        "events": null
    }))]);
    h.login("100", "tok", "ivanov").await;

    let ticket = h.dispatcher.ticket(&origin(), "9").await.unwrap();

    assert_eq!(ticket.id, "9");
    assert_eq!(ticket.followups_newest_first()[0].id, "10");
    assert!(ticket.documents.is_empty());
    assert!(ticket.events.is_empty());
}

#[tokio::test]
async fn test_typed_call_shape_mismatch_is_decode_error() {
    let h = Harness::new(vec![ok_json(json!(["not", "a", "ticket"]))]);
    h.login("100", "tok", "ivanov").await;

    let err = h.dispatcher.ticket(&origin(), "9").await.unwrap_err();

    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn test_typed_auth_expired_maps_to_error() {
    let h = Harness::new(vec![fault(AUTH_FAULT, "expired")]);
    let err = h.dispatcher.my_info(&origin()).await.unwrap_err();
    assert!(err.is_auth_expired());
    assert_eq!(h.prompter.prompts().len(), 1);
    assert_eq!(h.prompter.prompts()[0].1, None);
}

#[tokio::test]
async fn test_current_tickets_sends_window() {
    let h = Harness::new(vec![ok_json(json!([]))]);
    h.login("100", "tok", "ivanov").await;

    h.dispatcher.current_tickets(&origin(), 10, 5).await.unwrap();

    let sent = h.gateway.last_params().unwrap();
    assert_eq!(sent.get("start"), Some(&Value::Int(10)));
    assert_eq!(sent.get("limit"), Some(&Value::Int(5)));
    assert_eq!(sent.get("status"), Some(&Value::str("notold")));
}

#[test]
fn test_editable_message_only_when_bot_authored() {
    let from_bot = ChatOrigin::new("1", 1).with_message(3, true);
    let from_user = ChatOrigin::new("1", 1).with_message(3, false);
    assert_eq!(from_bot.editable_message(), Some(3));
    assert_eq!(from_user.editable_message(), None);
}
