mod common;

use std::sync::atomic::Ordering;

use chameleon_lib::host::WindowSpec;
use chameleon_lib::models::{Message, ReviewPayload, SourcePayload};
use chameleon_lib::page::{ApplyOutcome, Boundary};
use chameleon_lib::services::store;
use chameleon_lib::CoordinatorPort;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{compose_page, harness, Harness};

fn completion(content: &str) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

async fn with_key(h: &Harness) {
    store::save_credentials(&*h.store, "sk-test", "gpt-5-mini")
        .await
        .unwrap();
}

#[tokio::test]
async fn single_rewrite_returns_text_and_subject() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"subject":"File Request","body":"Hello,\n\nCould you send the file?"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    with_key(&h).await;

    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": { "text": "hey can u send the file", "tone": "formal" }
        }))
        .await;

    assert!(response.ok, "{:?}", response.error);
    assert_eq!(
        response.data,
        Some(json!({ "text": "Hello,\n\nCould you send the file?", "subject": "File Request" }))
    );
}

#[tokio::test]
async fn missing_key_opens_settings_without_calling_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": { "text": "hello" }
        }))
        .await;

    assert!(!response.ok);
    assert_eq!(response.error_code(), Some("NO_API_KEY"));
    assert_eq!(h.host.settings_opened(), 1);
}

#[tokio::test]
async fn rate_limited_service_reports_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    with_key(&h).await;
    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": { "text": "hello" }
        }))
        .await;

    assert!(!response.ok);
    assert_eq!(response.error_code(), Some("RATE_LIMIT"));
}

#[tokio::test]
async fn apply_reinjects_agent_when_tab_has_none() {
    let h = harness(None);
    let (doc, region, _) = compose_page("");
    h.host.open_tab(7, doc, false);

    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REQUEST_APPLY_REWRITE",
            "payload": { "text": "Could you please send the file?" }
        }))
        .await;

    assert!(response.ok, "{:?}", response.error);
    assert_eq!(h.host.injections(), 1);
    let content = h.host.with_tab(7, |tab| tab.doc.text_content(region));
    assert_eq!(content, "Could you please send the file?");
}

#[tokio::test]
async fn apply_fails_when_reinjection_fails() {
    let h = harness(None);
    let (doc, region, _) = compose_page("draft");
    h.host.open_tab(3, doc, false);
    h.host.fail_injection.store(true, Ordering::SeqCst);

    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REQUEST_APPLY_REWRITE",
            "payload": { "text": "anything", "tabId": 3 }
        }))
        .await;

    assert!(!response.ok);
    assert_eq!(response.error_code(), Some("INJECT_OR_SEND_FAILED"));
    assert_eq!(h.host.injections(), 1);
    let content = h.host.with_tab(3, |tab| tab.doc.text_content(region));
    assert_eq!(content, "draft");
}

#[tokio::test]
async fn apply_reports_agent_refusal() {
    let h = harness(None);
    let (doc, _, _) = compose_page("draft");
    h.host.open_tab(4, doc, true);
    *h.host.agent_reply.lock().unwrap() = Some(chameleon_lib::models::Response::failure("READ_ONLY"));

    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REQUEST_APPLY_REWRITE",
            "payload": { "text": "anything" }
        }))
        .await;

    assert!(!response.ok);
    assert_eq!(response.error_code(), Some("HOST_ERROR"));
    assert!(response.error.unwrap().contains("READ_ONLY"));
    assert_eq!(h.host.injections(), 0);
}

#[tokio::test]
async fn apply_without_any_tab_reports_no_active_tab() {
    let h = harness(None);
    let response = h
        .router
        .send(Message::RequestApplyRewrite(chameleon_lib::models::ApplyPayload {
            text: "x".into(),
            tab_id: None,
        }))
        .await;
    assert_eq!(response.error_code(), Some("NO_ACTIVE_TAB"));
}

#[tokio::test]
async fn compare_with_prose_answer_uses_raw_text_per_tone() {
    let raw = "Here are your rewrites, sorry no JSON today.";
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(raw)))
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    with_key(&h).await;
    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": {
                "text": "hey can u send the file",
                "compareTones": true,
                "tonesForCompare": ["casual", "formal"]
            }
        }))
        .await;

    assert!(response.ok, "{:?}", response.error);
    assert_eq!(
        response.data,
        Some(json!({
            "compare": [
                { "tone": "casual", "text": raw },
                { "tone": "formal", "text": raw }
            ]
        }))
    );
}

#[tokio::test]
async fn compare_without_tones_uses_default_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"[{"tone":"formal","text":"Dear team"},{"tone":"casual","text":"hey all"}]"#,
        )))
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    with_key(&h).await;
    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": { "text": "hi team", "compareTones": true }
        }))
        .await;

    let compare = response.data.unwrap()["compare"].as_array().unwrap().clone();
    assert_eq!(compare.len(), 5);
    assert_eq!(compare[0], json!({ "tone": "casual", "text": "hey all" }));
    assert_eq!(compare[1], json!({ "tone": "formal", "text": "Dear team" }));
}

#[tokio::test]
async fn compare_with_blank_tone_is_invalid() {
    let h = harness(None);
    with_key(&h).await;
    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REWRITE_TEXT",
            "payload": {
                "text": "hi team",
                "compareTones": true,
                "tonesForCompare": ["casual", ""]
            }
        }))
        .await;
    assert_eq!(response.error_code(), Some("INVALID_PAYLOAD"));
}

#[tokio::test]
async fn last_source_round_trips_and_overwrites() {
    let h = harness(None);
    let empty = h.router.send(Message::GetLastSource).await;
    assert_eq!(empty.data, Some(json!({ "text": "" })));

    for text in ["first draft", "second draft", "second draft"] {
        let saved = h
            .router
            .send(Message::SaveLastSource(SourcePayload { text: text.into() }))
            .await;
        assert!(saved.ok);
        let read = h.router.send(Message::GetLastSource).await;
        assert_eq!(read.data, Some(json!({ "text": text })));
    }
}

#[tokio::test]
async fn review_surface_falls_back_to_window() {
    let h = harness(None);
    h.host.popup_supported.store(false, Ordering::SeqCst);

    let response = h
        .router
        .send(Message::OpenReviewSurface(ReviewPayload {
            text: Some("seeded text".into()),
        }))
        .await;

    assert_eq!(response.data, Some(json!({ "presented": "window" })));
    assert_eq!(
        h.host.windows.lock().unwrap().clone(),
        vec![WindowSpec {
            url: "popup.html".into(),
            width: 420,
            height: 640
        }]
    );
    let read = h.router.send(Message::GetLastSource).await;
    assert_eq!(read.data, Some(json!({ "text": "seeded text" })));
}

#[tokio::test]
async fn capture_then_apply_replaces_only_the_selection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"subject":"","body":"Could you please send the file?"}"#,
        )))
        .mount(&server)
        .await;

    let h = harness(Some(server.uri()));
    with_key(&h).await;

    let (mut doc, region, text) = compose_page("Hi Sam, hey can u send the file. Thanks!");
    let other = doc.create_element("div");
    doc.set_attribute(other, "contenteditable", "true");
    doc.append_child(doc.root(), other);
    let other_text = doc.create_text("unrelated draft");
    doc.append_child(other, other_text);
    h.host.open_tab(1, doc, true);

    // Select "hey can u send the file." and activate the trigger.
    let mut tab = h.host.tabs.lock().unwrap().remove(&1).unwrap();
    tab.doc.select(Boundary::new(text, 8), Boundary::new(text, 32));
    let agent = tab.agent.as_mut().unwrap();
    agent.on_selection_change(&tab.doc);
    assert!(agent.trigger().is_visible());
    let opened = agent.activate(&tab.doc, &*h.router).await.unwrap();
    assert_eq!(opened.data, Some(json!({ "presented": "popup" })));
    h.host.tabs.lock().unwrap().insert(1, tab);

    // The review surface reads the source, rewrites it and applies the result.
    let source = h.router.send(Message::GetLastSource).await.data.unwrap();
    assert_eq!(source["text"], "hey can u send the file.");
    let rewritten = h
        .router
        .dispatch(json!({ "type": "CHAMELEON_REWRITE_TEXT", "payload": source }))
        .await
        .data
        .unwrap();
    let applied = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REQUEST_APPLY_REWRITE",
            "payload": { "text": rewritten["text"] }
        }))
        .await;
    assert!(applied.ok, "{:?}", applied.error);
    assert_eq!(h.host.injections(), 0);

    h.host.with_tab(1, |tab| {
        assert_eq!(
            tab.doc.text_content(region),
            "Hi Sam, Could you please send the file? Thanks!"
        );
        assert_eq!(tab.doc.text_content(other), "unrelated draft");
    });
}

#[tokio::test]
async fn page_without_compose_box_is_left_alone() {
    let h = harness(None);
    h.host.open_tab(2, chameleon_lib::page::Document::new(), true);
    let before = h.host.with_tab(2, |tab| tab.doc.generation());

    let response = h
        .router
        .dispatch(json!({
            "type": "CHAMELEON_REQUEST_APPLY_REWRITE",
            "payload": { "text": "ignored" }
        }))
        .await;
    assert!(response.ok);
    h.host.with_tab(2, |tab| {
        assert_eq!(tab.doc.generation(), before);
        let outcome = tab.agent.as_mut().unwrap().apply_rewrite(&mut tab.doc, "x");
        assert_eq!(outcome, ApplyOutcome::NoRegion);
    });
}

#[tokio::test]
async fn spawned_router_serves_concurrent_requests() {
    let h = harness(None);
    let handle = h.router.clone().spawn();

    let (a, b, unknown) = tokio::join!(
        handle.request(json!({ "type": "CHAMELEON_SAVE_LAST_SOURCE", "payload": { "text": "x" } })),
        handle.request(json!({ "type": "CHAMELEON_OPEN_OPTIONS" })),
        handle.request(json!({ "type": "SOMETHING_ELSE" })),
    );
    assert!(a.ok);
    assert!(b.ok);
    assert_eq!(unknown.error_code(), Some("UNKNOWN_MESSAGE"));
    assert_eq!(h.host.settings_opened(), 1);
}
