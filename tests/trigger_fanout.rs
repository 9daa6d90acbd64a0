//! Trigger fan-out integration tests.
//!
//! These tests assemble the full component environment in-process (no
//! HTTP transport) and drive the pipeline directly, asserting on the
//! stores a caller would query for verification.

use serde_json::json;

use pulse_notification_service::config::{ContextConfig, FeatureConfig, RunnerConfig, ServerConfig, Settings};
use pulse_notification_service::notification::{ChannelKind, MessageQuery};
use pulse_notification_service::runner::{JobRunner, JobStatus};
use pulse_notification_service::server::AppState;
use pulse_notification_service::subscriber::SubscriberDefinition;
use pulse_notification_service::trigger::TriggerRequest;
use pulse_notification_service::workflow::{StepTemplate, Workflow};

fn test_settings() -> Settings {
    Settings {
        server: ServerConfig::default(),
        context: ContextConfig {
            organization_id: "org".to_string(),
            environment_id: "env".to_string(),
        },
        features: FeatureConfig::default(),
        runner: RunnerConfig::default(),
    }
}

fn create_test_environment() -> (AppState, JobRunner) {
    AppState::new(test_settings())
}

fn trigger(name: &str, to: Vec<serde_json::Value>) -> TriggerRequest {
    TriggerRequest {
        name: name.to_string(),
        to,
        payload: json!({}),
        attachments: None,
    }
}

fn seed_subscriber(state: &AppState, id: &str, phone: &str) {
    state
        .subscribers
        .create(
            "org",
            "env",
            SubscriberDefinition {
                subscriber_id: id.to_string(),
                first_name: Some(format!("First-{id}")),
                email: Some(format!("{id}@example.com")),
                phone: Some(phone.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
}

// =============================================================================
// Golden fixture scenarios
// =============================================================================

#[tokio::test]
async fn test_two_subscribers_one_topic_two_step_workflow() {
    let (state, mut runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "order-update",
            "Order Update",
            vec![
                StepTemplate::in_app("Order {{orderId}} updated"),
                StepTemplate::email("Order update", "Order {{orderId}} was updated."),
            ],
        ))
        .unwrap();

    seed_subscriber(&state, "s1", "+15550000001");
    seed_subscriber(&state, "s2", "+15550000002");
    state.topics.create("org", "env", "buyers", "Buyers").unwrap();
    state
        .topics
        .add_subscribers("env", "buyers", &["s1".to_string(), "s2".to_string()])
        .unwrap();

    let mut request = trigger("order-update", vec![json!({"topicKey": "buyers"})]);
    request.payload = json!({"orderId": "ORD-7"});
    let outcome = state.pipeline.execute(&state.context, request).unwrap();

    // 2 notifications, 4 messages
    assert_eq!(outcome.subscribers, 2);
    assert_eq!(outcome.notifications, 2);
    assert_eq!(outcome.messages, 4);
    assert_eq!(state.notifications.count(), 2);
    assert_eq!(state.messages.count(), 4);

    // 5 log entries: 1 trigger received, 2 request processed, 2 in-app created
    let logs = state.execution_log.query("env", "org");
    assert_eq!(logs.len(), 5);
    assert_eq!(
        logs.iter().filter(|e| e.text == "Trigger request received").count(),
        1
    );
    assert_eq!(
        logs.iter().filter(|e| e.text == "Request processed").count(),
        2
    );
    assert_eq!(
        logs.iter().filter(|e| e.text == "In App message created").count(),
        2
    );

    // Every message is backed by exactly one job; the runner completes them
    assert_eq!(state.jobs.count_by_status(JobStatus::Pending), 4);
    runner.drain().await;
    assert_eq!(state.jobs.count_by_status(JobStatus::Completed), 4);

    // Draining jobs adds nothing to the execution log
    assert_eq!(state.execution_log.query("env", "org").len(), 5);
}

#[tokio::test]
async fn test_two_topics_plus_individual_entries_deduplicate_to_six() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "announcement",
            "Announcement",
            vec![StepTemplate::in_app("{{headline}}")],
        ))
        .unwrap();

    for (id, phone) in [
        ("t1-a", "+15550000011"),
        ("t1-b", "+15550000012"),
        ("t2-a", "+15550000021"),
        ("t2-b", "+15550000022"),
        ("solo", "+15550000031"),
    ] {
        seed_subscriber(&state, id, phone);
    }

    state.topics.create("org", "env", "team-one", "Team One").unwrap();
    state
        .topics
        .add_subscribers("env", "team-one", &["t1-a".to_string(), "t1-b".to_string()])
        .unwrap();
    state.topics.create("org", "env", "team-two", "Team Two").unwrap();
    state
        .topics
        .add_subscribers("env", "team-two", &["t2-a".to_string(), "t2-b".to_string()])
        .unwrap();

    // 2 topics (2 subscribers each) + 1 pre-existing individual + 1 inline
    let mut request = trigger(
        "announcement",
        vec![
            json!({"topicKey": "team-one"}),
            json!({"topicKey": "team-two"}),
            json!("solo"),
            json!({"subscriberId": "inline-new", "firstName": "New"}),
        ],
    );
    request.payload = json!({"headline": "All hands"});
    let outcome = state.pipeline.execute(&state.context, request).unwrap();

    assert_eq!(outcome.subscribers, 6);
    assert_eq!(outcome.notifications, 6);
    assert_eq!(outcome.messages, 6);

    // 13 log entries: 1 trigger received + 6 request processed + 6 in-app created
    let logs = state.execution_log.query("env", "org");
    assert_eq!(logs.len(), 13);

    // The inline definition was registered lazily
    assert!(state.subscribers.exists("env", "inline-new"));
}

#[tokio::test]
async fn test_sms_workflow_renders_template_and_uses_stored_phone() {
    let (state, mut runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "code-delivery",
            "Code Delivery",
            vec![StepTemplate::sms("Your code is {{code}}")],
        ))
        .unwrap();

    seed_subscriber(&state, "s1", "+15550000001");
    seed_subscriber(&state, "s2", "+15550000002");
    state.topics.create("org", "env", "buyers", "Buyers").unwrap();
    state
        .topics
        .add_subscribers("env", "buyers", &["s1".to_string(), "s2".to_string()])
        .unwrap();

    let mut request = trigger("code-delivery", vec![json!({"topicKey": "buyers"})]);
    request.payload = json!({"code": "901284"});
    state.pipeline.execute(&state.context, request).unwrap();

    for (id, phone) in [("s1", "+15550000001"), ("s2", "+15550000002")] {
        let messages = state.messages.query(
            "env",
            &MessageQuery {
                subscriber_id: Some(id.to_string()),
                channel: Some(ChannelKind::Sms),
                ..Default::default()
            },
        );
        assert_eq!(messages.len(), 1, "exactly one SMS message for {id}");
        assert_eq!(messages[0].content, "Your code is 901284");
        assert_eq!(messages[0].phone.as_deref(), Some(phone));
    }

    runner.drain().await;
    assert_eq!(state.jobs.count_by_status(JobStatus::Completed), 2);
}

// =============================================================================
// Deduplication invariants
// =============================================================================

#[tokio::test]
async fn test_subscriber_in_two_topics_and_listed_individually_counts_once() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "w",
            "W",
            vec![StepTemplate::in_app("hi")],
        ))
        .unwrap();

    seed_subscriber(&state, "shared", "+15550000001");
    for key in ["alpha", "beta"] {
        state.topics.create("org", "env", key, key).unwrap();
        state
            .topics
            .add_subscribers("env", key, &["shared".to_string()])
            .unwrap();
    }

    let outcome = state
        .pipeline
        .execute(
            &state.context,
            trigger(
                "w",
                vec![
                    json!({"topicKey": "alpha"}),
                    json!({"topicKey": "beta"}),
                    json!("shared"),
                ],
            ),
        )
        .unwrap();

    assert_eq!(outcome.subscribers, 1);
    assert_eq!(state.notifications.for_subscriber("env", "shared").len(), 1);
}

#[tokio::test]
async fn test_same_topic_twice_in_recipient_list() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new("w", "W", vec![StepTemplate::in_app("hi")]))
        .unwrap();

    seed_subscriber(&state, "a", "+15550000001");
    seed_subscriber(&state, "b", "+15550000002");
    state.topics.create("org", "env", "t", "T").unwrap();
    state
        .topics
        .add_subscribers("env", "t", &["a".to_string(), "b".to_string()])
        .unwrap();

    let outcome = state
        .pipeline
        .execute(
            &state.context,
            trigger("w", vec![json!({"topicKey": "t"}), json!({"topicKey": "t"})]),
        )
        .unwrap();

    assert_eq!(outcome.subscribers, 2);
    assert_eq!(outcome.messages, 2);
}

// =============================================================================
// Counting property: N subscribers x K steps
// =============================================================================

#[tokio::test]
async fn test_notification_and_message_counts_scale_with_steps() {
    let (state, mut runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "multi",
            "Multi",
            vec![
                StepTemplate::in_app("a"),
                StepTemplate::email("s", "b"),
                StepTemplate::sms("c"),
            ],
        ))
        .unwrap();

    for (id, phone) in [
        ("n1", "+15550000001"),
        ("n2", "+15550000002"),
        ("n3", "+15550000003"),
    ] {
        seed_subscriber(&state, id, phone);
    }

    let outcome = state
        .pipeline
        .execute(
            &state.context,
            trigger("multi", vec![json!("n1"), json!("n2"), json!("n3")]),
        )
        .unwrap();

    // 3 subscribers x 3 steps
    assert_eq!(outcome.notifications, 3);
    assert_eq!(outcome.messages, 9);
    assert_eq!(state.jobs.for_transaction(outcome.transaction_id).len(), 9);

    // Log: 1 trigger received + 3 request processed + 3 in-app created
    assert_eq!(state.execution_log.query("env", "org").len(), 7);

    runner.drain().await;
    assert_eq!(state.jobs.count_by_status(JobStatus::Completed), 9);
}

// =============================================================================
// Attachments
// =============================================================================

#[tokio::test]
async fn test_attachments_on_email_jobs_but_not_in_app_payloads() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new(
            "invoice",
            "Invoice",
            vec![
                StepTemplate::in_app("Invoice ready"),
                StepTemplate::email("Your invoice", "See attached."),
            ],
        ))
        .unwrap();

    seed_subscriber(&state, "s1", "+15550000001");

    let attachments = vec![json!({
        "name": "invoice.pdf",
        "mime": "application/pdf",
        "file": "JVBERi0xLjQ="
    })];
    let mut request = trigger("invoice", vec![json!("s1")]);
    request.payload = json!({"invoiceId": "INV-1"});
    request.attachments = Some(attachments.clone());
    let outcome = state.pipeline.execute(&state.context, request).unwrap();

    let jobs = state.jobs.for_transaction(outcome.transaction_id);
    let email_job = jobs.iter().find(|j| j.channel == ChannelKind::Email).unwrap();
    assert_eq!(
        email_job.payload["attachments"],
        serde_json::Value::Array(attachments)
    );

    let in_app_job = jobs.iter().find(|j| j.channel == ChannelKind::InApp).unwrap();
    assert!(in_app_job.payload.get("attachments").is_none());

    let in_app_messages = state.messages.query(
        "env",
        &MessageQuery {
            channel: Some(ChannelKind::InApp),
            ..Default::default()
        },
    );
    assert!(in_app_messages[0].payload.get("attachments").is_none());
    assert_eq!(in_app_messages[0].payload["invoiceId"], "INV-1");
}

// =============================================================================
// Registration semantics
// =============================================================================

#[tokio::test]
async fn test_inline_redefinition_leaves_stored_subscriber_untouched() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new("w", "W", vec![StepTemplate::in_app("hi")]))
        .unwrap();

    seed_subscriber(&state, "keep", "+15550000001");

    state
        .pipeline
        .execute(
            &state.context,
            trigger(
                "w",
                vec![json!({
                    "subscriberId": "keep",
                    "firstName": "Changed",
                    "email": "changed@example.com"
                })],
            ),
        )
        .unwrap();

    let stored = state.subscribers.get("env", "keep").unwrap();
    assert_eq!(stored.first_name.as_deref(), Some("First-keep"));
    assert_eq!(stored.email.as_deref(), Some("keep@example.com"));
}

#[tokio::test]
async fn test_rejected_trigger_enqueues_nothing() {
    let (state, mut runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new("w", "W", vec![StepTemplate::in_app("hi")]))
        .unwrap();

    // Unknown topic rejects the whole trigger
    let result = state.pipeline.execute(
        &state.context,
        trigger("w", vec![json!("a"), json!({"topicKey": "ghost"})]),
    );
    assert!(result.is_err());

    runner.drain().await;
    assert_eq!(state.jobs.count(), 0);
    assert_eq!(state.notifications.count(), 0);
    assert_eq!(state.messages.count(), 0);
    assert_eq!(state.execution_log.query("env", "org").len(), 0);
}

#[tokio::test]
async fn test_concurrent_triggers_do_not_interfere() {
    let (state, _runner) = create_test_environment();

    state
        .workflows
        .create(Workflow::new("w", "W", vec![StepTemplate::in_app("hi")]))
        .unwrap();
    for i in 0..8 {
        seed_subscriber(&state, &format!("c{i}"), &format!("+1555000010{i}"));
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state
                .pipeline
                .execute(
                    &state.context,
                    TriggerRequest {
                        name: "w".to_string(),
                        to: vec![json!(format!("c{i}"))],
                        payload: json!({}),
                        attachments: None,
                    },
                )
                .unwrap()
        }));
    }

    let mut transactions = std::collections::HashSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.subscribers, 1);
        transactions.insert(outcome.transaction_id);
    }

    // Every call got its own transaction id and its own artifacts
    assert_eq!(transactions.len(), 8);
    assert_eq!(state.notifications.count(), 8);
    assert_eq!(state.messages.count(), 8);
}
