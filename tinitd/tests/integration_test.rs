//! Integration tests for the tinitd control surface and process
//! lifecycle.
//!
//! Each test spawns its own daemon in dev mode with a scratch socket and
//! log directory, so tests are parallel-safe. Services are real
//! processes (/bin/true, /bin/sleep), which keeps the supervision paths
//! honest.

mod common;

use common::TestServer;
use std::time::Duration;
use tinitd::model::{ServiceAction, ServiceList, ServiceStatus, Verb};

/// Poll a service's status until `pred` holds or the deadline passes.
async fn wait_for_action<F>(server: &TestServer, name: &str, pred: F) -> ServiceAction
where
    F: Fn(&ServiceAction) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let action = server.action(Verb::Status, name).await;
        if pred(&action) {
            return action;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached for {name}, last action: {action:?}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Test: registering the same name twice reports a conflict and leaves
/// the first registration running.
#[tokio::test]
async fn test_duplicate_register_conflicts() {
    let server = TestServer::start().await.expect("Failed to start server");

    let reply = server.register("web", "/bin/sleep", &["60"]).await;
    assert_eq!(reply, "service web has been registered");

    let first = wait_for_action(&server, "web", |a| a.status == ServiceStatus::Running).await;
    let first_pid = first.pid.expect("running service has a pid");

    let reply = server.register("web", "/bin/sleep", &["1"]).await;
    assert_eq!(reply, "service web already exists");

    // First registration untouched
    let still = server.action(Verb::Status, "web").await;
    assert_eq!(still.status, ServiceStatus::Running);
    assert_eq!(still.pid, Some(first_pid));
}

/// Test: start against a name that was never registered fails.
#[tokio::test]
async fn test_start_unregistered_fails() {
    let server = TestServer::start().await.expect("Failed to start server");

    let reply = server.action_raw(Verb::Start, "ghost").await;
    assert_eq!(
        String::from_utf8_lossy(&reply),
        "service ghost does not exist"
    );
}

/// Test: start on an already-running service reports the error and
/// leaves the process untouched.
#[tokio::test]
async fn test_start_already_running() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.register("sleeper", "/bin/sleep", &["60"]).await;

    let running = wait_for_action(&server, "sleeper", |a| a.status == ServiceStatus::Running).await;
    let pid = running.pid.expect("running service has a pid");

    let action = server.action(Verb::Start, "sleeper").await;
    assert_eq!(action.error.as_deref(), Some("already running"));
    assert_eq!(action.status, ServiceStatus::Running);
    assert_eq!(action.pid, Some(pid));
}

/// Test: a process that ignores SIGTERM is SIGKILLed after the grace
/// period and ends up stopped with a recorded exit time.
#[tokio::test]
async fn test_stop_escalates_to_sigkill() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .register(
            "stubborn",
            "/bin/sh",
            &["-c", "trap '' TERM; while true; do /bin/sleep 1; done"],
        )
        .await;
    wait_for_action(&server, "stubborn", |a| a.status == ServiceStatus::Running).await;

    let action = server.action(Verb::Stop, "stubborn").await;
    assert_eq!(action.status, ServiceStatus::Stopped);
    assert!(action.exit_time.is_some(), "exit time must be recorded");
    assert!(
        action
            .exit_status
            .as_deref()
            .is_some_and(|s| s.contains("SIGKILL")),
        "exit status should reflect the forced kill: {:?}",
        action.exit_status
    );
}

/// Test: delete clears registry and pool and repeating it leaves the
/// system unchanged.
#[tokio::test]
async fn test_delete_clears_both_tables() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.register("doomed", "/bin/sleep", &["60"]).await;
    wait_for_action(&server, "doomed", |a| a.status == ServiceStatus::Running).await;

    let action = server.action(Verb::Delete, "doomed").await;
    assert_eq!(action.status, ServiceStatus::Deleted);

    // The registration is gone from the registry...
    let reply = server.action_raw(Verb::Delete, "doomed").await;
    assert_eq!(
        String::from_utf8_lossy(&reply),
        "service doomed does not exist"
    );
    // ...and from the listing.
    let reply = server.request(&list_request()).await;
    assert_eq!(String::from_utf8_lossy(&reply), "no services");
}

fn list_request() -> tinitd::model::ServiceRequest {
    tinitd::model::ServiceRequest {
        verb: Verb::List,
        name: String::new(),
        command: String::new(),
        args: vec![],
    }
}

/// Test: list with no registrations returns the explicit message,
/// otherwise exactly the registered name set.
#[tokio::test]
async fn test_list() {
    let server = TestServer::start().await.expect("Failed to start server");

    let reply = server.request(&list_request()).await;
    assert_eq!(String::from_utf8_lossy(&reply), "no services");

    server.register("alpha", "/bin/sleep", &["60"]).await;
    server.register("beta", "/bin/sleep", &["60"]).await;

    let reply = server.request(&list_request()).await;
    let mut listed: ServiceList = serde_json::from_slice(&reply).expect("list reply");
    listed.services.sort();
    assert_eq!(listed.services, vec!["alpha", "beta"]);
}

/// Test: full lifecycle of a short-lived command. The service runs at
/// registration, exits successfully, and can be started again.
#[tokio::test]
async fn test_short_lived_service_lifecycle() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.register("oneshot", "/bin/true", &[]).await;

    let done = wait_for_action(&server, "oneshot", |a| {
        a.status == ServiceStatus::Stopped && a.exit_status.is_some()
    })
    .await;
    assert_eq!(done.exit_status.as_deref(), Some("exit status 0"));
    let start_time = done.start_time.expect("start time recorded");
    let exit_time = done.exit_time.expect("exit time recorded");
    assert!(start_time <= exit_time);

    // start resubmits the stored command under the same registration
    let action = server.action(Verb::Start, "oneshot").await;
    assert!(action.error.is_none(), "unexpected error: {:?}", action.error);

    let done_again = wait_for_action(&server, "oneshot", |a| {
        a.status == ServiceStatus::Stopped
            && a.exit_status.is_some()
            && a.start_time > Some(start_time)
    })
    .await;
    assert_eq!(done_again.exit_status.as_deref(), Some("exit status 0"));
}

/// Test: restart replaces the process while keeping the registration.
#[tokio::test]
async fn test_restart_replaces_process() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.register("churner", "/bin/sleep", &["60"]).await;

    let before = wait_for_action(&server, "churner", |a| a.status == ServiceStatus::Running).await;
    let old_pid = before.pid.expect("running service has a pid");

    let action = server.action(Verb::Restart, "churner").await;
    assert_eq!(action.status, ServiceStatus::Running);
    let new_pid = action.pid.expect("restarted service has a pid");
    assert_ne!(new_pid, old_pid);

    // Still one registration under the same name
    let reply = server.request(&list_request()).await;
    let listed: ServiceList = serde_json::from_slice(&reply).expect("list reply");
    assert_eq!(listed.services, vec!["churner"]);
}

/// Test: concurrent registrations with distinct names never lose an
/// entry.
#[tokio::test]
async fn test_concurrent_registers_keep_every_entry() {
    let server = TestServer::start().await.expect("Failed to start server");

    let (a, b, c, d, e) = tokio::join!(
        server.register("svc-a", "/bin/sleep", &["30"]),
        server.register("svc-b", "/bin/sleep", &["30"]),
        server.register("svc-c", "/bin/sleep", &["30"]),
        server.register("svc-d", "/bin/sleep", &["30"]),
        server.register("svc-e", "/bin/sleep", &["30"]),
    );
    for reply in [a, b, c, d, e] {
        assert!(reply.ends_with("has been registered"), "reply: {reply}");
    }

    let reply = server.request(&list_request()).await;
    let mut listed: ServiceList = serde_json::from_slice(&reply).expect("list reply");
    listed.services.sort();
    assert_eq!(
        listed.services,
        vec!["svc-a", "svc-b", "svc-c", "svc-d", "svc-e"]
    );
}

/// Test: malformed payloads and verbs outside the closed set are
/// rejected with a message and cause no side effect.
#[tokio::test]
async fn test_bad_requests_are_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    let reply = server.send(b"{not json").await;
    assert!(
        String::from_utf8_lossy(&reply).starts_with("invalid request:"),
        "reply: {:?}",
        String::from_utf8_lossy(&reply)
    );

    let reply = server.send(br#"{"type":"reboot","name":"x"}"#).await;
    assert!(String::from_utf8_lossy(&reply).starts_with("invalid request:"));

    let reply = server.request(&list_request()).await;
    assert_eq!(String::from_utf8_lossy(&reply), "no services");
}

/// Test: service stdout is appended to the per-service log file under
/// the configured directory.
#[tokio::test]
async fn test_service_output_is_logged() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .register("greeter", "/bin/sh", &["-c", "echo hello from greeter"])
        .await;

    wait_for_action(&server, "greeter", |a| a.status == ServiceStatus::Stopped).await;

    let out_log = server.log_dir.join("greeter-out.log");
    let contents = std::fs::read_to_string(&out_log)
        .unwrap_or_else(|e| panic!("missing {}: {e}", out_log.display()));
    assert!(contents.contains("hello from greeter"));
}

/// Test: the HTTP listener serves the same control surface.
#[tokio::test]
async fn test_http_listener() {
    let server = TestServer::start_with_http_port(18217)
        .await
        .expect("Failed to start server");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to create HTTP client");

    let response = client
        .post("http://127.0.0.1:18217/api/services")
        .body(r#"{"type":"list"}"#)
        .send()
        .await
        .expect("HTTP request failed");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.expect("body"), "no services");

    let response = client
        .post("http://127.0.0.1:18217/api/services")
        .body(r#"{"type":"register","name":"web","command":"/bin/sleep","args":["30"]}"#)
        .send()
        .await
        .expect("HTTP request failed");
    assert_eq!(
        response.text().await.expect("body"),
        "service web has been registered"
    );

    let action = wait_for_action(&server, "web", |a| a.status == ServiceStatus::Running).await;
    assert!(action.pid.is_some());
}
