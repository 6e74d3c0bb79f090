//! End-to-end tests for the public handler API.

use std::time::{Duration, Instant};

use procline::{Error, Handler, HandlerOptions, HandlerState};

const WAIT: Duration = Duration::from_secs(5);

async fn stop(handler: &mut Handler) {
    handler.terminate().unwrap();
    let deadline = Instant::now() + WAIT;
    while handler.is_alive().unwrap() {
        assert!(Instant::now() < deadline, "child did not exit in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn exchange(handler: &mut Handler, message: &str) -> Vec<String> {
    handler.send(message).await.unwrap();
    handler.await_receive(WAIT).await.unwrap();
    handler.receive_buffer().to_vec()
}

#[tokio::test]
async fn test_ping_scenario() {
    let mut handler = Handler::new(HandlerOptions::new("cat").terminator("\n"));
    handler.launch().unwrap();

    handler.send("ping").await.unwrap();
    handler.await_receive(Duration::from_secs(2)).await.unwrap();
    assert_eq!(handler.receive_buffer(), ["ping"]);

    stop(&mut handler).await;
}

#[tokio::test]
async fn test_buffer_holds_only_latest_exchange() {
    let mut handler = Handler::new(HandlerOptions::new("cat").terminator("\n"));
    handler.launch().unwrap();

    for word in ["alpha", "beta", "gamma"] {
        assert_eq!(exchange(&mut handler, word).await, vec![word.to_string()]);
    }

    stop(&mut handler).await;
}

#[tokio::test]
async fn test_multi_line_reply() {
    // Answers every input line with two lines.
    let script = r#"while read -r line; do echo "got $line"; echo "done"; done"#;
    let mut handler = Handler::new(
        HandlerOptions::new("sh")
            .arg("-c")
            .arg(script)
            .terminator("\n"),
    );
    handler.launch().unwrap();

    handler.send("job").await.unwrap();
    while handler.receive_buffer().len() < 2 {
        handler.await_receive(WAIT).await.unwrap();
    }
    assert_eq!(handler.receive_buffer(), ["got job", "done"]);

    stop(&mut handler).await;
}

#[tokio::test]
async fn test_terminator_matches_manual_newline() {
    let mut framed = Handler::new(HandlerOptions::new("cat").terminator("\n"));
    let mut manual = Handler::new(HandlerOptions::new("cat"));
    framed.launch().unwrap();
    manual.launch().unwrap();

    for payload in ["x", "", "with spaces"] {
        let from_framed = exchange(&mut framed, payload).await;
        let from_manual = exchange(&mut manual, &format!("{payload}\n")).await;
        assert_eq!(from_framed, from_manual);
        assert_eq!(from_framed, vec![payload.to_string()]);
    }

    stop(&mut framed).await;
    stop(&mut manual).await;
}

#[tokio::test]
async fn test_handlers_do_not_share_output() {
    let mut left = Handler::new(HandlerOptions::new("cat").terminator("\n"));
    let mut right = Handler::new(HandlerOptions::new("cat").terminator("\n"));
    left.launch().unwrap();
    right.launch().unwrap();

    left.send("from-left").await.unwrap();
    right.send("from-right").await.unwrap();

    right.await_receive(WAIT).await.unwrap();
    left.await_receive(WAIT).await.unwrap();

    assert_eq!(left.receive_buffer(), ["from-left"]);
    assert_eq!(right.receive_buffer(), ["from-right"]);

    stop(&mut left).await;
    stop(&mut right).await;
}

#[tokio::test]
async fn test_immediate_exit_scenario() {
    let mut handler = Handler::new(HandlerOptions::new("sh").arg("-c").arg("exit 0"));
    handler.launch().unwrap();

    let deadline = Instant::now() + WAIT;
    while handler.is_alive().unwrap() {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(handler.last_exit_code(), Some(0));
    assert_eq!(handler.state(), HandlerState::Exited);

    handler.send("ignored").await.unwrap();
    assert!(handler.receive_buffer().is_empty());
}

#[tokio::test]
async fn test_timeout_without_output() {
    let mut handler = Handler::new(HandlerOptions::new("sleep").arg("30"));
    handler.launch().unwrap();

    let started = Instant::now();
    let err = handler
        .await_receive(Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(handler.receive_buffer().is_empty());

    stop(&mut handler).await;
}
