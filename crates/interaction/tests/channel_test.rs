use std::sync::Arc;
use std::time::Duration;

use browzee_core::{traits::HumanInteraction, Error};
use browzee_interaction::{InteractionChannel, OutboundMessage};

fn question_id(msg: OutboundMessage) -> (String, String) {
    match msg {
        OutboundMessage::Question {
            request_id,
            question,
        } => (request_id, question),
        other => panic!("expected question, got {:?}", other),
    }
}

#[tokio::test]
async fn test_broadcast_with_zero_listeners_succeeds() {
    let channel = InteractionChannel::new();
    channel.broadcast("nobody is here").await.unwrap();
}

#[tokio::test]
async fn test_broadcast_is_fifo_per_listener() {
    let channel = InteractionChannel::new();
    let (_a, mut rx_a) = channel.connect();
    let (_b, mut rx_b) = channel.connect();

    for i in 0..5 {
        channel.broadcast(&format!("msg {}", i)).await.unwrap();
    }

    for rx in [&mut rx_a, &mut rx_b] {
        for i in 0..5 {
            assert_eq!(
                rx.recv().await.unwrap(),
                OutboundMessage::Status {
                    message: format!("msg {}", i)
                }
            );
        }
    }
}

#[tokio::test]
async fn test_ask_without_operator_fails_immediately() {
    let channel = InteractionChannel::new();
    let err = channel.ask("anyone?").await.unwrap_err();
    assert!(matches!(err, Error::NoOperatorConnected));
    assert!(channel.pending_question().is_none());
}

#[tokio::test]
async fn test_ask_resolved_by_request_id() {
    let channel = Arc::new(InteractionChannel::new());
    let (_id, mut rx) = channel.connect();

    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("confirm?").await })
    };

    let (request_id, question) = question_id(rx.recv().await.unwrap());
    assert_eq!(question, "confirm?");
    assert_eq!(channel.pending_question().as_deref(), Some("confirm?"));

    assert!(!channel.answer("some-other-id", "no"));
    assert!(channel.answer(&request_id, "yes"));

    assert_eq!(asker.await.unwrap().unwrap(), "yes");
    assert!(channel.pending_question().is_none());
}

#[tokio::test]
async fn test_plain_text_reply_is_delivered() {
    let channel = Arc::new(InteractionChannel::new());
    let (_id, mut rx) = channel.connect();

    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("which seat?").await })
    };
    let _ = rx.recv().await.unwrap();

    assert!(channel.deliver("window"));
    assert_eq!(asker.await.unwrap().unwrap(), "window");
    assert!(!channel.deliver("stray message"));
}

#[tokio::test]
async fn test_second_ask_is_rejected() {
    let channel = Arc::new(InteractionChannel::new());
    let (_id, mut rx) = channel.connect();

    let first = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("first?").await })
    };
    let (request_id, _) = question_id(rx.recv().await.unwrap());

    let err = channel.ask("second?").await.unwrap_err();
    assert!(matches!(err, Error::QuestionPending(q) if q == "first?"));

    channel.answer(&request_id, "ok");
    assert_eq!(first.await.unwrap().unwrap(), "ok");
}

#[tokio::test]
async fn test_primary_disconnect_fails_pending_ask() {
    let channel = Arc::new(InteractionChannel::new());
    let (older, _rx_older) = channel.connect();
    let (primary, mut rx_primary) = channel.connect();

    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("still there?").await })
    };
    let _ = rx_primary.recv().await.unwrap();

    channel.disconnect(primary);
    let err = asker.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::ConnectionLost));
    assert_eq!(channel.primary(), Some(older));
}

#[tokio::test]
async fn test_questions_go_to_most_recent_listener() {
    let channel = Arc::new(InteractionChannel::new());
    let (_a, mut rx_a) = channel.connect();
    let (_b, mut rx_b) = channel.connect();

    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("who?").await })
    };
    let (request_id, _) = question_id(rx_b.recv().await.unwrap());
    assert!(rx_a.try_recv().is_err());

    channel.answer(&request_id, "b");
    assert_eq!(asker.await.unwrap().unwrap(), "b");
}

#[tokio::test(start_paused = true)]
async fn test_ask_timeout() {
    let channel = InteractionChannel::new().with_timeout(Duration::from_secs(30));
    let (_id, _rx) = channel.connect();

    let err = channel.ask("hello?").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert!(channel.pending_question().is_none());
}

#[tokio::test]
async fn test_cancelled_ask_clears_pending() {
    let channel = Arc::new(InteractionChannel::new());
    let (_id, mut rx) = channel.connect();

    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("going away?").await })
    };
    let _ = rx.recv().await.unwrap();
    asker.abort();
    let _ = asker.await;

    assert!(channel.pending_question().is_none());
    // A fresh question can be asked afterwards
    let asker = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.ask("again?").await })
    };
    let (request_id, question) = question_id(rx.recv().await.unwrap());
    assert_eq!(question, "again?");
    channel.answer(&request_id, "yes");
    assert_eq!(asker.await.unwrap().unwrap(), "yes");
}
