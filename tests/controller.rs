//! Turn sequencing integration tests
//!
//! Exercises the controller against scripted capabilities; no microphone,
//! recognizer, endpoint, or audio device involved.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parley::voice::strip_punctuation;
use parley::{Error, Role, Status};

mod common;
use common::{
    FakeCompleter, FakeRecorder, FakeTranscriber, RecordingSpeaker, controller_with,
    happy_controller,
};

#[tokio::test]
async fn successful_cycle_appends_user_then_assistant() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = happy_controller(Arc::clone(&speaker));

    let completed = controller.start_turn().await.unwrap();
    assert_eq!(completed.user, "what time is it");
    assert_eq!(completed.assistant, "I don't have real-time access");

    let turns = controller.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "what time is it");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, "I don't have real-time access");

    // Playback launched with the reply; its punctuation-stripped form is
    // what becomes audible
    let spoken = speaker.spoken.lock().unwrap();
    assert_eq!(spoken.as_slice(), ["I don't have real-time access"]);
    assert_eq!(
        strip_punctuation(&spoken[0]),
        "I dont have real-time access"
    );

    assert_eq!(controller.status(), Status::Clear);
}

#[tokio::test]
async fn capture_timeout_appends_nothing() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::failing(|| Err(Error::CaptureTimeout)),
        FakeTranscriber(|| unreachable!("transcriber must not run")),
        FakeCompleter(|| unreachable!("completer must not run")),
        Arc::clone(&speaker),
    );

    let err = controller.start_turn().await.unwrap_err();
    assert!(matches!(err, Error::CaptureTimeout));

    assert!(controller.turns().is_empty());
    assert!(speaker.spoken.lock().unwrap().is_empty());
    assert!(matches!(controller.status(), Status::Error { .. }));
}

#[tokio::test]
async fn device_error_appends_nothing() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::failing(|| Err(Error::Device("no input device".to_string()))),
        FakeTranscriber(|| unreachable!("transcriber must not run")),
        FakeCompleter(|| unreachable!("completer must not run")),
        Arc::clone(&speaker),
    );

    controller.start_turn().await.unwrap_err();
    assert!(controller.turns().is_empty());
}

#[tokio::test]
async fn unrecognized_audio_appends_nothing() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::ok(),
        FakeTranscriber(|| Err(Error::Unrecognized)),
        FakeCompleter(|| unreachable!("completer must not run")),
        Arc::clone(&speaker),
    );

    let err = controller.start_turn().await.unwrap_err();
    assert!(matches!(err, Error::Unrecognized));

    assert!(controller.turns().is_empty());
    assert_eq!(
        controller.status(),
        Status::Error {
            message: "could not understand audio".to_string()
        }
    );
}

#[tokio::test]
async fn recognition_service_error_appends_nothing() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::ok(),
        FakeTranscriber(|| Err(Error::Stt("quota exceeded".to_string()))),
        FakeCompleter(|| unreachable!("completer must not run")),
        Arc::clone(&speaker),
    );

    controller.start_turn().await.unwrap_err();
    assert!(controller.turns().is_empty());
}

#[tokio::test]
async fn unauthorized_inference_keeps_user_turn_only() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::ok(),
        FakeTranscriber(|| Ok("what time is it".to_string())),
        FakeCompleter(|| Err(Error::Unauthorized)),
        Arc::clone(&speaker),
    );

    let err = controller.start_turn().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized));

    let turns = controller.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "what time is it");

    assert!(speaker.spoken.lock().unwrap().is_empty());
    assert_eq!(
        controller.status(),
        Status::Error {
            message: "invalid API credential".to_string()
        }
    );
}

#[tokio::test]
async fn inference_timeout_keeps_user_turn_only() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder::ok(),
        FakeTranscriber(|| Ok("hello".to_string())),
        FakeCompleter(|| Err(Error::InferenceTimeout)),
        Arc::clone(&speaker),
    );

    controller.start_turn().await.unwrap_err();

    let turns = controller.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
    assert!(speaker.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stop_turn_with_no_playback_is_a_noop() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, status) = happy_controller(Arc::clone(&speaker));

    controller.stop_turn();

    // Cancel reached the speaker, nothing else changed
    assert_eq!(speaker.cancels.load(Ordering::SeqCst), 1);
    assert!(controller.turns().is_empty());
    assert_eq!(status.current(), Status::Clear);
}

#[tokio::test]
async fn second_turn_while_busy_is_rejected() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = controller_with(
        FakeRecorder {
            delay: Duration::from_millis(200),
            outcome: || Ok(common::test_clip()),
        },
        FakeTranscriber(|| Ok("hello".to_string())),
        FakeCompleter(|| Ok("hi".to_string())),
        Arc::clone(&speaker),
    );

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.start_turn().await })
    };

    // Let the first turn reach its capture stage
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = controller.start_turn().await.unwrap_err();
    assert!(matches!(err, Error::Busy));

    first.await.unwrap().unwrap();

    // Only the first cycle's turns landed
    assert_eq!(controller.turns().len(), 2);
}

#[tokio::test]
async fn speak_failure_leaves_the_completed_cycle_intact() {
    let speaker = Arc::new(RecordingSpeaker::failing());
    let (controller, status) = happy_controller(Arc::clone(&speaker));

    // The cycle still completes
    let completed = controller.start_turn().await.unwrap();
    assert_eq!(completed.assistant, "I don't have real-time access");
    assert_eq!(controller.turns().len(), 2);

    // But the failure is visible
    assert_eq!(
        status.current(),
        Status::Error {
            message: "speech synthesis error: synthesis backend down".to_string()
        }
    );
}

#[tokio::test]
async fn consecutive_cycles_keep_transcript_order() {
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, _) = happy_controller(Arc::clone(&speaker));

    controller.start_turn().await.unwrap();
    controller.start_turn().await.unwrap();

    let turns = controller.turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[2].role, Role::User);
    assert_eq!(turns[3].role, Role::Assistant);
}
