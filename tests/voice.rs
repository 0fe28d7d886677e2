//! Voice pipeline integration tests
//!
//! Router and service behavior against scripted backends — no audio
//! hardware, no network.

use std::sync::Arc;
use std::time::Duration;

use aura_voice::{BackendKind, Error, PersonaGender, SegmenterEvent, VoiceInfo, VoiceService};

mod common;

use common::{
    ScriptStep, SynthBehavior, activity_log, log_entries, mock_synthesizer, scripted_recognizer,
    test_config, unavailable_recognizer,
};

fn cloud_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo::new("en-US-JennyNeural", "en-US", true),
        VoiceInfo::new("en-US-GuyNeural", "en-US", true),
        VoiceInfo::new("en-GB-RyanNeural", "en-GB", true),
        VoiceInfo::new("en-GB-SoniaNeural", "en-GB", true),
    ]
}

fn platform_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo::new("Daniel", "en-GB", false),
        VoiceInfo::new("Samantha", "en-US", false),
    ]
}

#[tokio::test(start_paused = true)]
async fn cloud_failure_falls_back_to_platform() {
    // Cloud synthesis rejects every call (as a 401 would); the platform
    // backend must still carry the request with no user-visible failure.
    let log = activity_log();
    let cloud = mock_synthesizer(BackendKind::Cloud, SynthBehavior::Fail, cloud_voices(), &log);
    let platform = mock_synthesizer(
        BackendKind::Platform,
        SynthBehavior::Succeed { playback_ms: 10 },
        platform_voices(),
        &log,
    );

    let service =
        VoiceService::with_backends(&test_config(), None, None, Some(cloud), Some(platform));

    service.speak("hello there").await.expect("fallback succeeds");

    let entries = log_entries(&log);
    let cloud_fail = entries.iter().position(|e| e.starts_with("cloud:fail"));
    let platform_start = entries.iter().position(|e| e.starts_with("platform:start"));
    assert!(cloud_fail.is_some(), "cloud was attempted first: {entries:?}");
    assert!(
        platform_start > cloud_fail,
        "platform ran after the cloud failure: {entries:?}"
    );
    assert!(entries.iter().any(|e| e.starts_with("platform:done")));
}

#[tokio::test(start_paused = true)]
async fn platform_failure_is_surfaced() {
    // No cloud configured and the platform fails: there is no third tier,
    // so the caller sees the error.
    let log = activity_log();
    let platform =
        mock_synthesizer(BackendKind::Platform, SynthBehavior::Fail, platform_voices(), &log);

    let service = VoiceService::with_backends(&test_config(), None, None, None, Some(platform));

    let err = service.speak("doomed").await.expect_err("must surface");
    assert!(matches!(err, Error::Tts(_)));
}

#[tokio::test(start_paused = true)]
async fn speak_without_any_backend_is_unsupported() {
    let service = VoiceService::with_backends(&test_config(), None, None, None, None);

    let err = service.speak("into the void").await.expect_err("no backend");
    assert!(matches!(err, Error::Unsupported(_)));
}

#[tokio::test(start_paused = true)]
async fn newer_speak_supersedes_the_one_in_flight() {
    let log = activity_log();
    let platform = mock_synthesizer(
        BackendKind::Platform,
        SynthBehavior::Succeed { playback_ms: 5000 },
        platform_voices(),
        &log,
    );

    let service = Arc::new(VoiceService::with_backends(
        &test_config(),
        None,
        None,
        None,
        Some(platform),
    ));

    let first = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.speak("A").await })
    };
    // Let the first request park inside its (long) playback.
    tokio::time::sleep(Duration::from_millis(1)).await;

    let second = service.speak("B").await;
    let first = first.await.expect("task join");

    // Both calls resolve cleanly: supersession is not an error.
    assert!(first.is_ok());
    assert!(second.is_ok());

    let entries = log_entries(&log);
    let start_a = entries
        .iter()
        .position(|e| e.starts_with("platform:start:A"))
        .expect("A started");
    let start_b = entries
        .iter()
        .position(|e| e.starts_with("platform:start:B"))
        .expect("B started");
    let stop_for_b = entries.iter().rposition(|e| e == "platform:stop").expect("stopped");

    // The in-flight request's backend was told to stop after A began and
    // before B began.
    assert!(start_a < stop_for_b && stop_for_b < start_b, "{entries:?}");

    // Only B ran to completion; A was cancelled, never finished.
    assert!(entries.iter().any(|e| e.starts_with("platform:cancelled:A")));
    assert!(entries.iter().any(|e| e.starts_with("platform:done:B")));
    assert!(!entries.iter().any(|e| e.starts_with("platform:done:A")));
}

#[tokio::test(start_paused = true)]
async fn stop_speaking_when_idle_is_a_noop() {
    let log = activity_log();
    let platform = mock_synthesizer(
        BackendKind::Platform,
        SynthBehavior::Succeed { playback_ms: 10 },
        platform_voices(),
        &log,
    );

    let service = VoiceService::with_backends(&test_config(), None, None, None, Some(platform));

    // Nothing in flight; must not panic or error.
    service.stop_speaking().await;
    service.stop_speaking().await;
}

#[tokio::test(start_paused = true)]
async fn preferred_keyword_resolves_to_mapped_voice() {
    let log = activity_log();
    let cloud = mock_synthesizer(
        BackendKind::Cloud,
        SynthBehavior::Succeed { playback_ms: 10 },
        cloud_voices(),
        &log,
    );

    let mut config = test_config();
    config.voice.preferred = "ryan".to_string();
    let service = VoiceService::with_backends(&config, None, None, Some(cloud), None);

    service.speak("good evening").await.expect("speak");

    let entries = log_entries(&log);
    assert!(
        entries
            .iter()
            .any(|e| e.contains("start:good evening:en-GB-RyanNeural")),
        "ryan resolved to its mapped cloud voice: {entries:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn persona_gender_drives_default_voice_bucket() {
    let log = activity_log();
    let cloud = mock_synthesizer(
        BackendKind::Cloud,
        SynthBehavior::Succeed { playback_ms: 10 },
        cloud_voices(),
        &log,
    );

    let service = VoiceService::with_backends(&test_config(), None, None, Some(cloud), None);

    // Structured tag wins over the male-leaning pronouns that follow.
    let gender = service.set_persona("gender: female. He said he would visit his brother.");
    assert_eq!(gender, PersonaGender::Female);

    service.speak("hello").await.expect("speak");

    let entries = log_entries(&log);
    let chosen = entries
        .iter()
        .find(|e| e.starts_with("cloud:start"))
        .expect("spoke");
    // First female-bucket profile with an available voice is Jenny.
    assert!(
        chosen.ends_with("en-US-JennyNeural"),
        "female bucket default chosen: {chosen}"
    );
}

#[tokio::test(start_paused = true)]
async fn recognition_start_without_backends_fails_fast() {
    let service = VoiceService::with_backends(&test_config(), None, None, None, None);

    let err = service.start_recognition().await.expect_err("unsupported");
    assert!(matches!(err, Error::Unsupported(_)));
    assert!(service.recognition_backend().is_none());
}

#[tokio::test(start_paused = true)]
async fn recognition_prefers_cloud_and_falls_back_to_platform() {
    let cloud = scripted_recognizer(BackendKind::Cloud, Vec::new());
    let platform = scripted_recognizer(BackendKind::Platform, Vec::new());

    let service = VoiceService::with_backends(
        &test_config(),
        Some(cloud),
        Some(Arc::clone(&platform)),
        None,
        None,
    );
    assert_eq!(service.recognition_backend(), Some(BackendKind::Cloud));

    // Cloud unavailable: the platform carries the session.
    let unavailable = unavailable_recognizer(BackendKind::Cloud);
    let service = VoiceService::with_backends(
        &test_config(),
        Some(unavailable),
        Some(platform),
        None,
        None,
    );
    assert_eq!(service.recognition_backend(), Some(BackendKind::Platform));
}

#[tokio::test(start_paused = true)]
async fn scripted_turn_commits_exactly_once() {
    // Full path: recognizer events -> router pump -> segmenter -> UI events.
    let recognizer = scripted_recognizer(
        BackendKind::Platform,
        vec![
            ScriptStep::Interim("hello"),
            ScriptStep::Wait(100),
            ScriptStep::Final("hello world"),
            ScriptStep::Wait(50),
            ScriptStep::Pause,
        ],
    );

    let service = VoiceService::with_backends(&test_config(), None, Some(recognizer), None, None);
    let mut events = service.take_events().expect("events");

    service.start_recognition().await.expect("start");

    // Script (150ms) + continuation (2000ms) + final commit (1000ms).
    tokio::time::sleep(Duration::from_millis(4000)).await;
    tokio::task::yield_now().await;

    let mut interims = Vec::new();
    let mut utterances = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SegmenterEvent::Interim(text) => interims.push(text),
            SegmenterEvent::Utterance(text) => utterances.push(text),
            _ => {}
        }
    }

    assert!(interims.contains(&"hello".to_string()));
    assert_eq!(utterances, vec!["hello world".to_string()]);
    assert!(!service.is_listening().await);
}

#[tokio::test(start_paused = true)]
async fn recognizer_error_reaches_the_ui_without_a_commit() {
    let recognizer = scripted_recognizer(
        BackendKind::Platform,
        vec![
            ScriptStep::Final("half a sentence"),
            ScriptStep::Wait(10),
            ScriptStep::Error("network"),
        ],
    );

    let service = VoiceService::with_backends(&test_config(), None, Some(recognizer), None, None);
    let mut events = service.take_events().expect("events");

    service.start_recognition().await.expect("start");
    tokio::time::sleep(Duration::from_millis(5000)).await;
    tokio::task::yield_now().await;

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SegmenterEvent::Utterance(text) => panic!("unexpected commit: {text}"),
            SegmenterEvent::Error(code) => {
                assert_eq!(code, "network");
                saw_error = true;
            }
            _ => {}
        }
    }
    assert!(saw_error);
}

#[tokio::test(start_paused = true)]
async fn toggle_flips_listening_state() {
    let recognizer = scripted_recognizer(BackendKind::Platform, vec![ScriptStep::Wait(60_000)]);

    let service = VoiceService::with_backends(&test_config(), None, Some(recognizer), None, None);

    assert!(service.toggle_recognition().await.expect("toggle on"));
    assert!(service.is_listening().await);

    assert!(!service.toggle_recognition().await.expect("toggle off"));
    assert!(!service.is_listening().await);
}
