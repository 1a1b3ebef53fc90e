use std::time::{Duration, Instant};

use tokio::time::timeout;

use birdquiz::quiz::{QuizAction, SqliteResultRecorder};
use birdquiz::serial::{token_to_action, DebounceFilter, LineAccumulator};
use birdquiz::{
    Bird, Database, FinishReason, KioskRuntime, KioskSettings, PlayerContext, QuizEvent,
    QuizSettings, QuizStatus, ResultRecorder, SerialSettings, SessionOutcome,
};

const WAIT: Duration = Duration::from_secs(5);

fn kiosk_settings(cooldown_ms: u64) -> KioskSettings {
    KioskSettings {
        serial: SerialSettings {
            port: "none".into(),
            ..Default::default()
        },
        quiz: QuizSettings {
            question_count: 5,
            time_limit_seconds: 60,
            submit_cooldown_ms: cooldown_ms,
        },
    }
}

async fn seeded_db(dir: &tempfile::TempDir, names: &[&str]) -> Database {
    let db = Database::new(dir.path().join("kiosk.sqlite3")).unwrap();
    for name in names {
        db.insert_bird(&Bird {
            name: name.to_string(),
            image_ref: format!("{name}.jpg"),
            category: "ducks".into(),
        })
        .await
        .unwrap();
    }
    db
}

fn outcome(score: u32, duration_seconds: u32) -> SessionOutcome {
    SessionOutcome {
        score,
        answered: 5,
        duration_seconds,
        is_perfect_score: score == 5,
        reason: FinishReason::Completed,
    }
}

#[test]
fn duplicate_device_lines_collapse_to_one_action() {
    let mut accumulator = LineAccumulator::new();
    let mut debounce = DebounceFilter::new(Duration::from_millis(200));
    let t0 = Instant::now();

    // The panel echoes "BLUE" twice within 50ms of a single press.
    let feed: [(&[u8], Instant); 2] = [
        (b"BLUE\n", t0),
        (b"blue\n", t0 + Duration::from_millis(50)),
    ];

    let mut actions = Vec::new();
    for (bytes, at) in feed {
        for token in accumulator.push(bytes) {
            if debounce.accept(&token, at) {
                if let Some(action) = token_to_action(&token) {
                    actions.push(action);
                }
            }
        }
    }

    assert_eq!(actions, vec![QuizAction::SelectOption(0)]);
}

#[tokio::test]
async fn full_session_round_trips_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(
        &dir,
        &["mallard", "wood duck", "pintail", "teal", "wigeon", "gadwall"],
    )
    .await;

    let runtime = KioskRuntime::start(
        db.clone(),
        kiosk_settings(0),
        "ducks".into(),
        PlayerContext::new("Robin", "robin@example.com"),
    );
    let quiz = runtime.quiz().clone();
    let mut events = quiz.subscribe_events();
    let mut view = quiz.view();

    quiz.restart();
    timeout(WAIT, view.wait_for(|v| v.status == QuizStatus::InProgress))
        .await
        .expect("session never started")
        .unwrap();

    // Answer every question with the first option; cooldown is disabled.
    for _ in 0..5 {
        quiz.select_option(0);
        quiz.submit();
    }

    {
        let finished = timeout(WAIT, view.wait_for(|v| v.status == QuizStatus::Finished))
            .await
            .expect("session never finished")
            .unwrap();
        assert_eq!(finished.answered, 5);
        assert!(finished.score <= 5);
    }

    let mut saw_finished = false;
    while let Ok(Ok(event)) = timeout(WAIT, events.recv()).await {
        if let QuizEvent::Finished { outcome, .. } = event {
            assert_eq!(outcome.answered, 5);
            assert_eq!(outcome.reason, FinishReason::Completed);
            saw_finished = true;
            break;
        }
    }
    assert!(saw_finished);

    let attempts = db.list_attempts("ducks").await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].first_name, "Robin");
    assert_eq!(attempts[0].total_questions, 5);

    let best = db.best_attempt("ducks").await.unwrap().unwrap();
    assert_eq!(best.total, 5);

    runtime.shutdown();
}

#[tokio::test]
async fn short_bank_blocks_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir, &["mallard", "teal"]).await;

    let runtime = KioskRuntime::start(
        db,
        kiosk_settings(1_000),
        "ducks".into(),
        PlayerContext::anonymous(),
    );
    let quiz = runtime.quiz().clone();
    let mut events = quiz.subscribe_events();

    quiz.restart();

    let event = timeout(WAIT, events.recv())
        .await
        .expect("no event after failed restart")
        .unwrap();
    assert!(matches!(event, QuizEvent::SessionError { .. }));
    assert_eq!(quiz.view().borrow().status, QuizStatus::NotStarted);

    runtime.shutdown();
}

#[tokio::test]
async fn best_attempt_applies_the_tie_break() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir, &[]).await;
    let recorder = SqliteResultRecorder::new(db.clone());
    let player = PlayerContext::anonymous();

    recorder
        .record_attempt(&player, "ducks", &outcome(4, 30))
        .await
        .unwrap();
    recorder
        .record_attempt(&player, "ducks", &outcome(4, 25))
        .await
        .unwrap();
    recorder
        .record_attempt(&player, "ducks", &outcome(3, 5))
        .await
        .unwrap();

    let best = db.best_attempt("ducks").await.unwrap().unwrap();
    assert_eq!(best.score, 4);
    assert_eq!(best.duration_seconds, 25);

    assert!(db.best_attempt("raptors").await.unwrap().is_none());
}
