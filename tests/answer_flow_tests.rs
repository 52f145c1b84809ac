use quizround::eligibility::RejectionReason;
use quizround::prize_round::RoundKind;
use quizround::questions::models::AnswerOption;
use quizround::scoring::{PointType, RoundMode};
use quizround::{AnswerOutcome, QuestionOutcome};

mod utils;

use utils::*;

fn scored(outcome: AnswerOutcome) -> Box<quizround::questions::AnswerResult> {
    match outcome {
        AnswerOutcome::Scored(result) => result,
        other => panic!("expected a scored answer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_free_continuous_correct_answer_with_streak_three() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).played_today_with_streak(3).build()])
        .with_questions(vec![question("q1")])
        .build();

    let result = scored(setup.play(1, "a", 5).await);

    assert!(result.is_correct);
    assert_eq!(result.point_type, PointType::Ap);
    assert_eq!(result.breakdown.base, 5);
    assert_eq!(result.breakdown.speed_bonus, 0);
    assert_eq!(result.breakdown.streak_bonus, 5);
    assert_eq!(result.breakdown.total, 10);
    assert!(result.persisted);

    let stored = setup.user(1).await;
    assert_eq!(stored.ap, 10);
    assert_eq!(stored.weekly_points, 10);
    assert_eq!(stored.pp, 0);
    assert_eq!(stored.total_questions, 1);
    assert_eq!(stored.correct_answers, 1);
    assert_eq!(result.rank, Some(1));
}

#[tokio::test]
async fn test_second_submission_for_same_session_is_expired() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .build();

    let payload = setup.deliver(1).await;
    setup.wait_on(1, &payload.question_id, 6).await;

    scored(setup.answer(1, &payload.question_id, "A").await);
    let replay = setup.answer(1, &payload.question_id, "A").await;

    assert!(matches!(replay, AnswerOutcome::Expired { .. }));
    assert_eq!(setup.store.attempt_count().await, 1);
    assert_eq!(setup.user(1).await.ap, 5);
}

#[tokio::test]
async fn test_wrong_answer_scores_nothing_but_counts() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![QuestionBuilder::new("q1").correct(AnswerOption::C).build()])
        .build();

    let result = scored(setup.play(1, "a", 8).await);

    assert!(!result.is_correct);
    assert_eq!(result.breakdown.total, 0);
    assert_eq!(result.correct_option, AnswerOption::C);
    assert_eq!(result.correct_answer, "Tamale");

    let stored = setup.user(1).await;
    assert_eq!(stored.ap, 0);
    assert_eq!(stored.total_questions, 1);
    assert_eq!(stored.correct_answers, 0);
}

#[tokio::test]
async fn test_free_user_cannot_retry_answered_question() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1"), question("q2")])
        .build();

    let first = setup.deliver(1).await;
    setup.wait_on(1, &first.question_id, 5).await;
    scored(setup.answer(1, &first.question_id, "B").await);

    match setup.retry_question(1, &first.question_id).await {
        QuestionOutcome::Rejected(rejection) => {
            assert_eq!(rejection.reason, RejectionReason::AlreadyAnswered)
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    // Random draws skip the answered question
    let next = setup.deliver(1).await;
    assert_ne!(next.question_id, first.question_id);
}

#[tokio::test]
async fn test_subscriber_gets_one_discounted_second_prize_attempt() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(7).subscriber().build()])
        .with_questions(vec![question("q1")])
        .build();
    setup
        .state
        .prize_round
        .start_round(RoundKind::Morning)
        .await
        .unwrap();

    let first = scored(setup.play(7, "D", 5).await);
    assert!(!first.is_correct);
    assert!(first.second_attempt_available);

    let retry = match setup.retry_question(7, "q1").await {
        QuestionOutcome::Delivered(payload) => payload,
        other => panic!("expected second attempt, got {:?}", other),
    };
    assert_eq!(retry.attempt_number, 2);
    assert_eq!(retry.mode, RoundMode::PrizeRound);

    setup.wait_on(7, "q1", 5).await;
    let second = scored(setup.answer(7, "q1", "A").await);
    assert_eq!(second.attempt_number, 2);
    assert_eq!(second.point_type, PointType::Pp);
    assert_eq!(second.breakdown.base, 12);
    assert_eq!(second.breakdown.speed_bonus, 7);
    assert_eq!(second.breakdown.total, 19);

    let stored = setup.user(7).await;
    assert_eq!(stored.pp, 19);
    assert_eq!(stored.weekly_points, 19);

    match setup.retry_question(7, "q1").await {
        QuestionOutcome::Rejected(rejection) => {
            assert_eq!(rejection.reason, RejectionReason::AttemptsExhausted)
        }
        other => panic!("expected attempts exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_question_issued_before_round_start_keeps_continuous_scoring() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .build();

    let payload = setup.deliver(1).await;
    assert_eq!(payload.mode, RoundMode::Continuous);

    setup
        .state
        .prize_round
        .start_round(RoundKind::Morning)
        .await
        .unwrap();
    setup.wait_on(1, &payload.question_id, 3).await;
    let result = scored(setup.answer(1, &payload.question_id, "A").await);

    assert_eq!(result.point_type, PointType::Ap);
    assert_eq!(result.breakdown.base, 5);
    assert_eq!(result.breakdown.speed_bonus, 0);
    assert_eq!(result.breakdown.total, 5);

    let stored = setup.user(1).await;
    assert_eq!(stored.ap, 5);
    assert_eq!(stored.pp, 0);
}

#[tokio::test]
async fn test_question_issued_during_round_keeps_prize_scoring_after_end() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .build();
    setup
        .state
        .prize_round
        .start_round(RoundKind::Evening)
        .await
        .unwrap();

    let payload = setup.deliver(1).await;
    assert_eq!(payload.mode, RoundMode::PrizeRound);

    setup.state.prize_round.end_round().await.unwrap();
    assert_eq!(setup.mode().await, RoundMode::Continuous);

    setup.wait_on(1, &payload.question_id, 3).await;
    let result = scored(setup.answer(1, &payload.question_id, "A").await);

    assert_eq!(result.point_type, PointType::Pp);
    assert_eq!(result.breakdown.total, 15);
    assert_eq!(setup.user(1).await.pp, 15);
}

#[tokio::test]
async fn test_too_fast_answer_is_discarded_and_consumes_session() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .build();

    let payload = setup.deliver(1).await;
    match setup.answer(1, &payload.question_id, "A").await {
        AnswerOutcome::Discarded(rejection) => {
            assert_eq!(rejection.reason, RejectionReason::AnswerTooFast)
        }
        other => panic!("expected discard, got {:?}", other),
    }

    let replay = setup.answer(1, &payload.question_id, "A").await;
    assert!(matches!(replay, AnswerOutcome::Expired { .. }));
    assert_eq!(setup.store.attempt_count().await, 0);
}

#[tokio::test]
async fn test_read_only_store_still_scores_without_persisting() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .read_only()
        .build();

    let result = scored(setup.play(1, "A", 5).await);

    assert_eq!(result.breakdown.total, 5);
    assert_eq!(result.totals.ap, 5);
    assert!(!result.persisted);
    assert_eq!(setup.user(1).await.ap, 0);
    assert_eq!(setup.store.attempt_count().await, 0);
}

#[tokio::test]
async fn test_exhausted_bank_reports_unavailable() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![question("q1")])
        .build();

    scored(setup.play(1, "A", 5).await);

    assert!(matches!(
        setup.request_question(1).await,
        QuestionOutcome::Unavailable { .. }
    ));
}

#[tokio::test]
async fn test_banned_user_is_refused_a_question() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).banned().build()])
        .with_questions(vec![question("q1")])
        .build();

    match setup.request_question(1).await {
        QuestionOutcome::Rejected(rejection) => {
            assert_eq!(rejection.reason, RejectionReason::Banned)
        }
        other => panic!("expected ban rejection, got {:?}", other),
    }
    assert!(setup.state.questions.registry().is_empty().await);
}

#[tokio::test]
async fn test_sponsor_label_travels_with_question() {
    let setup = TestSetupBuilder::new()
        .with_users(vec![UserBuilder::new(1).build()])
        .with_questions(vec![QuestionBuilder::new("q1").sponsored_by("Acme").build()])
        .build();

    let payload = setup.deliver(1).await;
    assert_eq!(payload.sponsor.as_deref(), Some("Acme"));
    assert_eq!(payload.options.len(), 4);
    assert_eq!(payload.time_limit_seconds, 30);
}
