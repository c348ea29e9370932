use std::sync::Arc;

use services::{AdaptiveTestService, Clock, Question, QuestionPool, TutorServices};
use storage::repository::{InMemoryRepository, MasteryRepository, TestSummaryRepository};
use tutor_core::difficulty::{DEFAULT_QUESTION_LIMIT, DifficultyLevel};
use tutor_core::mastery::MasteryLabel;
use tutor_core::model::{QuestionId, TopicId, UserId};
use tutor_core::time::fixed_now;

/// Four questions per tier, alternating between topics 1 and 2.
fn pool() -> QuestionPool {
    let mut questions = Vec::new();
    for (tier, level) in DifficultyLevel::all().into_iter().enumerate() {
        for n in 0..4_u64 {
            let id = (tier as u64) * 10 + n + 1;
            questions.push(Question::new(
                QuestionId::new(id),
                TopicId::new(n % 2 + 1),
                level,
            ));
        }
    }
    QuestionPool::new(questions)
}

async fn run_test(
    svc: &AdaptiveTestService,
    pool: &QuestionPool,
    user: UserId,
    answer: impl Fn(&Question) -> bool,
) -> services::AdaptiveAnswerResult {
    let mut runner = svc.start(user, pool).unwrap();
    loop {
        let question = *runner.next_question(pool).expect("question available");
        let result = svc
            .answer(&mut runner, pool, question.id, answer(&question), Some(20))
            .await
            .unwrap();
        if result.is_complete {
            return result;
        }
    }
}

#[tokio::test]
async fn perfect_test_climbs_to_hard_and_masters_topics() {
    let repo = InMemoryRepository::new();
    let svc = AdaptiveTestService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let user = UserId::new(1);

    let result = run_test(&svc, &pool(), user, |_| true).await;

    assert_eq!(result.state.total_answered(), DEFAULT_QUESTION_LIMIT);
    assert_eq!(result.state.score(), DEFAULT_QUESTION_LIMIT);
    assert_eq!(result.state.difficulty(), DifficultyLevel::HARD);

    let summary = repo.get_summary(result.summary_id.unwrap()).await.unwrap();
    assert_eq!(summary.correct(), DEFAULT_QUESTION_LIMIT);
    assert_eq!(summary.peak_difficulty(), DifficultyLevel::HARD);
    assert_eq!(summary.accuracy_percentage().value(), 100);

    let mastery = repo.list_mastery(user).await.unwrap();
    assert_eq!(mastery.len(), 2);
    for record in &mastery {
        assert_eq!(record.progress().value(), 100);
        assert_eq!(record.label(), MasteryLabel::Mastered);
        assert_eq!(record.last_practiced_at(), fixed_now());
    }
}

#[tokio::test]
async fn second_test_blends_with_first() {
    let repo = InMemoryRepository::new();
    let svc = AdaptiveTestService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let user = UserId::new(2);
    let pool = pool();

    run_test(&svc, &pool, user, |_| true).await;
    let result = run_test(&svc, &pool, user, |_| false).await;

    // Every miss keeps the learner at the easiest tier.
    assert_eq!(result.state.difficulty(), DifficultyLevel::EASY);
    assert_eq!(result.state.score(), 0);

    // round(100 * 0.4 + 0 * 0.6) = 40
    assert_eq!(result.mastery.len(), 2);
    for record in &result.mastery {
        assert_eq!(record.progress().value(), 40);
        assert_eq!(record.label(), MasteryLabel::Weak);
    }

    let summaries = svc.recent_summaries(user, 10).await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries[0].id > summaries[1].id);
}

#[tokio::test]
async fn mixed_answers_split_topics() {
    let repo = InMemoryRepository::new();
    let svc = AdaptiveTestService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let user = UserId::new(3);

    let result = run_test(&svc, &pool(), user, |q| q.topic_id == TopicId::new(1)).await;

    let topic_one = repo.get_mastery(user, TopicId::new(1)).await.unwrap().unwrap();
    let topic_two = repo.get_mastery(user, TopicId::new(2)).await.unwrap().unwrap();
    assert_eq!(topic_one.label(), MasteryLabel::Mastered);
    assert_eq!(topic_two.label(), MasteryLabel::NotAttempted);
    assert!(result.state.difficulty() <= DifficultyLevel::MEDIUM);
}

#[tokio::test]
async fn sqlite_backed_services_persist_results() {
    let url = "sqlite:file:memdb_services_flow?mode=memory&cache=shared";
    let services = TutorServices::new_sqlite(url, Clock::fixed(fixed_now()))
        .await
        .expect("sqlite services");
    let user = UserId::new(9);

    let result = run_test(&services.adaptive_tests(), &pool(), user, |_| true).await;
    assert!(result.summary_id.is_some());

    let overview = services.mastery().mastery_overview(user).await.unwrap();
    let topics: Vec<u64> = overview.iter().map(|r| r.topic_id().value()).collect();
    assert_eq!(topics, vec![1, 2]);

    let recent = services
        .adaptive_tests()
        .recent_summaries(user, 5)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].summary.total_answered(), DEFAULT_QUESTION_LIMIT);
}
