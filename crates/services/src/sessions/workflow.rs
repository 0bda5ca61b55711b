use std::sync::Arc;

use quiz_core::model::{TestId, TestResult, UserId};
use storage::repository::{
    ProfileRepository, QuestionRepository, ResultRepository, StorageError, TestRepository,
};

use super::queries::SessionQueries;
use super::service::{SessionService, TickOutcome};
use super::view::{QuestionReview, TestResultId, review_breakdown};
use crate::Clock;
use crate::error::SessionError;

/// How the finalize side effects fared.
#[derive(Debug)]
pub enum SaveStatus {
    /// Result row appended and profile aggregate incremented.
    Saved(TestResultId),
    /// A persistence step failed. The session stays Finished and keeps its
    /// computed result; [`SessionLoopService::retry_persist`] may be offered
    /// to the user, the engine never retries on its own.
    Failed(StorageError),
    /// Replay of an earlier finalize whose persistence did not complete.
    /// The original call already surfaced the failure.
    Unsaved,
}

impl SaveStatus {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved(_))
    }
}

/// Everything the presentation layer needs after a session ends.
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub result: TestResult,
    /// Per-question review in session order.
    pub breakdown: Vec<QuestionReview>,
    pub save: SaveStatus,
}

/// Orchestrates session start, countdown handling and the one-time finalize.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    tests: Arc<dyn TestRepository>,
    questions: Arc<dyn QuestionRepository>,
    results: Arc<dyn ResultRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        tests: Arc<dyn TestRepository>,
        questions: Arc<dyn QuestionRepository>,
        results: Arc<dyn ResultRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            tests,
            questions,
            results,
            profiles,
        }
    }

    /// Start a new session for the given test and user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for fetch failures and
    /// `SessionError::EmptyQuestionSet` for a test without questions (the
    /// caller renders the no-content state and starts no timer).
    pub async fn start_session(
        &self,
        test_id: TestId,
        user_id: UserId,
    ) -> Result<SessionService, SessionError> {
        let now = self.clock.now();
        let (_test, session) = SessionQueries::start_from_storage(
            test_id,
            user_id,
            self.tests.as_ref(),
            self.questions.as_ref(),
            now,
        )
        .await?;
        Ok(session)
    }

    /// Apply one countdown tick; finalizes automatically when the tick
    /// reaches the deadline.
    ///
    /// Returns `Some(outcome)` exactly once, on the expiry tick of an active
    /// session. Ticks on a finished session are absorbed.
    ///
    /// # Errors
    ///
    /// Propagates finalize errors from the expiry path.
    pub async fn handle_tick(
        &self,
        session: &mut SessionService,
    ) -> Result<Option<FinalizeOutcome>, SessionError> {
        match session.tick() {
            TickOutcome::Running(_) | TickOutcome::Stopped => Ok(None),
            TickOutcome::Expired => Ok(Some(self.finish(session).await?)),
        }
    }

    /// Finish the session: score it, persist the result once and apply the
    /// profile increment once.
    ///
    /// The finished flag flips before any persistence is attempted, so the
    /// duplicate trigger in the finish/expiry race observes Finished and is
    /// served a replay of the retained outcome instead of re-scoring — this
    /// is what keeps the profile aggregate from double-counting.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` if scoring rejects the session state.
    /// Persistence failures do NOT error: they come back as
    /// `SaveStatus::Failed` with the session left Finished.
    pub async fn finish(
        &self,
        session: &mut SessionService,
    ) -> Result<FinalizeOutcome, SessionError> {
        if session.is_finished() {
            return Self::replay(session);
        }

        let remaining_at_finish = session.begin_finish()?;
        let result = TestResult::from_answers(
            session.test(),
            session.user_id(),
            session.questions(),
            session.answers().clone(),
            remaining_at_finish,
            self.clock.now(),
        )?;
        session.set_result(result.clone());

        let save = match self.persist(session, &result).await {
            Ok(id) => SaveStatus::Saved(id),
            Err(e) => SaveStatus::Failed(e),
        };

        Ok(FinalizeOutcome {
            breakdown: review_breakdown(session.questions(), result.answers()),
            result,
            save,
        })
    }

    /// Retry persistence for a finished session whose save failed.
    ///
    /// Reuses the result computed at finish — never re-scores — and only
    /// re-runs the steps that did not complete, so a profile increment that
    /// already landed is not applied twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` if the session is still active
    /// and `SessionError::Storage` if persistence fails again.
    pub async fn retry_persist(
        &self,
        session: &mut SessionService,
    ) -> Result<TestResultId, SessionError> {
        if !session.is_finished() {
            return Err(SessionError::NotFinished);
        }
        let result = session.result().cloned().ok_or(SessionError::NotFinished)?;
        Ok(self.persist(session, &result).await?)
    }

    /// Run the two persistence steps, skipping whichever already completed.
    async fn persist(
        &self,
        session: &mut SessionService,
        result: &TestResult,
    ) -> Result<TestResultId, StorageError> {
        let result_id = match session.result_id() {
            Some(id) => id,
            None => {
                let id = self.results.append_result(result).await?;
                session.set_result_id(id);
                id
            }
        };

        if !session.profile_applied() {
            self.profiles
                .increment_stats(result.user_id(), result.score())
                .await?;
            session.set_profile_applied();
        }

        Ok(result_id)
    }

    /// Duplicate-finalize path: rebuild the outcome from retained state.
    fn replay(session: &SessionService) -> Result<FinalizeOutcome, SessionError> {
        let result = session
            .result()
            .cloned()
            .ok_or(SessionError::AlreadyFinished)?;
        let save = match session.result_id() {
            Some(id) if session.profile_applied() => SaveStatus::Saved(id),
            _ => SaveStatus::Unsaved,
        };
        Ok(FinalizeOutcome {
            breakdown: review_breakdown(session.questions(), result.answers()),
            result,
            save,
        })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{Difficulty, ProfileStats, Question, QuestionId, SubjectId, Test};
    use quiz_core::time::{fixed_clock, fixed_now};
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{InMemoryRepository, TestResultRow};

    fn build_fixture(question_count: usize, limit_minutes: u32) -> (Test, Vec<Question>) {
        let test = Test::new(
            TestId::generate(),
            SubjectId::generate(),
            "Fixture",
            None,
            Difficulty::Medium,
            limit_minutes,
            question_count as u32,
            fixed_now(),
        )
        .unwrap();
        let questions = (0..question_count)
            .map(|i| {
                Question::new(
                    QuestionId::generate(),
                    test.id(),
                    format!("Q{i}"),
                    vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    i % 4,
                    None,
                    fixed_now() + chrono::Duration::seconds(i as i64),
                )
                .unwrap()
            })
            .collect();
        (test, questions)
    }

    async fn seeded_service(
        test: &Test,
        questions: &[Question],
    ) -> (SessionLoopService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_test(test).await.unwrap();
        for q in questions {
            repo.upsert_question(q).await.unwrap();
        }
        let service = SessionLoopService::new(
            fixed_clock(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
        );
        (service, repo)
    }

    /// Results repository that fails its first append, then recovers.
    struct FlakyResults {
        inner: InMemoryRepository,
        fail_next: AtomicBool,
    }

    impl FlakyResults {
        fn new() -> Self {
            Self {
                inner: InMemoryRepository::new(),
                fail_next: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl ResultRepository for FlakyResults {
        async fn append_result(&self, result: &TestResult) -> Result<i64, StorageError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Connection("simulated outage".into()));
            }
            self.inner.append_result(result).await
        }

        async fn get_result(&self, id: i64) -> Result<TestResult, StorageError> {
            self.inner.get_result(id).await
        }

        async fn list_for_user(
            &self,
            user_id: UserId,
            limit: u32,
        ) -> Result<Vec<TestResultRow>, StorageError> {
            self.inner.list_for_user(user_id, limit).await
        }
    }

    #[tokio::test]
    async fn scenario_a_partial_answers_score_fifty() {
        let (test, questions) = build_fixture(4, 10);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        // answer 0 and 2 correctly, 1 incorrectly, leave 3 unanswered
        session.select_answer(questions[0].id(), 0).unwrap();
        session.select_answer(questions[1].id(), 0).unwrap();
        session.select_answer(questions[2].id(), 2).unwrap();

        // one minute on the clock before finishing
        for _ in 0..60 {
            service.handle_tick(&mut session).await.unwrap();
        }

        let outcome = service.finish(&mut session).await.unwrap();
        assert_eq!(outcome.result.score(), 50);
        assert_eq!(outcome.result.total_questions(), 4);
        assert_eq!(outcome.result.correct_count(), 2);
        assert_eq!(outcome.result.time_taken_seconds(), 60);
        assert!(outcome.save.is_saved());

        let breakdown = &outcome.breakdown;
        assert_eq!(breakdown.len(), 4);
        assert!(breakdown[0].is_correct);
        assert!(!breakdown[1].is_correct);
        assert!(breakdown[2].is_correct);
        assert_eq!(breakdown[3].chosen, None);

        let stats = repo.get_stats(user).await.unwrap();
        assert_eq!(stats, ProfileStats::new(user, 50, 1));
    }

    #[tokio::test]
    async fn scenario_b_immediate_finish_scores_zero() {
        let (test, questions) = build_fixture(4, 10);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        let outcome = service.finish(&mut session).await.unwrap();

        assert_eq!(outcome.result.score(), 0);
        assert_eq!(outcome.result.time_taken_seconds(), 0);
        assert_eq!(repo.get_stats(user).await.unwrap().total_score(), 0);
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test]
    async fn scenario_c_timeout_finalizes_exactly_once_with_full_limit() {
        let (test, questions) = build_fixture(2, 1); // 60 seconds
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        session.select_answer(questions[0].id(), 0).unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..120 {
            if let Some(outcome) = service.handle_tick(&mut session).await.unwrap() {
                outcomes.push(outcome);
            }
        }

        // the expiry tick finalized exactly once; later ticks were absorbed
        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert_eq!(outcome.result.time_taken_seconds(), 60);
        assert!(outcome.save.is_saved());
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test]
    async fn scenario_d_empty_test_never_opens() {
        let (test, _) = build_fixture(0, 10);
        let (service, _repo) = seeded_service(&test, &[]).await;

        let err = service
            .start_session(test.id(), UserId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyQuestionSet));
    }

    #[tokio::test]
    async fn duplicate_finish_replays_without_second_persist() {
        let (test, questions) = build_fixture(2, 10);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        session.select_answer(questions[0].id(), 0).unwrap();

        let first = service.finish(&mut session).await.unwrap();
        let second = service.finish(&mut session).await.unwrap();

        assert_eq!(first.result, second.result);
        let (SaveStatus::Saved(first_id), SaveStatus::Saved(second_id)) =
            (&first.save, &second.save)
        else {
            panic!("both outcomes should be saved");
        };
        assert_eq!(first_id, second_id);

        // exactly one row and one increment
        assert_eq!(repo.list_for_user(user, 10).await.unwrap().len(), 1);
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test]
    async fn expiry_and_explicit_finish_race_persists_once() {
        let (test, questions) = build_fixture(1, 1);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        for _ in 0..59 {
            assert!(service.handle_tick(&mut session).await.unwrap().is_none());
        }
        // the boundary tick wins the race...
        let from_timer = service.handle_tick(&mut session).await.unwrap().unwrap();
        assert!(from_timer.save.is_saved());
        // ...and the user's finish click arriving right after is a no-op replay
        let from_click = service.finish(&mut session).await.unwrap();
        assert_eq!(from_click.result, from_timer.result);

        assert_eq!(repo.list_for_user(user, 10).await.unwrap().len(), 1);
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_session_finished_and_retry_reuses_result() {
        let (test, questions) = build_fixture(2, 10);
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_test(&test).await.unwrap();
        for q in &questions {
            repo.upsert_question(q).await.unwrap();
        }
        let flaky = Arc::new(FlakyResults::new());
        let service = SessionLoopService::new(
            fixed_clock(),
            repo.clone(),
            repo.clone(),
            flaky.clone(),
            repo.clone(),
        );
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        session.select_answer(questions[0].id(), 0).unwrap();

        let outcome = service.finish(&mut session).await.unwrap();
        assert!(matches!(outcome.save, SaveStatus::Failed(_)));
        assert!(session.is_finished());
        // the computed result is retained for the user despite the failure
        assert_eq!(session.result().unwrap().score(), 50);
        // the increment never ran: result append failed first
        assert!(repo.get_stats(user).await.is_err());

        // manual retry reuses the retained result and completes both steps
        let id = service.retry_persist(&mut session).await.unwrap();
        assert_eq!(session.result_id(), Some(id));
        assert_eq!(flaky.get_result(id).await.unwrap().score(), 50);
        let stats = repo.get_stats(user).await.unwrap();
        assert_eq!(stats.total_score(), 50);
        assert_eq!(stats.tests_taken(), 1);

        // a second retry is a pure no-op on both stores
        let same = service.retry_persist(&mut session).await.unwrap();
        assert_eq!(same, id);
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test]
    async fn retry_on_active_session_is_refused() {
        let (test, questions) = build_fixture(1, 10);
        let (service, _repo) = seeded_service(&test, &questions).await;

        let mut session = service
            .start_session(test.id(), UserId::generate())
            .await
            .unwrap();
        let err = service.retry_persist(&mut session).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFinished));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_timer_drives_the_session_to_timeout() {
        use super::super::timer::DeadlineTimer;

        let (test, questions) = build_fixture(2, 1);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        session.select_answer(questions[1].id(), 1).unwrap();

        let (handle, mut ticks) = DeadlineTimer::start(session.remaining_seconds());
        let mut outcome = None;
        while let Some(_tick) = ticks.recv().await {
            if let Some(done) = service.handle_tick(&mut session).await.unwrap() {
                outcome = Some(done);
                break;
            }
        }
        drop(ticks);
        assert!(handle.is_stopped() || session.is_finished());

        let outcome = outcome.expect("timer should have forced completion");
        assert_eq!(outcome.result.time_taken_seconds(), 60);
        assert_eq!(outcome.result.score(), 50);
        assert_eq!(repo.get_stats(user).await.unwrap().tests_taken(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_a_session_cancels_the_timer_and_persists_nothing() {
        use super::super::timer::DeadlineTimer;

        let (test, questions) = build_fixture(2, 10);
        let (service, repo) = seeded_service(&test, &questions).await;
        let user = UserId::generate();

        let mut session = service.start_session(test.id(), user).await.unwrap();
        let (handle, mut ticks) = DeadlineTimer::start(session.remaining_seconds());

        // a few seconds in, the user navigates away
        for _ in 0..3 {
            ticks.recv().await.unwrap();
            service.handle_tick(&mut session).await.unwrap();
        }
        handle.cancel();
        while ticks.recv().await.is_some() {}

        // no deadline signal fires later and nothing was persisted
        assert!(!session.is_finished());
        assert!(repo.get_stats(user).await.is_err());
        assert!(repo.list_for_user(user, 10).await.unwrap().is_empty());
    }
}
