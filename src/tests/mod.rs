mod game_lobby;

pub(crate) mod support {
    use std::{sync::Arc, time::Duration};

    use tracing::level_filters::LevelFilter;

    use crate::{
        lobby::{models::LobbyEvent, player::PlayerFeed},
        question::models::{Question, QuestionPool, QuestionView},
    };

    pub fn setup_logging() {
        let _ = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    }

    /// `size` questions, ids `q1..`, four options each, correct index `i % 4`.
    pub fn question_pool(size: usize) -> Arc<QuestionPool> {
        let questions = (0..size)
            .map(|i| Question {
                id: format!("q{}", i + 1),
                question_text: format!("Question number {}?", i + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_index: i % 4,
            })
            .collect();

        Arc::new(QuestionPool::new(questions))
    }

    pub fn correct_answer(pool: &QuestionPool, question_id: &str) -> usize {
        pool.questions()
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.correct_index)
            .expect("question is in the pool")
    }

    pub fn wrong_answer(pool: &QuestionPool, question_id: &str) -> usize {
        (correct_answer(pool, question_id) + 1) % 4
    }

    pub async fn next_event(feed: &mut PlayerFeed) -> Option<LobbyEvent> {
        tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .expect("timed out waiting for lobby event")
    }

    /// Skips anything that is not a question.
    pub async fn next_question(feed: &mut PlayerFeed) -> QuestionView {
        loop {
            match next_event(feed).await {
                Some(LobbyEvent::Question { question }) => return question,
                Some(_) => continue,
                None => panic!("feed closed before the next question"),
            }
        }
    }
}
