#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use crate::{
        lobby::{
            error::{LobbyError, SubmissionError},
            game_lobby::GameLobby,
            models::{AnswerOutcome, GameState, LobbyEvent},
            player::FeedClosed,
        },
        question::models::QuestionPool,
        tests::support::{
            correct_answer, next_event, next_question, question_pool, setup_logging, wrong_answer,
        },
    };

    fn lobby(pool: &Arc<QuestionPool>, question_count: usize, countdown_ms: u64) -> Arc<GameLobby> {
        Arc::new(GameLobby::new(
            "test-lobby",
            question_count,
            countdown_ms,
            Arc::clone(pool),
        ))
    }

    #[tokio::test]
    async fn start_selects_requested_number_of_distinct_questions() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 4, 0);
        lobby.add_player("p1").unwrap();

        let started = lobby.start_game("p1").unwrap();
        assert_eq!(started.question_count, 4);

        let selected = lobby.selected_questions();
        let ids: HashSet<_> = selected.iter().map(|q| q.id.clone()).collect();
        assert_eq!(selected.len(), 4);
        assert_eq!(ids.len(), 4);
        assert!(selected.iter().all(|q| pool.questions().contains(q)));
    }

    #[tokio::test]
    async fn start_uses_full_pool_for_zero_or_oversized_count() {
        setup_logging();
        let pool = question_pool(5);

        for requested in [0, 6] {
            let lobby = lobby(&pool, requested, 0);
            lobby.add_player("p1").unwrap();

            let started = lobby.start_game("p1").unwrap();
            assert_eq!(started.question_count, 5);
            assert_eq!(lobby.selected_questions().len(), 5);
        }
    }

    #[tokio::test]
    async fn add_player_fails_once_not_waiting() {
        setup_logging();
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 60_000);
        lobby.add_player("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let result = lobby.add_player("p2");
        assert_eq!(result, Err(LobbyError::InvalidState(GameState::Starting)));
        assert_eq!(lobby.game_status().unwrap().winners, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_session_is_rejected() {
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 0);

        lobby.add_player("p1").unwrap();
        let result = lobby.add_player("p1");

        assert_eq!(result, Err(LobbyError::DuplicateSession("p1".into())));
    }

    #[tokio::test]
    async fn start_requires_member_and_waiting_state() {
        setup_logging();
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 60_000);
        lobby.add_player("p1").unwrap();

        assert_eq!(
            lobby.start_game("stranger"),
            Err(LobbyError::PlayerNotInLobby("stranger".into()))
        );
        assert_eq!(lobby.state().unwrap(), GameState::Waiting);

        lobby.start_game("p1").unwrap();
        assert_eq!(lobby.start_game("p1"), Err(LobbyError::AlreadyStarted));
    }

    #[tokio::test]
    async fn submit_before_start_changes_nothing() {
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();

        let outcome = lobby.submit_answer("p1", "q1", 0).unwrap();
        assert_eq!(outcome, AnswerOutcome::Rejected(SubmissionError::GameNotStarted));
        assert_eq!(outcome.points(), 0);

        let status = lobby.game_status().unwrap();
        assert_eq!(status.state, GameState::Waiting);
        assert_eq!(status.winning_score, 0);
        assert!(lobby.selected_questions().is_empty());
    }

    #[tokio::test]
    async fn submit_during_countdown_is_not_started() {
        setup_logging();
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 60_000);
        lobby.add_player("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let first = lobby.selected_questions()[0].id.clone();
        let outcome = lobby.submit_answer("p1", &first, 0).unwrap();

        assert_eq!(outcome, AnswerOutcome::Rejected(SubmissionError::GameNotStarted));
        assert_eq!(lobby.state().unwrap(), GameState::Starting);
    }

    #[tokio::test]
    async fn first_player_answering_everything_wins() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("P1").unwrap();
        lobby.add_player("P2").unwrap();
        let mut p1 = lobby.take_feed("P1").unwrap();
        let mut p2 = lobby.take_feed("P2").unwrap();

        lobby.start_game("P1").unwrap();
        assert_eq!(
            next_event(&mut p1).await,
            Some(LobbyEvent::Countdown { countdown_ms: 0 })
        );

        for round in 1..=3 {
            let question = next_question(&mut p1).await;
            assert_eq!(lobby.state().unwrap(), GameState::Started);

            let answer = correct_answer(&pool, &question.id);
            let outcome = lobby.submit_answer("P1", &question.id, answer).unwrap();
            assert_eq!(
                outcome,
                AnswerOutcome::Correct {
                    points: 10,
                    score: 10 * round
                }
            );
        }

        assert_eq!(next_event(&mut p1).await, Some(LobbyEvent::game_over()));

        let status = lobby.game_status().unwrap();
        assert_eq!(status.state, GameState::Ended);
        assert_eq!(status.winning_score, 30);
        assert_eq!(status.winners, vec!["P1".to_string()]);

        // P2 saw the same match: countdown, three questions, game over.
        let mut seen = Vec::new();
        while let Ok(Some(event)) = p2.try_next() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0], LobbyEvent::Countdown { countdown_ms: 0 });
        assert!(matches!(seen[1], LobbyEvent::Question { .. }));
        assert_eq!(seen[4], LobbyEvent::game_over());
    }

    #[tokio::test]
    async fn all_wrong_answers_advance_without_scoring() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 2, 0);
        lobby.add_player("p1").unwrap();
        lobby.add_player("p2").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let first = next_question(&mut feed).await;
        let wrong = wrong_answer(&pool, &first.id);

        let outcome = lobby.submit_answer("p1", &first.id, wrong).unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Incorrect {
                score: 0,
                resolved: false
            }
        );

        let outcome = lobby.submit_answer("p2", &first.id, wrong).unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Incorrect {
                score: 0,
                resolved: true
            }
        );

        let second = next_question(&mut feed).await;
        assert_ne!(first.id, second.id);
        assert_eq!(lobby.state().unwrap(), GameState::Started);

        let wrong = wrong_answer(&pool, &second.id);
        lobby.submit_answer("p1", &second.id, wrong).unwrap();
        lobby.submit_answer("p2", &second.id, wrong).unwrap();

        assert_eq!(next_event(&mut feed).await, Some(LobbyEvent::game_over()));
        let status = lobby.game_status().unwrap();
        assert_eq!(status.state, GameState::Ended);
        assert_eq!(status.winning_score, 0);
        assert_eq!(status.winners, vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn second_answer_to_same_question_is_rejected() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();
        lobby.add_player("p2").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let question = next_question(&mut feed).await;
        lobby
            .submit_answer("p1", &question.id, wrong_answer(&pool, &question.id))
            .unwrap();

        let retry = lobby
            .submit_answer("p1", &question.id, correct_answer(&pool, &question.id))
            .unwrap();
        assert_eq!(retry, AnswerOutcome::Rejected(SubmissionError::AlreadyAnswered));
        assert_eq!(retry.points(), 0);
        assert_eq!(lobby.game_status().unwrap().winning_score, 0);
    }

    #[tokio::test]
    async fn answers_to_other_questions_are_stale() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();
        lobby.add_player("p2").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let question = next_question(&mut feed).await;
        let upcoming = lobby.selected_questions()[1].id.clone();

        let lookahead = lobby.submit_answer("p1", &upcoming, 0).unwrap();
        assert_eq!(lookahead, AnswerOutcome::Rejected(SubmissionError::StaleQuestion));

        let answer = correct_answer(&pool, &question.id);
        lobby.submit_answer("p1", &question.id, answer).unwrap();

        // Index moved on, a late correct answer to the old question wins nothing.
        let late = lobby.submit_answer("p2", &question.id, answer).unwrap();
        assert_eq!(late, AnswerOutcome::Rejected(SubmissionError::StaleQuestion));
    }

    #[tokio::test]
    async fn unknown_player_and_ended_game_are_rejected() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 1, 0);
        lobby.add_player("p1").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let question = next_question(&mut feed).await;
        let answer = correct_answer(&pool, &question.id);

        let ghost = lobby.submit_answer("ghost", &question.id, answer).unwrap();
        assert_eq!(ghost, AnswerOutcome::Rejected(SubmissionError::PlayerNotFound));

        lobby.submit_answer("p1", &question.id, answer).unwrap();
        assert_eq!(lobby.state().unwrap(), GameState::Ended);

        let after = lobby.submit_answer("p1", &question.id, answer).unwrap();
        assert_eq!(after, AnswerOutcome::Rejected(SubmissionError::GameEnded));
    }

    #[tokio::test]
    async fn concurrent_correct_answers_have_one_winner() {
        setup_logging();
        let pool = question_pool(10);
        let lobby = lobby(&pool, 3, 0);
        let players: Vec<String> = (0..16).map(|i| format!("p{}", i)).collect();
        for player in &players {
            lobby.add_player(player).unwrap();
        }
        let mut feed = lobby.take_feed("p0").unwrap();
        lobby.start_game("p0").unwrap();

        let question = next_question(&mut feed).await;
        let answer = correct_answer(&pool, &question.id);

        let handles = players.iter().cloned().map(|player| {
            let lobby = Arc::clone(&lobby);
            let question_id = question.id.clone();
            tokio::spawn(async move { lobby.submit_answer(&player, &question_id, answer) })
        });

        let results = futures::future::join_all(handles).await;
        let outcomes: Vec<AnswerOutcome> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        let winners = outcomes
            .iter()
            .filter(|o| matches!(o, AnswerOutcome::Correct { .. }))
            .count();
        let stale = outcomes
            .iter()
            .filter(|o| **o == AnswerOutcome::Rejected(SubmissionError::StaleQuestion))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(stale, players.len() - 1);

        let status = lobby.game_status().unwrap();
        assert_eq!(status.winning_score, 10);
        assert_eq!(status.winners.len(), 1);
    }

    #[tokio::test]
    async fn empty_pool_ends_after_countdown() {
        setup_logging();
        let pool = Arc::new(QuestionPool::default());
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();

        let started = lobby.start_game("p1").unwrap();
        assert_eq!(started.question_count, 0);

        assert_eq!(
            next_event(&mut feed).await,
            Some(LobbyEvent::Countdown { countdown_ms: 0 })
        );
        assert_eq!(next_event(&mut feed).await, Some(LobbyEvent::game_over()));
        assert_eq!(lobby.state().unwrap(), GameState::Ended);
    }

    #[tokio::test]
    async fn game_status_on_empty_lobby() {
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 0);

        let status = lobby.game_status().unwrap();
        assert_eq!(status.state, GameState::Waiting);
        assert_eq!(status.winning_score, 0);
        assert!(status.winners.is_empty());
    }

    #[tokio::test]
    async fn feed_can_only_be_taken_once() {
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();

        let feed = lobby.take_feed("p1").unwrap();
        assert_eq!(
            lobby.take_feed("p1").unwrap_err(),
            LobbyError::FeedTaken("p1".into())
        );

        lobby.restore_feed("p1", feed).unwrap();
        assert!(lobby.take_feed("p1").is_ok());
        assert_eq!(
            lobby.take_feed("nobody").unwrap_err(),
            LobbyError::PlayerNotInLobby("nobody".into())
        );
    }

    #[tokio::test]
    async fn poisoned_lobby_rejects_operations_and_expires() {
        setup_logging();
        let pool = question_pool(3);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();

        lobby.poison();

        assert_eq!(lobby.game_status(), Err(LobbyError::PoisonedLock));
        assert_eq!(
            lobby.submit_answer("p1", "q1", 0),
            Err(LobbyError::PoisonedLock)
        );
        assert_eq!(lobby.start_game("p1"), Err(LobbyError::PoisonedLock));

        assert!(lobby.expire_if_idle(chrono::Utc::now(), chrono::Duration::days(1)));
        assert_eq!(feed.try_next(), Err(FeedClosed));
    }

    #[tokio::test]
    async fn undelivered_event_survives_a_reconnect() {
        setup_logging();
        let pool = question_pool(5);
        let lobby = lobby(&pool, 3, 0);
        lobby.add_player("p1").unwrap();
        let mut feed = lobby.take_feed("p1").unwrap();
        lobby.start_game("p1").unwrap();

        let countdown = next_event(&mut feed).await.unwrap();
        let question = next_question(&mut feed).await;

        // The socket died while sending the question.
        feed.push_back(LobbyEvent::Question {
            question: question.clone(),
        });
        lobby.restore_feed("p1", feed).unwrap();

        let mut feed = lobby.take_feed("p1").unwrap();
        assert_eq!(countdown, LobbyEvent::Countdown { countdown_ms: 0 });
        assert_eq!(
            next_event(&mut feed).await,
            Some(LobbyEvent::Question { question })
        );
        assert_eq!(feed.try_next(), Ok(None));
    }
}
