//! Red light / green light quiz engine.
//!
//! A shared signal gates the channel. While green, each participant gets
//! one scored answer per question; a wrong answer opens a penalty window
//! that survives signal toggles. While red (or before the first signal),
//! any message eliminates the sender. Participants silent for the AFK
//! window are eliminated by the periodic sweep or on their next message.
//! At completion everyone below the correct-answer threshold is eliminated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use minigames_core::config::{Question, ReactionRules};

use crate::error::GameError;
use crate::types::{ChannelId, GameKind, ParticipantId};

use super::change::{Change, IgnoreReason, QuestionView, ReactionPhase, ReactionSnapshot};
use super::elapsed;
use super::session::{CompletionReason, EliminationReason, GameSession, Score, StandingsDetail};

/// Per-participant answer bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerState {
    /// Never decreases.
    pub correct_count: u32,
    /// Reset each time a question is drawn.
    pub answered: bool,
    /// Start of the wrong-answer penalty window.
    pub last_wrong_at: Option<DateTime<Utc>>,
    /// Last sign of life.
    pub afk_since: DateTime<Utc>,
    /// Last scored answer, verbatim.
    pub last_answer: Option<String>,
}

impl AnswerState {
    const fn new(now: DateTime<Utc>) -> Self {
        Self {
            correct_count: 0,
            answered: false,
            last_wrong_at: None,
            afk_since: now,
            last_answer: None,
        }
    }
}

/// Broadcast-based quiz state machine.
#[derive(Debug)]
pub struct ReactionGame {
    session: GameSession<AnswerState>,
    signal_allowed: bool,
    phase: ReactionPhase,
    current_question: Option<Question>,
    pool: Vec<Question>,
    min_correct: u32,
    cooldown: Duration,
    afk_window: Duration,
    rng: StdRng,
}

impl ReactionGame {
    /// Creates a running reaction session waiting for its first signal.
    ///
    /// The question pool is shuffled once here and drawn without
    /// replacement afterwards.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidConfiguration` for an empty or duplicated
    /// roster, a zero threshold, or an empty question pool.
    pub fn new(
        channel: ChannelId,
        roster: Vec<ParticipantId>,
        rules: &ReactionRules,
        mut questions: Vec<Question>,
        mut rng: StdRng,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if rules.min_correct == 0 {
            return Err(GameError::InvalidConfiguration(
                "min_correct must be at least 1".to_string(),
            ));
        }
        if questions.is_empty() {
            return Err(GameError::InvalidConfiguration(
                "question pool is empty".to_string(),
            ));
        }
        let session = GameSession::create(channel, GameKind::Reaction, roster, now, |_| {
            AnswerState::new(now)
        })?;
        questions.shuffle(&mut rng);

        Ok(Self {
            session,
            signal_allowed: false,
            phase: ReactionPhase::AwaitSignal,
            current_question: None,
            pool: questions,
            min_correct: rules.min_correct,
            cooldown: rules.cooldown,
            afk_window: rules.afk,
            rng,
        })
    }

    /// Underlying session envelope.
    #[must_use]
    pub const fn session(&self) -> &GameSession<AnswerState> {
        &self.session
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ReactionPhase {
        self.phase
    }

    /// `true` while green.
    #[must_use]
    pub const fn signal_allowed(&self) -> bool {
        self.signal_allowed
    }

    /// Question currently being answered.
    #[must_use]
    pub const fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// Questions left in the pool.
    #[must_use]
    pub fn questions_remaining(&self) -> usize {
        self.pool.len()
    }

    /// Answer state of a registered participant.
    #[must_use]
    pub fn answer_state(&self, participant: &ParticipantId) -> Option<&AnswerState> {
        self.session.registry().get(participant).map(|r| &r.data)
    }

    fn draw_question(&mut self) -> Result<Question, GameError> {
        self.pool.pop().ok_or(GameError::NoQuestionsRemaining)
    }

    fn is_afk(&self, state: &AnswerState, now: DateTime<Utc>) -> bool {
        elapsed(state.afk_since, now) >= self.afk_window
    }

    /// Turns the light green or red.
    ///
    /// Going green draws the next question, resets every `answered` flag
    /// and reveals the previous question's answer. An exhausted pool
    /// completes the session instead.
    pub fn set_signal(&mut self, allowed: bool, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        let target = if allowed {
            ReactionPhase::Green
        } else {
            ReactionPhase::Red
        };
        if self.phase == target {
            return vec![Change::ignored(IgnoreReason::SignalUnchanged)];
        }

        if !allowed {
            self.signal_allowed = false;
            self.phase = ReactionPhase::Red;
            info!(channel = %self.session.channel(), "signal red");
            return vec![Change::SignalChanged {
                allowed: false,
                question: None,
                previous_answer: None,
            }];
        }

        let previous_answer = self
            .current_question
            .as_ref()
            .map(Question::revealed_answer);
        let question = match self.draw_question() {
            Ok(question) => question,
            Err(GameError::NoQuestionsRemaining) => {
                info!(channel = %self.session.channel(), "question pool exhausted");
                return self.done(CompletionReason::QuestionsExhausted, now);
            }
            Err(other) => return self.fail(other.to_string(), now),
        };

        for record in self.session.registry_mut().active_iter_mut() {
            record.data.answered = false;
        }
        let view = QuestionView::from(&question);
        self.current_question = Some(question);
        self.signal_allowed = true;
        self.phase = ReactionPhase::Green;
        info!(
            channel = %self.session.channel(),
            remaining = self.pool.len(),
            "signal green"
        );
        vec![Change::SignalChanged {
            allowed: true,
            question: Some(view),
            previous_answer,
        }]
    }

    /// Picks green or red at random and applies it.
    ///
    /// A draw matching the current light is re-announced without drawing a
    /// new question.
    pub fn random_signal(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        let allowed = self.rng.random_bool(0.5);
        let unchanged = match self.phase {
            ReactionPhase::Green => allowed,
            ReactionPhase::Red => !allowed,
            ReactionPhase::AwaitSignal | ReactionPhase::Complete => false,
        };
        if unchanged && self.session.is_running() {
            debug!(channel = %self.session.channel(), allowed, "random signal repeated");
            return vec![Change::SignalRepeated { allowed }];
        }
        self.set_signal(allowed, now)
    }

    /// Handles a chat message from a participant.
    pub fn handle_message(
        &mut self,
        participant: &ParticipantId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        let Some(record) = self.session.registry().get(participant) else {
            return vec![Change::ignored(IgnoreReason::UnknownParticipant)];
        };
        if !record.is_active() {
            return vec![Change::ignored(IgnoreReason::Eliminated)];
        }

        if let Some(change) = self.check_afk(participant, now) {
            return vec![change];
        }
        if !self.signal_allowed {
            return self
                .session
                .eliminate(participant, EliminationReason::SpokeDuringRed, now)
                .map(Change::Eliminated)
                .into_iter()
                .collect();
        }

        let Some(question) = self.current_question.clone() else {
            return vec![Change::ignored(IgnoreReason::NoQuestion)];
        };
        let cooldown = self.cooldown;
        let Some(record) = self.session.registry_mut().active_mut(participant) else {
            return vec![Change::ignored(IgnoreReason::Eliminated)];
        };
        let state = &mut record.data;
        // events can be handled out of timestamp order; never move backwards
        state.afk_since = state.afk_since.max(now);
        if state.answered {
            return vec![Change::ignored(IgnoreReason::AlreadyAnswered)];
        }
        if state
            .last_wrong_at
            .is_some_and(|at| elapsed(at, now) < cooldown)
        {
            debug!(%participant, "answer during cooldown ignored");
            return vec![Change::ignored(IgnoreReason::CoolingDown)];
        }

        state.answered = true;
        state.last_answer = Some(content.to_string());
        let correct = question.is_correct(content);
        if correct {
            state.correct_count += 1;
        } else {
            state.last_wrong_at = Some(state.last_wrong_at.map_or(now, |at| at.max(now)));
        }
        debug!(%participant, correct, count = state.correct_count, "answer scored");
        vec![Change::AnswerScored {
            participant: participant.clone(),
            correct,
            correct_count: state.correct_count,
        }]
    }

    /// Eliminates the participant if silent for at least the AFK window.
    pub fn check_afk(&mut self, participant: &ParticipantId, now: DateTime<Utc>) -> Option<Change> {
        let record = self.session.registry().get(participant)?;
        if !record.is_active() || !self.is_afk(&record.data, now) {
            return None;
        }
        self.session
            .eliminate(participant, EliminationReason::Afk, now)
            .map(Change::Eliminated)
    }

    /// Runs the AFK check for every active participant.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return Vec::new();
        }
        let candidates: Vec<ParticipantId> = self
            .session
            .registry()
            .active()
            .filter(|r| self.is_afk(&r.data, now))
            .map(|r| r.id.clone())
            .collect();
        candidates
            .iter()
            .filter_map(|p| self.check_afk(p, now))
            .collect()
    }

    /// Completes the session.
    ///
    /// Everyone still active below the threshold is eliminated; the rest
    /// are winners. A second call has no effect.
    pub fn done(&mut self, reason: CompletionReason, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        let min_correct = self.min_correct;
        let below: Vec<ParticipantId> = self
            .session
            .registry()
            .active()
            .filter(|r| r.data.correct_count < min_correct)
            .map(|r| r.id.clone())
            .collect();
        let mut changes: Vec<Change> = below
            .iter()
            .filter_map(|p| {
                self.session
                    .eliminate(p, EliminationReason::NotEnoughCorrect, now)
            })
            .map(Change::Eliminated)
            .collect();
        changes.extend(self.finish(reason, now));
        changes
    }

    /// Clock fired.
    pub fn on_timeout(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        self.done(CompletionReason::Deadline, now)
    }

    /// Moderator stop; the threshold still applies.
    pub fn terminate(&mut self, now: DateTime<Utc>) -> Vec<Change> {
        self.done(CompletionReason::Terminated, now)
    }

    /// Force-completes without applying the threshold.
    pub fn fail(&mut self, message: String, now: DateTime<Utc>) -> Vec<Change> {
        if !self.session.is_running() {
            return vec![Change::ignored(IgnoreReason::NotRunning)];
        }
        warn!(channel = %self.session.channel(), %message, "reaction game force-completed");
        self.finish(CompletionReason::InternalError(message), now)
            .into_iter()
            .collect()
    }

    fn scores(&self) -> Vec<Score> {
        self.session
            .registry()
            .iter()
            .map(|r| Score {
                participant: r.id.clone(),
                correct: r.data.correct_count,
            })
            .collect()
    }

    fn finish(&mut self, reason: CompletionReason, now: DateTime<Utc>) -> Option<Change> {
        self.signal_allowed = false;
        self.phase = ReactionPhase::Complete;
        let survivors = self.session.registry().active_ids();
        let detail = StandingsDetail::Reaction {
            scores: self.scores(),
            min_correct: self.min_correct,
        };
        self.session
            .finish(reason, survivors, detail, now)
            .map(Change::Completed)
    }

    /// Renderable state; never includes the current answer.
    #[must_use]
    pub fn snapshot(&self) -> ReactionSnapshot {
        ReactionSnapshot {
            phase: self.phase,
            signal_allowed: self.signal_allowed,
            question: self.current_question.as_ref().map(QuestionView::from),
            questions_remaining: self.pool.len(),
            scores: self
                .session
                .registry()
                .active()
                .map(|r| Score {
                    participant: r.id.clone(),
                    correct: r.data.correct_count,
                })
                .collect(),
            min_correct: self.min_correct,
            eliminated: self
                .session
                .eliminated()
                .iter()
                .map(|e| e.participant.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::Standings;
    use chrono::TimeDelta;
    use minigames_core::config::QuestionSource;
    use rand::SeedableRng;

    fn rules(min_correct: u32) -> ReactionRules {
        ReactionRules {
            min_correct,
            cooldown: ReactionRules::DEFAULT_COOLDOWN,
            afk: ReactionRules::DEFAULT_AFK,
            questions: QuestionSource::Inline(Vec::new()),
        }
    }

    /// Every question has the same answer so draw order does not matter.
    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question::new(format!("question {i}?"), "yes"))
            .collect()
    }

    fn game(names: &[&str], min_correct: u32, pool: usize, now: DateTime<Utc>) -> ReactionGame {
        ReactionGame::new(
            ChannelId::from("quiz"),
            names.iter().map(|n| ParticipantId::from(*n)).collect(),
            &rules(min_correct),
            questions(pool),
            StdRng::seed_from_u64(3),
            now,
        )
        .unwrap()
    }

    fn p(name: &str) -> ParticipantId {
        ParticipantId::from(name)
    }

    fn completed(changes: &[Change]) -> Option<&Standings> {
        changes.iter().find_map(|c| match c {
            Change::Completed(s) => Some(s),
            _ => None,
        })
    }

    fn minutes(n: i64) -> TimeDelta {
        TimeDelta::minutes(n)
    }

    #[test]
    fn test_rejects_invalid_rules() {
        let now = Utc::now();
        let err = ReactionGame::new(
            ChannelId::from("quiz"),
            vec![p("a")],
            &rules(0),
            questions(1),
            StdRng::seed_from_u64(1),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration(_)));

        let err = ReactionGame::new(
            ChannelId::from("quiz"),
            vec![p("a")],
            &rules(1),
            Vec::new(),
            StdRng::seed_from_u64(1),
            now,
        )
        .unwrap_err();
        assert!(err.to_string().contains("question pool"));
    }

    #[test]
    fn test_message_before_first_signal_eliminates() {
        let now = Utc::now();
        let mut g = game(&["a", "b"], 1, 3, now);
        let changes = g.handle_message(&p("a"), "hello", now);
        assert!(matches!(
            &changes[..],
            [Change::Eliminated(e)] if e.reason == EliminationReason::SpokeDuringRed
        ));
        assert_eq!(
            g.handle_message(&p("a"), "again", now),
            vec![Change::ignored(IgnoreReason::Eliminated)]
        );
    }

    #[test]
    fn test_green_draws_question_and_resets_answered() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 3, now);
        let changes = g.set_signal(true, now);
        assert!(matches!(
            &changes[..],
            [Change::SignalChanged { allowed: true, question: Some(_), previous_answer: None }]
        ));
        assert_eq!(g.questions_remaining(), 2);

        g.handle_message(&p("a"), "yes", now);
        assert!(g.answer_state(&p("a")).unwrap().answered);

        g.set_signal(false, now);
        let changes = g.set_signal(true, now);
        assert!(matches!(
            &changes[..],
            [Change::SignalChanged { previous_answer: Some(answer), .. }] if answer == "yes"
        ));
        assert!(!g.answer_state(&p("a")).unwrap().answered);
    }

    #[test]
    fn test_unchanged_signal_is_ignored() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 3, now);
        g.set_signal(true, now);
        assert_eq!(
            g.set_signal(true, now),
            vec![Change::ignored(IgnoreReason::SignalUnchanged)]
        );
        assert_eq!(g.questions_remaining(), 2);
    }

    #[test]
    fn test_one_scored_answer_per_question() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 3, now);
        g.set_signal(true, now);
        let first = g.handle_message(&p("a"), " YES ", now);
        assert_eq!(
            first,
            vec![Change::AnswerScored {
                participant: p("a"),
                correct: true,
                correct_count: 1,
            }]
        );
        let second = g.handle_message(&p("a"), "yes", now);
        assert_eq!(second, vec![Change::ignored(IgnoreReason::AlreadyAnswered)]);
        assert_eq!(g.answer_state(&p("a")).unwrap().correct_count, 1);
    }

    #[test]
    fn test_cooldown_survives_signal_toggles() {
        let t0 = Utc::now();
        let mut g = game(&["a"], 1, 5, t0);
        g.set_signal(true, t0);
        g.handle_message(&p("a"), "no", t0);
        assert_eq!(g.answer_state(&p("a")).unwrap().last_wrong_at, Some(t0));

        g.set_signal(false, t0 + minutes(1));
        g.set_signal(true, t0 + minutes(2));
        let changes = g.handle_message(&p("a"), "yes", t0 + minutes(3));
        assert_eq!(changes, vec![Change::ignored(IgnoreReason::CoolingDown)]);

        // window ends exactly at T + cooldown
        let changes = g.handle_message(&p("a"), "yes", t0 + minutes(5));
        assert!(matches!(changes[0], Change::AnswerScored { correct: true, .. }));
    }

    #[test]
    fn test_afk_boundary() {
        let t0 = Utc::now();
        let mut g = game(&["a", "b"], 1, 3, t0);
        let just_under = t0 + minutes(20) - TimeDelta::milliseconds(1);
        assert!(g.check_afk(&p("a"), just_under).is_none());

        let change = g.check_afk(&p("a"), t0 + minutes(20)).unwrap();
        assert!(matches!(change, Change::Eliminated(e) if e.reason == EliminationReason::Afk));
    }

    #[test]
    fn test_message_refreshes_afk() {
        let t0 = Utc::now();
        let mut g = game(&["a"], 1, 3, t0);
        g.set_signal(true, t0);
        g.handle_message(&p("a"), "yes", t0 + minutes(15));
        assert!(g.sweep(t0 + minutes(30)).is_empty());
        assert_eq!(g.sweep(t0 + minutes(35)).len(), 1);
    }

    #[test]
    fn test_out_of_order_message_keeps_latest_activity() {
        let t0 = Utc::now();
        let mut g = game(&["a"], 1, 3, t0);
        g.set_signal(true, t0);
        g.handle_message(&p("a"), "yes", t0 + minutes(10));
        g.handle_message(&p("a"), "again", t0 + minutes(5));
        assert_eq!(g.answer_state(&p("a")).unwrap().afk_since, t0 + minutes(10));
        assert!(g.sweep(t0 + minutes(26)).is_empty());
        assert_eq!(g.sweep(t0 + minutes(30)).len(), 1);
    }

    #[test]
    fn test_lazy_afk_check_on_message() {
        let t0 = Utc::now();
        let mut g = game(&["a"], 1, 3, t0);
        g.set_signal(true, t0);
        let changes = g.handle_message(&p("a"), "yes", t0 + minutes(25));
        assert!(matches!(
            &changes[..],
            [Change::Eliminated(e)] if e.reason == EliminationReason::Afk
        ));
    }

    #[test]
    fn test_sweep_only_hits_silent_participants() {
        let t0 = Utc::now();
        let mut g = game(&["a", "b", "c"], 1, 3, t0);
        g.set_signal(true, t0);
        g.handle_message(&p("b"), "yes", t0 + minutes(10));
        let changes = g.sweep(t0 + minutes(20));
        let eliminated: Vec<_> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Eliminated(e) => Some(e.participant.as_str().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(eliminated, vec!["a", "c"]);
    }

    #[test]
    fn test_done_applies_threshold_once() {
        let now = Utc::now();
        let mut g = game(&["a", "b"], 1, 3, now);
        g.set_signal(true, now);
        g.handle_message(&p("a"), "yes", now);

        let changes = g.done(CompletionReason::Deadline, now);
        let standings = completed(&changes).unwrap();
        assert_eq!(standings.survivors, vec![p("a")]);
        assert_eq!(standings.eliminated.len(), 1);
        assert_eq!(standings.eliminated[0].reason, EliminationReason::NotEnoughCorrect);

        assert_eq!(
            g.done(CompletionReason::Deadline, now),
            vec![Change::ignored(IgnoreReason::NotRunning)]
        );
        assert_eq!(g.phase(), ReactionPhase::Complete);
    }

    #[test]
    fn test_exhausted_pool_completes_game() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 1, now);
        g.set_signal(true, now);
        g.handle_message(&p("a"), "yes", now);
        g.set_signal(false, now);
        let changes = g.set_signal(true, now);
        let standings = completed(&changes).unwrap();
        assert_eq!(standings.reason, CompletionReason::QuestionsExhausted);
        assert_eq!(standings.survivors, vec![p("a")]);
        assert!(!g.session().is_running());
    }

    #[test]
    fn test_unknown_participant_ignored() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 1, now);
        assert_eq!(
            g.handle_message(&p("stranger"), "hi", now),
            vec![Change::ignored(IgnoreReason::UnknownParticipant)]
        );
    }

    #[test]
    fn test_random_signal_is_reproducible() {
        let now = Utc::now();
        let mut one = game(&["a"], 1, 10, now);
        let mut two = game(&["a"], 1, 10, now);
        for _ in 0..5 {
            one.random_signal(now);
            two.random_signal(now);
            assert_eq!(one.phase(), two.phase());
        }
    }

    #[test]
    fn test_random_signal_always_announces() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 50, now);
        for _ in 0..20 {
            let question = g.current_question().cloned();
            let changes = g.random_signal(now);
            match &changes[..] {
                [Change::SignalRepeated { allowed }] => {
                    let expected = if *allowed {
                        ReactionPhase::Green
                    } else {
                        ReactionPhase::Red
                    };
                    assert_eq!(g.phase(), expected);
                    assert_eq!(g.current_question().cloned(), question);
                }
                [Change::SignalChanged { .. }] => {}
                other => panic!("unexpected changes: {other:?}"),
            }
        }
    }

    #[test]
    fn test_snapshot_hides_answer() {
        let now = Utc::now();
        let mut g = game(&["a"], 1, 2, now);
        g.set_signal(true, now);
        let json = serde_json::to_string(&g.snapshot()).unwrap();
        assert!(!json.contains("\"yes\""));
        assert!(json.contains("question"));
    }
}
