//! End-to-end game scenarios driven through the public engine and router
//! APIs, without a transport.

use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use minigames::broadcast::{NoopRoleAssigner, QueueBroadcaster};
use minigames::config::{
    BridgeRules, ConfigLimits, GameRules, GameSetup, GameSpec, HostSettings, Question,
    QuestionSource, ReactionRules, RoleSettings,
};
use minigames::game::{
    BridgePhase, Change, CompletionReason, EliminationReason, Engine, GameEngine, GameEvent,
    Standings,
};
use minigames::host::{EventRouter, RouterOptions, SessionHandle, SessionRegistry};
use minigames::observability::EventEmitter;
use minigames::transport::Outbound;
use minigames::types::{ChannelId, ParticipantId};

fn ids(names: &[&str]) -> Vec<ParticipantId> {
    names.iter().map(|n| ParticipantId::from(*n)).collect()
}

fn bridge(names: &[&str], segments: u32) -> GameSpec {
    GameSetup {
        participants: ids(names),
        time_limit: Duration::from_secs(300),
        shuffle: false,
        seed: Some(42),
        roles: RoleSettings::default(),
        game: GameRules::Bridge(BridgeRules {
            segments,
            positions: 2,
        }),
    }
    .into_spec(ChannelId::from("bridge"))
}

fn reaction(names: &[&str], min_correct: u32, pool: usize) -> (GameSpec, Vec<Question>) {
    let questions: Vec<Question> = (1..=pool)
        .map(|i| Question::new(format!("q{i}?"), format!("{i}")))
        .collect();
    let spec = GameSetup {
        participants: ids(names),
        time_limit: Duration::from_secs(3600),
        shuffle: false,
        seed: Some(42),
        roles: RoleSettings::default(),
        game: GameRules::Reaction(ReactionRules {
            min_correct,
            cooldown: ReactionRules::DEFAULT_COOLDOWN,
            afk: ReactionRules::DEFAULT_AFK,
            questions: QuestionSource::Inline(questions.clone()),
        }),
    }
    .into_spec(ChannelId::from("quiz"));
    (spec, questions)
}

fn safe_token(engine: &Engine) -> String {
    match engine {
        Engine::Bridge(game) => (game.safe_position() + 1).to_string(),
        Engine::Reaction(_) => unreachable!("not a bridge"),
    }
}

fn wrong_token(engine: &Engine) -> String {
    match engine {
        Engine::Bridge(game) => ((game.safe_position() + 1) % 2 + 1).to_string(),
        Engine::Reaction(_) => unreachable!("not a bridge"),
    }
}

fn interaction(participant: &str, token: String) -> GameEvent {
    GameEvent::Interaction {
        participant: ParticipantId::from(participant),
        token,
    }
}

fn message(participant: &str, text: &str) -> GameEvent {
    GameEvent::Message {
        participant: ParticipantId::from(participant),
        text: text.to_string(),
    }
}

fn completed(changes: &[Change]) -> Option<&Standings> {
    changes.iter().find_map(|c| match c {
        Change::Completed(s) => Some(s),
        _ => None,
    })
}

fn current_answer(engine: &Engine) -> String {
    match engine {
        Engine::Reaction(game) => game.current_question().unwrap().answer.clone(),
        Engine::Bridge(_) => unreachable!("not a reaction game"),
    }
}

#[test]
fn bridge_leader_clears_every_segment() {
    let now = Utc::now();
    let mut engine = Engine::from_spec(&bridge(&["a", "b", "c"], 2), Vec::new(), now).unwrap();

    let token = safe_token(&engine);
    let first = engine.handle_event(interaction("a", token), now).unwrap();
    assert!(matches!(first[0], Change::SegmentCleared { segment: 1, .. }));

    let token = safe_token(&engine);
    let second = engine.handle_event(interaction("a", token), now).unwrap();
    let standings = completed(&second).unwrap();
    assert_eq!(standings.reason, CompletionReason::AllSegmentsCleared);
    assert_eq!(standings.survivors, ids(&["a", "b", "c"]));
    assert!(standings.eliminated.is_empty());
    match &engine {
        Engine::Bridge(game) => assert_eq!(game.phase(), BridgePhase::CompleteWin),
        Engine::Reaction(_) => unreachable!(),
    }
}

#[test]
fn bridge_wrong_choices_exhaust_the_queue() {
    let now = Utc::now();
    let mut engine = Engine::from_spec(&bridge(&["a", "b"], 2), Vec::new(), now).unwrap();

    let token = wrong_token(&engine);
    engine.handle_event(interaction("a", token), now).unwrap();
    let token = wrong_token(&engine);
    let changes = engine.handle_event(interaction("b", token), now).unwrap();

    let standings = completed(&changes).unwrap();
    assert_eq!(standings.reason, CompletionReason::QueueExhausted);
    assert!(standings.survivors.is_empty());
    assert_eq!(standings.losers(), ids(&["a", "b"]));
    assert!(!engine.is_running());
}

#[test]
fn reaction_red_light_eliminates_immediately() {
    let t0 = Utc::now();
    let (spec, questions) = reaction(&["a", "b"], 2, 3);
    let mut engine = Engine::from_spec(&spec, questions, t0).unwrap();

    for round in 0..2 {
        let at = t0 + TimeDelta::minutes(round);
        engine
            .handle_event(GameEvent::Signal { allowed: Some(true) }, at)
            .unwrap();
        let answer = current_answer(&engine);
        let scored = engine.handle_event(message("a", &answer), at).unwrap();
        assert!(matches!(scored[0], Change::AnswerScored { correct: true, .. }));
        engine
            .handle_event(GameEvent::Signal { allowed: Some(false) }, at)
            .unwrap();
    }

    let at = t0 + TimeDelta::minutes(3);
    let changes = engine.handle_event(message("b", "hello"), at).unwrap();
    assert!(matches!(
        &changes[0],
        Change::Eliminated(e) if e.reason == EliminationReason::SpokeDuringRed
    ));

    let changes = engine.done(CompletionReason::Terminated, at);
    let standings = completed(&changes).unwrap();
    assert_eq!(standings.survivors, ids(&["a"]));
    assert_eq!(standings.eliminated.len(), 1);
    assert_eq!(
        standings.eliminated[0].reason,
        EliminationReason::SpokeDuringRed
    );
}

#[test]
fn reaction_afk_ignores_correct_count() {
    let t0 = Utc::now();
    let (spec, questions) = reaction(&["a", "b"], 1, 3);
    let mut engine = Engine::from_spec(&spec, questions, t0).unwrap();

    engine
        .handle_event(GameEvent::Signal { allowed: Some(true) }, t0)
        .unwrap();
    let answer = current_answer(&engine);
    engine.handle_event(message("a", &answer), t0).unwrap();

    // b keeps talking; a goes quiet after scoring
    let later = t0 + TimeDelta::minutes(15);
    engine.handle_event(message("b", "still here"), later).unwrap();

    let changes = engine.sweep(t0 + TimeDelta::minutes(20));
    assert_eq!(changes.len(), 1);
    assert!(matches!(
        &changes[0],
        Change::Eliminated(e) if e.participant.as_str() == "a" && e.reason == EliminationReason::Afk
    ));
}

fn router_with(handle: &Arc<SessionHandle>) -> (EventRouter, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(Arc::clone(handle)).unwrap();
    let router = EventRouter::new(RouterOptions {
        settings: HostSettings::default(),
        registry,
        broadcaster: Arc::new(QueueBroadcaster::new(tx)),
        role_assigner: Arc::new(NoopRoleAssigner),
        events: Arc::new(EventEmitter::noop()),
        base_dir: PathBuf::from("."),
        limits: ConfigLimits::default(),
    });
    (router, rx)
}

#[test]
fn deadline_racing_a_choice_eliminates_once() {
    for _ in 0..50 {
        let now = Utc::now();
        let engine = Engine::from_spec(&bridge(&["a", "b"], 3), Vec::new(), now).unwrap();
        let token = wrong_token(&engine);
        let handle = Arc::new(SessionHandle::new(engine, RoleSettings::default()));
        let (router, mut rx) = router_with(&handle);
        let barrier = Barrier::new(2);

        std::thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                router
                    .apply(&handle, Utc::now(), |engine, now| {
                        engine.handle_event(interaction("a", token.clone()), now)
                    })
                    .unwrap();
            });
            s.spawn(|| {
                barrier.wait();
                router.on_deadline(&handle);
            });
        });

        let mut summaries = Vec::new();
        while let Ok(out) = rx.try_recv() {
            if let Outbound::Summary { standings, .. } = out {
                summaries.push(standings);
            }
        }
        assert_eq!(summaries.len(), 1);
        let standings = &summaries[0];
        assert_eq!(standings.reason, CompletionReason::Deadline);
        let a_entries = standings
            .eliminated
            .iter()
            .filter(|e| e.participant.as_str() == "a")
            .count();
        assert_eq!(a_entries, 1);
        assert!(standings.survivors.is_empty());
        assert!(router.registry().is_empty());
    }
}
