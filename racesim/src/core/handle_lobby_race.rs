use crate::core::handle_race::{handle_participant_race, RaceResources, RunPars};
use crate::core::lobby::Participant;
use crate::error::{RaceError, ValidationError};
use crate::interfaces::event_sink::{TaggedEvent, TaggingSink};
use crate::post::race_result::ParticipantOutcome;
use flume::Sender;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Barrier;
use std::time::Instant;

/// LobbyRace is the state shared by all participant units of one lobby race.
struct LobbyRace<'a> {
    lobby_id: &'a str,
    track_id: &'a str,
    resources: RaceResources<'a>,
    run_pars: RunPars,
    events: Option<Sender<TaggedEvent>>,
    start_barrier: Barrier,
}

impl<'a> LobbyRace<'a> {
    /// Runs the race of one participant. Every error and panic is turned into a failed outcome
    /// of this participant, so sibling units are never affected.
    fn run_participant(&self, idx: usize, participant: &Participant) -> ParticipantOutcome {
        // no simulation clock starts before every unit arrived here
        self.start_barrier.wait();
        let t_start = Instant::now();

        let span = tracing::info_span!(
            "participant",
            lobby_id = self.lobby_id,
            user_id = %participant.user_id
        );
        let _enter = span.enter();

        let run_pars = RunPars {
            rng_seed: self.run_pars.rng_seed.wrapping_add(idx as u64),
            ..self.run_pars
        };
        let sink = Box::new(TaggingSink::new(
            &participant.user_id,
            &participant.display_name,
            self.events.to_owned(),
        ));

        let result = catch_unwind(AssertUnwindSafe(|| {
            handle_participant_race(self.resources, participant, self.track_id, run_pars, sink)
        }));

        match result {
            Ok(Ok(report)) => {
                tracing::info!(
                    "{} finished in {:.2}s with {} incidents (simulated in {}ms)",
                    participant.display_name,
                    report.summary.total_time,
                    report.summary.incident_count,
                    t_start.elapsed().as_millis()
                );
                ParticipantOutcome::finished(&participant.user_id, &participant.display_name, report)
            }
            Ok(Err(e)) => {
                tracing::warn!("{} failed: {}", participant.display_name, e);
                ParticipantOutcome::failed(&participant.user_id, &participant.display_name, e)
            }
            Err(panic) => {
                let e = RaceError::SimulationFault(panic_message(&*panic));
                tracing::warn!("{} crashed: {}", participant.display_name, e);
                ParticipantOutcome::failed(&participant.user_id, &participant.display_name, e)
            }
        }
    }
}

/// handle_lobby_race simulates the races of all participants concurrently on the same track.
/// Each participant gets its own unit of work on a dedicated worker pool, its own engine and its
/// own incident seed (`rng_seed + index`). All units rendezvous on a barrier before simulating.
/// The function returns once every unit finished or failed; the outcomes are in completion
/// order.
pub fn handle_lobby_race(
    lobby_id: &str,
    track_id: &str,
    participants: Vec<Participant>,
    resources: RaceResources,
    run_pars: RunPars,
    events: Option<Sender<TaggedEvent>>,
) -> Result<Vec<ParticipantOutcome>, RaceError> {
    let no_participants = participants.len();
    if no_participants < 2 {
        return Err(ValidationError::NotEnoughParticipants {
            lobby_id: lobby_id.to_owned(),
            count: no_participants,
        }
        .into());
    }

    // every unit blocks a worker at the barrier, one spare worker runs the scope itself
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(no_participants + 1)
        .thread_name(|i| format!("lobby-worker-{}", i))
        .build()
        .map_err(|e| RaceError::SimulationFault(format!("could not build worker pool: {}", e)))?;

    let race = LobbyRace {
        lobby_id,
        track_id,
        resources,
        run_pars,
        events,
        start_barrier: Barrier::new(no_participants),
    };

    tracing::info!(
        lobby_id,
        track_id,
        "starting lobby race with {} participants",
        no_participants
    );

    let (tx_outcome, rx_outcome) = flume::unbounded();

    pool.scope(|s| {
        for (idx, participant) in participants.iter().enumerate() {
            let race = &race;
            let tx_outcome = tx_outcome.to_owned();
            s.spawn(move |_| {
                let outcome = race.run_participant(idx, participant);
                if tx_outcome.send(outcome).is_err() {
                    tracing::error!("outcome receiver dropped before the race finished");
                }
            });
        }
    });
    drop(tx_outcome);

    let outcomes: Vec<ParticipantOutcome> = rx_outcome.drain().collect();
    if outcomes.len() != no_participants {
        return Err(RaceError::SimulationFault(format!(
            "expected {} outcomes, received {}",
            no_participants,
            outcomes.len()
        )));
    }

    let no_failed = outcomes.iter().filter(|o| o.error().is_some()).count();
    tracing::info!(
        lobby_id,
        "lobby race finished, {} of {} participants failed",
        no_failed,
        no_participants
    );

    Ok(outcomes)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("participant race panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("participant race panicked: {}", msg)
    } else {
        "participant race panicked".to_owned()
    }
}
