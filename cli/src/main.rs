use clap::Parser;
use helpers::general::{mean, min_max};
use racesim::core::handle_race::{handle_participant_race, handle_race, RaceResources, RunPars};
use racesim::core::lobby::{LobbyRegistry, Participant};
use racesim::interfaces::catalog::RaceCatalog;
use racesim::interfaces::event_sink::{ChannelSink, NullSink, RaceEvent, TaggedEvent};
use racesim::interfaces::profile_store::ProfileStore;
use racesim::post::race_result::{RaceReport, RaceSummary};
use racesim::post::standings::Standings;
use racesim::pre::read_sim_pars::{read_sim_constants, read_sim_pars, SimPars};
use racesim::pre::sim_constants::SimConstants;
use racesim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::thread;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn log_event(event: &RaceEvent) {
    match event {
        RaceEvent::LapComplete { lap, time_s } => {
            tracing::info!("lap {} complete after {:.2}s", lap, time_s)
        }
        RaceEvent::RaceComplete { time_s, incidents } => {
            tracing::info!("race complete in {:.2}s, {} incidents", time_s, incidents)
        }
        RaceEvent::Penalty {
            severity,
            delta_s,
            segment,
            ..
        } => tracing::info!("{:?} incident in {}: +{:.2}s", severity, segment, delta_s),
        other => tracing::debug!("{:?}", other),
    }
}

fn print_report(name: &str, report: &RaceReport) {
    print_summary(name, &report.summary);
    for gain in report.skill_gains.iter() {
        println!("  {:<12} +{:.2} -> {:.2}", gain.skill, gain.delta, gain.new);
    }
    println!("  experience    {:.2}", report.profile.experience);
}

fn print_summary(name: &str, summary: &RaceSummary) {
    println!(
        "RESULT: {} finished {:.2}km in {:.2}s ({} incidents, {} clean corners)",
        name,
        summary.total_distance_km,
        summary.total_time,
        summary.incident_count,
        summary.clean_corner_count
    );
}

// ---- SOLO RACE ----
fn run_solo_race(
    resources: RaceResources,
    participant: &Participant,
    sim_pars: &SimPars,
    run_pars: RunPars,
) -> anyhow::Result<()> {
    let (tx, rx) = flume::unbounded();
    let printer = thread::spawn(move || {
        for event in rx.iter() {
            log_event(&event);
        }
    });

    let t_start = Instant::now();
    let report = handle_participant_race(
        resources,
        participant,
        &sim_pars.race_pars.track_id,
        run_pars,
        Box::new(ChannelSink::new(tx)),
    );
    if printer.join().is_err() {
        tracing::warn!("event printer panicked");
    }
    let report = report?;

    tracing::info!("execution time: {}ms", t_start.elapsed().as_millis());
    print_report(&participant.display_name, &report);
    Ok(())
}

// ---- MULTIPLE SOLO RUNS ----
fn run_solo_statistics(
    resources: RaceResources,
    participant: &Participant,
    sim_pars: &SimPars,
    run_pars: RunPars,
    no_sim_runs: u32,
) -> anyhow::Result<()> {
    let vehicle = resources.catalog.vehicle(&participant.vehicle_id)?;
    let track = resources.catalog.track(&sim_pars.race_pars.track_id)?;
    let driver = resources
        .profiles
        .load_or_default(&participant.user_id, &participant.display_name);

    let t_start = Instant::now();
    let summaries = (0..no_sim_runs)
        .into_par_iter()
        .map(|i| {
            let run_pars = RunPars {
                rng_seed: run_pars.rng_seed.wrapping_add(i as u64),
                ..run_pars
            };
            handle_race(
                vehicle.to_owned(),
                track.to_owned(),
                driver.to_owned(),
                run_pars,
                Box::new(NullSink),
                resources.sim_consts,
            )
            .map(|report| report.summary)
        })
        .collect::<Result<Vec<RaceSummary>, _>>()?;

    tracing::info!(
        "executed {} runs in {}ms",
        no_sim_runs,
        t_start.elapsed().as_millis()
    );

    let times: Vec<f64> = summaries.iter().map(|s| s.total_time).collect();
    let incidents: Vec<f64> = summaries.iter().map(|s| s.incident_count as f64).collect();
    let (t_min, t_max) = min_max(&times).unwrap_or((0.0, 0.0));

    println!(
        "RESULT: {} over {} runs: mean {:.2}s, min {:.2}s, max {:.2}s, mean incidents {:.2}",
        participant.display_name,
        no_sim_runs,
        mean(&times),
        t_min,
        t_max,
        mean(&incidents)
    );
    Ok(())
}

// ---- LOBBY RACE ----
fn run_lobby_race(
    resources: RaceResources,
    sim_pars: &SimPars,
    run_pars: RunPars,
    sim_opts: &SimOpts,
) -> anyhow::Result<()> {
    let registry = LobbyRegistry::new();
    let lobby_id = registry.create(&sim_pars.race_pars.track_id);
    for participant in sim_pars.race_pars.participants.iter() {
        registry.join(&lobby_id, participant.to_owned())?;
    }

    let (tx, rx) = flume::unbounded::<TaggedEvent>();
    let printer = thread::spawn(move || {
        for tagged in rx.iter() {
            let _span = tracing::info_span!("event", user = %tagged.name).entered();
            log_event(&tagged.event);
        }
    });

    let t_start = Instant::now();
    let outcomes = registry.start(&lobby_id, resources, run_pars, Some(tx));
    if printer.join().is_err() {
        tracing::warn!("event printer panicked");
    }
    let outcomes = outcomes?;
    tracing::info!("execution time: {}ms", t_start.elapsed().as_millis());

    let standings = Standings::from_outcomes(&outcomes);
    let title = format!("Lobby {} on {}", lobby_id, sim_pars.race_pars.track_id);
    standings.print_standings(&title);

    if let Some(results_path) = &sim_opts.results_path {
        standings.write_standings_to_file(&title, results_path)?;
        tracing::info!("standings written to {}", results_path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();
    init_logging(sim_opts.debug);
    sim_opts.check_timestep_size()?;

    // get simulation parameters
    tracing::info!(
        "reading simulation parameters from {}",
        sim_opts.parfile_path.display()
    );
    let sim_pars = read_sim_pars(&sim_opts.parfile_path)?;
    let sim_consts = match &sim_opts.constants_path {
        Some(constants_path) => read_sim_constants(constants_path)?,
        None => SimConstants::default(),
    };

    let catalog = sim_pars.catalog();
    let profiles = sim_pars.profile_store();
    let resources = RaceResources {
        catalog: &catalog,
        profiles: &profiles,
        sim_consts: &sim_consts,
    };
    let run_pars = RunPars {
        tot_no_laps: sim_pars.race_pars.tot_no_laps,
        timestep_size: sim_opts.timestep_size,
        rng_seed: sim_pars.race_pars.seed,
    };

    tracing::info!(
        "simulating {} laps on {} with a time step size of {:.3}s",
        run_pars.tot_no_laps,
        sim_pars.race_pars.track_id,
        run_pars.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    match sim_pars.race_pars.participants.as_slice() {
        [] => anyhow::bail!("The parameter file does not contain any participants!"),
        [participant] if sim_opts.no_sim_runs > 1 => run_solo_statistics(
            resources,
            participant,
            &sim_pars,
            run_pars,
            sim_opts.no_sim_runs,
        ),
        [participant] => run_solo_race(resources, participant, &sim_pars, run_pars),
        _ => run_lobby_race(resources, &sim_pars, run_pars, &sim_opts),
    }
}
