// Headless Pet Duel client.
//
// Connects to a relay, joins the lobby with a freshly generated creature,
// and plays one match: a seeded random ability on each of its turns,
// accepting any level-up and evicting the weakest eligible ability. Prints
// the battle log and outcome, then exits. Useful for exercising a server by
// hand (run two bots against one `relay`).
//
// Usage:
//   duel_bot [OPTIONS]
//     --server <ADDR>          Relay address (default: 127.0.0.1:9999)
//     --species <NAME>         Skeleton, fire-elemental, knight, goblin, troll
//     --seed <N>               PRNG seed (default: derived from the clock)
//     --progression <PATH>     JSON ProgressionConfig
//     --timeout-secs <N>       Give up after N seconds (default: 120)

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use clap::Parser;
use petduel_prng::DuelRng;
use petduel_relay::Connection;
use petduel_relay::logging::init_tracing;
use petduel_sim::{Creature, LevelUpStep, Phase, ProgressionConfig, Species, TurnSync};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "duel_bot", version, about = "Headless Pet Duel client")]
struct Args {
    /// Relay address.
    #[arg(long, env = "PETDUEL_SERVER", default_value = "127.0.0.1:9999")]
    server: String,

    /// Species to generate (random when omitted).
    #[arg(long, value_parser = parse_species)]
    species: Option<Species>,

    /// PRNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Progression tuning as a JSON file.
    #[arg(long)]
    progression: Option<PathBuf>,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

fn parse_species(raw: &str) -> Result<Species, String> {
    let wanted: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    Species::ALL
        .into_iter()
        .find(|s| {
            s.name()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .eq(wanted.chars())
        })
        .ok_or_else(|| format!("unknown species `{raw}`"))
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.progression {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ProgressionConfig::from_json(&json)?
        }
        None => ProgressionConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(clock_seed);
    let mut rng = DuelRng::new(seed);
    let species = match args.species {
        Some(species) => species,
        None => {
            let pick = rng.choose_index(Species::ALL.len()).unwrap_or(0);
            Species::ALL[pick]
        }
    };
    let creature = Creature::generate(species, &mut rng);
    info!(seed, creature = creature.name(), hp = creature.max_hp, "generated creature");

    let conn = Connection::connect(&args.server)?;
    let mut sync = TurnSync::new(DuelRng::new(rng.next_u64()), config);
    conn.send(&sync.join_lobby(&creature))?;
    println!("Waiting for an opponent as {}...", creature.name());

    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    loop {
        for message in conn.poll_all()? {
            if let Err(e) = sync.handle_message(&message) {
                warn!(error = %e, "message rejected");
            }
        }
        match sync.phase() {
            Phase::MyTurn => {
                let available = sync.own_creature().map_or(0, |c| c.abilities.len());
                let index = rng.choose_index(available).unwrap_or(0);
                let action = sync.request_action(index)?;
                conn.send(&action.message)?;
            }
            Phase::LevelUp => resolve_level_up(&mut sync)?,
            Phase::BattleOver => break,
            Phase::WaitingForMatch | Phase::OpponentTurn => {}
        }
        if !conn.is_receiving() && sync.phase() != Phase::BattleOver {
            bail!("server closed the connection");
        }
        if Instant::now() >= deadline {
            bail!("timed out after {}s", args.timeout_secs);
        }
        thread::sleep(POLL_INTERVAL);
    }
    conn.close();

    for line in sync.action_log() {
        println!("{line}");
    }
    if let Some(creature) = sync.own_creature() {
        println!(
            "{}: level {}, {} XP, {}/{} HP",
            creature.name(),
            creature.level,
            creature.xp,
            creature.current_hp,
            creature.max_hp
        );
        for ability in &creature.abilities {
            println!("  {ability}");
        }
    }
    Ok(())
}

/// Accept the candidate into a free slot if there is one, otherwise evict
/// the weakest eligible ability.
fn resolve_level_up(sync: &mut TurnSync) -> anyhow::Result<()> {
    match sync.decide_level_up(true)? {
        LevelUpStep::ChooseReplacement(prompt) => {
            let abilities = sync
                .own_creature()
                .map(|c| c.abilities.clone())
                .unwrap_or_default();
            let slot = prompt.free_slot.or_else(|| {
                prompt
                    .eligible_indices
                    .iter()
                    .copied()
                    .min_by_key(|&i| abilities.get(i).map_or(i32::MAX, |a| a.power()))
            });
            let step = sync.choose_replacement(slot)?;
            info!(?step, candidate = %prompt.candidate.name, "level-up resolved");
        }
        step => info!(?step, "level-up resolved"),
    }
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
