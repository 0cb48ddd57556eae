#![deny(warnings)]

//! Headless CLI that plays a whole negotiation against the scripted oracle.

use anyhow::{anyhow, bail, Context, Result};
use sim_ai::ScriptedOracle;
use sim_core::{InfluenceActionKind, RoleId, Scenario};
use sim_runtime::{ChannelNotifier, RoundEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const STATEMENTS: [&str; 4] = [
    "I want a deal that keeps long-standing residents in the area while still letting the scheme move forward this year",
    "Can we agree that a larger share of genuinely affordable homes is worth a slightly smaller cultural venue on the dock",
    "The council needs something it can approve, so let us find terms every group here could defend in public",
    "If the developer can carry a few more affordable units, I will argue for the venue scale the community keeps asking for",
];

struct Args {
    role: RoleId,
    seed: u64,
    scenario: Option<PathBuf>,
    save: Option<PathBuf>,
    delta: i32,
    actions: Vec<(InfluenceActionKind, RoleId)>,
}

fn parse_action(arg: &str) -> Result<(InfluenceActionKind, RoleId)> {
    let (kind, role) = arg
        .split_once('@')
        .ok_or_else(|| anyhow!("expected <action>@<role>, got `{arg}`"))?;
    let kind: InfluenceActionKind = kind.parse().map_err(anyhow::Error::msg)?;
    Ok((kind, RoleId::from(role)))
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        role: RoleId::from("urban_designer"),
        seed: 42,
        scenario: None,
        save: None,
        delta: 2,
        actions: Vec::new(),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--role" => args.role = RoleId::from(value()?.as_str()),
            "--seed" => args.seed = value()?.parse().context("--seed")?,
            "--scenario" => args.scenario = Some(PathBuf::from(value()?)),
            "--save" => args.save = Some(PathBuf::from(value()?)),
            "--delta" => args.delta = value()?.parse().context("--delta")?,
            "--action" => args.actions.push(parse_action(&value()?)?),
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    Ok(args)
}

fn load_scenario(path: Option<&PathBuf>) -> Result<Scenario> {
    let Some(path) = path else {
        return Ok(Scenario::builtin()?);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let scenario = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Scenario::from_yaml_str(&text)?,
        Some("json") => Scenario::from_json_str(&text)?,
        _ => bail!("scenario file must be .json, .yaml or .yml"),
    };
    Ok(scenario)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        "starting CLI"
    );

    let scenario = Arc::new(load_scenario(args.scenario.as_ref())?);
    let (notifier, notices) = ChannelNotifier::bounded(16);
    let engine = RoundEngine::new(scenario.clone(), Arc::new(ScriptedOracle::new(args.delta)))
        .with_notifier(Arc::new(notifier));
    let mut state = engine.new_session(&args.role, args.seed)?;

    println!("{} | you play: {}", scenario.name, args.role);
    for p in state.registry.synthetic() {
        let persona = p.persona.as_ref().map_or("", |persona| persona.summary.as_str());
        println!("  {:<20} {:<20} {:>3}  {}", p.name, p.role, p.stance, persona);
    }

    for (kind, role) in &args.actions {
        let target = state
            .registry
            .with_role(role)
            .find(|p| !p.is_human)
            .map(|p| p.id.clone())
            .ok_or_else(|| anyhow!("no synthetic participant holds role `{role}`"))?;
        match engine.apply_influence_action(&mut state, *kind, &target) {
            Ok(receipt) => println!(
                "You {} {} for {} tokens: stance {}, trust {}{}",
                kind.verb(),
                target,
                receipt.cost,
                receipt.new_target_stance,
                receipt.new_target_trust,
                if receipt.leaked { " (leaked!)" } else { "" }
            ),
            Err(err) => println!("{kind} on {target} rejected: {err}"),
        }
    }

    let mut turn = 0;
    while !state.is_terminated() {
        let statement = STATEMENTS[turn % STATEMENTS.len()];
        turn += 1;
        let report = engine.submit_statement(&mut state, statement)?;
        let round = report.history_delta.round;
        println!("\n--- Round {round} ---");
        if let Some(text) = &report.event_text {
            println!("EVENT {text}");
        }
        for (id, line) in &report.history_delta.statements {
            let name = state.registry.get(id).map_or(id.as_str(), |p| p.name.as_str());
            let shift = report.stance_shifts.get(id).copied().unwrap_or(0);
            println!("{name:>18} [{shift:+}]: {line}");
        }
        let deal = sim_runtime::describe_deal(&scenario, &state.issues);
        println!(
            "climate {} | tokens {} | {}",
            report.climate, report.tokens_remaining, deal
        );
        for notice in notices.try_iter() {
            debug!(round = notice.round, climate = %notice.climate, "notice drained");
        }
    }

    if let Some(outcome) = state.outcome() {
        println!("\n{}\n{outcome}", outcome.title());
    }

    if let Some(path) = &args.save {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        persistence::write_to(&state, file)?;
        info!(path = %path.display(), "session saved");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_by_name_or_alias() {
        let (kind, role) = parse_action("pressure@developer").unwrap();
        assert_eq!(kind, InfluenceActionKind::PressureOpponent);
        assert_eq!(role, RoleId::from("developer"));
        let (kind, _) = parse_action("ally_recruitment@urban_designer").unwrap();
        assert_eq!(kind, InfluenceActionKind::AllyRecruitment);
    }

    #[test]
    fn malformed_actions_are_rejected() {
        let err = parse_action("bribe@developer").unwrap_err();
        assert_eq!(err.to_string(), "unknown influence action `bribe`");
        assert!(parse_action("gentle").is_err());
    }
}
