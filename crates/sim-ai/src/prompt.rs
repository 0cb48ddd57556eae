//! Prompt assembly and response decoding for language-model oracles.

use serde::Deserialize;
use serde_json::Value;
use sim_core::{CharacterRegistry, Issues, RoundRecord, Scenario, Score};
use std::fmt::Write as _;

use crate::{style_guide, DialogueRequest, DialogueResponse, OracleError};

/// A rendered system/user prompt pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Attitude label for a stance, tinted by a tense climate.
pub fn mood(stance: Score, climate: Score) -> String {
    let base = match stance.get() {
        s if s < 35 => "Hostile / Defensive",
        s if s < 45 => "Skeptical / Wary",
        s if s < 55 => "Neutral / Waiting",
        s if s < 70 => "Interested / Constructive",
        _ => "Enthusiastic / Partnering",
    };
    if climate.get() < 30 {
        format!("{base} (Tense Atmosphere)")
    } else {
        base.to_string()
    }
}

/// One line per catalogued issue, e.g. "Affordable housing share: 35%".
pub fn deal_summary(scenario: &Scenario, issues: &Issues) -> String {
    scenario
        .issues
        .iter()
        .map(|(id, def)| match issues.get(id) {
            Some(value) => format!("{}: {value}", def.label),
            None => format!("{}: n/a", def.label),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Past rounds as a readable transcript.
pub fn history_transcript(history: &[RoundRecord], registry: &CharacterRegistry) -> String {
    if history.is_empty() {
        return "No discussion yet.\n".to_string();
    }
    let mut out = String::new();
    for record in history {
        let _ = writeln!(out, "--- Round {} ---", record.round);
        if let Some(event) = &record.event {
            let _ = writeln!(out, "[event: {event}]");
        }
        for (id, line) in &record.statements {
            let speaker = registry.get(id).map(|p| p.name.as_str()).unwrap_or("Unknown");
            let _ = writeln!(out, "{speaker}: {line}");
        }
    }
    out
}

/// Render the prompt for one participant's turn.
pub fn build_prompt(request: &DialogueRequest<'_>) -> Prompt {
    let p = request.participant;
    let scenario = request.scenario;
    let (role_name, objective) = request
        .role()
        .map(|r| (r.name.as_str(), r.objective.as_str()))
        .unwrap_or((p.role.as_str(), "Take part in the negotiation."));
    let bound = scenario.rules.oracle_delta_bound;

    let mut system = String::new();
    let _ = writeln!(
        system,
        "[System]\nYou are a stakeholder in the '{}' urban planning negotiation. Stay in character.",
        scenario.name
    );
    if !scenario.context.is_empty() {
        let _ = writeln!(system, "Context: {}", scenario.context);
    }
    let _ = writeln!(system, "\n[Character]\n- Name: {} ({role_name})", p.name);
    let _ = writeln!(system, "- Objective: {objective}");
    if let Some(persona) = &p.persona {
        let _ = writeln!(system, "- Backstory: {}", persona.bio);
        let _ = writeln!(system, "- Deepest fear: {}", persona.pain_point);
        let _ = writeln!(system, "- Quirk: {}", persona.quirk);
        let _ = writeln!(system, "- Flexibility: {}/10 (1 rigid, 10 easy)", persona.flexibility);
        if let Some(style) = style_guide(&persona.style) {
            let _ = writeln!(system, "\n[Speaking style: {}]", style.key);
            let _ = writeln!(system, "- {}", style.description);
            let _ = writeln!(system, "- Grammar: {}", style.grammar);
            let _ = writeln!(system, "- Vocabulary: {}", style.keywords.join(", "));
        }
    }
    let _ = writeln!(system, "\n[Table]");
    let _ = writeln!(system, "- Current deal: {}", deal_summary(scenario, request.issues));
    let _ = writeln!(
        system,
        "- Your stance: {}/100 ({})",
        p.stance,
        mood(p.stance, request.climate)
    );
    let _ = writeln!(system, "- Your trust in the player: {}/100", p.trust);
    let _ = writeln!(system, "- Negotiation climate: {}/100", request.climate);
    let _ = write!(
        system,
        "\n[Output]\nReturn a JSON object with keys 'thought_process', 'dialogue' and \
         'score_delta' (integer from -{bound} to {bound})."
    );

    let user = format!(
        "Dialogue history:\n{}\nPlayer says: \"{}\"",
        history_transcript(request.history, request.registry),
        request.statement
    );
    Prompt { system, user }
}

#[derive(Deserialize)]
struct RawResponse {
    dialogue: Option<String>,
    #[serde(default)]
    thought_process: Option<String>,
    #[serde(default)]
    score_delta: Option<Value>,
}

fn read_delta(value: Option<Value>) -> Result<i32, OracleError> {
    let number = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => {
            return Err(OracleError::Malformed(format!(
                "score_delta is not a number: {other}"
            )))
        }
    };
    match number {
        Some(n) if n.is_finite() => Ok(n.trunc().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32),
        _ => Err(OracleError::Malformed("score_delta is not a finite number".to_string())),
    }
}

/// Decode a `{thought_process, dialogue, score_delta}` JSON reply. The delta
/// is truncated toward zero but not bounded.
pub fn parse_response(text: &str) -> Result<DialogueResponse, OracleError> {
    let raw: RawResponse =
        serde_json::from_str(text).map_err(|e| OracleError::Malformed(e.to_string()))?;
    let dialogue = raw
        .dialogue
        .ok_or_else(|| OracleError::Malformed("missing dialogue".to_string()))?;
    Ok(DialogueResponse {
        dialogue,
        opinion_delta: read_delta(raw.score_delta)?,
        reasoning: raw.thought_process.filter(|t| !t.is_empty()),
    })
}
