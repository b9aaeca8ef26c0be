//! VLM decision boundary.
//!
//! Builds the per-tick prompt, extracts the JSON decision out of whatever
//! text the model returns, and maps the loose action objects onto the
//! typed [`ChosenAction`] union. Anything that fits neither a known skill
//! nor a primitive opcode is rejected here; a parse failure is a no-op
//! tick, never an error that crosses the loop boundary.

use serde_json::Value;
use tracing::debug;

use crate::domain::error::VlmError;
use crate::domain::models::action::{ChosenAction, PrimitiveAction, VlmAction, VlmDecision};
use crate::domain::models::snapshot::{Facing, Position, Surroundings, WorldSnapshot};
use crate::domain::models::task::ResolvedTask;
use crate::services::skill_library::SkillLibrary;

/// Assemble the tick prompt from snapshot summary, the active task,
/// hints, short action history, and inventory.
pub fn build_prompt(
    world: &WorldSnapshot,
    surroundings: &Surroundings,
    task: Option<&ResolvedTask>,
    hints: &[String],
    history: &[String],
) -> String {
    let inventory = if world.inventory.is_empty() {
        "(empty)".to_string()
    } else {
        world
            .inventory
            .iter()
            .map(|i| format!("- slot {}: {} x{}", i.slot, i.name, i.stack))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let adjacent = surroundings
        .iter()
        .map(|(facing, tile)| {
            format!(
                "- {facing}: {:?}{}{}",
                tile.kind,
                if tile.passable { "" } else { " (impassable)" },
                tile.blocker
                    .as_deref()
                    .map(|b| format!(", blocker: {b}"))
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let task_text = task.map_or_else(
        || "No task is queued; choose something useful.".to_string(),
        |t| format!("{} (priority {})", t.description, t.priority.as_str()),
    );

    let hints_text = if hints.is_empty() {
        "None".to_string()
    } else {
        hints.join("\n")
    };

    let history_text = if history.is_empty() {
        "None".to_string()
    } else {
        history.join(", ")
    };

    format!(
        r#"You are a farmhand agent playing a farming sim through a fixed action set.

## Now
Day {day}, {time:04} o'clock, {weather:?}, {season:?}. Location: {location}.
Standing at ({px}, {py}) facing {facing}. Energy {energy:.0}, {money}g.

## Adjacent tiles
{adjacent}

## Inventory
{inventory}

## Current task
{task_text}

## Hints
{hints_text}

## Recent actions
{history_text}

## Respond
Reply with ONLY a JSON object:
{{
  "reasoning": "one or two sentences",
  "actions": [
    {{"type": "<skill or primitive>", "...": "parameters"}}
  ]
}}

Skills take optional "x", "y", "direction", "item", "quantity", "location".
The first action is executed; list at most three."#,
        day = world.day_of_year,
        time = world.time,
        weather = world.weather,
        season = world.season,
        location = world.location,
        px = world.player_tile.x,
        py = world.player_tile.y,
        facing = world.facing,
        energy = world.energy,
        money = world.money,
    )
}

/// Extract a [`VlmDecision`] from raw model text.
///
/// Tolerant by design: strips markdown fences, locates the outermost
/// JSON object, and attempts a lightweight comma repair before giving up.
pub fn extract_decision(text: &str) -> Result<VlmDecision, VlmError> {
    let candidate = extract_json_object(text)
        .ok_or_else(|| VlmError::ParseFailed("no JSON object in response".to_string()))?;

    match serde_json::from_str::<VlmDecision>(&candidate) {
        Ok(decision) => Ok(decision),
        Err(first_err) => {
            let repaired = repair_json(&candidate);
            serde_json::from_str::<VlmDecision>(&repaired).map_err(|_| {
                VlmError::ParseFailed(format!("JSON did not parse: {first_err}"))
            })
        }
    }
}

/// Slice out the JSON object embedded in model text, handling markdown
/// code fences and surrounding prose.
fn extract_json_object(response: &str) -> Option<String> {
    let trimmed = response.trim();

    // fenced block first
    let fenced = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.rfind("```").map(|end| rest[..end].trim())
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.rfind("```").map(|end| rest[..end].trim())
    } else {
        None
    };
    let body = fenced.unwrap_or(trimmed);

    if body.starts_with('{') && body.ends_with('}') {
        return Some(body.to_string());
    }

    // outermost braces within prose
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| body[start..=end].to_string())
}

/// Insert the commas sloppy generations drop between adjacent values.
/// Single pass, no recursion; string contents are left untouched.
fn repair_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_ws = String::new();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                out.push(c);
                pending_ws.clear();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() {
                        pending_ws.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if matches!(chars.peek(), Some('{' | '"' | '[')) {
                    out.push(',');
                }
                out.push_str(&pending_ws);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Map one loose VLM action onto the typed union.
///
/// Known skill names become [`ChosenAction::Skill`]; known opcodes become
/// primitives via their strict parameter schema; everything else is
/// rejected with None.
pub fn map_action(action: &VlmAction, library: &SkillLibrary) -> Option<ChosenAction> {
    if library.contains(&action.kind) {
        return Some(ChosenAction::Skill {
            name: action.kind.clone(),
            target: param_position(&action.params),
            direction: param_facing(&action.params),
            item: param_str(&action.params, "item"),
            quantity: param_u32(&action.params, "quantity"),
            location: param_str(&action.params, "location"),
        });
    }

    // try the primitive schema: {"action": type, ...params}
    let mut obj = serde_json::Map::new();
    obj.insert("action".to_string(), Value::String(action.kind.clone()));
    for (k, v) in &action.params {
        obj.insert(k.clone(), v.clone());
    }
    match serde_json::from_value::<PrimitiveAction>(Value::Object(obj)) {
        Ok(primitive) => Some(ChosenAction::Primitive(primitive)),
        Err(e) => {
            debug!(kind = %action.kind, error = %e, "unmappable VLM action rejected");
            None
        }
    }
}

fn param_position(params: &serde_json::Map<String, Value>) -> Option<Position> {
    let x = params.get("x")?.as_i64()?;
    let y = params.get("y")?.as_i64()?;
    Some(Position::new(
        i32::try_from(x).ok()?,
        i32::try_from(y).ok()?,
    ))
}

fn param_facing(params: &serde_json::Map<String, Value>) -> Option<Facing> {
    match params.get("direction")?.as_str()? {
        "north" | "up" => Some(Facing::North),
        "south" | "down" => Some(Facing::South),
        "east" | "right" => Some(Facing::East),
        "west" | "left" => Some(Facing::West),
        _ => None,
    }
}

fn param_str(params: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    params.get(key)?.as_str().map(String::from)
}

fn param_u32(params: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    u32::try_from(params.get(key)?.as_u64()?).ok()
}
