//! Persisted snapshot layout.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::StorageError;
use crate::models::EntityKind;

const TOP_ENTITIES: usize = 5;

/// Build `{region, summary: {totalGames, avgPlacement, top<Entities>}, <kind>: [...]}`.
///
/// `avgPlacement` in the summary is weighted by entity count. Top entities
/// are the five with the highest count, stripped of nested arrays.
pub fn build_payload<T: Serialize>(
    kind: EntityKind,
    scope: &str,
    total_games: usize,
    entities: &[T],
) -> Result<Value, StorageError> {
    let entities: Vec<Value> = entities
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    let mut weight = 0.0;
    let mut placement = 0.0;
    for entity in &entities {
        let count = entity.get("count").and_then(Value::as_f64).unwrap_or(1.0);
        if let Some(avg) = entity.get("avgPlacement").and_then(Value::as_f64) {
            weight += count;
            placement += avg * count;
        }
    }
    let avg_placement = if weight > 0.0 { placement / weight } else { 0.0 };

    let mut ranked: Vec<&Value> = entities.iter().collect();
    ranked.sort_by(|a, b| count_of(b).cmp(&count_of(a)));
    let top: Vec<Value> = ranked
        .into_iter()
        .take(TOP_ENTITIES)
        .map(summary_entry)
        .collect();

    let mut summary = Map::new();
    summary.insert("totalGames".to_string(), json!(total_games));
    summary.insert("avgPlacement".to_string(), json!(avg_placement));
    summary.insert(kind.top_key().to_string(), Value::Array(top));

    let mut payload = Map::new();
    payload.insert("region".to_string(), json!(scope));
    payload.insert("summary".to_string(), Value::Object(summary));
    payload.insert(kind.as_str().to_string(), Value::Array(entities));
    Ok(Value::Object(payload))
}

fn count_of(entity: &Value) -> u64 {
    entity.get("count").and_then(Value::as_u64).unwrap_or(1)
}

fn summary_entry(entity: &Value) -> Value {
    match entity {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_array())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}
