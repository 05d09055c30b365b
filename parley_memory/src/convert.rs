use parley_core::{MemoryEntry, Metadata};
use parley_entities::memories;
use sea_orm::JsonValue;

#[allow(clippy::cast_possible_truncation)]
pub fn json_to_embedding(val: &JsonValue) -> Option<Vec<f32>> {
    let arr = val.as_array()?;
    Some(
        arr.iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect(),
    )
}

pub fn embedding_to_json(emb: &[f32]) -> JsonValue {
    JsonValue::Array(emb.iter().map(|f| JsonValue::from(f64::from(*f))).collect())
}

pub fn metadata_from_json(val: JsonValue) -> Metadata {
    match val {
        JsonValue::Object(map) => map,
        _ => Metadata::new(),
    }
}

pub fn memory_entry_from_model(m: memories::Model) -> MemoryEntry {
    MemoryEntry {
        id: m.id,
        content: m.content,
        owner_id: m.owner_id,
        score: None,
        created_at: m.created_at,
        updated_at: m.updated_at,
        metadata: metadata_from_json(m.metadata),
    }
}
