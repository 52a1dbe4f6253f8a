//! JSON-Schema description of exchange payloads.
//!
//! Derived purely from table registrations. Request and response share one
//! shape, so the same document validates both directions.

use crate::table::Table;
use serde_json::{json, Map, Value as Json};

fn table_definitions(table: &Table, definitions: &mut Map<String, Json>) {
    let properties: Map<String, Json> = table
        .schema()
        .iter()
        .map(|c| (c.name.clone(), c.ty.json_schema()))
        .collect();
    let key_properties: Map<String, Json> = table
        .primary_key()
        .iter()
        .filter_map(|k| properties.get(k).map(|p| (k.clone(), p.clone())))
        .collect();
    let all: Vec<&str> = table.schema().iter().map(|c| c.name.as_str()).collect();

    definitions.insert(
        format!("{}_deleted", table.name()),
        json!({
            "type": "object",
            "properties": key_properties,
            "additionalProperties": false,
            "required": table.primary_key(),
        }),
    );
    definitions.insert(
        format!("{}_modified", table.name()),
        json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
            "required": all,
        }),
    );
}

/// Builds the contract document for a set of tables.
///
/// Every listed table is required, matching a client that always reports
/// all of its tables.
pub fn contract<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Json {
    let mut definitions = Map::new();
    let mut table_properties = Map::new();
    let mut names = Vec::new();

    for table in tables {
        table_definitions(table, &mut definitions);
        let name = table.name();
        table_properties.insert(
            name.to_string(),
            json!({
                "allOf": [
                    { "$ref": "#/definitions/table" },
                    {
                        "properties": {
                            "modified": { "items": { "$ref": format!("#/definitions/{name}_modified") } },
                            "deleted": { "items": { "$ref": format!("#/definitions/{name}_deleted") } },
                        }
                    }
                ]
            }),
        );
        names.push(name.to_string());
    }

    definitions.insert(
        "table".into(),
        json!({
            "type": "object",
            "properties": {
                "modified": { "type": "array" },
                "deleted": { "type": "array" },
            },
            "additionalProperties": false,
            "required": ["modified", "deleted"],
        }),
    );

    json!({
        "definitions": definitions,
        "type": "object",
        "properties": {
            "timestamp": { "type": "integer", "minimum": 0 },
            "table": {
                "type": "object",
                "properties": table_properties,
                "additionalProperties": false,
                "required": names,
            },
        },
        "additionalProperties": false,
        "required": ["timestamp", "table"],
    })
}
