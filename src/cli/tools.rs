//! `tools list|run` subcommands

use std::error::Error;

use serde_json::{Map, Value};

use crate::tools::ToolRegistry;

pub fn list_tools(registry: &ToolRegistry) {
    if registry.is_empty() {
        println!("No tools registered.");
        return;
    }
    println!("🔧 Tools offered to the model:");
    for definition in registry.definitions() {
        println!();
        println!("  • {}", definition.name);
        println!("    {}", definition.description);
        if let Some(properties) = definition
            .parameters
            .get("properties")
            .and_then(Value::as_object)
        {
            for (name, schema) in properties {
                let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
                println!("    - {name} ({kind})");
            }
        }
    }
}

/// Parse the optional JSON argument object given on the command line.
pub fn parse_arguments(raw: Option<&str>) -> Result<Map<String, Value>, Box<dyn Error>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(format!("Tool arguments must be a JSON object, got {other}").into()),
    }
}

/// Run one tool directly, printing its rendered view when it has one.
pub async fn run_tool(
    registry: &ToolRegistry,
    name: &str,
    raw_arguments: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if registry.get(name).is_none() {
        return Err(format!(
            "Unknown tool '{name}'. Available: {}",
            registry.names().join(", ")
        )
        .into());
    }
    let arguments = parse_arguments(raw_arguments)?;
    let result = registry.execute(name, arguments).await;
    match registry.render(name, &result) {
        Some(display) => println!("{display}"),
        None => println!("{result}"),
    }
    Ok(())
}
