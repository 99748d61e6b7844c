// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, arguments: &Value) -> HandlerOutcome {
        HandlerOutcome::ok(arguments.to_string())
    }
}

fn tool(name: &str) -> Tool {
    Tool {
        name: name.into(),
        description: "test tool".into(),
        parameters: json!({"type": "object"}),
        category: ToolCategory::General,
        read_only: false,
    }
}

#[test]
fn register_and_lookup() {
    let registry = ToolRegistry::new();
    registry.register(tool("echo"), Arc::new(EchoHandler)).unwrap();

    let (found, _) = registry.get("echo").unwrap();
    assert_eq!(found.name, "echo");
    assert!(registry.get("missing").is_none());
}

#[test]
fn duplicate_registration_fails() {
    let registry = ToolRegistry::new();
    registry.register(tool("echo"), Arc::new(EchoHandler)).unwrap();
    assert!(matches!(
        registry.register(tool("echo"), Arc::new(EchoHandler)),
        Err(RegistryError::Duplicate(_))
    ));
}

#[test]
fn list_is_sorted() {
    let registry = ToolRegistry::new();
    registry.register(tool("zeta"), Arc::new(EchoHandler)).unwrap();
    registry.register(tool("alpha"), Arc::new(EchoHandler)).unwrap();

    let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn builtins_include_task_complete() {
    let registry = ToolRegistry::with_builtins();
    let (tool, _) = registry.get("task_complete").unwrap();
    assert!(tool.read_only);

    let descriptors = registry.descriptors();
    assert!(descriptors.iter().any(|d| d.name == "task_complete"));
}

#[tokio::test]
async fn task_complete_echoes_the_summary() {
    let registry = ToolRegistry::with_builtins();
    let (_, handler) = registry.get("task_complete").unwrap();

    let outcome = handler.call(&json!({"summary": "all done"})).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.output, "all done");

    let outcome = handler.call(&json!({})).await;
    assert_eq!(outcome.output, "task complete");
}
