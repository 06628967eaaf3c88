//! Lua runner for custom code steps.
//!
//! Each run gets a fresh Lua state with the step input bound to the global
//! `input`. The chunk's return value, converted back to JSON, is the step
//! output:
//!
//! ```lua
//! return { title = string.match(input.html, "<title>(.-)</title>") }
//! ```
//!
//! A chunk that is a single expression may leave out `return`. `print` is
//! routed to the log. The Lua standard library is fully available; code is
//! not sandboxed.

use async_trait::async_trait;
use mlua::{Lua, LuaSerdeExt, Variadic};
use relay_host::{CodeRunner, HostError};
use serde_json::Value;
use tracing::info;

/// Runs custom code steps in Lua 5.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaCodeRunner;

impl LuaCodeRunner {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl CodeRunner for LuaCodeRunner {
  async fn run(&self, source: &str, input: Value) -> Result<Value, HostError> {
    let source = source.to_string();

    // Lua calls block, keep them off the async workers.
    tokio::task::spawn_blocking(move || evaluate(&source, input))
      .await
      .map_err(|e| HostError::Code {
        message: format!("lua task failed: {}", e),
      })?
  }
}

fn evaluate(source: &str, input: Value) -> Result<Value, HostError> {
  let lua = Lua::new();

  let print = lua
    .create_function(|lua, args: Variadic<mlua::Value>| {
      let tostring: mlua::Function = lua.globals().get("tostring")?;
      let parts = args
        .into_iter()
        .map(|value| tostring.call::<String>(value))
        .collect::<mlua::Result<Vec<_>>>()?;
      info!(event = "code_print", message = %parts.join("\t"), "custom code output");
      Ok(())
    })
    .map_err(code_error)?;

  let globals = lua.globals();
  globals.set("print", print).map_err(code_error)?;
  globals
    .set("input", lua.to_value(&input).map_err(code_error)?)
    .map_err(code_error)?;

  let result: mlua::Value = lua.load(source).set_name("step").eval().map_err(code_error)?;
  lua.from_value(result).map_err(code_error)
}

fn code_error(e: mlua::Error) -> HostError {
  HostError::Code {
    message: e.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_returns_table_built_from_input() {
    let output = LuaCodeRunner
      .run(
        r#"return { title = string.match(input.html, "<title>(.-)</title>") }"#,
        json!({"html": "<html><title>Hello</title></html>"}),
      )
      .await
      .unwrap();

    assert_eq!(output, json!({"title": "Hello"}));
  }

  #[tokio::test]
  async fn test_expression_without_return() {
    let output = LuaCodeRunner
      .run("input.count * 2", json!({"count": 21}))
      .await
      .unwrap();

    assert_eq!(output, json!(42));
  }

  #[tokio::test]
  async fn test_nested_values_round_trip() {
    let output = LuaCodeRunner
      .run(
        "return { name = input.user.name, tags = input.tags, first = input.tags[1] }",
        json!({"user": {"name": "ada"}, "tags": ["a", "b"]}),
      )
      .await
      .unwrap();

    assert_eq!(
      output,
      json!({"name": "ada", "tags": ["a", "b"], "first": "a"})
    );
  }

  #[tokio::test]
  async fn test_no_return_is_null() {
    let output = LuaCodeRunner
      .run("local x = 1", json!({}))
      .await
      .unwrap();

    assert_eq!(output, Value::Null);
  }

  #[tokio::test]
  async fn test_print_accepts_any_value() {
    let output = LuaCodeRunner
      .run(
        "print(nil, true, input, 1.5) print() return input.n",
        json!({"n": 3}),
      )
      .await
      .unwrap();

    assert_eq!(output, json!(3));
  }

  #[tokio::test]
  async fn test_runtime_error_is_reported() {
    let err = LuaCodeRunner
      .run(r#"error("boom")"#, json!({}))
      .await
      .unwrap_err();

    match err {
      HostError::Code { message } => assert!(message.contains("boom"), "{}", message),
      other => panic!("expected code error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_syntax_error_is_reported() {
    let err = LuaCodeRunner
      .run("return {", json!({}))
      .await
      .unwrap_err();

    assert!(matches!(err, HostError::Code { .. }));
  }
}
