// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Expression parsing and evaluation for the interactive loop.
//!
//! The language is deliberately small: a dotted path either names a value or
//! is called with at most one JSON argument.

use serde_json::Value;

use crate::binder::PATH_SEPARATOR;
use crate::emulator::Invocation;
use crate::namespace::{Entry, Lookup, Namespace};

/// Prompt shown before each expression.
pub const DEFAULT_PROMPT: &str = "firebase > ";

/// Rendered in place of an outbound HTTP request.
pub const REQUEST_PLACEHOLDER: &str = "Sent request to function.";

/// Renders a call result for the operator.
pub type OutputWriter = fn(&Invocation) -> String;

/// Default output formatter. Outbound requests are summarized instead of
/// dumped, since the response is reported separately when it arrives.
pub fn format_invocation(output: &Invocation) -> String {
    match output {
        Invocation::Request(_) => REQUEST_PLACEHOLDER.to_string(),
        Invocation::Value(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Invocation::Text(text) => text.clone(),
    }
}

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Empty,
    Reference(String),
    Call {
        path: String,
        argument: Option<Value>,
    },
}

/// Parse one line. Errors are messages suitable for display.
pub fn parse(line: &str) -> Result<Expression, String> {
    let line = line.trim().trim_end_matches(';').trim_end();
    if line.is_empty() {
        return Ok(Expression::Empty);
    }

    let Some(open) = line.find('(') else {
        validate_path(line)?;
        return Ok(Expression::Reference(line.to_string()));
    };

    let path = line[..open].trim_end();
    validate_path(path)?;

    let Some(inner) = line[open + 1..].strip_suffix(')') else {
        return Err("missing ) after argument list".to_string());
    };
    let inner = inner.trim();
    let argument = if inner.is_empty() {
        None
    } else {
        Some(serde_json::from_str(inner).map_err(|e| format!("invalid argument: {}", e))?)
    };

    Ok(Expression::Call {
        path: path.to_string(),
        argument,
    })
}

fn validate_path(path: &str) -> Result<(), String> {
    let valid = !path.is_empty()
        && path.split(PATH_SEPARATOR).all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(format!("unexpected token in '{}'", path))
    }
}

/// Evaluates expressions against a namespace.
pub struct Repl {
    prompt: String,
    writer: OutputWriter,
    namespace: Namespace,
}

impl Repl {
    pub fn new(prompt: impl Into<String>, writer: OutputWriter, namespace: Namespace) -> Self {
        Self {
            prompt: prompt.into(),
            writer,
            namespace,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Evaluate one line and render the result. `None` means there is
    /// nothing to print. Never fails: errors are rendered as the result.
    pub async fn eval(&self, line: &str) -> Option<String> {
        let expression = match parse(line) {
            Ok(expression) => expression,
            Err(message) => return Some(format!("SyntaxError: {}", message)),
        };

        match expression {
            Expression::Empty => None,
            Expression::Reference(path) => Some(self.describe(&path)),
            Expression::Call { path, argument } => Some(self.call(&path, argument).await),
        }
    }

    async fn call(&self, path: &str, argument: Option<Value>) -> String {
        match self.namespace.lookup(path) {
            Lookup::Entry(Entry::Callable(callable)) => match callable.invoke(argument).await {
                Ok(output) => (self.writer)(&output),
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "Invocation failed");
                    format!("Error: {}", e)
                }
            },
            Lookup::Entry(Entry::Text(_)) | Lookup::Group(_) => {
                format!("TypeError: {} is not a function", path)
            }
            Lookup::Missing => not_defined(path),
        }
    }

    fn describe(&self, path: &str) -> String {
        match self.namespace.lookup(path) {
            Lookup::Entry(Entry::Callable(callable)) => format!("[Function: {}]", callable.path()),
            Lookup::Entry(Entry::Text(text)) => text.clone(),
            Lookup::Group(members) => {
                let rendered: Vec<String> = members
                    .iter()
                    .map(|member| {
                        let nested = format!("{}{}{}", path, PATH_SEPARATOR, member);
                        match self.namespace.lookup(&nested) {
                            Lookup::Entry(Entry::Callable(_)) => {
                                format!("{}: [Function: {}]", member, nested)
                            }
                            Lookup::Entry(Entry::Text(_)) => format!("{}: [String]", member),
                            Lookup::Group(_) | Lookup::Missing => format!("{}: [Object]", member),
                        }
                    })
                    .collect();
                format!("{{ {} }}", rendered.join(", "))
            }
            Lookup::Missing => not_defined(path),
        }
    }
}

fn not_defined(path: &str) -> String {
    let root = path.split(PATH_SEPARATOR).next().unwrap_or(path);
    format!("ReferenceError: {} is not defined", root)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::binder::CallableBinder;
    use crate::emulator::{
        EmulatorInstance, InvocationTarget, RunningEmulator, SentRequest, Trigger,
    };
    use crate::error::InvocationError;

    struct Canned;

    #[async_trait]
    impl EmulatorInstance for Canned {
        fn triggers(&self) -> Vec<Trigger> {
            Vec::new()
        }

        fn emulated_functions(&self) -> Vec<String> {
            Vec::new()
        }

        async fn invoke(
            &self,
            trigger: &Trigger,
            argument: Option<Value>,
        ) -> Result<Invocation, InvocationError> {
            match &trigger.target {
                InvocationTarget::Http { url } => Ok(Invocation::Request(SentRequest {
                    method: "GET".to_string(),
                    url: url.clone(),
                })),
                InvocationTarget::Event { .. } if trigger.name == "fails" => {
                    Err(InvocationError::Failed {
                        function: trigger.name.clone(),
                        status: 500,
                        detail: "boom".to_string(),
                    })
                }
                InvocationTarget::Event { .. } => {
                    Ok(Invocation::Value(json!({ "received": argument })))
                }
            }
        }
    }

    fn repl() -> Repl {
        let instance: RunningEmulator = Arc::new(Canned);
        let mut namespace = Namespace::with_help();
        namespace.install(CallableBinder::bind(
            Trigger {
                name: "api-hello".to_string(),
                target: InvocationTarget::Http {
                    url: "http://localhost:5001/demo/us-central1/api-hello".to_string(),
                },
                emulated: true,
            },
            &instance,
        ));
        for name in ["onCreate-a", "fails"] {
            namespace.install(CallableBinder::bind(
                Trigger {
                    name: name.to_string(),
                    target: InvocationTarget::Event {
                        event_type: "providers/cloud.firestore/eventTypes/document.create"
                            .to_string(),
                        resource: "projects/demo/databases/(default)/documents/a/{id}".to_string(),
                    },
                    emulated: true,
                },
                &instance,
            ));
        }
        Repl::new(DEFAULT_PROMPT, format_invocation, namespace)
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("   ").unwrap(), Expression::Empty);
        assert_eq!(
            parse("onCreate.a").unwrap(),
            Expression::Reference("onCreate.a".to_string())
        );
        assert_eq!(
            parse("onCreate.a()").unwrap(),
            Expression::Call {
                path: "onCreate.a".to_string(),
                argument: None
            }
        );
        assert_eq!(
            parse(r#"onCreate.a({"x": 1});"#).unwrap(),
            Expression::Call {
                path: "onCreate.a".to_string(),
                argument: Some(json!({"x": 1}))
            }
        );
        assert!(parse("onCreate.a(").is_err());
        assert!(parse("onCreate..a").is_err());
        assert!(parse("1abc").is_err());
        assert!(parse("f({bad json})").is_err());
    }

    #[test]
    fn test_request_placeholder() {
        let rendered = format_invocation(&Invocation::Request(SentRequest {
            method: "POST".to_string(),
            url: "http://localhost:5001/demo/us-central1/api".to_string(),
        }));
        assert_eq!(rendered, REQUEST_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_eval_http_call_renders_placeholder() {
        let output = repl().eval("api.hello()").await;
        assert_eq!(output.as_deref(), Some(REQUEST_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_eval_event_call_returns_value() {
        let output = repl().eval(r#"onCreate.a({"name": "ada"})"#).await.unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value, json!({"received": {"name": "ada"}}));
    }

    #[tokio::test]
    async fn test_eval_errors_are_rendered() {
        let repl = repl();
        assert_eq!(
            repl.eval("fails()").await.as_deref(),
            Some("Error: Function fails failed with status 500: boom")
        );
        assert_eq!(
            repl.eval("missing.fn()").await.as_deref(),
            Some("ReferenceError: missing is not defined")
        );
        assert_eq!(
            repl.eval("help()").await.as_deref(),
            Some("TypeError: help is not a function")
        );
        assert!(repl.eval("((").await.unwrap().starts_with("SyntaxError"));
    }

    #[tokio::test]
    async fn test_eval_references() {
        let repl = repl();
        assert_eq!(repl.eval("").await, None);
        assert!(repl.eval("help").await.unwrap().contains("local-emulator"));
        assert_eq!(
            repl.eval("onCreate").await.as_deref(),
            Some("{ a: [Function: onCreate.a] }")
        );
        assert_eq!(
            repl.eval("api.hello").await.as_deref(),
            Some("[Function: api.hello]")
        );
    }
}
