// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Functions emulator backed by the HTTP gateway.
//!
//! Serves the functions declared in a manifest: the gateway listens on the
//! shell's port and each function's handler listens on its own port, either
//! started here from the manifest `command` or already running.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fnshell_core::{
    EmulatorInstance, FunctionConfig, FunctionsEmulator, Invocation, InvocationError,
    InvocationTarget, Manifest, RunningEmulator, SentRequest, ShellConfig, ShutdownError,
    StartupError, Trigger, TriggerConfig,
};

use crate::gateway::{self, Route};

/// Interval between readiness probes of a handler port.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct HandlerProcess {
    name: String,
    port: u16,
    child: Child,
}

struct Running {
    base_url: String,
    shutdown: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
    handlers: Vec<HandlerProcess>,
}

/// Emulates the functions in a manifest behind a local gateway.
pub struct GatewayEmulator {
    manifest: Manifest,
    client: reqwest::Client,
    running: Mutex<Option<Running>>,
}

impl GatewayEmulator {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            client: reqwest::Client::new(),
            running: Mutex::new(None),
        }
    }

    fn routes(&self) -> HashMap<String, Route> {
        self.manifest
            .functions
            .iter()
            .map(|func| {
                (
                    func.name.to_string(),
                    Route {
                        region: func.region.clone(),
                        handler_port: func.handler_port.value(),
                    },
                )
            })
            .collect()
    }

    fn trigger_for(func: &FunctionConfig, base_url: &str) -> Trigger {
        let target = match &func.trigger {
            TriggerConfig::Http => InvocationTarget::Http {
                url: format!("{}/{}/{}", base_url, func.region, func.name),
            },
            TriggerConfig::Event {
                event_type,
                resource,
            } => InvocationTarget::Event {
                event_type: event_type.clone(),
                resource: resource.clone(),
            },
        };
        Trigger {
            name: func.name.to_string(),
            target,
            emulated: func.emulated && func.trigger.is_emulatable(),
        }
    }
}

/// Spawn the handler process for a function.
fn spawn_handler(func: &FunctionConfig, config: &ShellConfig) -> Result<Child, StartupError> {
    let Some((program, args)) = func.command.split_first() else {
        return Err(StartupError::SpawnFailed {
            function: func.name.to_string(),
            reason: "empty command".to_string(),
        });
    };

    let mut env_vars: HashMap<String, String> = func.environment.clone();
    env_vars.insert("PORT".to_string(), func.handler_port.to_string());
    env_vars.insert("FNSHELL_FUNCTION".to_string(), func.name.to_string());
    env_vars.insert("FNSHELL_PROJECT".to_string(), config.project.to_string());
    env_vars.insert("GCLOUD_PROJECT".to_string(), config.project.to_string());
    if let Some(debug_port) = config.debug_port {
        env_vars.insert("FNSHELL_INSPECT_PORT".to_string(), debug_port.to_string());
    }
    for endpoint in config.peers.values() {
        if let Some(var) = endpoint.kind.host_env_var() {
            env_vars.insert(var.to_string(), endpoint.address());
        }
    }

    tracing::debug!(
        function = %func.name,
        program = %program,
        port = func.handler_port.value(),
        "Spawning handler"
    );

    Command::new(program)
        .args(args)
        .envs(&env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StartupError::SpawnFailed {
            function: func.name.to_string(),
            reason: format!("failed to spawn '{}': {}", program, e),
        })
}

#[async_trait]
impl FunctionsEmulator for GatewayEmulator {
    async fn start(&self, config: &ShellConfig) -> Result<(), StartupError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(StartupError::AlreadyStarted);
        }

        let port = config.port.value();
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| StartupError::PortUnavailable {
                port,
                reason: e.to_string(),
            })?;
        let base_url = format!("http://127.0.0.1:{}/{}", port, config.project);

        let app = gateway::router(config.project.as_str(), self.routes(), self.client.clone());
        let shutdown = CancellationToken::new();
        let server = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await
            })
        };
        tracing::info!(port, "Functions gateway listening on http://127.0.0.1:{}", port);

        let state = running.insert(Running {
            base_url,
            shutdown,
            server,
            handlers: Vec::new(),
        });

        for func in self.manifest.functions.iter().filter(|f| !f.command.is_empty()) {
            let child = spawn_handler(func, config)?;
            state.handlers.push(HandlerProcess {
                name: func.name.to_string(),
                port: func.handler_port.value(),
                child,
            });
        }

        Ok(())
    }

    async fn connect(&self) -> Result<RunningEmulator, StartupError> {
        let mut running = self.running.lock().await;
        let Some(state) = running.as_mut() else {
            return Err(StartupError::NotReady {
                reason: "emulator was not started".to_string(),
            });
        };

        for handler in &mut state.handlers {
            loop {
                if let Some(status) = handler.child.try_wait().map_err(|e| StartupError::NotReady {
                    reason: format!("{}: {}", handler.name, e),
                })? {
                    return Err(StartupError::NotReady {
                        reason: format!("handler {} exited with {}", handler.name, status),
                    });
                }
                if TcpStream::connect(("127.0.0.1", handler.port)).await.is_ok() {
                    tracing::info!(function = %handler.name, port = handler.port, "Handler ready");
                    break;
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        }

        let triggers = self
            .manifest
            .functions
            .iter()
            .map(|func| Self::trigger_for(func, &state.base_url))
            .collect();

        Ok(std::sync::Arc::new(GatewayInstance {
            base_url: state.base_url.clone(),
            routes: self.routes(),
            triggers,
            client: self.client.clone(),
        }))
    }

    async fn stop(&self) -> Result<(), ShutdownError> {
        let Some(state) = self.running.lock().await.take() else {
            return Ok(());
        };

        let mut first_error = None;
        for mut handler in state.handlers {
            match handler.child.kill().await {
                Ok(()) => tracing::debug!(function = %handler.name, "Handler stopped"),
                Err(e) => {
                    tracing::warn!(function = %handler.name, error = %e, "Failed to stop handler");
                    first_error.get_or_insert(ShutdownError::Handler {
                        function: handler.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        state.shutdown.cancel();
        match state.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first_error.get_or_insert(ShutdownError::Gateway {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                first_error.get_or_insert(ShutdownError::Gateway {
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!("Functions gateway stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Arguments for one HTTP call, derived from the callable's argument.
#[derive(Debug, PartialEq)]
struct HttpCall {
    method: reqwest::Method,
    path: String,
    body: Option<Value>,
    headers: Vec<(String, String)>,
}

impl HttpCall {
    /// `None` → `GET /`; a string → `GET <path>`; an object may set
    /// `method`, `path`, `body` and `headers`.
    fn from_argument(function: &str, argument: Option<Value>) -> Result<Self, InvocationError> {
        let invalid = |reason: String| InvocationError::InvalidArgument {
            function: function.to_string(),
            reason,
        };

        let mut call = HttpCall {
            method: reqwest::Method::GET,
            path: "/".to_string(),
            body: None,
            headers: Vec::new(),
        };

        match argument {
            None => {}
            Some(Value::String(path)) => call.path = path,
            Some(Value::Object(mut fields)) => {
                call.body = fields.remove("body");
                if call.body.is_some() {
                    call.method = reqwest::Method::POST;
                }
                if let Some(method) = fields.remove("method") {
                    let method = method
                        .as_str()
                        .ok_or_else(|| invalid("method must be a string".to_string()))?;
                    call.method = method
                        .to_ascii_uppercase()
                        .parse()
                        .map_err(|_| invalid(format!("unknown method {}", method)))?;
                }
                if let Some(path) = fields.remove("path") {
                    call.path = path
                        .as_str()
                        .ok_or_else(|| invalid("path must be a string".to_string()))?
                        .to_string();
                }
                if let Some(headers) = fields.remove("headers") {
                    let Value::Object(headers) = headers else {
                        return Err(invalid("headers must be an object".to_string()));
                    };
                    for (name, value) in headers {
                        let value = match value {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        call.headers.push((name, value));
                    }
                }
            }
            Some(other) => {
                return Err(invalid(format!(
                    "expected a path string or request object, got {}",
                    other
                )))
            }
        }

        if !call.path.starts_with('/') {
            call.path.insert(0, '/');
        }
        Ok(call)
    }
}

/// Ready instance of the gateway emulator.
struct GatewayInstance {
    base_url: String,
    routes: HashMap<String, Route>,
    triggers: Vec<Trigger>,
    client: reqwest::Client,
}

impl GatewayInstance {
    fn function_url(&self, name: &str) -> Result<String, InvocationError> {
        let route = self.routes.get(name).ok_or_else(|| InvocationError::NotEmulated {
            function: name.to_string(),
        })?;
        Ok(format!("{}/{}/{}", self.base_url, route.region, name))
    }

    async fn send_event(
        &self,
        trigger: &Trigger,
        event_type: &str,
        resource: &str,
        data: Value,
    ) -> Result<Invocation, InvocationError> {
        let url = self.function_url(&trigger.name)?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let event = json!({
            "data": data,
            "context": {
                "eventId": uuid::Uuid::new_v4().to_string(),
                "timestamp": timestamp,
                "eventType": event_type,
                "resource": resource,
            },
        });

        let resp = self
            .client
            .post(&url)
            .json(&event)
            .send()
            .await
            .map_err(|e| InvocationError::Transport {
                function: trigger.name.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| InvocationError::Transport {
            function: trigger.name.clone(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(InvocationError::Failed {
                function: trigger.name.clone(),
                status: status.as_u16(),
                detail: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Invocation::Value(Value::Null));
        }
        Ok(serde_json::from_str(&text)
            .map(Invocation::Value)
            .unwrap_or(Invocation::Text(text)))
    }

    fn send_request(&self, trigger: &Trigger, call: HttpCall) -> Result<SentRequest, InvocationError> {
        let mut url = self.function_url(&trigger.name)?;
        if call.path != "/" {
            url.push_str(&call.path);
        }

        let mut request = self.client.request(call.method.clone(), &url);
        for (name, value) in &call.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &call.body {
            request = match body {
                Value::String(text) => request.body(text.clone()),
                other => request.json(other),
            };
        }

        let function = trigger.name.clone();
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::info!(function = %function, status = status.as_u16(), "Response received");
                    println!("\nRESPONSE RECEIVED FROM FUNCTION: {}, {}", status.as_u16(), body);
                }
                Err(e) => {
                    tracing::warn!(function = %function, error = %e, "Request to function failed");
                    println!("\nREQUEST TO FUNCTION FAILED: {}", e);
                }
            }
        });

        Ok(SentRequest {
            method: call.method.to_string(),
            url,
        })
    }
}

#[async_trait]
impl EmulatorInstance for GatewayInstance {
    fn triggers(&self) -> Vec<Trigger> {
        self.triggers.clone()
    }

    fn emulated_functions(&self) -> Vec<String> {
        self.triggers
            .iter()
            .filter(|t| t.emulated)
            .map(|t| t.name.clone())
            .collect()
    }

    async fn invoke(
        &self,
        trigger: &Trigger,
        argument: Option<Value>,
    ) -> Result<Invocation, InvocationError> {
        if !trigger.emulated {
            return Err(InvocationError::NotEmulated {
                function: trigger.name.clone(),
            });
        }

        match &trigger.target {
            InvocationTarget::Http { .. } => {
                let call = HttpCall::from_argument(&trigger.name, argument)?;
                self.send_request(trigger, call).map(Invocation::Request)
            }
            InvocationTarget::Event {
                event_type,
                resource,
            } => {
                let data = argument.unwrap_or_else(|| Value::Object(Map::new()));
                self.send_event(trigger, event_type, resource, data).await
            }
        }
    }
}
