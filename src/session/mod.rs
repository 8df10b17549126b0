//! Agent session - the per-node turn loop
//!
//! One session drives one conversation with a provider: build messages from
//! history, call the provider, run whatever tools it asked for, append the
//! results, repeat. The loop ends when the model produces a final text with
//! no tool calls, or a safety limit trips. Steering messages can be injected
//! from outside between provider calls; follow-up messages queue behind the
//! current exchange.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::exec::ExecEnv;
use crate::provider::{CompletionRequest, Provider, ToolChoice};

mod config;
mod events;
mod loop_detect;
mod truncate;
mod turn;

pub use config::SessionConfig;
pub use events::{EventEmitter, SessionEvent};
pub use loop_detect::{LOOP_WARNING, detect_tool_loop};
pub use truncate::{OutputLimit, default_limit_for, truncate_output};
pub use turn::{AssistantTurn, STEERING_PREFIX, ToolResultRecord, Turn, history_to_messages};

use crate::provider::ProviderProfile;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing,
    Closed,
}

/// Errors from driving a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Session is already processing an input")]
    Busy,

    #[error("Session cancelled")]
    Cancelled,
}

#[derive(Clone, Default)]
struct SessionQueues {
    steering: Arc<Mutex<VecDeque<String>>>,
    follow_up: Arc<Mutex<VecDeque<String>>>,
}

/// Cloneable handle for nudging a running session from outside
#[derive(Clone)]
pub struct SessionHandle {
    queues: SessionQueues,
}

impl SessionHandle {
    /// Inject guidance before the session's next provider call
    pub fn steer(&self, message: impl Into<String>) {
        self.queues.steering.lock().expect("steering lock").push_back(message.into());
    }

    /// Queue a message delivered after the current assistant turn is final
    pub fn follow_up(&self, message: impl Into<String>) {
        self.queues
            .follow_up
            .lock()
            .expect("follow_up lock")
            .push_back(message.into());
    }
}

/// A turn-based conversation with one provider over one working directory
pub struct AgentSession {
    id: String,
    profile: ProviderProfile,
    provider: Arc<dyn Provider>,
    env: Arc<dyn ExecEnv>,
    config: SessionConfig,
    history: Vec<Turn>,
    events: EventEmitter,
    state: SessionState,
    provider_calls: u32,
    queues: SessionQueues,
    cancel: CancellationToken,
}

impl AgentSession {
    /// Create a session
    pub fn new(
        profile: ProviderProfile,
        provider: Arc<dyn Provider>,
        env: Arc<dyn ExecEnv>,
        config: SessionConfig,
    ) -> Self {
        Self::with_cancellation(profile, provider, env, config, CancellationToken::new())
    }

    /// Create a session sharing an external cancellation token
    pub fn with_cancellation(
        profile: ProviderProfile,
        provider: Arc<dyn Provider>,
        env: Arc<dyn ExecEnv>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        debug!(session_id = %id, model = %profile.model, "AgentSession::new: created");
        Self {
            id,
            profile,
            provider,
            env,
            config,
            history: Vec::new(),
            events: EventEmitter::new(),
            state: SessionState::Idle,
            provider_calls: 0,
            queues: SessionQueues::default(),
            cancel,
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The append-only conversation history
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Handle for steering and follow-up from other tasks
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            queues: self.queues.clone(),
        }
    }

    /// Register an event subscriber
    pub fn subscribe(&mut self, subscriber: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.events.subscribe(subscriber);
    }

    /// Close the session; further inputs are rejected
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.events.emit(&SessionEvent::SessionEnd {
            session_id: self.id.clone(),
        });
    }

    /// Run the turn loop for one user input, returning the final assistant text
    pub async fn process_input(&mut self, input: &str) -> Result<String, SessionError> {
        match self.state {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Processing => return Err(SessionError::Busy),
            SessionState::Idle => {}
        }
        self.state = SessionState::Processing;

        if self.history.is_empty() {
            self.events.emit(&SessionEvent::SessionStart {
                session_id: self.id.clone(),
            });
        }

        info!(session_id = %self.id, input_len = input.len(), "process_input: starting");
        self.events.emit(&SessionEvent::UserInput {
            text: input.to_string(),
        });
        self.history.push(Turn::User {
            text: input.to_string(),
        });

        let mut tool_rounds: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.state = SessionState::Idle;
                return Err(SessionError::Cancelled);
            }

            self.drain_steering();

            if self.provider_calls >= self.config.max_turns {
                let reason = format!("Turn limit reached after {} turns", self.provider_calls);
                return Ok(self.finish_with_limit(reason));
            }
            if tool_rounds >= self.config.max_tool_rounds_per_input {
                let reason = format!("Tool round limit reached after {} rounds", tool_rounds);
                return Ok(self.finish_with_limit(reason));
            }

            if self.config.loop_detection
                && !loop_detect::already_warned(&self.history, self.config.loop_detection_window)
                && detect_tool_loop(&self.history, self.config.loop_detection_window)
            {
                warn!(session_id = %self.id, "process_input: tool-call loop detected");
                self.events.emit(&SessionEvent::LoopDetected);
                self.events.emit(&SessionEvent::SteeringInjected {
                    text: LOOP_WARNING.to_string(),
                });
                self.history.push(Turn::Steering {
                    text: LOOP_WARNING.to_string(),
                });
            }

            let request = CompletionRequest {
                model: self.profile.model.clone(),
                system_prompt: self.profile.system_prompt(self.env.working_dir()),
                messages: history_to_messages(&self.history),
                tools: self.profile.tool_definitions(),
                tool_choice: ToolChoice::Auto,
                max_tokens: self.config.max_tokens,
                reasoning_effort: self.config.reasoning_effort.clone(),
            };

            self.provider_calls += 1;
            debug!(session_id = %self.id, call = self.provider_calls, "process_input: calling provider");
            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session_id = %self.id, error = %e, "process_input: provider error");
                    self.events.emit(&SessionEvent::Error {
                        message: e.to_string(),
                    });
                    let text = format!("[Provider error: {}]", e);
                    self.history.push(Turn::Assistant(AssistantTurn::synthetic(text.clone())));
                    self.state = SessionState::Idle;
                    return Ok(text);
                }
            };

            let turn = AssistantTurn::from_response(&response);
            let text = turn.text.clone();
            let tool_calls = turn.tool_calls.clone();
            if !text.is_empty() {
                self.events.emit(&SessionEvent::AssistantTextStart);
                self.events.emit(&SessionEvent::AssistantTextEnd { text: text.clone() });
            }
            self.history.push(Turn::Assistant(turn));

            if tool_calls.is_empty() {
                if let Some(follow_up) = self.pop_follow_up() {
                    debug!(session_id = %self.id, "process_input: delivering follow-up");
                    self.events.emit(&SessionEvent::UserInput {
                        text: follow_up.clone(),
                    });
                    self.history.push(Turn::User { text: follow_up });
                    tool_rounds = 0;
                    continue;
                }
                info!(session_id = %self.id, calls = self.provider_calls, "process_input: final assistant turn");
                self.state = SessionState::Idle;
                return Ok(text);
            }

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                if self.cancel.is_cancelled() {
                    self.state = SessionState::Idle;
                    return Err(SessionError::Cancelled);
                }
                self.events.emit(&SessionEvent::ToolCallStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                });
                let result = self.profile.registry.execute(call, self.env.as_ref()).await;
                let content = truncate_output(&call.name, &result.content, &self.config.tool_output_limits);
                self.events.emit(&SessionEvent::ToolCallEnd {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    is_error: result.is_error,
                });
                results.push(ToolResultRecord {
                    tool_use_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content,
                    is_error: result.is_error,
                });
            }
            self.history.push(Turn::ToolResults { results });
            tool_rounds += 1;
        }
    }

    /// Append a synthetic final turn for a tripped limit and go idle
    fn finish_with_limit(&mut self, reason: String) -> String {
        warn!(session_id = %self.id, %reason, "process_input: limit tripped");
        self.events.emit(&SessionEvent::TurnLimit {
            reason: reason.clone(),
        });
        let text = format!("[{}]", reason);
        self.history.push(Turn::Assistant(AssistantTurn::synthetic(text.clone())));
        self.state = SessionState::Idle;
        text
    }

    fn drain_steering(&mut self) {
        let drained: Vec<String> = {
            let mut queue = self.queues.steering.lock().expect("steering lock");
            queue.drain(..).collect()
        };
        for text in drained {
            debug!(session_id = %self.id, "drain_steering: injecting");
            self.events.emit(&SessionEvent::SteeringInjected { text: text.clone() });
            self.history.push(Turn::Steering { text });
        }
    }

    fn pop_follow_up(&self) -> Option<String> {
        self.queues.follow_up.lock().expect("follow_up lock").pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalExecEnv;
    use crate::provider::{CompletionResponse, ScriptedProvider, ToolCall};
    use tempfile::tempdir;

    fn session_with(responses: Vec<CompletionResponse>, dir: &std::path::Path) -> AgentSession {
        let profile = ProviderProfile::standard("scripted", "test-model");
        let provider = Arc::new(ScriptedProvider::new(responses));
        let env = Arc::new(LocalExecEnv::new(dir.to_path_buf()));
        AgentSession::new(profile, provider, env, SessionConfig::default())
    }

    fn read_call(path: &str) -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({ "path": path }),
        }
    }

    #[tokio::test]
    async fn test_final_text_with_no_tool_calls() {
        let temp = tempdir().unwrap();
        let mut session = session_with(vec![CompletionResponse::from_text("ok")], temp.path());

        let result = session.process_input("do the thing").await.unwrap();
        assert_eq!(result, "ok");
        assert_eq!(session.state(), SessionState::Idle);
        // User turn then assistant turn
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_then_final() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "contents").unwrap();
        let mut session = session_with(
            vec![
                CompletionResponse::from_tool_calls(vec![read_call("a.txt")]),
                CompletionResponse::from_text("done"),
            ],
            temp.path(),
        );

        let result = session.process_input("read it").await.unwrap();
        assert_eq!(result, "done");

        let tool_turns: Vec<&Turn> = session
            .history()
            .iter()
            .filter(|t| matches!(t, Turn::ToolResults { .. }))
            .collect();
        assert_eq!(tool_turns.len(), 1);
        if let Turn::ToolResults { results } = tool_turns[0] {
            assert!(!results[0].is_error);
            assert!(results[0].content.contains("contents"));
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result_and_continues() {
        let temp = tempdir().unwrap();
        let mut session = session_with(
            vec![
                CompletionResponse::from_tool_calls(vec![ToolCall {
                    id: "c9".to_string(),
                    name: "no_such_tool".to_string(),
                    input: serde_json::json!({}),
                }]),
                CompletionResponse::from_text("recovered"),
            ],
            temp.path(),
        );

        let result = session.process_input("go").await.unwrap();
        assert_eq!(result, "recovered");

        let record = session
            .history()
            .iter()
            .find_map(|t| match t {
                Turn::ToolResults { results } => Some(&results[0]),
                _ => None,
            })
            .unwrap();
        assert!(record.is_error);
        assert!(record.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_turn_limit_appends_synthetic_turn() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "x").unwrap();
        let responses: Vec<CompletionResponse> = (0..10)
            .map(|i| {
                CompletionResponse::from_tool_calls(vec![ToolCall {
                    id: format!("c{}", i),
                    name: "read_file".to_string(),
                    input: serde_json::json!({ "path": "a.txt", "offset": i }),
                }])
            })
            .collect();

        let profile = ProviderProfile::standard("scripted", "test-model");
        let provider = Arc::new(ScriptedProvider::new(responses));
        let env = Arc::new(LocalExecEnv::new(temp.path().to_path_buf()));
        let mut session = AgentSession::new(
            profile,
            provider,
            env,
            SessionConfig {
                max_turns: 3,
                loop_detection: false,
                ..Default::default()
            },
        );

        let result = session.process_input("go").await.unwrap();
        assert!(result.contains("Turn limit reached"));
        let last = session.history().last().unwrap().as_assistant().unwrap();
        assert!(last.text.starts_with('['));
    }

    #[tokio::test]
    async fn test_tool_round_limit_bounds_tool_results() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "x").unwrap();
        let responses: Vec<CompletionResponse> = (0..10)
            .map(|i| {
                CompletionResponse::from_tool_calls(vec![ToolCall {
                    id: format!("c{}", i),
                    name: "read_file".to_string(),
                    input: serde_json::json!({ "path": "a.txt", "offset": i }),
                }])
            })
            .collect();

        let profile = ProviderProfile::standard("scripted", "test-model");
        let provider = Arc::new(ScriptedProvider::new(responses));
        let env = Arc::new(LocalExecEnv::new(temp.path().to_path_buf()));
        let mut session = AgentSession::new(
            profile,
            provider,
            env,
            SessionConfig {
                max_tool_rounds_per_input: 2,
                loop_detection: false,
                ..Default::default()
            },
        );

        let result = session.process_input("go").await.unwrap();
        assert!(result.contains("Tool round limit"));

        let tool_turns = session
            .history()
            .iter()
            .filter(|t| matches!(t, Turn::ToolResults { .. }))
            .count();
        assert_eq!(tool_turns, 2);
    }

    #[tokio::test]
    async fn test_loop_detection_injects_steering() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "x").unwrap();
        // Identical call every turn
        let responses: Vec<CompletionResponse> = (0..10)
            .map(|_| CompletionResponse::from_tool_calls(vec![read_call("a.txt")]))
            .collect();

        let profile = ProviderProfile::standard("scripted", "test-model");
        let provider = Arc::new(ScriptedProvider::new(responses));
        let env = Arc::new(LocalExecEnv::new(temp.path().to_path_buf()));
        let mut session = AgentSession::new(
            profile,
            provider,
            env,
            SessionConfig {
                max_tool_rounds_per_input: 8,
                ..Default::default()
            },
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        session.subscribe(move |e| {
            if matches!(e, SessionEvent::LoopDetected) {
                sink.lock().unwrap().push(());
            }
        });

        session.process_input("go").await.unwrap();

        let steered = session
            .history()
            .iter()
            .any(|t| matches!(t, Turn::Steering { text } if text.contains("appear to be in a loop")));
        assert!(steered, "expected loop-warning steering turn");
        assert!(!events.lock().unwrap().is_empty(), "expected LoopDetected event");
    }

    #[tokio::test]
    async fn test_steering_injected_before_next_call() {
        let temp = tempdir().unwrap();
        let mut session = session_with(vec![CompletionResponse::from_text("ok")], temp.path());

        session.handle().steer("remember the constraints");
        session.process_input("go").await.unwrap();

        assert!(matches!(&session.history()[0], Turn::User { .. }));
        assert!(
            matches!(&session.history()[1], Turn::Steering { text } if text == "remember the constraints")
        );
    }

    #[tokio::test]
    async fn test_follow_up_delivered_after_final_turn() {
        let temp = tempdir().unwrap();
        let mut session = session_with(
            vec![
                CompletionResponse::from_text("first answer"),
                CompletionResponse::from_text("second answer"),
            ],
            temp.path(),
        );

        session.handle().follow_up("now do the next part");
        let result = session.process_input("go").await.unwrap();

        assert_eq!(result, "second answer");
        let user_turns: Vec<String> = session
            .history()
            .iter()
            .filter_map(|t| match t {
                Turn::User { text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(user_turns, vec!["go".to_string(), "now do the next part".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_synthetic_turn() {
        let temp = tempdir().unwrap();
        // Empty script: first call fails
        let mut session = session_with(vec![], temp.path());

        let result = session.process_input("go").await.unwrap();
        assert!(result.contains("[Provider error:"));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_input() {
        let temp = tempdir().unwrap();
        let mut session = session_with(vec![], temp.path());
        session.close();

        let result = session.process_input("go").await;
        assert!(matches!(result, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let temp = tempdir().unwrap();
        let cancel = CancellationToken::new();
        let profile = ProviderProfile::standard("scripted", "test-model");
        let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::from_text("never")]));
        let env = Arc::new(LocalExecEnv::new(temp.path().to_path_buf()));
        let mut session =
            AgentSession::with_cancellation(profile, provider, env, SessionConfig::default(), cancel.clone());

        cancel.cancel();
        let result = session.process_input("go").await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_history_grows_monotonically() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "x").unwrap();
        let mut session = session_with(
            vec![
                CompletionResponse::from_tool_calls(vec![read_call("a.txt")]),
                CompletionResponse::from_text("done"),
            ],
            temp.path(),
        );

        session.process_input("go").await.unwrap();
        let after_first = session.history().len();

        // Script is exhausted now; the provider error still only appends
        session.process_input("again").await.unwrap();
        assert!(session.history().len() > after_first);
    }
}
