//! Tool-call loop detection
//!
//! An agent that keeps issuing the same tool calls is stuck. Detection looks
//! at the assistant turns inside a trailing window of history and fires when
//! two consecutive ones requested the same multiset of (name, arguments)
//! calls.

use crate::provider::ToolCall;

use super::turn::Turn;

/// Steering text injected when a loop is detected
pub const LOOP_WARNING: &str = "You appear to be in a loop repeating the same tool calls. \
     Please try a different approach or ask the user for clarification.";

/// Check the last `window` turns for a repeating tool-call pattern
///
/// Fires iff at least two consecutive assistant turns in the window carry
/// identical, non-empty (name, arguments) multisets.
pub fn detect_tool_loop(history: &[Turn], window: usize) -> bool {
    let start = history.len().saturating_sub(window);
    let recent = &history[start..];

    let signatures: Vec<Vec<(String, String)>> = recent
        .iter()
        .filter_map(|t| t.as_assistant())
        .map(|a| signature(&a.tool_calls))
        .collect();

    signatures
        .windows(2)
        .any(|pair| !pair[0].is_empty() && pair[0] == pair[1])
}

/// True when the window already contains the loop warning
///
/// Keeps the nudge from being re-injected every iteration while the same
/// repetition is still inside the window.
pub fn already_warned(history: &[Turn], window: usize) -> bool {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .any(|t| matches!(t, Turn::Steering { text } if text == LOOP_WARNING))
}

/// Order-insensitive signature of a turn's tool calls
fn signature(calls: &[ToolCall]) -> Vec<(String, String)> {
    let mut sig: Vec<(String, String)> = calls
        .iter()
        .map(|c| (c.name.clone(), c.input.to_string()))
        .collect();
    sig.sort();
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::turn::AssistantTurn;

    fn assistant_with_calls(calls: Vec<(&str, serde_json::Value)>) -> Turn {
        Turn::Assistant(AssistantTurn {
            tool_calls: calls
                .into_iter()
                .enumerate()
                .map(|(i, (name, input))| ToolCall {
                    id: format!("c{}", i),
                    name: name.to_string(),
                    input,
                })
                .collect(),
            ..Default::default()
        })
    }

    fn tool_results() -> Turn {
        Turn::ToolResults { results: vec![] }
    }

    #[test]
    fn test_detects_consecutive_identical_calls() {
        let history = vec![
            assistant_with_calls(vec![("read_file", serde_json::json!({"path": "a.txt"}))]),
            tool_results(),
            assistant_with_calls(vec![("read_file", serde_json::json!({"path": "a.txt"}))]),
            tool_results(),
        ];
        assert!(detect_tool_loop(&history, 10));
    }

    #[test]
    fn test_different_arguments_no_loop() {
        let history = vec![
            assistant_with_calls(vec![("read_file", serde_json::json!({"path": "a.txt"}))]),
            tool_results(),
            assistant_with_calls(vec![("read_file", serde_json::json!({"path": "b.txt"}))]),
            tool_results(),
        ];
        assert!(!detect_tool_loop(&history, 10));
    }

    #[test]
    fn test_empty_call_lists_never_loop() {
        let history = vec![
            assistant_with_calls(vec![]),
            assistant_with_calls(vec![]),
        ];
        assert!(!detect_tool_loop(&history, 10));
    }

    #[test]
    fn test_multiset_comparison_ignores_order() {
        let history = vec![
            assistant_with_calls(vec![
                ("glob", serde_json::json!({"pattern": "*.rs"})),
                ("grep", serde_json::json!({"pattern": "fn"})),
            ]),
            tool_results(),
            assistant_with_calls(vec![
                ("grep", serde_json::json!({"pattern": "fn"})),
                ("glob", serde_json::json!({"pattern": "*.rs"})),
            ]),
            tool_results(),
        ];
        assert!(detect_tool_loop(&history, 10));
    }

    #[test]
    fn test_window_excludes_old_turns() {
        let mut history = vec![
            assistant_with_calls(vec![("shell", serde_json::json!({"command": "ls"}))]),
            tool_results(),
            assistant_with_calls(vec![("shell", serde_json::json!({"command": "ls"}))]),
            tool_results(),
        ];
        // Push enough fresh, non-repeating turns to slide the pair out
        for i in 0..10 {
            history.push(assistant_with_calls(vec![(
                "shell",
                serde_json::json!({ "command": format!("step {}", i) }),
            )]));
            history.push(tool_results());
        }
        assert!(!detect_tool_loop(&history, 10));
    }

    #[test]
    fn test_already_warned() {
        let mut history = vec![Turn::Steering {
            text: LOOP_WARNING.to_string(),
        }];
        assert!(already_warned(&history, 10));

        for _ in 0..12 {
            history.push(tool_results());
        }
        assert!(!already_warned(&history, 10));
    }
}
