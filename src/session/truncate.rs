//! Tool output truncation
//!
//! Oversized tool output is cut down before it re-enters history: a
//! character pass first, then a line pass when the tool has a line ceiling.
//! Both keep the head and tail (40% of the limit each) and splice a removal
//! marker between them, so the model sees how the output started and ended.

use std::collections::HashMap;

/// Character and line ceilings for one tool's output
#[derive(Debug, Clone, Copy)]
pub struct OutputLimit {
    pub max_chars: usize,
    pub max_lines: Option<usize>,
}

/// Default ceilings per tool
pub fn default_limit_for(tool: &str) -> OutputLimit {
    match tool {
        "read_file" => OutputLimit {
            max_chars: 50_000,
            max_lines: None,
        },
        "shell" | "bash" => OutputLimit {
            max_chars: 30_000,
            max_lines: Some(256),
        },
        "grep" => OutputLimit {
            max_chars: 20_000,
            max_lines: Some(200),
        },
        "glob" => OutputLimit {
            max_chars: 10_000,
            max_lines: Some(500),
        },
        _ => OutputLimit {
            max_chars: 20_000,
            max_lines: None,
        },
    }
}

/// Truncate tool output by the tool's policy, with optional overrides
pub fn truncate_output(tool: &str, output: &str, overrides: &HashMap<String, OutputLimit>) -> String {
    let limit = overrides.get(tool).copied().unwrap_or_else(|| default_limit_for(tool));

    let truncated = truncate_chars(output, limit.max_chars);
    match limit.max_lines {
        Some(max_lines) => truncate_lines(&truncated, max_lines),
        None => truncated,
    }
}

/// Character pass: head 40%, marker, tail 40%
pub fn truncate_chars(output: &str, max_chars: usize) -> String {
    let chars: Vec<char> = output.chars().collect();
    if chars.len() <= max_chars {
        return output.to_string();
    }

    let keep = (max_chars * 2) / 5;
    let removed = chars.len() - keep * 2;
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();

    format!(
        "{}\n[WARNING: Tool output was truncated. {} characters removed...]\n{}",
        head, removed, tail
    )
}

/// Line pass: head 40%, marker line, tail 40%
pub fn truncate_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }

    let keep = (max_lines * 2) / 5;
    let removed = lines.len() - keep * 2;
    let head = lines[..keep].join("\n");
    let tail = lines[lines.len() - keep..].join("\n");

    format!(
        "{}\n[WARNING: Tool output was truncated. {} lines removed...]\n{}",
        head, removed, tail
    )
}
