//! Console interviewer - prompts on the terminal

use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Answer, Interviewer, InterviewError, Question, QuestionType};

struct ConsoleIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

/// Asks questions on an interactive terminal
///
/// Select questions render numbered options and accept either the 1-based
/// index or a label (case-insensitive); anything unparseable falls back to
/// option 1. MultiSelect takes comma-separated indices, skipping invalid
/// entries.
pub struct ConsoleInterviewer {
    io: Mutex<ConsoleIo>,
}

impl ConsoleInterviewer {
    /// Interviewer over stdin/stdout
    pub fn new() -> Self {
        Self::with_io(
            Box::new(BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    /// Interviewer over arbitrary streams (tests)
    pub fn with_io(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            io: Mutex::new(ConsoleIo { input, output }),
        }
    }
}

impl Default for ConsoleInterviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interviewer for ConsoleInterviewer {
    async fn ask(&self, question: Question) -> Result<Answer, InterviewError> {
        let mut io = self.io.lock().expect("console io lock");

        writeln!(io.output, "\n{}", question.text)?;
        match question.question_type {
            QuestionType::SingleSelect | QuestionType::MultiSelect => {
                for (i, option) in question.options.iter().enumerate() {
                    writeln!(io.output, "  {}. {}", i + 1, option)?;
                }
            }
            QuestionType::Confirm => writeln!(io.output, "  [y/n]")?,
            QuestionType::FreeText => {}
        }
        write!(io.output, "> ")?;
        io.output.flush()?;

        let mut line = String::new();
        io.input.read_line(&mut line)?;
        let line = line.trim().to_string();

        Ok(match question.question_type {
            QuestionType::SingleSelect => single_select(&question.options, &line),
            QuestionType::MultiSelect => multi_select(&question.options, &line),
            QuestionType::Confirm => {
                let text = if Answer::of(&line).is_affirmative() { "yes" } else { "no" };
                Answer::of(text)
            }
            QuestionType::FreeText => Answer {
                text: line,
                selected_options: vec![],
            },
        })
    }
}

fn single_select(options: &[String], line: &str) -> Answer {
    let by_index = line
        .parse::<usize>()
        .ok()
        .filter(|i| (1..=options.len()).contains(i))
        .map(|i| options[i - 1].clone());
    let by_label = || {
        options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(line))
            .cloned()
    };
    // Invalid input defaults to option 1
    let chosen = by_index
        .or_else(by_label)
        .or_else(|| options.first().cloned())
        .unwrap_or_default();
    Answer::of(chosen)
}

fn multi_select(options: &[String], line: &str) -> Answer {
    let selected: Vec<String> = line
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|i| (1..=options.len()).contains(i))
        .map(|i| options[i - 1].clone())
        .collect();
    Answer {
        text: selected.join(", "),
        selected_options: selected,
    }
}
