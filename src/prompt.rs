use crate::error::{GridMetaError, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Source of answers for the few questions the inference cannot settle alone.
/// End of input on any prompt surfaces as [`GridMetaError::Interrupted`].
pub trait PromptProvider {
    /// Free text; an empty answer keeps `default`.
    fn ask_text(&mut self, default: &str, prompt: &str) -> Result<String>;

    fn ask_confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Pick any subset of `choices`, in the order the user gives them.
    fn ask_checklist(&mut self, prompt: &str, choices: &[String]) -> Result<Vec<String>>;
}

/// Line-based prompts. Questions go to `output`, answers come from `input`.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    /// Read from stdin and ask on stderr, keeping stdout free for results.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> Result<String> {
        self.output.flush().map_err(io_error)?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(io_error)?;
        if read == 0 {
            return Err(GridMetaError::Interrupted);
        }
        Ok(line.trim().to_string())
    }
}

fn io_error(err: io::Error) -> GridMetaError {
    GridMetaError::accessor(format!("terminal I/O failed: {}", err))
}

/// Split a checklist answer into picked choices. Entries may be 1-based
/// indices or names, separated by commas or whitespace.
fn parse_checklist(answer: &str, choices: &[String]) -> std::result::Result<Vec<String>, String> {
    let mut picked: Vec<String> = Vec::new();
    for token in answer.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let choice = match token.parse::<usize>() {
            Ok(index) if (1..=choices.len()).contains(&index) => &choices[index - 1],
            _ => choices
                .iter()
                .find(|c| c.as_str() == token)
                .ok_or_else(|| format!("'{}' is not one of the choices", token))?,
        };

        if !picked.contains(choice) {
            picked.push(choice.clone());
        }
    }
    Ok(picked)
}

impl<R: BufRead, W: Write> PromptProvider for TerminalPrompt<R, W> {
    fn ask_text(&mut self, default: &str, prompt: &str) -> Result<String> {
        write!(self.output, "{} {} ", "?".green().bold(), prompt.bold()).map_err(io_error)?;
        if !default.is_empty() {
            write!(self.output, "{} ", format!("[{}]", default).dimmed()).map_err(io_error)?;
        }

        let answer = self.read_answer()?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn ask_confirm(&mut self, prompt: &str) -> Result<bool> {
        loop {
            write!(self.output, "{} {} {} ", "?".green().bold(), prompt.bold(), "(y/n)".dimmed())
                .map_err(io_error)?;

            match self.read_answer()?.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "{}", "Please answer y or n.".yellow()).map_err(io_error)?,
            }
        }
    }

    fn ask_checklist(&mut self, prompt: &str, choices: &[String]) -> Result<Vec<String>> {
        writeln!(self.output, "{} {}", "?".green().bold(), prompt.bold()).map_err(io_error)?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  {:>3}) {}", i + 1, choice.cyan()).map_err(io_error)?;
        }

        loop {
            write!(
                self.output,
                "{} ",
                "Numbers or names, comma separated (empty for none):".dimmed()
            )
            .map_err(io_error)?;

            let answer = self.read_answer()?;
            match parse_checklist(&answer, choices) {
                Ok(picked) => return Ok(picked),
                Err(msg) => writeln!(self.output, "{}", msg.yellow()).map_err(io_error)?,
            }
        }
    }
}

/// Non-interactive answers: keep every default, confirm everything, pick nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptDefaults;

impl PromptProvider for AcceptDefaults {
    fn ask_text(&mut self, default: &str, _prompt: &str) -> Result<String> {
        Ok(default.to_string())
    }

    fn ask_confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }

    fn ask_checklist(&mut self, _prompt: &str, _choices: &[String]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Replays canned answers and records the questions. Running out of answers
/// behaves like end of input.
#[cfg(test)]
pub(crate) struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
    asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub(crate) fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    pub(crate) fn asked(&self) -> &[String] {
        &self.asked
    }

    fn next(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front().ok_or(GridMetaError::Interrupted)
    }
}

#[cfg(test)]
impl PromptProvider for ScriptedPrompt {
    fn ask_text(&mut self, default: &str, prompt: &str) -> Result<String> {
        let answer = self.next(prompt)?;
        Ok(if answer.is_empty() { default.to_string() } else { answer })
    }

    fn ask_confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self.next(prompt)?.starts_with('y'))
    }

    fn ask_checklist(&mut self, prompt: &str, choices: &[String]) -> Result<Vec<String>> {
        let answer = self.next(prompt)?;
        parse_checklist(&answer, choices).map_err(GridMetaError::Config)
    }
}
