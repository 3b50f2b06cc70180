//! Console implementation of [`DecisionProvider`].
//!
//! Reads operator answers line by line. Anything outside the grammar is
//! reported and asked again; end of input counts as an abort.

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

use crate::linker::{Confirm, DecisionProvider, Prompt, Selection};
use crate::models::Record;

const SELECTION_HELP: &str = "numbers (e.g. 1 or 1,3), a = all, s/Enter = skip, q = quit";

/// Parse an answer to a song prompt. Numbers are 1-based.
pub fn parse_selection(input: &str, option_count: usize) -> Result<Selection> {
    let answer = input.trim().to_lowercase();
    match answer.as_str() {
        "" | "s" | "skip" => return Ok(Selection::Skip),
        "a" | "all" => return Ok(Selection::All),
        "q" | "quit" => return Ok(Selection::Abort),
        _ => {}
    }

    let mut indices = Vec::new();
    for token in answer.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let Ok(number) = token.parse::<usize>() else {
            bail!("'{}' is not a number", token);
        };
        if number == 0 || number > option_count {
            bail!("{} is out of range 1-{}", number, option_count);
        }
        if !indices.contains(&(number - 1)) {
            indices.push(number - 1);
        }
    }
    Ok(Selection::Indices(indices))
}

/// Parse a yes/no/quit answer.
pub fn parse_confirm(input: &str) -> Option<Confirm> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Confirm::Yes),
        "n" | "no" => Some(Confirm::No),
        "q" | "quit" => Some(Confirm::Abort),
        _ => None,
    }
}

/// Line-oriented operator prompts over any reader/writer pair.
pub struct ConsoleDecisionProvider<R, W> {
    input: R,
    output: W,
}

impl ConsoleDecisionProvider<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleDecisionProvider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Next answer line, or `None` at end of input.
    fn read_answer(&mut self) -> Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> DecisionProvider for ConsoleDecisionProvider<R, W> {
    fn choose(&mut self, prompt: &Prompt<'_>) -> Result<Selection> {
        writeln!(self.output)?;
        writeln!(self.output, "Record {}: \"{}\"", prompt.record.id, prompt.record.title)?;
        writeln!(
            self.output,
            "Mention: \"{}\" (normalized: \"{}\")",
            prompt.mention, prompt.mention_norm
        )?;
        for (i, option) in prompt.options.iter().enumerate() {
            let ids: Vec<String> = option.entry_ids.iter().map(|id| id.to_string()).collect();
            match option.score {
                Some(score) => writeln!(
                    self.output,
                    "  {:>3}) {}  [ids {}] score {}",
                    i + 1,
                    option.label,
                    ids.join(", "),
                    score
                )?,
                None => writeln!(self.output, "  {:>3}) {}  [ids {}]", i + 1, option.label, ids.join(", "))?,
            }
        }

        loop {
            write!(self.output, "Select {}: ", SELECTION_HELP)?;
            let Some(line) = self.read_answer()? else {
                writeln!(self.output)?;
                return Ok(Selection::Abort);
            };
            match parse_selection(&line, prompt.options.len()) {
                Ok(selection) => return Ok(selection),
                Err(err) => writeln!(self.output, "Invalid input: {}", err)?,
            }
        }
    }

    fn confirm_replace(&mut self, record: &Record) -> Result<Confirm> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Record {}: \"{}\" already has {} linked song(s): {:?}",
            record.id,
            record.title,
            record.links.len(),
            record.links
        )?;

        loop {
            write!(self.output, "Replace existing links? [y/n/q]: ")?;
            let Some(line) = self.read_answer()? else {
                writeln!(self.output)?;
                return Ok(Confirm::Abort);
            };
            match parse_confirm(&line) {
                Some(confirm) => return Ok(confirm),
                None => writeln!(self.output, "Invalid input: answer y, n or q")?,
            }
        }
    }
}
