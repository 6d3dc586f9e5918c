//! Terminal prompts
//!
//! Arrow-key menus and a one-line text prompt drawn on stderr with crossterm,
//! so stdout stays clean for `--json` output.

use crossterm::cursor::{Hide, MoveToColumn, MoveUp, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};

use crate::error::{Error, Result};
use crate::operator::Operator;

/// Keys the prompts react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Up,
    Down,
    Enter,
    Cancel,
    Backspace,
    Char(char),
    Other,
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        let control = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Char('c') | KeyCode::Char('d') if control => Key::Cancel,
            KeyCode::Char(_) if control || event.modifiers.contains(KeyModifiers::ALT) => Key::Other,
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Up => Key::Up,
            KeyCode::Down | KeyCode::Tab => Key::Down,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Cancel,
            KeyCode::Backspace => Key::Backspace,
            _ => Key::Other,
        }
    }
}

/// Menus also accept vi-style `j`/`k`
fn menu_key(key: Key) -> Key {
    match key {
        Key::Char('k') => Key::Up,
        Key::Char('j') => Key::Down,
        other => other,
    }
}

fn read_key() -> Result<Key> {
    loop {
        if let Event::Key(key_event) = event::read()? {
            if key_event.kind == KeyEventKind::Press {
                return Ok(Key::from(key_event));
            }
        }
    }
}

/// Raw mode for the lifetime of a prompt
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stderr(), Show);
    }
}

fn line_count(items: &[String]) -> u16 {
    u16::try_from(items.len()).unwrap_or(u16::MAX)
}

/// Interactive operator on the controlling terminal
#[derive(Debug)]
pub struct TerminalOperator {
    out: io::Stderr,
}

impl TerminalOperator {
    /// Fails when stdin or stderr is not a terminal, rather than blocking forever
    pub fn new() -> Result<Self> {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
            return Err(Error::OperatorError(
                "interactive mode needs a terminal; use `--orphans skip` or `--orphans delete` \
                 for unattended runs"
                    .to_string(),
            ));
        }
        Ok(Self { out: io::stderr() })
    }

    fn draw_items(&mut self, items: &[String], selected: usize) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            if index == selected {
                queue!(self.out, Print(format!("{} {}\r\n", "❯".cyan(), item.cyan())))?;
            } else {
                queue!(self.out, Print(format!("  {}\r\n", item)))?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn clear_items(&mut self, items: &[String]) -> Result<()> {
        queue!(
            self.out,
            MoveUp(line_count(items)),
            MoveToColumn(0),
            Clear(ClearType::FromCursorDown)
        )?;
        Ok(())
    }

    fn draw_input(&mut self, label: &str, buffer: &str) -> Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{} {} {}", "?".green().bold(), label.bold(), buffer))
        )?;
        self.out.flush()?;
        Ok(())
    }
}

impl Operator for TerminalOperator {
    fn select(&mut self, label: &str, items: &[String]) -> Result<usize> {
        if items.is_empty() {
            return Err(Error::OperatorError(format!("no choices for: {}", label)));
        }

        let _raw = RawMode::enable()?;
        queue!(
            self.out,
            Hide,
            Print(format!("{} {}\r\n", "?".green().bold(), label.bold()))
        )?;

        let mut selected = 0;
        self.draw_items(items, selected)?;

        let outcome = loop {
            match menu_key(read_key()?) {
                Key::Up => selected = selected.checked_sub(1).unwrap_or(items.len() - 1),
                Key::Down => selected = (selected + 1) % items.len(),
                Key::Enter => break Ok(selected),
                Key::Cancel => break Err(Error::OperatorCancelled),
                _ => continue,
            }
            self.clear_items(items)?;
            self.draw_items(items, selected)?;
        };

        self.clear_items(items)?;
        let answer = match &outcome {
            Ok(index) => items[*index].cyan().to_string(),
            Err(_) => "back".dimmed().to_string(),
        };
        queue!(self.out, Print(format!("  {}\r\n", answer)), Show)?;
        self.out.flush()?;

        outcome
    }

    fn prompt_text(&mut self, label: &str) -> Result<String> {
        let _raw = RawMode::enable()?;
        let mut buffer = String::new();
        self.draw_input(label, &buffer)?;

        loop {
            match read_key()? {
                Key::Char(c) => buffer.push(c),
                Key::Backspace => {
                    buffer.pop();
                }
                Key::Enter => break,
                Key::Cancel => {
                    queue!(self.out, Print("\r\n"))?;
                    self.out.flush()?;
                    return Err(Error::OperatorCancelled);
                }
                _ => continue,
            }
            self.draw_input(label, &buffer)?;
        }

        queue!(self.out, Print("\r\n"))?;
        self.out.flush()?;

        if buffer.trim().is_empty() {
            return Err(Error::OperatorCancelled);
        }
        Ok(buffer)
    }
}
