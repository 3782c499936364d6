// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `PromptPort`: the interactive-input capability that `KeyAssembler` and
//! `RepositoryAuthor` weave through key-loading and confirmation flows.
//! Abstracting this as a trait means tests can substitute a scripted port
//! instead of driving a real terminal.

use std::io::{self, Write};

/// Interactive prompting, abstracted so production code can bind to a
/// terminal and tests can bind to a scripted sequence of answers.
pub trait PromptPort {
    /// Asks a yes/no question; returns the user's answer.
    fn confirm(&mut self, question: &str) -> bool;

    /// Reads a line of plain text, prompting with `prompt`. `None` on EOF
    /// (the user aborted, e.g. Ctrl-D).
    fn read_text(&mut self, prompt: &str) -> Option<String>;

    /// Reads a line of input without echoing it to the terminal. `None` on
    /// EOF.
    fn read_secret(&mut self, prompt: &str) -> Option<String>;
}

/// Production `PromptPort` bound to the process's controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl PromptPort for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn read_text(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}: ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        let n = io::stdin().read_line(&mut line).ok()?;
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\n', '\r']).to_owned())
    }

    fn read_secret(&mut self, prompt: &str) -> Option<String> {
        rpassword::prompt_password(format!("{prompt}: ")).ok()
    }
}

/// Test double: answers come from a pre-scripted sequence, consumed in
/// order. Used throughout the test suite so interactive flows (threshold
/// confirmation loops, passphrase retries) are exercised deterministically.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    confirms: std::collections::VecDeque<bool>,
    texts: std::collections::VecDeque<Option<String>>,
    secrets: std::collections::VecDeque<Option<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedPrompt {
    /// Builds a scripted port from explicit answer queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next `confirm` answer.
    #[must_use]
    pub fn with_confirm(mut self, answer: bool) -> Self {
        self.confirms.push_back(answer);
        self
    }

    /// Queues the next `read_text` answer (`None` simulates EOF).
    #[must_use]
    pub fn with_text(mut self, answer: Option<&str>) -> Self {
        self.texts.push_back(answer.map(str::to_owned));
        self
    }

    /// Queues the next `read_secret` answer (`None` simulates EOF).
    #[must_use]
    pub fn with_secret(mut self, answer: Option<&str>) -> Self {
        self.secrets.push_back(answer.map(str::to_owned));
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
impl PromptPort for ScriptedPrompt {
    fn confirm(&mut self, _question: &str) -> bool {
        self.confirms.pop_front().unwrap_or(false)
    }

    fn read_text(&mut self, _prompt: &str) -> Option<String> {
        self.texts.pop_front().flatten()
    }

    fn read_secret(&mut self, _prompt: &str) -> Option<String> {
        self.secrets.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_prompt_answers_in_order() {
        let mut p = ScriptedPrompt::new()
            .with_confirm(true)
            .with_confirm(false)
            .with_secret(Some("hunter2"))
            .with_text(None);
        assert!(p.confirm("continue?"));
        assert!(!p.confirm("continue?"));
        assert_eq!(p.read_secret("password"), Some("hunter2".to_owned()));
        assert_eq!(p.read_text("name"), None);
    }
}
