//! Confirmation capability injected into planning.
//!
//! Decision logic never touches the console; it asks a [Confirmer]. The
//! terminal implementation lives in [`crate::ui`].

use std::cell::RefCell;
use std::collections::VecDeque;

/// Synchronous yes/no decision for a prompt
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Answers no to everything (non-interactive runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Confirmer for DenyAll {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Replays a fixed list of answers and records every prompt it was shown
///
/// Once the answers run out it declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        ScriptedConfirmer {
            answers: RefCell::new(answers.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts shown so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_all() {
        assert!(!DenyAll.confirm("Delete everything?"));
    }

    #[test]
    fn test_scripted_answers_then_declines() {
        let confirmer = ScriptedConfirmer::new([true, false]);
        assert!(confirmer.confirm("first"));
        assert!(!confirmer.confirm("second"));
        assert!(!confirmer.confirm("third"));
        assert_eq!(confirmer.prompts(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_closure_confirmer() {
        let confirmer = |prompt: &str| prompt.contains("tag");
        assert!(confirmer.confirm("Replace remote tag v1.0.0?"));
        assert!(!confirmer.confirm("Merge?"));
    }
}
