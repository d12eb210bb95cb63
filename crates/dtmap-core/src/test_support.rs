//! Oracle doubles shared by the unit tests.

use crate::error::DtmapError;
use crate::oracle::{Oracle, Prompt};
use std::sync::Mutex;

/// Replays canned replies in order; fails once they run out.
pub struct ScriptedOracle {
    replies: Mutex<Vec<Result<String, String>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
        let mut replies: Vec<Result<String, String>> = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn classify(&self, prompt: &Prompt) -> Result<String, DtmapError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.replies.lock().unwrap().pop() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(DtmapError::OracleTransport(e)),
            None => Err(DtmapError::OracleTransport("script exhausted".into())),
        }
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

/// Answers every prompt with a closure.
pub struct FnOracle<F>(pub F);

impl<F> Oracle for FnOracle<F>
where
    F: Fn(&Prompt) -> Result<String, DtmapError> + Send + Sync,
{
    fn classify(&self, prompt: &Prompt) -> Result<String, DtmapError> {
        (self.0)(prompt)
    }

    fn backend_name(&self) -> &str {
        "fn"
    }
}

/// An oracle that is always unreachable.
pub fn down_oracle() -> FnOracle<impl Fn(&Prompt) -> Result<String, DtmapError> + Send + Sync> {
    FnOracle(|_: &Prompt| Err(DtmapError::OracleTransport("connection refused".into())))
}
