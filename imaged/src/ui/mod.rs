//! Server-rendered page
//!
//! The whole UI is one page re-rendered from session state after every
//! request: prompt form, optional notice, latest image, and history.

use minijinja::Environment;
use serde::Serialize;

use crate::session::{Generation, Session};

/// Page title
pub const TITLE: &str = "DALL-E 3 Image Generator";

/// Banner shown above the form after a submit
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Generated { file_name: String },
    Error { message: String },
}

impl Notice {
    /// Inline message for a failed generation
    pub fn generation_failed(err: &impl std::fmt::Display) -> Self {
        Notice::Error {
            message: format!("Error while generating image: {}", err),
        }
    }

    pub fn busy() -> Self {
        Notice::Error {
            message: "An image is already being generated. Please wait for it to finish."
                .to_string(),
        }
    }
}

/// One history row
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    /// 1-based position
    pub number: usize,
    pub prompt: String,
    pub file_name: String,
}

/// Everything the page template needs
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub title: &'static str,
    pub busy: bool,
    pub prompt: String,
    pub notice: Option<Notice>,
    pub history: Vec<HistoryItem>,
}

impl PageView {
    /// Snapshot a session into a view
    pub fn for_session(session: &Session) -> Self {
        Self {
            title: TITLE,
            busy: session.is_busy(),
            prompt: String::new(),
            notice: None,
            history: history_items(&session.history()),
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

fn history_items(history: &[Generation]) -> Vec<HistoryItem> {
    history
        .iter()
        .enumerate()
        .map(|(i, g)| HistoryItem {
            number: i + 1,
            prompt: g.prompt.clone(),
            file_name: g.file_name(),
        })
        .collect()
}

/// Template environment
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", include_str!("../../templates/index.html"))?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &PageView) -> Result<String, minijinja::Error> {
        self.env.get_template("index.html")?.render(view)
    }
}
