//! Prompt templates for the three text-generation tasks.

use muninn_shared::{MuninnError, Result};
use serde::Serialize;

/// A chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The prompts this worker knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    /// `{message}` → `{"search_queries": [..]}` surfacing supporting evidence.
    SupportingDiscovery,
    /// `{message}` → `{"search_queries": [..]}` surfacing opposing evidence.
    OpposingDiscovery,
    /// `{search_query, web_content}` → `{"synopsis": ".."}`.
    SearchSynopsis,
}

impl PromptTemplate {
    /// Stable template name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SupportingDiscovery => "supporting_discovery",
            Self::OpposingDiscovery => "opposing_discovery",
            Self::SearchSynopsis => "search_synopsis",
        }
    }

    fn system(&self) -> &'static str {
        match self {
            Self::SupportingDiscovery => {
                "You help fact-check claims. Given a claim, write short web search queries \
                 that would surface evidence SUPPORTING the claim. Prefer specific, \
                 source-oriented queries (studies, official statistics, primary reporting). \
                 Respond with a JSON object of the form {\"search_queries\": [\"...\"]}."
            }
            Self::OpposingDiscovery => {
                "You help fact-check claims. Given a claim, write short web search queries \
                 that would surface evidence OPPOSING or refuting the claim. Prefer specific, \
                 source-oriented queries (studies, official statistics, primary reporting). \
                 Respond with a JSON object of the form {\"search_queries\": [\"...\"]}."
            }
            Self::SearchSynopsis => {
                "You summarize web research. Given a search query and the content of the \
                 pages it returned, write a concise synopsis of what the content says about \
                 the query. Only use the supplied content; if it is empty or irrelevant, say \
                 so. Respond with a JSON object of the form {\"synopsis\": \"...\"}."
            }
        }
    }

    fn user(&self, vars: &[(&str, &str)]) -> Result<String> {
        match self {
            Self::SupportingDiscovery | Self::OpposingDiscovery => {
                Ok(format!("Claim:\n{}", lookup(*self, vars, "message")?))
            }
            Self::SearchSynopsis => Ok(format!(
                "Search query:\n{}\n\nWeb content:\n{}",
                lookup(*self, vars, "search_query")?,
                lookup(*self, vars, "web_content")?,
            )),
        }
    }

    /// Render system and user messages from `vars`.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<Vec<ChatMessage>> {
        Ok(vec![
            ChatMessage {
                role: "system",
                content: self.system().to_string(),
            },
            ChatMessage {
                role: "user",
                content: self.user(vars)?,
            },
        ])
    }
}

fn lookup<'a>(template: PromptTemplate, vars: &[(&str, &'a str)], key: &str) -> Result<&'a str> {
    vars.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| {
            MuninnError::validation(format!(
                "prompt {} is missing variable '{key}'",
                template.name()
            ))
        })
}
