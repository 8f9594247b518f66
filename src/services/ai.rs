//! AI service — lesson tooling over the text-completion collaborator.
//!
//! ERROR HANDLING
//! ==============
//! Best-effort, always show something: an unavailable or misconfigured
//! upstream substitutes a hardcoded fallback, and a structured response that
//! fails to parse degrades to an empty list. Nothing here returns an error
//! to the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{LlmComplete, Message};

const AI_MAX_TOKENS: u32 = 1024;

const BREAKDOWN_SYSTEM: &str = "You are a tutoring-session planner. Respond with a JSON array only, \
     no prose around it.";

const REVIEW_SYSTEM: &str = "You are a code reviewer for a tutoring session. Keep reviews short and \
     constructive.";

const ASSISTANT_SYSTEM: &str = "You are an AI learning assistant for a one-on-one tutoring session. \
     You help with lesson plans, topic explanations, and homework generation. \
     Keep your answers concise, practical, and helpful.";

pub const FALLBACK_REVIEW: &str =
    "The review service is unavailable right now; check the submission manually for correctness and edge cases.";

pub const FALLBACK_REPLY: &str = "The AI assistant is unavailable right now. Please try again in a moment.";

// =============================================================================
// TYPES
// =============================================================================

/// One suggested focus area in a lesson breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub description: String,
    /// One of `Theory`, `Practical`, `Tooling`, `Discussion`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Suggested duration in minutes.
    pub duration: u32,
}

/// A prior turn of the assistant conversation, folded into the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

/// Substituted when the breakdown upstream is unavailable.
#[must_use]
pub fn fallback_topics() -> Vec<Topic> {
    vec![
        Topic {
            title: "Concept walkthrough".into(),
            description: "Work through the core idea behind the stated goals together.".into(),
            kind: "Theory".into(),
            duration: 15,
        },
        Topic {
            title: "Hands-on exercise".into(),
            description: "Apply the concept in the shared editor with a small task.".into(),
            kind: "Practical".into(),
            duration: 20,
        },
        Topic {
            title: "Questions and next steps".into(),
            description: "Review what was covered and agree on homework.".into(),
            kind: "Discussion".into(),
            duration: 10,
        },
    ]
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Break a list of learning goals into 3-4 focus areas for a 45-minute
/// session. Malformed model output degrades to an empty list; an unavailable
/// upstream substitutes the fallback topics.
pub async fn goal_breakdown(llm: Option<&Arc<dyn LlmComplete>>, goals: &[String]) -> Vec<Topic> {
    let Some(llm) = llm else {
        return fallback_topics();
    };

    let mut prompt = String::from(
        "Break down the following learning goals into 3-4 specific focus areas \
         for a 45-minute tutoring session. Respond with a JSON array of objects \
         with keys \"title\", \"description\", \"type\" (one of Theory, Practical, \
         Tooling, Discussion) and \"duration\" (minutes).\nGoals:\n",
    );
    for goal in goals {
        prompt.push_str("- ");
        prompt.push_str(goal);
        prompt.push('\n');
    }

    match llm.complete(AI_MAX_TOKENS, BREAKDOWN_SYSTEM, &[Message::user(prompt)]).await {
        Ok(text) => parse_topics(&text).unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "ai: goal breakdown failed, using fallback topics");
            fallback_topics()
        }
    }
}

/// Produce a short constructive review of a code submission.
pub async fn code_review(llm: Option<&Arc<dyn LlmComplete>>, code: &str) -> String {
    let Some(llm) = llm else {
        return FALLBACK_REVIEW.to_string();
    };

    let prompt = format!(
        "Review the following code submission. Provide a short, constructive \
         review (1-2 sentences) highlighting one area for improvement, such as \
         time complexity or syntax.\n\nCode:\n{code}"
    );

    match llm.complete(AI_MAX_TOKENS, REVIEW_SYSTEM, &[Message::user(prompt)]).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "ai: code review failed, using fallback");
            FALLBACK_REVIEW.to_string()
        }
    }
}

/// Free-form assistant chat. History and optional context are folded into
/// the prompt text.
pub async fn assistant_chat(
    llm: Option<&Arc<dyn LlmComplete>>,
    message: &str,
    history: &[ChatTurn],
    context: Option<&str>,
) -> String {
    let Some(llm) = llm else {
        return FALLBACK_REPLY.to_string();
    };

    let mut system = ASSISTANT_SYSTEM.to_string();
    if let Some(context) = context {
        system.push_str("\n\nContext:\n");
        system.push_str(context);
    }

    let full_message = if history.is_empty() {
        message.to_string()
    } else {
        let mut folded = String::from("Previous conversation:\n");
        for turn in history {
            folded.push_str(&turn.role);
            folded.push_str(": ");
            folded.push_str(&turn.text);
            folded.push('\n');
        }
        folded.push_str("\nUser: ");
        folded.push_str(message);
        folded
    };

    match llm.complete(AI_MAX_TOKENS, &system, &[Message::user(full_message)]).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "ai: assistant chat failed, using fallback");
            FALLBACK_REPLY.to_string()
        }
    }
}

// =============================================================================
// LENIENT PARSING
// =============================================================================

/// Extract and parse the first bracketed JSON array in the model output.
/// Models wrap arrays in prose or code fences often enough that strict
/// whole-body parsing would throw away good answers.
fn parse_topics(text: &str) -> Option<Vec<Topic>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
