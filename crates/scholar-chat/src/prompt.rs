//! Prompt construction for knowledge-restricted answers.
//!
//! Every prompt must hold the model to three rules: answer only from the
//! supplied text, speak as the topic's own assistant instead of citing "the
//! document", and say plainly when the text does not cover the question.

/// Build the single instruction sent to the answering model.
pub fn build_prompt(knowledge: &str, topic_name: &str, question: &str) -> String {
    format!(
        r#"You are an expert assistant for "{topic}". Your entire knowledge base for this role is provided below.
Your goal is to answer user questions accurately and comprehensively, drawing ONLY from this specific knowledge base.
Speak directly as the "{topic}" assistant. Avoid phrases like "Based on the document..." or "The provided text says...". Instead, state the information directly as if it is your own knowledge.

If a question cannot be answered using ONLY the information in your knowledge base, clearly state that you don't have information on that specific query within the context of "{topic}". Do not attempt to answer from outside this scope.

Knowledge Base for "{topic}":
---
{knowledge}
---

User's Question: "{question}"

Please provide the answer:"#,
        topic = topic_name,
        knowledge = knowledge,
        question = question,
    )
}

/// Greeting shown at the top of a fresh or reset session.
pub fn greeting(topic_name: &str) -> String {
    format!(
        "Hello! I'm the AI assistant for \"{}\". How can I assist you today?",
        topic_name
    )
}

/// Assistant-authored text shown in place of an answer when the call fails.
pub fn error_reply(reason: &str) -> String {
    format!("Sorry, I encountered an error: {}", reason)
}
