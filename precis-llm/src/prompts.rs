//! Instruction text sent alongside article content.
//!
//! The builders are pure string functions keyed by operation and
//! [`KnowledgeMode`]; nothing else in the crate depends on their wording.

use crate::traits::KnowledgeMode;
use precis_common::Article;

fn article_block(article: &Article) -> String {
    format!(
        "<article>\n  <title>{}</title>\n  <content>\n{}\n  </content>\n</article>",
        article.title, article.content
    )
}

pub fn summarize(article: &Article) -> String {
    format!(
        r#"You are an expert content analyst. Write a structured, high-quality summary of the article below.

Instructions:
1. Identify the main topic, the key arguments and any notable conclusions.
2. Combine them into a coherent summary that is easy to read.
3. Use Markdown: a heading with the title, bold for emphasis, bullet points for key takeaways where useful.
4. Start directly with the summary. No preamble such as "Here is the summary".
5. Keep it compact: single blank lines between blocks.

{}"#,
        article_block(article)
    )
}

/// First user turn of every chat; establishes the article as context.
pub fn chat_system_context(article: &Article, mode: KnowledgeMode) -> String {
    let directive = match mode {
        KnowledgeMode::ArticleOnly => {
            r#"Answer questions using only the text of the article below.
- Do not use knowledge from outside the article.
- Do not infer facts the article does not state.
If the article does not contain the answer, reply exactly: "Based on the provided article, that information is not available.""#
        }
        KnowledgeMode::Hybrid => {
            r#"Answer questions about the article below. Prefer the article's own text.
When the article does not cover a question, you may use general knowledge and web search; say clearly which parts of the answer come from outside the article."#
        }
    };
    format!(
        "You are a question-answering assistant for a single article.\n\n{directive}\n\nFormat every answer in Markdown.\n\n{}",
        article_block(article)
    )
}

/// Scripted model turn that follows the system context.
pub fn chat_opening_line(mode: KnowledgeMode) -> &'static str {
    match mode {
        KnowledgeMode::ArticleOnly => {
            "Okay, I have read the article. I will only use the provided text to answer. What would you like to know?"
        }
        KnowledgeMode::Hybrid => {
            "Okay, I have read the article. I will answer from it first and use general knowledge or web search when it falls short. What would you like to know?"
        }
    }
}

pub fn fact_check(article: &Article, mode: KnowledgeMode) -> String {
    let sources = match mode {
        KnowledgeMode::ArticleOnly => {
            "Judge each claim on internal consistency and plausibility; you have no outside sources."
        }
        KnowledgeMode::Hybrid => {
            "Use web search to verify each claim against reliable, independent sources and cite them."
        }
    };
    format!(
        r#"You are a meticulous fact-checker. Review the article below and produce a fact-check report.

Instructions:
1. List the article's most important factual claims.
2. For each claim give a verdict: Supported, Disputed, Misleading or Unverifiable, with a one-paragraph explanation.
3. {sources}
4. Finish with an overall assessment of the article's reliability.
5. Use Markdown headings and bullet points. Start directly with the report.

{}"#,
        article_block(article)
    )
}

pub fn extract_claims(article: &Article) -> String {
    format!(
        r#"Extract the distinct, checkable factual claims made in the article below.

Rules:
- Each claim is one self-contained sentence.
- Skip opinions, predictions and rhetorical questions.
- Respond with a JSON array of strings and nothing else, e.g. ["claim one", "claim two"].
- If there are no checkable claims, respond with [].

{}"#,
        article_block(article)
    )
}

/// Prompt the user pastes into the Gemini web UI for a deeper fact-check.
pub fn general_fact_check(article: &Article) -> String {
    format!(
        r#"Please run a thorough fact-check of the article published at {url}.

Search the web for independent sources, verify the key claims, note missing context or bias, and end with an overall reliability verdict. Cite your sources.

{}"#,
        article_block(article),
        url = article.url
    )
}
