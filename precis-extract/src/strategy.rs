use serde::Serialize;
use url::Url;

pub const TRANSCRIPT_SCRIPT: &str = "content_youtube.js";
pub const PDF_SCRIPT: &str = "content_pdf.js";
pub const READABILITY_LIBRARY: &str = "Readability.js";
pub const READABILITY_SCRIPT: &str = "content.js";

/// Why a plan was chosen; also selects failure wording for the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionReason {
    Article,
    YouTube,
    Pdf,
}

/// Ordered scripts to inject into the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionPlan {
    pub files: Vec<String>,
    pub reason: ExtractionReason,
}

impl ExtractionPlan {
    fn of(reason: ExtractionReason, files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| (*f).to_string()).collect(),
            reason,
        }
    }

    pub fn transcript() -> Self {
        Self::of(ExtractionReason::YouTube, &[TRANSCRIPT_SCRIPT])
    }

    pub fn pdf() -> Self {
        Self::of(ExtractionReason::Pdf, &[PDF_SCRIPT])
    }

    pub fn readability() -> Self {
        Self::of(
            ExtractionReason::Article,
            &[READABILITY_LIBRARY, READABILITY_SCRIPT],
        )
    }
}

/// Pick the extractor for a page URL. First match wins:
///
/// 1. a video watch page (`/watch?v=...` on any host)
/// 2. a path ending in `.pdf`, ignoring case, query and fragment
/// 3. everything else, including URLs that fail to parse
///
/// ```
/// use precis_extract::strategy::{select_plan, ExtractionReason};
///
/// assert_eq!(select_plan("https://x.com/watch?v=1").reason, ExtractionReason::YouTube);
/// assert_eq!(select_plan("https://x.com/doc.pdf").reason, ExtractionReason::Pdf);
/// assert_eq!(select_plan("https://x.com/news/1").reason, ExtractionReason::Article);
/// ```
pub fn select_plan(raw: &str) -> ExtractionPlan {
    let Ok(url) = Url::parse(raw.trim()) else {
        tracing::debug!(url = raw, "strategy.unparseable_url");
        return ExtractionPlan::readability();
    };

    let plan = if is_watch_page(&url) {
        ExtractionPlan::transcript()
    } else if is_pdf(&url) {
        ExtractionPlan::pdf()
    } else {
        ExtractionPlan::readability()
    };
    tracing::debug!(url = raw, reason = ?plan.reason, "strategy.selected");
    plan
}

fn is_watch_page(url: &Url) -> bool {
    url.path().trim_end_matches('/').ends_with("/watch")
        && url.query_pairs().any(|(k, v)| k == "v" && !v.is_empty())
}

fn is_pdf(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_pages_get_the_transcript_plan() {
        for url in [
            "https://x.com/watch?v=1",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://m.youtube.com/watch?feature=share&v=abc",
        ] {
            let plan = select_plan(url);
            assert_eq!(plan.reason, ExtractionReason::YouTube, "{url}");
            assert_eq!(plan.files, vec![TRANSCRIPT_SCRIPT]);
        }
    }

    #[test]
    fn watch_without_video_id_is_an_article() {
        assert_eq!(
            select_plan("https://x.com/watch?list=7").reason,
            ExtractionReason::Article
        );
    }

    #[test]
    fn pdf_paths_get_the_pdf_plan() {
        for url in [
            "https://x.com/doc.pdf",
            "https://x.com/papers/REPORT.PDF?download=1",
            "file:///home/me/notes.pdf#page=2",
        ] {
            let plan = select_plan(url);
            assert_eq!(plan.reason, ExtractionReason::Pdf, "{url}");
            assert_eq!(plan.files, vec![PDF_SCRIPT]);
        }
    }

    #[test]
    fn pdf_in_query_only_is_not_a_pdf() {
        assert_eq!(
            select_plan("https://x.com/view?file=doc.pdf").reason,
            ExtractionReason::Article
        );
    }

    #[test]
    fn watch_page_wins_over_pdf_suffix() {
        assert_eq!(
            select_plan("https://x.com/a.pdf/watch?v=1").reason,
            ExtractionReason::YouTube
        );
    }

    #[test]
    fn everything_else_gets_readability() {
        for url in ["https://x.com/news/1", "not a url", "", "chrome://extensions"] {
            let plan = select_plan(url);
            assert_eq!(plan, ExtractionPlan::readability(), "{url:?}");
            assert_eq!(plan.files, vec![READABILITY_LIBRARY, READABILITY_SCRIPT]);
        }
    }

    #[test]
    fn plans_serialize_with_camel_case_reasons() {
        assert_eq!(
            serde_json::to_value(select_plan("https://x.com/watch?v=1")).unwrap(),
            serde_json::json!({"files": ["content_youtube.js"], "reason": "youTube"})
        );
        assert_eq!(
            serde_json::to_value(ExtractionReason::Pdf).unwrap(),
            serde_json::json!("pdf")
        );
    }
}
