//! Contracts for what extractors send back.

use crate::strategy::ExtractionReason;
use precis_common::{Article, PrecisError, TabRef};
use url::Url;

pub const UNREADABLE_ARTICLE_TITLE: &str = "Parsing Failed";
pub const UNREADABLE_ARTICLE_MESSAGE: &str = "Could not find a readable article on this page.";

/// Title/message pair an extractor reports when it gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureText {
    pub title: &'static str,
    pub message: &'static str,
}

pub fn failure_defaults(reason: ExtractionReason) -> FailureText {
    match reason {
        ExtractionReason::Article => FailureText {
            title: UNREADABLE_ARTICLE_TITLE,
            message: UNREADABLE_ARTICLE_MESSAGE,
        },
        ExtractionReason::Pdf => FailureText {
            title: "PDF Parsing Failed",
            message: "An error occurred while trying to read the PDF content. It may be corrupted or protected.",
        },
        ExtractionReason::YouTube => FailureText {
            title: "Transcript Failed",
            message: "Could not read the transcript for this video.",
        },
    }
}

/// The outcome an extractor posts: an article or a titled failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorReport {
    Extracted(Article),
    Failed {
        title: Option<String>,
        message: Option<String>,
    },
}

impl ExtractorReport {
    /// Turn the report into a validated article or an extraction error,
    /// filling blank failure text from [`failure_defaults`].
    pub fn resolve(self, reason: ExtractionReason) -> Result<Article, PrecisError> {
        match self {
            ExtractorReport::Extracted(article) => {
                validate_article(&article)?;
                Ok(article)
            }
            ExtractorReport::Failed { title, message } => {
                let defaults = failure_defaults(reason);
                let pick = |s: Option<String>, fallback: &str| {
                    s.filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| fallback.to_string())
                };
                Err(PrecisError::Extraction {
                    title: pick(title, defaults.title),
                    message: pick(message, defaults.message),
                })
            }
        }
    }
}

/// Reject articles with nothing to summarize. The article is not modified,
/// so what gets stored is exactly what the extractor sent.
pub fn validate_article(article: &Article) -> Result<(), PrecisError> {
    if article.content.trim().is_empty() {
        return Err(PrecisError::Extraction {
            title: UNREADABLE_ARTICLE_TITLE.to_string(),
            message: UNREADABLE_ARTICLE_MESSAGE.to_string(),
        });
    }
    Ok(())
}

/// Title used when the page offers none.
///
/// ```
/// use precis_extract::report::default_title;
/// use precis_extract::strategy::ExtractionReason;
///
/// assert_eq!(default_title("https://x.com/files/q3-report.pdf", ExtractionReason::Pdf), "q3-report");
/// assert_eq!(default_title("https://x.com/watch?v=1", ExtractionReason::YouTube), "YouTube Video");
/// assert_eq!(default_title("https://news.example/a/1", ExtractionReason::Article), "news.example");
/// ```
pub fn default_title(url: &str, reason: ExtractionReason) -> String {
    let parsed = Url::parse(url).ok();
    match reason {
        ExtractionReason::Pdf => parsed
            .as_ref()
            .and_then(|u| u.path_segments())
            .and_then(|mut segs| segs.next_back())
            .map(strip_pdf_suffix)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "PDF Document".to_string()),
        ExtractionReason::YouTube => "YouTube Video".to_string(),
        ExtractionReason::Article => parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .map(str::to_string)
            .unwrap_or_else(|| "Untitled Page".to_string()),
    }
}

fn strip_pdf_suffix(segment: &str) -> String {
    let lower = segment.to_ascii_lowercase();
    match lower.strip_suffix(".pdf") {
        Some(stem) => segment[..stem.len()].to_string(),
        None => segment.to_string(),
    }
}

/// Build a tentative article from text the user selected on the page.
///
/// Returns `None` when the selection is blank.
pub fn article_from_selection(tab: &TabRef, selection: &str) -> Option<Article> {
    let content = selection.trim();
    if content.is_empty() {
        return None;
    }
    let title = tab
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let reason = crate::strategy::select_plan(&tab.url).reason;
            default_title(&tab.url, reason)
        });
    Some(Article::new(title, content, tab.url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use precis_common::TabId;

    fn tab(url: &str, title: Option<&str>) -> TabRef {
        TabRef {
            id: TabId(1),
            url: url.to_string(),
            title: title.map(str::to_string),
            window_id: None,
        }
    }

    #[test]
    fn blank_content_is_rejected_without_mutation() {
        let article = Article::new("T", "  \n ", "https://x.com");
        let before = article.clone();
        let err = validate_article(&article).unwrap_err();
        assert_eq!(err.title(), "Parsing Failed");
        assert_eq!(article, before);
    }

    #[test]
    fn extracted_article_is_returned_unchanged() {
        let article = Article::new("T", "  body with padding  ", "https://x.com");
        let got = ExtractorReport::Extracted(article.clone())
            .resolve(ExtractionReason::Article)
            .unwrap();
        assert_eq!(got, article);
    }

    #[test]
    fn failure_keeps_extractor_text() {
        let err = ExtractorReport::Failed {
            title: Some("Transcript Failed".into()),
            message: Some("Captions are disabled.".into()),
        }
        .resolve(ExtractionReason::YouTube)
        .unwrap_err();
        assert_eq!(
            err,
            PrecisError::Extraction {
                title: "Transcript Failed".into(),
                message: "Captions are disabled.".into()
            }
        );
    }

    #[test]
    fn blank_failure_text_uses_defaults() {
        let err = ExtractorReport::Failed {
            title: None,
            message: Some("".into()),
        }
        .resolve(ExtractionReason::Pdf)
        .unwrap_err();
        assert_eq!(err.title(), "PDF Parsing Failed");
        assert!(err.to_string().contains("corrupted or protected"));
    }

    #[test]
    fn pdf_title_falls_back() {
        assert_eq!(
            default_title("https://x.com/Annual.PDF", ExtractionReason::Pdf),
            "Annual"
        );
        assert_eq!(
            default_title("https://x.com/", ExtractionReason::Pdf),
            "PDF Document"
        );
        assert_eq!(
            default_title("garbage", ExtractionReason::Article),
            "Untitled Page"
        );
    }

    #[test]
    fn selection_becomes_article() {
        let a = article_from_selection(&tab("https://x.com/news/1", Some("News")), "  quoted text ")
            .unwrap();
        assert_eq!(a, Article::new("News", "quoted text", "https://x.com/news/1"));

        let untitled = article_from_selection(&tab("https://x.com/d.pdf", None), "text").unwrap();
        assert_eq!(untitled.title, "d");

        assert!(article_from_selection(&tab("https://x.com", None), " \t").is_none());
    }
}
