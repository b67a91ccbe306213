//! Document export formats
//!
//! `md` keeps the markdown with a frontmatter header, `txt` flattens it to
//! plain text and `pdf` returns a JSON payload the browser turns into a PDF.

use crate::models::DocumentWithAuthor;
use crate::services::slug::download_filename;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    Markdown,
    Text,
    Pdf,
}

impl DownloadFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadFormat::Markdown => "md",
            DownloadFormat::Text => "txt",
            DownloadFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DownloadFormat::Markdown => "text/markdown",
            DownloadFormat::Text => "text/plain",
            DownloadFormat::Pdf => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid format. Supported formats: md, txt, pdf")]
pub struct InvalidFormat;

impl FromStr for DownloadFormat {
    type Err = InvalidFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md" => Ok(DownloadFormat::Markdown),
            "txt" => Ok(DownloadFormat::Text),
            "pdf" => Ok(DownloadFormat::Pdf),
            _ => Err(InvalidFormat),
        }
    }
}

/// A rendered download, ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct DownloadFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Serialize)]
struct PdfPayload<'a> {
    title: &'a str,
    author: &'a str,
    created: String,
    version: &'a str,
    classification: &'a str,
    content: &'a str,
}

/// Render a document in the requested format
pub fn render(doc: &DocumentWithAuthor, format: DownloadFormat) -> anyhow::Result<DownloadFile> {
    let document = &doc.document;
    let content = unwrap_mdx_layout(&document.content);
    let created = document.created_at.format("%Y-%m-%d").to_string();
    let version = document.version_or_default();
    let classification = document.classification.as_str();

    let body = match format {
        DownloadFormat::Markdown => format!(
            "---\ntitle: {}\nauthor: {}\ncreated: {}\nversion: {}\nclassification: {}\n---\n\n{}",
            document.title, doc.author_name, created, version, classification, content
        ),
        DownloadFormat::Text => format!(
            "{}\nAuthor: {}\nCreated: {}\nVersion: {}\nClassification: {}\n\n{}",
            document.title,
            doc.author_name,
            created,
            version,
            classification,
            markdown_to_text(&content)
        ),
        DownloadFormat::Pdf => serde_json::to_string(&PdfPayload {
            title: &document.title,
            author: &doc.author_name,
            created,
            version,
            classification,
            content: &content,
        })?,
    };

    Ok(DownloadFile {
        filename: download_filename(&document.title, format.extension()),
        content_type: format.content_type(),
        body,
    })
}

/// Strip an `<MDXLayout ...>` wrapper: the body runs from the line holding a
/// lone `>` to the last `</MDXLayout>` line. Unwrapped content is returned
/// as-is.
pub fn unwrap_mdx_layout(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let start = lines.iter().position(|line| line.trim() == ">");
    let end = lines.iter().rposition(|line| *line == "</MDXLayout>");

    match (start, end) {
        (Some(start), Some(end)) if start < end => lines[start + 1..end].join("\n").trim().to_string(),
        (Some(_), Some(_)) => String::new(),
        _ => content.to_string(),
    }
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.*?)_").unwrap());
static RE_UNDERLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<u>(.*?)</u>").unwrap());
static RE_STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.*?)~~").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-*+]\s+").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.\s+").unwrap());
static RE_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s+").unwrap());
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^---+$").unwrap());

/// Flatten markdown to readable plain text
pub fn markdown_to_text(markdown: &str) -> String {
    let text = RE_HEADING.replace_all(markdown, "");
    let text = RE_BOLD.replace_all(&text, "$1");
    let text = RE_ITALIC.replace_all(&text, "$1");
    let text = RE_UNDERLINE.replace_all(&text, "$1");
    let text = RE_STRIKE.replace_all(&text, "$1");
    let text = RE_CODE.replace_all(&text, "$1");
    let text = RE_LINK.replace_all(&text, "${1} (${2})");
    let text = RE_BULLET.replace_all(&text, "• ");
    let text = RE_NUMBERED.replace_all(&text, "");
    let text = RE_QUOTE.replace_all(&text, "");
    let text = RE_RULE.replace_all(&text, "");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContentStatus, Document, DocumentCategory, DocumentClassification,
    };
    use chrono::{TimeZone, Utc};

    fn sample(content: &str, version: Option<&str>) -> DocumentWithAuthor {
        let created = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        DocumentWithAuthor {
            document: Document {
                id: 1,
                slug: "community-charter".into(),
                title: "Community Charter".into(),
                description: None,
                content: content.into(),
                category: DocumentCategory::Constitution,
                classification: DocumentClassification::Internal,
                status: ContentStatus::Published,
                version: version.map(String::from),
                effective_date: None,
                tags: vec![],
                author_id: 1,
                published_at: Some(created),
                created_at: created,
                updated_at: created,
            },
            author_name: "Leyla".into(),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<DownloadFormat>().unwrap(), DownloadFormat::Markdown);
        assert_eq!("pdf".parse::<DownloadFormat>().unwrap(), DownloadFormat::Pdf);
        let err = "docx".parse::<DownloadFormat>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid format. Supported formats: md, txt, pdf");
        assert!("MD".parse::<DownloadFormat>().is_err());
    }

    #[test]
    fn test_unwrap_mdx_layout() {
        let wrapped = "import MDXLayout from '@/components/MDXLayout';\n\n<MDXLayout\n  title=\"Charter\"\n>\n\n# Article 1\n\nBody.\n\n</MDXLayout>";
        assert_eq!(unwrap_mdx_layout(wrapped), "# Article 1\n\nBody.");

        assert_eq!(unwrap_mdx_layout("# Plain\n\ntext"), "# Plain\n\ntext");
        assert_eq!(unwrap_mdx_layout("no closing\n>\nbody"), "no closing\n>\nbody");
    }

    #[test]
    fn test_markdown_to_text() {
        let md = "## Heading\n**bold** and _it_ with `code`\n- item\n1. first\n> quote\n---\nSee [site](https://example.com) ~~old~~ <u>u</u>";
        let text = markdown_to_text(md);
        assert_eq!(
            text,
            "Heading\nbold and it with code\n• item\nfirst\nquote\n\nSee site (https://example.com) old u"
        );
    }

    #[test]
    fn test_render_markdown_frontmatter() {
        let file = render(&sample("Body", None), DownloadFormat::Markdown).unwrap();
        assert_eq!(file.filename, "community-charter.md");
        assert_eq!(file.content_type, "text/markdown");
        assert_eq!(
            file.body,
            "---\ntitle: Community Charter\nauthor: Leyla\ncreated: 2024-03-15\nversion: 1.0\nclassification: INTERNAL\n---\n\nBody"
        );
    }

    #[test]
    fn test_render_text_and_pdf() {
        let doc = sample("**Bold** body", Some("2.1"));

        let txt = render(&doc, DownloadFormat::Text).unwrap();
        assert_eq!(txt.filename, "community-charter.txt");
        assert!(txt.body.starts_with("Community Charter\nAuthor: Leyla\n"));
        assert!(txt.body.contains("Version: 2.1"));
        assert!(txt.body.ends_with("Bold body"));

        let pdf = render(&doc, DownloadFormat::Pdf).unwrap();
        assert_eq!(pdf.content_type, "application/json");
        let json: serde_json::Value = serde_json::from_str(&pdf.body).unwrap();
        assert_eq!(json["title"], "Community Charter");
        assert_eq!(json["version"], "2.1");
        assert_eq!(json["classification"], "INTERNAL");
        assert_eq!(json["content"], "**Bold** body");
    }
}
