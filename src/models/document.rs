//! Document model
//!
//! Official documents (laws, decrees, regulations, ...) published through the
//! portal. Each document carries a confidentiality tier and a publication
//! status; both feed the view policy independently.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// URL slug (unique)
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    /// Markdown / MDX body
    pub content: String,
    pub category: DocumentCategory,
    pub classification: DocumentClassification,
    pub status: ContentStatus,
    pub version: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    /// Authoring user
    pub author_id: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    /// Version string, falling back to "1.0"
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or("1.0")
    }
}

/// Document joined with its author's display name
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithAuthor {
    #[serde(flatten)]
    pub document: Document,
    pub author_name: String,
}

/// Identity of a stored document with its classification left unparsed
#[derive(Debug, Clone)]
pub struct DocumentHeader {
    pub id: i64,
    pub title: String,
    /// Raw stored label; may name a tier this build does not know
    pub classification: String,
}

/// Confidentiality tier of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentClassification {
    #[default]
    Public,
    Internal,
    Restricted,
}

impl DocumentClassification {
    pub const ALL: [DocumentClassification; 3] = [
        DocumentClassification::Public,
        DocumentClassification::Internal,
        DocumentClassification::Restricted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClassification::Public => "PUBLIC",
            DocumentClassification::Internal => "INTERNAL",
            DocumentClassification::Restricted => "RESTRICTED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentClassification::Public => "İctimai",
            DocumentClassification::Internal => "Daxili",
            DocumentClassification::Restricted => "Məhdudlaşdırılmış",
        }
    }
}

impl fmt::Display for DocumentClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentClassification {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PUBLIC" => Ok(DocumentClassification::Public),
            "INTERNAL" => Ok(DocumentClassification::Internal),
            "RESTRICTED" => Ok(DocumentClassification::Restricted),
            _ => Err(anyhow::anyhow!("Invalid document classification: {}", s)),
        }
    }
}

/// Publication stage of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    pub const ALL: [ContentStatus; 3] = [
        ContentStatus::Draft,
        ContentStatus::Published,
        ContentStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "DRAFT",
            ContentStatus::Published => "PUBLISHED",
            ContentStatus::Archived => "ARCHIVED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "Qaralama",
            ContentStatus::Published => "Yayımlanmış",
            ContentStatus::Archived => "Arxivlənmiş",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(ContentStatus::Draft),
            "PUBLISHED" => Ok(ContentStatus::Published),
            "ARCHIVED" => Ok(ContentStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Legal category of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentCategory {
    Constitution,
    Law,
    Code,
    Decree,
    Resolution,
    Regulation,
    #[default]
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Constitution => "CONSTITUTION",
            DocumentCategory::Law => "LAW",
            DocumentCategory::Code => "CODE",
            DocumentCategory::Decree => "DECREE",
            DocumentCategory::Resolution => "RESOLUTION",
            DocumentCategory::Regulation => "REGULATION",
            DocumentCategory::Other => "OTHER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentCategory::Constitution => "Konstitusiya",
            DocumentCategory::Law => "Qanun",
            DocumentCategory::Code => "Məcəllə",
            DocumentCategory::Decree => "Fərman",
            DocumentCategory::Resolution => "Sərəncam",
            DocumentCategory::Regulation => "Norma / Əmr",
            DocumentCategory::Other => "Digər",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONSTITUTION" => Ok(DocumentCategory::Constitution),
            "LAW" => Ok(DocumentCategory::Law),
            "CODE" => Ok(DocumentCategory::Code),
            "DECREE" => Ok(DocumentCategory::Decree),
            "RESOLUTION" => Ok(DocumentCategory::Resolution),
            "REGULATION" => Ok(DocumentCategory::Regulation),
            "OTHER" => Ok(DocumentCategory::Other),
            _ => Err(anyhow::anyhow!("Invalid document category: {}", s)),
        }
    }
}

/// Input for creating a document
#[derive(Debug, Clone, Default)]
pub struct CreateDocumentInput {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub category: Option<DocumentCategory>,
    pub classification: Option<DocumentClassification>,
    pub status: Option<ContentStatus>,
    pub version: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
}

/// Input for updating a document.
///
/// Tags arrive as a single comma-separated string.
#[derive(Debug, Clone)]
pub struct UpdateDocumentInput {
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: DocumentCategory,
    pub classification: DocumentClassification,
    pub status: ContentStatus,
    pub tags: Option<String>,
    pub version: Option<String>,
}

/// Filter for document listings
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<ContentStatus>,
    pub category: Option<DocumentCategory>,
    /// Case-insensitive match on title or description
    pub search: Option<String>,
}

/// Split a comma-separated tag string, dropping blanks
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_str() {
        for c in DocumentClassification::ALL {
            assert_eq!(DocumentClassification::from_str(c.as_str()).unwrap(), c);
        }
        for s in ContentStatus::ALL {
            assert_eq!(ContentStatus::from_str(&s.to_string()).unwrap(), s);
        }
        assert_eq!(DocumentCategory::from_str("decree").unwrap(), DocumentCategory::Decree);
    }

    #[test]
    fn test_unknown_labels_rejected() {
        assert!(DocumentClassification::from_str("SECRET").is_err());
        assert!(ContentStatus::from_str("DELETED").is_err());
        assert!(DocumentCategory::from_str("MEMO").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DocumentClassification::default(), DocumentClassification::Public);
        assert_eq!(ContentStatus::default(), ContentStatus::Draft);
        assert_eq!(DocumentCategory::default(), DocumentCategory::Other);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" law, ,decree ,"), vec!["law", "decree"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&ContentStatus::Published).unwrap();
        assert_eq!(json, "\"PUBLISHED\"");
        let c: DocumentClassification = serde_json::from_str("\"RESTRICTED\"").unwrap();
        assert_eq!(c, DocumentClassification::Restricted);
    }
}
