//! Authored content ownership
//!
//! Documents, articles and news items all reference an author. An account
//! that still owns any of them cannot be deleted.

use serde::Serialize;

/// Titles of every piece of content owned by one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnedContent {
    pub documents: Vec<String>,
    pub articles: Vec<String>,
    pub news: Vec<String>,
}

/// Per-kind counts of owned content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentSummary {
    pub documents: usize,
    pub articles: usize,
    pub news: usize,
}

impl OwnedContent {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.articles.is_empty() && self.news.is_empty()
    }

    pub fn summary(&self) -> ContentSummary {
        ContentSummary {
            documents: self.documents.len(),
            articles: self.articles.len(),
            news: self.news.len(),
        }
    }
}

impl ContentSummary {
    pub fn total(&self) -> usize {
        self.documents + self.articles + self.news
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let owned = OwnedContent {
            documents: vec!["Charter".into(), "Decree 4".into()],
            articles: vec![],
            news: vec!["Weekly digest".into()],
        };

        assert!(!owned.is_empty());
        let summary = owned.summary();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.articles, 0);
        assert_eq!(summary.news, 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_empty() {
        assert!(OwnedContent::default().is_empty());
        assert_eq!(OwnedContent::default().summary().total(), 0);
    }
}
