//! Static candidate filters
//!
//! Filters run before any dedup or quota interaction, so a filtered posting
//! never reserves an id or spends budget.

use regex::{Regex, RegexBuilder};
use shared::{FilterConfig, JobPosting, SkipReason};

use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone)]
pub struct CandidateFilter {
    blacklist_companies: Vec<String>,
    blacklist_titles: Vec<String>,
    only_apply_companies: Vec<String>,
    title_format: Option<Regex>,
}

fn normalized(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

impl CandidateFilter {
    pub fn from_config(config: &FilterConfig) -> OrchestratorResult<Self> {
        let title_format = match config.title_format.as_deref().map(str::trim) {
            Some(pattern) if !pattern.is_empty() => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| OrchestratorError::config(format!("filters.title_format: {e}")))?,
            ),
            _ => None,
        };

        Ok(Self {
            blacklist_companies: normalized(&config.blacklist_companies),
            blacklist_titles: normalized(&config.blacklist_titles),
            only_apply_companies: normalized(&config.only_apply_companies),
            title_format,
        })
    }

    /// Filter that lets every posting through
    pub fn permissive() -> Self {
        Self {
            blacklist_companies: Vec::new(),
            blacklist_titles: Vec::new(),
            only_apply_companies: Vec::new(),
            title_format: None,
        }
    }

    /// Reason to skip `posting`, or `None` when it may be attempted
    pub fn check(&self, posting: &JobPosting) -> Option<SkipReason> {
        let company = posting.company.to_lowercase();
        let title = posting.title.to_lowercase();

        if self.blacklist_companies.iter().any(|c| company.contains(c.as_str())) {
            return Some(SkipReason::Blacklisted);
        }
        if !self.only_apply_companies.is_empty()
            && !self.only_apply_companies.iter().any(|c| company.contains(c.as_str()))
        {
            return Some(SkipReason::Blacklisted);
        }
        if self.blacklist_titles.iter().any(|t| title.contains(t.as_str())) {
            return Some(SkipReason::TitleMismatch);
        }
        if let Some(format) = &self.title_format {
            if !format.is_match(&posting.title) {
                return Some(SkipReason::TitleMismatch);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, company: &str) -> JobPosting {
        JobPosting::new(1, title, company)
    }

    #[test]
    fn test_company_blacklist_is_case_insensitive() {
        let filter = CandidateFilter::from_config(&FilterConfig {
            blacklist_companies: vec!["Crossover".to_string(), "".to_string()],
            ..FilterConfig::none()
        })
        .unwrap();

        assert_eq!(
            filter.check(&posting("Frontend Engineer", "CROSSOVER for Work")),
            Some(SkipReason::Blacklisted)
        );
        assert_eq!(filter.check(&posting("Frontend Engineer", "Acme")), None);
    }

    #[test]
    fn test_only_apply_companies() {
        let filter = CandidateFilter::from_config(&FilterConfig {
            only_apply_companies: vec!["acme".to_string()],
            ..FilterConfig::none()
        })
        .unwrap();

        assert_eq!(filter.check(&posting("Dev", "Acme Corp")), None);
        assert_eq!(filter.check(&posting("Dev", "Globex")), Some(SkipReason::Blacklisted));
    }

    #[test]
    fn test_title_rules() {
        let filter = CandidateFilter::from_config(&FilterConfig {
            blacklist_titles: vec!["Senior".to_string()],
            title_format: Some(r"(react|frontend)".to_string()),
            ..FilterConfig::none()
        })
        .unwrap();

        assert_eq!(filter.check(&posting("React Developer", "Acme")), None);
        assert_eq!(
            filter.check(&posting("senior frontend engineer", "Acme")),
            Some(SkipReason::TitleMismatch)
        );
        assert_eq!(
            filter.check(&posting("Backend Engineer", "Acme")),
            Some(SkipReason::TitleMismatch)
        );
    }

    #[test]
    fn test_invalid_title_format_is_config_error() {
        let result = CandidateFilter::from_config(&FilterConfig {
            title_format: Some("(unclosed".to_string()),
            ..FilterConfig::none()
        });
        assert!(matches!(result, Err(OrchestratorError::ConfigurationError { .. })));
    }

    #[test]
    fn test_default_filters() {
        let filter = CandidateFilter::from_config(&FilterConfig::default()).unwrap();

        assert_eq!(filter.check(&posting("Senior Frontend Engineer", "Acme")), None);
        assert_eq!(
            filter.check(&posting("Frontend Engineer", "EPAM Systems")),
            Some(SkipReason::Blacklisted)
        );
        assert_eq!(
            filter.check(&posting("Frontend Test Engineer", "Acme")),
            Some(SkipReason::TitleMismatch)
        );
        assert_eq!(filter.check(&posting("UI Designer", "Acme")), Some(SkipReason::TitleMismatch));
    }

    #[test]
    fn test_permissive_filter() {
        assert_eq!(CandidateFilter::permissive().check(&posting("", "")), None);
    }
}
