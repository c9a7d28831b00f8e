//! Search task generation and the shared work queue

use std::collections::VecDeque;

use shared::{SearchConfig, SearchDescriptor, SearchTask, SharedError, SharedResult};
use tokio::sync::Mutex;
use url::Url;

/// Region geo ids understood by the job board's search page
fn geo_id(location: &str) -> Option<&'static str> {
    match location.trim().to_lowercase().as_str() {
        "asia" => Some("102393603"),
        "europe" => Some("100506914"),
        "northamerica" => Some("102221843"),
        "southamerica" => Some("104514572"),
        "australia" => Some("101452733"),
        "africa" => Some("103537801"),
        "emea" => Some("100506914"),
        _ => None,
    }
}

fn join_codes<T>(items: &[T], code: impl Fn(&T) -> &'static str) -> String {
    items.iter().map(code).collect::<Vec<_>>().join(",")
}

/// Expands a search configuration into the run's task list
pub struct TaskSource<'a> {
    config: &'a SearchConfig,
}

impl<'a> TaskSource<'a> {
    pub fn new(config: &'a SearchConfig) -> Self {
        Self { config }
    }

    /// Location-major cross product of locations and keywords
    pub fn build(&self) -> SharedResult<Vec<SearchTask>> {
        let base = Url::parse(&self.config.base_url).map_err(|e| SharedError::InvalidUrl {
            message: format!("{}: {}", self.config.base_url, e),
        })?;

        let mut tasks = Vec::with_capacity(self.config.locations.len() * self.config.keywords.len());
        for location in &self.config.locations {
            for keyword in &self.config.keywords {
                tasks.push(SearchTask {
                    category: keyword.clone(),
                    location: location.clone(),
                    descriptor: SearchDescriptor::new(self.search_url(&base, keyword, location)),
                });
            }
        }
        Ok(tasks)
    }

    fn search_url(&self, base: &Url, keyword: &str, location: &str) -> Url {
        let config = self.config;
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            if config.easy_apply_only {
                query.append_pair("f_AL", "true");
            }
            query.append_pair("keywords", keyword);
            if !config.job_types.is_empty() {
                query.append_pair("f_JT", &join_codes(&config.job_types, |t| t.code()));
            }
            if !config.workplace.is_empty() {
                query.append_pair("f_WT", &join_codes(&config.workplace, |w| w.code()));
            }
            query.append_pair("location", location);
            if let Some(geo) = geo_id(location) {
                query.append_pair("geoId", geo);
            }
            if !config.experience_levels.is_empty() {
                query.append_pair("f_E", &join_codes(&config.experience_levels, |e| e.code()));
            }
            if let Some(range) = config.date_posted.code() {
                query.append_pair("f_TPR", range);
            }
            if let Some(salary) = config.salary {
                query.append_pair("f_SB2", salary.code());
            }
            query.append_pair("sortBy", config.sort.code());
        }
        url
    }
}

/// FIFO of search tasks shared by every worker
///
/// Filled once before workers start; each task is handed out at most once.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<SearchTask>>,
}

impl TaskQueue {
    pub fn new(tasks: Vec<SearchTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into()),
        }
    }

    pub async fn pop(&self) -> Option<SearchTask> {
        self.tasks.lock().await.pop_front()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DatePosted, JobType, WorkplaceType};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn config(keywords: &[&str], locations: &[&str]) -> SearchConfig {
        SearchConfig {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_cross_product_is_location_major() {
        let config = config(&["react", "rust", "go"], &["EMEA", "Asia"]);
        let tasks = TaskSource::new(&config).build().unwrap();

        assert_eq!(tasks.len(), 6);
        let order: Vec<_> = tasks
            .iter()
            .map(|t| (t.location.as_str(), t.category.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("EMEA", "react"),
                ("EMEA", "rust"),
                ("EMEA", "go"),
                ("Asia", "react"),
                ("Asia", "rust"),
                ("Asia", "go"),
            ]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = config(&["react", "typescript"], &["Europe", "Berlin"]);
        let first = TaskSource::new(&config).build().unwrap();
        let second = TaskSource::new(&config).build().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_search_url_parameters() {
        let mut config = config(&["react native"], &["EMEA"]);
        config.job_types = vec![JobType::FullTime, JobType::Contract];
        config.workplace = vec![WorkplaceType::Remote];
        config.date_posted = DatePosted::PastWeek;

        let tasks = TaskSource::new(&config).build().unwrap();
        let url = tasks[0].descriptor.url();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("f_AL"), Some("true"));
        assert_eq!(get("keywords"), Some("react native"));
        assert_eq!(get("f_JT"), Some("F,C"));
        assert_eq!(get("f_WT"), Some("2"));
        assert_eq!(get("geoId"), Some("100506914"));
        assert_eq!(get("f_E"), Some("2,3,4,5,6"));
        assert_eq!(get("f_TPR"), Some("r604800"));
        assert_eq!(get("f_SB2"), Some("2"));
        assert_eq!(get("sortBy"), Some("DD"));
    }

    #[test]
    fn test_unknown_location_has_no_geo_id() {
        let config = config(&["react"], &["Lisbon"]);
        let tasks = TaskSource::new(&config).build().unwrap();
        assert!(!tasks[0].descriptor.url().as_str().contains("geoId"));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = config(&["react"], &["EMEA"]);
        config.base_url = "not a url".to_string();
        assert!(matches!(
            TaskSource::new(&config).build(),
            Err(SharedError::InvalidUrl { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pops_are_unique() {
        let keywords: Vec<String> = (0..50).map(|i| format!("kw{i}")).collect();
        let keyword_refs: Vec<&str> = keywords.iter().map(String::as_str).collect();
        let config = config(&keyword_refs, &["EMEA", "Asia"]);
        let queue = Arc::new(TaskQueue::new(TaskSource::new(&config).build().unwrap()));
        assert_eq!(queue.len().await, 100);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(task) = queue.pop().await {
                    seen.push(task.to_string());
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), 100);
        assert_eq!(unique.len(), 100);
        assert!(queue.is_empty().await);
    }
}
