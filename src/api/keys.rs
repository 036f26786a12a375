//! Cache key construction.
//!
//! Query parameters are sorted before they are joined, so two filters that
//! differ only in parameter order share one cache entry.

pub const TASK_LIST_PREFIX: &str = "tasks_list_";
pub const TASK_SEARCH_PREFIX: &str = "tasks_search_";
pub const TASK_ITEM_PREFIX: &str = "task_item_";
pub const TASK_STATS_KEY: &str = "tasks_stats";
pub const USER_PROFILE_KEY: &str = "user_profile";

/// Stable `k=v&k=v` rendering of `pairs`; `all` when empty.
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "all".to_string();
    }
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort();
    sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn task_list_key(query: &[(String, String)]) -> String {
    format!("{TASK_LIST_PREFIX}{}", canonical_query(query))
}

pub fn task_search_key(query: &[(String, String)]) -> String {
    format!("{TASK_SEARCH_PREFIX}{}", canonical_query(query))
}

pub fn task_item_key(id: &str) -> String {
    format!("{TASK_ITEM_PREFIX}{id}")
}

/// True for keys holding task collections (lists and searches).
pub fn is_task_collection_key(key: &str) -> bool {
    key.starts_with(TASK_LIST_PREFIX) || key.starts_with(TASK_SEARCH_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // Verifies parameter order does not change the key.
    #[test]
    fn keys_are_order_independent() {
        let a = task_list_key(&pairs(&[("status", "active"), ("page", "2")]));
        let b = task_list_key(&pairs(&[("page", "2"), ("status", "active")]));
        assert_eq!(a, b);
        assert_eq!(a, "tasks_list_page=2&status=active");
        assert_eq!(task_list_key(&[]), "tasks_list_all");
    }

    // Verifies collection keys are recognised and item keys are not.
    #[test]
    fn collection_predicate_matches_lists_and_searches() {
        assert!(is_task_collection_key(&task_list_key(&[])));
        assert!(is_task_collection_key(&task_search_key(&pairs(&[("q", "milk")]))));
        assert!(!is_task_collection_key(&task_item_key("42")));
        assert!(!is_task_collection_key(TASK_STATS_KEY));
    }

    #[cfg(feature = "fuzz-tests")]
    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_permutation_yields_same_key(
                mut items in proptest::collection::vec(("[a-z]{1,6}", "[a-z0-9]{0,6}"), 0..6)
            ) {
                let original = task_list_key(&items);
                items.reverse();
                prop_assert_eq!(original, task_list_key(&items));
            }
        }
    }
}
