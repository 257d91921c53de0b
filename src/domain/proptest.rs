//! Property-Based Tests for Query Normalization
//!
//! # Test Properties
//!
//! 1. **Trim Once**: surrounding whitespace never reaches a key
//! 2. **Shared Identity**: both tier keys embed the same normalized query
//! 3. **Blank Rejection**: whitespace-only input never becomes a query

#![cfg(test)]

use proptest::prelude::*;

use super::ports::{CacheKey, SearchQuery};

/// Whitespace padding of arbitrary shape.
fn padding_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec![' ', '\t', '\n', '\r']), 0..6)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Query bodies that start and end with a visible character.
fn body_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9(][A-Za-z0-9 _(),.-]{0,40}[A-Za-z0-9)]|[A-Za-z0-9]"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_padding_does_not_change_keys(
        body in body_strategy(),
        left in padding_strategy(),
        right in padding_strategy(),
    ) {
        let padded = format!("{}{}{}", left, body, right);
        let bare = SearchQuery::parse(&body).unwrap();
        let query = SearchQuery::parse(&padded).unwrap();

        prop_assert_eq!(&query, &bare);
        prop_assert_eq!(
            CacheKey::derive("wikipedia", &query),
            CacheKey::derive("wikipedia", &bare)
        );
    }

    #[test]
    fn prop_tier_keys_share_the_query(body in body_strategy(), ns in "[a-z]{1,12}") {
        let query = SearchQuery::parse(&body).unwrap();
        let key = CacheKey::derive(&ns, &query);

        prop_assert_eq!(key.fast().strip_prefix(&format!("{}:", ns)), Some(query.as_str()));
        prop_assert_eq!(key.durable().strip_prefix(&format!("{}-", ns)), Some(query.as_str()));
    }

    #[test]
    fn prop_whitespace_only_is_rejected(blank in padding_strategy()) {
        prop_assert!(SearchQuery::parse(&blank).is_err());
    }
}
