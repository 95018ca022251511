//! Identifier set parsing

use order_fetcher::identifier::{IdSet, IdentifierError};
use order_fetcher::OrderId;

#[test]
fn test_default_range() {
    let ids = IdSet::parse("1-1000").unwrap();
    assert_eq!(ids.len(), 1000);
    let ids = ids.into_vec();
    assert_eq!(ids.first(), Some(&OrderId::new(1)));
    assert_eq!(ids.last(), Some(&OrderId::new(1000)));
}

#[test]
fn test_mixed_ranges_and_lists() {
    let ids = IdSet::parse(" 1-3, 7 ,10-11").unwrap().into_vec();
    let raw: Vec<u64> = ids.iter().map(|id| id.get()).collect();
    assert_eq!(raw, vec![1, 2, 3, 7, 10, 11]);
}

#[test]
fn test_overlaps_are_deduplicated() {
    let ids = IdSet::parse("1-5,3-7,5").unwrap();
    assert_eq!(ids.len(), 7);
}

#[test]
fn test_invalid_inputs() {
    assert!(matches!(IdSet::parse(""), Err(IdentifierError::Empty)));
    assert!(matches!(
        IdSet::parse("9-2"),
        Err(IdentifierError::ReversedRange { start: 9, end: 2 })
    ));
    assert!(IdSet::parse("abc").is_err());
    assert!(IdSet::parse("1,,2").is_err());
    assert!(IdSet::parse("-5").is_err());
    assert!(matches!(
        IdSet::parse("1-100000000"),
        Err(IdentifierError::TooMany(_))
    ));
}
