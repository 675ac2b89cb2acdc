//! Tests for match conditions.

use std::cell::Cell;

use base64::Engine;
use serde_json::json;

use super::*;
use crate::document::{Document, LazyBody};
use crate::schema::RecordMd;
use crate::Error;

fn md(rowid: u64) -> RecordMd {
    RecordMd {
        rowid,
        t: 1_000 + rowid,
        tm: 2_000 + rowid,
        user_flag: 0,
        system_flag: 0,
        key: format!("dev-{}", rowid),
    }
}

fn decide(cond: &MatchCondition, md: &RecordMd, body: Document) -> Decision {
    let filter = cond.compile(100).unwrap();
    filter.evaluate(md, &mut LazyBody::loaded(body)).unwrap()
}

#[test]
fn test_empty_condition_keeps_everything() {
    let cond = MatchCondition::default();
    assert!(cond.is_empty());
    for rowid in [1, 50, 100, 1_000] {
        assert_eq!(decide(&cond, &md(rowid), json!({})), Decision::Keep);
    }
}

#[test]
fn test_only_md_does_not_count_as_criterion() {
    let cond = MatchCondition {
        only_md: true,
        ..Default::default()
    };
    assert!(cond.is_empty());
    assert!(!cond.needs_body());
    assert!(!cond.compile(10).unwrap().needs_body());

    let searching = MatchCondition {
        search_content_key: Some("msg".to_string()),
        ..cond.clone()
    };
    assert!(searching.needs_body());
    assert!(MatchCondition::default().compile(10).unwrap().needs_body());
}

#[test]
fn test_relative_rowid_resolution() {
    let cond = MatchCondition {
        from_rowid: Some(-10),
        ..Default::default()
    };
    let filter = cond.compile(100).unwrap();
    assert_eq!(filter.from_rowid(), Some(90));

    let keep = |rowid| {
        filter
            .evaluate(&md(rowid), &mut LazyBody::loaded(json!({})))
            .unwrap()
    };
    assert_eq!(keep(89), Decision::Skip);
    assert_eq!(keep(90), Decision::Keep);
    assert_eq!(keep(100), Decision::Keep);
}

#[test]
fn test_relative_rowid_saturates_at_zero() {
    assert_eq!(resolve_rowid(-500, 100), 0);
    assert_eq!(resolve_rowid(0, 100), 0);
    assert_eq!(resolve_rowid(7, 100), 7);
}

#[test]
fn test_stop_past_upper_rowid() {
    let cond = MatchCondition {
        to_rowid: Some(-1),
        ..Default::default()
    };
    assert_eq!(decide(&cond, &md(99), json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &md(100), json!({})), Decision::Stop);
}

#[test]
fn test_time_bounds_are_inclusive() {
    let cond = MatchCondition {
        from_t: Some(1_010),
        to_t: Some(1_020),
        ..Default::default()
    };
    assert_eq!(decide(&cond, &md(9), json!({})), Decision::Skip);
    assert_eq!(decide(&cond, &md(10), json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &md(20), json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &md(21), json!({})), Decision::Skip);

    let cond = MatchCondition {
        from_tm: Some(2_005),
        to_tm: Some(2_005),
        ..Default::default()
    };
    assert_eq!(decide(&cond, &md(5), json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &md(6), json!({})), Decision::Skip);
}

#[test]
fn test_user_flag_mask_law() {
    let cond = MatchCondition {
        user_flag_mask_set: Some(0b101),
        user_flag_mask_notset: Some(0b010),
        ..Default::default()
    };
    let with_flag = |flag| RecordMd {
        user_flag: flag,
        ..md(1)
    };
    assert_eq!(decide(&cond, &with_flag(0b101), json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &with_flag(0b111), json!({})), Decision::Skip);
    assert_eq!(decide(&cond, &with_flag(0b100), json!({})), Decision::Skip);
}

#[test]
fn test_system_flag_mask() {
    let cond = MatchCondition {
        system_flag_mask_set: Some(1 << 40),
        ..Default::default()
    };
    let record = RecordMd {
        system_flag: (1 << 40) | 1,
        ..md(1)
    };
    assert_eq!(decide(&cond, &record, json!({})), Decision::Keep);
    assert_eq!(decide(&cond, &md(1), json!({})), Decision::Skip);
}

#[test]
fn test_key_criteria() {
    let key = MatchCondition {
        key: Some("dev-3".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&key, &md(3), json!({})), Decision::Keep);
    assert_eq!(decide(&key, &md(4), json!({})), Decision::Skip);

    let notkey = MatchCondition {
        notkey: Some("dev-3".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&notkey, &md(3), json!({})), Decision::Skip);
    assert_eq!(decide(&notkey, &md(4), json!({})), Decision::Keep);

    let rkey = MatchCondition {
        rkey: Some("^dev-[0-4]$".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&rkey, &md(4), json!({})), Decision::Keep);
    assert_eq!(decide(&rkey, &md(14), json!({})), Decision::Skip);
}

#[test]
fn test_invalid_rkey_fails_at_compile() {
    let cond = MatchCondition {
        rkey: Some("dev-(".to_string()),
        ..Default::default()
    };
    assert!(matches!(cond.compile(10), Err(Error::InvalidFilter(_))));
}

#[test]
fn test_content_filter_names() {
    assert_eq!("".parse::<ContentFilter>().unwrap(), ContentFilter::Clear);
    assert_eq!("clear".parse::<ContentFilter>().unwrap(), ContentFilter::Clear);
    assert_eq!("base64".parse::<ContentFilter>().unwrap(), ContentFilter::Base64);
    assert!(matches!(
        "gzip".parse::<ContentFilter>(),
        Err(Error::InvalidFilter(_))
    ));
}

#[test]
fn test_base64_content_search() {
    let encoded = base64::engine::general_purpose::STANDARD.encode("hello world");
    let body = json!({"data": encoded});
    let search = |text: &str| MatchCondition {
        search_content_key: Some("data".to_string()),
        search_content_filter: ContentFilter::Base64,
        search_content_text: Some(text.to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&search("world"), &md(1), body.clone()), Decision::Keep);
    assert_eq!(decide(&search("xyz"), &md(1), body), Decision::Skip);
}

#[test]
fn test_base64_decode_failure_skips() {
    let cond = MatchCondition {
        search_content_key: Some("data".to_string()),
        search_content_filter: ContentFilter::Base64,
        search_content_text: Some("a".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&cond, &md(1), json!({"data": "%%%"})), Decision::Skip);
}

#[test]
fn test_clear_content_search() {
    let cond = |text: &str| MatchCondition {
        search_content_key: Some("msg".to_string()),
        search_content_text: Some(text.to_string()),
        ..Default::default()
    };
    let body = json!({"msg": "Alarm raised"});
    assert_eq!(decide(&cond("Alarm"), &md(1), body.clone()), Decision::Keep);
    assert_eq!(decide(&cond("alarm"), &md(1), body.clone()), Decision::Skip);
    assert_eq!(decide(&cond(""), &md(1), body), Decision::Keep);
    assert_eq!(decide(&cond(""), &md(1), json!({"other": 1})), Decision::Skip);
}

#[test]
fn test_content_search_on_nested_non_string() {
    let cond = MatchCondition {
        search_content_key: Some("gps.sats".to_string()),
        search_content_text: Some("12".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&cond, &md(1), json!({"gps": {"sats": 12}})), Decision::Keep);
}

#[test]
fn test_structural_filter() {
    let cond = MatchCondition::default()
        .with_filter_json(r#"{"kind": "alarm", "tags": ["b", "a"]}"#)
        .unwrap();
    let body = json!({"id": 7, "tags": ["a", "b"], "kind": "alarm"});
    assert_eq!(decide(&cond, &md(1), body), Decision::Keep);
    let body = json!({"id": 7, "tags": ["a"], "kind": "alarm"});
    assert_eq!(decide(&cond, &md(1), body), Decision::Skip);
    assert_eq!(decide(&cond, &md(1), json!({"kind": "alarm"})), Decision::Skip);
}

#[test]
fn test_filter_must_be_object() {
    let err = MatchCondition::default().with_filter_json("[1, 2]");
    assert!(matches!(err, Err(Error::InvalidFilter(_))));
    let err = MatchCondition::default().with_filter_json("{not json");
    assert!(matches!(err, Err(Error::InvalidFilter(_))));

    let cond = MatchCondition {
        filter: Some(json!("text")),
        ..Default::default()
    };
    assert!(matches!(cond.compile(0), Err(Error::InvalidFilter(_))));
}

#[test]
fn test_conjunction_law() {
    let body = json!({"msg": "door open"});
    let record = RecordMd {
        user_flag: 0b1,
        ..md(42)
    };
    let passing = [
        MatchCondition { from_rowid: Some(40), ..Default::default() },
        MatchCondition { to_t: Some(1_042), ..Default::default() },
        MatchCondition { user_flag_mask_set: Some(1), ..Default::default() },
        MatchCondition { key: Some("dev-42".to_string()), ..Default::default() },
        MatchCondition { from_tm: Some(2_042), ..Default::default() },
        MatchCondition {
            search_content_key: Some("msg".to_string()),
            search_content_text: Some("open".to_string()),
            ..Default::default()
        },
    ];
    let failing = [
        MatchCondition { from_rowid: Some(43), ..Default::default() },
        MatchCondition { to_t: Some(1_041), ..Default::default() },
        MatchCondition { user_flag_mask_notset: Some(1), ..Default::default() },
        MatchCondition { notkey: Some("dev-42".to_string()), ..Default::default() },
        MatchCondition { from_tm: Some(2_043), ..Default::default() },
        MatchCondition {
            search_content_key: Some("msg".to_string()),
            search_content_text: Some("closed".to_string()),
            ..Default::default()
        },
    ];

    for cond in &passing {
        assert_eq!(decide(cond, &record, body.clone()), Decision::Keep, "{:?}", cond);
    }
    for cond in &failing {
        assert_eq!(decide(cond, &record, body.clone()), Decision::Skip, "{:?}", cond);
    }

    let all = MatchCondition {
        from_rowid: Some(40),
        to_t: Some(1_042),
        user_flag_mask_set: Some(1),
        key: Some("dev-42".to_string()),
        from_tm: Some(2_042),
        search_content_key: Some("msg".to_string()),
        search_content_text: Some("open".to_string()),
        ..Default::default()
    };
    assert_eq!(decide(&all, &record, body.clone()), Decision::Keep);

    for broken in &failing {
        let broken = serde_json::to_value(broken).unwrap();
        let mut merged = serde_json::to_value(&all).unwrap();
        for (k, v) in broken.as_object().unwrap() {
            merged[k] = v.clone();
        }
        let combined: MatchCondition = serde_json::from_value(merged).unwrap();
        assert_eq!(decide(&combined, &record, body.clone()), Decision::Skip);
    }
}

#[test]
fn test_body_not_loaded_when_metadata_fails() {
    let cond = MatchCondition {
        key: Some("other".to_string()),
        search_content_key: Some("msg".to_string()),
        ..Default::default()
    };
    let filter = cond.compile(10).unwrap();
    let loads = Cell::new(0);
    let mut body = LazyBody::new(|| {
        loads.set(loads.get() + 1);
        Ok(json!({"msg": "x"}))
    });
    assert_eq!(filter.evaluate(&md(1), &mut body).unwrap(), Decision::Skip);
    drop(body);
    assert_eq!(loads.get(), 0);
}

#[test]
fn test_body_load_error_propagates() {
    let cond = MatchCondition {
        search_content_key: Some("msg".to_string()),
        ..Default::default()
    };
    let filter = cond.compile(10).unwrap();
    let mut body = LazyBody::new(|| Err(Error::Storage("truncated record".to_string())));
    assert!(matches!(
        filter.evaluate(&md(1), &mut body),
        Err(Error::Storage(_))
    ));
}

#[test]
fn test_condition_serializes_compactly() {
    let cond = MatchCondition {
        from_rowid: Some(-5),
        search_content_filter: ContentFilter::Base64,
        ..Default::default()
    };
    let value = serde_json::to_value(&cond).unwrap();
    assert_eq!(value, json!({"from_rowid": -5, "search_content_filter": "base64"}));
    let back: MatchCondition = serde_json::from_value(value).unwrap();
    assert_eq!(back, cond);
}
