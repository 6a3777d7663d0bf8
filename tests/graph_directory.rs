mod common;

use std::sync::atomic::Ordering;

use cid_tagger::CidError;
use cid_tagger::directory::{GraphDirectory, ResolutionMode, Resolver};
use common::{FakeGraph, FixedToken, filtered_addresses, item, register_handler};
use serde_json::json;

fn live_resolver(graph: &FakeGraph, token: FixedToken) -> Resolver {
    let directory = GraphDirectory::new(&graph.config(), Box::new(token)).unwrap();
    Resolver::with_source(ResolutionMode::Live, Box::new(directory))
}

#[test]
fn resolves_and_merges_rows_by_cid() {
    let graph = FakeGraph::start(register_handler(|_, _| {
        let body = json!({ "value": [
            item("CID-2026-0002", None, "jennifer@watervilleaudiology.com", None),
            item("CID-2026-0002", Some("Waterville Audiology"), "office@watervilleaudiology.com", Some("o'neil@watervilleaudiology.com")),
        ]});
        (200, body.to_string())
    }));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok-1")));

    let matches = resolver
        .resolve_addresses(&["Jennifer@WatervilleAudiology.com", "o'neil@watervilleaudiology.com"])
        .unwrap();

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.cid, "CID-2026-0002");
    assert_eq!(m.display_name.as_deref(), Some("Waterville Audiology"));
    assert_eq!(
        m.matched_addresses.iter().cloned().collect::<Vec<_>>(),
        vec!["jennifer@watervilleaudiology.com", "o'neil@watervilleaudiology.com"]
    );

    let seen = graph.seen();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|r| r.authorization.as_deref() == Some("Bearer tok-1")));

    let query = &seen[2];
    assert_eq!(query.param("$expand"), Some("fields"));
    let filter = query.param("$filter").unwrap();
    assert!(filter.contains("fields/Client_x0020_Email eq 'o''neil@watervilleaudiology.com'"));
    assert!(filter.contains("fields/Client_x0020_Email_x0020_2 eq 'o''neil@watervilleaudiology.com'"));
    assert!(!filter.contains("eq 'o'neil"));
}

#[test]
fn batches_share_one_credential_and_one_container_lookup() {
    let graph = FakeGraph::start(register_handler(|req, _| {
        let rows: Vec<_> = filtered_addresses(req)
            .iter()
            .map(|a| item("CID-2026-0100", None, a, None))
            .collect();
        (200, json!({ "value": rows }).to_string())
    }));
    let token = FixedToken::new(Some("tok"));
    let calls = token.calls.clone();
    let resolver = live_resolver(&graph, token);

    let input: Vec<String> = (0..25).map(|i| format!("user{i:02}@contoso.com")).collect();
    let matches = resolver.resolve_addresses(&input).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let seen = graph.seen();
    let item_queries: Vec<_> = seen.iter().filter(|r| r.path.ends_with("/items")).collect();
    assert_eq!(seen.len() - item_queries.len(), 2);
    let batch_sizes: Vec<usize> = item_queries.iter().map(|r| filtered_addresses(r).len()).collect();
    assert_eq!(batch_sizes, vec![10, 10, 5]);

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_addresses.len(), 25);
}

#[test]
fn next_links_are_followed() {
    let graph = FakeGraph::start(register_handler(|req, base| {
        if req.param("page") == Some("2") {
            let body = json!({ "value": [item("CID-2026-0003", Some("Realty"), "b@x.com", None)] });
            return (200, body.to_string());
        }
        let body = json!({
            "value": [item("CID-2026-0001", None, "a@x.com", None)],
            "@odata.nextLink": format!("{base}/sites/site-1/lists/list-1/items?page=2"),
        });
        (200, body.to_string())
    }));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok")));

    let matches = resolver.resolve_addresses(&["a@x.com", "b@x.com"]).unwrap();
    let cids: Vec<&str> = matches.iter().map(|m| m.cid.as_str()).collect();
    assert_eq!(cids, vec!["CID-2026-0001", "CID-2026-0003"]);
}

#[test]
fn rows_without_cid_are_ignored() {
    let graph = FakeGraph::start(register_handler(|_, _| {
        let body = json!({ "value": [
            { "id": "1", "fields": { "Client_x0020_Email": "a@x.com" } },
            { "id": "2" },
            item("CID-2026-0001", None, "a@x.com", None),
        ]});
        (200, body.to_string())
    }));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok")));

    let matches = resolver.resolve_addresses(&["a@x.com"]).unwrap();
    assert_eq!(matches.len(), 1);
}

#[test]
fn missing_credential_fails_before_any_request() {
    let graph = FakeGraph::start(register_handler(|_, _| (200, r#"{"value":[]}"#.into())));
    let resolver = live_resolver(&graph, FixedToken::new(None));

    let err = resolver.resolve_addresses(&["a@x.com"]).unwrap_err();
    assert!(matches!(err, CidError::Authentication(_)));
    assert!(graph.seen().is_empty());
}

#[test]
fn empty_input_makes_no_calls() {
    let graph = FakeGraph::start(register_handler(|_, _| (200, r#"{"value":[]}"#.into())));
    let token = FixedToken::new(Some("tok"));
    let calls = token.calls.clone();
    let resolver = live_resolver(&graph, token);

    assert!(resolver.resolve_addresses::<&str>(&[]).unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(graph.seen().is_empty());
}

#[test]
fn unknown_site_is_directory_unavailable() {
    let graph = FakeGraph::start(|_, _| (404, r#"{"error":{"code":"itemNotFound"}}"#.into()));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok")));

    let err = resolver.resolve_addresses(&["a@x.com"]).unwrap_err();
    match err {
        CidError::DirectoryUnavailable(msg) => assert!(msg.contains("404")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_list_is_directory_unavailable() {
    let graph = FakeGraph::start(register_handler(|_, _| (200, r#"{"value":[]}"#.into())));
    let mut cfg = graph.config();
    cfg.contacts_list_name = "Old Register".into();
    let directory = GraphDirectory::new(&cfg, Box::new(FixedToken::new(Some("tok")))).unwrap();
    let resolver = Resolver::with_source(ResolutionMode::Live, Box::new(directory));

    let err = resolver.resolve_addresses(&["a@x.com"]).unwrap_err();
    match err {
        CidError::DirectoryUnavailable(msg) => assert!(msg.contains("Old Register")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(graph.seen().iter().all(|r| !r.path.ends_with("/items")));
}

#[test]
fn forbidden_query_is_a_query_error() {
    let graph = FakeGraph::start(register_handler(|_, _| (403, "denied".into())));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok")));

    let err = resolver.resolve_addresses(&["a@x.com"]).unwrap_err();
    match err {
        CidError::Query { status, message } => {
            assert_eq!(status, 403);
            assert!(message.starts_with("Authentication failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn server_error_message_is_truncated() {
    let body = "x".repeat(500);
    let graph = FakeGraph::start(register_handler(move |_, _| (500, body.clone())));
    let resolver = live_resolver(&graph, FixedToken::new(Some("tok")));

    let err = resolver.resolve_addresses(&["a@x.com"]).unwrap_err();
    match err {
        CidError::Query { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message.len(), 100);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unparseable_site_url_is_rejected_up_front() {
    let graph = FakeGraph::start(|_, _| (200, "{}".into()));
    let mut cfg = graph.config();
    cfg.site_url = "not a url".into();
    assert!(matches!(
        GraphDirectory::new(&cfg, Box::new(FixedToken::new(Some("tok")))),
        Err(CidError::Configuration(_))
    ));
}
