use mockito::{Matcher, ServerGuard};
use olog::config::Config;
use olog::{ClientConfig, LogRequest, OlogError, Property, SearchQuery, SimpleClient};
use serde_json::json;

fn simple(server: &ServerGuard) -> SimpleClient {
    SimpleClient::new(
        ClientConfig::new()
            .url(format!("{}/Olog", server.url()))
            .anonymous()
            .config(Config::default()),
    )
    .unwrap()
}

fn known_names(server: &mut ServerGuard) {
    server
        .mock("GET", "/Olog/resources/logbooks")
        .with_body(json!({"logbook": [
            {"name": "Operations", "owner": "ops"},
            {"name": "Controls", "owner": null}
        ]}).to_string())
        .create();
    server
        .mock("GET", "/Olog/resources/tags")
        .with_body(json!({"tag": [{"name": "RF", "state": "Active"}]}).to_string())
        .create();
}

fn created(id: u64) -> String {
    json!([{
        "id": id,
        "description": "t",
        "owner": null,
        "logbooks": [],
        "tags": [],
        "properties": [],
        "createdDate": null,
        "modifiedDate": null
    }])
    .to_string()
}

#[test]
fn names_are_listed_as_plain_strings() {
    let mut server = mockito::Server::new();
    known_names(&mut server);
    let c = simple(&server);
    assert_eq!(c.logbooks().unwrap(), vec!["Operations", "Controls"]);
    assert_eq!(c.tags().unwrap(), vec!["RF"]);
}

#[test]
fn unknown_logbook_is_rejected_before_posting() {
    let mut server = mockito::Server::new();
    known_names(&mut server);
    let post = server.mock("POST", "/Olog/resources/logs").expect(0).create();

    let err = simple(&server)
        .log(LogRequest::new("hello").logbook("Operations").logbook("Ghost"))
        .unwrap_err();
    match err {
        OlogError::Usage(msg) => assert!(msg.contains("Ghost")),
        other => panic!("unexpected error {other:?}"),
    }
    post.assert();
}

#[test]
fn unknown_tag_is_rejected_before_posting() {
    let mut server = mockito::Server::new();
    known_names(&mut server);
    let post = server.mock("POST", "/Olog/resources/logs").expect(0).create();
    let err = simple(&server).log(LogRequest::new("hello").tag("Nope")).unwrap_err();
    assert!(matches!(err, OlogError::Usage(_)));
    post.assert();
}

#[test]
fn verified_entry_is_posted_with_plain_names() {
    let mut server = mockito::Server::new();
    known_names(&mut server);
    let post = server
        .mock("POST", "/Olog/resources/logs")
        .match_body(Matcher::Json(json!([{
            "description": "Shift handover",
            "owner": null,
            "level": "Info",
            "logbooks": [{"name": "Operations", "owner": null}],
            "tags": [{"name": "RF", "state": "Active"}],
            "properties": [{"name": "shift", "attributes": {"crew": "B"}}]
        }])))
        .with_status(201)
        .with_body(created(55))
        .expect(1)
        .create();

    let entry = simple(&server)
        .log(
            LogRequest::new("Shift handover")
                .logbook("Operations")
                .tag("RF")
                .property(Property::new("shift").attribute("crew", "B")),
        )
        .unwrap();
    assert_eq!(entry.id(), Some(55));
    post.assert();
}

#[test]
fn unverified_entry_skips_the_name_lookups() {
    let mut server = mockito::Server::new();
    let lookups = server.mock("GET", Matcher::Any).expect(0).create();
    let post = server
        .mock("POST", "/Olog/resources/logs")
        .with_status(201)
        .with_body(created(3))
        .expect(1)
        .create();
    simple(&server)
        .log(LogRequest::new("x").logbook("Anything").verify(false))
        .unwrap();
    lookups.assert();
    post.assert();
}

#[test]
fn two_delete_selectors_fail_without_a_request() {
    let mut server = mockito::Server::new();
    let any = server.mock("DELETE", Matcher::Any).expect(0).create();
    let err = simple(&server)
        .delete(&[("logbookName", "A"), ("tagName", "B")])
        .unwrap_err();
    assert!(matches!(err, OlogError::Usage(_)));
    any.assert();
}

#[test]
fn single_delete_selector_hits_the_trimmed_path() {
    let mut server = mockito::Server::new();
    let m = server.mock("DELETE", "/Olog/resources/logbooks/X").expect(1).create();
    simple(&server).delete(&[("logbookName", " X ")]).unwrap();
    m.assert();
}

#[test]
fn find_returns_flattened_summaries() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/Olog/resources/logs")
        .match_query(Matcher::UrlEncoded("search".into(), "*Timing*".into()))
        .with_body(
            json!([{
                "id": 12,
                "description": "Timing system reset",
                "owner": "swilkins",
                "logbooks": [{"name": "Controls", "owner": null}],
                "tags": [{"name": "Timing", "state": "Active"}],
                "properties": [{"name": "ticket", "attributes": {"id": 881}}],
                "createdDate": 1_600_000_000_000i64,
                "modifiedDate": 1_600_000_000_000i64
            }])
            .to_string(),
        )
        .create();

    let found = simple(&server).find(&SearchQuery::new().search("*Timing*")).unwrap();
    assert_eq!(found.len(), 1);
    let s = &found[0];
    assert_eq!(s.id, 12);
    assert_eq!(s.logbooks, vec!["Controls"]);
    assert_eq!(s.tags, vec!["Timing"]);
    assert_eq!(s.properties["ticket"]["id"], "881");
    assert_eq!(s.owner.as_deref(), Some("swilkins"));
}
