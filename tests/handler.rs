use mockito::Matcher;
use olog::config::Config;
use olog::handler::OlogLayer;
use olog::{ClientConfig, SimpleClient};
use serde_json::json;
use tracing_subscriber::prelude::*;

#[test]
fn warnings_become_log_entries_and_debug_is_dropped() {
    let mut server = mockito::Server::new();
    let post = server
        .mock("POST", "/Olog/resources/logs")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""description":"WARN handler: vacuum tripped sector=4""#.into()),
            Matcher::Regex(r#""logbooks":\[\{"name":"Operations""#.into()),
        ]))
        .with_status(201)
        .with_body(
            json!([{
                "id": 1, "description": "", "owner": null, "logbooks": [], "tags": [],
                "properties": [], "createdDate": null, "modifiedDate": null
            }])
            .to_string(),
        )
        .expect(1)
        .create();

    let client = SimpleClient::new(
        ClientConfig::new()
            .url(format!("{}/Olog", server.url()))
            .anonymous()
            .config(Config::default()),
    )
    .unwrap();
    let layer = OlogLayer::new(client)
        .logbooks(["Operations"])
        .tags(["alarms"])
        .min_level(tracing::Level::WARN);

    tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
        tracing::debug!("not interesting");
        tracing::info!("still not interesting");
        tracing::warn!(sector = 4, "vacuum tripped");
    });
    post.assert();
}

#[test]
fn events_from_the_client_itself_are_not_posted() {
    let mut server = mockito::Server::new();
    let post = server
        .mock("POST", "/Olog/resources/logs")
        .match_body(Matcher::Regex(r#""description":"INFO handler: beam on""#.into()))
        .with_status(201)
        .with_body(
            json!([{
                "id": 2, "description": "", "owner": null, "logbooks": [], "tags": [],
                "properties": [], "createdDate": null, "modifiedDate": null
            }])
            .to_string(),
        )
        .expect(1)
        .create();
    let settings = || {
        ClientConfig::new()
            .url(format!("{}/Olog", server.url()))
            .anonymous()
            .config(Config::default())
    };

    let layer = OlogLayer::new(SimpleClient::new(settings()).unwrap()).min_level(tracing::Level::DEBUG);
    tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
        // Building a client logs the base URL and auth mode under `olog::api`.
        let _other = olog::OlogClient::new(settings()).unwrap();
        tracing::info!(target: "olog::simple", "internal detail");
        // Posting this one logs `log entry created` while the layer is busy.
        tracing::info!("beam on");
    });
    post.assert();
}
