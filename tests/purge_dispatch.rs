//! End-to-end purge dispatch against mocked identity and CDN management endpoints.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;

use soffio_cdn_purge::{
    AccessToken, CdnSettings, ContentItem, CredentialProvider, InfraError, PathGenerator,
    PurgeDispatcher, RawCdnSettings, SitePathGenerator, TokenRequest,
};

const TOKEN_PATH: &str = "/tenant/oauth2/token";
const PURGE_PATH: &str = "/subscriptions/sub-123/resourceGroups/publishing/providers/Microsoft.Cdn\
                          /profiles/soffio-cdn/endpoints/soffio-edge/purge";

fn settings(server: &MockServer) -> CdnSettings {
    CdnSettings::from_raw(RawCdnSettings {
        authority: Some(server.url("/tenant")),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        subscription_id: Some("sub-123".to_string()),
        resource_group: Some("publishing".to_string()),
        profile: Some("soffio-cdn".to_string()),
        endpoint: Some("soffio-edge".to_string()),
        management_url: Some(server.base_url()),
        ..Default::default()
    })
    .expect("valid settings")
}

fn token_mock(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200).json_body(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "mgmt-token"
        }));
    })
}

/// Generator returning canned paths per item label.
struct CannedPaths;

impl PathGenerator for CannedPaths {
    type Item = &'static str;

    fn paths(&self, item: &Self::Item) -> Vec<String> {
        let paths: &[&str] = match *item {
            "A" => &["/a", "/"],
            "B" => &["/a", "/b"],
            "root-only" => &["/"],
            _ => &[],
        };
        paths.iter().map(|path| path.to_string()).collect()
    }
}

/// Credential stub that counts how often it is asked for a token.
#[derive(Default)]
struct CountingCredentials {
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn acquire_token(&self, request: TokenRequest<'_>) -> Result<AccessToken, InfraError> {
        assert_eq!(request.client_id, "client");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new("stub-token"))
    }
}

#[tokio::test]
async fn empty_input_makes_no_remote_calls() -> Result<(), InfraError> {
    let server = MockServer::start();
    let token = token_mock(&server);
    let purge = server.mock(|when, then| {
        when.method(POST).path(PURGE_PATH);
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    dispatcher.purge(&[]).await?;

    token.assert_hits(0);
    purge.assert_hits(0);
    assert!(!dispatcher.is_connected());
    Ok(())
}

#[tokio::test]
async fn duplicates_and_root_are_filtered_before_dispatch() -> Result<(), InfraError> {
    let server = MockServer::start();
    let token = token_mock(&server);
    let purge = server.mock(|when, then| {
        when.method(POST)
            .path(PURGE_PATH)
            .query_param("api-version", "2019-04-15")
            .header("authorization", "Bearer mgmt-token")
            .json_body(json!({ "contentPaths": ["/a", "/b"] }));
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    dispatcher.purge(&["A", "B"]).await?;

    token.assert();
    purge.assert();
    Ok(())
}

#[tokio::test]
async fn fully_filtered_input_still_dispatches_an_empty_list() -> Result<(), InfraError> {
    let server = MockServer::start();
    let _token = token_mock(&server);
    let purge = server.mock(|when, then| {
        when.method(POST)
            .path(PURGE_PATH)
            .json_body(json!({ "contentPaths": [] }));
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    dispatcher.purge(&["root-only", "unknown"]).await?;

    purge.assert();
    Ok(())
}

#[tokio::test]
async fn client_is_built_once_across_purges() -> Result<(), InfraError> {
    let server = MockServer::start();
    let token = token_mock(&server);
    let purge = server.mock(|when, then| {
        when.method(POST).path(PURGE_PATH);
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    for _ in 0..3 {
        dispatcher.purge(&["B"]).await?;
    }

    token.assert_hits(1);
    purge.assert_hits(3);
    assert!(dispatcher.is_connected());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_purges_share_one_authentication() -> Result<(), InfraError> {
    let server = MockServer::start();
    let purge = server.mock(|when, then| {
        when.method(POST)
            .path(PURGE_PATH)
            .header("authorization", "Bearer stub-token");
        then.status(202);
    });

    let credentials = Arc::new(CountingCredentials::default());
    let dispatcher = Arc::new(PurgeDispatcher::with_parts(
        CannedPaths,
        settings(&server),
        credentials.clone(),
        reqwest::Client::new(),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.purge(&["A"]).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("purge task panicked")?;
    }

    assert_eq!(credentials.calls.load(Ordering::SeqCst), 1);
    purge.assert_hits(8);
    Ok(())
}

#[tokio::test]
async fn authentication_failure_propagates_and_is_retried_next_time() -> Result<(), InfraError> {
    let server = MockServer::start();
    let mut rejected = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(401).body(r#"{"error":"invalid_client"}"#);
    });
    let purge = server.mock(|when, then| {
        when.method(POST).path(PURGE_PATH);
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    let err = dispatcher
        .purge(&["B"])
        .await
        .expect_err("rejected credentials must fail");
    assert!(matches!(err, InfraError::Authentication { .. }));
    assert!(!dispatcher.is_connected());
    purge.assert_hits(0);

    rejected.delete();
    let token = token_mock(&server);
    dispatcher.purge(&["B"]).await?;

    token.assert();
    purge.assert();
    Ok(())
}

#[tokio::test]
async fn remote_failure_propagates_unchanged() -> Result<(), InfraError> {
    let server = MockServer::start();
    let _token = token_mock(&server);
    server.mock(|when, then| {
        when.method(POST).path(PURGE_PATH);
        then.status(400).body(r#"{"error":{"code":"BadRequest"}}"#);
    });

    let dispatcher = PurgeDispatcher::new(CannedPaths, settings(&server))?;
    let err = dispatcher
        .purge(&["A"])
        .await
        .expect_err("400 must fail");

    match err {
        InfraError::Remote { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("BadRequest"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn site_content_purges_its_public_routes() -> Result<(), InfraError> {
    let server = MockServer::start();
    let credentials = Arc::new(CountingCredentials::default());
    let purge = server.mock(|when, then| {
        when.method(POST).path(PURGE_PATH).json_body(json!({
            "contentPaths": [
                "/posts/hello-world",
                "/tags/rust",
                "/months/2025-03",
                "/rss.xml",
                "/atom.xml",
                "/sitemap.xml",
                "/about"
            ]
        }));
        then.status(202);
    });

    let dispatcher = PurgeDispatcher::with_parts(
        SitePathGenerator,
        settings(&server),
        credentials,
        reqwest::Client::new(),
    );
    let items = [
        ContentItem::post("hello-world")
            .with_tags(["rust"])
            .in_month("2025-03"),
        ContentItem::page("about"),
        ContentItem::SiteSettings,
    ];
    dispatcher.purge(&items).await?;

    purge.assert();
    Ok(())
}
