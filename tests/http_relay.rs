//! HTTP relay integration tests.

use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use reqwest::header;

mod common;

#[tokio::test]
async fn forwards_method_path_query_body_and_headers() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client()
        .post(proxy.http("/api/items?page=2&sort=desc"))
        .header("x-custom", "abc")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let headers = res.headers().clone();
    assert_eq!(headers["x-echo-method"], "POST");
    assert_eq!(headers["x-echo-uri"], "/api/items?page=2&sort=desc");
    assert_eq!(headers["x-echo-x-custom"], "abc");
    assert_eq!(headers["x-echo-host"], upstream.addr.to_string().as_str());
    assert_eq!(
        headers["x-echo-origin"],
        format!("http://{}", upstream.addr).as_str()
    );
    assert_eq!(headers["x-echo-x-forwarded-for"], "127.0.0.1");
    assert_eq!(headers["x-echo-x-forwarded-proto"], "http");
    assert!(headers.contains_key("x-echo-x-request-id"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "payload");

    proxy.stop().await;
}

#[tokio::test]
async fn caller_origin_is_replaced_and_forwarded_for_is_set() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client()
        .get(proxy.http("/"))
        .header(header::ORIGIN, "https://app.example")
        .header("x-forwarded-for", "10.9.8.7")
        .send()
        .await
        .unwrap();

    assert_eq!(
        res.headers()["x-echo-origin"],
        format!("http://{}", upstream.addr).as_str()
    );
    let forwarded: Vec<_> = res.headers().get_all("x-echo-x-forwarded-for").iter().collect();
    assert_eq!(forwarded, vec!["127.0.0.1"]);

    proxy.stop().await;
}

#[tokio::test]
async fn user_agent_defaults() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;
    let client = common::client();

    let desktop = client.get(proxy.http("/")).send().await.unwrap();
    let ua = desktop.headers()["x-echo-user-agent"].to_str().unwrap().to_string();
    assert!(ua.contains("Windows NT"), "{ua}");

    let mobile = client
        .get(proxy.http("/"))
        .header("sec-ch-ua-mobile", "?1")
        .send()
        .await
        .unwrap();
    let ua = mobile.headers()["x-echo-user-agent"].to_str().unwrap().to_string();
    assert!(ua.contains("Mobile"), "{ua}");

    let own = client
        .get(proxy.http("/"))
        .header(header::USER_AGENT, "custom-agent/1.0")
        .send()
        .await
        .unwrap();
    assert_eq!(own.headers()["x-echo-user-agent"], "custom-agent/1.0");

    proxy.stop().await;
}

#[tokio::test]
async fn redirect_is_returned_not_followed() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client().get(proxy.http("/redirect")).send().await.unwrap();

    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()[header::LOCATION], "/elsewhere");
    assert_eq!(upstream.hits(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn upstream_error_status_is_passed_through_once() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client().get(proxy.http("/status/503")).send().await.unwrap();

    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "upstream said 503");
    assert_eq!(upstream.hits(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn encoded_body_is_relayed_untouched() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client().get(proxy.http("/gzip")).send().await.unwrap();

    assert_eq!(res.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(res.bytes().await.unwrap().as_ref(), common::GZIP_BYTES);

    proxy.stop().await;
}

#[tokio::test]
async fn cors_reflects_request_origin() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client()
        .get(proxy.http("/"))
        .header(header::ORIGIN, "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
    let vary: Vec<_> = res
        .headers()
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(vary.iter().any(|v| v.contains("Origin")), "{vary:?}");

    proxy.stop().await;
}

#[tokio::test]
async fn cors_wildcard_without_origin() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client().get(proxy.http("/")).send().await.unwrap();
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    proxy.stop().await;
}

#[tokio::test]
async fn fixed_cors_answers_preflight_locally() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream.url());
    config.cors.allowed_origin = Some("https://fixed.example".to_string());
    let proxy = common::spawn_proxy(config).await;
    let client = common::client();

    let preflight = client
        .request(reqwest::Method::OPTIONS, proxy.http("/api"))
        .header(header::ORIGIN, "https://app.example")
        .header("access-control-request-method", "PUT")
        .send()
        .await
        .unwrap();

    assert_eq!(preflight.status(), 204);
    assert!(preflight.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert!(preflight.headers().contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    assert_eq!(upstream.hits(), 0);

    let res = client.get(proxy.http("/api")).send().await.unwrap();
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://fixed.example");
    assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert_eq!(upstream.hits(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn reflect_mode_forwards_options() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let res = common::client()
        .request(reqwest::Method::OPTIONS, proxy.http("/api"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["x-echo-method"], "OPTIONS");
    assert_eq!(upstream.hits(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let dead = common::dead_addr().await;
    let target = format!("http://{dead}").parse().unwrap();
    let proxy = common::spawn_proxy(common::config_for(target)).await;

    let res = common::client().get(proxy.http("/anything")).send().await.unwrap();

    assert_eq!(res.status(), 502);
    assert!(!res.text().await.unwrap().is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn abandoned_response_releases_upstream() {
    let upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    let mut res = common::client().get(proxy.http("/stream")).send().await.unwrap();
    let first = res.chunk().await.unwrap();
    assert!(first.is_some());
    drop(res);

    let dropped = upstream.stream_dropped.clone();
    let released = common::eventually(Duration::from_secs(5), || dropped.load(Ordering::SeqCst)).await;
    assert!(released, "upstream body was never dropped");

    proxy.stop().await;
}

#[tokio::test]
async fn abandoned_upload_aborts_upstream_body() {
    let mut upstream = common::start_upstream().await;
    let proxy = common::spawn_proxy(common::config_for(upstream.url())).await;

    // One chunk, then a body that never finishes.
    let body = stream::once(async { Ok::<_, std::io::Error>(Bytes::from_static(b"first chunk")) })
        .chain(stream::pending());
    let request = common::client()
        .post(proxy.http("/upload"))
        .body(reqwest::Body::wrap_stream(body));
    let upload = tokio::spawn(request.send());

    let received = upstream.upload_bytes.clone();
    let started = common::eventually(Duration::from_secs(5), || received.load(Ordering::SeqCst) > 0).await;
    assert!(started, "upstream never saw the first chunk");

    upload.abort();

    let end = tokio::time::timeout(Duration::from_secs(5), upstream.uploads.recv())
        .await
        .expect("upstream body was never released")
        .unwrap();
    assert_eq!(end, common::UploadEnd::Aborted);

    proxy.stop().await;
}

#[tokio::test]
async fn shutdown_is_bounded_by_drain_deadline() {
    let upstream = common::start_upstream().await;
    let mut config = common::config_for(upstream.url());
    config.timeouts.drain_secs = 1;
    let proxy = common::spawn_proxy(config).await;

    let mut res = common::client().get(proxy.http("/stream")).send().await.unwrap();
    assert!(res.chunk().await.unwrap().is_some());

    proxy.shutdown.trigger();
    let stopped = tokio::time::timeout(Duration::from_secs(5), proxy.handle).await;
    assert!(stopped.is_ok(), "server kept waiting on a streaming response");

    drop(res);
}
