//! Brightcove CMS and ingest flows against a wiremock account.

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use futures_util::{StreamExt, pin_mut};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, path_regex, query_param},
};

use mediaops_app::brightcove::refids::{apply_fixes, plan_fixes};
use mediaops_app::brightcove::upload::{
    MetadataIndex, PlanSources, music_index, preflight, scan_videos, source_id_index,
};
use mediaops_app::brightcove::{
    BrightcoveClient, BrightcoveError, UploadEvent, Uploader, snapshot_by_folder,
};
use mediaops_app::config::{BrightcoveConfig, BrightcoveUploadConfig};
use mediaops_app::http::RetryPolicy;

const ACCOUNT: &str = "acct-1";

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        requests_per_second: None,
        timeout: Duration::from_secs(5),
    }
}

fn config(server: &MockServer, page_size: usize) -> BrightcoveConfig {
    BrightcoveConfig {
        account_id: Some(ACCOUNT.to_string()),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        oauth_url: format!("{}/oauth", server.uri()),
        cms_url: format!("{}/cms", server.uri()),
        ingest_url: format!("{}/ingest", server.uri()),
        ingest_profile: "multi-platform-standard-static".to_string(),
        page_size,
        video_state: "INACTIVE".to_string(),
        upload: BrightcoveUploadConfig::default(),
    }
}

fn cms(rest: &str) -> String {
    format!("/cms/v1/accounts/{ACCOUNT}/{rest}")
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 300
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn video(id: &str, name: &str, reference: &str) -> Value {
    json!({ "id": id, "name": name, "reference_id": reference })
}

#[tokio::test]
async fn token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(cms("folders")))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "f-uk", "name": "UK" },
            { "id": "f-de", "name": "de" }
        ])))
        .mount(&server)
        .await;

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    let first = client.folders().await.expect("folders");
    let second = client.folders().await.expect("folders again");

    assert_eq!(first, second);
    assert_eq!(first.get("uk").map(String::as_str), Some("f-uk"));
    assert_eq!(first.get("de").map(String::as_str), Some("f-de"));
}

#[tokio::test]
async fn rejected_token_is_refreshed_and_request_repeated() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(cms("folders")))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(cms("folders")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "f-uk", "name": "UK" }])),
        )
        .mount(&server)
        .await;

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    let folders = client.folders().await.expect("folders after refresh");
    assert_eq!(folders.get("uk").map(String::as_str), Some("f-uk"));

    let requests = server.received_requests().await.expect("requests");
    let folder_calls = requests
        .iter()
        .filter(|req| req.url.path() == cms("folders"))
        .count();
    assert_eq!(folder_calls, 2);
}

#[tokio::test]
async fn source_upload_streams_file_and_reopens_it_on_retry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");
    let master = dir.path().join("Lemon_Tart_UK.mp4");
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&master, &payload).expect("write master");

    Mock::given(method("PUT"))
        .and(path("/s3/master"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/s3/master"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    client
        .put_source(&format!("{}/s3/master", server.uri()), &master)
        .await
        .expect("upload after retry");

    let puts: Vec<_> = server
        .received_requests()
        .await
        .expect("requests")
        .into_iter()
        .filter(|req| req.method.as_str() == "PUT")
        .collect();
    assert_eq!(puts.len(), 2);
    for put in puts {
        assert_eq!(put.body, payload);
        let length = put
            .headers
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        assert_eq!(length, Some(payload.len().to_string()));
    }
}

#[tokio::test]
async fn source_upload_of_missing_file_fails_without_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");
    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");

    let err = client
        .put_source(&format!("{}/s3/master", server.uri()), &dir.path().join("gone.mp4"))
        .await
        .expect_err("missing file");
    assert!(err.to_string().contains("gone.mp4"), "{err}");
    assert!(server.received_requests().await.expect("requests").is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let server = MockServer::start().await;
    let mut cfg = config(&server, 20);
    cfg.client_secret = None;
    let err = BrightcoveClient::new(&cfg, fast_policy()).expect_err("secret is required");
    assert!(err.to_string().contains("brightcove.client_secret"));
}

#[tokio::test]
async fn folder_snapshot_pages_until_empty() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(cms("folders")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "f-uk", "name": "UK" }])),
        )
        .mount(&server)
        .await;
    let pages = [
        ("0", json!([video("1", "Lemon Tart", "1-ART-UK"), video("2", "Fig Jam", "2-ART-UK")])),
        ("2", json!([video("3", "Plain Toast", "3-ART-UK")])),
        ("4", json!([])),
    ];
    for (offset, body) in pages {
        Mock::given(method("GET"))
            .and(path(cms("folders/f-uk/videos")))
            .and(query_param("limit", "2"))
            .and(query_param("offset", offset))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = BrightcoveClient::new(&config(&server, 2), fast_policy()).expect("client");
    let snapshot = snapshot_by_folder(&client).await.expect("snapshot");

    assert_eq!(
        snapshot,
        BTreeMap::from([(
            "uk".to_string(),
            vec![
                "Lemon Tart".to_string(),
                "Fig Jam".to_string(),
                "Plain Toast".to_string()
            ]
        )])
    );
}

#[tokio::test]
async fn reference_fixes_report_conflicts_and_continue() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(cms("videos")))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            video("10", "Glued", "236599ART-UK"),
            video("11", "Commas", "1-ART-UK,2-ART-UK"),
            video("12", "Fine", "3-ART-UK")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(cms("videos")))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(cms("videos/10")))
        .and(body_partial_json(json!({ "reference_id": "236599-ART-UK" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!([{ "error_code": "REFERENCE_ID_IN_USE" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(cms("videos/11")))
        .and(body_partial_json(json!({ "reference_id": "1-ART-UK, 2-ART-UK" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(video("11", "Commas", "1-ART-UK, 2-ART-UK")))
        .expect(1)
        .mount(&server)
        .await;

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    let videos = client.list_videos(None).await.expect("videos");
    assert_eq!(videos.len(), 3);

    let fixes = plan_fixes(&videos);
    assert_eq!(fixes.len(), 2);
    let outcome = apply_fixes(&client, fixes).await.expect("apply");

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].video_id, "11");
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].new, "236599-ART-UK");
}

#[tokio::test]
async fn delete_requires_no_content_reply() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("DELETE"))
        .and(path(cms("videos/42")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(cms("videos/43")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    client.delete_video("42").await.expect("delete");
    assert!(client.delete_video("43").await.is_err());
}

struct UploadFixture {
    _root: TempDir,
    search_dir: std::path::PathBuf,
    uploaded_dir: std::path::PathBuf,
    stills_dir: std::path::PathBuf,
    metadata: MetadataIndex,
}

fn upload_fixture() -> UploadFixture {
    let root = TempDir::new().expect("temp root");
    let search_dir = root.path().join("search");
    let uploaded_dir = root.path().join("uploaded");
    let stills_dir = root.path().join("stills");
    for dir in [&search_dir, &uploaded_dir, &stills_dir.join("lasagna")] {
        fs::create_dir_all(dir).expect("create dir");
    }
    fs::write(search_dir.join("Easy_Beef_Lasagna_UK.mp4"), b"video bytes").expect("video");
    fs::write(search_dir.join(".DS_Store"), b"").expect("ds store");
    fs::write(stills_dir.join("lasagna/Easy_Beef_Lasagna_raw.jpg"), b"raw").expect("raw still");
    fs::write(stills_dir.join("lasagna/Easy_Beef_Lasagna_HD.jpg"), b"hd").expect("hd still");

    let csv_path = root.path().join("metadata.csv");
    fs::write(
        &csv_path,
        "name,Localized title,RecipeID-Country,YT URL,Recipe URL,YT Tags\n\
         Easy Beef Lasagna,Lasagne,1234-ART-UK,https://youtu.be/x,https://recipes.example/1234,\"pasta, beef\"\n",
    )
    .expect("metadata csv");
    let metadata = MetadataIndex::from_csv(&csv_path).expect("metadata");

    UploadFixture {
        _root: root,
        search_dir,
        uploaded_dir,
        stills_dir,
        metadata,
    }
}

fn record(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn upload_creates_ingests_and_moves_each_video() {
    let server = MockServer::start().await;
    let fixture = upload_fixture();

    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(cms("videos/ref:1234-ART-UK")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(cms("videos")))
        .and(body_partial_json(json!({
            "name": "Lasagne",
            "reference_id": "1234-ART-UK",
            "state": "INACTIVE",
            "tags": ["pasta", "beef", "uk"],
            "custom_fields": { "sourceid": "SRC-9", "musictrack": "Tarantella" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(video("v1", "Lasagne", "1234-ART-UK")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(cms("folders/f-uk/videos/v1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/cms/v1/accounts/acct-1/videos/v1/upload-urls/.+$"))
        .respond_with(move |req: &wiremock::Request| {
            let name = req.url.path().rsplit('/').next().unwrap_or_default().to_string();
            ResponseTemplate::new(200).set_body_json(json!({
                "signed_url": format!("{}/s3/{name}", req.url.origin().ascii_serialization()),
                "api_request_url": format!("https://ingest.example/{name}")
            }))
        })
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/s3/.+$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/ingest/v1/accounts/{ACCOUNT}/videos/v1/ingest-requests")))
        .and(body_partial_json(json!({
            "master": { "url": "https://ingest.example/Easy_Beef_Lasagna_UK.mp4" },
            "profile": "multi-platform-standard-static",
            "poster": { "url": "https://ingest.example/Easy_Beef_Lasagna_HD.jpg" },
            "thumbnail": { "url": "https://ingest.example/Easy_Beef_Lasagna_HD.jpg" },
            "capture-images": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "job-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let videos = scan_videos(&fixture.search_dir).expect("scan");
    assert_eq!(videos.len(), 1);

    let music = music_index(&[record(&[
        ("VIDEO", "Easy-Beef-Lasagna"),
        ("Music Title", "Tarantella"),
        ("Musician/Composer", "Trad."),
        ("Link to the Music Website", "https://music.example/t"),
    ])]);
    let pending = vec![record(&[("VIDEO", "Easy Beef Lasagna"), ("SOURCE ID", "SRC-1")])];
    let completed = vec![record(&[("VIDEO", "Easy Beef Lasagna"), ("SOURCE ID", "SRC-9")])];
    let source_ids = source_id_index([pending.as_slice(), completed.as_slice()]);

    let plans = preflight(
        videos,
        PlanSources {
            metadata: &fixture.metadata,
            music: &music,
            source_ids: &source_ids,
            stills_dir: &fixture.stills_dir,
        },
    )
    .expect("preflight");
    assert_eq!(plans.len(), 1);
    assert!(plans[0].still.ends_with("Easy_Beef_Lasagna_HD.jpg"));

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    let folders = BTreeMap::from([("uk".to_string(), "f-uk".to_string())]);
    let uploader = Uploader::new(client, folders, "INACTIVE", &fixture.uploaded_dir);
    let stream = uploader.upload_stream(plans);
    pin_mut!(stream);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.expect("upload event"));
    }

    assert!(matches!(events.first(), Some(UploadEvent::Started { total: 1 })));
    assert!(events.iter().any(|event| matches!(
        event,
        UploadEvent::Created { video_id, .. } if video_id == "v1"
    )));
    match events.last() {
        Some(UploadEvent::Completed { summary }) => {
            assert_eq!(summary.created, 1);
            assert_eq!(summary.replaced, 0);
            assert_eq!(summary.moved, 1);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(!fixture.search_dir.join("Easy_Beef_Lasagna_UK.mp4").exists());
    assert!(fixture.uploaded_dir.join("Easy_Beef_Lasagna_UK.mp4").exists());
}

#[tokio::test]
async fn existing_reference_replaces_sources_without_creating() {
    let server = MockServer::start().await;
    let fixture = upload_fixture();

    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(cms("videos/ref:1234-ART-UK")))
        .respond_with(ResponseTemplate::new(200).set_body_json(video("v7", "Lasagne", "1234-ART-UK")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(cms("videos")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/cms/v1/accounts/acct-1/videos/v7/upload-urls/.+$"))
        .respond_with(move |req: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_json(json!({
                "signed_url": format!("{}/s3/file", req.url.origin().ascii_serialization()),
                "api_request_url": "https://ingest.example/file"
            }))
        })
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/s3/file"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/ingest/v1/accounts/{ACCOUNT}/videos/v7/ingest-requests")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "job-2" })))
        .expect(1)
        .mount(&server)
        .await;

    let music = music_index(&[record(&[("VIDEO", "Easy Beef Lasagna"), ("Music Title", "x")])]);
    let ids = vec![record(&[("VIDEO", "Easy Beef Lasagna"), ("SOURCE ID", "S")])];
    let source_ids = source_id_index([ids.as_slice()]);
    let plans = preflight(
        scan_videos(&fixture.search_dir).expect("scan"),
        PlanSources {
            metadata: &fixture.metadata,
            music: &music,
            source_ids: &source_ids,
            stills_dir: &fixture.stills_dir,
        },
    )
    .expect("preflight");

    let client = BrightcoveClient::new(&config(&server, 20), fast_policy()).expect("client");
    let uploader = Uploader::new(client, BTreeMap::new(), "INACTIVE", &fixture.uploaded_dir);
    let events: Vec<UploadEvent> = uploader
        .upload_stream(plans)
        .map(|event| event.expect("event"))
        .collect()
        .await;

    assert!(events.iter().any(|event| matches!(
        event,
        UploadEvent::Replacing { video_id, .. } if video_id == "v7"
    )));
    match events.last() {
        Some(UploadEvent::Completed { summary }) => {
            assert_eq!(summary.replaced, 1);
            assert_eq!(summary.created, 0);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn preflight_lists_every_missing_source() {
    let fixture = upload_fixture();
    fs::write(fixture.search_dir.join("Fig_Jam_DE.mp4"), b"video").expect("second video");

    let music = music_index(&[]);
    let source_ids = source_id_index(std::iter::empty::<&[BTreeMap<String, String>]>());
    let err = preflight(
        scan_videos(&fixture.search_dir).expect("scan"),
        PlanSources {
            metadata: &fixture.metadata,
            music: &music,
            source_ids: &source_ids,
            stills_dir: &fixture.stills_dir,
        },
    )
    .expect_err("nothing can be planned");

    match err {
        BrightcoveError::Preflight { problems } => {
            assert_eq!(problems.len(), 2);
            assert_eq!(
                problems[0],
                "Easy_Beef_Lasagna_UK.mp4: missing music info, source id"
            );
            assert_eq!(
                problems[1],
                "Fig_Jam_DE.mp4: missing metadata, music info, source id, stills"
            );
        }
        other => panic!("expected preflight failure, got {other:?}"),
    }
    assert!(fixture.search_dir.join("Easy_Beef_Lasagna_UK.mp4").exists());
}
