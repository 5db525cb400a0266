//! YouTube and Vimeo pulls against wiremock, plus the snapshot comparison
//! they feed.

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path, query_param, query_param_is_missing},
};

use mediaops_app::compare::{compare_titles, missing_video_info};
use mediaops_app::config::{ChannelCredentials, HttpConfig, YoutubeConfig};
use mediaops_app::constants::{BRIGHTCOVE_SNAPSHOT_PREFIX, YOUTUBE_SNAPSHOT_PREFIX};
use mediaops_app::http::RetryPolicy;
use mediaops_app::report::{read_snapshot, write_snapshot};
use mediaops_app::vimeo::{VimeoClient, created_dates_report, stats_report};
use mediaops_app::youtube::{
    PlaylistItem, ReportQuery, YoutubeError, channel_clients, collect_metrics, collect_uploads,
};

fn fast_http() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_retries: 1,
        min_delay_ms: 1,
        max_delay_ms: 5,
    }
}

fn youtube_config(server: &MockServer, countries: &[&str]) -> YoutubeConfig {
    YoutubeConfig {
        data_api_url: format!("{}/youtube/v3", server.uri()),
        analytics_api_url: format!("{}/analytics/v2", server.uri()),
        token_url: format!("{}/token", server.uri()),
        channels: countries
            .iter()
            .map(|country| {
                (
                    country.to_string(),
                    ChannelCredentials {
                        client_id: "client".to_string(),
                        client_secret: "secret".to_string(),
                        refresh_token: format!("{country}-refresh"),
                    },
                )
            })
            .collect(),
    }
}

async fn mount_channel(server: &MockServer, country: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(format!("refresh_token={country}-refresh")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": format!("tok-{country}"),
            "expires_in": 3600
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("mine", "true"))
        .and(header("authorization", format!("Bearer tok-{country}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": format!("UC-{country}"),
                "contentDetails": { "relatedPlaylists": { "uploads": format!("UU-{country}") } }
            }]
        })))
        .mount(server)
        .await;
}

fn playlist_item(title: &str, video_id: &str) -> serde_json::Value {
    json!({
        "id": format!("item-{video_id}"),
        "snippet": {
            "title": title,
            "description": format!("{title} description"),
            "resourceId": { "videoId": video_id }
        }
    })
}

#[tokio::test]
async fn metrics_skip_failing_channels_and_total_the_rest() {
    let server = MockServer::start().await;
    mount_channel(&server, "de").await;
    mount_channel(&server, "uk").await;

    Mock::given(method("GET"))
        .and(path("/analytics/v2/reports"))
        .and(query_param("ids", "channel==UC-uk"))
        .and(query_param("metrics", "views,likes"))
        .and(query_param("startDate", "2020-01-01"))
        .and(query_param("endDate", "2020-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columnHeaders": [{ "name": "views" }, { "name": "likes" }],
            "rows": [[1200.0, 34]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/analytics/v2/reports"))
        .and(query_param("ids", "channel==UC-de"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let cfg = youtube_config(&server, &["de", "uk"]);
    let clients = channel_clients(&cfg, &fast_http(), None).expect("clients");
    assert_eq!(
        clients.iter().map(|c| c.country()).collect::<Vec<_>>(),
        ["DE", "UK"]
    );

    let query = ReportQuery {
        metrics: vec!["views".to_string(), "likes".to_string()],
        start_date: "2020-01-01".to_string(),
        end_date: "2020-12-31".to_string(),
        sort: "-views".to_string(),
    };
    let mut metrics = collect_metrics(&clients, &query).await;
    metrics.compute_totals();

    assert_eq!(
        metrics.sorted("views"),
        [("UK".to_string(), 1200), ("total".to_string(), 1200)]
    );
    assert_eq!(
        metrics.sorted("likes"),
        [("UK".to_string(), 34), ("total".to_string(), 34)]
    );

    let out = TempDir::new().expect("out dir");
    let csv_path = out.path().join("metrics.csv");
    let rows = metrics.write_csv(&csv_path).expect("write csv");
    assert_eq!(rows, 4);
}

#[tokio::test]
async fn unknown_channel_is_rejected() {
    let server = MockServer::start().await;
    let cfg = youtube_config(&server, &["uk"]);
    let err = channel_clients(&cfg, &fast_http(), Some("fr")).expect_err("fr not configured");
    assert!(matches!(err, YoutubeError::UnknownChannel(country) if country == "fr"));

    let empty = youtube_config(&server, &[]);
    assert!(matches!(
        channel_clients(&empty, &fast_http(), None),
        Err(YoutubeError::NoChannels)
    ));
}

#[tokio::test]
async fn uploads_follow_page_tokens_into_a_snapshot() {
    let server = MockServer::start().await;
    mount_channel(&server, "uk").await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", "UU-uk"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_item("Lemon Tart", "v1"), playlist_item("Fig Jam", "v2")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_item("Plain Toast", "v3")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = youtube_config(&server, &["uk"]);
    let clients = channel_clients(&cfg, &fast_http(), Some("UK")).expect("clients");
    let snapshot = collect_uploads(&clients).await;

    let titles: Vec<&str> = snapshot["UK"]
        .iter()
        .map(|item| item.snippet.title.as_str())
        .collect();
    assert_eq!(titles, ["Lemon Tart", "Fig Jam", "Plain Toast"]);
    assert_eq!(snapshot["UK"][2].video_id(), Some("v3"));

    let dir = TempDir::new().expect("snapshot dir");
    let written = write_snapshot(dir.path(), YOUTUBE_SNAPSHOT_PREFIX, "03_14_24", &snapshot)
        .expect("write snapshot");
    assert!(written.ends_with(format!("{YOUTUBE_SNAPSHOT_PREFIX}_03_14_24.json")));
    let reread: BTreeMap<String, Vec<PlaylistItem>> =
        read_snapshot(dir.path(), YOUTUBE_SNAPSHOT_PREFIX, "03_14_24").expect("read snapshot");
    assert_eq!(reread, snapshot);
}

#[test]
fn snapshots_compare_and_surface_missing_videos() {
    let dir = TempDir::new().expect("snapshot dir");
    let youtube_items: Vec<PlaylistItem> = [
        playlist_item("Lemon Tart", "v1"),
        playlist_item("Fig Jam", "v2"),
        playlist_item("Plain Toast", "v3"),
    ]
    .into_iter()
    .map(|value| serde_json::from_value(value).expect("item"))
    .collect();
    let youtube = BTreeMap::from([("UK".to_string(), youtube_items)]);
    let brightcove = BTreeMap::from([(
        "uk".to_string(),
        vec!["Lemon Tart".to_string(), "Plain Toast".to_string()],
    )]);
    write_snapshot(dir.path(), YOUTUBE_SNAPSHOT_PREFIX, "01_02_24", &youtube).expect("yt");
    write_snapshot(dir.path(), BRIGHTCOVE_SNAPSHOT_PREFIX, "01_02_24", &brightcove).expect("bc");

    let yt: BTreeMap<String, Vec<PlaylistItem>> =
        read_snapshot(dir.path(), YOUTUBE_SNAPSHOT_PREFIX, "01_02_24").expect("read yt");
    let bc: BTreeMap<String, Vec<String>> =
        read_snapshot(dir.path(), BRIGHTCOVE_SNAPSHOT_PREFIX, "01_02_24").expect("read bc");

    let items = &yt["UK"];
    let yt_titles: Vec<String> = items.iter().map(|i| i.snippet.title.clone()).collect();
    let comparison = compare_titles(&yt_titles, &bc["uk"]);
    assert_eq!(comparison.difference(), 1);
    assert_eq!(
        comparison.rows[0],
        (Some("Fig Jam".to_string()), Some("Lemon Tart".to_string()))
    );
    assert_eq!(comparison.rows[2], (Some("Plain Toast".to_string()), None));

    let csv_path = dir.path().join("compare.csv");
    assert_eq!(comparison.write_csv(&csv_path).expect("csv"), 3);
    let csv = fs::read_to_string(&csv_path).expect("read csv");
    assert!(csv.starts_with("YouTube,Brightcove\n"));

    let info = missing_video_info(&["fig jam".to_string()], items);
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].title, "FIG JAM");
    assert_eq!(
        info[0].url.as_deref(),
        Some("https://www.youtube.com/watch?v=v2")
    );

    assert!(read_snapshot::<BTreeMap<String, Vec<String>>>(dir.path(), BRIGHTCOVE_SNAPSHOT_PREFIX, "09_09_99").is_err());
}

#[tokio::test]
async fn vimeo_pages_feed_stats_and_created_dates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/videos"))
        .and(query_param("sort", "alphabetical"))
        .and(query_param_is_missing("page"))
        .and(header("authorization", "Bearer vimeo-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "name": "Fig Jam",
                "created_time": "2019-03-04T10:00:00+00:00",
                "duration": 61,
                "stats": { "plays": 10 },
                "metadata": { "connections": { "likes": { "total": 2 } } }
            }],
            "paging": { "next": "/me/videos?sort=alphabetical&page=2" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/videos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "name": "Lemon Tart",
                "created_time": "2020-11-30T08:00:00+00:00",
                "duration": 95,
                "stats": { "plays": null },
                "metadata": { "connections": { "likes": { "total": 5 } } }
            }],
            "paging": { "next": null }
        })))
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        max_retries: 1,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        requests_per_second: None,
        timeout: Duration::from_secs(5),
    };
    let client = VimeoClient::new(&server.uri(), "vimeo-token", policy).expect("client");
    let videos = client.videos().await.expect("videos");
    assert_eq!(videos.len(), 2);

    let report = stats_report(&videos);
    assert_eq!(report.total_plays, 10);
    assert_eq!(report.total_likes, 7);
    assert_eq!(report.total_duration, 156);

    let rows = created_dates_report(&videos).expect("dates");
    assert_eq!(rows[0].date, "03/04/2019");
    assert_eq!(rows[1].month_year, "11/2020");

    let dir = TempDir::new().expect("out dir");
    let stats_path = dir.path().join("stats.csv");
    report.write_csv(&stats_path).expect("stats csv");
    let text = fs::read_to_string(&stats_path).expect("read stats");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "VIDEO,PLAYS,LIKES,DURATION [seconds]");
    assert_eq!(lines[2], "Lemon Tart,0,5,95");
    assert_eq!(lines[5], "10,7,156");
}
