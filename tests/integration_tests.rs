use auction_registry::config::Settings;
use auction_registry::handlers::{router, AppState};
use auction_registry::store::{AuctionStore, MemoryAuctionStore};
use axum::http::StatusCode;
use reqwest::Client;
use serde_json::json;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 트레이싱 초기화 (여러 테스트에서 호출되므로 실패 무시)
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// 메모리 저장소로 서버 실행 후 기본 주소 반환
async fn spawn_app() -> (String, Arc<MemoryAuctionStore>) {
    init_tracing();
    let store = Arc::new(MemoryAuctionStore::new());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("테스트 포트 바인딩 실패");
    let address = format!("http://{}", listener.local_addr().unwrap());

    let settings = Settings {
        public_url: address.clone(),
        ..Settings::default()
    };
    let app = router(AppState::new(&settings, store.clone()));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("테스트 서버 실행 실패");
    });
    (address, store)
}

/// 랏 두 개짜리 진행 중 경매
async fn create_test_auction(store: &MemoryAuctionStore, auction_id: &str) -> Value {
    store
        .put_auction(json!({
            "id": auction_id,
            "status": "active.auction",
            "title": "통합 테스트 경매",
            "lots": [
                { "id": "L1", "status": "active" },
                { "id": "L2", "status": "active" }
            ],
            "bids": [
                {
                    "id": "b1",
                    "status": "active",
                    "lotValues": [
                        { "relatedLot": "L1", "status": "active" },
                        { "relatedLot": "L2", "status": "active" }
                    ]
                },
                {
                    "id": "b2",
                    "status": "active",
                    "lotValues": [
                        { "relatedLot": "L1", "status": "active" },
                        { "relatedLot": "L2", "status": "active" }
                    ]
                }
            ]
        }))
        .await
        .expect("테스트 경매 저장 실패")
}

fn results_body() -> Value {
    json!({
        "data": {
            "bids": [
                {
                    "id": "b2",
                    "lotValues": [
                        { "relatedLot": "L1", "value": { "amount": 200 } },
                        { "relatedLot": "L2", "value": { "amount": 210 } }
                    ]
                },
                {
                    "id": "b1",
                    "lotValues": [
                        { "relatedLot": "L1", "value": { "amount": 100 } },
                        { "relatedLot": "L2", "value": { "amount": 110 } }
                    ]
                }
            ]
        }
    })
}

async fn first_error(response: reqwest::Response) -> Value {
    let body: Value = response.json().await.expect("오류 응답 파싱 실패");
    assert_eq!(body["status"], "error");
    body["errors"][0].clone()
}

/// 목록 조회: 다음 페이지 링크를 따라 모든 경매를 한 번씩
#[tokio::test]
async fn test_list_auctions_pages() {
    let (address, store) = spawn_app().await;
    let client = Client::new();
    for i in 0..5 {
        store
            .put_auction(json!({
                "id": format!("list-{}", i),
                "status": "active.tendering",
                "dateModified": format!("2024-02-01T00:00:0{}.000Z", i),
            }))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut url = format!("{}/auctions?limit=2", address);
    for _ in 0..10 {
        let response = client.get(&url).send().await.expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
        let page: Value = response.json().await.unwrap();
        let data = page["data"].as_array().unwrap();
        if data.is_empty() {
            break;
        }
        for entry in data {
            seen.push(entry["id"].as_str().unwrap().to_string());
            assert!(entry["dateModified"].is_string());
        }
        url = page["next_page"]["uri"].as_str().unwrap().to_string();
        assert!(url.starts_with(&address));
    }
    assert_eq!(seen, vec!["list-0", "list-1", "list-2", "list-3", "list-4"]);
}

/// 첫 페이지(오름차순, offset 없음)에는 이전 페이지 링크가 없음
#[tokio::test]
async fn test_first_page_has_no_prev_link() {
    let (address, _store) = spawn_app().await;
    let response = Client::new()
        .get(format!("{}/auctions", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["data"], json!([]));
    assert!(page.get("prev_page").is_none());
    assert_eq!(page["next_page"]["offset"], "");
}

#[tokio::test]
async fn test_invalid_change_offset() {
    let (address, _store) = spawn_app().await;
    let response = Client::new()
        .get(format!("{}/auctions?feed=changes&offset=not-a-token", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = first_error(response).await;
    assert_eq!(
        error,
        json!({
            "location": "querystring",
            "name": "offset",
            "description": "Offset expired/invalid"
        })
    );
}

#[tokio::test]
async fn test_get_auction() {
    let (address, store) = spawn_app().await;
    create_test_auction(&store, "get-1").await;
    let client = Client::new();

    let response = client
        .get(format!("{}/auctions/get-1", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["title"], "통합 테스트 경매");

    let response = client
        .get(format!("{}/auctions/missing", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = first_error(response).await;
    assert_eq!(error["location"], "url");
    assert_eq!(error["name"], "auction_id");
}

/// 결과 보고: 재정렬 + 범위 밖 가림 + 종료 시각 기록 후 저장
#[tokio::test]
async fn test_report_lot_results() {
    let (address, store) = spawn_app().await;
    let created = create_test_auction(&store, "report-1").await;

    let response = Client::new()
        .post(format!("{}/auctions/report-1/auction/L1", address))
        .json(&results_body())
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(data["bids"][0]["id"], "b1");
    assert_eq!(data["bids"][0]["lotValues"][0]["value"]["amount"], 100);
    assert_eq!(data["bids"][1]["lotValues"][0]["value"]["amount"], 200);
    // L2 는 요청 범위 밖이라 변경되지 않음
    assert!(data["bids"][0]["lotValues"][1].get("value").is_none());
    assert!(data["lots"][0]["auctionPeriod"]["endDate"].is_string());
    assert!(data["lots"][1].get("auctionPeriod").is_none());
    assert_eq!(data["title"], created["title"]);

    let stored = store.get_auction("report-1").await.unwrap().unwrap();
    assert_eq!(&stored, data);
}

/// 부분 수정은 종료 시각을 기록하지 않음
#[tokio::test]
async fn test_update_lot_results() {
    let (address, store) = spawn_app().await;
    create_test_auction(&store, "update-1").await;

    let response = Client::new()
        .patch(format!("{}/auctions/update-1/auction/L2", address))
        .json(&results_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["bids"][1]["lotValues"][1]["value"]["amount"], 210);
    assert!(body["data"]["bids"][1]["lotValues"][0].get("value").is_none());
    assert!(body["data"]["lots"][1].get("auctionPeriod").is_none());
}

#[tokio::test]
async fn test_report_with_foreign_bid() {
    let (address, store) = spawn_app().await;
    create_test_auction(&store, "foreign-1").await;
    let mut body = results_body();
    body["data"]["bids"][0]["id"] = json!("b9");

    let response = Client::new()
        .post(format!("{}/auctions/foreign-1/auction/L1", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = first_error(response).await;
    assert_eq!(error["location"], "body");
    assert_eq!(error["name"], "bids");
    assert_eq!(
        error["description"],
        "Auction bids should be identical to the auction bids"
    );

    // 거부된 요청은 저장된 경매를 바꾸지 않음
    let stored = store.get_auction("foreign-1").await.unwrap().unwrap();
    assert!(stored["bids"][0]["lotValues"][0].get("value").is_none());
}

#[tokio::test]
async fn test_report_in_wrong_status() {
    let (address, store) = spawn_app().await;
    store
        .put_auction(json!({ "id": "closed-1", "status": "complete" }))
        .await
        .unwrap();

    let response = Client::new()
        .post(format!("{}/auctions/closed-1/auction", address))
        .json(&json!({ "data": { "bids": [] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let error = first_error(response).await;
    assert_eq!(
        error["description"],
        "Can't report auction results in current (complete) auction status"
    );

    // 없는 랏을 지정해도 상태 오류가 먼저
    let response = Client::new()
        .post(format!("{}/auctions/closed-1/auction/L9", address))
        .json(&json!({ "data": { "bids": [] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let error = first_error(response).await;
    assert_eq!(error["name"], "data");
}

#[tokio::test]
async fn test_report_unknown_targets() {
    let (address, store) = spawn_app().await;
    create_test_auction(&store, "known-1").await;
    let client = Client::new();

    let response = client
        .post(format!("{}/auctions/unknown/auction", address))
        .json(&results_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/auctions/known-1/auction/L9", address))
        .json(&results_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = first_error(response).await;
    assert_eq!(error["name"], "lot_id");
}

#[tokio::test]
async fn test_report_malformed_body() {
    let (address, store) = spawn_app().await;
    create_test_auction(&store, "malformed-1").await;

    let response = Client::new()
        .post(format!("{}/auctions/malformed-1/auction", address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = first_error(response).await;
    assert_eq!(error["name"], "data");
}

/// 경매 생성: id 발급, 초기 상태, 목록에 노출
#[tokio::test]
async fn test_create_auction() {
    let (address, store) = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/auctions", address))
        .json(&json!({ "data": { "title": "새 경매", "dateModified": "2000-01-01T00:00:00.000Z" } }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .expect("location header");
    let body: Value = response.json().await.unwrap();
    let data = &body["data"];
    let auction_id = data["id"].as_str().unwrap().to_string();
    assert_eq!(auction_id.len(), 32);
    assert_eq!(location, format!("/auctions/{}", auction_id));
    assert_eq!(data["status"], "active.tendering");
    assert_eq!(data["title"], "새 경매");
    assert_ne!(data["dateModified"], "2000-01-01T00:00:00.000Z");

    let stored = store.get_auction(&auction_id).await.unwrap().unwrap();
    assert_eq!(&stored, data);

    let page: Value = client
        .get(format!("{}/auctions", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["data"][0]["id"], auction_id.as_str());

    // 지정한 id 로 생성, 같은 id 는 충돌
    let body = json!({ "data": { "id": "given-1", "status": "active.auction" } });
    let response = client
        .post(format!("{}/auctions", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["data"]["id"], "given-1");
    assert_eq!(created["data"]["status"], "active.auction");

    let response = client
        .post(format!("{}/auctions", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // data 가 없는 본문은 거부
    let response = client
        .post(format!("{}/auctions", address))
        .json(&json!({ "title": "data 없음" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = first_error(response).await;
    assert_eq!(error["description"], "Data not available");
}
