//! End-to-end tests of the HTTP surface against the in-memory adapters.

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use zstore_gateway::adapters::memory::Fault;
use zstore_gateway::{
    Channel, GatewayConfig, InMemoryChatPlatform, InMemoryPolicyStore, PermissionOverwrite, Permissions,
    PlatformId, PrincipalKind, TicketGatewayService,
};

const GUILD: u64 = 100;
const CATEGORY: u64 = 200;
const OWNER: u64 = 300;
const CLIENT: &str = "198.51.100.20:51000";

struct Harness {
    platform: Arc<InMemoryChatPlatform>,
    store: Arc<InMemoryPolicyStore>,
    service: TicketGatewayService,
}

struct Reply {
    status: StatusCode,
    content_type: String,
    body: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = GatewayConfig::default();
        config.discord.token = "bot-token".into();
        config.discord.guild_id = GUILD.to_string();
        config.discord.category_id = CATEGORY.to_string();
        config.discord.owner_id = OWNER.to_string();
        config.store.project_id = "zstore-test".into();
        adjust(&mut config);

        let platform = Arc::new(InMemoryChatPlatform::new(PlatformId::from(GUILD)));
        let store = Arc::new(InMemoryPolicyStore::new());
        let service =
            TicketGatewayService::new(config, platform.clone(), store.clone()).unwrap();

        Self {
            platform,
            store,
            service,
        }
    }

    async fn send(&self, req: Request<Body>) -> Reply {
        let response = self.service.router().oneshot(req).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Reply {
            status,
            content_type,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn get(&self, path: &str, peer: &str) -> Reply {
        self.send(request("GET", path, peer, Body::empty())).await
    }

    async fn post(&self, path: &str, peer: &str, body: Value) -> Reply {
        self.send(request("POST", path, peer, Body::from(body.to_string())))
            .await
    }
}

fn request(method: &str, path: &str, peer: &str, body: Body) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    req
}

fn ticket_body(seller: &str) -> Value {
    json!({
        "buyerName": "Alex",
        "sellerId": seller,
        "productName": "Skin Pack",
        "price": 50000,
        "brandName": "NovaShop",
        "method": "QRIS"
    })
}

fn channel_id_from_url(url: &str) -> PlatformId {
    let id = url.rsplit('/').next().unwrap();
    PlatformId::parse(id).unwrap()
}

#[tokio::test]
async fn test_create_ticket_provisions_private_channel() {
    let h = Harness::new();

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["success"], true);

    let url = body["channelUrl"].as_str().unwrap();
    assert!(url.starts_with(&format!("https://discord.com/channels/{}/", GUILD)));

    let channel = h.platform.channel(&channel_id_from_url(url)).unwrap();
    assert!(channel.name.contains("NovaShop"));
    assert!(channel.name.contains("Alex"));
    assert_eq!(channel.parent_id, Some(PlatformId::from(CATEGORY)));

    // Default role hidden, only the seller can see the channel
    let viewers: Vec<&PermissionOverwrite> = channel
        .permission_overwrites
        .iter()
        .filter(|o| o.allow.contains(Permissions::VIEW_CHANNEL))
        .collect();
    assert_eq!(viewers.len(), 1);
    assert_eq!(viewers[0].id.as_str(), "SELLER");
    assert_eq!(viewers[0].kind, PrincipalKind::Member);
    assert!(channel.permission_overwrites.iter().any(|o| o.id == PlatformId::from(GUILD)
        && o.kind == PrincipalKind::Role
        && o.deny.contains(Permissions::VIEW_CHANNEL)));
    assert_eq!(channel.permission_overwrites.len(), 2);

    let messages = h.platform.messages_in(&channel.id);
    assert_eq!(messages.len(), 1);
    let embed = &messages[0].embeds[0];
    assert!(embed.fields.iter().any(|f| f.value == "Rp 50.000"));
    assert_eq!(embed.color, Some(0x2ECC71));
}

#[tokio::test]
async fn test_owner_ticket_uses_owner_color() {
    let h = Harness::new();

    let reply = h
        .post("/api/create-ticket", CLIENT, ticket_body(&OWNER.to_string()))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let messages = h.platform.messages();
    assert_eq!(messages[0].message.embeds[0].color, Some(0xFFD700));
}

#[tokio::test]
async fn test_create_ticket_validation_precedes_remote_calls() {
    let h = Harness::new();

    let mut body = ticket_body("SELLER");
    body["price"] = json!(-5);
    let reply = h.post("/api/create-ticket", CLIENT, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].is_string());

    let mut body = ticket_body("SELLER");
    body.as_object_mut().unwrap().remove("buyerName");
    let reply = h.post("/api/create-ticket", CLIENT, body).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = h
        .send(request("POST", "/api/create-ticket", CLIENT, Body::from("{not json")))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert!(h.platform.channels().is_empty());
}

#[tokio::test]
async fn test_create_ticket_failure_is_generic() {
    let h = Harness::new();
    h.platform.set_fault(Fault::SendMessage, true);

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!({"error": "Gagal membuat tiket Discord."}));

    // Half-built channel was removed
    assert!(h.platform.channels().is_empty());
    assert_eq!(h.platform.deleted().len(), 1);
    assert_eq!(h.service.metrics().rollbacks.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_banned_client_rejected_everywhere() {
    let h = Harness::new();
    h.store.ban("198.51.100.20");
    h.store.set_global_open(false);

    for path in ["/", "/panelowner.html", "/health"] {
        let reply = h.get(path, CLIENT).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "path {}", path);
        assert!(reply.content_type.starts_with("text/html"));
        assert!(reply.body.contains("AKSES DITOLAK"));
    }

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(h.platform.channels().is_empty());

    // Other clients are unaffected
    h.store.set_global_open(true);
    let reply = h.get("/health", "198.51.100.21:51000").await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_mapped_ipv6_peer_matches_ipv4_ban() {
    let h = Harness::new();
    h.store.ban("203.0.113.7");

    let reply = h.get("/health", "[::ffff:203.0.113.7]:40000").await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_maintenance_spares_admin_page() {
    let h = Harness::new();
    h.store.set_global_open(false);

    let reply = h.get("/health", CLIENT).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(reply.body.contains("MAINTENANCE"));

    let reply = h.post("/api/close-ticket", CLIENT, json!({"channelId": "C1", "sellerName": "Sam"})).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);

    let reply = h.get("/panelowner/metrics", CLIENT).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["gate"]["denied_maintenance"], 2);
}

#[tokio::test]
async fn test_policy_store_outage_fails_open() {
    let h = Harness::new();
    h.store.ban("198.51.100.20");
    h.store.set_unavailable(true);

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        h.service.metrics().policy_read_failures.load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_policy_store_outage_fail_closed() {
    let h = Harness::with_config(|c| c.gate.fail_open = false);
    h.store.set_unavailable(true);

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(h.platform.channels().is_empty());
}

#[tokio::test]
async fn test_forwarded_for_only_from_trusted_proxy() {
    let h = Harness::new();
    h.store.ban("203.0.113.7");

    // Loopback peer is a trusted proxy by default
    let mut req = request("GET", "/health", "127.0.0.1:9000", Body::empty());
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
    assert_eq!(h.send(req).await.status, StatusCode::FORBIDDEN);

    // Untrusted peer cannot pick its identity
    let mut req = request("GET", "/health", "203.0.113.7:9000", Body::empty());
    req.headers_mut()
        .insert("x-forwarded-for", "198.51.100.99".parse().unwrap());
    assert_eq!(h.send(req).await.status, StatusCode::FORBIDDEN);

    let mut req = request("GET", "/health", CLIENT, Body::empty());
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
    assert_eq!(h.send(req).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_banned_client_cannot_prepend_forwarded_hops() {
    let h = Harness::new();
    h.store.ban("203.0.113.7");

    // Client-written value first, then the address the proxy appended
    let mut req = request("GET", "/health", "127.0.0.1:9000", Body::empty());
    req.headers_mut()
        .insert("x-forwarded-for", "1.2.3.4, 203.0.113.7".parse().unwrap());
    let reply = h.send(req).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.body.contains("AKSES DITOLAK"));

    let mut req = request(
        "POST",
        "/api/create-ticket",
        "127.0.0.1:9000",
        Body::from(ticket_body("SELLER").to_string()),
    );
    req.headers_mut()
        .insert("x-forwarded-for", "198.51.100.1, 203.0.113.7".parse().unwrap());
    assert_eq!(h.send(req).await.status, StatusCode::FORBIDDEN);
    assert!(h.platform.channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_ticket_warns_then_deletes() {
    let h = Harness::new();

    let reply = h.post("/api/create-ticket", CLIENT, ticket_body("SELLER")).await;
    let channel_id = channel_id_from_url(reply.json()["channelUrl"].as_str().unwrap());

    let close = json!({"channelId": channel_id.as_str(), "sellerName": "Sam"});
    let reply = h.post("/api/close-ticket", CLIENT, close.clone()).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"success": true, "status": "closing"}));

    let messages = h.platform.messages_in(&channel_id);
    assert_eq!(
        messages.last().unwrap().content,
        "⚠️ Channel ini akan ditutup dalam 10 detik oleh Sam..."
    );

    let reply = h.post("/api/close-ticket", CLIENT, close.clone()).await;
    assert_eq!(reply.json()["status"], "already_closing");

    let reply = h.get("/panelowner/metrics", CLIENT).await;
    assert_eq!(reply.json()["teardown"]["pending"], 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.platform.channel(&channel_id).is_some());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(h.platform.channel(&channel_id).is_none());
    assert_eq!(h.platform.deleted(), vec![channel_id.clone()]);

    let reply = h.post("/api/close-ticket", CLIENT, close).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "not_found");
}

#[tokio::test]
async fn test_close_unknown_channel_is_noop() {
    let h = Harness::new();

    let reply = h
        .post("/api/close-ticket", CLIENT, json!({"channelId": "C404", "sellerName": "Sam"}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"success": true, "status": "not_found"}));
    assert!(h.platform.messages().is_empty());
    assert_eq!(h.service.teardown().pending_count(), 0);

    // Channels outside the ticket category are never closed
    h.platform.insert_channel(Channel {
        id: PlatformId::parse("GENERAL").unwrap(),
        name: "general".into(),
        guild_id: Some(PlatformId::from(GUILD)),
        parent_id: Some(PlatformId::from(CATEGORY + 1)),
        permission_overwrites: vec![],
    });
    let reply = h
        .post("/api/close-ticket", CLIENT, json!({"channelId": "GENERAL", "sellerName": "Sam"}))
        .await;
    assert_eq!(reply.json()["status"], "not_found");
    assert!(h.platform.messages().is_empty());
    assert_eq!(h.service.teardown().pending_count(), 0);
}

#[tokio::test]
async fn test_close_ticket_errors() {
    let h = Harness::new();

    let reply = h
        .post("/api/close-ticket", CLIENT, json!({"sellerName": "Sam"}))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.content_type.starts_with("text/plain"));

    h.platform.set_fault(Fault::FetchChannel, true);
    let reply = h
        .post("/api/close-ticket", CLIENT, json!({"channelId": "C1", "sellerName": "Sam"}))
        .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "Gagal menutup tiket.");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let h = Harness::new();

    let reply = h.get("/health", CLIENT).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], zstore_gateway::VERSION);

    let reply = h.get("/panelowner/metrics", CLIENT).await;
    let body = reply.json();
    assert_eq!(body["requests"]["total"], 1);
    assert_eq!(body["tickets"]["created"], 0);
}
