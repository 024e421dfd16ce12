use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // The scheduler would reach for the registry at startup; keep it off so the
        // server comes up without a database
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_fleet-api-rust"));
        cmd.env("FLEET_API_PORT", port.to_string())
            .env("REPORTS_SCHEDULER_ENABLED", "false")
            .env("API_ENABLE_REQUEST_LOGGING", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Degraded (no database) still means the server is listening
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(30)).await?;
    Ok(server)
}

/// Whether the spawned server reached its registry database. Tests that need
/// MySQL return early when it did not (no DATABASE_URL, or `fleet init database`
/// not run yet).
#[allow(dead_code)]
pub async fn database_ready(server: &TestServer) -> Result<bool> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping database-backed test");
        return Ok(false);
    }
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;
    if res.status() != StatusCode::OK {
        eprintln!("registry database unavailable; skipping database-backed test");
        return Ok(false);
    }
    Ok(true)
}

/// A freshly signed-up company and a bearer token for its admin
#[allow(dead_code)]
pub struct Tenant {
    pub base_url: String,
    pub subdomain: String,
    pub company_id: i64,
    pub token: String,
    client: reqwest::Client,
}

#[allow(dead_code)]
pub const ADMIN_PASSWORD: &str = "secret-pass-1";

/// Unique, valid subdomain for one test
#[allow(dead_code)]
pub fn unique_subdomain(tag: &str) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "t{}-{}-{}",
        tag,
        nanos % 1_000_000_000_000,
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

#[allow(dead_code)]
pub fn signup_body(subdomain: &str) -> serde_json::Value {
    serde_json::json!({
        "company_name": format!("Company {}", subdomain),
        "subdomain": subdomain,
        "email": format!("ops@{}.test", subdomain),
        "admin_username": "fleetadmin",
        "password": ADMIN_PASSWORD,
        "confirm_password": ADMIN_PASSWORD
    })
}

#[allow(dead_code)]
impl Tenant {
    pub async fn signup(server: &TestServer, tag: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let subdomain = unique_subdomain(tag);

        let res = client
            .post(format!("{}/auth/signup", server.base_url))
            .json(&signup_body(&subdomain))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup failed: {}", res.status());
        let body: serde_json::Value = res.json().await?;
        let company_id = body
            .pointer("/data/company/id")
            .and_then(|v| v.as_i64())
            .context("signup response without company id")?;

        let res = client
            .post(format!("{}/auth/login", server.base_url))
            .json(&serde_json::json!({
                "username": "fleetadmin",
                "password": ADMIN_PASSWORD,
                "company": subdomain
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: serde_json::Value = res.json().await?;
        let token = body
            .pointer("/data/token")
            .and_then(|v| v.as_str())
            .context("login response without token")?
            .to_string();

        Ok(Self {
            base_url: server.base_url.clone(),
            subdomain,
            company_id,
            token,
            client,
        })
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?)
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?)
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    /// POST and return `data` of a 201 response
    pub async fn create(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let res = self.post(path, body).await?;
        let status = res.status();
        let body: serde_json::Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::CREATED, "POST {} returned {}: {}", path, status, body);
        Ok(body["data"].clone())
    }
}
