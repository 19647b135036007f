use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use canvass::captcha::CaptchaVerifier;
use canvass::mail::MemoryMailer;
use canvass::server::{AppState, create_router};
use canvass::share::TokenSigner;
use canvass::store::{SqliteStore, Store};

pub const TEST_SIGNING_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub signer: TokenSigner,
    pub mailer: Arc<MemoryMailer>,
    _temp_dir: TempDir,
}

/// A registered, activated, logged-in account and its session.
pub struct TestUser {
    pub user_id: String,
    pub session: String,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with_captcha(true).await
    }

    pub async fn start_with_captcha(allow: bool) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("canvass.db")).expect("open store");
        store.initialize().expect("initialize store");

        let signer = TokenSigner::new(*TEST_SIGNING_KEY);
        let mailer = Arc::new(MemoryMailer::new());

        let state = Arc::new(AppState::new(
            Arc::new(store),
            signer.clone(),
            CaptchaVerifier::Static { allow },
            mailer.clone(),
            None,
        ));

        let router = create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            signer,
            mailer,
            _temp_dir: temp_dir,
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        session: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(session) = session {
            builder = builder.header("x-session-id", session);
        }
        builder
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> reqwest::Response {
        self.request(reqwest::Method::GET, path, session)
            .send()
            .await
            .expect("request")
    }

    pub async fn post(
        &self,
        path: &str,
        session: Option<&str>,
        body: &Value,
    ) -> reqwest::Response {
        self.request(reqwest::Method::POST, path, session)
            .json(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn patch(
        &self,
        path: &str,
        session: Option<&str>,
        body: &Value,
    ) -> reqwest::Response {
        self.request(reqwest::Method::PATCH, path, session)
            .json(body)
            .send()
            .await
            .expect("request")
    }

    pub async fn delete(&self, path: &str, session: Option<&str>) -> reqwest::Response {
        self.request(reqwest::Method::DELETE, path, session)
            .send()
            .await
            .expect("request")
    }

    /// GET with a forced client address (via X-Forwarded-For).
    pub async fn get_from(
        &self,
        path: &str,
        session: Option<&str>,
        ip: &str,
    ) -> reqwest::Response {
        self.request(reqwest::Method::GET, path, session)
            .header("x-forwarded-for", ip)
            .send()
            .await
            .expect("request")
    }

    /// POST with a forced client address (via X-Forwarded-For).
    pub async fn post_from(
        &self,
        path: &str,
        session: Option<&str>,
        ip: &str,
        body: &Value,
    ) -> reqwest::Response {
        self.request(reqwest::Method::POST, path, session)
            .header("x-forwarded-for", ip)
            .json(body)
            .send()
            .await
            .expect("request")
    }

    /// Registers, activates (via a directly minted token), and logs in.
    pub async fn signup(&self, username: &str) -> TestUser {
        let resp = self
            .post(
                "/api/v1/accounts/register",
                None,
                &json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "correct horse battery",
                }),
            )
            .await;
        assert_eq!(resp.status(), 201, "register {username}");
        let body: Value = resp.json().await.expect("register body");
        let user_id = body["data"]["id"].as_str().expect("user id").to_string();

        let token = self
            .signer
            .sign(canvass::share::ACCOUNT_ACTIVATE_SALT, &user_id);
        let resp = self
            .post("/api/v1/accounts/activate", None, &json!({ "token": token }))
            .await;
        assert_eq!(resp.status(), 200, "activate {username}");

        let resp = self
            .post(
                "/api/v1/accounts/login",
                None,
                &json!({
                    "identifier": username,
                    "password": "correct horse battery",
                }),
            )
            .await;
        assert_eq!(resp.status(), 200, "login {username}");
        let session = resp
            .headers()
            .get("x-session-id")
            .expect("session header")
            .to_str()
            .expect("session header utf8")
            .to_string();

        TestUser { user_id, session }
    }

    /// Creates a survey owned by `user`, merging `overrides` into the
    /// default request body. Returns the survey id.
    pub async fn create_survey(&self, user: &TestUser, overrides: Value) -> String {
        let mut body = json!({ "title": "Team lunch survey" });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        let resp = self
            .post("/api/v1/surveys", Some(&user.session), &body)
            .await;
        assert_eq!(resp.status(), 201, "create survey");
        let body: Value = resp.json().await.expect("survey body");
        body["data"]["id"].as_str().expect("survey id").to_string()
    }

    pub async fn publish(&self, user: &TestUser, survey_id: &str) {
        let resp = self
            .post(
                &format!("/api/v1/surveys/{survey_id}/publish"),
                Some(&user.session),
                &json!({}),
            )
            .await;
        assert_eq!(resp.status(), 200, "publish survey");
    }

    /// Adds a question and returns its id.
    pub async fn add_question(&self, user: &TestUser, survey_id: &str, body: Value) -> String {
        let resp = self
            .post(
                &format!("/api/v1/surveys/{survey_id}/questions"),
                Some(&user.session),
                &body,
            )
            .await;
        assert_eq!(resp.status(), 201, "add question");
        let body: Value = resp.json().await.expect("question body");
        body["data"]["id"].as_str().expect("question id").to_string()
    }
}

pub async fn body_json(resp: reqwest::Response) -> Value {
    resp.json().await.expect("json body")
}
