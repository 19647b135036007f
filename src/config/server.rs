use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://surveys.example.com").
    /// Used for share links and links embedded in emails.
    pub public_base_url: Option<String>,
    /// Cloudflare Turnstile secret. When unset, anonymous submissions skip
    /// bot verification (a warning is logged at startup).
    pub turnstile_secret: Option<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("canvass.db")
    }

    #[must_use]
    pub fn signing_key_path(&self) -> PathBuf {
        self.data_dir.join(".signing_key")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            public_base_url: None,
            turnstile_secret: None,
        }
    }
}
