use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Database {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub connections: u32,
}

impl Database {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            user: "roster".into(),
            password: "password".into(),
            host: "localhost".into(),
            port: "5432".into(),
            database: "roster".into(),
            connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub address: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Only send the cookie over HTTPS.
    pub secure: bool,
    /// Days of inactivity before a session expires.
    pub expiry: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            secure: false,
            expiry: 7,
        }
    }
}

/// Who may see a profile's email address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailVisibility {
    /// Every viewer, signed in or not.
    Public,
    /// Any signed-in viewer.
    #[default]
    Authenticated,
    /// The profile owner only.
    Owner,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Visibility {
    pub email: EmailVisibility,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(unused)]
pub struct Settings {
    pub database: Database,
    pub server: Server,
    pub session: Session,
    pub visibility: Visibility,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database.user", "roster")?
            .set_default("database.password", "password")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", "5432")?
            .set_default("database.database", "roster")?
            .set_default("database.connections", 5)?
            .set_default("server.address", "127.0.0.1:8080")?
            .set_default("session.secure", false)?
            .set_default("session.expiry", 7)?
            .set_default("visibility.email", "authenticated")?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().separator("_"))
            .build()?;

        config.try_deserialize()
    }
}
