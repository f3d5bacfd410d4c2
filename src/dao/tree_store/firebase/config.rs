use super::error::{FirebaseDaoError, FirebaseResult};

/// Runtime configuration describing how to reach a Firebase Realtime Database.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database root, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    pub database_url: String,
    /// Database secret or ID token sent as the `auth` query parameter.
    pub auth: Option<String>,
}

impl FirebaseConfig {
    /// Construct a configuration for an unauthenticated database.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth: None,
        }
    }

    /// Attach the credential appended to every request.
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> FirebaseResult<Self> {
        let database_url = std::env::var("FIREBASE_DATABASE_URL").map_err(|_| {
            FirebaseDaoError::MissingEnvVar {
                var: "FIREBASE_DATABASE_URL",
            }
        })?;

        let mut config = Self::new(database_url);
        if let Some(auth) = std::env::var("FIREBASE_AUTH")
            .ok()
            .filter(|value| !value.is_empty())
        {
            config = config.with_auth(auth);
        }

        Ok(config)
    }
}
