use std::env;
use std::str::FromStr;
use tracing::warn;

/// Where appointments and user profiles are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub user_directory_seed: Option<String>,
    pub strict_status_transitions: bool,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
                    supabase_anon_key.clone()
                }),
            supabase_anon_key,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: env::var("APPOINTMENT_STORE")
                .ok()
                .and_then(|value| {
                    value.parse().map_err(|e| warn!("{}, using supabase", e)).ok()
                })
                .unwrap_or(StorageBackend::Supabase),
            user_directory_seed: env::var("USER_DIRECTORY_SEED").ok(),
            strict_status_transitions: env::var("STRICT_STATUS_TRANSITIONS")
                .map(|value| parse_flag(&value))
                .unwrap_or(true),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
            StorageBackend::Memory => true,
        };

        storage_ready && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn strict_flag_only_disabled_by_explicit_false() {
        assert!(parse_flag("true"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("OFF"));
        assert!(!parse_flag("0"));
    }
}
