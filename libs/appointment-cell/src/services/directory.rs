// libs/appointment-cell/src/services/directory.rs
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::user::UserProfile;

use crate::models::AppointmentError;

/// Read-only view of the user directory owned by the identity collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError>;
}

pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=id,role,first_name,last_name,email,medical_profile",
            id
        );

        let rows: Vec<UserProfile> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| {
                error!("Failed to look up profile {}: {}", id, e);
                AppointmentError::DatabaseError(e.to_string())
            })?;

        debug!("Profile lookup for {} returned {} row(s)", id, rows.len());
        Ok(rows.into_iter().next())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    profiles: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        let directory = Self::new();
        for profile in profiles {
            directory.insert(profile);
        }
        directory
    }

    /// Loads a JSON array of profiles, e.g. for local runs without Supabase.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppointmentError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppointmentError::ValidationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let profiles: Vec<UserProfile> = serde_json::from_str(&raw).map_err(|e| {
            AppointmentError::ValidationError(format!("invalid directory seed: {}", e))
        })?;

        info!("Seeded user directory with {} profile(s)", profiles.len());
        Ok(Self::with_profiles(profiles))
    }

    pub fn insert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        let profiles = self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(profiles.get(&id).cloned())
    }
}
