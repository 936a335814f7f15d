// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus, TransitionMode};

/// Transition table for appointment status.
pub struct AppointmentLifecycleService {
    mode: TransitionMode,
}

impl AppointmentLifecycleService {
    pub fn new(mode: TransitionMode) -> Self {
        Self { mode }
    }

    /// Validate that a status transition is allowed.
    ///
    /// Re-applying the current status is always accepted. In lenient mode an
    /// off-table move is logged and accepted.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status || self.is_on_table(current_status, new_status) {
            return Ok(());
        }

        match self.mode {
            TransitionMode::Strict => {
                warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
                Err(AppointmentError::InvalidStatusTransition {
                    from: current_status,
                    to: new_status,
                })
            }
            TransitionMode::Lenient => {
                warn!(
                    "Applying off-table status transition {} -> {} (lenient mode)",
                    current_status, new_status
                );
                Ok(())
            }
        }
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(
        &self,
        current_status: AppointmentStatus,
    ) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Approved => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    fn is_on_table(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        self.get_valid_transitions(from).contains(&to)
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new(TransitionMode::Strict)
    }
}
