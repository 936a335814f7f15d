mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, Medication,
    Prescription, TransitionMode, UpdateStatusRequest,
};
use common::{drain, Harness};
use notification_cell::LifecycleEvent;
use shared_utils::test_utils::TestUser;

struct Booked {
    patient: TestUser,
    doctor: TestUser,
    appointment: Appointment,
}

async fn book(h: &Harness, slot: &str) -> Booked {
    let patient = h.user(&format!("pat-{}@example.com", Uuid::new_v4()), "patient");
    let doctor = h.user(&format!("doc-{}@example.com", Uuid::new_v4()), "doctor");
    let appointment = h
        .booking
        .book_appointment(
            &patient.actor(),
            BookAppointmentRequest {
                doctor_id: doctor.uuid(),
                date: "2025-06-01".to_string(),
                time_slot: slot.to_string(),
                reason_for_visit: None,
            },
        )
        .await
        .expect("setup booking");

    Booked { patient, doctor, appointment }
}

fn status(status: AppointmentStatus) -> UpdateStatusRequest {
    UpdateStatusRequest { status, meeting_link: None, prescription: None }
}

fn amoxicillin() -> Prescription {
    Prescription {
        medications: vec![Medication {
            name: "Amoxicillin".to_string(),
            dosage: "500mg".to_string(),
            duration: "7 days".to_string(),
        }],
        notes: "After meals".to_string(),
    }
}

#[tokio::test]
async fn test_doctor_completes_visit_with_link_and_prescription() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let mut patient_rx = h.listen(b.patient.uuid());

    let updated = h
        .transitions
        .set_status(
            &b.doctor.actor(),
            b.appointment.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Completed,
                meeting_link: Some("  https://meet.example.com/room-1  ".to_string()),
                prescription: Some(amoxicillin()),
            },
        )
        .await
        .expect("assigned doctor may complete");

    assert_eq!(updated.status, AppointmentStatus::Completed);
    assert_eq!(updated.meeting_link.as_deref(), Some("https://meet.example.com/room-1"));
    assert_eq!(updated.prescription, amoxicillin());

    let events = drain(&mut patient_rx);
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0],
        LifecycleEvent::AppointmentStatusUpdated { status, appointment_id, message }
            if status == "Completed"
                && *appointment_id == b.appointment.id
                && message.contains("Completed")
    );
}

#[tokio::test]
async fn test_blank_meeting_link_keeps_existing_one() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;

    h.transitions
        .set_status(
            &b.doctor.actor(),
            b.appointment.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Approved,
                meeting_link: Some("https://meet.example.com/first".to_string()),
                prescription: None,
            },
        )
        .await
        .unwrap();

    let updated = h
        .transitions
        .set_status(
            &b.doctor.actor(),
            b.appointment.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Approved,
                meeting_link: Some("   ".to_string()),
                prescription: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.meeting_link.as_deref(), Some("https://meet.example.com/first"));
}

#[tokio::test]
async fn test_other_doctor_cannot_touch_appointment() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let stranger = h.user("d2@example.com", "doctor");
    let mut patient_rx = h.listen(b.patient.uuid());

    let result = h
        .transitions
        .set_status(&stranger.actor(), b.appointment.id, status(AppointmentStatus::Approved))
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));

    let result = h
        .transitions
        .set_prescription(&stranger.actor(), b.appointment.id, amoxicillin())
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));

    let listed = h.booking.list_my_appointments(&b.patient.actor()).await.unwrap();
    assert_eq!(listed[0].appointment.status, AppointmentStatus::Pending);
    assert!(listed[0].appointment.prescription.medications.is_empty());
    assert!(drain(&mut patient_rx).is_empty());
}

#[tokio::test]
async fn test_patients_cannot_change_status() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;

    let result = h
        .transitions
        .set_status(&b.patient.actor(), b.appointment.id, status(AppointmentStatus::Cancelled))
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_may_change_status_but_not_prescribe() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let admin = h.user("admin@example.com", "admin");

    let approved = h
        .transitions
        .set_status(&admin.actor(), b.appointment.id, status(AppointmentStatus::Approved))
        .await
        .expect("admins may change any status");
    assert_eq!(approved.status, AppointmentStatus::Approved);

    let result = h
        .transitions
        .set_prescription(&admin.actor(), b.appointment.id, amoxicillin())
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let h = Harness::new();
    let doctor = h.user("doc@example.com", "doctor");
    let missing = Uuid::new_v4();

    assert_matches!(
        h.transitions
            .set_status(&doctor.actor(), missing, status(AppointmentStatus::Approved))
            .await,
        Err(AppointmentError::NotFound)
    );
    assert_matches!(
        h.transitions.set_prescription(&doctor.actor(), missing, amoxicillin()).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_strict_mode_rejects_leaving_a_terminal_state() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let actor = b.doctor.actor();

    h.transitions
        .set_status(&actor, b.appointment.id, status(AppointmentStatus::Cancelled))
        .await
        .unwrap();

    let result = h
        .transitions
        .set_status(&actor, b.appointment.id, status(AppointmentStatus::Approved))
        .await;
    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Approved
        })
    );

    let same = h
        .transitions
        .set_status(&actor, b.appointment.id, status(AppointmentStatus::Cancelled))
        .await;
    assert!(same.is_ok(), "Re-applying the current status is always allowed");
}

#[tokio::test]
async fn test_lenient_mode_accepts_off_table_moves() {
    let h = Harness::with_mode(TransitionMode::Lenient);
    let b = book(&h, "09:00 AM").await;
    let actor = b.doctor.actor();

    h.transitions
        .set_status(&actor, b.appointment.id, status(AppointmentStatus::Completed))
        .await
        .unwrap();

    let reopened = h
        .transitions
        .set_status(&actor, b.appointment.id, status(AppointmentStatus::Pending))
        .await
        .expect("lenient mode applies any target status");
    assert_eq!(reopened.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_prescription_is_replaced_wholesale() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let mut patient_rx = h.listen(b.patient.uuid());

    h.transitions
        .set_prescription(&b.doctor.actor(), b.appointment.id, amoxicillin())
        .await
        .unwrap();

    let replacement = Prescription {
        medications: vec![Medication {
            name: "Ibuprofen".to_string(),
            dosage: "200mg".to_string(),
            duration: "3 days".to_string(),
        }],
        notes: String::new(),
    };
    let updated = h
        .transitions
        .set_prescription(&b.doctor.actor(), b.appointment.id, replacement.clone())
        .await
        .unwrap();

    assert_eq!(updated.prescription, replacement);
    assert_eq!(updated.status, AppointmentStatus::Pending, "Prescribing leaves status alone");

    let events = drain(&mut patient_rx);
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_matches!(
            event,
            LifecycleEvent::PrescriptionAdded { appointment_id, .. }
                if *appointment_id == b.appointment.id
        );
    }
}

#[tokio::test]
async fn test_prescription_allowed_after_completion() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;

    h.transitions
        .set_status(&b.doctor.actor(), b.appointment.id, status(AppointmentStatus::Completed))
        .await
        .unwrap();

    let updated = h
        .transitions
        .set_prescription(&b.doctor.actor(), b.appointment.id, amoxicillin())
        .await
        .unwrap();
    assert_eq!(updated.prescription.medications.len(), 1);
}

#[tokio::test]
async fn test_active_doctors_are_distinct_pending_counterparts() {
    let h = Harness::new();
    let patient = h.user("pat@example.com", "patient");
    let d1 = h.user("d1@example.com", "doctor");
    let d2 = h.user("d2@example.com", "doctor");
    let d3 = h.user("d3@example.com", "doctor");

    let mut ids = Vec::new();
    let bookings = [(&d1, "09:00 AM"), (&d1, "10:00 AM"), (&d2, "09:00 AM"), (&d3, "09:00 AM")];
    for (doctor, slot) in bookings {
        let appointment = h
            .booking
            .book_appointment(
                &patient.actor(),
                BookAppointmentRequest {
                    doctor_id: doctor.uuid(),
                    date: "2025-06-01".to_string(),
                    time_slot: slot.to_string(),
                    reason_for_visit: None,
                },
            )
            .await
            .unwrap();
        ids.push(appointment.id);
    }

    h.transitions
        .set_status(&d3.actor(), ids[3], status(AppointmentStatus::Approved))
        .await
        .unwrap();

    let active = h.transitions.find_active_doctors_for_patient(patient.uuid()).await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&d1.uuid()));
    assert!(active.contains(&d2.uuid()));

    let nobody = h.transitions.find_active_doctors_for_patient(Uuid::new_v4()).await.unwrap();
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn test_profile_update_fans_out_to_active_doctors() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let mut doctor_rx = h.listen(b.doctor.uuid());
    drain(&mut doctor_rx);

    let notified = h.transitions.announce_profile_update(&b.patient.actor()).await.unwrap();
    assert_eq!(notified.len(), 1);

    let events = drain(&mut doctor_rx);
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0],
        LifecycleEvent::PatientProfileUpdated { patient_id, message }
            if *patient_id == b.patient.uuid()
                && message.contains(&b.patient.first_name)
    );

    let result = h.transitions.announce_profile_update(&b.doctor.actor()).await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_cannot_prescribe_through_status_update() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let admin = h.user("admin@example.com", "admin");
    let mut patient_rx = h.listen(b.patient.uuid());

    let result = h
        .transitions
        .set_status(
            &admin.actor(),
            b.appointment.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Approved,
                meeting_link: None,
                prescription: Some(amoxicillin()),
            },
        )
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));

    let listed = h.booking.list_my_appointments(&b.patient.actor()).await.unwrap();
    assert_eq!(listed[0].appointment.status, AppointmentStatus::Pending);
    assert!(listed[0].appointment.prescription.medications.is_empty());
    assert!(drain(&mut patient_rx).is_empty());
}

#[tokio::test]
async fn test_admin_sets_meeting_link_only_when_completing() {
    let h = Harness::new();
    let b = book(&h, "09:00 AM").await;
    let admin = h.user("admin@example.com", "admin");
    let with_link = |status| UpdateStatusRequest {
        status,
        meeting_link: Some("https://meet.example.com/admin".to_string()),
        prescription: None,
    };

    let result = h
        .transitions
        .set_status(&admin.actor(), b.appointment.id, with_link(AppointmentStatus::Approved))
        .await;
    assert_matches!(result, Err(AppointmentError::Forbidden(_)));

    let completed = h
        .transitions
        .set_status(&admin.actor(), b.appointment.id, with_link(AppointmentStatus::Completed))
        .await
        .expect("admins may attach a link when completing");
    assert_eq!(completed.meeting_link.as_deref(), Some("https://meet.example.com/admin"));
}
