use uuid::Uuid;

use notification_cell::*;

fn status_event(appointment_id: Uuid) -> LifecycleEvent {
    LifecycleEvent::AppointmentStatusUpdated {
        message: "Your appointment status has been updated to Approved".to_string(),
        appointment_id,
        status: "Approved".to_string(),
    }
}

#[tokio::test]
async fn test_new_hub_has_no_users() {
    let hub = NotificationHub::new();
    assert!(hub.online_users().is_empty(), "New hub should have no registered users");
}

#[tokio::test]
async fn test_event_reaches_every_tab_of_the_user() {
    let hub = NotificationHub::new();
    let user_id = Uuid::new_v4();

    let (tx_a, mut rx_a) = NotificationHub::open_channel();
    let (tx_b, mut rx_b) = NotificationHub::open_channel();
    hub.register(user_id, ConnectionId::new(), tx_a);
    hub.register(user_id, ConnectionId::new(), tx_b);

    let appointment_id = Uuid::new_v4();
    let delivered = hub.deliver(user_id, &status_event(appointment_id));
    assert_eq!(delivered, 2);

    for rx in [&mut rx_a, &mut rx_b] {
        let payload = rx.try_recv().expect("each connection should receive the event");
        let event: LifecycleEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(event, status_event(appointment_id));
    }
}

#[tokio::test]
async fn test_disconnect_removes_only_its_own_handle() {
    let hub = NotificationHub::new();
    let user_id = Uuid::new_v4();
    let first = ConnectionId::new();
    let second = ConnectionId::new();

    let (tx_first, _rx_first) = NotificationHub::open_channel();
    let (tx_second, mut rx_second) = NotificationHub::open_channel();
    hub.register(user_id, first, tx_first);
    hub.register(user_id, second, tx_second);

    assert!(hub.deregister(user_id, first));
    assert_eq!(hub.connection_count(user_id), 1, "The other tab must stay registered");

    hub.notify(user_id, status_event(Uuid::new_v4()));
    assert!(rx_second.try_recv().is_ok(), "Surviving tab should still get events");

    assert!(hub.deregister(user_id, second));
    assert_eq!(hub.connection_count(user_id), 0);
    assert!(!hub.online_users().contains(&user_id), "Empty users are dropped from the map");
}

#[tokio::test]
async fn test_deregister_unknown_handle_is_a_noop() {
    let hub = NotificationHub::new();
    let user_id = Uuid::new_v4();
    let (tx, _rx) = NotificationHub::open_channel();
    hub.register(user_id, ConnectionId::new(), tx);

    assert!(!hub.deregister(user_id, ConnectionId::new()));
    assert!(!hub.deregister(Uuid::new_v4(), ConnectionId::new()));
    assert_eq!(hub.connection_count(user_id), 1);
}

#[tokio::test]
async fn test_events_are_not_addressed_to_other_users() {
    let hub = NotificationHub::new();
    let doctor = Uuid::new_v4();
    let bystander = Uuid::new_v4();

    let (tx_doctor, mut rx_doctor) = NotificationHub::open_channel();
    let (tx_bystander, mut rx_bystander) = NotificationHub::open_channel();
    hub.register(doctor, ConnectionId::new(), tx_doctor);
    hub.register(bystander, ConnectionId::new(), tx_bystander);

    hub.notify(doctor, LifecycleEvent::NewAppointment {
        message: "New appointment booked by patient for 2025-06-01 at 09:00 AM".to_string(),
        appointment_id: Uuid::new_v4(),
    });

    assert!(rx_doctor.try_recv().is_ok());
    assert!(rx_bystander.try_recv().is_err(), "Bystander must not receive the doctor's event");
}

#[tokio::test]
async fn test_notify_without_listeners_is_silent() {
    let hub = NotificationHub::new();
    let offline = Uuid::new_v4();

    hub.notify(offline, status_event(Uuid::new_v4()));
    assert_eq!(hub.deliver(offline, &status_event(Uuid::new_v4())), 0);
}

#[tokio::test]
async fn test_closed_receiver_does_not_fail_delivery() {
    let hub = NotificationHub::new();
    let user_id = Uuid::new_v4();

    let (tx_closed, rx_closed) = NotificationHub::open_channel();
    let (tx_open, mut rx_open) = NotificationHub::open_channel();
    hub.register(user_id, ConnectionId::new(), tx_closed);
    hub.register(user_id, ConnectionId::new(), tx_open);
    drop(rx_closed);

    assert_eq!(hub.deliver(user_id, &status_event(Uuid::new_v4())), 1);
    assert!(rx_open.try_recv().is_ok());
}

#[tokio::test]
async fn test_clones_share_the_registry() {
    let hub = NotificationHub::new();
    let cloned = hub.clone();
    let user_id = Uuid::new_v4();

    let (tx, mut rx) = NotificationHub::open_channel();
    hub.register(user_id, ConnectionId::new(), tx);

    assert_eq!(cloned.connection_count(user_id), 1);
    cloned.notify(user_id, status_event(Uuid::new_v4()));
    assert!(rx.try_recv().is_ok());
}
