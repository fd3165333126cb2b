#[cfg(test)]
mod tests {
    use crate::coordinator::{PaymentReport, NO_PAYMENT_CUSTOMER};
    use crate::error::BookingError;
    use crate::test_support::{
        bc_agent, coordinator, google_sync, repos, request, FakePayments, RecordingNotifier,
        AGENT_ID, MONDAY_NINE,
    };
    use chrono::{DateTime, NaiveDate, Utc};
    use everpath_common::models::{AppointmentStatus, ApprovalStatus, RequestedWindow};
    use everpath_common::services::NotificationEvent;
    use everpath_db::{
        AgentRepository, AppointmentRepository, DeclinedPaymentRepository, ExternalEventRepository,
    };
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn booking_confirms_charges_and_notifies() {
        let repos = repos().await;
        let payments = FakePayments::succeeding("ch_1");
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(&repos, Some(payments.clone()), notifier.clone());

        let outcome = coordinator
            .book(&request(MONDAY_NINE, "Jamie@Example.com"))
            .await
            .expect("booked");
        let appointment = outcome.appointment.clone();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.confirmed_at, Some(at(MONDAY_NINE)));
        assert_eq!(appointment.requested_date, NaiveDate::from_ymd_opt(2030, 5, 6).unwrap());
        assert_eq!(appointment.requested_window, RequestedWindow::Morning);
        assert_eq!(appointment.price_minor_units, 4900);
        assert_eq!(appointment.lead_id, outcome.lead.id);

        let report = outcome.side_effects.await.expect("side effects ran");
        assert_eq!(
            report.payment,
            PaymentReport::Charged {
                charge_id: "ch_1".into()
            }
        );
        assert_eq!(
            payments.calls(),
            vec![("cus_test".to_string(), 4900, appointment.id.clone())]
        );
        let stored = repos
            .appointments
            .find_by_id(&appointment.id)
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(stored.payment_charge_ref.as_deref(), Some("ch_1"));

        assert!(report.notifications.iter().all(|n| n.result.is_ok()));
        assert_eq!(
            notifier.events(),
            vec![
                NotificationEvent::BookingConfirmedFamily,
                NotificationEvent::BookingConfirmedAgent
            ]
        );
        let family = notifier
            .payload(NotificationEvent::BookingConfirmedFamily)
            .unwrap();
        assert_eq!(family["to"], "jamie@example.com");
        assert_eq!(family["timezone"], "America/Vancouver");
        assert_eq!(family["agentName"], "Morgan Chen");
    }

    #[tokio::test]
    async fn concurrent_bookings_of_one_slot_admit_exactly_one() {
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));
        let first = request(MONDAY_NINE, "first@example.com");
        let second = request(MONDAY_NINE, "second@example.com");

        let (a, b) = tokio::join!(coordinator.book(&first), coordinator.book(&second));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(BookingError::SlotConflict(_)))));
    }

    #[tokio::test]
    async fn starts_within_the_tolerance_conflict() {
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));
        coordinator
            .book(&request(MONDAY_NINE, "first@example.com"))
            .await
            .expect("booked");

        let err = coordinator
            .book(&request("2030-05-06T16:00:30Z", "second@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotConflict(_)));

        // Default length is the agent's 30 minutes, so 16:29 overlaps and 16:30 does not.
        let err = coordinator
            .book(&request("2030-05-06T16:29:00Z", "second@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotConflict(_)));
        coordinator
            .book(&request("2030-05-06T16:30:00Z", "second@example.com"))
            .await
            .expect("adjacent slot is free");
    }

    #[tokio::test]
    async fn declined_payment_keeps_the_booking_and_pauses_the_agent() {
        let repos = repos().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(
            &repos,
            Some(FakePayments::declining("insufficient_funds")),
            notifier.clone(),
        );

        let outcome = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .expect("booking is not blocked by the charge");
        let appointment_id = outcome.appointment.id.clone();
        let report = outcome.side_effects.await.unwrap();

        assert_eq!(
            report.payment,
            PaymentReport::Declined {
                reason: "insufficient_funds".into()
            }
        );
        let stored = repos
            .appointments
            .find_by_id(&appointment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, AppointmentStatus::Confirmed);
        assert_eq!(stored.payment_charge_ref, None);

        let declined = repos
            .declined_payments
            .find_by_appointment(&appointment_id)
            .await
            .unwrap();
        assert_eq!(declined.len(), 1);
        assert_eq!(declined[0].agent_id, AGENT_ID);
        assert_eq!(declined[0].amount_minor_units, 4900);
        assert_eq!(declined[0].reason, "insufficient_funds");

        let agent = repos.agents.find_by_id(AGENT_ID).await.unwrap().unwrap();
        assert!(agent.paused);

        let notice = notifier.payload(NotificationEvent::PaymentDeclined).unwrap();
        assert_eq!(notice["to"], "morgan@example.com");
        assert_eq!(notice["reason"], "insufficient_funds");
    }

    #[tokio::test]
    async fn agent_without_payment_customer_is_treated_as_declined() {
        let repos = repos().await;
        repos
            .agents
            .upsert(&everpath_common::models::Agent {
                payment_customer_ref: None,
                ..bc_agent()
            })
            .await
            .unwrap();
        let payments = FakePayments::succeeding("never");
        let coordinator = coordinator(
            &repos,
            Some(payments.clone()),
            Arc::new(RecordingNotifier::default()),
        );

        let report = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap()
            .side_effects
            .await
            .unwrap();

        assert_eq!(
            report.payment,
            PaymentReport::Declined {
                reason: NO_PAYMENT_CUSTOMER.into()
            }
        );
        assert!(payments.calls().is_empty());
        assert!(repos.agents.find_by_id(AGENT_ID).await.unwrap().unwrap().paused);
    }

    #[tokio::test]
    async fn payment_provider_failure_is_isolated() {
        let repos = repos().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(
            &repos,
            Some(FakePayments::failing("stripe timed out")),
            notifier.clone(),
        );

        let outcome = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap();
        let report = outcome.side_effects.await.unwrap();

        assert!(matches!(report.payment, PaymentReport::Failed(ref m) if m.contains("stripe timed out")));
        assert_eq!(report.notifications.len(), 2);
        assert!(!notifier.events().contains(&NotificationEvent::PaymentDeclined));
        let agent = repos.agents.find_by_id(AGENT_ID).await.unwrap().unwrap();
        assert!(!agent.paused);
    }

    #[tokio::test]
    async fn reschedule_cancels_the_prior_appointment() {
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));
        let prior = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap()
            .appointment;

        // Overlaps the prior booking, which must not block its own replacement.
        let mut moved = request("2030-05-06T16:15:00Z", "jamie@example.com");
        moved.reschedule_appointment_id = Some(prior.id.clone());
        let replacement = coordinator.book(&moved).await.expect("rescheduled").appointment;

        assert_eq!(replacement.rescheduled_from.as_deref(), Some(prior.id.as_str()));
        assert_eq!(replacement.lead_id, prior.lead_id);
        let prior = repos.appointments.find_by_id(&prior.id).await.unwrap().unwrap();
        assert_eq!(prior.status, AppointmentStatus::Cancelled);

        let mut again = request("2030-05-06T20:00:00Z", "jamie@example.com");
        again.reschedule_appointment_id = Some(prior.id.clone());
        let err = coordinator.book(&again).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn reschedule_of_unknown_appointment_is_not_found() {
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));
        let mut moved = request(MONDAY_NINE, "jamie@example.com");
        moved.reschedule_appointment_id = Some("appt-missing".into());

        let err = coordinator.book(&moved).await.unwrap_err();
        assert!(matches!(err, BookingError::AppointmentNotFound(ref id) if id == "appt-missing"));
    }

    #[tokio::test]
    async fn cancel_frees_the_slot() {
        let repos = repos().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(&repos, None, notifier.clone());
        let booked = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap()
            .appointment;

        let cancelled = coordinator.cancel(&booked.id).await.expect("cancelled");
        assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);
        let report = cancelled.side_effects.await.unwrap();
        assert_eq!(report.payment, PaymentReport::Skipped);
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.notifications[0].event, NotificationEvent::BookingCancelled);
        let notice = notifier.payload(NotificationEvent::BookingCancelled).unwrap();
        assert_eq!(notice["familyEmail"], "jamie@example.com");
        assert_eq!(notice["agentEmail"], "morgan@example.com");

        coordinator
            .book(&request(MONDAY_NINE, "other@example.com"))
            .await
            .expect("slot is free again");

        let err = coordinator.cancel(&booked.id).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        let err = coordinator.cancel("appt-missing").await.unwrap_err();
        assert!(matches!(err, BookingError::AppointmentNotFound(_)));
    }

    #[tokio::test]
    async fn unapproved_and_unknown_agents_are_refused() {
        let repos = repos().await;
        repos
            .agents
            .upsert(&everpath_common::models::Agent {
                approval_status: ApprovalStatus::Pending,
                ..bc_agent()
            })
            .await
            .unwrap();
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));

        let err = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::AgentNotApproved(_)));

        let mut ghost = request(MONDAY_NINE, "jamie@example.com");
        ghost.agent_id = "ghost".into();
        let err = coordinator.book(&ghost).await.unwrap_err();
        assert!(matches!(err, BookingError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn malformed_or_inverted_times_are_rejected() {
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()));

        let err = coordinator
            .book(&request("next monday at 9", "jamie@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTimestamp(_)));

        let mut inverted = request(MONDAY_NINE, "jamie@example.com");
        inverted.ends_at = Some("2030-05-06T15:30:00Z".into());
        let err = coordinator.book(&inverted).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTimestamp(_)));

        let err = coordinator.book(&request(MONDAY_NINE, "not-an-email")).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn booking_is_written_to_connected_calendars() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_partial_json(json!({
                "start": {"dateTime": "2030-05-06T09:00:00-07:00", "timeZone": "America/Vancouver"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-evt-1"})))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()))
            .with_calendar(google_sync(&repos, &server).await);

        let outcome = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap();
        let appointment_id = outcome.appointment.id.clone();
        let report = outcome.side_effects.await.unwrap();

        assert_eq!(report.calendar.created.len(), 1);
        assert!(report.calendar.created[0].result.is_ok());
        let mirrored = repos
            .external_events
            .find_for_appointment(&appointment_id)
            .await
            .unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].provider_event_id, "g-evt-1");
        assert!(mirrored[0].is_platform_created);
    }

    #[tokio::test]
    async fn calendar_outage_does_not_affect_the_booking() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let repos = repos().await;
        let payments = FakePayments::succeeding("ch_2");
        let coordinator = coordinator(&repos, Some(payments), Arc::new(RecordingNotifier::default()))
            .with_calendar(google_sync(&repos, &server).await);

        let outcome = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .expect("booked despite the calendar");
        let report = outcome.side_effects.await.unwrap();

        assert!(report.calendar.created[0].result.is_err());
        assert_eq!(
            report.payment,
            PaymentReport::Charged {
                charge_id: "ch_2".into()
            }
        );
    }

    #[tokio::test]
    async fn cancel_deletes_the_calendar_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-evt-1"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/g-evt-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let repos = repos().await;
        let coordinator = coordinator(&repos, None, Arc::new(RecordingNotifier::default()))
            .with_calendar(google_sync(&repos, &server).await);

        let booked = coordinator
            .book(&request(MONDAY_NINE, "jamie@example.com"))
            .await
            .unwrap();
        let appointment_id = booked.appointment.id.clone();
        booked.side_effects.await.unwrap();

        let report = coordinator
            .cancel(&appointment_id)
            .await
            .unwrap()
            .side_effects
            .await
            .unwrap();
        assert_eq!(report.calendar.removed.len(), 1);
        assert!(report.calendar.removed[0].result.is_ok());
        assert!(repos
            .external_events
            .find_for_appointment(&appointment_id)
            .await
            .unwrap()
            .is_empty());
    }
}
