//! Cross-service synchronization, end to end: a mutation on one side stages
//! an outbox row, the relay publishes it onto the bus, and the other side's
//! consumer applies it idempotently.

use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::mpsc::UnboundedReceiver;

use ss_auth::{AuthEventHandler, AuthService, PasswordService, UserStore};
use ss_bus::topic::ALL_TOPICS;
use ss_bus::{
    codec, topic_for, ConsumerConfig, Delivery, EventDispatcher, EventPublisher, InMemoryBus,
    MemoryDeadLetterSink,
};
use ss_common::{EventKind, Role, UserLifecycleEvent};
use ss_employee::{
    CreateEmployeeRequest, DepartmentStore, EmployeeEventHandler, EmployeePatch, EmployeeService,
    EmployeeStore,
};
use ss_outbox::sqlite::SqliteOutboxRepository;
use ss_outbox::{OutboxRelay, OutboxRelayConfig};

struct Harness {
    auth: AuthService,
    employees: EmployeeService,
    auth_relay: OutboxRelay,
    employee_relay: OutboxRelay,
    auth_dispatcher: Arc<EventDispatcher>,
    employee_dispatcher: Arc<EventDispatcher>,
    auth_rx: Vec<UnboundedReceiver<Delivery>>,
    employee_rx: Vec<UnboundedReceiver<Delivery>>,
}

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn harness() -> Harness {
    let bus = Arc::new(InMemoryBus::new());

    // Auth side
    let auth_pool = memory_pool().await;
    let user_store = UserStore::new(auth_pool.clone());
    user_store.init_schema().await.unwrap();
    let auth_outbox = Arc::new(SqliteOutboxRepository::new(auth_pool.clone()));
    auth_outbox.init_schema().await.unwrap();
    let auth = AuthService::new(
        UserStore::new(auth_pool.clone()),
        PasswordService::new(),
        Arc::new(ss_common::TokenService::new("test-secret")),
    );

    // Employee side
    let employee_pool = memory_pool().await;
    let employee_store = EmployeeStore::new(employee_pool.clone());
    employee_store.init_schema().await.unwrap();
    DepartmentStore::new(employee_pool.clone()).init_schema().await.unwrap();
    let employee_outbox = Arc::new(SqliteOutboxRepository::new(employee_pool.clone()));
    employee_outbox.init_schema().await.unwrap();
    let employees = EmployeeService::new(
        EmployeeStore::new(employee_pool.clone()),
        DepartmentStore::new(employee_pool.clone()),
    );

    // Both sides consume every topic, as in production. Subscriptions go in
    // before anything is published.
    let mut auth_rx = Vec::new();
    let mut employee_rx = Vec::new();
    for topic in ALL_TOPICS {
        auth_rx.push(bus.subscribe(topic));
        employee_rx.push(bus.subscribe(topic));
    }

    let auth_handler = Arc::new(AuthEventHandler::new(
        UserStore::new(auth_pool.clone()),
        PasswordService::new(),
    ));
    let mut auth_dispatcher =
        EventDispatcher::new(ConsumerConfig::default(), Arc::new(MemoryDeadLetterSink::new()));
    for topic in ALL_TOPICS {
        auth_dispatcher = auth_dispatcher.route(topic, auth_handler.clone());
    }

    let employee_handler = Arc::new(EmployeeEventHandler::new(EmployeeStore::new(
        employee_pool.clone(),
    )));
    let mut employee_dispatcher =
        EventDispatcher::new(ConsumerConfig::default(), Arc::new(MemoryDeadLetterSink::new()));
    for topic in ALL_TOPICS {
        employee_dispatcher = employee_dispatcher.route(topic, employee_handler.clone());
    }

    Harness {
        auth,
        employees,
        auth_relay: OutboxRelay::new(auth_outbox, bus.clone(), OutboxRelayConfig::default()),
        employee_relay: OutboxRelay::new(employee_outbox, bus, OutboxRelayConfig::default()),
        auth_dispatcher: Arc::new(auth_dispatcher),
        employee_dispatcher: Arc::new(employee_dispatcher),
        auth_rx,
        employee_rx,
    }
}

impl Harness {
    /// Drain both outboxes onto the bus, then feed every delivery through the
    /// consumers. The in-memory bus hands messages over synchronously, so
    /// everything published is already in the channels when the relays return.
    async fn sync(&mut self) {
        self.auth_relay.process_batch().await.unwrap();
        self.employee_relay.process_batch().await.unwrap();

        for rx in &mut self.auth_rx {
            while let Ok(d) = rx.try_recv() {
                self.auth_dispatcher.dispatch(&d.topic, &d.key, &d.payload).await;
            }
        }
        for rx in &mut self.employee_rx {
            while let Ok(d) = rx.try_recv() {
                self.employee_dispatcher.dispatch(&d.topic, &d.key, &d.payload).await;
            }
        }
    }
}

fn signup(email: &str, role: Role) -> ss_auth::CreateUserRequest {
    ss_auth::CreateUserRequest {
        email: email.to_string(),
        password: "correct-horse".to_string(),
        role,
    }
}

fn hire(user_id: i64, email: &str) -> CreateEmployeeRequest {
    CreateEmployeeRequest {
        user_id,
        email: email.to_string(),
        first_name: "Eve".to_string(),
        last_name: "Adler".to_string(),
        password: "plaintext-pw".to_string(),
        role: None,
        employee_id: None,
        status: None,
        department_id: None,
    }
}

#[tokio::test]
async fn signup_provisions_a_matching_employee_record() {
    let mut h = harness().await;

    let user = h.auth.create_user(signup("a@staffsync.io", Role::Employee)).await.unwrap();
    h.sync().await;

    let employee = h
        .employees
        .store()
        .find_by_user_id(user.id)
        .await
        .unwrap()
        .expect("employee record should exist after sync");
    assert_eq!(employee.email, "a@staffsync.io");
    assert_eq!(employee.employee_id, format!("EMP-{}", user.id));
}

#[tokio::test]
async fn admin_signup_does_not_create_an_employee() {
    let mut h = harness().await;

    let user = h.auth.create_user(signup("root@staffsync.io", Role::Admin)).await.unwrap();
    h.sync().await;

    assert!(h.employees.store().find_by_user_id(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn hiring_an_employee_provisions_a_login() {
    let mut h = harness().await;

    h.employees.create_employee(hire(10, "e@staffsync.io")).await.unwrap();
    h.sync().await;

    let user = h
        .auth
        .store()
        .find_by_id(10)
        .await
        .unwrap()
        .expect("user should exist after sync");
    assert_eq!(user.email, "e@staffsync.io");
    assert_eq!(user.role, Role::Employee);
    // The plaintext from the hire request is hashed before storage.
    assert!(user.password_hash.starts_with("$argon2"));
    assert!(PasswordService::new().verify("plaintext-pw", &user.password_hash));
}

#[tokio::test]
async fn deleting_a_user_removes_the_employee_record() {
    let mut h = harness().await;

    let user = h.auth.create_user(signup("a@staffsync.io", Role::Employee)).await.unwrap();
    h.sync().await;
    assert!(h.employees.store().find_by_user_id(user.id).await.unwrap().is_some());

    h.auth.delete_user(user.id).await.unwrap();
    h.sync().await;
    assert!(h.employees.store().find_by_user_id(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn email_change_propagates_to_the_login() {
    let mut h = harness().await;

    let record = h.employees.create_employee(hire(10, "e@staffsync.io")).await.unwrap();
    h.sync().await;

    let patch = EmployeePatch {
        email: Some("renamed@staffsync.io".to_string()),
        ..Default::default()
    };
    h.employees.update_employee(record.id, patch).await.unwrap();
    h.sync().await;

    let user = h.auth.store().find_by_id(10).await.unwrap().unwrap();
    assert_eq!(user.email, "renamed@staffsync.io");
}

#[tokio::test]
async fn duplicate_delivery_is_applied_once() {
    let h = harness().await;

    let event = UserLifecycleEvent::created(
        7,
        "dup@staffsync.io".to_string(),
        "plaintext-pw".to_string(),
        Role::Employee,
    );
    let topic = topic_for(EventKind::Create);
    let payload = codec::encode(&event).unwrap();

    // At-least-once delivery means the same message can arrive twice.
    h.employee_dispatcher.dispatch(topic, &event.partition_key(), &payload).await;
    h.employee_dispatcher.dispatch(topic, &event.partition_key(), &payload).await;

    let all = h.employees.store().list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].user_id, 7);
}

#[tokio::test]
async fn round_trip_does_not_echo_events_back() {
    let mut h = harness().await;

    h.auth.create_user(signup("a@staffsync.io", Role::Employee)).await.unwrap();
    h.sync().await;
    // The employee-side consumer applies the CREATE without staging a new
    // outbox row, so a second sync moves nothing.
    let moved = h.employee_relay.process_batch().await.unwrap();
    assert_eq!(moved, 0);
}
