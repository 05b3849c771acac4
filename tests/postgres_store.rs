//! `PostgresStore` against a real database.
//!
//! Ignored by default. Run with a reachable server:
//! `DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored`

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use cohort_gateway::config::PoolSeed;
use cohort_gateway::domain::{AdmissionOutcome, ParticipantProfile, PoolId};
use cohort_gateway::persistence::{PostgresStore, RegistrationStore, StoreError};
use cohort_gateway::service::CapacityAllocator;

fn seed(name: &str, max_capacity: u32) -> PoolSeed {
    PoolSeed {
        name: name.to_string(),
        max_capacity,
        contact_link: format!("https://chat.example/{name}"),
    }
}

fn profile(n: u32) -> ParticipantProfile {
    ParticipantProfile {
        full_name: format!("Pg {n}"),
        email: format!("pg{n}@example.com"),
        whatsapp_number: format!("+3360000{n:04}"),
        gender: "female".to_string(),
        country: "France".to_string(),
        state: "IDF".to_string(),
        age_group: "25-30".to_string(),
        religion: "Christian".to_string(),
        church_name: None,
        instagram_handle: String::new(),
        relationship_status: "single".to_string(),
    }
}

async fn store_with(pool: PgPool, seeds: &[PoolSeed]) -> PostgresStore {
    let store = PostgresStore::new(pool, Duration::from_secs(5));
    let Ok(inserted) = store.seed_pools_if_empty(seeds).await else {
        panic!("seeding failed");
    };
    assert_eq!(inserted, seeds.len());
    store
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn seeding_runs_once(pool: PgPool) {
    let store = store_with(pool, &[seed("a", 1), seed("b", 2)]).await;
    assert!(matches!(store.seed_pools_if_empty(&[seed("c", 3)]).await, Ok(0)));

    let Ok(pools) = store.list_pools().await else {
        panic!("list_pools failed");
    };
    let names: Vec<_> = pools.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn races_never_overfill(pool: PgPool) {
    let store = store_with(pool, &[seed("a", 2), seed("b", 3)]).await;
    let store: Arc<dyn RegistrationStore> = Arc::new(store);
    let allocator = CapacityAllocator::new(Arc::clone(&store), Duration::from_secs(5));

    let handles: Vec<_> = (0..10)
        .map(|n| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.admit(&profile(n)).await })
        })
        .collect();
    let mut admitted = 0;
    for handle in handles {
        let Ok(outcome) = handle.await else {
            panic!("task panicked");
        };
        match outcome {
            AdmissionOutcome::Admitted(_) => admitted += 1,
            AdmissionOutcome::CapacityExhausted => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(admitted, 5);

    let Ok(pools) = store.list_pools().await else {
        panic!("list_pools failed");
    };
    for p in pools {
        assert_eq!(p.current_count, p.max_capacity);
        let Ok(roster) = store.list_participants(p.id).await else {
            panic!("roster failed");
        };
        assert_eq!(roster.len(), usize::try_from(p.current_count).unwrap_or(0));
    }
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_is_rejected_without_consuming_slot(pool: PgPool) {
    let store: Arc<dyn RegistrationStore> = Arc::new(store_with(pool, &[seed("a", 5)]).await);
    let allocator = CapacityAllocator::new(Arc::clone(&store), Duration::from_secs(5));

    assert!(allocator.admit(&profile(1)).await.is_admitted());
    let mut same_email = profile(2);
    same_email.email = profile(1).email;
    assert_eq!(
        allocator.admit(&same_email).await,
        AdmissionOutcome::DuplicateRegistration
    );

    let Ok(pools) = store.list_pools().await else {
        panic!("list_pools failed");
    };
    assert_eq!(pools.first().map(|p| p.current_count), Some(1));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn unknown_pool_roster_is_not_found(pool: PgPool) {
    let store = store_with(pool, &[seed("a", 1)]).await;
    assert!(matches!(
        store.list_participants(PoolId::new(999)).await,
        Err(StoreError::PoolNotFound(_))
    ));
    assert!(store.ping().await.is_ok());
}
