//! Tests for the database-backed admin façade.

mod common;

use bitpres_core::{Admin, Error, PendingReply, ReplicaStoreState};
use bitpres_metadata::DatabaseAdmin;
use common::TestStore;
use std::collections::BTreeSet;

async fn admin() -> (TestStore, DatabaseAdmin) {
    let t = TestStore::new().await.expect("Failed to create store");
    let admin = DatabaseAdmin::new(t.consistency.clone());
    (t, admin)
}

#[tokio::test]
async fn test_add_entry_registers_file_and_reply() {
    let (_t, admin) = admin().await;
    let reply = PendingReply::new("msg-1", "client-queue");

    assert!(!admin.has_entry("f").await.unwrap());
    admin
        .add_entry("f", Some(reply.clone()), "c1")
        .await
        .unwrap();

    assert!(admin.has_entry("f").await.unwrap());
    assert_eq!(admin.get_checksum("f").await.unwrap().as_deref(), Some("c1"));
    assert!(admin.has_reply_info("f").await.unwrap());
    assert_eq!(admin.remove_reply_info("f").await.unwrap(), Some(reply));
    assert_eq!(admin.remove_reply_info("f").await.unwrap(), None);
}

#[tokio::test]
async fn test_states_round_trip_through_store() {
    let (_t, admin) = admin().await;
    admin.add_entry("f", None, "c1").await.unwrap();

    assert!(!admin.has_state("f", "ONE").await.unwrap());
    admin
        .set_state("f", "ONE", ReplicaStoreState::DataUploaded)
        .await
        .unwrap();
    assert!(admin.has_state("f", "ONE").await.unwrap());
    assert_eq!(
        admin.get_state("f", "ONE").await.unwrap(),
        ReplicaStoreState::DataUploaded
    );

    admin
        .set_state("f", "TWO", ReplicaStoreState::UploadCompleted)
        .await
        .unwrap();
    let completed = admin
        .get_all_file_names_in_state("TWO", ReplicaStoreState::UploadCompleted)
        .await
        .unwrap();
    assert_eq!(completed, BTreeSet::from(["f".to_string()]));
    assert!(
        admin
            .get_all_file_names_in_state("CS", ReplicaStoreState::UploadCompleted)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_checksum_is_read_only() {
    let (_t, admin) = admin().await;
    admin.add_entry("f", None, "c1").await.unwrap();

    assert!(matches!(
        admin.set_checksum("f", "c2").await,
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        admin.get_checksum("ghost").await,
        Err(Error::UnknownId(_))
    ));
}

#[tokio::test]
async fn test_invalid_arguments() {
    let (_t, admin) = admin().await;

    assert!(matches!(
        admin.add_entry("", None, "c1").await,
        Err(Error::ArgumentNotValid(_))
    ));
    assert!(matches!(
        admin.add_entry("f", None, "").await,
        Err(Error::ArgumentNotValid(_))
    ));
    assert!(matches!(
        admin.get_state("f", "NOPE").await,
        Err(Error::UnknownId(_))
    ));
}

#[tokio::test]
async fn test_file_names_and_close() {
    let (_t, admin) = admin().await;
    admin.add_entry("b", None, "c2").await.unwrap();
    admin
        .add_entry("a", Some(PendingReply::new("m", "q")), "c1")
        .await
        .unwrap();

    let names = admin.get_all_file_names().await.unwrap();
    assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

    admin.close().await.unwrap();
    assert!(!admin.has_reply_info("a").await.unwrap());
}
