//! Storage layer tests for the Novus server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::db::NovusDatabase;
use super::test_helpers::{file_db, seed_challenge, seed_team};
use super::{
    AttemptOutcome, ChallengeUpdate, DatabaseError, NewChallengeFile, NewMember, SubmissionFilter,
    TeamUpdate,
};
use crate::feed::TeamChange;
use novus_core::db::unix_timestamp;

async fn test_db() -> NovusDatabase {
    NovusDatabase::open_in_memory().await.unwrap()
}

// === Team tests ===

#[tokio::test]
async fn create_team_inserts_leader_as_member() {
    let db = test_db().await;
    let team = seed_team(&db, "t1", "Null Pointers").await;

    assert_eq!(team.score, 0);
    assert_eq!(team.revision, 1);
    assert_eq!(team.team_id, "NVS-2026-T1");

    let members = db.list_team_members("t1").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "Ada Lovelace");
    assert_eq!(members[0].email.as_deref(), Some("t1@novus.test"));
}

#[tokio::test]
async fn team_names_are_unique_ignoring_case() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let err = db
        .create_team(
            "t2",
            &super::NewTeam {
                team_id: "NVS-2026-OTHER1",
                name: "null pointers",
                leader_name: "Grace",
                leader_email: "grace@novus.test",
                institution: "Navy",
                team_size: 2,
                password_hash: "h",
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(db.get_team("t2").await.is_err());
}

#[tokio::test]
async fn lookup_by_team_code() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let team = db.get_team_by_code("NVS-2026-T1").await.unwrap();
    assert_eq!(team.id, "t1");
    assert!(matches!(
        db.get_team_by_code("NVS-2026-NOPE00").await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn adding_members_sets_team_size_and_bumps_revision() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let team = db
        .add_team_members(
            "t1",
            &[
                NewMember {
                    name: "Grace Hopper",
                    email: Some("grace@novus.test"),
                },
                NewMember {
                    name: "Alan Turing",
                    email: None,
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(team.team_size, 3);
    assert_eq!(team.revision, 2);
    assert_eq!(db.list_team_members("t1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn adding_too_many_members_writes_nothing() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let members: Vec<NewMember<'_>> = ["A1", "B2", "C3", "D4"]
        .iter()
        .map(|&name| NewMember { name, email: None })
        .collect();
    let err = db.add_team_members("t1", &members).await.unwrap_err();
    assert!(err.is_conflict());

    assert_eq!(db.list_team_members("t1").await.unwrap().len(), 1);
    assert_eq!(db.get_team("t1").await.unwrap().revision, 1);
}

#[tokio::test]
async fn update_team_changes_only_given_fields() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let team = db
        .update_team(
            "t1",
            &TeamUpdate {
                institution: Some("MIT"),
                ..TeamUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(team.institution, "MIT");
    assert_eq!(team.name, "Null Pointers");
    assert_eq!(team.revision, 2);

    assert!(matches!(
        db.update_team("missing", &TeamUpdate::default()).await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn public_teams_are_ranked_with_tie_break() {
    let db = test_db().await;
    seed_team(&db, "t1", "Bravo").await;
    seed_team(&db, "t2", "Alpha").await;
    seed_team(&db, "t3", "Charlie").await;

    sqlx::query("UPDATE teams SET score = 100, score_updated_at = 50 WHERE id = 't1'")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("UPDATE teams SET score = 100, score_updated_at = 20 WHERE id = 't3'")
        .execute(db.pool())
        .await
        .unwrap();

    let ranked: Vec<String> = db
        .list_public_teams()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ranked, ["t3", "t1", "t2"]);
}

#[tokio::test]
async fn public_projection_never_carries_leader_email() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;

    let teams = db.list_public_teams().await.unwrap();
    let json = serde_json::to_string(&teams).unwrap();
    assert!(!json.contains("t1@novus.test"));
    assert!(!json.contains("password"));
}

#[tokio::test]
async fn delete_team_reverts_solve_counts() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_team(&db, "t2", "Segfaults").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
    seed_challenge(&db, "c2", 200, "NOVUS{two}").await;

    db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();
    db.record_attempt("s2", "t2", "c1", "NOVUS{one}", true).await.unwrap();
    db.record_attempt("s3", "t1", "c2", "nope", false).await.unwrap();

    assert!(db.delete_team("t1").await.unwrap());

    assert_eq!(db.get_challenge("c1").await.unwrap().solve_count, 1);
    assert_eq!(db.get_challenge("c2").await.unwrap().solve_count, 0);
    assert!(db.list_team_members("t1").await.unwrap().is_empty());
    let remaining = db.list_submissions(&SubmissionFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].team_id, "t2");

    assert!(!db.delete_team("t1").await.unwrap());
}

#[tokio::test]
async fn team_mutations_publish_feed_events() {
    let db = test_db().await;
    let mut sub = db.feed().subscribe();

    seed_team(&db, "t1", "Null Pointers").await;
    db.update_team(
        "t1",
        &TeamUpdate {
            name: Some("Dangling Pointers"),
            ..TeamUpdate::default()
        },
    )
    .await
    .unwrap();
    db.delete_team("t1").await.unwrap();

    match sub.try_recv().unwrap().unwrap() {
        TeamChange::Insert { new } => assert_eq!((new.id.as_str(), new.revision), ("t1", 1)),
        other => panic!("expected insert, got {other:?}"),
    }
    match sub.try_recv().unwrap().unwrap() {
        TeamChange::Update { new } => {
            assert_eq!(new.name, "Dangling Pointers");
            assert_eq!(new.revision, 2);
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert_eq!(
        sub.try_recv().unwrap(),
        Some(TeamChange::Delete {
            id: "t1".into(),
            revision: 3
        })
    );
    assert_eq!(sub.try_recv().unwrap(), None);
}

// === Challenge tests ===

#[tokio::test]
async fn public_challenges_hide_invisible_and_mark_solved() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_team(&db, "t2", "Segfaults").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
    seed_challenge(&db, "c2", 200, "NOVUS{two}").await;
    db.set_challenge_state("c2", false, false).await.unwrap();

    db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();

    let for_t1 = db.list_public_challenges("t1").await.unwrap();
    assert_eq!(for_t1.len(), 1);
    assert_eq!(for_t1[0].id, "c1");
    assert!(for_t1[0].solved);
    assert_eq!(for_t1[0].solve_count, 1);

    let for_t2 = db.list_public_challenges("t2").await.unwrap();
    assert!(!for_t2[0].solved);
}

#[tokio::test]
async fn points_are_frozen_once_solved() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;

    let edited = db
        .update_challenge(
            "c1",
            &ChallengeUpdate {
                points: Some(150),
                ..ChallengeUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.points, 150);

    db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();

    let err = db
        .update_challenge(
            "c1",
            &ChallengeUpdate {
                points: Some(500),
                ..ChallengeUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let renamed = db
        .update_challenge(
            "c1",
            &ChallengeUpdate {
                title: Some("Renamed"),
                points: Some(150),
                ..ChallengeUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed");
    assert_eq!(renamed.solve_count, 1);
}

#[tokio::test]
async fn solved_challenge_cannot_be_deleted() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
    seed_challenge(&db, "c2", 100, "NOVUS{two}").await;

    db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();
    db.record_attempt("s2", "t1", "c2", "wrong", false).await.unwrap();
    db.add_challenge_file(
        "f1",
        "c2",
        &NewChallengeFile {
            file_name: "cipher.txt",
            file_path: "c2/cipher.txt",
            file_size: "1.2 KB",
        },
    )
    .await
    .unwrap();

    assert!(db.delete_challenge("c1").await.unwrap_err().is_conflict());

    assert!(db.delete_challenge("c2").await.unwrap());
    assert!(db.list_challenge_files("c2").await.unwrap().is_empty());
    assert!(!db.delete_challenge("c2").await.unwrap());
}

#[tokio::test]
async fn challenge_files_round_trip() {
    let db = test_db().await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;

    for (id, name) in [("f2", "b.bin"), ("f1", "a.pcap")] {
        db.add_challenge_file(
            id,
            "c1",
            &NewChallengeFile {
                file_name: name,
                file_path: &format!("c1/{name}"),
                file_size: "10 B",
            },
        )
        .await
        .unwrap();
    }

    let files = db.list_challenge_files("c1").await.unwrap();
    assert_eq!(files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), ["f1", "f2"]);

    assert!(db.delete_challenge_file("f1").await.unwrap());
    assert!(!db.delete_challenge_file("f1").await.unwrap());
}

// === Submission tests ===

#[tokio::test]
async fn first_correct_attempt_scores_once() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;

    let outcome = db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();
    let AttemptOutcome::Scored { team, points, .. } = outcome else {
        panic!("expected score, got {outcome:?}");
    };
    assert_eq!(points, 100);
    assert_eq!(team.score, 100);
    assert_eq!(team.revision, 2);

    let again = db.record_attempt("s2", "t1", "c1", "NOVUS{one}", true).await.unwrap();
    assert!(matches!(again, AttemptOutcome::AlreadySolved));

    assert_eq!(db.get_team("t1").await.unwrap().score, 100);
    assert_eq!(db.get_challenge("c1").await.unwrap().solve_count, 1);
    let log = db.list_submissions(&SubmissionFilter::default()).await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(db.find_correct_submission("t1", "c1").await.unwrap().is_some());
}

#[tokio::test]
async fn wrong_attempts_are_logged_without_scoring() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
    let mut sub = db.feed().subscribe();

    let outcome = db.record_attempt("s1", "t1", "c1", "NOVUS{two}", false).await.unwrap();
    let AttemptOutcome::Recorded(submission) = outcome else {
        panic!("expected recorded attempt, got {outcome:?}");
    };
    assert!(!submission.is_correct);
    assert_eq!(submission.submitted_flag, "NOVUS{two}");

    assert_eq!(db.get_team("t1").await.unwrap().score, 0);
    assert_eq!(db.get_challenge("c1").await.unwrap().solve_count, 0);
    assert_eq!(sub.try_recv().unwrap(), None);
    assert_eq!(db.count_recent_wrong("t1", "c1", unix_timestamp() - 60).await.unwrap(), 1);
    assert_eq!(db.count_recent_wrong("t1", "c1", unix_timestamp() + 60).await.unwrap(), 0);
}

#[tokio::test]
async fn submission_listing_filters_and_limits() {
    let db = test_db().await;
    seed_team(&db, "t1", "Null Pointers").await;
    seed_team(&db, "t2", "Segfaults").await;
    seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
    seed_challenge(&db, "c2", 100, "NOVUS{two}").await;

    db.record_attempt("s1", "t1", "c1", "a", false).await.unwrap();
    db.record_attempt("s2", "t1", "c2", "b", false).await.unwrap();
    db.record_attempt("s3", "t2", "c1", "c", false).await.unwrap();

    let by_team = db
        .list_submissions(&SubmissionFilter {
            team_id: Some("t1".into()),
            ..SubmissionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_team.len(), 2);
    assert_eq!(by_team[0].id, "s2");

    let by_challenge = db
        .list_submissions(&SubmissionFilter {
            challenge_id: Some("c1".into()),
            limit: Some(1),
            ..SubmissionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_challenge.len(), 1);
    assert_eq!(by_challenge[0].id, "s3");
}

#[tokio::test]
async fn concurrent_solves_by_different_teams_all_count() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path(), 8).await;
    seed_challenge(&db, "c1", 50, "NOVUS{shared}").await;
    for i in 0..8 {
        seed_team(&db, &format!("t{i}"), &format!("Team {i}")).await;
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.record_attempt(&format!("s{i}"), &format!("t{i}"), "c1", "NOVUS{shared}", true)
                    .await
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), AttemptOutcome::Scored { .. }));
    }

    assert_eq!(db.get_challenge("c1").await.unwrap().solve_count, 8);
    for team in db.list_teams().await.unwrap() {
        assert_eq!(team.score, 50);
    }
}

// === Identity and admin tests ===

#[tokio::test]
async fn identity_emails_are_unique_ignoring_case() {
    let db = test_db().await;
    db.insert_identity("u1", "Admin@Novus.test", "hash").await.unwrap();

    let err = db.insert_identity("u2", "admin@novus.test", "hash").await.unwrap_err();
    assert!(err.is_conflict());

    let found = db.get_identity_by_email("ADMIN@novus.test").await.unwrap().unwrap();
    assert_eq!(found.id, "u1");
    assert!(db.get_identity_by_email("nobody@novus.test").await.unwrap().is_none());
    assert_eq!(db.get_identity("u1").await.unwrap().email, "Admin@Novus.test");
}

#[tokio::test]
async fn grant_admin_is_idempotent() {
    let db = test_db().await;
    db.insert_identity("u1", "admin@novus.test", "hash").await.unwrap();

    assert!(!db.is_admin("u1").await.unwrap());
    assert!(db.grant_admin("u1").await.unwrap());
    assert!(!db.grant_admin("u1").await.unwrap());
    assert!(db.is_admin("u1").await.unwrap());
    assert_eq!(db.list_admins().await.unwrap().len(), 1);
}
