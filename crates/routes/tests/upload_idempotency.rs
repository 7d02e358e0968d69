//! Integration tests for upload persistence and idempotency.
//!
//! These verify the transactional route+activity write, the checksum-based
//! dedupe (including the storage-level unique index backstop), and soft-delete
//! visibility rules.
//!
//! To run them you need a PostgreSQL database with PostGIS and the migrations
//! applied, and DATABASE_URL set:
//!
//! `DATABASE_URL=postgres://... cargo test -p routes`
//!
//! Tests create and clean up their own data using fresh UUIDs, so they can
//! safely run against a development database.

use routes::database::{Database, NewRoute};
use routes::geo::GeoPoint;
use routes::errors::AppError;
use routes::models::{Activity, ActivityMetrics, ActivityType, Visibility};
use routes::route_ingest;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::env;
use time::OffsetDateTime;
use uuid::Uuid;

/// Get database pool, skipping tests if DATABASE_URL is not set.
async fn get_test_pool() -> Option<PgPool> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: DATABASE_URL not set");
            return None;
        }
    };

    match PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            eprintln!("Skipping test: Failed to connect to database: {e}");
            None
        }
    }
}

async fn cleanup_user_data(pool: &PgPool, user_id: Uuid) {
    let _ = sqlx::query("DELETE FROM activities WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM routes WHERE created_by = $1")
        .bind(user_id)
        .execute(pool)
        .await;
}

fn sample_geometry() -> route_ingest::RouteGeometry {
    route_ingest::derive_route_geometry(vec![
        GeoPoint::new(-105.0000, 40.0000),
        GeoPoint::new(-105.0005, 40.0005),
    ])
    .expect("sample polyline is valid")
}

fn new_route(user_id: Uuid) -> NewRoute {
    NewRoute {
        id: Uuid::new_v4(),
        name: "morning-ride".to_string(),
        description: Some("Imported from GPX file".to_string()),
        geometry: sample_geometry(),
        tags: Vec::new(),
        visibility: Visibility::Private,
        created_by: user_id,
    }
}

fn gpx_activity(user_id: Uuid, route_id: Uuid, checksum: &str) -> Activity {
    let now = OffsetDateTime::now_utc();
    Activity {
        id: Uuid::new_v4(),
        user_id,
        route_id: Some(route_id),
        activity_type: ActivityType::Other,
        start_time: now,
        end_time: now + time::Duration::minutes(5),
        duration_seconds: 300,
        distance_meters: Some(70.0),
        calories: None,
        notes: None,
        metrics: Some(ActivityMetrics {
            gpx_checksum: Some(checksum.to_string()),
            ..Default::default()
        }),
        created_at: now,
    }
}

#[tokio::test]
async fn upload_persists_route_and_activity_atomically() {
    let Some(pool) = get_test_pool().await else {
        return;
    };
    let db = Database::new(pool.clone());
    let user_id = Uuid::new_v4();

    let route_req = new_route(user_id);
    let activity = gpx_activity(user_id, route_req.id, &format!("sum-{user_id}"));

    let route = db
        .create_route_with_activity(&route_req, &activity)
        .await
        .expect("upload persistence failed");

    assert_eq!(route.id, route_req.id);
    assert!((route.distance_meters - 70.0).abs() < 1.0);
    assert_eq!(route.visibility, Visibility::Private);
    assert_eq!(route.geometry.coordinates.len(), 2);

    let stored = db
        .get_activity(activity.id)
        .await
        .unwrap()
        .expect("activity should exist");
    assert_eq!(stored.route_id, Some(route.id));
    assert_eq!(stored.duration_seconds, 300);
    assert_eq!(
        stored.metrics.unwrap().gpx_checksum.as_deref(),
        Some(format!("sum-{user_id}").as_str())
    );

    cleanup_user_data(&pool, user_id).await;
}

#[tokio::test]
async fn duplicate_checksum_insert_reports_existing_activity() {
    let Some(pool) = get_test_pool().await else {
        return;
    };
    let db = Database::new(pool.clone());
    let user_id = Uuid::new_v4();
    let checksum = format!("dup-{user_id}");

    let first_route = new_route(user_id);
    let first_activity = gpx_activity(user_id, first_route.id, &checksum);
    db.create_route_with_activity(&first_route, &first_activity)
        .await
        .expect("first upload failed");

    // Same content again: the unique index must reject the second pair and
    // point at the first activity
    let second_route = new_route(user_id);
    let second_activity = gpx_activity(user_id, second_route.id, &checksum);
    let err = db
        .create_route_with_activity(&second_route, &second_activity)
        .await
        .expect_err("second upload should conflict");

    match err {
        AppError::DuplicateGpx { activity_id } => assert_eq!(activity_id, first_activity.id),
        other => panic!("expected DUPLICATE_GPX, got {other:?}"),
    }

    // The transaction rolled back: no orphaned second route
    assert!(db.get_route(second_route.id).await.unwrap().is_none());

    cleanup_user_data(&pool, user_id).await;
}

#[tokio::test]
async fn checksum_lookup_ignores_soft_deleted_activities() {
    let Some(pool) = get_test_pool().await else {
        return;
    };
    let db = Database::new(pool.clone());
    let user_id = Uuid::new_v4();
    let checksum = format!("del-{user_id}");

    let route_req = new_route(user_id);
    let activity = gpx_activity(user_id, route_req.id, &checksum);
    db.create_route_with_activity(&route_req, &activity)
        .await
        .expect("upload failed");

    assert_eq!(
        db.find_activity_by_checksum(user_id, &checksum)
            .await
            .unwrap(),
        Some(activity.id)
    );

    assert!(db.soft_delete_activity(activity.id).await.unwrap());

    // A deleted activity no longer blocks re-upload
    assert_eq!(
        db.find_activity_by_checksum(user_id, &checksum)
            .await
            .unwrap(),
        None
    );
    assert!(db.get_activity(activity.id).await.unwrap().is_none());

    cleanup_user_data(&pool, user_id).await;
}

#[tokio::test]
async fn soft_deleted_routes_are_excluded_from_reads() {
    let Some(pool) = get_test_pool().await else {
        return;
    };
    let db = Database::new(pool.clone());
    let user_id = Uuid::new_v4();

    let route = db
        .create_route(&new_route(user_id))
        .await
        .expect("route creation failed");

    assert!(db.get_route(route.id).await.unwrap().is_some());
    assert!(db.soft_delete_route(route.id).await.unwrap());
    assert!(db.get_route(route.id).await.unwrap().is_none());

    // Listing skips it too
    let (routes, total) = db.list_routes(user_id, 20, 0).await.unwrap();
    assert!(routes.iter().all(|r| r.id != route.id));
    let _ = total;

    cleanup_user_data(&pool, user_id).await;
}

#[tokio::test]
async fn geometry_update_rewrites_all_derived_fields() {
    let Some(pool) = get_test_pool().await else {
        return;
    };
    let db = Database::new(pool.clone());
    let user_id = Uuid::new_v4();

    let route = db
        .create_route(&new_route(user_id))
        .await
        .expect("route creation failed");

    let new_geometry = route_ingest::derive_route_geometry(vec![
        GeoPoint::new(10.0, 59.0),
        GeoPoint::new(10.01, 59.01),
    ])
    .unwrap();

    let updated = db
        .update_route(
            route.id,
            "Lakeside Loop",
            None,
            &new_geometry,
            &["lake".to_string()],
            Visibility::Public,
        )
        .await
        .unwrap()
        .expect("route should still exist");

    assert_eq!(updated.name, "Lakeside Loop");
    assert_eq!(updated.distance_meters, new_geometry.distance_meters);
    assert_eq!(updated.bbox, new_geometry.bbox);
    assert_eq!(updated.center, new_geometry.center);
    assert_eq!(updated.geometry.coordinates.len(), 2);
    assert_eq!(updated.visibility, Visibility::Public);

    cleanup_user_data(&pool, user_id).await;
}
