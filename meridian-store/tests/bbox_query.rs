//! Bounding-box queries end to end: index fan-out, candidate scans, exact
//! filtering, cover replacement.

mod support;

use meridian_spatial::CELL_KEY_PREFIX;
use support::*;

#[tokio::test]
async fn point_queries_hit_and_miss() {
    let (store, _kv, _blobs) = store();
    store
        .insert(&with_id(&null_island(), "null"), "default")
        .await
        .unwrap();
    store.insert(&with_id(&dc(), "dc"), "default").await.unwrap();

    let cases: [([f64; 4], usize); 4] = [
        ([-10.0, -10.0, 10.0, 10.0], 1),
        ([30.0, 30.0, 40.0, 40.0], 0),
        ([10.0, 10.0, 20.0, 20.0], 0),
        ([-79.0, 38.0, -76.0, 40.0], 1),
    ];
    for (bbox, expected) in cases {
        let found = store.bbox_query(bbox, "default").await.unwrap();
        assert_eq!(
            found.features.len(),
            expected,
            "query {bbox:?} expected {expected}"
        );
    }
}

#[tokio::test]
async fn inverted_query_bbox_is_tolerated() {
    let (store, _kv, _blobs) = store();
    store.insert(&with_id(&dc(), "dc"), "default").await.unwrap();

    let found = store
        .bbox_query([-76.0, 38.0, -79.0, 40.0], "default")
        .await
        .unwrap();
    assert_eq!(found.features.len(), 1);
}

#[tokio::test]
async fn queries_are_scoped_to_the_dataset() {
    let (store, _kv, _blobs) = store();
    store.insert(&with_id(&dc(), "dc"), "capitals").await.unwrap();

    let found = store
        .bbox_query([-79.0, 38.0, -76.0, 40.0], "default")
        .await
        .unwrap();
    assert!(found.features.is_empty());
}

#[tokio::test]
async fn unindexed_put_is_invisible_until_indexed() {
    let (store, _kv, _blobs) = store();
    let res = store.put(&haiti(), "default", None).await.unwrap();

    let bbox = [-74.0, 17.0, -71.0, 20.0];
    assert!(store.bbox_query(bbox, "default").await.unwrap().features.is_empty());

    store.add_feature_indexes(&res.id, "default").await.unwrap();
    assert_eq!(store.bbox_query(bbox, "default").await.unwrap().features.len(), 1);
}

#[tokio::test]
async fn polygon_found_by_interior_query() {
    let (store, _kv, _blobs) = store();
    store
        .insert(&with_id(&idaho(), "block"), "default")
        .await
        .unwrap();

    let found = store
        .bbox_query(
            [-115.0955, 45.7196, -114.7769, 45.9473],
            "default",
        )
        .await
        .unwrap();
    assert_eq!(found.features.len(), 1);

    // A disjoint box misses even though cells may overlap coarsely.
    let found = store
        .bbox_query([-10.0, -10.0, 10.0, 10.0], "default")
        .await
        .unwrap();
    assert!(found.features.is_empty());
}

#[tokio::test]
async fn features_of_mixed_sizes_are_all_found() {
    let (store, _kv, _blobs) = store();
    // A tiny feature and a large one index at different levels; a query
    // overlapping both must return both.
    store
        .insert(&with_id(&null_island(), "tiny"), "default")
        .await
        .unwrap();
    store
        .insert(
            &with_id(
                &feature(serde_json::json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [-60.0, -30.0], [60.0, -30.0], [60.0, 30.0],
                            [-60.0, 30.0], [-60.0, -30.0]
                        ]]
                    },
                    "properties": {}
                })),
                "huge",
            ),
            "default",
        )
        .await
        .unwrap();

    let found = store
        .bbox_query([-1.0, -1.0, 1.0, 1.0], "default")
        .await
        .unwrap();
    assert_eq!(found.features.len(), 2);
}

#[tokio::test]
async fn update_relocates_the_feature() {
    let (store, _kv, _blobs) = store();
    let inserted = store
        .insert(&with_id(&null_island(), "roving"), "default")
        .await
        .unwrap();

    let moved = with_id(
        &feature(serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [50.0, 50.0] },
            "properties": {}
        })),
        "roving",
    );
    store
        .update(&moved, "default", inserted.version)
        .await
        .unwrap();

    assert!(store
        .bbox_query([-10.0, -10.0, 10.0, 10.0], "default")
        .await
        .unwrap()
        .features
        .is_empty());
    assert_eq!(
        store
            .bbox_query([45.0, 45.0, 55.0, 55.0], "default")
            .await
            .unwrap()
            .features
            .len(),
        1
    );
}

#[tokio::test]
async fn update_fully_replaces_the_cover() {
    let (store, kv, _blobs) = store();
    let inserted = store
        .insert(&with_id(&haiti_line(), "line"), "default")
        .await
        .unwrap();

    let shifted = with_id(
        &feature(serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [
                    [-72.8, 18.2], [-72.5, 18.4], [-72.2, 18.7], [-72.0, 19.0]
                ]
            },
            "properties": {}
        })),
        "line",
    );
    store
        .update(&shifted, "default", inserted.version)
        .await
        .unwrap();

    // Every remaining cell row belongs to the new cover: its count equals
    // the recomputed cover size, with no stale rows from the old geometry.
    let expected = store
        .index()
        .cover(&meridian_store::extent(&shifted).unwrap())
        .len();
    let rows = meridian_core::KeyValueStore::query_prefix(&kv, "default", CELL_KEY_PREFIX)
        .await
        .unwrap();
    assert_eq!(rows.len(), expected);
}

#[tokio::test]
async fn blob_offloaded_features_decode_in_results() {
    let (store, _kv, blobs) = store_with_config(
        meridian_store::StoreConfig::default().with_blob_threshold(0),
    );
    store
        .insert(&with_id(&idaho(), "block"), "default")
        .await
        .unwrap();
    assert_eq!(blobs.len(), 1);

    let found = store
        .bbox_query([-116.0, 45.0, -114.0, 47.0], "default")
        .await
        .unwrap();
    assert_eq!(found.features.len(), 1);
    assert_eq!(
        found.features[0].properties.as_ref().unwrap().get("GEOID"),
        Some(&serde_json::json!("16049960100"))
    );
}
