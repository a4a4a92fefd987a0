//! Owner lifecycle over a shared blob store: avatars and post data holding
//! references, replacement, detach and bulk deletion.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::task::JoinSet;

use tagstore::application::blob_store::BlobStore;
use tagstore::application::errors::{BlobStoreError, ContentUseCaseError};
use tagstore::application::ownership::ContentLifecycle;
use tagstore::digest;
use tagstore::domain::value_objects::{MediaType, OwnerKey};
use tagstore::infrastructure::persistence::MemoryStore;
use tagstore::infrastructure::validation::AllowListValidator;
use tagstore::use_cases::{AvatarUseCase, FetchContentUseCase, PostContentUseCase, PostDataItem};

struct Harness {
    memory: MemoryStore,
    store: Arc<BlobStore>,
    avatars: AvatarUseCase,
    posts: PostContentUseCase,
    fetch: FetchContentUseCase,
}

fn harness() -> Harness {
    let memory = MemoryStore::new();
    let store = Arc::new(BlobStore::new(Arc::new(memory.clone())));
    let validator = Arc::new(AllowListValidator::default());
    Harness {
        avatars: AvatarUseCase::new(Arc::clone(&store), validator.clone()),
        posts: PostContentUseCase::new(Arc::clone(&store), validator),
        fetch: FetchContentUseCase::new(Arc::clone(&store)),
        memory,
        store,
    }
}

fn png() -> MediaType {
    MediaType::parse("image/png").unwrap()
}

fn text(data: &'static str) -> PostDataItem {
    PostDataItem {
        data: Bytes::from_static(data.as_bytes()),
        media_type: MediaType::parse("text/plain").unwrap(),
    }
}

#[tokio::test]
async fn test_avatar_replacement_moves_reference() {
    let h = harness();
    let first = Bytes::from_static(b"avatar one");
    let second = Bytes::from_static(b"avatar two");

    let change = h.avatars.set(7, first.clone(), &png()).await.unwrap();
    assert_eq!(change.tag, Some(digest(&first)));
    assert_eq!(change.previous, None);

    let change = h.avatars.set(7, second.clone(), &png()).await.unwrap();
    assert_eq!(change.previous, Some(digest(&first)));

    assert_eq!(h.memory.ref_count(&digest(&first)).await, None);
    assert_eq!(h.memory.ref_count(&digest(&second)).await, Some(1));

    let body = h.fetch.read(OwnerKey::avatar(7), 7).await.unwrap();
    assert_eq!(body.data, second);
    assert_eq!(body.digest.tag, digest(&second));
}

#[tokio::test]
async fn test_setting_same_avatar_twice_keeps_one_reference() {
    let h = harness();
    let data = Bytes::from_static(b"same avatar");

    h.avatars.set(1, data.clone(), &png()).await.unwrap();
    let change = h.avatars.set(1, data.clone(), &png()).await.unwrap();

    assert_eq!(change.tag, change.previous);
    assert_eq!(h.memory.ref_count(&digest(&data)).await, Some(1));
}

#[tokio::test]
async fn test_users_share_identical_avatar() {
    let h = harness();
    let data = Bytes::from_static(b"default avatar");

    h.avatars.set(1, data.clone(), &png()).await.unwrap();
    h.avatars.set(2, data.clone(), &png()).await.unwrap();
    assert_eq!(h.memory.entry_count().await, 1);
    assert_eq!(h.memory.ref_count(&digest(&data)).await, Some(2));

    h.avatars.delete(1).await.unwrap();
    assert_eq!(h.memory.ref_count(&digest(&data)).await, Some(1));

    let body = h.fetch.read(OwnerKey::avatar(2), 2).await.unwrap();
    assert_eq!(body.data, data);
}

#[tokio::test]
async fn test_deleted_avatar_is_not_found() {
    let h = harness();
    h.avatars
        .set(3, Bytes::from_static(b"gone soon"), &png())
        .await
        .unwrap();

    h.avatars.delete(3).await.unwrap();

    assert_eq!(h.memory.entry_count().await, 0);
    assert!(matches!(
        h.avatars.delete(3).await,
        Err(ContentUseCaseError::NotFound(_))
    ));
    assert!(matches!(
        h.fetch.digest(OwnerKey::avatar(3), 3).await,
        Err(ContentUseCaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_post_data_shared_with_avatar() {
    let h = harness();
    let bytes = Bytes::from_static(b"\x89PNG shared");
    let item = PostDataItem {
        data: bytes.clone(),
        media_type: png(),
    };

    h.avatars.set(5, bytes.clone(), &png()).await.unwrap();
    h.posts.replace_data(5, 50, vec![item]).await.unwrap();
    assert_eq!(h.memory.ref_count(&digest(&bytes)).await, Some(2));

    h.posts.delete_post(5, 50).await.unwrap();
    assert_eq!(h.memory.ref_count(&digest(&bytes)).await, Some(1));
}

#[tokio::test]
async fn test_replace_data_shrinks_list() {
    let h = harness();

    h.posts
        .replace_data(1, 10, vec![text("a"), text("b"), text("c")])
        .await
        .unwrap();
    let tags = h.posts.replace_data(1, 10, vec![text("b")]).await.unwrap();

    assert_eq!(tags, vec![digest(b"b")]);
    assert_eq!(h.memory.ref_count(&digest(b"a")).await, None);
    assert_eq!(h.memory.ref_count(&digest(b"b")).await, Some(1));
    assert_eq!(h.memory.ref_count(&digest(b"c")).await, None);

    let slot = OwnerKey::post_data(10, 1).unwrap();
    assert!(matches!(
        h.fetch.read(slot, 1).await,
        Err(ContentUseCaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_repeated_item_in_one_list_counts_twice() {
    let h = harness();

    h.posts
        .replace_data(1, 11, vec![text("dup"), text("dup")])
        .await
        .unwrap();

    assert_eq!(h.memory.ref_count(&digest(b"dup")).await, Some(2));
}

#[tokio::test]
async fn test_rejected_item_leaves_post_untouched() {
    let h = harness();
    h.posts
        .replace_data(1, 12, vec![text("keep")])
        .await
        .unwrap();

    let bad = PostDataItem {
        data: Bytes::from_static(b"%PDF"),
        media_type: MediaType::parse("application/pdf").unwrap(),
    };
    let err = h
        .posts
        .replace_data(1, 12, vec![text("new"), bad])
        .await
        .unwrap_err();

    assert!(matches!(err, ContentUseCaseError::Rejected(_)));
    assert_eq!(h.memory.ref_count(&digest(b"keep")).await, Some(1));
    assert_eq!(h.memory.ref_count(&digest(b"new")).await, None);
}

#[tokio::test]
async fn test_other_user_cannot_touch_post() {
    let h = harness();
    h.posts
        .replace_data(1, 13, vec![text("mine")])
        .await
        .unwrap();

    assert!(matches!(
        h.posts.replace_data(2, 13, vec![text("theirs")]).await,
        Err(ContentUseCaseError::NotFound(_))
    ));
    assert!(matches!(
        h.posts.delete_post(2, 13).await,
        Err(ContentUseCaseError::NotFound(_))
    ));
    assert_eq!(h.memory.ref_count(&digest(b"mine")).await, Some(1));
}

#[tokio::test]
async fn test_soft_then_hard_delete() {
    let h = harness();
    h.posts
        .replace_data(1, 20, vec![text("p20-a"), text("p20-b")])
        .await
        .unwrap();
    h.posts
        .replace_data(1, 21, vec![text("p21")])
        .await
        .unwrap();
    h.posts
        .replace_data(2, 30, vec![text("other user")])
        .await
        .unwrap();

    assert_eq!(h.posts.delete_post(1, 20).await.unwrap(), 2);
    // Already detached slots are not counted again.
    assert_eq!(h.posts.delete_all_posts(1).await.unwrap(), 1);

    assert_eq!(h.memory.ref_count(&digest(b"p20-a")).await, None);
    assert_eq!(h.memory.ref_count(&digest(b"p21")).await, None);
    assert_eq!(h.memory.ref_count(&digest(b"other user")).await, Some(1));
    assert_eq!(h.memory.entry_count().await, 1);

    // Hard delete drops the rows, including those emptied by the soft delete.
    for (post_id, slot) in [(20, 0), (20, 1), (21, 0)] {
        let owner = OwnerKey::post_data(post_id, slot).unwrap();
        assert!(h.memory.content(&owner).await.is_none());
    }
    assert!(h
        .memory
        .content(&OwnerKey::post_data(30, 0).unwrap())
        .await
        .is_some());
}

#[tokio::test]
async fn test_failed_session_rolls_back_field_and_count() {
    let h = harness();
    let owner = OwnerKey::avatar(9);

    let result: Result<(), ContentUseCaseError> = h
        .store
        .run_in_session("set_then_fail", move |session| {
            Box::pin(async move {
                ContentLifecycle::set_content(
                    session,
                    owner,
                    9,
                    &Bytes::from_static(b"never committed"),
                    png(),
                    Utc::now(),
                )
                .await?;
                Err::<(), _>(ContentUseCaseError::InvalidRequest(
                    "abort after write".to_string(),
                ))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(h.memory.entry_count().await, 0);
    assert_eq!(h.memory.content(&owner).await, None);
}

#[tokio::test]
async fn test_freeing_referenced_entry_is_integrity_fault() {
    let h = harness();
    let data = Bytes::from_static(b"held by avatar");
    h.avatars.set(4, data.clone(), &png()).await.unwrap();

    let err = h.store.free(&digest(&data)).await.unwrap_err();

    assert!(matches!(err, BlobStoreError::DataIntegrityFault { .. }));
    assert_eq!(h.memory.ref_count(&digest(&data)).await, Some(1));
    assert_eq!(
        h.fetch.read(OwnerKey::avatar(4), 4).await.unwrap().data,
        data
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replacements_keep_counts_exact() {
    let h = harness();
    let avatars = Arc::new(h.avatars);
    let candidates: Vec<Bytes> = (0..8)
        .map(|i| Bytes::from(format!("candidate {}", i)))
        .collect();

    let mut join_set = JoinSet::new();
    for round in 0..32 {
        let avatars = Arc::clone(&avatars);
        let data = candidates[round % candidates.len()].clone();
        join_set.spawn(async move { avatars.set(42, data, &png()).await });
    }
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
    }

    // Exactly one candidate survives, held once by the single avatar.
    assert_eq!(h.memory.entry_count().await, 1);
    let current = h.fetch.digest(OwnerKey::avatar(42), 42).await.unwrap();
    assert_eq!(h.memory.ref_count(&current.tag).await, Some(1));
}
