use sea_orm::{EntityTrait, PaginatorTrait};
use taskmanager_server::entities::user;
use taskmanager_server::user::{DEFAULT_USER_ID, DEFAULT_USER_NAME, User, UserRepository};

mod common;

use common::setup_db;

#[tokio::test]
async fn can_return_none_for_missing_user() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);

    let user = repository.find_by_id(DEFAULT_USER_ID).await?;

    assert!(user.is_none());
    Ok(())
}

#[tokio::test]
async fn can_save_user_with_generated_id() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);

    let saved = repository.save(User::new("Alice".to_string())).await?;

    let id = saved.id().expect("Saved user has no ID");
    assert_eq!(saved.name(), "Alice");
    assert_eq!(repository.find_by_id(id).await?, Some(saved));
    Ok(())
}

#[tokio::test]
async fn can_ensure_default_user_only_once() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);

    let first = repository.ensure_default_user().await?;
    let second = repository.ensure_default_user().await?;

    assert_eq!(first, User::with_id(DEFAULT_USER_ID, DEFAULT_USER_NAME.to_string()));
    assert_eq!(first, second);
    assert_eq!(user::Entity::find().count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn can_keep_existing_user_at_default_id() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);
    repository
        .save(User::with_id(DEFAULT_USER_ID, "Alice".to_string()))
        .await?;

    let default_user = repository.ensure_default_user().await?;

    assert_eq!(default_user.name(), "Alice");
    assert_eq!(user::Entity::find().count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn can_find_users_by_ids() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);
    let alice = repository.save(User::with_id(1, "Alice".to_string())).await?;
    repository.save(User::with_id(2, "Bob".to_string())).await?;
    let carol = repository.save(User::with_id(3, "Carol".to_string())).await?;

    let users = repository.find_by_ids(&[3, 1, 77]).await?;

    assert_eq!(users, vec![alice, carol]);
    assert!(repository.find_by_ids(&[]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn can_generate_ids_after_default_user() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let repository = UserRepository::new(&db);
    repository.ensure_default_user().await?;

    let alice = repository.save(User::new("Alice".to_string())).await?;

    assert_ne!(alice.id(), Some(DEFAULT_USER_ID));
    assert_eq!(user::Entity::find().count(&db).await?, 2);
    Ok(())
}

#[tokio::test]
async fn can_ensure_default_user_from_concurrent_callers() -> anyhow::Result<()> {
    let db = setup_db().await?;
    let first = UserRepository::new(&db);
    let second = UserRepository::new(&db);

    let (a, b) = tokio::join!(first.ensure_default_user(), second.ensure_default_user());

    assert_eq!(a?, b?);
    assert_eq!(user::Entity::find().count(&db).await?, 1);
    Ok(())
}
