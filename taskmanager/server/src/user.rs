use crate::entities::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

/// Id under which the default user is stored.
pub const DEFAULT_USER_ID: i32 = 1;

/// Name given to the default user when it is first created.
pub const DEFAULT_USER_NAME: &str = "Test User";

/// Moves the `users.id` sequence past the highest stored ID so generated IDs
/// do not collide with explicitly inserted ones.
const SYNC_USERS_ID_SEQUENCE: &str =
    "SELECT setval(pg_get_serial_sequence('users', 'id'), (SELECT MAX(id) FROM users))";

/// Minimal user identity referenced by tasks as creator and last editor.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct User {
    id: Option<i32>,
    name: String,
}

impl User {
    /// Creates a user that has not been stored yet.
    pub fn new(name: String) -> Self {
        Self { id: None, name }
    }

    /// Creates a user carrying an explicit id.
    pub fn with_id(id: i32, name: String) -> Self {
        Self { id: Some(id), name }
    }

    /// Returns the ID of the user, if it has been assigned.
    pub fn id(&self) -> Option<i32> {
        self.id
    }

    /// Returns the name of the user.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::with_id(model.id, model.name)
    }
}

/// Error type for UserRepository operations.
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Read and insert access to the `users` table.
pub struct UserRepository<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl UserRepository<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> UserRepository<'_> {
        UserRepository { db }
    }

    /// Retrieves a user by its ID.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no user has the given ID.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, UserRepositoryError> {
        let user = user::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .map(User::from);
        Ok(user)
    }

    /// Retrieves every user whose ID is in `ids`. Unknown IDs are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<User>, UserRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(user::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        Ok(users)
    }

    /// Inserts a user.
    ///
    /// A user without an ID gets one generated by the database, a user
    /// carrying an ID is stored under that ID.
    ///
    /// # Returns
    ///
    /// The stored `User` with its ID assigned.
    #[tracing::instrument(skip(self))]
    pub async fn save(&self, user: User) -> Result<User, UserRepositoryError> {
        let explicit_id = user.id.is_some();
        let active_model = user::ActiveModel {
            id: match user.id {
                Some(id) => ActiveValue::Set(id),
                None => ActiveValue::NotSet,
            },
            name: ActiveValue::Set(user.name),
        };
        let created_model = active_model.insert(self.db).await?;
        if explicit_id {
            self.sync_id_sequence().await?;
        }
        Ok(User::from(created_model))
    }

    /// Returns the default user, creating it first if it does not exist.
    ///
    /// Calling this repeatedly, or from concurrent requests, never creates
    /// more than one default user.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_default_user(&self) -> Result<User, UserRepositoryError> {
        if let Some(user) = self.find_by_id(DEFAULT_USER_ID).await? {
            return Ok(user);
        }

        let default_user = user::ActiveModel {
            id: ActiveValue::Set(DEFAULT_USER_ID),
            name: ActiveValue::Set(DEFAULT_USER_NAME.to_string()),
        };
        let inserted = user::Entity::insert(default_user)
            .on_conflict(OnConflict::column(user::Column::Id).do_nothing().to_owned())
            .exec_without_returning(self.db)
            .await?;
        if inserted > 0 {
            self.sync_id_sequence().await?;
            tracing::info!("Created default user '{}'", DEFAULT_USER_NAME);
        }

        let user = self.find_by_id(DEFAULT_USER_ID).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!("User with ID {} not found", DEFAULT_USER_ID))
        })?;
        Ok(user)
    }

    // SQLite derives the next rowid from the table itself.
    async fn sync_id_sequence(&self) -> Result<(), UserRepositoryError> {
        if self.db.get_database_backend() == DbBackend::Postgres {
            self.db.execute_unprepared(SYNC_USERS_ID_SEQUENCE).await?;
        }
        Ok(())
    }
}
