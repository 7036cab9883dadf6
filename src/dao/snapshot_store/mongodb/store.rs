use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::{ClientOptions, IndexOptions},
};
use tokio::{sync::RwLock, time::sleep};

use super::{
    error::{MongoDaoError, MongoResult},
    models::MongoSnapshotDocument,
};
use crate::dao::{
    snapshot::{SnapshotEntity, migrate},
    snapshot_store::SnapshotStore,
    storage::StorageResult,
};

const SNAPSHOT_COLLECTION_NAME: &str = "room_snapshots";
const DEFAULT_DB: &str = "date_night";
const MAX_CONNECT_ATTEMPTS: u32 = 10;
const BASE_RETRY_DELAY_MS: u64 = 250;

/// Snapshot store backed by MongoDB, one document per room.
#[derive(Clone)]
pub struct MongoSnapshotStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    // The Database handle keeps its Client alive; nothing else needs it.
    database: RwLock<Database>,
    options: ClientOptions,
    database_name: String,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.database.read().await;
            guard.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = establish_connection(&self.options, &self.database_name).await?;
        let mut guard = self.database.write().await;
        *guard = database;
        Ok(())
    }
}

impl MongoSnapshotStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        let database = establish_connection(&options, &database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            options,
            database_name,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"updated_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("snapshot_updated_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SNAPSHOT_COLLECTION_NAME,
                index: "updated_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoSnapshotDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoSnapshotDocument>(SNAPSHOT_COLLECTION_NAME)
    }

    async fn save_snapshot(&self, snapshot: SnapshotEntity) -> MongoResult<()> {
        let room = snapshot.room.clone();
        let document: MongoSnapshotDocument = snapshot.into();
        let collection = self.collection().await;
        collection
            .replace_one(doc! { "_id": &room }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSnapshot { room, source })?;

        Ok(())
    }

    async fn load_snapshot(&self, room: String) -> StorageResult<Option<SnapshotEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc! { "_id": &room })
            .await
            .map_err(|source| MongoDaoError::LoadSnapshot { room, source })?;

        document
            .map(|doc| migrate(doc.into()))
            .transpose()
    }

    async fn delete_snapshot(&self, room: String) -> MongoResult<bool> {
        let collection = self.collection().await;
        let result = collection
            .delete_one(doc! { "_id": &room })
            .await
            .map_err(|source| MongoDaoError::DeleteSnapshot { room, source })?;
        Ok(result.deleted_count > 0)
    }
}

impl SnapshotStore for MongoSnapshotStore {
    fn save(&self, snapshot: SnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_snapshot(snapshot).await.map_err(Into::into) })
    }

    fn load(&self, room: &str) -> BoxFuture<'static, StorageResult<Option<SnapshotEntity>>> {
        let store = self.clone();
        let room = room.to_owned();
        Box::pin(async move { store.load_snapshot(room).await })
    }

    fn delete(&self, room: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let room = room.to_owned();
        Box::pin(async move { store.delete_snapshot(room).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<Database> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = Duration::from_millis(BASE_RETRY_DELAY_MS);

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= MAX_CONNECT_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }
        }
    }

    Ok(database)
}
