use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::Order;
use sea_orm::sea_query::Query;
use sea_orm::sea_query::SelectStatement;
use sea_orm::ActiveModelTrait;
use sea_orm::ColumnTrait;
use sea_orm::Condition;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseBackend;
use sea_orm::DatabaseConnection;
use sea_orm::DatabaseTransaction;
use sea_orm::EntityTrait;
use sea_orm::FromQueryResult;
use sea_orm::IsolationLevel;
use sea_orm::QueryFilter;
use sea_orm::QueryOrder;
use sea_orm::Set;
use sea_orm::TransactionTrait;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use super::entity::banner;
use super::entity::banner_version;
use super::entity::feature_tag;
use super::entity::BannerRecord;
use super::entity::BannerVersionRecord;
use super::entity::BannerVersions;
use super::entity::Banners;
use super::entity::FeatureTagRecord;
use super::entity::FeatureTags;
use crate::collision;
use crate::error::BannerError;
use crate::error::Result;
use crate::listing;
use crate::listing::AssociationRow;
use crate::resolver;
use crate::resolver::ResolvedVersion;
use crate::traits::BannerStore;
use crate::types::AdminQuery;
use crate::types::Banner;
use crate::types::BannerId;
use crate::types::BannerUpdate;
use crate::types::Claim;
use crate::types::Content;
use crate::types::FeatureId;
use crate::types::NewBanner;
use crate::types::TagId;
use crate::types::Version;
use crate::types::VersionSnapshot;
use crate::types::FIRST_VERSION;
use crate::types::NO_ACTIVE_VERSION;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Banner store on top of a SeaORM database connection.
///
/// Every write is a single transaction. Any failing step returns early, dropping the transaction which rolls it back.
/// The collision check runs inside the same transaction as the write it guards; writers of this process are also
/// serialized so that check and write can't interleave with another writer. Writers from other connections are held
/// off by the database itself, a write that loses to one of them fails with
/// [`BannerError::Conflict`]. Every call is bounded by [`timeout`](Self::timeout) and fails with
/// [`BannerError::Timeout`] past it.
#[derive(Debug)]
pub struct DbStore {
    connection: DatabaseConnection,
    timeout:    Duration,
    write_lock: Mutex<()>,
}

impl DbStore {
    pub fn new(connection: DatabaseConnection, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("{op} did not complete within {:?}", self.timeout);
                Err(BannerError::Timeout {
                    op,
                    after: self.timeout,
                })
            }
        }
    }

    /// Opens a write transaction.
    ///
    /// On SQLite the transaction takes the database write lock with its first statement, so a writer from another
    /// connection waits for it on the busy timeout before anything is read. On PostgreSQL the transaction is
    /// serializable and a claim check racing with another writer fails on commit.
    async fn begin_write(&self, op: &'static str, banner_id: Option<BannerId>) -> Result<DatabaseTransaction> {
        let backend = self.connection.get_database_backend();
        let txn = match backend {
            DatabaseBackend::Postgres => {
                self.connection
                    .begin_with_config(Some(IsolationLevel::Serializable), None)
                    .await
            }
            _ => self.connection.begin().await,
        }
        .map_err(BannerError::db(op, banner_id))?;

        if backend == DatabaseBackend::Sqlite {
            txn.execute_unprepared("UPDATE banners SET last_version = last_version WHERE 0 = 1")
                .await
                .map_err(BannerError::db(op, banner_id))?;
        }

        Ok(txn)
    }

    #[instrument(level = "debug", skip(self, banner), fields(tags = ?banner.tag_ids, feature = banner.feature_id))]
    async fn create_banner(&self, banner: NewBanner) -> Result<BannerId> {
        const OP: &str = "create banner";
        let _writer = self.write_lock.lock().await;
        let txn = self.begin_write(OP, None).await?;

        if banner.is_active {
            let claims = active_claims(&txn, OP, &banner.tag_ids, banner.feature_id).await?;
            collision::ensure_unclaimed(None, &claims)?;
        }

        let now = Utc::now();
        let record = banner::ActiveModel {
            active_version: Set(if banner.is_active {
                FIRST_VERSION
            }
            else {
                NO_ACTIVE_VERSION
            }),
            last_version: Set(FIRST_VERSION),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(BannerError::db(OP, None))?;

        let first = ResolvedVersion {
            version:    FIRST_VERSION,
            tag_ids:    banner.tag_ids,
            feature_id: banner.feature_id,
            content:    banner.content,
        };
        write_version(&txn, OP, record.id, &first, now).await?;

        txn.commit().await.map_err(BannerError::db(OP, Some(record.id)))?;

        debug!(banner_id = record.id, active = banner.is_active, "banner created");
        Ok(record.id)
    }

    #[instrument(level = "debug", skip(self, update), fields(banner_id = update.id, active = update.is_active))]
    async fn update_banner(&self, update: BannerUpdate) -> Result<Version> {
        const OP: &str = "update banner";
        let banner_id = update.id;
        let _writer = self.write_lock.lock().await;
        let txn = self.begin_write(OP, Some(banner_id)).await?;

        let record = load_banner(&txn, OP, banner_id).await?;
        let last = load_snapshot(&txn, OP, banner_id, record.last_version).await?;
        let resolved = resolver::resolve(&update, last);

        if update.is_active {
            let claims = active_claims(&txn, OP, &resolved.tag_ids, resolved.feature_id).await?;
            collision::ensure_unclaimed(Some(banner_id), &claims)?;
        }

        // The new version is what users get to see, or nothing at all if it is not active.
        let active_version = if update.is_active {
            resolved.version
        }
        else {
            NO_ACTIVE_VERSION
        };

        let now = Utc::now();
        let bumped = Banners::update_many()
            .col_expr(banner::Column::LastVersion, Expr::value(resolved.version))
            .col_expr(banner::Column::ActiveVersion, Expr::value(active_version))
            .col_expr(banner::Column::UpdatedAt, Expr::value(now))
            .filter(banner::Column::Id.eq(banner_id))
            .filter(banner::Column::LastVersion.eq(record.last_version))
            .exec(&txn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;
        if bumped.rows_affected == 0 {
            return Err(BannerError::Conflict(format!(
                "banner {banner_id} got a new version while version {} was being written",
                resolved.version
            )));
        }

        write_version(&txn, OP, banner_id, &resolved, now).await?;

        txn.commit().await.map_err(BannerError::db(OP, Some(banner_id)))?;

        debug!(version = resolved.version, "banner updated");
        Ok(resolved.version)
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_banner(&self, banner_id: BannerId) -> Result<()> {
        const OP: &str = "delete banner";
        let _writer = self.write_lock.lock().await;
        let txn = self.begin_write(OP, Some(banner_id)).await?;

        FeatureTags::delete_many()
            .filter(feature_tag::Column::BannerId.eq(banner_id))
            .exec(&txn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;
        BannerVersions::delete_many()
            .filter(banner_version::Column::BannerId.eq(banner_id))
            .exec(&txn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;
        let removed = Banners::delete_by_id(banner_id)
            .exec(&txn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;

        if removed.rows_affected == 0 {
            return Err(BannerError::banner_not_found(banner_id));
        }

        txn.commit().await.map_err(BannerError::db(OP, Some(banner_id)))?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn user_content(&self, tag_id: TagId, feature_id: FeatureId) -> Result<Content> {
        const OP: &str = "get banner for user";
        let claims = active_claims(&self.connection, OP, &[tag_id], feature_id).await?;

        match claims.as_slice() {
            [claim] => {
                let record = BannerVersions::find_by_id((claim.banner_id, claim.version))
                    .one(&self.connection)
                    .await
                    .map_err(BannerError::db(OP, Some(claim.banner_id)))?
                    .ok_or_else(|| BannerError::version_not_found(claim.banner_id, claim.version))?;
                Ok(serde_json::from_str(&record.content)?)
            }
            claims => {
                if !claims.is_empty() {
                    warn!(
                        "{} active banners claim tag {tag_id} and feature {feature_id}",
                        claims.len()
                    );
                }
                Err(BannerError::NotFound(format!(
                    "active banner for tag {tag_id} and feature {feature_id}"
                )))
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn admin_listing(&self, query: AdminQuery) -> Result<Vec<Banner>> {
        const OP: &str = "get banners for admin";
        let query = query.normalized();
        let conn = &self.connection;

        let page_query = conn.get_database_backend().build(&admin_page_query(&query));
        let page = ListedId::find_by_statement(page_query)
            .all(conn)
            .await
            .map_err(BannerError::db(OP, None))?
            .into_iter()
            .map(|row| row.id)
            .collect::<Vec<_>>();

        let mut banners = Vec::with_capacity(page.len());
        for chunk in page.chunks(LISTING_CHUNK) {
            banners.extend(listed_banners(conn, OP, chunk).await?);
        }

        Ok(banners)
    }

    #[instrument(level = "debug", skip(self))]
    async fn activate_version(&self, banner_id: BannerId, version: Version) -> Result<()> {
        const OP: &str = "set active version";
        let _writer = self.write_lock.lock().await;
        let txn = self.begin_write(OP, Some(banner_id)).await?;

        let record = load_banner(&txn, OP, banner_id).await?;
        let target = load_snapshot(&txn, OP, banner_id, version).await?;

        if record.active_version == version {
            debug!("version {version} is already active");
            return Ok(());
        }

        let claims = active_claims(&txn, OP, &target.tag_ids, target.feature_id).await?;
        collision::ensure_unclaimed(Some(banner_id), &claims)?;

        Banners::update_many()
            .col_expr(banner::Column::ActiveVersion, Expr::value(version))
            .col_expr(banner::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(banner::Column::Id.eq(banner_id))
            .exec(&txn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;

        txn.commit().await.map_err(BannerError::db(OP, Some(banner_id)))?;

        debug!("active version moved from {} to {version}", record.active_version);
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn history(&self, banner_id: BannerId) -> Result<Vec<VersionSnapshot>> {
        const OP: &str = "get version history";
        let conn = &self.connection;

        load_banner(conn, OP, banner_id).await?;

        let versions = BannerVersions::find()
            .filter(banner_version::Column::BannerId.eq(banner_id))
            .order_by_asc(banner_version::Column::Version)
            .all(conn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?;

        let mut tags: BTreeMap<Version, Vec<FeatureTagRecord>> = BTreeMap::new();
        for row in FeatureTags::find()
            .filter(feature_tag::Column::BannerId.eq(banner_id))
            .order_by_asc(feature_tag::Column::Version)
            .order_by_asc(feature_tag::Column::Position)
            .all(conn)
            .await
            .map_err(BannerError::db(OP, Some(banner_id)))?
        {
            tags.entry(row.version).or_default().push(row);
        }

        versions
            .into_iter()
            .map(|v| {
                let version_tags = tags.remove(&v.version).unwrap_or_default();
                snapshot_from(v, &version_tags)
            })
            .collect()
    }
}

async fn load_banner<C: ConnectionTrait>(conn: &C, op: &'static str, banner_id: BannerId) -> Result<BannerRecord> {
    Banners::find_by_id(banner_id)
        .one(conn)
        .await
        .map_err(BannerError::db(op, Some(banner_id)))?
        .ok_or_else(|| BannerError::banner_not_found(banner_id))
}

async fn load_snapshot<C: ConnectionTrait>(
    conn: &C,
    op: &'static str,
    banner_id: BannerId,
    version: Version,
) -> Result<VersionSnapshot> {
    let record = BannerVersions::find_by_id((banner_id, version))
        .one(conn)
        .await
        .map_err(BannerError::db(op, Some(banner_id)))?
        .ok_or_else(|| BannerError::version_not_found(banner_id, version))?;

    let tags = FeatureTags::find()
        .filter(feature_tag::Column::BannerId.eq(banner_id))
        .filter(feature_tag::Column::Version.eq(version))
        .order_by_asc(feature_tag::Column::Position)
        .all(conn)
        .await
        .map_err(BannerError::db(op, Some(banner_id)))?;

    snapshot_from(record, &tags)
}

fn snapshot_from(record: BannerVersionRecord, tags: &[FeatureTagRecord]) -> Result<VersionSnapshot> {
    Ok(VersionSnapshot {
        banner_id:  record.banner_id,
        version:    record.version,
        tag_ids:    tags.iter().map(|t| t.tag_id).collect(),
        feature_id: tags.first().map_or(0, |t| t.feature_id),
        content:    serde_json::from_str(&record.content)?,
        updated_at: record.updated_at,
    })
}

// Associations of the given tags with the feature that belong to the active version of their banner.
async fn active_claims<C: ConnectionTrait>(
    conn: &C,
    op: &'static str,
    tag_ids: &[TagId],
    feature_id: FeatureId,
) -> Result<Vec<Claim>> {
    if tag_ids.is_empty() {
        return Ok(vec![]);
    }

    let rows = FeatureTags::find()
        .filter(feature_tag::Column::FeatureId.eq(feature_id))
        .filter(feature_tag::Column::TagId.is_in(tag_ids.iter().copied()))
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?;
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let banner_ids = rows.iter().map(|r| r.banner_id).collect::<BTreeSet<_>>();
    let active = Banners::find()
        .filter(banner::Column::Id.is_in(banner_ids))
        .filter(banner::Column::ActiveVersion.ne(NO_ACTIVE_VERSION))
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?
        .into_iter()
        .map(|b| (b.id, b.active_version))
        .collect::<HashMap<_, _>>();

    Ok(rows
        .into_iter()
        .filter(|r| active.get(&r.banner_id) == Some(&r.version))
        .map(|r| Claim {
            banner_id:  r.banner_id,
            version:    r.version,
            tag_id:     r.tag_id,
            feature_id: r.feature_id,
        })
        .collect())
}

async fn active_versions<C: ConnectionTrait>(conn: &C, op: &'static str) -> Result<HashMap<BannerId, Version>> {
    Ok(Banners::find()
        .filter(banner::Column::ActiveVersion.ne(NO_ACTIVE_VERSION))
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?
        .into_iter()
        .map(|b| (b.id, b.active_version))
        .collect())
}

// Banners loaded per round trip of the admin listing. Each one costs up to two bound parameters per query, this
// keeps well under the SQLite default limit.
const LISTING_CHUNK: usize = 250;

#[derive(Debug, FromQueryResult)]
struct ListedId {
    id: BannerId,
}

// IDs of the banners on the requested page, filtered by the associations of their latest version.
fn admin_page_query(query: &AdminQuery) -> SelectStatement {
    let mut select = Query::select();
    select
        .distinct()
        .column((Banners, banner::Column::Id))
        .from(Banners)
        .inner_join(
            FeatureTags,
            Expr::col((FeatureTags, feature_tag::Column::BannerId))
                .equals((Banners, banner::Column::Id))
                .and(
                    Expr::col((FeatureTags, feature_tag::Column::Version))
                        .equals((Banners, banner::Column::LastVersion)),
                ),
        )
        .order_by((Banners, banner::Column::Id), Order::Asc);

    if let Some(tag_id) = query.tag_id {
        select.and_where(Expr::col((FeatureTags, feature_tag::Column::TagId)).eq(tag_id));
    }
    if let Some(feature_id) = query.feature_id {
        select.and_where(Expr::col((FeatureTags, feature_tag::Column::FeatureId)).eq(feature_id));
    }

    if query.limit > 0 {
        select.limit(query.limit);
    }
    if query.offset > 0 {
        // SQLite accepts OFFSET only together with LIMIT.
        if query.limit == 0 {
            select.limit(i64::MAX as u64);
        }
        select.offset(query.offset);
    }

    select
}

// Latest versions of the given banners with their tags merged, in ascending ID order.
async fn listed_banners<C: ConnectionTrait>(conn: &C, op: &'static str, ids: &[BannerId]) -> Result<Vec<Banner>> {
    let records = Banners::find()
        .filter(banner::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?
        .into_iter()
        .map(|r| (r.id, r))
        .collect::<HashMap<_, _>>();
    if records.is_empty() {
        return Ok(vec![]);
    }

    let mut latest_tags = Condition::any();
    let mut latest_contents = Condition::any();
    for record in records.values() {
        latest_tags = latest_tags.add(
            Condition::all()
                .add(feature_tag::Column::BannerId.eq(record.id))
                .add(feature_tag::Column::Version.eq(record.last_version)),
        );
        latest_contents = latest_contents.add(
            Condition::all()
                .add(banner_version::Column::BannerId.eq(record.id))
                .add(banner_version::Column::Version.eq(record.last_version)),
        );
    }

    let rows = FeatureTags::find()
        .filter(latest_tags)
        .order_by_asc(feature_tag::Column::BannerId)
        .order_by_asc(feature_tag::Column::Position)
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?;
    let contents = BannerVersions::find()
        .filter(latest_contents)
        .all(conn)
        .await
        .map_err(BannerError::db(op, None))?
        .into_iter()
        .map(|v| ((v.banner_id, v.version), v))
        .collect::<HashMap<_, _>>();

    let mut banners = Vec::with_capacity(records.len());
    for m in listing::merge_tag_rows(rows.iter().map(AssociationRow::from)) {
        let record = records
            .get(&m.banner_id)
            .ok_or_else(|| BannerError::banner_not_found(m.banner_id))?;
        let version = contents
            .get(&(m.banner_id, m.version))
            .ok_or_else(|| BannerError::version_not_found(m.banner_id, m.version))?;
        banners.push(Banner {
            id:         m.banner_id,
            tag_ids:    m.tag_ids,
            feature_id: m.feature_id,
            is_active:  false,
            version:    m.version,
            content:    serde_json::from_str(&version.content)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        });
    }

    let active_versions = records
        .values()
        .filter(|r| r.active_version != NO_ACTIVE_VERSION)
        .map(|r| (r.id, r.active_version))
        .collect::<HashMap<_, _>>();
    listing::resolve_active_flags(&mut banners, &active_versions);

    Ok(banners)
}

async fn write_version<C: ConnectionTrait>(
    conn: &C,
    op: &'static str,
    banner_id: BannerId,
    version: &ResolvedVersion,
    now: DateTime<Utc>,
) -> Result<()> {
    let payload = serde_json::to_string(&version.content)?;

    BannerVersions::insert(banner_version::ActiveModel {
        banner_id:  Set(banner_id),
        version:    Set(version.version),
        content:    Set(payload),
        updated_at: Set(now),
    })
    .exec_without_returning(conn)
    .await
    .map_err(BannerError::db(op, Some(banner_id)))?;

    let associations = version
        .tag_ids
        .iter()
        .enumerate()
        .map(|(position, tag_id)| feature_tag::ActiveModel {
            banner_id:  Set(banner_id),
            version:    Set(version.version),
            tag_id:     Set(*tag_id),
            feature_id: Set(version.feature_id),
            position:   Set(position as i32),
            updated_at: Set(now),
        })
        .collect::<Vec<_>>();

    if !associations.is_empty() {
        FeatureTags::insert_many(associations)
            .exec_without_returning(conn)
            .await
            .map_err(BannerError::db(op, Some(banner_id)))?;
    }

    Ok(())
}

#[async_trait]
impl BannerStore for DbStore {
    async fn create(&self, banner: NewBanner) -> Result<BannerId> {
        self.bounded("create", self.create_banner(banner)).await
    }

    async fn update(&self, update: BannerUpdate) -> Result<Version> {
        self.bounded("update", self.update_banner(update)).await
    }

    async fn delete(&self, banner_id: BannerId) -> Result<()> {
        self.bounded("delete", self.delete_banner(banner_id)).await
    }

    async fn get_for_user(&self, tag_id: TagId, feature_id: FeatureId) -> Result<Content> {
        self.bounded("get_for_user", self.user_content(tag_id, feature_id)).await
    }

    async fn get_for_admin(&self, query: AdminQuery) -> Result<Vec<Banner>> {
        self.bounded("get_for_admin", self.admin_listing(query)).await
    }

    async fn set_version_active(&self, banner_id: BannerId, version: Version) -> Result<()> {
        self.bounded("set_version_active", self.activate_version(banner_id, version))
            .await
    }

    async fn banner_active_versions(&self) -> Result<HashMap<BannerId, Version>> {
        self.bounded(
            "banner_active_versions",
            active_versions(&self.connection, "get active versions"),
        )
        .await
    }

    async fn version_history(&self, banner_id: BannerId) -> Result<Vec<VersionSnapshot>> {
        self.bounded("version_history", self.history(banner_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_times_out() {
        let store = DbStore::new(DatabaseConnection::default(), Duration::from_secs(2));

        let err = store
            .bounded("get_for_user", std::future::pending::<Result<Content>>())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "get_for_user timed out after 2000ms");
    }

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let store = DbStore::new(DatabaseConnection::default(), DEFAULT_STORE_TIMEOUT);
        let outcome = store.bounded("delete", async { Ok(42) }).await;
        assert_eq!(outcome.unwrap(), 42);
    }
}
