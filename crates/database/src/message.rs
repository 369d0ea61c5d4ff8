//! Message storage: inserts with dedup-race detection, batched existence
//! lookup, paginated listing, aggregates, deletes.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use sync_core::{CanonicalKey, CanonicalMessage, WriteOutcome};

use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::{AddressCount, DayCount, Message, MessageStats, TypeCount};

/// Largest accepted page size; caller input is clamped, never trusted.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Timestamps per existence-lookup query, to stay clear of SQLite's bind
/// parameter limit.
const EXISTENCE_CHUNK: usize = 500;

/// Addresses reported in stats.
const TOP_ADDRESSES_LIMIT: i64 = 5;

/// Days of activity reported in stats.
const RECENT_DAYS_WINDOW: i64 = 7;

/// Optional list filters.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Exact address match.
    pub address: Option<String>,
    /// Substring match over address and body.
    pub search: Option<String>,
}

/// Insert one message for a user, committing independently.
///
/// The dedup key's UNIQUE constraint is the final arbiter for concurrent
/// submissions of the same content: a violation here means another request
/// stored the identical key first and is reported as a duplicate, not an
/// error. Other database-level refusals become a per-item rejection.
pub async fn insert_message(
    pool: &SqlitePool,
    user_id: i64,
    message: &CanonicalMessage,
) -> Result<WriteOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO messages
            (user_id, address, body, timestamp, message_type,
             contact_name, external_id, date_formatted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&message.address)
    .bind(&message.body)
    .bind(message.timestamp)
    .bind(message.message_type)
    .bind(&message.contact_name)
    .bind(&message.external_id)
    .bind(&message.date_formatted)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(WriteOutcome::Inserted),
        Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateRace),
        Err(sqlx::Error::Database(db_err)) => {
            tracing::warn!(user_id, error = %db_err, "message rejected by storage");
            Ok(WriteOutcome::Rejected { code: "constraint" })
        }
        Err(e) => Err(DatabaseError::Sqlx(e)),
    }
}

/// Return the subset of `keys` already stored for the user.
///
/// One query per chunk of distinct timestamps rather than one per item;
/// candidate rows are then matched against the full key in memory, using
/// the same derivation as the normalizer.
pub async fn resolve_existing_keys(
    pool: &SqlitePool,
    user_id: i64,
    keys: &[CanonicalKey],
) -> Result<HashSet<CanonicalKey>> {
    let wanted: HashSet<&CanonicalKey> = keys.iter().collect();
    let mut timestamps: Vec<i64> = keys.iter().map(|k| k.timestamp).collect();
    timestamps.sort_unstable();
    timestamps.dedup();

    let mut existing = HashSet::new();
    for chunk in timestamps.chunks(EXISTENCE_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT address, body, timestamp FROM messages WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND timestamp IN (");
        let mut separated = qb.separated(", ");
        for ts in chunk {
            separated.push_bind(*ts);
        }
        qb.push(")");

        let rows: Vec<(String, String, i64)> = qb.build_query_as().fetch_all(pool).await?;
        for (address, body, timestamp) in rows {
            let key = CanonicalKey {
                address,
                body,
                timestamp,
            };
            if wanted.contains(&key) {
                existing.insert(key);
            }
        }
    }

    Ok(existing)
}

/// List a user's messages, newest first, with pagination and filters.
///
/// Page and page size are clamped to sane bounds regardless of caller
/// input. Returns the page plus the total matching count.
pub async fn list_messages(
    pool: &SqlitePool,
    user_id: i64,
    filter: &ListFilter,
    page: i64,
    page_size: i64,
) -> Result<(Vec<Message>, i64)> {
    let page = clamp_page(page);
    let page_size = clamp_page_size(page_size);

    let mut count_query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM messages");
    push_filters(&mut count_query, user_id, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, user_id, address, body, timestamp, message_type, \
         contact_name, external_id, date_formatted, created_at, updated_at \
         FROM messages",
    );
    push_filters(&mut select, user_id, filter);
    select.push(" ORDER BY timestamp DESC, id DESC LIMIT ");
    select.push_bind(page_size);
    select.push(" OFFSET ");
    select.push_bind((page - 1) * page_size);

    let messages: Vec<Message> = select.build_query_as().fetch_all(pool).await?;
    Ok((messages, total))
}

/// Aggregate counts over one user's messages. Pure read.
pub async fn message_stats(pool: &SqlitePool, user_id: i64) -> Result<MessageStats> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM messages WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let by_type = sqlx::query_as::<_, TypeCount>(
        r#"
        SELECT message_type, COUNT(*) AS count
        FROM messages
        WHERE user_id = ?
        GROUP BY message_type
        ORDER BY message_type
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let top_addresses = sqlx::query_as::<_, AddressCount>(
        r#"
        SELECT address, COUNT(*) AS count
        FROM messages
        WHERE user_id = ?
        GROUP BY address
        ORDER BY count DESC, address
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(TOP_ADDRESSES_LIMIT)
    .fetch_all(pool)
    .await?;

    let cutoff = epoch_millis_now() - RECENT_DAYS_WINDOW * 86_400_000;
    let recent_days = sqlx::query_as::<_, DayCount>(
        r#"
        SELECT date(timestamp / 1000, 'unixepoch') AS day, COUNT(*) AS count
        FROM messages
        WHERE user_id = ? AND timestamp >= ?
        GROUP BY day
        ORDER BY day DESC
        "#,
    )
    .bind(user_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(MessageStats {
        total,
        by_type,
        top_addresses,
        recent_days,
    })
}

/// Delete one of a user's messages by its client-supplied identifier.
pub async fn delete_message_by_external_id(
    pool: &SqlitePool,
    user_id: i64,
    external_id: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM messages
        WHERE user_id = ? AND external_id = ?
        "#,
    )
    .bind(user_id)
    .bind(external_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Message",
            id: external_id.to_string(),
        });
    }

    Ok(())
}

/// Count a user's stored messages.
pub async fn count_messages(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, user_id: i64, filter: &'a ListFilter) {
    qb.push(" WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(address) = &filter.address {
        qb.push(" AND address = ");
        qb.push_bind(address.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (address LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR body LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
}

pub(crate) fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

pub(crate) fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Escape LIKE wildcards in a user-supplied search term.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn epoch_millis_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, test_db};

    fn message(address: &str, body: &str, timestamp: i64) -> CanonicalMessage {
        CanonicalMessage {
            address: address.to_string(),
            body: body.to_string(),
            timestamp,
            message_type: 1,
            contact_name: None,
            external_id: None,
            date_formatted: None,
        }
    }

    #[test]
    fn clamps_pagination_bounds() {
        assert_eq!(clamp_page(0), 1);
        assert_eq!(clamp_page(-3), 1);
        assert_eq!(clamp_page(7), 7);
        assert_eq!(clamp_page_size(0), 1);
        assert_eq!(clamp_page_size(50), 50);
        assert_eq!(clamp_page_size(MAX_PAGE_SIZE + 1), MAX_PAGE_SIZE);
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[tokio::test]
    async fn unique_constraint_resolves_duplicate_race() {
        let db = test_db().await;
        let user = seed_user(db.pool(), "alice").await;

        let first = insert_message(db.pool(), user, &message("a", "hi", 1)).await.unwrap();
        assert_eq!(first, WriteOutcome::Inserted);

        let second = insert_message(db.pool(), user, &message("a", "hi", 1)).await.unwrap();
        assert_eq!(second, WriteOutcome::DuplicateRace);

        assert_eq!(count_messages(db.pool(), user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn existence_lookup_returns_stored_subset_per_user() {
        let db = test_db().await;
        let alice = seed_user(db.pool(), "alice").await;
        let bob = seed_user(db.pool(), "bob").await;

        insert_message(db.pool(), alice, &message("a", "one", 1)).await.unwrap();
        insert_message(db.pool(), bob, &message("a", "two", 2)).await.unwrap();

        let keys = vec![
            message("a", "one", 1).key(),
            message("a", "two", 2).key(),
            message("a", "three", 3).key(),
            // Same timestamp as a stored row but different body; the
            // prefilter must not count it as existing.
            message("a", "not-one", 1).key(),
        ];
        let existing = resolve_existing_keys(db.pool(), alice, &keys).await.unwrap();

        assert_eq!(existing.len(), 1);
        assert!(existing.contains(&message("a", "one", 1).key()));
    }

    #[tokio::test]
    async fn listing_paginates_newest_first() {
        let db = test_db().await;
        let user = seed_user(db.pool(), "alice").await;
        for i in 0..5 {
            insert_message(db.pool(), user, &message("a", &format!("m{i}"), i)).await.unwrap();
        }

        let (page1, total) =
            list_messages(db.pool(), user, &ListFilter::default(), 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].body, "m4");
        assert_eq!(page1[1].body, "m3");

        let (page3, _) =
            list_messages(db.pool(), user, &ListFilter::default(), 3, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].body, "m0");

        // Out-of-range caller input is clamped, not trusted.
        let (clamped, _) =
            list_messages(db.pool(), user, &ListFilter::default(), 0, -10).await.unwrap();
        assert_eq!(clamped.len(), 1);
        assert_eq!(clamped[0].body, "m4");
    }

    #[tokio::test]
    async fn listing_filters_by_address_and_search() {
        let db = test_db().await;
        let user = seed_user(db.pool(), "alice").await;
        insert_message(db.pool(), user, &message("+15550100", "pick up milk", 1)).await.unwrap();
        insert_message(db.pool(), user, &message("+15550101", "100% done", 2)).await.unwrap();
        insert_message(db.pool(), user, &message("+15550101", "see you", 3)).await.unwrap();

        let filter = ListFilter {
            address: Some("+15550101".to_string()),
            search: None,
        };
        let (rows, total) = list_messages(db.pool(), user, &filter, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert!(rows.iter().all(|m| m.address == "+15550101"));

        let filter = ListFilter {
            address: None,
            search: Some("milk".to_string()),
        };
        let (rows, total) = list_messages(db.pool(), user, &filter, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].body, "pick up milk");

        // A literal % in the term must not act as a wildcard.
        let filter = ListFilter {
            address: None,
            search: Some("100%".to_string()),
        };
        let (rows, _) = list_messages(db.pool(), user, &filter, 1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "100% done");
    }

    #[tokio::test]
    async fn messages_are_isolated_per_user() {
        let db = test_db().await;
        let alice = seed_user(db.pool(), "alice").await;
        let bob = seed_user(db.pool(), "bob").await;
        insert_message(db.pool(), alice, &message("a", "private", 1)).await.unwrap();

        let (rows, total) =
            list_messages(db.pool(), bob, &ListFilter::default(), 1, 10).await.unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());

        let stats = message_stats(db.pool(), bob).await.unwrap();
        assert_eq!(stats.total, 0);
    }

    #[tokio::test]
    async fn stats_aggregate_by_type_and_address() {
        let db = test_db().await;
        let user = seed_user(db.pool(), "alice").await;
        let now = epoch_millis_now();

        let mut inbound = message("+15550100", "one", now);
        inbound.message_type = 1;
        insert_message(db.pool(), user, &inbound).await.unwrap();

        let mut outbound = message("+15550100", "two", now + 1);
        outbound.message_type = 2;
        insert_message(db.pool(), user, &outbound).await.unwrap();

        let mut other = message("+15550199", "three", now + 2);
        other.message_type = 1;
        insert_message(db.pool(), user, &other).await.unwrap();

        let stats = message_stats(db.pool(), user).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(
            stats.by_type,
            vec![
                TypeCount { message_type: 1, count: 2 },
                TypeCount { message_type: 2, count: 1 },
            ]
        );
        assert_eq!(stats.top_addresses[0].address, "+15550100");
        assert_eq!(stats.top_addresses[0].count, 2);
        // All three fall inside the recent window.
        let recent_total: i64 = stats.recent_days.iter().map(|d| d.count).sum();
        assert_eq!(recent_total, 3);
    }

    #[tokio::test]
    async fn delete_by_external_id_is_user_scoped() {
        let db = test_db().await;
        let alice = seed_user(db.pool(), "alice").await;
        let bob = seed_user(db.pool(), "bob").await;

        let mut stored = message("a", "hi", 1);
        stored.external_id = Some("ext-1".to_string());
        insert_message(db.pool(), alice, &stored).await.unwrap();

        // Bob cannot delete Alice's message.
        let result = delete_message_by_external_id(db.pool(), bob, "ext-1").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        assert_eq!(count_messages(db.pool(), alice).await.unwrap(), 1);

        delete_message_by_external_id(db.pool(), alice, "ext-1").await.unwrap();
        assert_eq!(count_messages(db.pool(), alice).await.unwrap(), 0);

        // Gone means gone.
        let result = delete_message_by_external_id(db.pool(), alice, "ext-1").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }
}
