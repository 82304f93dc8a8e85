//! Redis-backed store.
//!
//! Records are Redis hashes with the same field names the catalog has always
//! used (`user:{email}`, `tap:{id}`, `ratelimit:{address}`). Multi-key writes
//! go through `MULTI` pipelines or Lua scripts so indexes never diverge from
//! their records.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::domain::{Account, ClientWindow, LiquidType, Tap};
use crate::resilience::bounded;
use crate::store::{keys, Store, StoreError, StoreResult};

/// KEYS[1] = user hash, KEYS[2] = users set, ARGV = field/value pairs with
/// the email first.
const CREATE_ACCOUNT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV))
redis.call('SADD', KEYS[2], ARGV[2])
return 1
"#;

/// KEYS[1] = window hash. ARGV[1] = expected version ('' = must not exist),
/// ARGV[2..5] = count, lastAttempt, blockedUntil, version.
const SWAP_WINDOW: &str = r#"
local exists = redis.call('EXISTS', KEYS[1]) == 1
if ARGV[1] == '' then
  if exists then return 0 end
else
  if not exists then return 0 end
  local current = redis.call('HGET', KEYS[1], 'version') or '0'
  if current ~= ARGV[1] then return 0 end
end
redis.call('HSET', KEYS[1], 'count', ARGV[2], 'lastAttempt', ARGV[3], 'blockedUntil', ARGV[4], 'version', ARGV[5])
return 1
"#;

pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
    create_account: Script,
    swap_window: Script,
}

impl RedisStore {
    /// Open a managed connection. Every later command is bounded by `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;
        let conn = bounded("CONNECT", timeout, ConnectionManager::new(client))
            .await?
            .map_err(|e| StoreError::Backend(format!("connect: {e}")))?;

        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Connected to redis");

        Ok(Self {
            conn,
            timeout,
            create_account: Script::new(CREATE_ACCOUNT),
            swap_window: Script::new(SWAP_WINDOW),
        })
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        bounded(operation, self.timeout, fut)
            .await?
            .map_err(|e| StoreError::Backend(format!("{operation}: {e}")))
    }

    async fn fetch_taps(&self, ids: &[String]) -> StoreResult<Vec<Tap>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.hgetall(keys::tap(id));
        }
        let rows: Vec<HashMap<String, String>> =
            self.run("HGETALL", pipe.query_async(&mut conn)).await?;

        // Ids whose hash vanished are skipped, as a concurrent delete would leave them
        ids.iter()
            .zip(rows)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(id, fields)| tap_from_fields(id, &fields))
            .collect()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = self.run("PING", redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    async fn get_account(&self, email: &str) -> StoreResult<Option<Account>> {
        let key = keys::user(email);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = self.run("HGETALL", conn.hgetall(&key)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        account_from_fields(&key, &fields).map(Some)
    }

    async fn create_account(&self, account: &Account) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.create_account.prepare_invoke();
        invocation.key(keys::user(&account.email)).key(keys::USERS_ALL);
        for (field, value) in account_fields(account) {
            invocation.arg(field).arg(value);
        }
        let created: i64 = self
            .run("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;
        Ok(created == 1)
    }

    async fn save_account(&self, account: &Account) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(keys::user(&account.email), &account_fields(account))
            .ignore()
            .sadd(keys::USERS_ALL, &account.email)
            .ignore();
        let _: () = self.run("HSET", pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn delete_account(&self, email: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(keys::user(email)).srem(keys::USERS_ALL, email);
        let (removed, _): (i64, i64) = self.run("DEL", pipe.query_async(&mut conn)).await?;
        Ok(removed > 0)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let mut conn = self.conn.clone();
        let emails: Vec<String> = self.run("SMEMBERS", conn.smembers(keys::USERS_ALL)).await?;
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for email in &emails {
            pipe.hgetall(keys::user(email));
        }
        let rows: Vec<HashMap<String, String>> =
            self.run("HGETALL", pipe.query_async(&mut conn)).await?;

        emails
            .iter()
            .zip(rows)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(email, fields)| account_from_fields(&keys::user(email), &fields))
            .collect()
    }

    async fn count_accounts(&self) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        self.run("SCARD", conn.scard(keys::USERS_ALL)).await
    }

    async fn get_window(&self, address: &str) -> StoreResult<Option<ClientWindow>> {
        let key = keys::window(address);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = self.run("HGETALL", conn.hgetall(&key)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        window_from_fields(&key, &fields).map(Some)
    }

    async fn swap_window(
        &self,
        address: &str,
        expected: Option<u64>,
        next: &ClientWindow,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.swap_window.prepare_invoke();
        invocation
            .key(keys::window(address))
            .arg(expected.map(|v| v.to_string()).unwrap_or_default())
            .arg(next.count)
            .arg(next.last_attempt)
            .arg(next.blocked_until)
            .arg(next.version);
        let applied: i64 = self
            .run("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;
        Ok(applied == 1)
    }

    async fn delete_window(&self, address: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self.run("DEL", conn.del(keys::window(address))).await?;
        Ok(removed > 0)
    }

    async fn append_audit(&self, address: &str, capacity: usize) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let keep_from = -(capacity.max(1) as isize);
        let mut pipe = redis::pipe();
        pipe.rpush(keys::RATE_LIMIT_AUDIT, address)
            .ignore()
            .ltrim(keys::RATE_LIMIT_AUDIT, keep_from, -1)
            .ignore();
        let _: () = self.run("RPUSH", pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        self.run(
            "LRANGE",
            conn.lrange(keys::RATE_LIMIT_AUDIT, -(limit as isize), -1),
        )
        .await
    }

    async fn get_tap(&self, id: &str) -> StoreResult<Option<Tap>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            self.run("HGETALL", conn.hgetall(keys::tap(id))).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        tap_from_fields(id, &fields).map(Some)
    }

    async fn list_taps(&self) -> StoreResult<Vec<Tap>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = self.run("LRANGE", conn.lrange(keys::TAP_IDS, 0, -1)).await?;
        self.fetch_taps(&ids).await
    }

    async fn list_taps_in_category(&self, category: LiquidType) -> StoreResult<Vec<Tap>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = self
            .run("SMEMBERS", conn.smembers(keys::category(category)))
            .await?;
        // Keep listing order stable by walking the id list
        let ids: Vec<String> = self.run("LRANGE", conn.lrange(keys::TAP_IDS, 0, -1)).await?;
        let ordered: Vec<String> = ids.into_iter().filter(|id| members.contains(id)).collect();
        self.fetch_taps(&ordered).await
    }

    async fn create_tap(&self, tap: &Tap) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(keys::tap(&tap.id), &tap_fields(tap))
            .ignore()
            .rpush(keys::TAP_IDS, &tap.id)
            .ignore()
            .sadd(keys::category(tap.liquid_type), &tap.id)
            .ignore();
        let _: () = self.run("HSET", pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn save_tap(&self, tap: &Tap, previous_category: LiquidType) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(keys::tap(&tap.id), &tap_fields(tap))
            .ignore();
        if previous_category != tap.liquid_type {
            pipe.srem(keys::category(previous_category), &tap.id)
                .ignore()
                .sadd(keys::category(tap.liquid_type), &tap.id)
                .ignore();
        }
        let _: () = self.run("HSET", pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn delete_tap(&self, id: &str) -> StoreResult<bool> {
        let Some(existing) = self.get_tap(id).await? else {
            return Ok(false);
        };
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(keys::tap(id))
            .ignore()
            .lrem(keys::TAP_IDS, 0, id)
            .ignore()
            .srem(keys::category(existing.liquid_type), id)
            .ignore();
        let _: () = self.run("DEL", pipe.query_async(&mut conn)).await?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Hash codecs
// ---------------------------------------------------------------------------

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn required<'a>(key: &str, fields: &'a HashMap<String, String>, name: &str) -> StoreResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("missing field {name}"),
        })
}

fn parse_field<T: std::str::FromStr>(key: &str, name: &str, raw: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("field {name}: {e}"),
    })
}

fn parse_time(key: &str, name: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("field {name}: {e}"),
        })
}

fn optional_time(
    key: &str,
    fields: &HashMap<String, String>,
    name: &str,
) -> StoreResult<Option<DateTime<Utc>>> {
    fields
        .get(name)
        .map(|raw| parse_time(key, name, raw))
        .transpose()
}

/// Email must stay first; the create script reads it from ARGV[2].
fn account_fields(account: &Account) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("email", account.email.clone()),
        ("password_hash", account.password_hash.clone()),
        ("role", account.role.as_str().to_string()),
        ("created_at", timestamp(&account.created_at)),
    ];
    if let Some(by) = &account.created_by {
        fields.push(("created_by", by.clone()));
    }
    if let Some(at) = &account.updated_at {
        fields.push(("updated_at", timestamp(at)));
    }
    if let Some(by) = &account.updated_by {
        fields.push(("updated_by", by.clone()));
    }
    fields
}

fn account_from_fields(key: &str, fields: &HashMap<String, String>) -> StoreResult<Account> {
    Ok(Account {
        email: required(key, fields, "email")?.to_string(),
        password_hash: required(key, fields, "password_hash")?.to_string(),
        role: parse_field(key, "role", required(key, fields, "role")?)?,
        created_at: parse_time(key, "created_at", required(key, fields, "created_at")?)?,
        created_by: fields.get("created_by").cloned(),
        updated_at: optional_time(key, fields, "updated_at")?,
        updated_by: fields.get("updated_by").cloned(),
    })
}

fn window_from_fields(key: &str, fields: &HashMap<String, String>) -> StoreResult<ClientWindow> {
    Ok(ClientWindow {
        count: parse_field(key, "count", required(key, fields, "count")?)?,
        last_attempt: parse_field(key, "lastAttempt", required(key, fields, "lastAttempt")?)?,
        blocked_until: parse_field(key, "blockedUntil", required(key, fields, "blockedUntil")?)?,
        // Windows written before versioning read as version 0
        version: match fields.get("version") {
            Some(raw) => parse_field(key, "version", raw)?,
            None => 0,
        },
    })
}

fn tap_fields(tap: &Tap) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("title", tap.title.clone()),
        ("container_type", tap.container_type.clone()),
        ("material", tap.material.clone()),
        ("size", tap.size.clone()),
        ("flow_rate", tap.flow_rate.clone()),
        ("liquid_type", tap.liquid_type.as_str().to_string()),
        ("description", tap.description.clone()),
        ("image_url", tap.image_url.clone()),
        ("status", tap.status.as_str().to_string()),
        ("created_at", timestamp(&tap.created_at)),
        ("updated_at", timestamp(&tap.updated_at)),
        ("created_by", tap.created_by.clone()),
    ];
    if let Some(by) = &tap.updated_by {
        fields.push(("updated_by", by.clone()));
    }
    fields
}

fn tap_from_fields(id: &str, fields: &HashMap<String, String>) -> StoreResult<Tap> {
    let key = keys::tap(id);
    let key = key.as_str();
    let text = |name: &str| -> StoreResult<String> { required(key, fields, name).map(str::to_string) };

    Ok(Tap {
        id: id.to_string(),
        title: text("title")?,
        container_type: text("container_type")?,
        material: text("material")?,
        size: text("size")?,
        flow_rate: text("flow_rate")?,
        liquid_type: parse_field(key, "liquid_type", required(key, fields, "liquid_type")?)?,
        description: text("description")?,
        image_url: fields.get("image_url").cloned().unwrap_or_default(),
        // Records without a status predate it and are live
        status: match fields.get("status") {
            Some(raw) => parse_field(key, "status", raw)?,
            None => Default::default(),
        },
        created_at: parse_time(key, "created_at", required(key, fields, "created_at")?)?,
        updated_at: match optional_time(key, fields, "updated_at")? {
            Some(t) => t,
            None => parse_time(key, "created_at", required(key, fields, "created_at")?)?,
        },
        created_by: fields
            .get("created_by")
            .cloned()
            .unwrap_or_else(|| "admin".to_string()),
        updated_by: fields.get("updated_by").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTap, Role, TapStatus};

    fn to_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_account_codec() {
        let mut account = Account::new("a@x.com", "$argon2id$hash");
        account.role = Role::Admin;
        account.updated_by = Some("root@x.com".into());
        account.updated_at = Some(account.created_at);

        let fields = account_fields(&account);
        assert_eq!(fields[0], ("email", "a@x.com".to_string()));

        let decoded = account_from_fields("user:a@x.com", &to_map(fields)).unwrap();
        assert_eq!(decoded.email, account.email);
        assert_eq!(decoded.role, Role::Admin);
        assert_eq!(decoded.updated_by.as_deref(), Some("root@x.com"));
        // Millisecond precision survives the round trip
        assert_eq!(
            decoded.created_at.timestamp_millis(),
            account.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_account_with_unknown_role_is_corrupt() {
        let mut fields = to_map(account_fields(&Account::new("a@x.com", "h")));
        fields.insert("role".into(), "owner".into());
        let err = account_from_fields("user:a@x.com", &fields).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn test_legacy_window_reads_as_version_zero() {
        let fields: HashMap<String, String> = [
            ("count", "4"),
            ("lastAttempt", "1700000000000"),
            ("blockedUntil", "1700000000000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let window = window_from_fields("ratelimit:1.2.3.4", &fields).unwrap();
        assert_eq!(window.count, 4);
        assert_eq!(window.version, 0);
    }

    #[test]
    fn test_tap_codec_defaults() {
        let tap = NewTap {
            title: "T".into(),
            container_type: "Bottle".into(),
            material: "Steel".into(),
            size: "1".into(),
            flow_rate: "Slow".into(),
            liquid_type: LiquidType::Oil,
            description: "d".into(),
            status: TapStatus::Inactive,
        }
        .into_tap("42".into(), "https://img/x.png".into(), "a@x.com", Utc::now());

        let mut fields = to_map(tap_fields(&tap));
        let decoded = tap_from_fields("42", &fields).unwrap();
        assert_eq!(decoded.liquid_type, LiquidType::Oil);
        assert_eq!(decoded.status, TapStatus::Inactive);

        fields.remove("status");
        fields.remove("updated_at");
        let legacy = tap_from_fields("42", &fields).unwrap();
        assert!(legacy.is_active());
        assert_eq!(legacy.updated_at, legacy.created_at);
    }
}
