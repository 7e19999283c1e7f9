//! `SQLite` implementation of [`RuleRepository`].
//!
//! Rules, sensor rules and actuator rules live in three tables; children are
//! removed by `ON DELETE CASCADE` when their rule or device goes away.

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use brightnest_app::ports::RuleRepository;
use brightnest_domain::error::{BrightnestError, NotFoundError};
use brightnest_domain::id::{ActuatorRuleId, DeviceId, RuleId, SensorRuleId};
use brightnest_domain::rule::{ActuatorRule, Rule, SensorRule};

use crate::error::{StorageError, decode};

struct RuleRow(Rule);

impl<'r> FromRow<'r, SqliteRow> for RuleRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;

        Ok(Self(Rule {
            id: decode("id", RuleId::from_str(&id))?,
            name,
        }))
    }
}

struct SensorRuleRow(SensorRule);

impl<'r> FromRow<'r, SqliteRow> for SensorRuleRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let rule_id: String = row.try_get("rule_id")?;
        let sensor_id: Option<String> = row.try_get("sensor_id")?;

        Ok(Self(SensorRule {
            id: decode("id", SensorRuleId::from_str(&id))?,
            rule_id: decode("rule_id", RuleId::from_str(&rule_id))?,
            sensor_id: decode(
                "sensor_id",
                sensor_id.as_deref().map(DeviceId::from_str).transpose(),
            )?,
            measure_type: row.try_get("measure_type")?,
            interval_start: row.try_get("interval_start")?,
            interval_end: row.try_get("interval_end")?,
        }))
    }
}

struct ActuatorRuleRow(ActuatorRule);

impl<'r> FromRow<'r, SqliteRow> for ActuatorRuleRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let rule_id: String = row.try_get("rule_id")?;
        let actuator_id: String = row.try_get("actuator_id")?;
        let value: String = row.try_get("value")?;

        Ok(Self(ActuatorRule {
            id: decode("id", ActuatorRuleId::from_str(&id))?,
            rule_id: decode("rule_id", RuleId::from_str(&rule_id))?,
            actuator_id: decode("actuator_id", DeviceId::from_str(&actuator_id))?,
            value: decode("value", serde_json::from_str(&value))?,
            is_active: row.try_get("is_active")?,
        }))
    }
}

const RULE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM rules WHERE id = ?)";
const INSERT_RULE: &str = "INSERT INTO rules (id, name) VALUES (?, ?)";
const SELECT_RULE_BY_ID: &str = "SELECT * FROM rules WHERE id = ?";
const SELECT_RULES: &str = "SELECT * FROM rules ORDER BY name, id";
const UPDATE_RULE: &str = "UPDATE rules SET name = ? WHERE id = ?";
const DELETE_RULE: &str = "DELETE FROM rules WHERE id = ?";

const INSERT_SENSOR_RULE: &str = r"
    INSERT INTO sensor_rules (id, rule_id, sensor_id, measure_type, interval_start, interval_end)
    VALUES (?, ?, ?, ?, ?, ?)
";
const SELECT_SENSOR_RULE_BY_ID: &str = "SELECT * FROM sensor_rules WHERE id = ?";
const SELECT_SENSOR_RULES_BY_RULE: &str = "SELECT * FROM sensor_rules WHERE rule_id = ?";
const SELECT_MATCHING_SENSOR_RULES: &str = r"
    SELECT * FROM sensor_rules
    WHERE measure_type = ? AND interval_start <= ? AND interval_end >= ?
";
const UPDATE_SENSOR_RULE: &str = r"
    UPDATE sensor_rules
    SET rule_id = ?, sensor_id = ?, measure_type = ?, interval_start = ?, interval_end = ?
    WHERE id = ?
";
const DELETE_SENSOR_RULE: &str = "DELETE FROM sensor_rules WHERE id = ?";

const INSERT_ACTUATOR_RULE: &str = r"
    INSERT INTO actuator_rules (id, rule_id, actuator_id, value, is_active)
    VALUES (?, ?, ?, ?, ?)
";
const SELECT_ACTUATOR_RULE_BY_ID: &str = "SELECT * FROM actuator_rules WHERE id = ?";
const SELECT_ACTUATOR_RULES_BY_RULE: &str = "SELECT * FROM actuator_rules WHERE rule_id = ?";
const SELECT_ACTIVE_ACTUATOR_RULES: &str =
    "SELECT * FROM actuator_rules WHERE rule_id = ? AND is_active = 1";
const UPDATE_ACTUATOR_RULE: &str = r"
    UPDATE actuator_rules
    SET rule_id = ?, actuator_id = ?, value = ?, is_active = ?
    WHERE id = ?
";
const DELETE_ACTUATOR_RULE: &str = "DELETE FROM actuator_rules WHERE id = ?";

/// `SQLite`-backed rule repository.
#[derive(Debug, Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn execute(&self, query: &'static str, id: String) -> Result<(), BrightnestError> {
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

/// Map a failed child write. A foreign key violation means the parent rule
/// or the referenced device went away; report whichever is missing.
async fn child_write_error(
    pool: &SqlitePool,
    err: sqlx::Error,
    rule_id: RuleId,
    device_id: Option<DeviceId>,
) -> BrightnestError {
    let err = StorageError::from(err);
    if !err.is_foreign_key_violation() {
        return err.into();
    }
    let rule_exists = sqlx::query_scalar::<_, bool>(RULE_EXISTS)
        .bind(rule_id.to_string())
        .fetch_one(pool)
        .await;
    match (rule_exists, device_id) {
        (Ok(false), _) => BrightnestError::RuleNotFound(rule_id),
        (Ok(true), Some(device_id)) => NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        }
        .into(),
        (Ok(true), None) => err.into(),
        (Err(lookup), _) => StorageError::from(lookup).into(),
    }
}

impl RuleRepository for SqliteRuleRepository {
    fn create_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT_RULE)
                .bind(rule.id.to_string())
                .bind(&rule.name)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rule)
        }
    }

    fn get_rule(&self, id: RuleId) -> impl Future<Output = Result<Option<Rule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<RuleRow> = sqlx::query_as(SELECT_RULE_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|r| r.0))
        }
    }

    fn list_rules(&self) -> impl Future<Output = Result<Vec<Rule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<RuleRow> = sqlx::query_as(SELECT_RULES)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    fn update_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE_RULE)
                .bind(&rule.name)
                .bind(rule.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rule)
        }
    }

    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        self.execute(DELETE_RULE, id.to_string())
    }

    fn create_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let inserted = sqlx::query(INSERT_SENSOR_RULE)
                .bind(sensor_rule.id.to_string())
                .bind(sensor_rule.rule_id.to_string())
                .bind(sensor_rule.sensor_id.map(|id| id.to_string()))
                .bind(&sensor_rule.measure_type)
                .bind(sensor_rule.interval_start)
                .bind(sensor_rule.interval_end)
                .execute(&pool)
                .await;
            if let Err(err) = inserted {
                return Err(
                    child_write_error(
                        &pool,
                        err,
                        sensor_rule.rule_id,
                        sensor_rule.sensor_id,
                    )
                    .await,
                );
            }

            Ok(sensor_rule)
        }
    }

    fn get_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<Option<SensorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<SensorRuleRow> = sqlx::query_as(SELECT_SENSOR_RULE_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|r| r.0))
        }
    }

    fn find_sensor_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<SensorRuleRow> = sqlx::query_as(SELECT_SENSOR_RULES_BY_RULE)
                .bind(rule_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    fn find_matching_sensor_rules(
        &self,
        measure_type: &str,
        value: f64,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        let measure_type = measure_type.to_string();
        async move {
            let rows: Vec<SensorRuleRow> = sqlx::query_as(SELECT_MATCHING_SENSOR_RULES)
                .bind(&measure_type)
                .bind(value)
                .bind(value)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    fn update_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let updated = sqlx::query(UPDATE_SENSOR_RULE)
                .bind(sensor_rule.rule_id.to_string())
                .bind(sensor_rule.sensor_id.map(|id| id.to_string()))
                .bind(&sensor_rule.measure_type)
                .bind(sensor_rule.interval_start)
                .bind(sensor_rule.interval_end)
                .bind(sensor_rule.id.to_string())
                .execute(&pool)
                .await;
            if let Err(err) = updated {
                return Err(
                    child_write_error(
                        &pool,
                        err,
                        sensor_rule.rule_id,
                        sensor_rule.sensor_id,
                    )
                    .await,
                );
            }

            Ok(sensor_rule)
        }
    }

    fn delete_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        self.execute(DELETE_SENSOR_RULE, id.to_string())
    }

    fn create_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let value = serde_json::to_string(&actuator_rule.value).map_err(StorageError::from)?;
            let inserted = sqlx::query(INSERT_ACTUATOR_RULE)
                .bind(actuator_rule.id.to_string())
                .bind(actuator_rule.rule_id.to_string())
                .bind(actuator_rule.actuator_id.to_string())
                .bind(&value)
                .bind(actuator_rule.is_active)
                .execute(&pool)
                .await;
            if let Err(err) = inserted {
                return Err(
                    child_write_error(
                        &pool,
                        err,
                        actuator_rule.rule_id,
                        Some(actuator_rule.actuator_id),
                    )
                    .await,
                );
            }

            Ok(actuator_rule)
        }
    }

    fn get_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<Option<ActuatorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<ActuatorRuleRow> = sqlx::query_as(SELECT_ACTUATOR_RULE_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|r| r.0))
        }
    }

    fn find_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<ActuatorRuleRow> = sqlx::query_as(SELECT_ACTUATOR_RULES_BY_RULE)
                .bind(rule_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    fn find_active_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<ActuatorRuleRow> = sqlx::query_as(SELECT_ACTIVE_ACTUATOR_RULES)
                .bind(rule_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    fn update_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send {
        let pool = self.pool.clone();
        async move {
            let value = serde_json::to_string(&actuator_rule.value).map_err(StorageError::from)?;
            let updated = sqlx::query(UPDATE_ACTUATOR_RULE)
                .bind(actuator_rule.rule_id.to_string())
                .bind(actuator_rule.actuator_id.to_string())
                .bind(&value)
                .bind(actuator_rule.is_active)
                .bind(actuator_rule.id.to_string())
                .execute(&pool)
                .await;
            if let Err(err) = updated {
                return Err(
                    child_write_error(
                        &pool,
                        err,
                        actuator_rule.rule_id,
                        Some(actuator_rule.actuator_id),
                    )
                    .await,
                );
            }

            Ok(actuator_rule)
        }
    }

    fn delete_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        self.execute(DELETE_ACTUATOR_RULE, id.to_string())
    }
}
