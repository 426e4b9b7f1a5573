use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcloud_gax::grpc::Code;
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig, Error as SpannerError};
use gcloud_spanner::mutation::insert;
use gcloud_spanner::row::Row;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::value::CommitTimestamp;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    BatchOperation, NewRoute, RouteCounts, RoutePage, RouteQuery, RouteRecord, RouteStore,
    RouteUpdate, StoreError, StoreResult,
};
use crate::config::SpannerConfig;

const TABLE: &str = "mock_routes";

const COLUMNS: &[&str] = &[
    "id",
    "path",
    "methods",
    "response",
    "status_code",
    "headers",
    "delay_seconds",
    "description",
    "is_active",
    "created_at",
    "updated_at",
];

// JSON columns are read back as text so they can be parsed with serde_json
const SELECT_COLUMNS: &str = "id, path, methods, TO_JSON_STRING(response) AS response, \
     status_code, TO_JSON_STRING(headers) AS headers, delay_seconds, description, \
     is_active, created_at, updated_at";

/// Route store backed by a Cloud Spanner table
///
/// Path uniqueness is enforced twice: the insert runs inside a read-write
/// transaction that first checks for the path, and the table carries a
/// unique index on `path` so a racing commit is rejected by Spanner itself.
#[derive(Clone)]
pub struct SpannerRouteStore {
    inner: Arc<Client>,
}

impl SpannerRouteStore {
    /// Connect to the configured database
    ///
    /// The gcloud-spanner library picks up `SPANNER_EMULATOR_HOST` on its own.
    /// Instance, database and table are created first when missing, which
    /// keeps local development against the emulator zero-setup.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {}",
            database_path
        );

        Ok(Self {
            inner: Arc::new(client),
        })
    }

    async fn query_records(&self, statement: Statement) -> Result<Vec<RouteRecord>> {
        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut rows = tx
            .query(statement)
            .await
            .context("Failed to query mock routes")?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to read mock route row")? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn query_count(&self, statement: Statement, column: &str) -> Result<u64> {
        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction for count")?;

        let mut rows = tx
            .query(statement)
            .await
            .context("Failed to execute count query")?;

        let count: i64 = match rows.next().await.context("Failed to read count row")? {
            Some(row) => row
                .column_by_name(column)
                .context("Failed to read count column")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn fetch_committed(&self, id: Uuid) -> StoreResult<RouteRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Route {} vanished after commit", id).into())
    }
}

/// Build the filter shared by the listing count and data queries
fn list_filter(query: &RouteQuery) -> (String, Option<String>) {
    let mut clauses = Vec::new();
    if query.active_only {
        clauses.push("is_active = TRUE");
    }
    let pattern = query
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));
    if pattern.is_some() {
        clauses.push("(LOWER(path) LIKE @search OR LOWER(IFNULL(description, '')) LIKE @search)");
    }

    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (filter, pattern)
}

fn record_from_row(row: &Row) -> Result<RouteRecord> {
    let id: String = row.column_by_name("id")?;
    let methods: String = row.column_by_name("methods")?;
    let response: String = row.column_by_name("response")?;
    let headers: String = row.column_by_name("headers")?;
    let status_code: i64 = row.column_by_name("status_code")?;

    // Timestamps come back as RFC3339 strings
    let created_at: String = row.column_by_name("created_at")?;
    let updated_at: String = row.column_by_name("updated_at")?;

    Ok(RouteRecord {
        id: Uuid::parse_str(&id).context("Stored route id is not a UUID")?,
        path: row.column_by_name("path")?,
        methods: split_methods(&methods),
        response: serde_json::from_str(&response).context("Failed to deserialize response template")?,
        status_code: u16::try_from(status_code).context("Stored status code out of range")?,
        headers: serde_json::from_str(&headers).context("Failed to deserialize headers template")?,
        delay: row.column_by_name("delay_seconds")?,
        description: row.column_by_name("description")?,
        is_active: row.column_by_name("is_active")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .context("Failed to parse created_at timestamp")?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .context("Failed to parse updated_at timestamp")?
            .with_timezone(&Utc),
    })
}

fn split_methods(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Column values for an insert, serialized ahead of the transaction so the
/// retryable closure only clones plain values.
#[derive(Clone)]
struct InsertValues {
    id: String,
    path: String,
    methods: String,
    response: String,
    status_code: i64,
    headers: String,
    delay: f64,
    description: Option<String>,
    is_active: bool,
}

impl InsertValues {
    fn new(id: Uuid, route: &NewRoute) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            path: route.path.clone(),
            methods: route.methods.join(","),
            response: serde_json::to_string(&route.response)
                .context("Failed to serialize response template")?,
            status_code: i64::from(route.status_code),
            headers: serde_json::to_string(&route.headers)
                .context("Failed to serialize headers template")?,
            delay: route.delay,
            description: route.description.clone(),
            is_active: route.is_active,
        })
    }
}

/// `SET` assignments for a partial update
#[derive(Clone)]
struct ColumnChanges {
    methods: Option<String>,
    response: Option<String>,
    status_code: Option<i64>,
    headers: Option<String>,
    delay: Option<f64>,
    description: Option<Option<String>>,
    is_active: Option<bool>,
}

impl ColumnChanges {
    fn new(update: &RouteUpdate) -> Result<Self> {
        Ok(Self {
            methods: update.methods.as_ref().map(|m| m.join(",")),
            response: update
                .response
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("Failed to serialize response template")?,
            status_code: update.status_code.map(i64::from),
            headers: update
                .headers
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("Failed to serialize headers template")?,
            delay: update.delay,
            description: update.description.clone(),
            is_active: update.is_active,
        })
    }

    fn sql(&self) -> String {
        let mut sets = Vec::new();
        if self.methods.is_some() {
            sets.push("methods = @methods");
        }
        if self.response.is_some() {
            sets.push("response = PARSE_JSON(@response)");
        }
        if self.status_code.is_some() {
            sets.push("status_code = @status_code");
        }
        if self.headers.is_some() {
            sets.push("headers = PARSE_JSON(@headers)");
        }
        if self.delay.is_some() {
            sets.push("delay_seconds = @delay");
        }
        if self.description.is_some() {
            sets.push("description = @description");
        }
        if self.is_active.is_some() {
            sets.push("is_active = @is_active");
        }
        sets.push("updated_at = PENDING_COMMIT_TIMESTAMP()");

        format!("UPDATE {} SET {} WHERE id = @id", TABLE, sets.join(", "))
    }

    fn statement(&self, id: &str) -> Statement {
        let mut statement = Statement::new(self.sql());
        statement.add_param("id", &id.to_string());
        if let Some(methods) = &self.methods {
            statement.add_param("methods", methods);
        }
        if let Some(response) = &self.response {
            statement.add_param("response", response);
        }
        if let Some(status_code) = &self.status_code {
            statement.add_param("status_code", status_code);
        }
        if let Some(headers) = &self.headers {
            statement.add_param("headers", headers);
        }
        if let Some(delay) = &self.delay {
            statement.add_param("delay", delay);
        }
        if let Some(description) = &self.description {
            statement.add_param("description", description);
        }
        if let Some(is_active) = &self.is_active {
            statement.add_param("is_active", is_active);
        }
        statement
    }
}

fn batch_statement(ids: Vec<String>, operation: BatchOperation) -> Statement {
    let mut statement = match operation {
        BatchOperation::Delete => {
            Statement::new(format!("DELETE FROM {} WHERE id IN UNNEST(@ids)", TABLE))
        }
        BatchOperation::Activate | BatchOperation::Deactivate => {
            let mut statement = Statement::new(format!(
                "UPDATE {} SET is_active = @active, updated_at = PENDING_COMMIT_TIMESTAMP() \
                 WHERE id IN UNNEST(@ids)",
                TABLE
            ));
            statement.add_param("active", &(operation == BatchOperation::Activate));
            statement
        }
    };
    statement.add_param("ids", &ids);
    statement
}

fn is_already_exists(err: &SpannerError) -> bool {
    matches!(err, SpannerError::GRPC(status) if status.code() == Code::AlreadyExists)
}

#[async_trait]
impl RouteStore for SpannerRouteStore {
    async fn find_active_by_path(&self, path: &str) -> StoreResult<Option<RouteRecord>> {
        let mut statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE path = @path AND is_active = TRUE LIMIT 1",
            SELECT_COLUMNS, TABLE
        ));
        statement.add_param("path", &path.to_string());

        let record = self.query_records(statement).await?.into_iter().next();
        tracing::debug!("Active lookup for {}: found={}", path, record.is_some());
        Ok(record)
    }

    async fn list_active(&self) -> StoreResult<Vec<RouteRecord>> {
        let statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE is_active = TRUE ORDER BY created_at DESC",
            SELECT_COLUMNS, TABLE
        ));
        Ok(self.query_records(statement).await?)
    }

    async fn list(&self, query: &RouteQuery) -> StoreResult<RoutePage> {
        let (filter, pattern) = list_filter(query);

        let mut count_stmt = Statement::new(format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            TABLE, filter
        ));
        if let Some(pattern) = &pattern {
            count_stmt.add_param("search", pattern);
        }
        let total = self.query_count(count_stmt, "count").await?;

        // In Spanner SQL, LIMIT must come before OFFSET
        let mut data_stmt = Statement::new(format!(
            "SELECT {} FROM {}{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            SELECT_COLUMNS,
            TABLE,
            filter,
            query.per_page,
            query.offset()
        ));
        if let Some(pattern) = &pattern {
            data_stmt.add_param("search", pattern);
        }
        let routes = self.query_records(data_stmt).await?;

        tracing::debug!(
            "Listed {} routes (total: {}, search: {:?}, active_only: {}, page: {})",
            routes.len(),
            total,
            query.search,
            query.active_only,
            query.page
        );

        Ok(RoutePage { routes, total })
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteRecord>> {
        let mut statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE id = @id",
            SELECT_COLUMNS, TABLE
        ));
        statement.add_param("id", &id.to_string());
        Ok(self.query_records(statement).await?.into_iter().next())
    }

    async fn create(&self, route: NewRoute) -> StoreResult<RouteRecord> {
        let id = Uuid::new_v4();
        let values = InsertValues::new(id, &route)?;

        let result: Result<(_, bool), SpannerError> = self
            .inner
            .read_write_transaction(|tx| {
                let values = values.clone();
                Box::pin(async move {
                    let mut check = Statement::new(format!(
                        "SELECT COUNT(*) AS count FROM {} WHERE path = @path",
                        TABLE
                    ));
                    check.add_param("path", &values.path);
                    let mut rows = tx.query(check).await?;
                    let existing: i64 = match rows.next().await? {
                        Some(row) => row.column_by_name("count")?,
                        None => 0,
                    };
                    if existing > 0 {
                        return Ok(false);
                    }

                    tx.buffer_write(vec![insert(
                        TABLE,
                        COLUMNS,
                        &[
                            &values.id,
                            &values.path,
                            &values.methods,
                            &values.response,
                            &values.status_code,
                            &values.headers,
                            &values.delay,
                            &values.description,
                            &values.is_active,
                            &CommitTimestamp::new(),
                            &CommitTimestamp::new(),
                        ],
                    )]);
                    Ok(true)
                })
            })
            .await;

        match result {
            Ok((_, true)) => {
                tracing::debug!("Inserted route {} at {}", id, route.path);
                self.fetch_committed(id).await
            }
            Ok((_, false)) => Err(StoreError::Conflict(route.path)),
            Err(err) if is_already_exists(&err) => Err(StoreError::Conflict(route.path)),
            Err(err) => Err(anyhow::Error::new(err)
                .context("Failed to insert route into Spanner")
                .into()),
        }
    }

    async fn update(&self, id: Uuid, update: RouteUpdate) -> StoreResult<RouteRecord> {
        let changes = ColumnChanges::new(&update)?;
        let id_str = id.to_string();

        let result: Result<(_, i64), SpannerError> = self
            .inner
            .read_write_transaction(|tx| {
                let statement = changes.statement(&id_str);
                Box::pin(async move { Ok(tx.update(statement).await?) })
            })
            .await;

        let (_, rows) = result.context("Failed to update route in Spanner")?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }

        tracing::debug!("Updated route {}", id);
        self.fetch_committed(id).await
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        self.update(id, RouteUpdate::deactivate()).await.map(|_| ())
    }

    async fn batch_mutate(&self, ids: &[Uuid], operation: BatchOperation) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let result: Result<(_, i64), SpannerError> = self
            .inner
            .read_write_transaction(|tx| {
                let statement = batch_statement(ids.clone(), operation);
                Box::pin(async move { Ok(tx.update(statement).await?) })
            })
            .await;

        let (_, rows) = result.with_context(|| format!("Failed to {} routes in Spanner", operation.as_str()))?;

        tracing::debug!("Batch {} touched {} routes", operation.as_str(), rows);
        Ok(rows.max(0) as u64)
    }

    async fn counts(&self) -> StoreResult<RouteCounts> {
        let total = self
            .query_count(Statement::new(format!("SELECT COUNT(*) AS count FROM {}", TABLE)), "count")
            .await?;
        let active = self
            .query_count(
                Statement::new(format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE is_active = TRUE",
                    TABLE
                )),
                "count",
            )
            .await?;
        Ok(RouteCounts { total, active })
    }

    /// Execute `SELECT 1` to verify the session is alive
    async fn health_check(&self) -> StoreResult<()> {
        let statement = Statement::new("SELECT 1");

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create health check transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to execute health check query")?;

        if result_set
            .next()
            .await
            .context("Failed to read health check result")?
            .is_some()
        {
            tracing::debug!("Health check query succeeded");
            Ok(())
        } else {
            Err(anyhow::anyhow!("Health check query returned no results").into())
        }
    }
}

/// Automatically provision Spanner instance, database, and table
async fn auto_provision(config: &SpannerConfig) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path).await?;
    ensure_table_exists(&admin_client, &database_path).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let get_request = GetInstanceRequest {
        name: instance_path.to_string(),
        field_mask: None,
    };

    match admin_client.instance().get_instance(get_request, None).await {
        Ok(_) => {
            tracing::info!("Instance already exists: {}", instance_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Instance not found, creating: {}", instance_path);

            let instance_config = if config.emulator_host.is_some() {
                format!("{}/instanceConfigs/emulator-config", project_path)
            } else {
                format!("{}/instanceConfigs/regional-us-central1", project_path)
            };

            let create_request = CreateInstanceRequest {
                parent: project_path.to_string(),
                instance_id: config.instance.clone(),
                instance: Some(Instance {
                    name: instance_path.to_string(),
                    config: instance_config,
                    display_name: format!("{} instance", config.instance),
                    node_count: 1,
                    ..Default::default()
                }),
            };

            let mut operation = admin_client
                .instance()
                .create_instance(create_request, None)
                .await
                .context("Failed to start instance creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create instance")?;

            tracing::info!("Instance created successfully: {}", instance_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check instance existence: {}",
            e.message()
        )),
    }
}

async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let get_request = GetDatabaseRequest {
        name: database_path.to_string(),
    };

    match admin_client
        .database()
        .get_database(get_request, None)
        .await
    {
        Ok(_) => {
            tracing::info!("Database already exists: {}", database_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Database not found, creating: {}", database_path);

            let database_id = database_path
                .split('/')
                .next_back()
                .context("Invalid database path")?;

            let create_request = CreateDatabaseRequest {
                parent: instance_path.to_string(),
                create_statement: format!("CREATE DATABASE `{}`", database_id),
                extra_statements: vec![],
                encryption_config: None,
                database_dialect: 1, // Google Standard SQL
                proto_descriptors: vec![],
            };

            let mut operation = admin_client
                .database()
                .create_database(create_request, None)
                .await
                .context("Failed to start database creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create database")?;

            tracing::info!("Database created successfully: {}", database_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check database existence: {}",
            e.message()
        )),
    }
}

/// Ensure the mock_routes table and its unique path index exist
async fn ensure_table_exists(admin_client: &AdminClient, database_path: &str) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    let table_exists = ddl_response
        .into_inner()
        .statements
        .iter()
        .any(|stmt| {
            stmt.contains("CREATE TABLE mock_routes") || stmt.contains("CREATE TABLE `mock_routes`")
        });

    if table_exists {
        tracing::info!("Table '{}' already exists", TABLE);
        return Ok(());
    }

    tracing::info!("Table '{}' not found, creating...", TABLE);

    let create_table_ddl = r#"
CREATE TABLE mock_routes (
    id STRING(36) NOT NULL,
    path STRING(500) NOT NULL,
    methods STRING(200) NOT NULL,
    response JSON NOT NULL,
    status_code INT64 NOT NULL,
    headers JSON NOT NULL,
    delay_seconds FLOAT64 NOT NULL,
    description STRING(500),
    is_active BOOL NOT NULL,
    created_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
    updated_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
) PRIMARY KEY (id)
"#
    .trim()
    .to_string();

    let create_index_ddl = "CREATE UNIQUE INDEX mock_routes_by_path ON mock_routes (path)".to_string();

    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements: vec![create_table_ddl, create_index_ddl],
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start table creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create table")?;

    tracing::info!("Table '{}' created successfully", TABLE);
    Ok(())
}
