//! SQLite database for workspaces

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, Transaction};
use waypoint_engine::{
    GraphSnapshot, LinkRow, LogSink, NodeRow, OrchestrationRow, ProjectRow, Workspace,
    WorkspaceRows,
};

use crate::error::Result;

const NODES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER NOT NULL,
        orchestration_id INTEGER NOT NULL,
        type TEXT NOT NULL,
        pos_x REAL NOT NULL,
        pos_y REAL NOT NULL,
        data TEXT,
        PRIMARY KEY (orchestration_id, id),
        FOREIGN KEY (orchestration_id) REFERENCES orchestrations(id) ON DELETE CASCADE
    );
";

const LINKS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS links (
        id INTEGER NOT NULL,
        orchestration_id INTEGER NOT NULL,
        start_attr INTEGER NOT NULL,
        end_attr INTEGER NOT NULL,
        PRIMARY KEY (orchestration_id, id),
        FOREIGN KEY (orchestration_id) REFERENCES orchestrations(id) ON DELETE CASCADE
    );
";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS orchestrations (
        id INTEGER PRIMARY KEY,
        project_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
    );
";

/// Workspace database backed by SQLite
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database, creating tables as needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let mut db = Self { conn };
        db.migrate_legacy_tables()?;
        db.conn.execute_batch(NODES_TABLE)?;
        db.conn.execute_batch(LINKS_TABLE)?;
        Ok(db)
    }

    /// Rebuild `nodes` and `links` tables keyed by `id` alone
    ///
    /// Older databases used a single-column key, which rejects the same node
    /// id in two orchestrations. Rows are copied into tables keyed by
    /// `(orchestration_id, id)` in one transaction; nodes without a payload
    /// column get `NULL` data.
    fn migrate_legacy_tables(&mut self) -> Result<()> {
        let nodes = table_columns(&self.conn, "nodes")?;
        let links = table_columns(&self.conn, "links")?;
        let nodes_legacy = is_legacy(&nodes);
        let links_legacy = is_legacy(&links);
        if !nodes_legacy && !links_legacy {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        if nodes_legacy {
            log::info!("Rebuilding nodes table with per-orchestration keys");
            let data = if nodes.iter().any(|(name, _)| name == "data") {
                "data"
            } else {
                "NULL"
            };
            tx.execute_batch("ALTER TABLE nodes RENAME TO nodes_legacy;")?;
            tx.execute_batch(NODES_TABLE)?;
            tx.execute(
                &format!(
                    "INSERT INTO nodes (id, orchestration_id, type, pos_x, pos_y, data)
                     SELECT id, orchestration_id, type, pos_x, pos_y, {}
                     FROM nodes_legacy
                     WHERE orchestration_id IN (SELECT id FROM orchestrations)",
                    data
                ),
                [],
            )?;
            tx.execute_batch("DROP TABLE nodes_legacy;")?;
        }
        if links_legacy {
            log::info!("Rebuilding links table with per-orchestration keys");
            tx.execute_batch("ALTER TABLE links RENAME TO links_legacy;")?;
            tx.execute_batch(LINKS_TABLE)?;
            tx.execute(
                "INSERT INTO links (id, orchestration_id, start_attr, end_attr)
                 SELECT id, orchestration_id, start_attr, end_attr
                 FROM links_legacy
                 WHERE orchestration_id IN (SELECT id FROM orchestrations)",
                [],
            )?;
            tx.execute_batch("DROP TABLE links_legacy;")?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace everything stored with the workspace's current state
    ///
    /// Runs in one transaction: on any failure nothing on disk changes.
    pub fn save_workspace(&mut self, workspace: &mut Workspace) -> Result<()> {
        let rows = workspace.to_rows();
        self.save_rows(&rows)
    }

    /// Replace everything stored with the given rows, in one transaction
    pub fn save_rows(&mut self, rows: &WorkspaceRows) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_rows(&tx, rows)?;
        tx.commit()?;

        log::info!(
            "Saved {} projects, {} orchestrations, {} nodes, {} links",
            rows.projects.len(),
            rows.orchestrations.len(),
            rows.graph.nodes.len(),
            rows.graph.links.len()
        );
        Ok(())
    }

    /// Read every stored row
    pub fn load_rows(&self) -> Result<WorkspaceRows> {
        let projects = {
            let mut stmt = self.conn.prepare("SELECT id, name FROM projects ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(ProjectRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let orchestrations = {
            let mut stmt = self.conn.prepare(
                "SELECT id, project_id, name FROM orchestrations ORDER BY project_id, id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(OrchestrationRow {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let nodes = {
            let mut stmt = self.conn.prepare(
                "SELECT id, orchestration_id, type, pos_x, pos_y, data
                 FROM nodes ORDER BY orchestration_id, id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(NodeRow {
                    id: row.get(0)?,
                    orchestration_id: row.get(1)?,
                    node_type: row.get(2)?,
                    pos_x: row.get::<_, f64>(3)? as f32,
                    pos_y: row.get::<_, f64>(4)? as f32,
                    data: row.get(5)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let links = {
            let mut stmt = self.conn.prepare(
                "SELECT id, orchestration_id, start_attr, end_attr
                 FROM links ORDER BY orchestration_id, id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(LinkRow {
                    id: row.get(0)?,
                    orchestration_id: row.get(1)?,
                    start_attr: row.get(2)?,
                    end_attr: row.get(3)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(WorkspaceRows {
            projects,
            orchestrations,
            graph: GraphSnapshot { nodes, links },
        })
    }

    /// Load the stored workspace
    pub fn load_workspace(&self, log_sink: Arc<LogSink>) -> Result<Workspace> {
        let rows = self.load_rows()?;
        log::info!(
            "Loaded {} projects, {} orchestrations, {} nodes, {} links",
            rows.projects.len(),
            rows.orchestrations.len(),
            rows.graph.nodes.len(),
            rows.graph.links.len()
        );
        Ok(Workspace::from_rows(&rows, log_sink))
    }

    /// Load the stored workspace, or a fresh default one if loading fails or
    /// nothing is stored yet
    pub fn load_or_bootstrap(&self, log_sink: Arc<LogSink>) -> Workspace {
        match self.load_workspace(Arc::clone(&log_sink)) {
            Ok(workspace) if !workspace.is_empty() => workspace,
            Ok(_) => {
                log::info!("Database is empty, creating default project");
                Workspace::bootstrap(log_sink)
            }
            Err(e) => {
                log::error!("Failed to load workspace: {}", e);
                log_sink.append(format!("[ERROR] Failed to load workspace: {}", e));
                Workspace::bootstrap(log_sink)
            }
        }
    }
}

/// Column names and primary-key positions of a table; empty if it is missing
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// An existing table whose key does not include `orchestration_id`
fn is_legacy(columns: &[(String, i64)]) -> bool {
    !columns.is_empty()
        && !columns
            .iter()
            .any(|(name, pk)| name == "orchestration_id" && *pk > 0)
}

fn write_rows(tx: &Transaction<'_>, rows: &WorkspaceRows) -> Result<()> {
    // Children first so the foreign keys hold throughout
    for table in ["links", "nodes", "orchestrations", "projects"] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    for project in &rows.projects {
        tx.execute(
            "INSERT INTO projects (id, name) VALUES (?1, ?2)",
            params![project.id, project.name],
        )?;
    }

    for orchestration in &rows.orchestrations {
        tx.execute(
            "INSERT INTO orchestrations (id, project_id, name) VALUES (?1, ?2, ?3)",
            params![orchestration.id, orchestration.project_id, orchestration.name],
        )?;
    }

    for node in &rows.graph.nodes {
        tx.execute(
            "INSERT INTO nodes (id, orchestration_id, type, pos_x, pos_y, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id,
                node.orchestration_id,
                node.node_type,
                node.pos_x as f64,
                node.pos_y as f64,
                node.data,
            ],
        )?;
    }

    for link in &rows.graph.links {
        tx.execute(
            "INSERT INTO links (id, orchestration_id, start_attr, end_attr)
             VALUES (?1, ?2, ?3, ?4)",
            params![link.id, link.orchestration_id, link.start_attr, link.end_attr],
        )?;
    }

    Ok(())
}
