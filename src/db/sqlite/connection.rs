//! SQLite connection utilities

use rusqlite::Connection;
use std::path::Path;

/// Open a connection configured for one writer plus concurrent readers
pub fn create_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = if path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        let conn = Connection::open(path)?;
        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn
    };
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}
