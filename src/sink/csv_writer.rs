//! Comma separated table output
//!
//! One file per stream, `{tenant}_{stream}.txt`, header row written at
//! creation time so an empty crawl still leaves seven valid tables.
//!
//! # Concurrency
//!
//! - One `parking_lot::Mutex` per stream; writers of different streams
//!   never contend
//! - A record is serialized under its stream's lock, so rows never tear
//! - Row counters are lock-free

use super::{
    AdministrativeUnitRecord, ErrorRecord, GroupRecord, MembershipEdge, RecordSink, RoleRecord,
    Stream,
};
use crate::directory::UserRecord;
use crate::error::{SinkError, SinkResult};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type TableWriter = csv::Writer<BufWriter<File>>;

/// Rows written per stream
#[derive(Debug, Default)]
pub struct SinkStats {
    rows: [AtomicU64; 7],
}

impl SinkStats {
    fn record(&self, stream: Stream) {
        self.rows[stream.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Rows written to a stream, header excluded
    pub fn rows(&self, stream: Stream) -> u64 {
        self.rows[stream.index()].load(Ordering::Relaxed)
    }

    /// Rows written across all streams
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.load(Ordering::Relaxed)).sum()
    }
}

/// Seven-file CSV sink
pub struct CsvSink {
    writers: Vec<Mutex<TableWriter>>,
    paths: Vec<PathBuf>,
    stats: SinkStats,
}

impl CsvSink {
    /// Create all seven files in `dir` and write their headers
    ///
    /// Existing files with the same names are truncated. Failing to open any
    /// stream is fatal for the run.
    pub fn create(dir: &Path, tenant: &str) -> SinkResult<Self> {
        let mut writers = Vec::with_capacity(Stream::ALL.len());
        let mut paths = Vec::with_capacity(Stream::ALL.len());

        for stream in Stream::ALL {
            let path = dir.join(format!("{}_{}.txt", tenant, stream.name()));
            let file = File::create(&path).map_err(|e| SinkError::Open {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(BufWriter::new(file));
            writer
                .write_record(stream.header())
                .map_err(|e| write_error(stream, e))?;

            debug!(stream = stream.name(), path = %path.display(), "Opened output stream");
            writers.push(Mutex::new(writer));
            paths.push(path);
        }

        Ok(Self {
            writers,
            paths,
            stats: SinkStats::default(),
        })
    }

    /// Path of a stream's file
    pub fn path(&self, stream: Stream) -> &Path {
        &self.paths[stream.index()]
    }

    /// Row counters
    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    fn append<I, T>(&self, stream: Stream, record: I) -> SinkResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writers[stream.index()]
            .lock()
            .write_record(record)
            .map_err(|e| write_error(stream, e))?;
        self.stats.record(stream);
        Ok(())
    }
}

fn write_error(stream: Stream, e: csv::Error) -> SinkError {
    SinkError::Write {
        stream: stream.name(),
        reason: e.to_string(),
    }
}

impl RecordSink for CsvSink {
    fn write_user(&self, user: &UserRecord) -> SinkResult<()> {
        self.append(
            Stream::Users,
            [
                user.id.as_str(),
                user.user_type.as_str(),
                user.user_principal_name.as_str(),
                user.display_name.as_str(),
            ],
        )
    }

    fn write_group(&self, group: &GroupRecord) -> SinkResult<()> {
        self.append(Stream::Groups, [group.id.as_str(), group.display_name.as_str()])
    }

    fn write_role(&self, role: &RoleRecord) -> SinkResult<()> {
        self.append(Stream::Roles, [role.id.as_str(), role.display_name.as_str()])
    }

    fn write_admin_unit(&self, unit: &AdministrativeUnitRecord) -> SinkResult<()> {
        self.append(Stream::AdministrativeUnits, [unit.id.as_str()])
    }

    fn write_edge(&self, edge: &MembershipEdge) -> SinkResult<()> {
        self.append(edge.stream(), [edge.object_id.as_str(), edge.subject_id.as_str()])
    }

    fn write_error(&self, error: &ErrorRecord) -> SinkResult<()> {
        self.append(Stream::Errors, [error.object_id.as_str(), error.message.as_str()])
    }

    fn flush(&self) -> SinkResult<()> {
        for stream in Stream::ALL {
            self.writers[stream.index()]
                .lock()
                .flush()
                .map_err(|e| SinkError::Flush {
                    stream: stream.name(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_headers_written_on_create() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::create(dir.path(), "contoso").unwrap();
        sink.flush().unwrap();

        let users = std::fs::read_to_string(dir.path().join("contoso_users.txt")).unwrap();
        assert_eq!(users, "objectId,userType,userPrincipalName,displayName\n");

        let units =
            std::fs::read_to_string(dir.path().join("contoso_administrativeunits.txt")).unwrap();
        assert_eq!(units, "objectId\n");
        assert_eq!(sink.stats().total(), 0);
    }

    #[test]
    fn test_edge_column_order() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::create(dir.path(), "t").unwrap();
        sink.write_edge(&MembershipEdge::role_member("R1", "alice")).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(sink.path(Stream::RolesMembership)).unwrap();
        assert_eq!(content, "roleId,userId\nR1,alice\n");
        assert_eq!(sink.stats().rows(Stream::RolesMembership), 1);
        assert_eq!(sink.stats().rows(Stream::GroupsMembership), 0);
    }

    #[test]
    fn test_display_name_with_comma_is_quoted() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::create(dir.path(), "t").unwrap();
        sink.write_group(&GroupRecord {
            id: "G1".into(),
            display_name: "Sales, EMEA".into(),
        })
        .unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(sink.path(Stream::Groups)).unwrap();
        assert_eq!(content, "objectId,displayname\nG1,\"Sales, EMEA\"\n");
    }

    #[test]
    fn test_concurrent_rows_never_tear() {
        let dir = tempdir().unwrap();
        let sink = std::sync::Arc::new(CsvSink::create(dir.path(), "t").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = std::sync::Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        sink.write_error(&ErrorRecord {
                            object_id: format!("obj-{t}-{i}"),
                            message: "Request_ResourceNotFound: gone".into(),
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        sink.flush().unwrap();

        let content = std::fs::read_to_string(sink.path(Stream::Errors)).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 8 * 500);
        assert!(lines[1..]
            .iter()
            .all(|l| l.starts_with("obj-") && l.ends_with(",Request_ResourceNotFound: gone")));
    }
}
