//! Rebuilding a store from its record log.

use std::path::Path;

use serde::Serialize;
use sws_record::{decode_attrs, read_log, Op, RecordLine, RecordLog};
use sws_types::{ObjectId, Status, SwitchError, SwitchResult};
use tracing::{debug, info, warn};

use crate::error::{ReplayError, ReplayResult};
use crate::store::SwitchStore;

/// What a replay did, line by line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Create, set, and remove lines re-issued against the store.
    pub applied: usize,
    /// Lines written from inside a trigger chain.
    pub commented: usize,
    pub gets: usize,
    pub notifies: usize,
    /// Lines recording an operation that had failed.
    pub failed_status: usize,
    /// The log ended in a partial line, which was discarded.
    pub truncated_tail: bool,
}

/// Re-issues the mutations of a record log through a store.
///
/// Creates are replayed with their recorded dense ids, so handles survive
/// the round trip. AUTO objects are never in the log; the triggers the
/// replayed operations fire regenerate them.
#[derive(Debug)]
pub struct ReplayEngine<'a> {
    store: &'a SwitchStore,
}

impl<'a> ReplayEngine<'a> {
    pub fn new(store: &'a SwitchStore) -> Self {
        Self { store }
    }

    pub fn replay_file(&self, path: &Path) -> ReplayResult<ReplayReport> {
        let log = read_log(path)?;
        info!(path = %path.display(), lines = log.entries.len(), "replaying record log");
        self.replay_log(&log)
    }

    /// Apply `log` in order, stopping at the first line that fails.
    pub fn replay_log(&self, log: &RecordLog) -> ReplayResult<ReplayReport> {
        let mut report = ReplayReport {
            truncated_tail: log.truncated_tail,
            ..ReplayReport::default()
        };
        for entry in &log.entries {
            let line = match RecordLine::parse(&entry.text) {
                Ok(line) => line,
                Err(reason) if entry.text.starts_with('#') => {
                    warn!(line = entry.line_no, %reason, "unparsable commented line");
                    report.commented += 1;
                    continue;
                }
                Err(reason) => {
                    return Err(ReplayError::Line {
                        line: entry.line_no,
                        source: SwitchError::invalid(reason),
                    });
                }
            };
            if line.commented {
                report.commented += 1;
                continue;
            }
            if line.status != Status::Success.code() {
                report.failed_status += 1;
                continue;
            }
            match line.op {
                Op::Get => report.gets += 1,
                Op::Notify => report.notifies += 1,
                Op::Create | Op::Set | Op::Remove => {
                    self.apply(&line).map_err(|source| ReplayError::Line {
                        line: entry.line_no,
                        source,
                    })?;
                    report.applied += 1;
                }
            }
        }
        info!(
            applied = report.applied,
            commented = report.commented,
            truncated = report.truncated_tail,
            "replay finished"
        );
        Ok(report)
    }

    fn apply(&self, line: &RecordLine) -> SwitchResult<()> {
        let model = self.store.model();
        let ot = model.object_type_by_name(&line.type_name)?;
        debug!(op = ?line.op, object_type = %line.type_name, dense = line.dense_id, "replaying");
        match line.op {
            Op::Create => {
                let attrs = decode_attrs(model, ot, &line.fields)?;
                self.store.create_by_id(ot, &attrs, line.dense_id).map(|_| ())
            }
            Op::Set => {
                let attrs = decode_attrs(model, ot, &line.fields)?;
                let [attr] = attrs.as_slice() else {
                    return Err(SwitchError::invalid(format!(
                        "set line carries {} attributes",
                        attrs.len()
                    )));
                };
                self.store.set(ObjectId::new(ot, line.dense_id)?, attr)
            }
            Op::Remove => self.store.delete(ObjectId::new(ot, line.dense_id)?),
            Op::Get | Op::Notify => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::testing::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use parking_lot::Mutex;
    use sws_events::Event;
    use sws_types::{AttrList, Attribute, AttributeValue};
    use tempfile::TempDir;

    fn recording_store(dir: &TempDir) -> SwitchStore {
        let mut config = StoreConfig::default();
        config.record.path = Some(dir.path().join("record.log"));
        let store = SwitchStore::new(model(), config).unwrap();
        install_nexthop_triggers(&store);
        store
    }

    fn state(store: &SwitchStore) -> Vec<(ObjectId, Vec<Attribute>)> {
        let mut ids = store.attrs.all_live();
        ids.sort();
        ids.into_iter()
            .map(|id| (id, store.get_all(id).unwrap()))
            .collect()
    }

    fn write_log(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("hand.log");
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(&path, text).unwrap();
        path
    }

    /// A session touching every recorded operation, including trigger
    /// cascades and membership updates.
    fn session(store: &SwitchStore) {
        let p1 = create_port(store, 1);
        let p2 = create_port(store, 2);
        create_queue(store, p1, 0);
        let q = create_queue(store, p1, 1);
        let vlan = store
            .create(
                VLAN,
                &[
                    Attribute::new(VLAN_ID, 100u16),
                    Attribute::new(VLAN_NAME, "edge|core=1"),
                    Attribute::new(VLAN_MEMBER_PORTS, AttrList::of_ids([p1, p2])),
                ],
            )
            .unwrap();
        store.set(vlan, &Attribute::new(VLAN_LEARN_DISABLE, true)).unwrap();
        store.set(p2, &Attribute::new(PORT_SPEED, 100000u32)).unwrap();
        store.delete(q).unwrap();

        let nh1 = create_nexthop(store, "10.0.0.1");
        let nh2 = create_nexthop(store, "fe80::1");
        let r1 = create_route(store, "10.1.0.0/16", nh1);
        create_route(store, "10.2.0.0/16", nh1);
        store.set(r1, &Attribute::new(ROUTE_NEXTHOP, nh2)).unwrap();
        store.notify(&Event::Device { device: 0, up: true });
    }

    // ---------------------------------------------------------------
    // Round trip
    // ---------------------------------------------------------------

    #[test]
    fn replay_twice_yields_identical_state() {
        let dir = TempDir::new().unwrap();
        let original = recording_store(&dir);
        session(&original);
        let log = dir.path().join("record.log");

        let first = store();
        let second = store();
        let report = ReplayEngine::new(&first).replay_file(&log).unwrap();
        ReplayEngine::new(&second).replay_file(&log).unwrap();

        assert_eq!(report.notifies, 1);
        assert!(!report.truncated_tail);
        assert_eq!(state(&first), state(&second));
        assert_eq!(state(&first), state(&original));
        assert_eq!(auto_objects(&first).len(), 2);
    }

    #[test]
    fn auto_objects_are_never_logged() {
        let dir = TempDir::new().unwrap();
        let original = recording_store(&dir);
        session(&original);
        assert!(!auto_objects(&original).is_empty());

        let text = fs::read_to_string(dir.path().join("record.log")).unwrap();
        assert!(text.lines().all(|l| !l.contains("|nexthop_auto:")));
        assert!(text.lines().any(|l| l.contains("|c|0|route:")));
    }

    #[test]
    fn trigger_writes_are_commented_out() {
        let dir = TempDir::new().unwrap();
        let store = recording_store(&dir);
        store
            .on_create_after(PORT, |store, ctx, args| {
                store.set_with(ctx, args.object_id, &Attribute::new(PORT_PFC_ENABLE, true))
            })
            .unwrap();
        create_port(&store, 1);

        let text = fs::read_to_string(dir.path().join("record.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('#') && lines[0].contains("|s|"));
        assert!(lines[1].contains("|c|"));

        // Replaying re-runs the trigger instead of the commented set.
        let target = SwitchStore::with_model(model());
        target
            .on_create_after(PORT, |store, ctx, args| {
                store.set_with(ctx, args.object_id, &Attribute::new(PORT_PFC_ENABLE, true))
            })
            .unwrap();
        let report = ReplayEngine::new(&target)
            .replay_file(&dir.path().join("record.log"))
            .unwrap();
        assert_eq!(report.commented, 1);
        assert_eq!(report.applied, 1);
        let port = target.get_first(PORT).unwrap();
        assert_eq!(target.get(port, PORT_PFC_ENABLE).unwrap().value, AttributeValue::Bool(true));
    }

    #[test]
    fn reads_inside_triggers_are_commented_out() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::default();
        config.record.path = Some(dir.path().join("record.log"));
        config.record.record_gets = true;
        let store = SwitchStore::new(model(), config).unwrap();
        store
            .on_create_after(PORT, |store, ctx, args| {
                store.get_with(ctx, args.object_id, PORT_SPEED).map(|_| ())
            })
            .unwrap();
        let port = create_port(&store, 1);
        store.get(port, PORT_SPEED).unwrap();

        let text = fs::read_to_string(dir.path().join("record.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('#') && lines[0].contains("|g|"));
        assert!(lines[1].contains("|c|"));
        assert!(!lines[2].starts_with('#') && lines[2].contains("|g|"));
    }

    #[test]
    fn referrers_of_a_new_object_are_logged_after_it() {
        let dir = TempDir::new().unwrap();
        let recorded = Arc::new(recording_store(&dir));
        let created = Arc::new(Mutex::new(ObjectId::NULL));
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        {
            let (created, entered, release) =
                (Arc::clone(&created), Arc::clone(&entered), Arc::clone(&release));
            recorded
                .on_create_after(PORT, move |_, _, args| {
                    *created.lock() = args.object_id;
                    entered.wait();
                    release.wait();
                    Ok(())
                })
                .unwrap();
        }

        let port_creator = {
            let store = Arc::clone(&recorded);
            thread::spawn(move || create_port(&store, 1))
        };
        entered.wait();
        let port = *created.lock();
        let queue_creator = {
            let store = Arc::clone(&recorded);
            thread::spawn(move || create_queue(&store, port, 0))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!queue_creator.is_finished());
        release.wait();
        assert_eq!(port_creator.join().unwrap(), port);
        queue_creator.join().unwrap();

        let log = dir.path().join("record.log");
        let text = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("|c|0|port:1|"));
        assert!(lines[1].contains("|c|0|queue:1|"));

        let target = store();
        ReplayEngine::new(&target).replay_file(&log).unwrap();
        assert_eq!(state(&target), state(&recorded));
    }

    // ---------------------------------------------------------------
    // Tolerance
    // ---------------------------------------------------------------

    #[test]
    fn truncated_tail_is_discarded() {
        let dir = TempDir::new().unwrap();
        let original = recording_store(&dir);
        create_port(&original, 1);
        let path = dir.path().join("record.log");
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"2026-10-18T00:00:00.000000Z:1|c|0|po").unwrap();

        let target = store();
        let report = ReplayEngine::new(&target).replay_file(&path).unwrap();
        assert!(report.truncated_tail);
        assert_eq!(report.applied, 1);
        assert_eq!(target.get_all_handles(PORT).unwrap().len(), 1);
    }

    #[test]
    fn hand_written_log_counts_every_kind() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                "2026-10-18T00:00:00.000000Z:1|c|0|vlan:5|0|101=10|103=blue",
                "#garbage that is not a record line",
                "#2026-10-18T00:00:01.000000Z:1|s|0|vlan:5|102|102=true",
                "2026-10-18T00:00:02.000000Z:1|g|0|vlan:5|103|103=blue",
                "2026-10-18T00:00:03.000000Z:1|s|0|vlan:5|103|name=green",
                "2026-10-18T00:00:04.000000Z:1|c|4|vlan:6|0|101=10",
                "2026-10-18T00:00:05.000000Z:1|n|0|none:0|6|device=0|up=true",
            ],
        );
        let target = store();
        let report = ReplayEngine::new(&target).replay_file(&path).unwrap();
        assert_eq!(
            report,
            ReplayReport {
                applied: 2,
                commented: 2,
                gets: 1,
                notifies: 1,
                failed_status: 1,
                truncated_tail: false,
            }
        );
        let vlan = ObjectId::new(VLAN, 5).unwrap();
        assert_eq!(target.get(vlan, VLAN_NAME).unwrap().value, AttributeValue::from("green"));
        assert_eq!(target.get(vlan, VLAN_LEARN_DISABLE).unwrap().value, AttributeValue::Bool(false));
    }

    // ---------------------------------------------------------------
    // Failures
    // ---------------------------------------------------------------

    #[test]
    fn failing_line_stops_replay_with_its_number() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                "2026-10-18T00:00:00.000000Z:1|c|0|vlan:1|0|101=10",
                "2026-10-18T00:00:01.000000Z:1|r|0|vlan:2|0",
                "2026-10-18T00:00:02.000000Z:1|c|0|vlan:3|0|101=11",
            ],
        );
        let target = store();
        let err = ReplayEngine::new(&target).replay_file(&path).unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(matches!(
            err,
            ReplayError::Line { source: SwitchError::ItemNotFound(_), .. }
        ));
        assert_eq!(target.object_count(), 1);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let dir = TempDir::new().unwrap();
        let target = store();
        let bad_op = write_log(&dir, &["2026-10-18T00:00:00.000000Z:1|x|0|vlan:1|0"]);
        assert!(matches!(
            ReplayEngine::new(&target).replay_file(&bad_op),
            Err(ReplayError::Line { line: 1, .. })
        ));
        let two_fields = write_log(
            &dir,
            &[
                "2026-10-18T00:00:00.000000Z:1|c|0|vlan:1|0|101=10",
                "2026-10-18T00:00:01.000000Z:1|s|0|vlan:1|102|102=true|103=x",
            ],
        );
        let target = store();
        assert!(matches!(
            ReplayEngine::new(&target).replay_file(&two_fields),
            Err(ReplayError::Line { line: 2, source: SwitchError::InvalidParameter(_) })
        ));
        let unknown_type = write_log(&dir, &["2026-10-18T00:00:00.000000Z:1|r|0|bogus:1|0"]);
        assert!(ReplayEngine::new(&target).replay_file(&unknown_type).is_err());
    }

    #[test]
    fn missing_log_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let target = store();
        assert!(matches!(
            ReplayEngine::new(&target).replay_file(&dir.path().join("absent.log")),
            Err(ReplayError::Read(_))
        ));
    }
}
