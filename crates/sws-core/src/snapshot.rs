//! Warm restart from a full dump instead of the whole record history.

use std::path::Path;

use sws_record::{read_dump, DumpHeader, DumpWriter, ObjectSnapshot};
use sws_store::ObjectStatus;
use sws_types::{SwitchError, SwitchResult};
use tracing::{error, info};

use crate::store::SwitchStore;

impl SwitchStore {
    /// Write every live object, AUTO objects included, to `path`. Returns
    /// the number of objects written.
    pub fn dump(&self, path: &Path) -> SwitchResult<u64> {
        let _store = self.store_lock.lock();
        let mut ids = self.attrs.all_live();
        ids.sort();
        // Objects deleted while collecting are left out.
        let snapshots: Vec<ObjectSnapshot> = ids
            .into_iter()
            .filter_map(|id| self.attrs.get_all(id).ok().map(|attrs| ObjectSnapshot { id, attrs }))
            .collect();

        let mut writer = DumpWriter::create(path, &DumpHeader::new(snapshots.len() as u64))?;
        for snapshot in &snapshots {
            writer.append(snapshot)?;
        }
        let written = writer.finish()?;
        info!(path = %path.display(), objects = written, "store dumped");
        Ok(written)
    }

    /// Load a dump into this store, which must be empty.
    ///
    /// Objects come back under their dumped handles with their dumped
    /// values. Reference edges and secondary keys are rebuilt; no trigger
    /// runs and nothing is recorded. On failure the store is left empty.
    pub fn restore(&self, path: &Path) -> SwitchResult<usize> {
        let _store = self.store_lock.lock();
        if !self.attrs.is_empty() {
            return Err(SwitchError::Failure("restore needs an empty store".into()));
        }
        let dump = read_dump(path)?;
        if let Err(e) = self.restore_objects(&dump.objects) {
            self.discard(&dump.objects);
            return Err(e);
        }
        info!(path = %path.display(), objects = dump.objects.len(), "store restored");
        Ok(dump.objects.len())
    }

    fn restore_objects(&self, objects: &[ObjectSnapshot]) -> SwitchResult<()> {
        // Slots first, so every reference target exists before edges go in.
        for snap in objects {
            let ot = snap.id.object_type();
            self.model.object(ot)?;
            for a in &snap.attrs {
                let meta = self.model.attr_of(ot, a.id)?;
                self.model.validate_value(meta, &a.value)?;
            }
            self.allocators.reserve(snap.id)?;
            self.attrs.create(snap.id)?;
            for a in &snap.attrs {
                self.attrs.set(snap.id, a.id, &a.value)?;
            }
        }

        for snap in objects {
            let info = self.model.object(snap.id.object_type())?;
            for a in &snap.attrs {
                let meta = self.model.attr(a.id)?;
                if !meta.is_tracked_reference() {
                    continue;
                }
                if let Some(missing) = a.value.referenced_ids().into_iter().find(|r| self.attrs.status(*r).is_err()) {
                    return Err(SwitchError::invalid(format!(
                        "{} of {} references {missing}, which is not in the dump",
                        meta.name, snap.id
                    )));
                }
            }
            self.index
                .insert_all(info.object_type, &self.keys_for(info, &snap.attrs), snap.id)?;
            for a in &snap.attrs {
                let meta = self.model.attr(a.id)?;
                if meta.is_tracked_reference() {
                    self.add_edges(snap.id, meta, &a.value);
                }
            }
            self.attrs.set_status(snap.id, ObjectStatus::Live)?;
        }
        Ok(())
    }

    /// Undo a partial restore. Keys and edges exist exactly for the objects
    /// that reached `Live`.
    fn discard(&self, objects: &[ObjectSnapshot]) {
        for snap in objects {
            if self.attrs.is_live(snap.id) {
                if let Ok(info) = self.model.object(snap.id.object_type()) {
                    self.index
                        .erase_all(info.object_type, &self.keys_for(info, &snap.attrs), snap.id);
                }
                for a in &snap.attrs {
                    if let Ok(meta) = self.model.attr(a.id) {
                        if meta.is_tracked_reference() {
                            self.remove_edges(snap.id, meta, &a.value);
                        }
                    }
                }
            }
            if self.attrs.status(snap.id).is_ok() {
                if let Err(e) = self.attrs.delete(snap.id) {
                    error!(object_id = %snap.id, error = %e, "restore cleanup failed");
                }
            }
            self.allocators.release(snap.id);
        }
    }
}
