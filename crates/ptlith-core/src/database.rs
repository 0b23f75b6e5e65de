use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cell::{Cell, CellId};
use crate::layer::LayerStack;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cell '{0}' referenced but not defined")]
    UndefinedCell(String),
}

/// The central layout database that holds all cells and the technology layer stack.
#[derive(Debug, Serialize, Deserialize)]
pub struct LayoutDatabase {
    /// Database identifier.
    pub id: Uuid,
    /// Library name (the GDS LIBNAME).
    pub name: String,
    /// Technology layers.
    pub layer_stack: LayerStack,
    /// All cells indexed by ID.
    cells: HashMap<CellId, Cell>,
    /// Top-level cell (entry point for hierarchy).
    pub top_cell: Option<CellId>,
    /// Database units per micrometer (1000 means 1 dbu = 1 nm).
    pub dbu_per_um: f64,
}

impl LayoutDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            layer_stack: LayerStack::new(),
            cells: HashMap::new(),
            top_cell: None,
            dbu_per_um: 1000.0,
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        let id = cell.id;
        self.cells.insert(id, cell);
        if self.top_cell.is_none() {
            self.top_cell = Some(id);
        }
        id
    }

    pub fn get_cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    pub fn remove_cell(&mut self, id: &CellId) -> Option<Cell> {
        if self.top_cell == Some(*id) {
            self.top_cell = None;
        }
        self.cells.remove(id)
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.cells.values().find(|c| c.name == name)
    }

    pub fn find_cell_id_by_name(&self, name: &str) -> Option<CellId> {
        self.cells.values().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn top_cell(&self) -> Option<&Cell> {
        self.top_cell.and_then(|id| self.cells.get(&id))
    }

    pub fn cell_names(&self) -> Vec<&str> {
        self.cells.values().map(|c| c.name.as_str()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    // ── Library merging ──────────────────────────────────────────────

    /// Absorb all cells from `other`, returning the ids of the cells that
    /// are new to this database. Cells whose name already exists here are
    /// skipped (the existing definition wins), mirroring how a mask flow
    /// re-reads a die file into an already populated layout.
    pub fn merge_from(&mut self, other: LayoutDatabase) -> Vec<CellId> {
        let mut added = Vec::new();
        for (id, cell) in other.cells {
            if self.find_cell_by_name(&cell.name).is_some() {
                log::warn!("merge: cell '{}' already present, keeping existing", cell.name);
                continue;
            }
            self.cells.insert(id, cell);
            added.push(id);
        }
        for layer in other.layer_stack.all_layers() {
            if self.layer_stack.get_layer(layer.id).is_none() {
                self.layer_stack.add_layer(layer.clone());
            }
        }
        if self.top_cell.is_none() {
            self.top_cell = added.first().copied();
        }
        added
    }

    /// Link up instances that only carry a cell name (nil `cell_id`),
    /// e.g. after reading SREFs from a GDS stream.
    pub fn resolve_instances(&mut self) -> Result<(), DatabaseError> {
        let by_name: HashMap<String, CellId> = self
            .cells
            .values()
            .map(|c| (c.name.clone(), c.id))
            .collect();

        for cell in self.cells.values_mut() {
            for inst in &mut cell.instances {
                if inst.cell_id.is_nil() {
                    match by_name.get(&inst.cell_name) {
                        Some(id) => inst.cell_id = *id,
                        None => {
                            return Err(DatabaseError::UndefinedCell(inst.cell_name.clone()))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellInstance, Transform};

    #[test]
    fn test_database_create() {
        let db = LayoutDatabase::new("test_project");
        assert_eq!(db.name, "test_project");
        assert_eq!(db.cell_count(), 0);
        assert!(db.top_cell.is_none());
    }

    #[test]
    fn test_add_and_find_cell() {
        let mut db = LayoutDatabase::new("test");
        let cell = Cell::new("rtd_die");
        let id = db.add_cell(cell);
        assert_eq!(db.cell_count(), 1);
        assert!(db.get_cell(&id).is_some());
        assert_eq!(db.find_cell_by_name("rtd_die").unwrap().name, "rtd_die");
        assert_eq!(db.top_cell, Some(id));
    }

    #[test]
    fn test_merge_reports_new_cells() {
        let mut dst = LayoutDatabase::new("electrodes");
        dst.add_cell(Cell::new("ELECTRODES"));

        let mut src = LayoutDatabase::new("rtd");
        src.add_cell(Cell::new("PT100_RTD"));
        src.add_cell(Cell::new("ELECTRODES")); // name collision, skipped

        let added = dst.merge_from(src);
        assert_eq!(added.len(), 1);
        assert_eq!(dst.get_cell(&added[0]).unwrap().name, "PT100_RTD");
        assert_eq!(dst.cell_count(), 2);
        // Destination top cell is untouched by the merge.
        assert_eq!(dst.top_cell().unwrap().name, "ELECTRODES");
    }

    #[test]
    fn test_resolve_instances() {
        let mut db = LayoutDatabase::new("test");
        let die_id = db.add_cell(Cell::new("DIE"));
        let mut top = Cell::new("TOP");
        top.add_instance(CellInstance::by_name("DIE", Transform::translate(10.0, 0.0)));
        let top_id = db.add_cell(top);

        db.resolve_instances().unwrap();
        assert_eq!(db.get_cell(&top_id).unwrap().instances[0].cell_id, die_id);
    }

    #[test]
    fn test_resolve_instances_undefined() {
        let mut db = LayoutDatabase::new("test");
        let mut top = Cell::new("TOP");
        top.add_instance(CellInstance::by_name("MISSING", Transform::default()));
        db.add_cell(top);

        let err = db.resolve_instances().unwrap_err();
        assert!(matches!(err, DatabaseError::UndefinedCell(name) if name == "MISSING"));
    }
}
