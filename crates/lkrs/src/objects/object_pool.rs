// Object pools for tables, closures and upvalue cells.
//
// Pools are Vec-backed and addressed by typed id. Slots live as long as
// the VM; value identity (the id) is what LK semantics care about.

use crate::lk_value::{LkClosure, LkTable, UpvalueCell};

use super::ids::{CellId, ClosureId, TableId};
use super::string_interner::StringInterner;

pub struct ObjectPool {
    pub strings: StringInterner,
    tables: Vec<LkTable>,
    closures: Vec<LkClosure>,
    cells: Vec<UpvalueCell>,
}

impl ObjectPool {
    pub fn new() -> Self {
        ObjectPool {
            strings: StringInterner::new(),
            tables: Vec::new(),
            closures: Vec::new(),
            cells: Vec::new(),
        }
    }

    pub fn create_table(&mut self, asize: usize, hsize: usize) -> TableId {
        let id = TableId(self.tables.len() as u32);
        self.tables.push(LkTable::new(asize, hsize));
        id
    }

    #[inline(always)]
    pub fn table(&self, id: TableId) -> &LkTable {
        &self.tables[id.index()]
    }

    #[inline(always)]
    pub fn table_mut(&mut self, id: TableId) -> &mut LkTable {
        &mut self.tables[id.index()]
    }

    pub fn create_closure(&mut self, closure: LkClosure) -> ClosureId {
        let id = ClosureId(self.closures.len() as u32);
        self.closures.push(closure);
        id
    }

    #[inline(always)]
    pub fn closure(&self, id: ClosureId) -> &LkClosure {
        &self.closures[id.index()]
    }

    pub fn create_cell(&mut self, cell: UpvalueCell) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(cell);
        id
    }

    #[inline(always)]
    pub fn cell(&self, id: CellId) -> UpvalueCell {
        self.cells[id.index()]
    }

    #[inline(always)]
    pub fn cell_mut(&mut self, id: CellId) -> &mut UpvalueCell {
        &mut self.cells[id.index()]
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}
