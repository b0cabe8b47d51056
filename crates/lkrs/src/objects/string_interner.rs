// String interner.
//
// Every LK string is interned, so string equality and table-key hashing
// reduce to id comparison. Storage is append-only `Rc<str>` slots with an
// ahash-keyed reverse map.

use ahash::RandomState;
use std::collections::HashMap;
use std::rc::Rc;

use super::ids::StringId;

pub struct StringInterner {
    strings: Vec<Rc<str>>,
    lookup: HashMap<Rc<str>, StringId, RandomState>,
}

impl StringInterner {
    pub fn new() -> Self {
        StringInterner {
            strings: Vec::new(),
            lookup: HashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.lookup.get(s) {
            return *id;
        }
        let rc: Rc<str> = Rc::from(s);
        let id = StringId(self.strings.len() as u32);
        self.strings.push(rc.clone());
        self.lookup.insert(rc, id);
        id
    }

    #[inline(always)]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    #[inline(always)]
    pub fn get_rc(&self, id: StringId) -> Rc<str> {
        self.strings[id.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_an_id() {
        let mut interner = StringInterner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.get(a), "hello");
        assert_eq!(interner.get(c), "world");
    }
}
