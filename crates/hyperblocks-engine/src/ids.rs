//! Block identity generation.

use std::collections::HashSet;

use log::warn;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::PartialBlock;

/// Source of candidate block IDs. Generators may repeat themselves;
/// [`IdAllocator`] is responsible for rejecting IDs already in use.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;

    /// Told about IDs that are already in use before any are generated.
    /// Sequential generators jump past them; random ones ignore them.
    fn skip_past(&mut self, _taken: &mut dyn Iterator<Item = &str>) {}
}

/// Short random IDs: the first eight hex digits of a v4 UUID.
#[derive(Debug, Default, Clone)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&mut self) -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }
}

/// Sequential IDs `prefix1`, `prefix2`, … for reproducible documents.
#[derive(Debug, Clone)]
pub struct MonotonicIdGenerator {
    prefix: String,
    next: u64,
}

impl MonotonicIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    /// Continue after the highest `prefixN` among `existing`.
    pub fn resume<'a>(prefix: impl Into<String>, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let mut generator = Self::new(prefix);
        generator.skip_past(&mut existing.into_iter());
        generator
    }
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    fn skip_past(&mut self, taken: &mut dyn Iterator<Item = &str>) {
        let prefix = self.prefix.as_str();
        let last = taken
            .filter_map(|id| id.strip_prefix(prefix)?.parse::<u64>().ok())
            .max();
        if let Some(last) = last {
            self.next = self.next.max(last.saturating_add(1));
        }
    }
}

/// Hands out IDs that are not in use, for the duration of one command.
pub struct IdAllocator<'a> {
    generator: &'a mut dyn IdGenerator,
    taken: HashSet<String>,
    /// Explicit IDs of the pending batch; generated IDs avoid them.
    reserved: HashSet<String>,
}

impl<'a> IdAllocator<'a> {
    pub const MAX_ATTEMPTS: usize = 32;

    pub fn new(generator: &'a mut dyn IdGenerator, taken: HashSet<String>) -> Self {
        generator.skip_past(&mut taken.iter().map(String::as_str));
        Self {
            generator,
            taken,
            reserved: HashSet::new(),
        }
    }

    /// Keep generated IDs clear of the explicit IDs anywhere in `blocks`,
    /// so a block claimed early cannot steal an ID a later one asks for.
    pub fn reserving(mut self, blocks: &[PartialBlock]) -> Self {
        fn walk(blocks: &[PartialBlock], reserved: &mut HashSet<String>) {
            for block in blocks {
                if let Some(id) = &block.id {
                    reserved.insert(id.clone());
                }
                walk(block.children.as_deref().unwrap_or_default(), reserved);
            }
        }
        walk(blocks, &mut self.reserved);
        self.generator.skip_past(&mut self.reserved.iter().map(String::as_str));
        self
    }

    /// Claim `explicit` if given, otherwise a fresh generated ID.
    pub fn claim(&mut self, explicit: Option<&str>) -> Result<String> {
        if let Some(id) = explicit {
            if !self.taken.insert(id.to_string()) {
                return Err(EngineError::DuplicateBlockId(id.to_string()));
            }
            return Ok(id.to_string());
        }

        for attempt in 1..=Self::MAX_ATTEMPTS {
            let id = self.generator.next_id();
            if !self.reserved.contains(&id) && self.taken.insert(id.clone()) {
                return Ok(id);
            }
            warn!("generated block ID {id} already in use (attempt {attempt})");
        }
        Err(EngineError::IdGeneratorExhausted {
            attempts: Self::MAX_ATTEMPTS,
        })
    }

    pub fn is_taken(&self, id: &str) -> bool {
        self.taken.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl IdGenerator for Constant {
        fn next_id(&mut self) -> String {
            "same".to_string()
        }
    }

    #[test]
    fn test_random_ids_are_short_hex() {
        let mut generator = RandomIdGenerator;
        let id = generator.next_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_monotonic_sequence() {
        let mut generator = MonotonicIdGenerator::new("b");
        assert_eq!(generator.next_id(), "b1");
        assert_eq!(generator.next_id(), "b2");
    }

    #[test]
    fn test_allocator_skips_taken_ids() {
        let mut generator = MonotonicIdGenerator::new("b");
        let taken = HashSet::from(["b1".to_string(), "b2".to_string()]);
        let mut ids = IdAllocator::new(&mut generator, taken);

        assert_eq!(ids.claim(None).unwrap(), "b3");
        assert_eq!(ids.claim(None).unwrap(), "b4");
        assert!(ids.is_taken("b3"));
    }

    #[test]
    fn test_generated_ids_avoid_reserved_batch_ids() {
        let mut generator = MonotonicIdGenerator::new("b");
        let batch = vec![
            PartialBlock::paragraph("first"),
            PartialBlock::paragraph("second")
                .with_children(vec![PartialBlock::paragraph("kid").with_id("b1")]),
        ];
        let mut ids = IdAllocator::new(&mut generator, HashSet::new()).reserving(&batch);

        assert_eq!(ids.claim(None).unwrap(), "b2");
        assert_eq!(ids.claim(Some("b1")).unwrap(), "b1");
    }

    #[test]
    fn test_monotonic_resume_after_existing() {
        let mut generator = MonotonicIdGenerator::resume("b", ["b3", "x9", "b12", "bad"]);
        assert_eq!(generator.next_id(), "b13");

        let mut fresh = MonotonicIdGenerator::resume("b", []);
        assert_eq!(fresh.next_id(), "b1");
    }

    #[test]
    fn test_allocator_jumps_past_long_taken_run() {
        let mut generator = MonotonicIdGenerator::new("b");
        let taken: HashSet<String> = (1..=40).map(|n| format!("b{n}")).collect();
        let mut ids = IdAllocator::new(&mut generator, taken);

        assert_eq!(ids.claim(None).unwrap(), "b41");
    }

    #[test]
    fn test_reserved_run_moves_generator_forward() {
        let mut generator = MonotonicIdGenerator::new("b");
        let batch: Vec<PartialBlock> = (1..=40)
            .map(|n| PartialBlock::paragraph("x").with_id(format!("b{n}")))
            .collect();
        let mut ids = IdAllocator::new(&mut generator, HashSet::new()).reserving(&batch);

        assert_eq!(ids.claim(None).unwrap(), "b41");
    }

    #[test]
    fn test_allocator_rejects_duplicate_explicit_id() {
        let mut generator = MonotonicIdGenerator::new("b");
        let mut ids = IdAllocator::new(&mut generator, HashSet::from(["p1".to_string()]));

        assert!(matches!(
            ids.claim(Some("p1")),
            Err(EngineError::DuplicateBlockId(id)) if id == "p1"
        ));
        assert_eq!(ids.claim(Some("p2")).unwrap(), "p2");
        assert!(ids.claim(Some("p2")).is_err());
    }

    #[test]
    fn test_allocator_gives_up_on_colliding_generator() {
        let mut generator = Constant;
        let mut ids = IdAllocator::new(&mut generator, HashSet::new());

        assert_eq!(ids.claim(None).unwrap(), "same");
        assert!(matches!(
            ids.claim(None),
            Err(EngineError::IdGeneratorExhausted { attempts: 32 })
        ));
    }
}
