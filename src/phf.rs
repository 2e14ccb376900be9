//! The optional minimal-perfect-hash directory index (spec §4.9): a
//! CHD-style construction (bucket assignment + per-bucket displacement
//! search) treated by the spec as a black box behind four operations.
//! Construction is allowed to fail (pathological key sets, displacement
//! search exhausted); the caller then just omits the section (spec §4.9,
//! seed scenario S6).

use fxhash::FxHashMap;

const MAX_DISPLACEMENT_ATTEMPTS: u32 = 100_000;

fn hash(seed: u32, s: &str) -> u64 {
	let mut h = 0xcbf29ce484222325u64 ^ seed as u64;
	for b in s.as_bytes() {
		h ^= *b as u64;
		h = h.wrapping_mul(0x100000001b3);
	}
	h
}

#[derive(Debug, Default)]
pub struct PerfectHashBuilder {
	entries: Vec<(String, u32)>,
}

#[derive(Debug)]
pub struct PreparedHash {
	n_slots: u32,
	displacements: Vec<u32>,
	values: Vec<u32>,
	bucket_of: FxHashMap<String, usize>,
}

impl PerfectHashBuilder {
	pub fn new() -> Self {
		PerfectHashBuilder::default()
	}

	pub fn add(&mut self, name: &str, index: u32) {
		self.entries.push((name.to_owned(), index));
	}

	/// Attempts to build a minimal perfect hash over the added keys. Returns
	/// `None` on failure, in which case the directory index section is
	/// simply omitted from the typelib.
	pub fn prepare(&self) -> Option<PreparedHash> {
		let n = self.entries.len();
		if n == 0 {
			return None;
		}
		let n_slots = n as u32;
		let n_buckets = n_slots;

		let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n_buckets as usize];
		for (i, (name, _)) in self.entries.iter().enumerate() {
			let b = (hash(0, name) % n_buckets as u64) as usize;
			buckets[b].push(i);
		}

		let mut bucket_order: Vec<usize> = (0..buckets.len()).collect();
		bucket_order.sort_by_key(|&b| std::cmp::Reverse(buckets[b].len()));

		let mut occupied = vec![false; n_slots as usize];
		let mut displacements = vec![0u32; n_buckets as usize];
		let mut values = vec![0u32; n_slots as usize];
		let mut bucket_of = FxHashMap::default();

		for &b in &bucket_order {
			let members = &buckets[b];
			if members.is_empty() {
				continue;
			}
			let mut found = false;
			for d in 0..MAX_DISPLACEMENT_ATTEMPTS {
				let slots: Vec<usize> = members.iter().map(|&i| (hash(d + 1, &self.entries[i].0) % n_slots as u64) as usize).collect();
				let mut unique = slots.clone();
				unique.sort_unstable();
				unique.dedup();
				if unique.len() != slots.len() {
					continue;
				}
				if slots.iter().any(|s| occupied[*s]) {
					continue;
				}
				for (&slot, &member) in slots.iter().zip(members.iter()) {
					occupied[slot] = true;
					values[slot] = self.entries[member].1;
					bucket_of.insert(self.entries[member].0.clone(), b);
				}
				displacements[b] = d + 1;
				found = true;
				break;
			}
			if !found {
				return None;
			}
		}

		Some(PreparedHash { n_slots, displacements, values, bucket_of })
	}
}

impl PreparedHash {
	pub fn required_size(&self) -> u32 {
		8 + self.displacements.len() as u32 * 4 + self.values.len() as u32 * 4
	}

	/// Packs `n_buckets:u32, n_slots:u32, displacements[n_buckets]:u32,
	/// values[n_slots]:u32` starting at `dest_offset` in `buffer`.
	pub fn pack(&self, buffer: &mut crate::build::writer::Buffer, dest_offset: u32) {
		let mut cursor = dest_offset;
		buffer.put_u32(cursor, self.displacements.len() as u32);
		cursor += 4;
		buffer.put_u32(cursor, self.n_slots);
		cursor += 4;
		for &d in &self.displacements {
			buffer.put_u32(cursor, d);
			cursor += 4;
		}
		for &v in &self.values {
			buffer.put_u32(cursor, v);
			cursor += 4;
		}
	}

	/// Looks up `name`, returning the recorded index if present. Exposed
	/// mainly for the validator and tests (spec §8 property 6): real
	/// runtime lookup re-derives bucket/displacement from the packed bytes,
	/// which this struct does not need to do since it is only ever used
	/// immediately after `prepare`.
	pub fn lookup(&self, name: &str) -> Option<u32> {
		let &bucket = self.bucket_of.get(name)?;
		let d = self.displacements[bucket];
		if d == 0 {
			return None;
		}
		let slot = (hash(d, name) % self.n_slots as u64) as usize;
		Some(self.values[slot])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_builder_fails_to_prepare() {
		let builder = PerfectHashBuilder::new();
		assert!(builder.prepare().is_none());
	}

	#[test]
	fn every_added_key_is_recoverable_after_prepare() {
		let mut builder = PerfectHashBuilder::new();
		let names = ["activate", "dispose", "finalize", "get_property", "set_property", "notify"];
		for (i, name) in names.iter().enumerate() {
			builder.add(name, i as u32 + 1);
		}
		let prepared = builder.prepare().expect("small key sets should always build");
		for (i, name) in names.iter().enumerate() {
			assert_eq!(prepared.lookup(name), Some(i as u32 + 1));
		}
	}

	#[test]
	fn an_absent_key_looks_up_to_none() {
		let mut builder = PerfectHashBuilder::new();
		builder.add("a", 1);
		let prepared = builder.prepare().unwrap();
		assert_eq!(prepared.lookup("not-present"), None);
	}

	#[test]
	fn pack_writes_the_declared_required_size() {
		let mut builder = PerfectHashBuilder::new();
		builder.add("a", 1);
		builder.add("b", 2);
		let prepared = builder.prepare().unwrap();
		let mut buffer = crate::build::writer::Buffer::default();
		prepared.pack(&mut buffer, 0);
		assert_eq!(buffer.len(), prepared.required_size());
	}
}
