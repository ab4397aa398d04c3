//! Flat serde serialization for every heap engine
//!
//! Heaps serialize logically, not structurally: a sequence of
//! `(key, value)` pairs in the engine's iteration order. Deserialization
//! builds a fresh heap and re-inserts each pair, so a restored heap holds
//! the same entries but may have a different internal shape. Comparators
//! are closures and cannot cross a serialization boundary; restored heaps
//! always use the natural key order.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::traits::{Heap, HeapEntry};

macro_rules! impl_heap_serde {
    ($heap:ident, $module:ident, $expecting:literal) => {
        impl<K, V> Serialize for crate::$module::$heap<K, V>
        where
            K: Ord + Serialize,
            V: Serialize,
        {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut seq = serializer.serialize_seq(Some(self.size()))?;
                for entry in self.entries() {
                    let entry = entry.map_err(serde::ser::Error::custom)?;
                    seq.serialize_element(&(&*entry.key(), &*entry.value()))?;
                }
                seq.end()
            }
        }

        impl<'de, K, V> Deserialize<'de> for crate::$module::$heap<K, V>
        where
            K: Ord + Deserialize<'de>,
            V: Deserialize<'de>,
        {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct PairsVisitor<K, V>(PhantomData<(K, V)>);

                impl<'de, K, V> Visitor<'de> for PairsVisitor<K, V>
                where
                    K: Ord + Deserialize<'de>,
                    V: Deserialize<'de>,
                {
                    type Value = crate::$module::$heap<K, V>;

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                    where
                        A: SeqAccess<'de>,
                    {
                        let mut heap = crate::$module::$heap::new();
                        while let Some((key, value)) = seq.next_element::<(K, V)>()? {
                            heap.insert(key, value);
                        }
                        Ok(heap)
                    }
                }

                deserializer.deserialize_seq(PairsVisitor(PhantomData))
            }
        }
    };
}

impl_heap_serde!(BinomialHeap, binomial, "a sequence of binomial heap entries");
impl_heap_serde!(FibonacciHeap, fibonacci, "a sequence of fibonacci heap entries");
impl_heap_serde!(LeftistHeap, leftist, "a sequence of leftist heap entries");
impl_heap_serde!(PairingHeap, pairing, "a sequence of pairing heap entries");
impl_heap_serde!(SkewHeap, skew, "a sequence of skew heap entries");

#[cfg(test)]
mod tests {
    use crate::pairing::PairingHeap;
    use crate::traits::Heap;

    #[test]
    fn serializes_in_iteration_order() {
        let mut heap: PairingHeap<i32, String> = PairingHeap::new();
        heap.insert(2, "two".to_string());
        heap.insert(1, "one".to_string());
        let json = serde_json::to_string(&heap).unwrap();
        // the root (current minimum) always leads the tour
        assert!(json.starts_with("[[1,"));
        let restored: PairingHeap<i32, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.size(), 2);
    }
}
