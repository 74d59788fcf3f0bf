//! Binary form of the positional index.
//!
//! The artifact is a zlib stream (level 9) wrapping a MessagePack map
//! `{"doc_id_map": {external_id: int}, "index": {term: {int_doc_id: [delta, ..]}}}`.
//! Document IDs are remapped to integers in first-seen order and position lists are
//! stored as gaps.

use crate::error::CodecError;
use crate::index::{DocId, InvertedIndex, Position, PositionList};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;

pub type IntDocId = u32;
/// Postings of one term with integer document IDs and gap-encoded positions.
pub type DeltaPostings = HashMap<IntDocId, Vec<Position>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedIndex {
    #[serde(default)]
    pub doc_id_map: HashMap<DocId, IntDocId>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub index: HashMap<String, DeltaPostings>,
}

impl CompressedIndex {
    pub fn reverse_map(&self) -> HashMap<IntDocId, DocId> {
        self.doc_id_map.iter().map(|(ext, int)| (*int, ext.clone())).collect()
    }

    /// Expands back to the logical index keyed by external IDs.
    pub fn to_inverted_index(&self) -> InvertedIndex {
        let reverse = self.reverse_map();
        let mut out = InvertedIndex::new();
        for (term, postings) in &self.index {
            let expanded: BTreeMap<DocId, PositionList> = postings
                .iter()
                .map(|(int_id, deltas)| {
                    let doc = reverse.get(int_id).cloned().unwrap_or_else(|| int_id.to_string());
                    (doc, delta_decode(deltas))
                })
                .collect();
            out.insert_postings(term.clone(), expanded);
        }
        out
    }
}

/// First element absolute, the rest differences from the predecessor. Sorts a copy first.
pub fn delta_encode(positions: &[Position]) -> Vec<Position> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    let mut prev = 0;
    sorted
        .into_iter()
        .map(|pos| {
            let gap = pos - prev;
            prev = pos;
            gap
        })
        .collect()
}

pub fn delta_decode(deltas: &[Position]) -> PositionList {
    let mut current: Position = 0;
    deltas
        .iter()
        .map(|gap| {
            current = current.saturating_add(*gap);
            current
        })
        .collect()
}

/// Remaps document IDs in first-seen order (terms iterate in sorted order) and gap-encodes positions.
pub fn compress(index: &InvertedIndex) -> CompressedIndex {
    let mut doc_id_map: HashMap<DocId, IntDocId> = HashMap::new();
    let mut out: HashMap<String, DeltaPostings> = HashMap::with_capacity(index.term_count());
    for (term, postings) in index.terms() {
        let mut term_data = DeltaPostings::with_capacity(postings.len());
        for (doc_id, positions) in postings {
            let next = doc_id_map.len() as IntDocId;
            let int_id = *doc_id_map.entry(doc_id.clone()).or_insert(next);
            term_data.insert(int_id, delta_encode(positions));
        }
        out.insert(term.clone(), term_data);
    }
    CompressedIndex { doc_id_map, index: out }
}

pub fn encode(index: &InvertedIndex) -> Result<Vec<u8>, CodecError> { encode_compressed(&compress(index)) }

pub fn encode_compressed(compressed: &CompressedIndex) -> Result<Vec<u8>, CodecError> {
    let packed = rmp_serde::to_vec_named(compressed)?;
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(packed.len() / 2), Compression::best());
    encoder.write_all(&packed)?;
    Ok(encoder.finish()?)
}

/// Fails on corrupt or truncated input; never yields a partial index.
pub fn decode(bytes: &[u8]) -> Result<CompressedIndex, CodecError> {
    let packed = inflate(bytes)?;
    Ok(rmp_serde::from_slice(&packed)?)
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(4).max(256));
    loop {
        let consumed = inflater.total_in() as usize;
        let produced = out.len();
        let status = inflater.decompress_vec(&bytes[consumed..], &mut out, FlushDecompress::Finish)?;
        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity());
                    continue;
                }
                // input exhausted before the end-of-stream marker
                if inflater.total_in() as usize == consumed && out.len() == produced {
                    return Err(CodecError::Truncated);
                }
            }
        }
    }
}

/// Document key as written by any producer: integer, numeric string, or something to skip.
enum DocKey {
    Id(IntDocId),
    Ignored,
}

impl<'de> Deserialize<'de> for DocKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = DocKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str("an integer document id") }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DocKey, E> {
                Ok(IntDocId::try_from(v).map(DocKey::Id).unwrap_or(DocKey::Ignored))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DocKey, E> {
                Ok(IntDocId::try_from(v).map(DocKey::Id).unwrap_or(DocKey::Ignored))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DocKey, E> {
                Ok(v.trim().parse().map(DocKey::Id).unwrap_or(DocKey::Ignored))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<DocKey, E> {
                match std::str::from_utf8(v) {
                    Ok(s) => self.visit_str(s),
                    Err(_) => Ok(DocKey::Ignored),
                }
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<DocKey, E> { Ok(DocKey::Ignored) }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<DocKey, E> { Ok(DocKey::Ignored) }

            fn visit_unit<E: de::Error>(self) -> Result<DocKey, E> { Ok(DocKey::Ignored) }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

struct LenientPostings(DeltaPostings);

impl<'de> Deserialize<'de> for LenientPostings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PostingsVisitor;

        impl<'de> Visitor<'de> for PostingsVisitor {
            type Value = LenientPostings;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str("a map of document id to gaps") }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LenientPostings, A::Error> {
                let mut out = DeltaPostings::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, gaps)) = map.next_entry::<DocKey, Vec<Position>>()? {
                    if let DocKey::Id(id) = key {
                        out.insert(id, gaps);
                    }
                }
                Ok(LenientPostings(out))
            }
        }

        deserializer.deserialize_map(PostingsVisitor)
    }
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<String, DeltaPostings>, D::Error> {
    let raw = HashMap::<String, LenientPostings>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(term, postings)| (term, postings.0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        for (term, doc, pos) in [("appl", "h1", 0), ("appl", "h1", 7), ("appl", "h2", 3), ("banana", "h2", 1)] {
            index.record(term, doc, pos);
        }
        index
    }

    #[test]
    fn gaps_restore_sorted_positions() {
        let positions = vec![3, 10, 11, 40];
        let gaps = delta_encode(&positions);
        assert_eq!(gaps, vec![3, 7, 1, 29]);
        assert_eq!(delta_decode(&gaps), positions);
        assert_eq!(delta_encode(&[9, 2, 5]), vec![2, 3, 4]);
        assert!(delta_decode(&[]).is_empty());
    }

    #[test]
    fn doc_ids_assigned_in_first_seen_order() {
        let compressed = compress(&sample_index());
        assert_eq!(compressed.doc_id_map["h1"], 0);
        assert_eq!(compressed.doc_id_map["h2"], 1);
        assert_eq!(compressed.index["appl"][&0], vec![0, 7]);
    }

    #[test]
    fn artifact_decodes_to_same_index() {
        let index = sample_index();
        let bytes = encode(&index).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.to_inverted_index(), index);
    }

    #[test]
    fn truncated_artifact_is_rejected() {
        let bytes = encode(&sample_index()).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
        assert!(decode(b"not a zlib stream").is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn tolerates_string_keys_and_extra_fields() {
        #[derive(Serialize)]
        struct Foreign {
            doc_id_map: HashMap<String, u32>,
            index: HashMap<String, HashMap<String, Vec<u32>>>,
            built_by: &'static str,
        }
        let mut postings = HashMap::new();
        postings.insert("0".to_string(), vec![2, 3]);
        postings.insert("not-a-number".to_string(), vec![1]);
        let foreign = Foreign {
            doc_id_map: HashMap::from([("h1".to_string(), 0)]),
            index: HashMap::from([("appl".to_string(), postings)]),
            built_by: "legacy",
        };
        let packed = rmp_serde::to_vec_named(&foreign).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&packed).unwrap();
        let bytes = encoder.finish().unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.index["appl"].len(), 1);
        assert_eq!(decoded.to_inverted_index().postings("appl").unwrap()["h1"], vec![2, 5]);
    }
}
